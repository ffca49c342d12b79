use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use lettre::message::Mailbox;
use serde::Deserialize;
use thiserror::Error;

const APP_DIR: &str = "candidature";
const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_PORT: u16 = 3003;
pub const DEFAULT_BODY_LIMIT_BYTES: usize = 1024 * 1024;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 15 * 60;
pub const DEFAULT_RATE_LIMIT_MAX: u32 = 200;
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_SMTP_TIMEOUT_SECONDS: u64 = 10;
pub const DEFAULT_PASSWORD_ENV: &str = "EMAIL_PASS";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub rate_limit: RateLimitConfig,
    pub database: DatabaseConfig,
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: Environment,
    pub trust_proxy: bool,
    pub body_limit_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn exposes_diagnostics(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
    pub origins: Vec<String>,
}

impl CorsConfig {
    pub fn allows(&self, origin: &str) -> bool {
        self.origins.iter().any(|allowed| allowed == origin)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window_seconds: u64,
    pub max_requests: u32,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Clone)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Implicit TLS when set, STARTTLS otherwise.
    pub secure: bool,
    pub username: String,
    pub password: String,
    pub from: Mailbox,
    pub bcc: Option<Mailbox>,
    pub debug: bool,
    pub verify_on_boot: bool,
    pub timeout_seconds: u64,
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("secure", &self.secure)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from", &self.from)
            .field("bcc", &self.bcc)
            .field("debug", &self.debug)
            .field("verify_on_boot", &self.verify_on_boot)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: DEFAULT_PORT,
                environment: Environment::Development,
                trust_proxy: false,
                body_limit_bytes: DEFAULT_BODY_LIMIT_BYTES,
            },
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig {
                window_seconds: DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
                max_requests: DEFAULT_RATE_LIMIT_MAX,
            },
            database: DatabaseConfig::default(),
            mail: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing home directory")]
    MissingHomeDir,
    #[error("invalid config path: {0}")]
    InvalidConfigPath(PathBuf),
    #[error("config file not found: {0}")]
    MissingConfigFile(PathBuf),
    #[error("config file permissions too permissive: {0}")]
    InsecurePermissions(PathBuf),
    #[error("invalid {key} value: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("invalid mailbox for {key}: {value}")]
    InvalidMailbox { key: &'static str, value: String },
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    server: Option<ServerFile>,
    cors: Option<CorsFile>,
    rate_limit: Option<RateLimitFile>,
    database: Option<DatabaseFile>,
    mail: Option<MailFile>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ServerFile {
    port: Option<u16>,
    environment: Option<Environment>,
    trust_proxy: Option<bool>,
    body_limit_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CorsFile {
    origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RateLimitFile {
    window_seconds: Option<u64>,
    max_requests: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DatabaseFile {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct MailFile {
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    secure: Option<bool>,
    username: Option<String>,
    password_env: Option<String>,
    from: Option<String>,
    bcc: Option<String>,
    debug: Option<bool>,
    verify_on_boot: Option<bool>,
    timeout_seconds: Option<u64>,
}

/// Loads the config file (if any) and applies overrides from the process
/// environment.
pub fn load(config_path: Option<PathBuf>) -> Result<AppConfig> {
    load_with(config_path, &ProcessEnv)
}

pub fn load_with(config_path: Option<PathBuf>, env: &dyn EnvSource) -> Result<AppConfig> {
    let required = config_path.is_some();
    let path = match resolve_config_path(config_path, env) {
        Ok(path) => path,
        Err(ConfigError::MissingHomeDir | ConfigError::InvalidConfigPath(_)) if !required => {
            return merge_config(ConfigFile::default(), env);
        }
        Err(err) => return Err(err),
    };
    let parsed = read_config_file(&path, required)?.unwrap_or_default();
    merge_config(parsed, env)
}

pub fn resolve_config_path(custom: Option<PathBuf>, env: &dyn EnvSource) -> Result<PathBuf> {
    match custom {
        Some(path) => {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidConfigPath(path));
            }
            Ok(path)
        }
        None => {
            let base = if let Some(dir) = env.var("XDG_CONFIG_HOME") {
                let path = PathBuf::from(dir);
                if path.as_os_str().is_empty() {
                    return Err(ConfigError::InvalidConfigPath(path));
                }
                path
            } else {
                let home = dirs::home_dir().ok_or(ConfigError::MissingHomeDir)?;
                home.join(".config")
            };
            Ok(base.join(APP_DIR).join(CONFIG_FILENAME))
        }
    }
}

fn read_config_file(path: &Path, required: bool) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        if required {
            return Err(ConfigError::MissingConfigFile(path.to_path_buf()));
        }
        return Ok(None);
    }

    ensure_permissions(path)?;
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Some(parsed))
}

fn merge_config(parsed: ConfigFile, env: &dyn EnvSource) -> Result<AppConfig> {
    let mut config = AppConfig::default();

    let server = parsed.server.unwrap_or_default();
    config.server.port = match env.var("PORT") {
        Some(raw) => parse_number("PORT", &raw)?,
        None => server.port.unwrap_or(DEFAULT_PORT),
    };
    config.server.environment = match env.var("APP_ENV").or_else(|| env.var("NODE_ENV")) {
        Some(raw) => parse_environment(&raw)?,
        None => server.environment.unwrap_or(Environment::Development),
    };
    config.server.trust_proxy = match env.var("TRUST_PROXY") {
        Some(raw) => parse_bool("TRUST_PROXY", &raw)?,
        None => server.trust_proxy.unwrap_or(false),
    };
    config.server.body_limit_bytes = match env.var("BODY_LIMIT_BYTES") {
        Some(raw) => parse_number("BODY_LIMIT_BYTES", &raw)?,
        None => server.body_limit_bytes.unwrap_or(DEFAULT_BODY_LIMIT_BYTES),
    };
    if config.server.body_limit_bytes == 0 {
        return Err(invalid("BODY_LIMIT_BYTES", "0"));
    }

    config.cors.origins = match env.var("CORS_ORIGINS") {
        Some(raw) => parse_origins(&raw),
        None => parsed
            .cors
            .and_then(|cors| cors.origins)
            .map(|origins| parse_origins(&origins.join(",")))
            .unwrap_or_default(),
    };
    if config.cors.origins.iter().any(|origin| origin == "*") {
        return Err(invalid("CORS_ORIGINS", "*"));
    }

    let rate_limit = parsed.rate_limit.unwrap_or_default();
    config.rate_limit.window_seconds = match env.var("RATE_LIMIT_WINDOW_SECONDS") {
        Some(raw) => parse_number("RATE_LIMIT_WINDOW_SECONDS", &raw)?,
        None => rate_limit
            .window_seconds
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
    };
    config.rate_limit.max_requests = match env.var("RATE_LIMIT_MAX") {
        Some(raw) => parse_number("RATE_LIMIT_MAX", &raw)?,
        None => rate_limit.max_requests.unwrap_or(DEFAULT_RATE_LIMIT_MAX),
    };
    if config.rate_limit.window_seconds == 0 {
        return Err(invalid("RATE_LIMIT_WINDOW_SECONDS", "0"));
    }
    if config.rate_limit.max_requests == 0 {
        return Err(invalid("RATE_LIMIT_MAX", "0"));
    }

    config.database.path = env
        .var("DATABASE_PATH")
        .map(PathBuf::from)
        .or_else(|| parsed.database.and_then(|database| database.path));

    config.mail = merge_mail(parsed.mail.unwrap_or_default(), env)?;

    Ok(config)
}

fn merge_mail(file: MailFile, env: &dyn EnvSource) -> Result<Option<MailConfig>> {
    let smtp_host = non_empty(env.var("SMTP_HOST").or(file.smtp_host));
    let username = non_empty(env.var("EMAIL_USER").or(file.username));
    let password_env = file
        .password_env
        .unwrap_or_else(|| DEFAULT_PASSWORD_ENV.to_string());
    let password = non_empty(env.var(&password_env));

    let (Some(smtp_host), Some(username), Some(password)) = (smtp_host, username, password) else {
        return Ok(None);
    };

    let smtp_port = match env.var("SMTP_PORT") {
        Some(raw) => parse_number("SMTP_PORT", &raw)?,
        None => file.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
    };
    let secure = match env.var("SMTP_SECURE") {
        Some(raw) => parse_bool("SMTP_SECURE", &raw)?,
        None => file.secure.unwrap_or(smtp_port == 465),
    };
    let from_raw = non_empty(env.var("EMAIL_FROM").or(file.from)).unwrap_or_else(|| username.clone());
    let from = parse_mailbox("EMAIL_FROM", &from_raw)?;
    let bcc = match non_empty(env.var("EMAIL_BCC").or(file.bcc)) {
        Some(raw) => Some(parse_mailbox("EMAIL_BCC", &raw)?),
        None => None,
    };
    let debug = match env.var("SMTP_DEBUG") {
        Some(raw) => parse_bool("SMTP_DEBUG", &raw)?,
        None => file.debug.unwrap_or(false),
    };
    let verify_on_boot = match env.var("EMAIL_VERIFY_ON_BOOT") {
        Some(raw) => parse_bool("EMAIL_VERIFY_ON_BOOT", &raw)?,
        None => file.verify_on_boot.unwrap_or(false),
    };
    let timeout_seconds = match env.var("SMTP_TIMEOUT_SECONDS") {
        Some(raw) => parse_number("SMTP_TIMEOUT_SECONDS", &raw)?,
        None => file.timeout_seconds.unwrap_or(DEFAULT_SMTP_TIMEOUT_SECONDS),
    };

    Ok(Some(MailConfig {
        smtp_host,
        smtp_port,
        secure,
        username,
        password,
        from,
        bcc,
        debug,
        verify_on_boot,
        timeout_seconds,
    }))
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}

fn parse_environment(raw: &str) -> Result<Environment> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "production" | "prod" => Ok(Environment::Production),
        "development" | "dev" | "test" | "" => Ok(Environment::Development),
        _ => Err(invalid("APP_ENV", raw)),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

fn parse_mailbox(key: &'static str, raw: &str) -> Result<Mailbox> {
    raw.parse().map_err(|_| ConfigError::InvalidMailbox {
        key,
        value: raw.to_string(),
    })
}

#[cfg(unix)]
fn ensure_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mode = metadata.permissions().mode();
    if mode & 0o077 != 0 {
        return Err(ConfigError::InsecurePermissions(path.to_path_buf()));
    }
    Ok(())
}

#[cfg(not(unix))]
fn ensure_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
