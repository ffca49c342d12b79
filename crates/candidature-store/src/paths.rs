use crate::error::{Result, StoreError};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "candidature";
const DB_FILENAME: &str = "candidatures.sqlite3";

pub fn data_dir() -> Result<PathBuf> {
    match env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        Some(base) if base.as_os_str().is_empty() => Err(StoreError::InvalidDataPath(base)),
        Some(base) => Ok(base.join(APP_DIR)),
        None => {
            let home = dirs::home_dir().ok_or(StoreError::MissingHomeDir)?;
            Ok(home.join(".local").join("share").join(APP_DIR))
        }
    }
}

pub fn db_path_in(dir: &Path) -> PathBuf {
    dir.join(DB_FILENAME)
}

/// Database location: `custom` when given, else the default file in the
/// data dir. A missing parent directory is created private to the user.
pub fn resolve_db_path(custom: Option<&Path>) -> Result<PathBuf> {
    let path = match custom {
        Some(path) if path.as_os_str().is_empty() => {
            return Err(StoreError::InvalidDataPath(path.to_path_buf()))
        }
        Some(path) => path.to_path_buf(),
        None => db_path_in(&data_dir()?),
    };
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        ensure_private_dir(parent)?;
    }
    Ok(path)
}

fn ensure_private_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir)?;
    restrict_dir_permissions(dir)
}

#[cfg(unix)]
fn restrict_dir_permissions(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir_permissions(_dir: &Path) -> Result<()> {
    Ok(())
}
