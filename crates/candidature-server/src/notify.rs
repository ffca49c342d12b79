use crate::mail;
use anyhow::{anyhow, Result};
use candidature_config::MailConfig;
use candidature_core::{CandidatureDraft, Submission};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, Message, SmtpTransport, Transport as _};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct Confirmation {
    pub candidature: CandidatureDraft,
    pub submission: Submission,
}

pub trait ConfirmationMailer: Send + Sync {
    fn send(&self, confirmation: &Confirmation) -> Result<()>;

    fn verify(&self) -> Result<()> {
        Ok(())
    }
}

pub struct SmtpMailer {
    sender: Mailbox,
    reply_to: Option<Mailbox>,
    bcc: Option<Mailbox>,
    debug: bool,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        // The authenticated account is the visible sender so SPF/DMARC align;
        // the configured `from` becomes Reply-To.
        let sender: Mailbox = config
            .username
            .parse()
            .map_err(|_| anyhow!("mail username must be a valid email address"))?;
        let reply_to = (config.from.email != sender.email).then(|| config.from.clone());

        if config.secure && config.smtp_port == 587 {
            warn!(
                port = config.smtp_port,
                "implicit TLS requested on port 587; use STARTTLS or port 465"
            );
        }

        let builder = if config.secure {
            SmtpTransport::relay(&config.smtp_host)
        } else {
            SmtpTransport::starttls_relay(&config.smtp_host)
        };
        let builder =
            builder.map_err(|err| anyhow!("invalid smtp host {}: {err}", config.smtp_host))?;

        let transport = builder
            .port(config.smtp_port)
            .timeout(Some(Duration::from_secs(config.timeout_seconds)))
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            sender,
            reply_to,
            bcc: config.bcc.clone(),
            debug: config.debug,
            transport,
        })
    }

    fn message(&self, confirmation: &Confirmation) -> Result<Message> {
        let candidature = &confirmation.candidature;
        let address: Address = candidature.email.parse()?;
        let recipient = Mailbox::new(Some(candidature.full_name()), address);

        let mut builder = Message::builder()
            .from(self.sender.clone())
            .to(recipient)
            .subject(mail::subject(&confirmation.submission.uuid));
        if let Some(reply_to) = &self.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }
        if let Some(bcc) = &self.bcc {
            builder = builder.bcc(bcc.clone());
        }

        let body = MultiPart::alternative_plain_html(
            mail::render_text(candidature, &confirmation.submission),
            mail::render_html(candidature, &confirmation.submission),
        );
        Ok(builder.multipart(body)?)
    }
}

impl ConfirmationMailer for SmtpMailer {
    fn send(&self, confirmation: &Confirmation) -> Result<()> {
        let message = self.message(confirmation)?;
        let response = self.transport.send(&message)?;
        if self.debug {
            info!(
                uuid = %confirmation.submission.uuid,
                code = %response.code(),
                "smtp accepted confirmation email"
            );
        }
        Ok(())
    }

    fn verify(&self) -> Result<()> {
        if self.transport.test_connection()? {
            Ok(())
        } else {
            Err(anyhow!("smtp server refused the test connection"))
        }
    }
}

#[derive(Clone, Default)]
pub struct Dispatcher {
    mailer: Option<Arc<dyn ConfirmationMailer>>,
}

impl Dispatcher {
    pub fn new(mailer: Arc<dyn ConfirmationMailer>) -> Self {
        Self {
            mailer: Some(mailer),
        }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_config(config: Option<&MailConfig>) -> Self {
        let Some(config) = config else {
            warn!("smtp not configured; confirmation emails will not be sent");
            return Self::disabled();
        };
        match SmtpMailer::new(config) {
            Ok(mailer) => {
                info!(
                    host = %config.smtp_host,
                    port = config.smtp_port,
                    secure = config.secure,
                    "smtp transport ready"
                );
                Self::new(Arc::new(mailer))
            }
            Err(err) => {
                error!(error = %err, "smtp transport rejected; confirmation emails disabled");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    pub fn dispatch(&self, confirmation: Confirmation) -> Option<JoinHandle<()>> {
        let mailer = self.mailer.clone()?;
        Some(tokio::task::spawn_blocking(move || {
            let uuid = confirmation.submission.uuid;
            match mailer.send(&confirmation) {
                Ok(()) => info!(%uuid, "confirmation email sent"),
                Err(err) => error!(%uuid, error = %err, "confirmation email failed"),
            }
        }))
    }

    pub fn verify_in_background(&self) -> Option<JoinHandle<()>> {
        let mailer = self.mailer.clone()?;
        Some(tokio::task::spawn_blocking(move || match mailer.verify() {
            Ok(()) => info!("smtp verify ok"),
            Err(err) => error!(error = %err, "smtp verify failed"),
        }))
    }
}
