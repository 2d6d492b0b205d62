//! SMTP delivery via lettre.
//!
//! Transport security follows the port: 465 is implicit TLS, 587 and 25
//! upgrade with STARTTLS, anything else is plain SMTP (local relays).
//! Mail sending is never retried; a failure ends the run.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::{content_type_for, MailError, Mailer, OutgoingReport};
use crate::config::EmailConfig;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmtpSecurity {
    /// TLS from the first byte (SMTPS).
    Tls,
    StartTls,
    None,
}

impl SmtpSecurity {
    pub fn for_port(port: u16) -> Self {
        match port {
            465 => SmtpSecurity::Tls,
            587 | 25 => SmtpSecurity::StartTls,
            _ => SmtpSecurity::None,
        }
    }
}

/// Sends report mails through one SMTP server.
pub struct SmtpMailer {
    host: String,
    port: u16,
    security: SmtpSecurity,
    user: String,
    password: SecretString,
    from: Mailbox,
    to: Vec<Mailbox>,
}

impl std::fmt::Debug for SmtpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpMailer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("user", &self.user)
            .field("from", &self.from.to_string())
            .field("to", &self.to.len())
            .finish_non_exhaustive()
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox, MailError> {
    addr.trim()
        .parse::<Mailbox>()
        .map_err(|e| MailError::InvalidAddress(format!("{addr}: {e}")))
}

impl SmtpMailer {
    /// Build a mailer from config. Every required key must be present and
    /// every address must parse.
    pub fn from_config(cfg: &EmailConfig) -> Result<Self, MailError> {
        if let Some(key) = cfg.validate().first() {
            return Err(MailError::MissingConfig(key.to_string()));
        }

        let host = cfg.smtp_host.clone().unwrap_or_default();
        let port = cfg.smtp_port.unwrap_or_default();
        let user = cfg.smtp_user.clone().unwrap_or_default();
        let password = cfg
            .smtp_password
            .as_ref()
            .map(|p| SecretString::new(p.expose_secret().clone()))
            .ok_or_else(|| MailError::MissingConfig("smtp_password".into()))?;

        let from = parse_mailbox(cfg.from.as_deref().unwrap_or_default())?;
        let to = cfg
            .to
            .as_ref()
            .map(|r| r.to_vec())
            .unwrap_or_default()
            .iter()
            .filter(|a| !a.trim().is_empty())
            .map(|a| parse_mailbox(a))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            host,
            port,
            security: SmtpSecurity::for_port(port),
            user,
            password,
            from,
            to,
        })
    }

    pub fn security(&self) -> SmtpSecurity {
        self.security
    }

    async fn attachment(path: &Path) -> Result<SinglePart, MailError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| MailError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "attachment".to_string());
        let content_type = ContentType::parse(content_type_for(path))
            .map_err(|e| MailError::Build(e.to_string()))?;
        Ok(Attachment::new(filename).body(bytes, content_type))
    }

    /// Assemble the MIME message: alternative text/html body, then the
    /// workbook, then the extra attachments.
    pub async fn build_message(&self, report: &OutgoingReport) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(report.subject.clone());
        for to in &self.to {
            builder = builder.to(to.clone());
        }

        let body = match &report.body_html {
            Some(html) => MultiPart::alternative_plain_html(report.body_text.clone(), html.clone()),
            None => MultiPart::alternative().singlepart(SinglePart::plain(report.body_text.clone())),
        };

        let mut mixed = MultiPart::mixed()
            .multipart(body)
            .singlepart(Self::attachment(&report.workbook).await?);
        for extra in &report.extra_attachments {
            mixed = mixed.singlepart(Self::attachment(extra).await?);
        }

        builder
            .multipart(mixed)
            .map_err(|e| MailError::Build(e.to_string()))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let builder = match self.security {
            SmtpSecurity::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host),
            SmtpSecurity::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            }
            SmtpSecurity::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(
                self.host.as_str(),
            )),
        }
        .map_err(|e| MailError::Smtp(e.to_string()))?;

        let mut builder = builder.port(self.port).timeout(Some(SMTP_TIMEOUT));
        if !self.user.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.user.clone(),
                self.password.expose_secret().clone(),
            ));
        }
        Ok(builder.build())
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, report: &OutgoingReport) -> Result<(), MailError> {
        let message = self.build_message(report).await?;
        let transport = self.transport()?;

        transport
            .send(message)
            .await
            .map_err(|e| MailError::Smtp(e.to_string()))?;

        info!(
            recipients = ?self.to.iter().map(|m| m.to_string()).collect::<Vec<_>>(),
            workbook = %report.workbook.display(),
            extra = report.extra_attachments.len(),
            "Email sent"
        );
        Ok(())
    }
}
