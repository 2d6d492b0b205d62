//! Report delivery by email.
//!
//! `compose` renders the subject and bodies, `smtp` sends through
//! [lettre](https://lettre.rs). The pipeline only sees the `Mailer` trait,
//! so tests can swap in a mock.

pub mod compose;
pub mod smtp;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use smtp::{SmtpMailer, SmtpSecurity};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("failed to read attachment {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("SMTP error: {0}")]
    Smtp(String),
}

/// A fully rendered report mail, ready to hand to a `Mailer`.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingReport {
    pub subject: String,
    pub body_text: String,
    pub body_html: Option<String>,
    /// The spreadsheet; always attached first.
    pub workbook: PathBuf,
    /// Snippet files and anything else, attached after the workbook.
    pub extra_attachments: Vec<PathBuf>,
}

/// MIME type for an attachment, from its file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain; charset=utf-8",
        "htm" | "html" => "text/html; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// Something that can deliver a report mail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, report: &OutgoingReport) -> Result<(), MailError>;
}
