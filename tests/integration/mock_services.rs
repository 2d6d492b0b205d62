//! Mock services for integration testing.
//!
//! Deterministic `TrendSource`, `ItemSearch` and `Mailer` implementations
//! that answer from fixed data and record what they were asked, all
//! in-memory with no network.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use trendmail::mail::{MailError, Mailer, OutgoingReport};
use trendmail::platforms::{ItemHit, ItemSearch, TrendSource};
use trendmail::types::TrendOrigin;

// ---------------------------------------------------------------------------
// Trend source
// ---------------------------------------------------------------------------

/// Returns a fixed keyword list and counts how often it was asked.
pub struct MockTrendSource {
    name: String,
    origin: TrendOrigin,
    keywords: Vec<String>,
    calls: Arc<Mutex<usize>>,
    /// If set, every fetch returns this error.
    force_error: Option<String>,
}

impl MockTrendSource {
    pub fn new(name: &str, origin: TrendOrigin, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            origin,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            calls: Arc::new(Mutex::new(0)),
            force_error: None,
        }
    }

    pub fn failing(name: &str, origin: TrendOrigin, msg: &str) -> Self {
        Self {
            force_error: Some(msg.to_string()),
            ..Self::new(name, origin, &[])
        }
    }

    /// Shared handle to the call counter, readable after the source is boxed.
    pub fn calls(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl TrendSource for MockTrendSource {
    async fn fetch_trending(&self, limit: usize) -> Result<Vec<String>> {
        *self.calls.lock().unwrap() += 1;
        if let Some(msg) = &self.force_error {
            return Err(anyhow!("{msg}"));
        }
        Ok(self.keywords.iter().take(limit).cloned().collect())
    }

    fn origin(&self) -> TrendOrigin {
        self.origin
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ---------------------------------------------------------------------------
// Item search
// ---------------------------------------------------------------------------

/// Answers lookups from a keyword → hit table. Unknown keywords have no hit.
#[derive(Default)]
pub struct MockItemSearch {
    hits: HashMap<String, ItemHit>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl MockItemSearch {
    pub fn with_hit(mut self, keyword: &str, item_code: &str, url: &str) -> Self {
        self.hits.insert(
            keyword.to_string(),
            ItemHit {
                item_code: item_code.to_string(),
                item_name: keyword.to_string(),
                url: url.to_string(),
            },
        );
        self
    }

    pub fn queries(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.queries)
    }
}

#[async_trait]
impl ItemSearch for MockItemSearch {
    async fn first_item(&self, keyword: &str) -> Result<Option<ItemHit>> {
        self.queries.lock().unwrap().push(keyword.to_string());
        Ok(self.hits.get(keyword).cloned())
    }
}

// ---------------------------------------------------------------------------
// Mailer
// ---------------------------------------------------------------------------

/// Records every report it is handed; optionally fails like a dead SMTP server.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingReport>>>,
    fail_with: Option<String>,
}

impl RecordingMailer {
    pub fn failing(msg: &str) -> Self {
        Self {
            fail_with: Some(msg.to_string()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Arc<Mutex<Vec<OutgoingReport>>> {
        Arc::clone(&self.sent)
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, report: &OutgoingReport) -> Result<(), MailError> {
        if let Some(msg) = &self.fail_with {
            return Err(MailError::Smtp(msg.clone()));
        }
        if !report.workbook.exists() {
            return Err(MailError::Io {
                path: report.workbook.clone(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        self.sent.lock().unwrap().push(report.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scratch space
// ---------------------------------------------------------------------------

/// A fresh directory under the system temp dir, removed on drop.
pub struct ScratchDir(pub PathBuf);

impl ScratchDir {
    pub fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("trendmail_it_{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.0.join(name)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
