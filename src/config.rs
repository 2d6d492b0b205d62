//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` (or the path in `TRENDMAIL_CONFIG`) and deserializes
//! into strongly-typed sections. Marketplace credentials may also come from
//! the environment (or a `.env` file); a non-empty environment value wins
//! over the file.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::warn;

/// Default config file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Environment variable that overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "TRENDMAIL_CONFIG";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub rakuten: RakutenConfig,
    #[serde(default)]
    pub amazon: AmazonConfig,
    #[serde(default)]
    pub trends: TrendsConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RakutenConfig {
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub affiliate_id: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AmazonConfig {
    #[serde(default)]
    pub associate_tag: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrendsConfig {
    /// How many trending keywords to request from each source.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// Region code for the trend feeds.
    #[serde(default = "default_geo")]
    pub geo: String,
    #[serde(default = "default_language")]
    pub language: String,
    /// Keep every keyword instead of only product-like ones.
    #[serde(default)]
    pub no_filter: bool,
    /// Pause between per-keyword marketplace lookups.
    #[serde(default = "default_request_pause_ms")]
    pub request_pause_ms: u64,
    /// Local offset used for report timestamps (JST = 9).
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            geo: default_geo(),
            language: default_language(),
            no_filter: false,
            request_pause_ms: default_request_pause_ms(),
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    #[serde(default = "default_report_path")]
    pub path: PathBuf,
    #[serde(default = "default_log_path")]
    pub log_path: PathBuf,
    /// Directory the CTA snippet files are written to.
    #[serde(default = "default_snippet_dir")]
    pub snippet_dir: PathBuf,
    /// Skip new rows whose (date, keyword) is already in the report.
    #[serde(default)]
    pub dedupe_daily: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: default_report_path(),
            log_path: default_log_path(),
            snippet_dir: default_snippet_dir(),
            dedupe_daily: false,
        }
    }
}

/// A single address or a list of addresses.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Recipients::One(addr) => vec![addr.clone()],
            Recipients::Many(addrs) => addrs.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        self.to_vec().iter().all(|a| a.trim().is_empty())
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub smtp_user: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<SecretString>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<Recipients>,
    /// Subject template; `{date}` and `{time}` are filled in at send time.
    #[serde(default)]
    pub subject: Option<String>,
}

pub const DEFAULT_SUBJECT: &str = "トレンド商品レポート（{date} {time}）";

impl EmailConfig {
    /// Names of required keys that are missing or blank.
    pub fn validate(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());

        let mut missing = Vec::new();
        if blank(&self.smtp_host) {
            missing.push("smtp_host");
        }
        if self.smtp_port.map_or(true, |p| p == 0) {
            missing.push("smtp_port");
        }
        if blank(&self.smtp_user) {
            missing.push("smtp_user");
        }
        if self
            .smtp_password
            .as_ref()
            .map_or(true, |p| p.expose_secret().is_empty())
        {
            missing.push("smtp_password");
        }
        if blank(&self.from) {
            missing.push("from");
        }
        if self.to.as_ref().map_or(true, Recipients::is_empty) {
            missing.push("to");
        }
        missing
    }

    /// True when every required key is present. Logs each missing key.
    pub fn is_enabled(&self) -> bool {
        let missing = self.validate();
        for key in &missing {
            warn!(key, "Email config missing key");
        }
        missing.is_empty()
    }

    pub fn subject_template(&self) -> &str {
        self.subject.as_deref().unwrap_or(DEFAULT_SUBJECT)
    }
}

fn default_top_n() -> usize {
    20
}
fn default_geo() -> String {
    "JP".to_string()
}
fn default_language() -> String {
    "ja-JP".to_string()
}
fn default_request_pause_ms() -> u64 {
    800
}
fn default_utc_offset_hours() -> i32 {
    9
}
fn default_report_path() -> PathBuf {
    PathBuf::from("trending_affiliates.xlsx")
}
fn default_log_path() -> PathBuf {
    PathBuf::from("run.log")
}
fn default_snippet_dir() -> PathBuf {
    PathBuf::from(".")
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// The config path: `TRENDMAIL_CONFIG` if set, else `config.toml`.
    pub fn default_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Blank values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("RAKUTEN_APPLICATION_ID") {
            self.rakuten.application_id = v;
        }
        if let Some(v) = get("RAKUTEN_AFFILIATE_ID") {
            self.rakuten.affiliate_id = v;
        }
        if let Some(v) = get("AMAZON_ASSOCIATE_TAG") {
            self.amazon.associate_tag = v;
        }
        if let Some(v) = get("NO_FILTER") {
            self.trends.no_filter = v == "1";
        }
    }
}
