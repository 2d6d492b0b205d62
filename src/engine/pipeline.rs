//! The run orchestrator.
//!
//! Ties together trend fetching, link resolution, the spreadsheet report,
//! the CTA snippet files and the report mail. The spreadsheet is always
//! updated before any mail goes out, so a mail failure never costs rows.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

use super::fetcher::{fetch_with_fallback, select_candidates, LinkResolver};
use crate::config::AppConfig;
use crate::mail::compose::{build_bodies, render_subject};
use crate::mail::{Mailer, OutgoingReport};
use crate::platforms::{ItemSearch, TrendSource};
use crate::report::snippets::{build_cta_snippets, write_snippet_files};
use crate::report::ReportFile;
use crate::types::{RunClock, RunOutcome, TrendRecord};

/// Knobs the pipeline needs from the config.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub top_n: usize,
    pub no_filter: bool,
    pub request_pause: Duration,
    pub associate_tag: String,
    pub dedupe_daily: bool,
    pub snippet_dir: PathBuf,
    pub subject_template: String,
}

impl PipelineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            top_n: cfg.trends.top_n,
            no_filter: cfg.trends.no_filter,
            request_pause: Duration::from_millis(cfg.trends.request_pause_ms),
            associate_tag: cfg.amazon.associate_tag.clone(),
            dedupe_daily: cfg.report.dedupe_daily,
            snippet_dir: cfg.report.snippet_dir.clone(),
            subject_template: cfg.email.subject_template().to_string(),
        }
    }
}

pub struct Pipeline {
    primary: Box<dyn TrendSource>,
    fallback: Box<dyn TrendSource>,
    resolver: LinkResolver,
    report: ReportFile,
    /// `None` when mail settings are incomplete or invalid.
    mailer: Option<Box<dyn Mailer>>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        primary: Box<dyn TrendSource>,
        fallback: Box<dyn TrendSource>,
        search: Box<dyn ItemSearch>,
        report: ReportFile,
        mailer: Option<Box<dyn Mailer>>,
        settings: PipelineSettings,
    ) -> Self {
        let resolver = LinkResolver::new(search, &settings.associate_tag, settings.request_pause);
        Self {
            primary,
            fallback,
            resolver,
            report,
            mailer,
            settings,
        }
    }

    /// Run once. Report I/O and mail send failures are errors; everything
    /// upstream of them degrades to "fewer rows".
    pub async fn run(&self, clock: &RunClock) -> Result<RunOutcome> {
        info!(started = %clock.timestamp(), "Run starting");

        let Some(trends) =
            fetch_with_fallback(&*self.primary, &*self.fallback, self.settings.top_n).await
        else {
            warn!("No trends from any source");
            self.report
                .append(&[], self.settings.dedupe_daily)
                .context("Failed to update report")?;
            let emailed = self.deliver(&[], clock, Vec::new()).await?;
            return Ok(RunOutcome::NoTrends { emailed });
        };
        info!(origin = %trends.origin, raw = ?trends.keywords, "Trends (raw)");

        let candidates = select_candidates(&trends.keywords, self.settings.no_filter);
        info!(
            product_like = ?candidates.iter().map(|(_, k)| k.as_str()).collect::<Vec<_>>(),
            "Product-like keywords"
        );

        let records = self
            .resolver
            .resolve(&candidates, trends.origin, clock)
            .await;

        let summary = self
            .report
            .append(&records, self.settings.dedupe_daily)
            .context("Failed to update report")?;

        let snippets = build_cta_snippets(&records);
        let extra = write_snippet_files(&self.settings.snippet_dir, &snippets)?;

        let emailed = self.deliver(&records, clock, extra).await?;

        Ok(RunOutcome::Completed {
            rows: summary.appended,
            emailed,
        })
    }

    /// Send the report mail if a mailer is configured. Returns whether a
    /// mail went out.
    async fn deliver(
        &self,
        records: &[TrendRecord],
        clock: &RunClock,
        extra_attachments: Vec<PathBuf>,
    ) -> Result<bool> {
        let Some(mailer) = &self.mailer else {
            warn!("Email not sent: config incomplete");
            return Ok(false);
        };

        let (body_text, body_html) = build_bodies(records, clock);
        let report = OutgoingReport {
            subject: render_subject(&self.settings.subject_template, clock),
            body_text,
            body_html: Some(body_html),
            workbook: self.report.path().to_path_buf(),
            extra_attachments,
        };

        mailer
            .send(&report)
            .await
            .context("Failed to send report email")?;
        Ok(true)
    }
}
