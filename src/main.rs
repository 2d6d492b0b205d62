//! TRENDMAIL entry point.
//!
//! Loads configuration, initialises structured logging (stdout plus the run
//! log), wires the trend sources, marketplace search and mailer into a
//! pipeline, and runs it once. The exit code tells the scheduler how it went:
//! 0 completed, 1 no trends, 2 error.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing::{error, info, warn};

use trendmail::config::AppConfig;
use trendmail::engine::pipeline::{Pipeline, PipelineSettings};
use trendmail::mail::{Mailer, SmtpMailer};
use trendmail::platforms::google_trends::GoogleTrendsClient;
use trendmail::platforms::rakuten::RakutenClient;
use trendmail::report::ReportFile;
use trendmail::types::RunClock;

const EXIT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = AppConfig::default_path();
    let loaded = AppConfig::load(&config_path);

    let log_path = loaded
        .as_ref()
        .map(|cfg| cfg.report.log_path.clone())
        .unwrap_or_else(|_| PathBuf::from("run.log"));
    init_logging(&log_path);

    let mut cfg = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(path = %config_path, error = format!("{e:#}"), "ERROR: config");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    cfg.apply_env_overrides();

    info!(
        config = %config_path,
        report = %cfg.report.path.display(),
        top_n = cfg.trends.top_n,
        geo = %cfg.trends.geo,
        no_filter = cfg.trends.no_filter,
        "TRENDMAIL starting"
    );

    match run(&cfg).await {
        Ok(outcome) => {
            info!(outcome = %outcome, "Done.");
            ExitCode::from(outcome.exit_code() as u8)
        }
        Err(e) => {
            error!(error = format!("{e:#}"), "ERROR");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Build the pipeline from config and run it once.
async fn run(cfg: &AppConfig) -> anyhow::Result<trendmail::types::RunOutcome> {
    let google = GoogleTrendsClient::new(
        &cfg.trends.geo,
        &cfg.trends.language,
        cfg.trends.utc_offset_hours,
    )?;
    let ranking = RakutenClient::new(&cfg.rakuten.application_id, &cfg.rakuten.affiliate_id)?;
    let search = RakutenClient::new(&cfg.rakuten.application_id, &cfg.rakuten.affiliate_id)?;

    let mailer: Option<Box<dyn Mailer>> = if cfg.email.is_enabled() {
        match SmtpMailer::from_config(&cfg.email) {
            Ok(m) => {
                info!(mailer = ?m, "Email enabled");
                Some(Box::new(m))
            }
            Err(e) => {
                warn!(error = %e, "Email config invalid");
                None
            }
        }
    } else {
        None
    };

    let pipeline = Pipeline::new(
        Box::new(google),
        Box::new(ranking),
        Box::new(search),
        ReportFile::new(cfg.report.path.clone()),
        mailer,
        PipelineSettings::from_config(cfg),
    );

    pipeline
        .run(&RunClock::now(cfg.trends.utc_offset_hours))
        .await
}

/// Initialise the `tracing` subscriber: stdout plus the run log file.
fn init_logging(log_path: &Path) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("trendmail=info"));

    let json_logging = std::env::var("TRENDMAIL_LOG_JSON").is_ok();

    let stdout_layer = if json_logging {
        fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    let file_layer = match OpenOptions::new().create(true).append(true).open(log_path) {
        Ok(file) => Some(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        ),
        Err(e) => {
            eprintln!("cannot open run log {}: {e}", log_path.display());
            None
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
}
