//! Full pipeline runs: fetch, resolve, append, snippets, mail.

use chrono::{FixedOffset, TimeZone};
use std::time::Duration;

use trendmail::engine::pipeline::{Pipeline, PipelineSettings};
use trendmail::mail::Mailer;
use trendmail::report::{Cell, ReportFile, Sheet, COLUMNS};
use trendmail::report::snippets::{SNIPPET_HTML, SNIPPET_TXT};
use trendmail::types::{RunClock, RunOutcome, TrendOrigin};

use crate::mock_services::{MockItemSearch, MockTrendSource, RecordingMailer, ScratchDir};

fn clock() -> RunClock {
    let jst = FixedOffset::east_opt(9 * 3600).unwrap();
    RunClock::at(jst.with_ymd_and_hms(2026, 10, 18, 7, 45, 0).unwrap())
}

fn settings(dir: &ScratchDir) -> PipelineSettings {
    PipelineSettings {
        top_n: 20,
        no_filter: false,
        request_pause: Duration::ZERO,
        associate_tag: "trendmail-22".into(),
        dedupe_daily: false,
        snippet_dir: dir.0.clone(),
        subject_template: "Trends {date} {time}".into(),
    }
}

fn search() -> MockItemSearch {
    MockItemSearch::default().with_hit(
        "Switch2",
        "shop:10001",
        "https://hb.afl.rakuten.co.jp/hgc/switch2/",
    )
}

fn build(
    dir: &ScratchDir,
    primary: MockTrendSource,
    fallback: MockTrendSource,
    mailer: Option<Box<dyn Mailer>>,
) -> Pipeline {
    Pipeline::new(
        Box::new(primary),
        Box::new(fallback),
        Box::new(search()),
        ReportFile::new(dir.join("trending_affiliates.xlsx")),
        mailer,
        settings(dir),
    )
}

fn google(keywords: &[&str]) -> MockTrendSource {
    MockTrendSource::new("google-mock", TrendOrigin::Google, keywords)
}

fn rakuten(keywords: &[&str]) -> MockTrendSource {
    MockTrendSource::new("rakuten-mock", TrendOrigin::Rakuten, keywords)
}

#[tokio::test]
async fn test_run_appends_expected_rows_and_keeps_existing() {
    let dir = ScratchDir::new();
    let path = dir.join("trending_affiliates.xlsx");

    // An older report with a column we don't know about.
    let mut headers: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    headers.push("memo".into());
    let mut old_row = vec![Cell::Empty; headers.len()];
    old_row[1] = Cell::Text("2026-10-17".into());
    old_row[3] = Cell::Text("iPhone17".into());
    old_row[8] = Cell::Text("keep me".into());
    Sheet { headers, rows: vec![old_row.clone()] }.write(&path).unwrap();

    let mailer = RecordingMailer::default();
    let sent = mailer.sent();
    let pipeline = build(
        &dir,
        google(&["大谷翔平", "Switch2", "台風", "ポケモンカード"]),
        rakuten(&[]),
        Some(Box::new(mailer)),
    );

    let outcome = pipeline.run(&clock()).await.unwrap();
    assert_eq!(outcome, RunOutcome::Completed { rows: 2, emailed: true });
    assert_eq!(outcome.exit_code(), 0);

    let sheet = ReportFile::new(&path).load().unwrap();
    assert_eq!(sheet.rows.len(), 3);
    assert_eq!(sheet.rows[0], old_row);
    assert_eq!(sheet.column_values("memo"), vec!["keep me", "", ""]);
    assert_eq!(
        sheet.column_values("keyword"),
        vec!["iPhone17", "Switch2", "ポケモンカード"]
    );
    assert_eq!(sheet.column_values("rank"), vec!["", "2", "4"]);
    assert_eq!(sheet.column_values("source"), vec!["", "google", "google"]);
    assert_eq!(sheet.column_values("item_code"), vec!["", "shop:10001", ""]);
    assert_eq!(
        sheet.column_values("rakuten_url"),
        vec!["", "https://hb.afl.rakuten.co.jp/hgc/switch2/", ""]
    );
    assert_eq!(
        sheet.column_values("timestamp")[1],
        "2026-10-18 07:45:00+0900"
    );
    assert!(sheet.column_values("amazon_url")[2].ends_with("&tag=trendmail-22"));

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Trends 2026-10-18 07:45");
    assert_eq!(sent[0].workbook, path);
    let names: Vec<_> = sent[0]
        .extra_attachments
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec![SNIPPET_TXT, SNIPPET_HTML]);
}

#[tokio::test]
async fn test_rerun_appends_twice() {
    let dir = ScratchDir::new();

    for _ in 0..2 {
        let pipeline = build(&dir, google(&["Switch2"]), rakuten(&[]), None);
        pipeline.run(&clock()).await.unwrap();
    }

    let sheet = ReportFile::new(dir.join("trending_affiliates.xlsx")).load().unwrap();
    assert_eq!(sheet.column_values("keyword"), vec!["Switch2", "Switch2"]);
}

#[tokio::test]
async fn test_dedupe_daily_skips_same_day_rows() {
    let dir = ScratchDir::new();
    let mut s = settings(&dir);
    s.dedupe_daily = true;

    for _ in 0..2 {
        let pipeline = Pipeline::new(
            Box::new(google(&["Switch2"])),
            Box::new(rakuten(&[])),
            Box::new(search()),
            ReportFile::new(dir.join("trending_affiliates.xlsx")),
            None,
            s.clone(),
        );
        pipeline.run(&clock()).await.unwrap();
    }

    let sheet = ReportFile::new(dir.join("trending_affiliates.xlsx")).load().unwrap();
    assert_eq!(sheet.rows.len(), 1);
}

#[tokio::test]
async fn test_incomplete_mail_config_still_updates_report() {
    let dir = ScratchDir::new();
    let pipeline = build(&dir, google(&["Switch2", "Pixel10"]), rakuten(&[]), None);

    let outcome = pipeline.run(&clock()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed { rows: 2, emailed: false });
    let sheet = ReportFile::new(dir.join("trending_affiliates.xlsx")).load().unwrap();
    assert_eq!(sheet.rows.len(), 2);
    assert!(dir.join(SNIPPET_TXT).exists());
}

#[tokio::test]
async fn test_smtp_failure_after_report_written() {
    let dir = ScratchDir::new();
    let pipeline = build(
        &dir,
        google(&["Switch2"]),
        rakuten(&[]),
        Some(Box::new(RecordingMailer::failing("550 relay denied"))),
    );

    let err = pipeline.run(&clock()).await.unwrap_err();
    assert!(format!("{err:#}").contains("550 relay denied"));

    let sheet = ReportFile::new(dir.join("trending_affiliates.xlsx")).load().unwrap();
    assert_eq!(sheet.column_values("keyword"), vec!["Switch2"]);
}

#[tokio::test]
async fn test_fallback_only_when_primary_empty() {
    let dir = ScratchDir::new();

    // Primary has trends: fallback is never asked.
    let primary = google(&["Switch2"]);
    let fallback = rakuten(&["楽天ランキング商品 ABC123"]);
    let fallback_calls = fallback.calls();
    build(&dir, primary, fallback, None).run(&clock()).await.unwrap();
    assert_eq!(*fallback_calls.lock().unwrap(), 0);

    // Primary fails: fallback rows are tagged with their origin.
    let primary = MockTrendSource::failing("google-mock", TrendOrigin::Google, "429");
    let fallback = rakuten(&["楽天ランキング商品 ABC123"]);
    let fallback_calls = fallback.calls();
    let outcome = build(&dir, primary, fallback, None).run(&clock()).await.unwrap();
    assert_eq!(*fallback_calls.lock().unwrap(), 1);
    assert_eq!(outcome, RunOutcome::Completed { rows: 1, emailed: false });

    let sheet = ReportFile::new(dir.join("trending_affiliates.xlsx")).load().unwrap();
    assert_eq!(sheet.column_values("source"), vec!["google", "rakuten"]);
}

#[tokio::test]
async fn test_no_trends_keeps_header_and_mails_notice() {
    let dir = ScratchDir::new();
    let mailer = RecordingMailer::default();
    let sent = mailer.sent();
    let pipeline = build(&dir, google(&[]), rakuten(&[]), Some(Box::new(mailer)));

    let outcome = pipeline.run(&clock()).await.unwrap();

    assert_eq!(outcome, RunOutcome::NoTrends { emailed: true });
    assert_eq!(outcome.exit_code(), 1);

    let sheet = ReportFile::new(dir.join("trending_affiliates.xlsx")).load().unwrap();
    assert!(sheet.rows.is_empty());
    assert_eq!(sheet.headers, COLUMNS.to_vec());

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].extra_attachments.is_empty());
    assert!(!dir.join(SNIPPET_TXT).exists());
}

#[tokio::test]
async fn test_no_filter_keeps_every_keyword() {
    let dir = ScratchDir::new();
    let mut s = settings(&dir);
    s.no_filter = true;
    let search = MockItemSearch::default();
    let queries = search.queries();

    let pipeline = Pipeline::new(
        Box::new(google(&["大谷翔平", "台風"])),
        Box::new(rakuten(&[])),
        Box::new(search),
        ReportFile::new(dir.join("trending_affiliates.xlsx")),
        None,
        s,
    );
    let outcome = pipeline.run(&clock()).await.unwrap();

    assert_eq!(outcome, RunOutcome::Completed { rows: 2, emailed: false });
    assert_eq!(*queries.lock().unwrap(), vec!["大谷翔平", "台風"]);
}
