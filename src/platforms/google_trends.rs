//! Google Trends integration (primary keyword source).
//!
//! Two unauthenticated feeds are tried in order, and the first one that
//! yields keywords wins:
//! 1. Hot searches: `/trends/hottrends/visualize/internal/data`, a JSON
//!    object keyed by region name (`{"japan": ["...", ...]}`)
//! 2. Daily trends: `/trends/api/dailytrends`, JSON behind a `)]}',` guard
//!
//! Neither feed is a documented API; both fail from time to time, so a
//! failing feed is logged and skipped rather than treated as fatal.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::TrendSource;
use crate::types::TrendOrigin;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://trends.google.com";
const SOURCE_NAME: &str = "google-trends";

/// Anti-JSON-hijacking prefix Google puts in front of API payloads.
const XSSI_GUARD: &str = ")]}'";

/// Region codes → the names the hot-searches feed is keyed by.
const HOT_TREND_REGIONS: &[(&str, &str)] = &[
    ("JP", "japan"),
    ("US", "united_states"),
    ("GB", "united_kingdom"),
    ("KR", "south_korea"),
    ("TW", "taiwan"),
    ("HK", "hong_kong"),
    ("DE", "germany"),
    ("FR", "france"),
];

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DailyTrendsResponse {
    #[serde(default)]
    default: Option<DailyTrendsBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyTrendsBody {
    #[serde(default)]
    trending_searches_days: Vec<TrendingDay>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrendingDay {
    #[serde(default)]
    trending_searches: Vec<TrendingSearch>,
}

#[derive(Debug, Deserialize)]
struct TrendingSearch {
    title: TrendingTitle,
}

#[derive(Debug, Deserialize)]
struct TrendingTitle {
    query: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct GoogleTrendsClient {
    http: Client,
    base_url: String,
    /// Region code, e.g. `JP`.
    geo: String,
    /// Interface language, e.g. `ja-JP`.
    language: String,
    /// Minutes *behind* UTC, as the API expects (JST = -540).
    tz_minutes: i32,
}

impl GoogleTrendsClient {
    pub fn new(geo: &str, language: &str, utc_offset_hours: i32) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (compatible; trendmail/0.1)")
            .build()
            .context("Failed to build HTTP client for Google Trends")?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            geo: geo.to_uppercase(),
            language: language.to_string(),
            tz_minutes: -utc_offset_hours * 60,
        })
    }

    /// Point the client at another host (a mirror or a local test server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Name the hot-searches feed uses for our region.
    fn hot_trend_region(geo: &str) -> String {
        HOT_TREND_REGIONS
            .iter()
            .find(|(code, _)| code.eq_ignore_ascii_case(geo))
            .map(|(_, name)| name.to_string())
            .unwrap_or_else(|| geo.to_lowercase())
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        debug!(url = %url, "Fetching Google Trends feed");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .context("Google Trends request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Google Trends error {status}: {body}");
        }

        resp.text()
            .await
            .context("Failed to read Google Trends response body")
    }

    async fn hot_searches(&self, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/trends/hottrends/visualize/internal/data", self.base_url);
        let body = self.get_text(&url).await?;
        parse_hot_searches(&body, &Self::hot_trend_region(&self.geo), limit)
    }

    async fn daily_trends(&self, limit: usize) -> Result<Vec<String>> {
        let url = format!(
            "{}/trends/api/dailytrends?hl={}&tz={}&geo={}&ns=15",
            self.base_url,
            urlencoding::encode(&self.language),
            self.tz_minutes,
            urlencoding::encode(&self.geo),
        );
        let body = self.get_text(&url).await?;
        parse_daily_trends(&body, limit)
    }
}

/// Keywords for `region` from the hot-searches payload.
fn parse_hot_searches(body: &str, region: &str, limit: usize) -> Result<Vec<String>> {
    let by_region: HashMap<String, Vec<String>> =
        serde_json::from_str(body).context("Failed to parse hot-searches payload")?;

    Ok(by_region
        .get(region)
        .map(|terms| clean_terms(terms.iter().map(String::as_str), limit))
        .unwrap_or_default())
}

/// Keywords from the daily-trends payload, newest day first.
fn parse_daily_trends(body: &str, limit: usize) -> Result<Vec<String>> {
    let json = body
        .trim_start()
        .strip_prefix(XSSI_GUARD)
        .map(|rest| rest.trim_start_matches(',').trim_start())
        .unwrap_or(body);

    let parsed: DailyTrendsResponse =
        serde_json::from_str(json).context("Failed to parse daily-trends payload")?;

    let queries = parsed
        .default
        .map(|d| d.trending_searches_days)
        .unwrap_or_default()
        .into_iter()
        .flat_map(|day| day.trending_searches)
        .map(|s| s.title.query)
        .collect::<Vec<_>>();

    Ok(clean_terms(queries.iter().map(String::as_str), limit))
}

/// Trim, drop blanks, keep the first `limit`.
fn clean_terms<'a>(terms: impl Iterator<Item = &'a str>, limit: usize) -> Vec<String> {
    terms
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .take(limit)
        .collect()
}

// ---------------------------------------------------------------------------
// TrendSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl TrendSource for GoogleTrendsClient {
    async fn fetch_trending(&self, limit: usize) -> Result<Vec<String>> {
        match self.hot_searches(limit).await {
            Ok(terms) if !terms.is_empty() => {
                info!(count = terms.len(), feed = "hot-searches", "Google trends fetched");
                return Ok(terms);
            }
            Ok(_) => warn!(geo = %self.geo, "Hot-searches feed returned nothing"),
            Err(e) => warn!(error = %e, "Hot-searches feed failed"),
        }

        match self.daily_trends(limit).await {
            Ok(terms) => {
                info!(count = terms.len(), feed = "daily-trends", "Google trends fetched");
                Ok(terms)
            }
            Err(e) => {
                warn!(error = %e, "Daily-trends feed failed");
                Ok(Vec::new())
            }
        }
    }

    fn origin(&self) -> TrendOrigin {
        TrendOrigin::Google
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
