//! Rakuten Ichiba Web Service integration.
//!
//! Plays two roles:
//! - `TrendSource`: the overall item ranking, used as fallback keywords
//!   when Google Trends yields nothing
//! - `ItemSearch`: keyword → most-reviewed item, with an affiliate URL
//!
//! API docs: https://webservice.rakuten.co.jp/documentation
//! Auth: `applicationId` query parameter; `affiliateId` makes the API
//! return `affiliateUrl` alongside `itemUrl`.
//! Rate limit: roughly one request per second per application id; the API
//! answers 429 when exceeded.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{ItemHit, ItemSearch, TrendSource};
use crate::keywords::{sanitize_keyword, shorten_keyword};
use crate::types::TrendOrigin;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const BASE_URL: &str = "https://app.rakuten.co.jp/services/api";
const RANKING_PATH: &str = "IchibaItem/Ranking/20170628";
const SEARCH_PATH: &str = "IchibaItem/Search/20220601";
const SOURCE_NAME: &str = "rakuten-ranking";

/// Attempts per keyword search (429s and shortened retries included).
const MAX_SEARCH_ATTEMPTS: u32 = 5;

/// Linear backoff step after a 429.
const RATE_LIMIT_STEP_MS: u64 = 1200;

/// A 400 on a keyword longer than this many chars triggers a shortened retry.
const LONG_KEYWORD_CHARS: usize = 40;

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// Both ranking and search (format=json, formatVersion=1) wrap each item
/// as `{"Item": {...}}`.
#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(rename = "Items", default)]
    items: Vec<ItemWrapper>,
}

#[derive(Debug, Deserialize)]
struct ItemWrapper {
    #[serde(rename = "Item")]
    item: RakutenItem,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RakutenItem {
    #[serde(default)]
    item_code: String,
    #[serde(default)]
    item_name: String,
    #[serde(default)]
    item_url: String,
    #[serde(default)]
    affiliate_url: String,
}

impl RakutenItem {
    fn into_hit(self) -> ItemHit {
        let url = if self.affiliate_url.is_empty() {
            self.item_url
        } else {
            self.affiliate_url
        };
        ItemHit {
            item_code: self.item_code,
            item_name: self.item_name,
            url,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Rakuten Ichiba client.
pub struct RakutenClient {
    http: Client,
    base_url: String,
    application_id: String,
    affiliate_id: String,
    rate_limit_step: Duration,
}

impl RakutenClient {
    /// Create a client. Empty ids are allowed; lookups then degrade to
    /// "nothing found" with a warning instead of failing the run.
    pub fn new(application_id: &str, affiliate_id: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("trendmail/0.1.0")
            .build()
            .context("Failed to build HTTP client for Rakuten")?;

        Ok(Self {
            http,
            base_url: BASE_URL.to_string(),
            application_id: application_id.to_string(),
            affiliate_id: affiliate_id.to_string(),
            rate_limit_step: Duration::from_millis(RATE_LIMIT_STEP_MS),
        })
    }

    /// Point the client at another API host (a staging endpoint or a local
    /// test server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn ranking_url(&self) -> String {
        format!(
            "{}/{RANKING_PATH}?applicationId={}&format=json&genreId=0&page=1",
            self.base_url,
            urlencoding::encode(&self.application_id),
        )
    }

    fn search_url(&self, keyword: &str) -> String {
        format!(
            "{}/{SEARCH_PATH}?applicationId={}&affiliateId={}&format=json&keyword={}&hits=1&sort={}",
            self.base_url,
            urlencoding::encode(&self.application_id),
            urlencoding::encode(&self.affiliate_id),
            urlencoding::encode(keyword),
            urlencoding::encode("-reviewCount"),
        )
    }

    async fn ranking_names(&self, limit: usize) -> Result<Vec<String>> {
        let resp = self
            .http
            .get(self.ranking_url())
            .send()
            .await
            .context("Rakuten ranking request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Rakuten ranking error {status}: {body}");
        }

        let parsed: ItemsResponse = resp
            .json()
            .await
            .context("Failed to parse Rakuten ranking response")?;

        Ok(ranking_names_from(parsed, limit))
    }

    /// One search call. `Ok(Err(status))` hands non-success statuses back to
    /// the retry loop.
    async fn search_once(&self, keyword: &str) -> Result<std::result::Result<Option<ItemHit>, StatusCode>> {
        let resp = self
            .http
            .get(self.search_url(keyword))
            .send()
            .await
            .context("Rakuten search request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = %status, body = %body, "Rakuten search non-success");
            return Ok(Err(status));
        }

        let parsed: ItemsResponse = resp
            .json()
            .await
            .context("Failed to parse Rakuten search response")?;

        Ok(Ok(parsed.items.into_iter().next().map(|w| w.item.into_hit())))
    }
}

fn ranking_names_from(parsed: ItemsResponse, limit: usize) -> Vec<String> {
    parsed
        .items
        .into_iter()
        .map(|w| w.item.item_name)
        .filter(|name| !name.trim().is_empty())
        .take(limit)
        .collect()
}

/// What to do after a non-success search status.
#[derive(Debug, PartialEq, Eq)]
enum SearchRetry {
    Backoff(Duration),
    Shorten,
    GiveUp,
}

fn retry_decision(status: StatusCode, attempt: u32, keyword: &str, step: Duration) -> SearchRetry {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return SearchRetry::Backoff(step * (attempt + 1));
    }
    if status == StatusCode::BAD_REQUEST && keyword.chars().count() > LONG_KEYWORD_CHARS {
        return SearchRetry::Shorten;
    }
    SearchRetry::GiveUp
}

// ---------------------------------------------------------------------------
// TrendSource trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl TrendSource for RakutenClient {
    /// Item names from the overall ranking. Never fails the run: a missing
    /// application id or an API error yields an empty list.
    async fn fetch_trending(&self, limit: usize) -> Result<Vec<String>> {
        if self.application_id.is_empty() {
            warn!("Rakuten application id missing; cannot fall back to Rakuten ranking");
            return Ok(Vec::new());
        }

        match self.ranking_names(limit).await {
            Ok(names) => {
                info!(count = names.len(), "Rakuten ranking fetched");
                Ok(names)
            }
            Err(e) => {
                error!(error = %e, "Rakuten ranking fallback failed");
                Ok(Vec::new())
            }
        }
    }

    fn origin(&self) -> TrendOrigin {
        TrendOrigin::Rakuten
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// ItemSearch trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl ItemSearch for RakutenClient {
    /// Most-reviewed item for a keyword.
    ///
    /// 429 → linear backoff and retry; 400 on a long keyword → retry with
    /// the first few words. Anything else is logged and treated as no hit.
    async fn first_item(&self, keyword: &str) -> Result<Option<ItemHit>> {
        if self.application_id.is_empty() || self.affiliate_id.is_empty() {
            warn!("Rakuten ids not set; skipping Rakuten URL");
            return Ok(None);
        }

        let mut kw = sanitize_keyword(keyword);

        for attempt in 0..MAX_SEARCH_ATTEMPTS {
            let status = match self.search_once(&kw).await {
                Ok(Ok(Some(hit))) => return Ok(Some(hit)),
                Ok(Ok(None)) => {
                    info!(keyword = %kw, "Rakuten: no items");
                    return Ok(None);
                }
                Ok(Err(status)) => status,
                Err(e) => {
                    error!(keyword = %kw, error = %e, "Rakuten API error");
                    return Ok(None);
                }
            };

            match retry_decision(status, attempt, &kw, self.rate_limit_step) {
                SearchRetry::Backoff(wait) => {
                    warn!(
                        attempt = attempt + 1,
                        max = MAX_SEARCH_ATTEMPTS,
                        wait_ms = wait.as_millis() as u64,
                        "Rakuten 429; retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                SearchRetry::Shorten => {
                    kw = shorten_keyword(&kw);
                    warn!(keyword = %kw, "Rakuten 400; shortened keyword and retrying");
                }
                SearchRetry::GiveUp => {
                    error!(keyword = %kw, status = %status, "Rakuten API HTTP error");
                    return Ok(None);
                }
            }
        }

        warn!(keyword = %kw, "Rakuten search gave up after retries");
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
