//! Trend fetching with fallback, and keyword → affiliate link resolution.
//!
//! The primary source is asked first; the fallback only runs when the
//! primary yields nothing. Keywords keep their rank in the raw list even
//! after non-product terms are filtered out.

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::keywords::is_productish;
use crate::platforms::amazon::amazon_search_url;
use crate::platforms::{ItemSearch, TrendSource};
use crate::types::{RunClock, TrendOrigin, TrendRecord};

/// Keywords from whichever source answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedTrends {
    pub keywords: Vec<String>,
    pub origin: TrendOrigin,
}

async fn fetch_from(source: &dyn TrendSource, limit: usize) -> Vec<String> {
    match source.fetch_trending(limit).await {
        Ok(keywords) => keywords,
        Err(e) => {
            warn!(source = source.name(), error = %e, "Trend source failed");
            Vec::new()
        }
    }
}

/// Primary first, fallback if the primary is empty. `None` if both are.
pub async fn fetch_with_fallback(
    primary: &dyn TrendSource,
    fallback: &dyn TrendSource,
    limit: usize,
) -> Option<FetchedTrends> {
    let keywords = fetch_from(primary, limit).await;
    if !keywords.is_empty() {
        return Some(FetchedTrends {
            keywords,
            origin: primary.origin(),
        });
    }

    warn!(
        primary = primary.name(),
        fallback = fallback.name(),
        "No trends from primary source; falling back"
    );
    let keywords = fetch_from(fallback, limit).await;
    info!(count = keywords.len(), "Fallback trends fetched");

    if keywords.is_empty() {
        None
    } else {
        Some(FetchedTrends {
            keywords,
            origin: fallback.origin(),
        })
    }
}

/// `(rank, keyword)` pairs worth looking up. Rank is 1-based over the raw list.
pub fn select_candidates(keywords: &[String], no_filter: bool) -> Vec<(u32, String)> {
    keywords
        .iter()
        .enumerate()
        .filter(|(_, kw)| no_filter || is_productish(kw))
        .map(|(i, kw)| (i as u32 + 1, kw.clone()))
        .collect()
}

/// Turns candidate keywords into report rows.
pub struct LinkResolver {
    search: Box<dyn ItemSearch>,
    associate_tag: String,
    pause: Duration,
}

impl LinkResolver {
    pub fn new(search: Box<dyn ItemSearch>, associate_tag: &str, pause: Duration) -> Self {
        Self {
            search,
            associate_tag: associate_tag.to_string(),
            pause,
        }
    }

    /// One record per candidate, in order. A failed lookup leaves the
    /// Rakuten columns empty; the Amazon link is always filled.
    pub async fn resolve(
        &self,
        candidates: &[(u32, String)],
        origin: TrendOrigin,
        clock: &RunClock,
    ) -> Vec<TrendRecord> {
        let timestamp = clock.timestamp();
        let date = clock.date();
        let mut records = Vec::with_capacity(candidates.len());

        for (i, (rank, keyword)) in candidates.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }

            let hit = match self.search.first_item(keyword).await {
                Ok(hit) => hit,
                Err(e) => {
                    warn!(keyword = %keyword, error = %e, "Item lookup failed");
                    None
                }
            };
            let (item_code, rakuten_url) = match hit {
                Some(h) => {
                    debug!(keyword = %keyword, item = %h.item_name, "Rakuten hit");
                    (h.item_code, h.url)
                }
                None => Default::default(),
            };

            let record = TrendRecord {
                timestamp: timestamp.clone(),
                date: date.clone(),
                rank: *rank,
                keyword: keyword.clone(),
                source: origin,
                item_code,
                rakuten_url,
                amazon_url: amazon_search_url(keyword, &self.associate_tag),
            };
            debug!(record = %record, "Resolved");
            records.push(record);
        }

        records
    }
}
