//! External service integrations.
//!
//! Defines the two seams the fetcher talks through and their implementations:
//! - Google Trends: primary source of trending keywords
//! - Rakuten Ichiba: ranking (fallback keywords) and item search (affiliate links)
//! - Amazon: search URLs with an associate tag (no API call)

pub mod amazon;
pub mod google_trends;
pub mod rakuten;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::TrendOrigin;

/// A feed of currently trending search keywords.
#[async_trait]
pub trait TrendSource: Send + Sync {
    /// Fetch up to `limit` trending keywords, most popular first.
    ///
    /// A source that is reachable but has nothing to offer returns an
    /// empty list; errors are reserved for failures the caller should see.
    async fn fetch_trending(&self, limit: usize) -> Result<Vec<String>>;

    /// Which origin to stamp on records built from this source.
    fn origin(&self) -> TrendOrigin;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// The first marketplace item matching a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemHit {
    pub item_code: String,
    pub item_name: String,
    /// Affiliate URL when the marketplace issued one, else the plain item URL.
    pub url: String,
}

/// Keyword → marketplace item lookup.
#[async_trait]
pub trait ItemSearch: Send + Sync {
    /// Best item for a keyword, or `None` if nothing usable was found.
    async fn first_item(&self, keyword: &str) -> Result<Option<ItemHit>>;
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------
