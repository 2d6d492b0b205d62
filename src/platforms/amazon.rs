//! Amazon.co.jp search links.
//!
//! No API access is involved: the associate programme accepts a tagged
//! search URL, so every keyword gets a link even when Rakuten finds nothing.

const SEARCH_URL: &str = "https://www.amazon.co.jp/s";

/// Form-encode a query value (`+` for spaces, like an HTML form).
fn encode_query_value(value: &str) -> String {
    urlencoding::encode(value).replace("%20", "+")
}

/// Search URL for `keyword`, tagged with the associate id when one is set.
pub fn amazon_search_url(keyword: &str, associate_tag: &str) -> String {
    let mut url = format!("{SEARCH_URL}?k={}", encode_query_value(keyword));
    if !associate_tag.is_empty() {
        url.push_str("&tag=");
        url.push_str(&encode_query_value(associate_tag));
    }
    url
}
