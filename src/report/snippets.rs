//! Copy-ready call-to-action snippets for the blog's HTML editor.
//!
//! One styled button per record that has a link. The raw HTML goes into a
//! `.txt` attachment (paste as-is) and an escaped copy inside `<pre>` goes
//! into an `.html` attachment, which is easier to select-all on a phone.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::markup::escape_html;
use crate::types::TrendRecord;

pub const SNIPPET_TXT: &str = "hatena_cta_snippets.txt";
pub const SNIPPET_HTML: &str = "hatena_cta_snippets.html";

const BUTTON_STYLE: &str = "display:inline-block;padding:12px 16px;background:#2563eb;\
color:#fff;border-radius:8px;text-decoration:none;font-weight:700;";

/// Button caption for a link, by marketplace.
pub fn link_label(url: &str) -> &'static str {
    let u = url.to_lowercase();
    if u.contains("rakuten.co.jp") {
        "楽天で見る"
    } else if u.contains("amazon.co.jp") {
        "Amazonで見る"
    } else {
        "商品を見る"
    }
}

/// Raw (unescaped) HTML snippets, one block per linked record.
pub fn build_cta_snippets(records: &[TrendRecord]) -> String {
    records
        .iter()
        .filter_map(|r| {
            let url = r.primary_url()?;
            Some(format!(
                "<!-- {kw} -->\n\
                 <div style=\"margin:16px 0;\">\n  \
                 <a href=\"{url}\" rel=\"nofollow sponsored\" style=\"{BUTTON_STYLE}\">{label}</a>\n\
                 </div>\n",
                kw = r.keyword.trim(),
                label = link_label(url),
            ))
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Write the `.txt` and `.html` snippet files into `dir`.
///
/// Returns the written paths; nothing is written for empty snippets.
pub fn write_snippet_files(dir: &Path, snippets: &str) -> Result<Vec<PathBuf>> {
    if snippets.is_empty() {
        return Ok(Vec::new());
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create snippet directory {}", dir.display()))?;

    let txt_path = dir.join(SNIPPET_TXT);
    fs::write(&txt_path, snippets)
        .with_context(|| format!("Failed to write {}", txt_path.display()))?;

    let html_path = dir.join(SNIPPET_HTML);
    let wrapper = format!(
        "<!doctype html><meta charset='utf-8'><pre>{}</pre>",
        escape_html(snippets)
    );
    fs::write(&html_path, wrapper)
        .with_context(|| format!("Failed to write {}", html_path.display()))?;

    debug!(dir = %dir.display(), "Snippet files written");
    Ok(vec![txt_path, html_path])
}
