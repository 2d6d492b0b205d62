//! Subject and body rendering for the report mail.

use crate::markup::escape_html;
use crate::report::snippets::{SNIPPET_HTML, SNIPPET_TXT};
use crate::types::{RunClock, TrendRecord};

/// Fill `{date}` and `{time}` in a subject template.
pub fn render_subject(template: &str, clock: &RunClock) -> String {
    template
        .replace("{date}", &clock.date())
        .replace("{time}", &clock.time())
}

/// Plain-text and HTML bodies for a batch.
///
/// An empty batch gets a short notice that nothing could be fetched and
/// that an empty sheet is attached.
pub fn build_bodies(records: &[TrendRecord], clock: &RunClock) -> (String, String) {
    let stamp = clock.display_stamp();

    if records.is_empty() {
        let notice = "自動送信: トレンドが取得できませんでした。空のシートを添付します。";
        let plain = format!("{notice}\n生成時刻: {stamp}\n");
        let html = format!("<p>{notice}<br>生成時刻: {}</p>", escape_html(&stamp));
        return (plain, html);
    }

    (plain_body(records, &stamp), html_body(records, &stamp))
}

fn plain_body(records: &[TrendRecord], stamp: &str) -> String {
    let mut lines = vec![
        format!("自動送信: 本日のトレンド商品一覧（{stamp}）"),
        format!("件数: {}", records.len()),
        String::new(),
    ];
    for r in records {
        lines.push(format!("- {}", r.keyword));
        if !r.rakuten_url.is_empty() {
            lines.push(format!("   楽天: {}", r.rakuten_url));
        }
        if !r.amazon_url.is_empty() {
            lines.push(format!("   Amazon: {}", r.amazon_url));
        }
    }
    lines.join("\n")
}

fn html_link(url: &str, label: &str) -> String {
    if url.is_empty() {
        String::new()
    } else {
        format!("<a href=\"{}\">{label}</a>", escape_html(url))
    }
}

fn html_body(records: &[TrendRecord], stamp: &str) -> String {
    let rows = records
        .iter()
        .map(|r| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(&r.keyword),
                html_link(&r.rakuten_url, "楽天"),
                html_link(&r.amazon_url, "Amazon"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let note = format!(
        "<p style='color:#555;font-size:12px'>※ はてな<strong>HTMLエディタ</strong>に貼る用のCTAコードを \
         <strong>{SNIPPET_TXT}</strong> と <strong>{SNIPPET_HTML}</strong> で添付しています。\
         iPhoneなら添付を開いて全選択→コピーで貼り付け可能です。</p>"
    );

    format!(
        "<div>\n\
         <p>自動送信: 本日のトレンド商品一覧（{}）</p>\n\
         <p>件数: {}</p>\n\
         <table border=\"1\" cellpadding=\"6\" cellspacing=\"0\" style=\"border-collapse:collapse\">\n\
         <thead><tr><th>キーワード</th><th>楽天</th><th>Amazon</th></tr></thead>\n\
         <tbody>{rows}</tbody>\n\
         </table>\n\
         {note}\n\
         </div>\n",
        escape_html(stamp),
        records.len(),
    )
}
