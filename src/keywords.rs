//! Keyword heuristics: which trending terms look like products, and how to
//! clean a term before it goes into a marketplace search.

/// Words that suggest someone is shopping (review, compare, recommended,
/// model number, lowest price).
const SHOPPING_HINTS: &[&str] = &["レビュー", "比較", "おすすめ", "型番", "最安値"];

/// Terms with Latin letters count as product-like up to this many chars.
const MAX_LATIN_TERM_CHARS: usize = 20;

/// Sanitized keywords are cut to this many chars.
const MAX_KEYWORD_CHARS: usize = 120;

/// Word count kept when a search is rejected for an over-long keyword.
const SHORTENED_WORDS: usize = 6;

fn is_katakana(c: char) -> bool {
    ('\u{30A0}'..='\u{30FF}').contains(&c)
}

fn is_hiragana(c: char) -> bool {
    ('\u{3040}'..='\u{309F}').contains(&c)
}

fn is_cjk_ideograph(c: char) -> bool {
    ('\u{4E00}'..='\u{9FFF}').contains(&c)
}

fn is_digit(c: char) -> bool {
    c.is_ascii_digit() || ('０'..='９').contains(&c)
}

/// Two or more digits in a row, as in "iPhone16" or "WH-1000XM5".
fn has_model_number(term: &str) -> bool {
    let chars: Vec<char> = term.chars().collect();
    chars.windows(2).any(|w| is_digit(w[0]) && is_digit(w[1]))
}

/// Whether a trending term plausibly names a product.
///
/// Celebrity names and news events are mostly written in kanji/hiragana;
/// products tend to carry katakana, Latin letters, or model numbers.
pub fn is_productish(term: &str) -> bool {
    let t = term.trim();
    let len = t.chars().count();
    if len <= 1 {
        return false;
    }
    if has_model_number(t) {
        return true;
    }
    if t.chars().any(is_katakana) {
        return true;
    }
    if SHOPPING_HINTS.iter().any(|hint| t.contains(hint)) {
        return true;
    }
    t.chars().any(|c| c.is_ascii_alphabetic()) && len <= MAX_LATIN_TERM_CHARS
}

/// Clean a term for the marketplace search API.
///
/// Whitespace (including the ideographic space) collapses to single spaces;
/// anything that is not a word char, kana, kanji, `-` or `+` becomes a space.
pub fn sanitize_keyword(term: &str) -> String {
    let mapped: String = term
        .chars()
        .map(|c| {
            let keep = c.is_alphanumeric()
                || c == '_'
                || c == '-'
                || c == '+'
                || is_hiragana(c)
                || is_katakana(c)
                || is_cjk_ideograph(c);
            if keep && !c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    let collapsed = mapped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .chars()
        .take(MAX_KEYWORD_CHARS)
        .collect::<String>()
        .trim_end()
        .to_string()
}

/// Keep only the first few words of a keyword.
pub fn shorten_keyword(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .take(SHORTENED_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_char_is_not_productish() {
        assert!(!is_productish("A"));
        assert!(!is_productish("  ア  "));
        assert!(!is_productish(""));
    }

    #[test]
    fn test_model_numbers_are_productish() {
        assert!(is_productish("iPhone16"));
        assert!(is_productish("WH-1000XM5"));
        assert!(is_productish("新型１２号"));
    }

    #[test]
    fn test_katakana_is_productish() {
        assert!(is_productish("スイッチ"));
        assert!(is_productish("新作ゲーム"));
    }

    #[test]
    fn test_shopping_hints() {
        assert!(is_productish("掃除機 比較"));
        assert!(is_productish("炊飯器おすすめ"));
    }

    #[test]
    fn test_latin_length_limit() {
        assert!(is_productish("Pixel"));
        assert!(!is_productish("a very long latin phrase over limit"));
    }

    #[test]
    fn test_plain_kanji_news_is_filtered() {
        assert!(!is_productish("大谷翔平"));
        assert!(!is_productish("台風 進路"));
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_keyword("  ゲーム\u{3000}\u{3000}機  本体 "), "ゲーム 機 本体");
    }

    #[test]
    fn test_sanitize_strips_punctuation() {
        assert_eq!(sanitize_keyword("【速報】Switch2 発売!!"), "速報 Switch2 発売");
        // The katakana middle dot sits inside the katakana block and stays.
        assert_eq!(sanitize_keyword("ポケモン・カード"), "ポケモン・カード");
        assert_eq!(sanitize_keyword("C++ / C-3PO"), "C++ C-3PO");
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "あ".repeat(300);
        assert_eq!(sanitize_keyword(&long).chars().count(), 120);
    }

    #[test]
    fn test_shorten_keyword() {
        assert_eq!(shorten_keyword("a b c d e f g h"), "a b c d e f");
        assert_eq!(shorten_keyword("one two"), "one two");
    }
}
