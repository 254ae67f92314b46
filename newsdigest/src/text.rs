use scraper::Html;

/// Keep at most `max_chars` characters. Counts chars, not bytes, and ignores word boundaries.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Text content of an HTML fragment, entities decoded and tags dropped.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect()
}
