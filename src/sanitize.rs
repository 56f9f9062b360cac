//! HTML sanitization backed by `ammonia`
//!
//! Two policies exist: plain text (empty allow-list, every tag stripped) for
//! names, titles and search terms, and rich text for article bodies.

use std::collections::{HashMap, HashSet};

use ammonia::Builder;

const RICH_TEXT_TAGS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "strong", "em", "u", "ol", "ul", "li", "br", "hr",
    "a", "img", "blockquote", "code", "pre", "div", "span", "table", "thead", "tbody", "tr", "th",
    "td",
];

const GENERIC_ATTRIBUTES: &[&str] = &["class", "style", "id"];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

const STYLE_PROPERTIES: &[&str] = &[
    "text-align",
    "margin",
    "padding",
    "width",
    "height",
    "border",
    "background-color",
    "color",
    "font-size",
    "font-weight",
    "font-style",
    "text-decoration",
    "vertical-align",
    "margin-left",
    "margin-right",
    "float",
    "display",
];

/// Removes every tag, keeping only the text content.
///
/// The contents of `<script>` and `<style>` are dropped entirely.
pub fn strip_markup(input: &str) -> String {
    Builder::empty().clean(input).to_string()
}

/// Cleans article content against the rich-text allow-list.
pub fn clean_rich_text(input: &str) -> String {
    let tag_attributes: HashMap<&str, HashSet<&str>> = HashMap::from([
        ("a", HashSet::from(["href", "title", "target"])),
        ("img", HashSet::from(["src", "alt", "title", "width", "height"])),
        ("td", HashSet::from(["colspan", "rowspan"])),
        ("th", HashSet::from(["colspan", "rowspan", "scope"])),
    ]);

    Builder::default()
        .tags(RICH_TEXT_TAGS.iter().copied().collect())
        .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect())
        .tag_attributes(tag_attributes)
        .url_schemes(URL_SCHEMES.iter().copied().collect())
        .filter_style_properties(STYLE_PROPERTIES.iter().copied().collect())
        .strip_comments(true)
        .clean(input)
        .to_string()
}

/// Truncates `input` to at most `max` characters, respecting char boundaries.
pub fn truncate_chars(input: &str, max: usize) -> String {
    input.chars().take(max).collect()
}

/// Like [`truncate_chars`], for text that came out of [`strip_markup`].
///
/// Sanitized text carries `&`, `<` and `>` as character references, so a cut
/// that lands inside one backs off to the `&` that opens it.
pub fn truncate_escaped(input: &str, max: usize) -> String {
    let mut truncated = truncate_chars(input, max);
    if truncated.len() == input.len() {
        return truncated;
    }
    if let Some(amp) = truncated.rfind('&') {
        if !truncated[amp..].contains(';') {
            truncated.truncate(amp);
        }
    }
    truncated
}
