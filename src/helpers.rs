//! Text helpers shared by the page extractors
//!
//! - Monster label parsing (display names and numeric ID)
//! - Whitespace/NBSP normalization
//! - Element text collection the way the listing pages need it
//! - Relative URL resolution
//!
//! # Examples
//!
//! ```
//! use ro_asset_scraper::helpers::parse_monster_label;
//!
//! let label = parse_monster_label("Poring / Poring Jr. (#1002)", " / ").unwrap();
//! assert_eq!(label.names, vec!["Poring", "Poring Jr."]);
//! assert_eq!(label.id, "1002");
//! ```

use crate::error::{ScrapeError, ScrapeResult};
use reqwest::Url;
use scraper::{ElementRef, Node};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonsterLabel {
    pub names: Vec<String>,
    pub id: String,
}

/// Parse a grid label such as `Poring / Poring Jr. (#1002)` or `Poring#1002`.
pub fn parse_monster_label(raw: &str, delimiter: &str) -> ScrapeResult<MonsterLabel> {
    let text = normalize_whitespace(raw);

    let (_, id_part) = text
        .rsplit_once('#')
        .ok_or_else(|| ScrapeError::parse(format!("no ID marker in label {:?}", text)))?;
    let id = id_part.trim().trim_end_matches(')').trim().to_string();
    if !is_safe_id(&id) {
        return Err(ScrapeError::parse(format!("unusable ID {:?} in label {:?}", id, text)));
    }

    // Without the parenthesised qualifier the name runs up to the ID marker
    let display = match text.split_once(" (") {
        Some((head, _)) => head,
        None => text.split('#').next().unwrap_or(""),
    };

    let names: Vec<String> = display
        .split(delimiter)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect();
    if names.is_empty() {
        return Err(ScrapeError::parse(format!("no display name in label {:?}", text)));
    }

    Ok(MonsterLabel { names, id })
}

/// IDs become file names, so they must not reach outside the output directory.
pub fn is_safe_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && id.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

/// Replace non-breaking spaces and collapse runs of whitespace.
pub fn normalize_whitespace(s: &str) -> String {
    s.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text nodes under `element`, each trimmed, empties dropped, joined with `separator`.
pub fn element_text(element: &ElementRef, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Text of a block where `<br>` elements are line breaks. Lines are trimmed and
/// empty lines dropped.
pub fn text_with_line_breaks(element: &ElementRef) -> String {
    let mut raw = String::new();
    for node in element.descendants() {
        match node.value() {
            Node::Text(text) => raw.push_str(text),
            Node::Element(el) if el.name().eq_ignore_ascii_case("br") => raw.push('\n'),
            _ => {}
        }
    }
    raw.lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Resolve `href` against the page it was found on; absolute URLs pass through.
pub fn resolve_url(page_url: &str, href: &str) -> String {
    match Url::parse(page_url).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}
