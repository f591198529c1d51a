//! Structured-field extraction from rendered or retrieved markup.
//!
//! Every field is read through an ordered list of strategies; each returns
//! `Option` and the first `Some` wins. Parsing is synchronous because the
//! `scraper` types are `!Send`: build the document, extract, and drop it
//! before the next await.

pub mod auction;
pub mod naplan;
pub mod price;
pub mod property;
pub mod school;

pub use property::{extract_property, validate_property};

use scraper::{ElementRef, Html, Selector};

/// An ordered fallback chain for one field.
pub type Strategy<C, T> = fn(&C) -> Option<T>;

/// Run `strategies` in order and return the first hit.
pub fn first_match<C, T>(ctx: &C, strategies: &[Strategy<C, T>]) -> Option<T> {
    strategies.iter().find_map(|strategy| strategy(ctx))
}

/// Visible text of an element, whitespace-collapsed.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// All text inside `<body>`.
pub(crate) fn body_text(document: &Html) -> String {
    if let Ok(sel) = Selector::parse("body") {
        if let Some(body) = document.select(&sel).next() {
            return element_text(&body);
        }
    }
    String::new()
}

/// First element matching `selector`, in document order.
pub(crate) fn select_first<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selector).ok()?;
    document.select(&sel).next()
}

/// Leading integer of `text`, like a lenient `parseInt`.
pub(crate) fn leading_int(text: &str) -> Option<u32> {
    let digits: String = text
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_match_order() {
        let strategies: [Strategy<i32, &str>; 3] = [
            |_| None,
            |n| (*n > 0).then_some("positive"),
            |_| Some("fallback"),
        ];
        assert_eq!(first_match(&5, &strategies), Some("positive"));
        assert_eq!(first_match(&-5, &strategies), Some("fallback"));
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int(" 512 (±10)"), Some(512));
        assert_eq!(leading_int("n/a"), None);
        assert_eq!(leading_int(""), None);
    }

    #[test]
    fn test_body_text_collapses_whitespace() {
        let doc = Html::parse_document("<html><body><p>Indicative   price:</p>\n<span>$1</span></body></html>");
        assert_eq!(body_text(&doc), "Indicative price: $1");
    }
}
