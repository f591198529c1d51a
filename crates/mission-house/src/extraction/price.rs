//! Price-range extraction.

use super::{element_text, first_match, select_first, Strategy};
use crate::types::PriceRange;
use regex::Regex;
use scraper::Html;

/// Document view the price strategies read from.
pub struct PriceSource<'a> {
    pub document: &'a Html,
    pub text: &'a str,
}

/// Extract the listing price: the "Indicative price" statement first, then
/// any price-classed element.
pub fn extract_price<'a>(source: &PriceSource<'a>) -> PriceRange {
    let strategies: [Strategy<PriceSource<'a>, String>; 2] = [
        indicative_price as Strategy<PriceSource<'a>, String>,
        price_element as Strategy<PriceSource<'a>, String>,
    ];
    match first_match(source, &strategies) {
        Some(display) => {
            let mut range = parse_price(&display);
            range.display_text = display;
            range
        }
        None => PriceRange::default(),
    }
}

fn indicative_price(source: &PriceSource<'_>) -> Option<String> {
    let re = Regex::new(
        r"(?i)Indicative price:\s*\$?([\d,]+(?:\.\d{2})?)\s*-\s*\$?([\d,]+(?:\.\d{2})?)",
    )
    .expect("indicative price regex is valid");
    re.find(source.text).map(|m| m.as_str().to_string())
}

fn price_element(source: &PriceSource<'_>) -> Option<String> {
    select_first(source.document, r#"[class*="price"]"#).map(|el| element_text(&el))
}

/// Parse every `$`-prefixed amount in `text`.
///
/// One amount gives `min == max`; several give the smallest and largest;
/// none leaves both ends empty.
pub fn parse_price(text: &str) -> PriceRange {
    let re = Regex::new(r"\$[\d,]+").expect("dollar amount regex is valid");
    let amounts: Vec<u64> = re
        .find_iter(text)
        .filter_map(|m| {
            let digits: String = m.as_str().chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        })
        .collect();

    PriceRange {
        min: amounts.iter().copied().min(),
        max: amounts.iter().copied().max(),
        display_text: String::new(),
    }
}
