//! Listing-page extraction and validation.
//!
//! The listing summarises its features in one accessibility label on the
//! features list ("House with 3 bedrooms, 2 bathrooms, 2 car spaces and
//! 650m² land size"). That label is the primary source for rooms, area and
//! property type. Each count falls back to its own labelled element, then to
//! the visible page text.

use super::auction::parse_auction;
use super::price::{extract_price, PriceSource};
use super::{body_text, element_text, first_match, select_first, Strategy};
use crate::error::{AcquireError, Result};
use crate::types::PropertyRecord;
use chrono::NaiveDate;
use regex::Regex;
use scraper::Html;

const ADDRESS_SELECTOR: &str = r#".property-info-address, h1[class*="address"]"#;
const FEATURES_SELECTOR: &str = r#"[class*="primary-features"], ul[aria-label]"#;
const CANONICAL_SELECTOR: &str = r#"link[rel="canonical"]"#;

/// Parsed listing page shared by the field strategies.
pub struct ListingPage {
    document: Html,
    text: String,
    features_label: String,
}

impl ListingPage {
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let text = body_text(&document);
        let features_label = select_first(&document, FEATURES_SELECTOR)
            .and_then(|el| el.value().attr("aria-label").map(str::to_string))
            .unwrap_or_default();
        Self {
            document,
            text,
            features_label,
        }
    }

    /// Visible text of the page body.
    pub fn text(&self) -> &str {
        &self.text
    }

    fn label_capture(&self, pattern: &str) -> Option<u32> {
        let re = Regex::new(pattern).expect("feature label regex is valid");
        re.captures(&self.features_label)
            .and_then(|c| c[1].parse().ok())
            .filter(|n| *n > 0)
    }

    fn element_number(&self, selector: &str) -> Option<u32> {
        let el = select_first(&self.document, selector)?;
        let re = Regex::new(r"(\d+)").expect("number regex is valid");
        let text = element_text(&el);
        re.captures(&text).and_then(|c| c[1].parse().ok())
    }

    fn text_capture(&self, pattern: &str) -> Option<u32> {
        let re = Regex::new(pattern).expect("page text regex is valid");
        re.captures(&self.text).and_then(|c| c[1].parse().ok())
    }
}

fn bedrooms_from_label(p: &ListingPage) -> Option<u32> {
    p.label_capture(r"(?i)(\d+)\s*bedroom")
}
fn bedrooms_from_element(p: &ListingPage) -> Option<u32> {
    p.element_number(r#"[aria-label*="bedroom"] p, [aria-label*="bedroom"]"#)
}
fn bedrooms_from_text(p: &ListingPage) -> Option<u32> {
    p.text_capture(r"(?i)(\d+)\s*bed(?:room)?s?\b")
}

fn bathrooms_from_label(p: &ListingPage) -> Option<u32> {
    p.label_capture(r"(?i)(\d+)\s*bathroom")
}
fn bathrooms_from_element(p: &ListingPage) -> Option<u32> {
    p.element_number(r#"[aria-label*="bathroom"] p, [aria-label*="bathroom"]"#)
}
fn bathrooms_from_text(p: &ListingPage) -> Option<u32> {
    p.text_capture(r"(?i)(\d+)\s*bath(?:room)?s?\b")
}

fn car_spaces_from_label(p: &ListingPage) -> Option<u32> {
    p.label_capture(r"(?i)(\d+)\s*car")
}
fn car_spaces_from_element(p: &ListingPage) -> Option<u32> {
    p.element_number(r#"[aria-label*="car"] p, [aria-label*="car"]"#)
}
fn car_spaces_from_text(p: &ListingPage) -> Option<u32> {
    p.text_capture(r"(?i)(\d+)\s*car\s*(?:space|park)s?\b")
}

fn land_from_label(p: &ListingPage) -> Option<u32> {
    p.label_capture(r"(?i)(\d+)m²")
}
fn land_from_element(p: &ListingPage) -> Option<u32> {
    p.element_number(r#"[aria-label*="land size"] p, [aria-label*="m²"]"#)
}
fn land_from_text(p: &ListingPage) -> Option<u32> {
    p.text_capture(r"(\d+)\s*m²")
}

fn property_type(p: &ListingPage) -> Option<String> {
    let re = Regex::new(r"(?i)^(\w+)\s+with").expect("property type regex is valid");
    re.captures(&p.features_label).map(|c| c[1].to_string())
}

fn address(p: &ListingPage) -> Option<String> {
    select_first(&p.document, ADDRESS_SELECTOR)
        .map(|el| element_text(&el))
        .filter(|a| !a.is_empty())
}

fn canonical_url(p: &ListingPage) -> Option<String> {
    select_first(&p.document, CANONICAL_SELECTOR)
        .and_then(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(str::to_string)
}

/// Extract a listing record from page HTML.
///
/// `source_url` is used when the page carries no canonical link. Auction
/// dates resolve against `today`.
pub fn extract_property(html: &str, source_url: &str, today: NaiveDate) -> PropertyRecord {
    let page = ListingPage::parse(html);
    let mut record = PropertyRecord::blank();

    record.url = canonical_url(&page).unwrap_or_else(|| source_url.to_string());
    record.address = address(&page).unwrap_or_default();

    let bedrooms: [Strategy<ListingPage, u32>; 3] =
        [bedrooms_from_label, bedrooms_from_element, bedrooms_from_text];
    let bathrooms: [Strategy<ListingPage, u32>; 3] =
        [bathrooms_from_label, bathrooms_from_element, bathrooms_from_text];
    let car_spaces: [Strategy<ListingPage, u32>; 3] =
        [car_spaces_from_label, car_spaces_from_element, car_spaces_from_text];
    let land: [Strategy<ListingPage, u32>; 3] = [land_from_label, land_from_element, land_from_text];

    record.rooms.bedrooms = first_match(&page, &bedrooms).unwrap_or(0);
    record.rooms.bathrooms = first_match(&page, &bathrooms).unwrap_or(0);
    record.rooms.car_spaces = first_match(&page, &car_spaces).unwrap_or(0);
    record.floor_plan.land_size = first_match(&page, &land);
    record.property_type = property_type(&page).unwrap_or_default();

    record.price = extract_price(&PriceSource {
        document: &page.document,
        text: &page.text,
    });
    record.auction_date = parse_auction(&page.text, today);

    record
}

/// A record is usable when it has an address and at least one of
/// bedrooms or bathrooms.
pub fn validate_property(record: &PropertyRecord) -> Result<()> {
    let mut errors = Vec::new();
    if record.address.trim().is_empty() {
        errors.push("Address is required".to_string());
    }
    if record.rooms.bedrooms == 0 && record.rooms.bathrooms == 0 {
        errors.push("Room information could not be extracted".to_string());
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AcquireError::Validation { errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuctionDate;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()
    }

    const LISTING: &str = r#"<!doctype html>
<html><head>
  <link rel="canonical" href="https://www.realestate.com.au/property-house-vic-mount+waverley-145000000">
</head><body>
  <h1 class="property-info-address">12 Example Street, Mount Waverley, Vic 3149</h1>
  <ul class="property-info__primary-features" aria-label="House with 4 bedrooms, 2 bathrooms, 2 car spaces and 650m² land size">
    <li><p>4</p></li><li><p>2</p></li><li><p>2</p></li>
  </ul>
  <div class="property-price">Indicative price: $1,250,000 - $1,350,000</div>
  <p>Auction Saturday 14 March at 11:00 am</p>
</body></html>"#;

    #[test]
    fn test_full_listing() {
        let record = extract_property(LISTING, "https://example.test/listing", today());
        assert_eq!(
            record.url,
            "https://www.realestate.com.au/property-house-vic-mount+waverley-145000000"
        );
        assert_eq!(record.address, "12 Example Street, Mount Waverley, Vic 3149");
        assert_eq!(record.rooms.bedrooms, 4);
        assert_eq!(record.rooms.bathrooms, 2);
        assert_eq!(record.rooms.car_spaces, 2);
        assert_eq!(record.floor_plan.land_size, Some(650));
        assert_eq!(record.property_type, "House");
        assert_eq!(record.price.min, Some(1_250_000));
        assert_eq!(record.price.max, Some(1_350_000));
        assert_eq!(
            record.price.display_text,
            "Indicative price: $1,250,000 - $1,350,000"
        );
        assert_eq!(
            record.auction_date,
            Some(AuctionDate::Date(NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()))
        );
        assert!(validate_property(&record).is_ok());
    }

    #[test]
    fn test_dedicated_element_fallback() {
        let html = r#"<body>
            <h1 class="listing-address">3/8 Side Road, Ashwood</h1>
            <div aria-label="3 bedrooms"><p>3</p></div>
            <div aria-label="1 bathroom"><p>1</p></div>
            <div aria-label="land size 420 m²"><p>420</p></div>
        </body>"#;
        let record = extract_property(html, "https://example.test/p", today());
        assert_eq!(record.url, "https://example.test/p");
        assert_eq!(record.address, "3/8 Side Road, Ashwood");
        assert_eq!(record.rooms.bedrooms, 3);
        assert_eq!(record.rooms.bathrooms, 1);
        assert_eq!(record.floor_plan.land_size, Some(420));
        assert_eq!(record.property_type, "");
    }

    #[test]
    fn test_text_fallback_end_to_end() {
        let html = r#"<body>
            <h1 class="property-info-address">5 Plain Court, Burwood</h1>
            <p>3 bedroom, 2 bathroom family home close to schools.</p>
            <p>Indicative price: $900,000 - $950,000</p>
        </body>"#;
        let record = extract_property(html, "https://example.test/p", today());
        assert_eq!(record.rooms.bedrooms, 3);
        assert_eq!(record.rooms.bathrooms, 2);
        assert_eq!(record.price.min, Some(900_000));
        assert_eq!(record.price.max, Some(950_000));
        assert!(record.auction_date.is_none());
    }

    #[test]
    fn test_validation_messages() {
        let mut record = PropertyRecord::blank();
        match validate_property(&record) {
            Err(AcquireError::Validation { errors }) => assert_eq!(
                errors,
                vec![
                    "Address is required".to_string(),
                    "Room information could not be extracted".to_string()
                ]
            ),
            other => panic!("expected validation error, got {other:?}"),
        }

        record.address = "1 Test St".into();
        match validate_property(&record) {
            Err(AcquireError::Validation { errors }) => {
                assert_eq!(errors, vec!["Room information could not be extracted".to_string()])
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        record.rooms.bathrooms = 1;
        assert!(validate_property(&record).is_ok());
    }
}
