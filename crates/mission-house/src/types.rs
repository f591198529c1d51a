//! Records produced by the pipeline.
//!
//! Field names serialize in camelCase to match the JSON file kept by the
//! persistence collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Room counts for a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rooms {
    pub bedrooms: u32,
    pub bathrooms: u32,
    pub car_spaces: u32,
}

/// Price range in whole dollars. Both ends absent when nothing was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRange {
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub display_text: String,
}

/// Land or floor area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorPlan {
    pub land_size: Option<u32>,
    pub unit: String,
}

impl Default for FloorPlan {
    fn default() -> Self {
        Self {
            land_size: None,
            unit: "m²".to_string(),
        }
    }
}

/// Auction date: resolved to a calendar date when the month parsed,
/// otherwise the human-readable text from the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuctionDate {
    Date(chrono::NaiveDate),
    Text(String),
}

/// A property listing extracted from a listing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: String,
    pub address: String,
    pub url: String,
    pub rooms: Rooms,
    pub price: PriceRange,
    pub auction_date: Option<AuctionDate>,
    pub floor_plan: FloorPlan,
    pub property_type: String,
    pub scraped_at: DateTime<Utc>,
}

impl PropertyRecord {
    /// An empty record stamped with a fresh id and the current time.
    pub fn blank() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            address: String::new(),
            url: String::new(),
            rooms: Rooms::default(),
            price: PriceRange::default(),
            auction_date: None,
            floor_plan: FloorPlan::default(),
            property_type: String::new(),
            scraped_at: Utc::now(),
        }
    }

    /// Address key the persistence collaborator dedupes on.
    pub fn normalized_address(&self) -> String {
        normalize_address(&self.address)
    }
}

/// Lowercase, strip punctuation and collapse whitespace.
pub fn normalize_address(address: &str) -> String {
    address
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// School category. Selects which year levels count toward quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchoolType {
    Primary,
    Secondary,
}

impl SchoolType {
    pub const ALL: [SchoolType; 2] = [SchoolType::Primary, SchoolType::Secondary];

    /// The two year levels assessed for this category.
    pub fn year_levels(self) -> [YearLevel; 2] {
        match self {
            SchoolType::Primary => [YearLevel::Year3, YearLevel::Year5],
            SchoolType::Secondary => [YearLevel::Year7, YearLevel::Year9],
        }
    }

    /// Guess the category from a school name.
    pub fn infer_from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("secondary") || lower.contains("high") || lower.contains("college") {
            SchoolType::Secondary
        } else {
            SchoolType::Primary
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchoolType::Primary => "primary",
            SchoolType::Secondary => "secondary",
        }
    }
}

impl fmt::Display for SchoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchoolType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(SchoolType::Primary),
            "secondary" => Ok(SchoolType::Secondary),
            other => Err(format!("unknown school type: {other}")),
        }
    }
}

/// The school zoned for an address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolRecord {
    pub school_type: SchoolType,
    pub name: String,
    pub address: Option<String>,
    pub distance: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Campus year range, e.g. "Prep - Year 6".
    #[serde(default)]
    pub years: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    pub success: bool,
    pub looked_up_at: DateTime<Utc>,
}

/// A NAPLAN year-level cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YearLevel {
    Year3,
    Year5,
    Year7,
    Year9,
}

impl YearLevel {
    pub const ALL: [YearLevel; 4] = [
        YearLevel::Year3,
        YearLevel::Year5,
        YearLevel::Year7,
        YearLevel::Year9,
    ];

    /// Match a results-table row label ("Year 3", "3", ...).
    pub fn from_row_label(label: &str) -> Option<Self> {
        let label = label.trim().to_lowercase();
        Self::ALL.into_iter().find(|level| {
            let n = level.number();
            label.contains(&format!("year {n}")) || label == n.to_string()
        })
    }

    pub fn number(self) -> u8 {
        match self {
            YearLevel::Year3 => 3,
            YearLevel::Year5 => 5,
            YearLevel::Year7 => 7,
            YearLevel::Year9 => 9,
        }
    }
}

/// The five assessed domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Reading,
    Writing,
    Spelling,
    Grammar,
    Numeracy,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Reading,
        Metric::Writing,
        Metric::Spelling,
        Metric::Grammar,
        Metric::Numeracy,
    ];

    /// Match a results-table header cell.
    pub fn from_header(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| text.contains(m.as_str()))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Reading => "reading",
            Metric::Writing => "writing",
            Metric::Spelling => "spelling",
            Metric::Grammar => "grammar",
            Metric::Numeracy => "numeracy",
        }
    }
}

/// Scores for one year level. Missing metrics count as zero.
pub type MetricScores = BTreeMap<Metric, u32>;

/// Assessment results for one school.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentScoreSet {
    pub year: Option<String>,
    pub source: String,
    pub levels: BTreeMap<YearLevel, MetricScores>,
}

impl AssessmentScoreSet {
    pub fn level(&self, level: YearLevel) -> Option<&MetricScores> {
        self.levels.get(&level)
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// `(school average / benchmark average) × 100`, one decimal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QualityScore(pub f64);

/// Outcome of one flow run under the retry orchestrator.
#[derive(Debug, Clone)]
pub struct FlowResult<T> {
    pub success: bool,
    pub payload: Option<T>,
    /// Snapshot captured on the most recent failed attempt, if any.
    pub diagnostic: Option<PathBuf>,
    pub attempts: u32,
}

impl<T> FlowResult<T> {
    pub fn succeeded(payload: T, attempts: u32, diagnostic: Option<PathBuf>) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            diagnostic,
            attempts,
        }
    }
}

/// A school found for a property plus its optional assessment data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolEnrichment {
    pub school: SchoolRecord,
    pub naplan: Option<AssessmentScoreSet>,
    pub quality: Option<QualityScore>,
}

/// School enrichment state of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Schools {
    Found {
        primary: SchoolEnrichment,
        secondary: SchoolEnrichment,
    },
    Skipped,
}

/// A property ready for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedProperty {
    pub property: PropertyRecord,
    pub schools: Schools,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_year_level_from_row_label() {
        assert_eq!(YearLevel::from_row_label("Year 3"), Some(YearLevel::Year3));
        assert_eq!(YearLevel::from_row_label(" 9 "), Some(YearLevel::Year9));
        assert_eq!(YearLevel::from_row_label("YEAR 7 results"), Some(YearLevel::Year7));
        assert_eq!(YearLevel::from_row_label("Year 4"), None);
        assert_eq!(YearLevel::from_row_label("35"), None);
    }

    #[test]
    fn test_metric_from_header() {
        assert_eq!(Metric::from_header("Reading"), Some(Metric::Reading));
        assert_eq!(Metric::from_header(" Grammar & punctuation "), Some(Metric::Grammar));
        assert_eq!(Metric::from_header("Year"), None);
    }

    #[test]
    fn test_school_type_inference() {
        assert_eq!(
            SchoolType::infer_from_name("Ashwood High School"),
            SchoolType::Secondary
        );
        assert_eq!(
            SchoolType::infer_from_name("Box Hill Senior Secondary College"),
            SchoolType::Secondary
        );
        assert_eq!(
            SchoolType::infer_from_name("Mount Waverley Primary School"),
            SchoolType::Primary
        );
        assert_eq!("Secondary".parse::<SchoolType>(), Ok(SchoolType::Secondary));
        assert!("tertiary".parse::<SchoolType>().is_err());
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("12  Smith St., Mount Waverley VIC 3149"),
            "12 smith st mount waverley vic 3149"
        );
    }

    #[test]
    fn test_property_serializes_camel_case() {
        let mut record = PropertyRecord::blank();
        record.rooms.car_spaces = 2;
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["rooms"]["carSpaces"], 2);
        assert_eq!(json["floorPlan"]["unit"], "m²");
        assert!(json["auctionDate"].is_null());
    }
}
