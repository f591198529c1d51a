//! Catchment-school result extraction.

use super::{element_text, select_first};
use crate::config::SchoolFlowConfig;
use crate::types::{SchoolRecord, SchoolType};
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

/// Raw result panel contents as read from the page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchoolPanel {
    pub header: Option<String>,
    #[serde(default)]
    pub segments: Vec<String>,
    pub distance: Option<String>,
    #[serde(default)]
    pub details: Vec<DetailRow>,
}

/// One `th`/`td` row of the school details table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetailRow {
    pub label: String,
    pub value: String,
    /// `href` of the first link in the value cell.
    pub link: Option<String>,
}

impl DetailRow {
    fn from_row(row: &ElementRef<'_>) -> Option<Self> {
        let th = Selector::parse("th").ok()?;
        let td = Selector::parse("td").ok()?;
        let a = Selector::parse("a[href]").ok()?;
        let label = row.select(&th).next()?;
        let value = row.select(&td).next()?;
        Some(Self {
            label: element_text(&label),
            link: value
                .select(&a)
                .next()
                .and_then(|link| link.value().attr("href"))
                .map(str::to_string),
            value: element_text(&value),
        })
    }
}

impl SchoolPanel {
    /// In-page routine returning a [`SchoolPanel`] for the configured selectors.
    pub fn evaluator(config: &SchoolFlowConfig) -> String {
        let quote = |s: &str| serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string());
        format!(
            r#"(() => {{
    const text = el => el ? el.textContent.trim() : null;
    const header = text(document.querySelector({header}));
    const segments = Array.from(document.querySelectorAll({segments})).map(el => el.textContent.trim());
    const distance = text(document.querySelector({distance}));
    const details = Array.from(document.querySelectorAll({rows})).flatMap(row => {{
        const th = row.querySelector('th');
        const td = row.querySelector('td');
        if (!th || !td) return [];
        const a = td.querySelector('a[href]');
        return [{{ label: text(th), value: text(td), link: a ? a.href : null }}];
    }});
    return {{ header, segments, distance, details }};
}})()"#,
            header = quote(&config.result_header),
            segments = quote(&config.address_segments),
            distance = quote(&config.distance_selector),
            rows = quote(&config.detail_rows),
        )
    }

    /// Read the panel from static HTML.
    pub fn from_html(html: &str, config: &SchoolFlowConfig) -> Self {
        let document = Html::parse_document(html);
        let header = select_first(&document, &config.result_header).map(|el| element_text(&el));
        let segments = Selector::parse(&config.address_segments)
            .map(|sel| document.select(&sel).map(|el| element_text(&el)).collect())
            .unwrap_or_default();
        let distance = select_first(&document, &config.distance_selector).map(|el| element_text(&el));
        let details = Selector::parse(&config.detail_rows)
            .map(|sel| document.select(&sel).filter_map(|row| DetailRow::from_row(&row)).collect())
            .unwrap_or_default();
        Self {
            header,
            segments,
            distance,
            details,
        }
    }

    /// Value of the first details row whose label contains `needle`
    /// (case-insensitive).
    fn detail(&self, needle: &str) -> Option<&DetailRow> {
        self.details
            .iter()
            .find(|row| row.label.to_lowercase().contains(needle))
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Turn a result panel into a record.
///
/// Address segments are trimmed, blanks dropped, and joined with
/// `separator`; the details table's address row is the fallback. Phone,
/// campus years and website come from the details table. The lookup counts
/// as successful when a school name was read.
pub fn build_school_record(panel: &SchoolPanel, school_type: SchoolType, separator: &str) -> SchoolRecord {
    let name = panel
        .header
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    let parts: Vec<&str> = panel
        .segments
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    let address = (!parts.is_empty())
        .then(|| parts.join(separator))
        .or_else(|| panel.detail("address").and_then(|row| non_blank(&row.value)));
    let distance = panel.distance.as_deref().and_then(non_blank);

    SchoolRecord {
        school_type,
        success: !name.is_empty(),
        name,
        address,
        distance,
        phone: panel.detail("phone").and_then(|row| non_blank(&row.value)),
        years: panel.detail("campus years").and_then(|row| non_blank(&row.value)),
        website: panel
            .detail("website")
            .and_then(|row| row.link.as_deref())
            .and_then(non_blank),
        looked_up_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PANEL: &str = r#"<body>
        <div id="SchoolInfo">
          <h2 id="SchoolInfo-header"> Mount Waverley Primary School </h2>
          <div class="address"><span>2 Park Lane</span><span> </span><span>Mount Waverley VIC 3149</span></div>
          <table>
            <tr><th>Phone</th><td> 03 9807 1234 </td></tr>
            <tr><th>Campus Years</th><td>Prep - Year 6</td></tr>
            <tr><th>Website</th><td><a href="https://mwps.vic.edu.au">Visit website</a></td></tr>
            <tr><td>no label</td></tr>
          </table>
        </div>
        <div id="NearestSchools"><div class="container"><span class="distance">1.2 km</span></div></div>
    </body>"#;

    #[test]
    fn test_record_from_panel() {
        let config = SchoolFlowConfig::default();
        let panel = SchoolPanel::from_html(PANEL, &config);
        let record = build_school_record(&panel, SchoolType::Primary, &config.address_separator);
        assert!(record.success);
        assert_eq!(record.name, "Mount Waverley Primary School");
        assert_eq!(record.address.as_deref(), Some("2 Park Lane, Mount Waverley VIC 3149"));
        assert_eq!(record.distance.as_deref(), Some("1.2 km"));
        assert_eq!(record.school_type, SchoolType::Primary);
        assert_eq!(record.phone.as_deref(), Some("03 9807 1234"));
        assert_eq!(record.years.as_deref(), Some("Prep - Year 6"));
        assert_eq!(record.website.as_deref(), Some("https://mwps.vic.edu.au"));
    }

    #[test]
    fn test_details_rows_skip_unlabelled() {
        let panel = SchoolPanel::from_html(PANEL, &SchoolFlowConfig::default());
        assert_eq!(panel.details.len(), 3);
        assert_eq!(panel.details[2].label, "Website");
        assert_eq!(panel.details[2].value, "Visit website");
    }

    #[test]
    fn test_address_falls_back_to_details_row() {
        let panel = SchoolPanel {
            header: Some("Ashwood High School".into()),
            details: vec![
                DetailRow {
                    label: "Address".into(),
                    value: "50 Vannam Drive, Ashwood VIC 3147".into(),
                    link: None,
                },
                DetailRow {
                    label: "Website".into(),
                    value: "ashwood.vic.edu.au".into(),
                    link: None,
                },
            ],
            ..SchoolPanel::default()
        };
        let record = build_school_record(&panel, SchoolType::Secondary, ", ");
        assert_eq!(record.address.as_deref(), Some("50 Vannam Drive, Ashwood VIC 3147"));
        assert!(record.website.is_none());
        assert!(record.phone.is_none());
    }

    #[test]
    fn test_missing_distance_and_address() {
        let panel = SchoolPanel {
            header: Some("Ashwood High School".into()),
            segments: vec![],
            distance: None,
            details: vec![],
        };
        let record = build_school_record(&panel, SchoolType::Secondary, ", ");
        assert!(record.success);
        assert!(record.address.is_none());
        assert!(record.distance.is_none());
    }

    #[test]
    fn test_no_header_is_unsuccessful() {
        let record = build_school_record(&SchoolPanel::default(), SchoolType::Primary, ", ");
        assert!(!record.success);
        assert!(record.name.is_empty());
    }

    #[test]
    fn test_evaluator_embeds_selectors() {
        let script = SchoolPanel::evaluator(&SchoolFlowConfig::default());
        assert!(script.contains("\"#SchoolInfo-header\""));
        assert!(script.contains("\"#NearestSchools .container .distance\""));
        assert!(script.contains("\"#SchoolInfo table tr\""));
    }
}
