//! NAPLAN results-table extraction.
//!
//! The in-page evaluator only collects raw table cells and page text; the
//! table choice, column mapping and score bounds live here.

use super::{body_text, element_text, leading_int};
use crate::types::{AssessmentScoreSet, Metric, MetricScores, YearLevel};
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

pub const RESULTS_SOURCE: &str = "myschool.edu.au";

/// In-page routine returning a [`ResultsPage`].
pub const RESULTS_EVALUATOR: &str = r#"(() => {
    const tables = Array.from(document.querySelectorAll('table')).map(table =>
        Array.from(table.querySelectorAll('tr')).map(row =>
            Array.from(row.querySelectorAll('td, th')).map(cell => cell.textContent.trim())
        )
    );
    return { text: document.body ? document.body.innerText : '', tables };
})()"#;

/// Raw contents of a results page: rows of cell texts per table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultsPage {
    pub text: String,
    pub tables: Vec<Vec<Vec<String>>>,
}

impl ResultsPage {
    /// Collect the same data from static HTML.
    pub fn from_html(html: &str) -> Self {
        let document = Html::parse_document(html);
        let (Ok(table_sel), Ok(row_sel), Ok(cell_sel)) = (
            Selector::parse("table"),
            Selector::parse("tr"),
            Selector::parse("td, th"),
        ) else {
            return Self::default();
        };

        let tables = document
            .select(&table_sel)
            .map(|table| {
                table
                    .select(&row_sel)
                    .map(|row| row.select(&cell_sel).map(|c| element_text(&c)).collect())
                    .collect()
            })
            .collect();

        Self {
            text: body_text(&document),
            tables,
        }
    }
}

/// Results year shown on the page (2023 onwards).
pub fn detect_year(text: &str) -> Option<String> {
    let re = Regex::new(r"20(2[3-9]|[3-9]\d)").expect("results year regex is valid");
    re.find(text).map(|m| m.as_str().to_string())
}

/// Build the score set from the first results table that yields any year
/// level.
pub fn parse_results(page: &ResultsPage) -> AssessmentScoreSet {
    let mut scores = AssessmentScoreSet {
        year: detect_year(&page.text),
        source: RESULTS_SOURCE.to_string(),
        ..Default::default()
    };

    for table in &page.tables {
        let Some(header) = table.first() else {
            continue;
        };
        let header_text = header.join(" ").to_lowercase();
        if !header_text.contains("reading") && !header_text.contains("numeracy") {
            continue;
        }

        let columns = column_index(header);
        for row in table {
            if row.len() < 2 {
                continue;
            }
            let Some(level) = YearLevel::from_row_label(&row[0]) else {
                continue;
            };
            let values: MetricScores = columns
                .iter()
                .filter_map(|(metric, idx)| {
                    let score = row.get(*idx).and_then(|cell| leading_int(cell))?;
                    (score > 0 && score < 1000).then_some((*metric, score))
                })
                .collect();
            if !values.is_empty() {
                scores.levels.insert(level, values);
            }
        }

        if !scores.levels.is_empty() {
            break;
        }
    }

    scores
}

/// Metric → column position, from the header cells.
fn column_index(header: &[String]) -> Vec<(Metric, usize)> {
    let mut columns: Vec<(Metric, usize)> = Vec::new();
    for (i, cell) in header.iter().enumerate() {
        if let Some(metric) = Metric::from_header(cell) {
            match columns.iter_mut().find(|(m, _)| *m == metric) {
                // A later header cell for the same metric wins.
                Some(existing) => existing.1 = i,
                None => columns.push((metric, i)),
            }
        }
    }
    columns
}
