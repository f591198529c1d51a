//! School quality relative to the state benchmark.
//!
//! Each year level contributes the sum of its five metric scores. The school
//! and the benchmark are averaged independently over the year levels of the
//! school's category that have a nonzero sum; the score is the ratio as a
//! percentage, rounded to one decimal. 100.0 means "at benchmark".
//!
//! A level whose sum is zero counts as unreported rather than as zero, so
//! the first nonzero score at a level can lower the result.

use crate::types::{AssessmentScoreSet, Metric, MetricScores, QualityScore, SchoolType, YearLevel};
use std::collections::BTreeMap;

/// Benchmark scores per year level, in [`Metric::ALL`] order.
const BENCHMARK: [(YearLevel, [u32; 5]); 4] = [
    (YearLevel::Year3, [446, 460, 459, 475, 466]),
    (YearLevel::Year5, [539, 539, 536, 561, 566]),
    (YearLevel::Year7, [584, 592, 581, 592, 616]),
    (YearLevel::Year9, [601, 632, 602, 609, 637]),
];

/// Computes quality scores against a benchmark table.
#[derive(Debug, Clone)]
pub struct QualityScorer {
    benchmark: BTreeMap<YearLevel, MetricScores>,
}

impl Default for QualityScorer {
    fn default() -> Self {
        let benchmark = BENCHMARK
            .iter()
            .map(|(level, scores)| (*level, Metric::ALL.into_iter().zip(scores.iter().copied()).collect()))
            .collect();
        Self { benchmark }
    }
}

impl QualityScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The benchmark scores for one year level.
    pub fn benchmark(&self, level: YearLevel) -> Option<&MetricScores> {
        self.benchmark.get(&level)
    }

    /// Score `scores` for a school of `category`. `None` when either side has
    /// no usable year level.
    pub fn score(&self, scores: &AssessmentScoreSet, category: SchoolType) -> Option<QualityScore> {
        let levels = category.year_levels();
        let school = average_sum(levels.iter().map(|l| scores.level(*l)))?;
        let benchmark = average_sum(levels.iter().map(|l| self.benchmark(*l)))?;
        Some(QualityScore(round1(school / benchmark * 100.0)))
    }
}

fn level_sum(scores: &MetricScores) -> u64 {
    scores.values().map(|s| u64::from(*s)).sum()
}

/// Mean of the nonzero per-level sums.
fn average_sum<'a>(levels: impl Iterator<Item = Option<&'a MetricScores>>) -> Option<f64> {
    let sums: Vec<u64> = levels.flatten().map(level_sum).filter(|s| *s > 0).collect();
    if sums.is_empty() {
        return None;
    }
    Some(sums.iter().map(|s| *s as f64).sum::<f64>() / sums.len() as f64)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
