use crate::table::AggregatedTable;
use serde::Serialize;

/// Headline numbers for one point query.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SummaryMetrics {
    /// Mean of every observed month.
    pub historical_mean: Option<f64>,
    /// Mean of the per-month ensemble means.
    pub ensemble_mean: Option<f64>,
    pub model_count: usize,
    /// Mean of the per-month ensemble standard deviations.
    pub ensemble_spread: Option<f64>,
}

fn mean_of(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

impl SummaryMetrics {
    pub fn from_table(table: &AggregatedTable) -> SummaryMetrics {
        let rows = table.rows();
        SummaryMetrics {
            historical_mean: mean_of(rows.iter().map(|row| row.observed)),
            ensemble_mean: mean_of(rows.iter().map(|row| row.ensemble.mean)),
            model_count: table.model_count(),
            ensemble_spread: mean_of(rows.iter().map(|row| row.ensemble.std_dev)),
        }
    }
}
