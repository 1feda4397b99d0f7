use crate::ensemble::{EnsembleStats, StdDevKind};
use cpt_core::{dataset::PointDataset, year_month::YearMonth};
use log::debug;
use serde::Serialize;

/// One month of the aggregated table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub month: YearMonth,
    pub observed: Option<f64>,
    /// One value per model, in [`AggregatedTable::model_ids`] order.
    pub models: Vec<Option<f64>>,
    pub ensemble: EnsembleStats,
}

/// Observed and projected series aligned on one monthly axis, with
/// ensemble statistics per month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedTable {
    model_ids: Vec<String>,
    rows: Vec<TableRow>,
}

impl AggregatedTable {
    pub fn model_ids(&self) -> &[String] {
        &self.model_ids
    }

    pub fn model_count(&self) -> usize {
        self.model_ids.len()
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All values of one model column, or `None` for an unknown model.
    pub fn model_column(&self, model_id: &str) -> Option<Vec<Option<f64>>> {
        let index = self.model_ids.iter().position(|id| id == model_id)?;
        Some(self.rows.iter().map(|row| row.models[index]).collect())
    }
}

/// Align a dataset on the axis `start_year-01 ..= end_year-12` and compute
/// per-month ensemble statistics over the model columns.
///
/// Series are matched to the axis by month, so a series that starts late,
/// ends early or has gaps only leaves `None` in the months it lacks. The
/// observed column never enters the ensemble statistics.
pub fn aggregate(dataset: &PointDataset, std_dev: StdDevKind) -> AggregatedTable {
    let model_ids: Vec<String> = dataset.model_ids().map(str::to_string).collect();
    let projected: Vec<_> = dataset.projected().values().collect();

    let rows: Vec<TableRow> = dataset
        .params()
        .months()
        .map(|month| {
            let models: Vec<Option<f64>> =
                projected.iter().map(|series| series.get(&month)).collect();
            let present: Vec<f64> = models.iter().flatten().copied().collect();
            TableRow {
                month,
                observed: dataset.observed().get(&month),
                ensemble: EnsembleStats::from_values(&present, std_dev),
                models,
            }
        })
        .collect();

    debug!(
        "Aggregated {} months across {} models",
        rows.len(),
        model_ids.len()
    );
    AggregatedTable { model_ids, rows }
}
