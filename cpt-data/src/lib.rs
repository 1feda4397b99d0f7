//! Month alignment, ensemble statistics and export for point climate data.
//!
//! Takes a [`cpt_core::dataset::PointDataset`] and derives the
//! [`table::AggregatedTable`] shown to users, its
//! [`summary::SummaryMetrics`] and a CSV rendition.

pub mod ensemble;
pub mod export;
pub mod summary;
pub mod table;

pub use ensemble::{EnsembleStats, StdDevKind};
pub use summary::SummaryMetrics;
pub use table::{aggregate, AggregatedTable, TableRow};
