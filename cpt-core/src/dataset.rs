use crate::{error::GatewayError, params::QueryParameters, series::MonthlySeries};
use std::collections::BTreeMap;

/// A projection model left out of a tolerant retrieval, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedModel {
    pub model_id: String,
    pub reason: GatewayError,
}

/// Everything retrieved for one query: the observed series and one
/// projected series per model.
///
/// Built once by the retrieval orchestrator and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PointDataset {
    params: QueryParameters,
    observed: MonthlySeries,
    projected: BTreeMap<String, MonthlySeries>,
    dropped: Vec<DroppedModel>,
}

impl PointDataset {
    pub fn new(
        params: QueryParameters,
        observed: MonthlySeries,
        projected: BTreeMap<String, MonthlySeries>,
        dropped: Vec<DroppedModel>,
    ) -> PointDataset {
        PointDataset {
            params,
            observed,
            projected,
            dropped,
        }
    }

    pub fn params(&self) -> &QueryParameters {
        &self.params
    }

    pub fn observed(&self) -> &MonthlySeries {
        &self.observed
    }

    /// Projected series ordered by model id.
    pub fn projected(&self) -> &BTreeMap<String, MonthlySeries> {
        &self.projected
    }

    pub fn model_ids(&self) -> impl Iterator<Item = &str> {
        self.projected.keys().map(String::as_str)
    }

    pub fn model_count(&self) -> usize {
        self.projected.len()
    }

    /// Models that failed under the tolerant policy. Always empty under
    /// the strict policy.
    pub fn dropped(&self) -> &[DroppedModel] {
        &self.dropped
    }

    pub fn is_partial(&self) -> bool {
        !self.dropped.is_empty()
    }
}
