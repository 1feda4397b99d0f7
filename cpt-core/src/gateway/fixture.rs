//! Replays a recorded gateway answer set from a JSON document.
//!
//! ```json
//! {
//!   "historical": [{"period": "2010-01", "value": 273.15}],
//!   "models": {
//!     "ACCESS-CM2": {"ssp585": [{"period": "2010-01", "value": 283.15}]}
//!   }
//! }
//! ```
//!
//! Values are raw Kelvin, exactly as the live service returns them.

use super::{
    DataGateway, DistinctRequest, PeriodValue, PointMeanRequest, HISTORICAL_COLLECTION,
    MODEL_FIELD, PROJECTION_COLLECTION, SCENARIO_FIELD,
};
use crate::{error::GatewayError, year_month::YearMonth};
use async_trait::async_trait;
use serde::Deserialize;
use std::{collections::BTreeMap, path::Path};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FixtureGateway {
    #[serde(default)]
    pub historical: Vec<PeriodValue>,
    /// model id -> scenario id -> rows
    #[serde(default)]
    pub models: BTreeMap<String, BTreeMap<String, Vec<PeriodValue>>>,
}

impl FixtureGateway {
    pub fn from_json(json: &str) -> Result<FixtureGateway, GatewayError> {
        serde_json::from_str(json).map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<FixtureGateway, GatewayError> {
        let json = std::fs::read_to_string(path.as_ref())
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        FixtureGateway::from_json(&json)
    }

    fn projection_rows(&self, filters: &BTreeMap<String, String>) -> &[PeriodValue] {
        let (Some(model), Some(scenario)) = (filters.get(MODEL_FIELD), filters.get(SCENARIO_FIELD))
        else {
            return &[];
        };
        self.models
            .get(model)
            .and_then(|by_scenario| by_scenario.get(scenario))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[async_trait]
impl DataGateway for FixtureGateway {
    async fn query_point_mean(
        &self,
        request: &PointMeanRequest,
    ) -> Result<Vec<PeriodValue>, GatewayError> {
        let rows = match request.collection.as_str() {
            HISTORICAL_COLLECTION => self.historical.as_slice(),
            PROJECTION_COLLECTION => self.projection_rows(&request.filters),
            other => {
                return Err(GatewayError::Malformed(format!(
                    "unknown collection {other}"
                )))
            }
        };
        // Labels that do not parse are passed through for the caller to reject.
        Ok(rows
            .iter()
            .filter(|row| match row.period.parse::<YearMonth>() {
                Ok(month) => request.start <= month && month <= request.end,
                Err(_) => true,
            })
            .cloned()
            .collect())
    }

    async fn list_distinct(&self, request: &DistinctRequest) -> Result<Vec<String>, GatewayError> {
        if request.collection != PROJECTION_COLLECTION || request.field != MODEL_FIELD {
            return Err(GatewayError::Malformed(format!(
                "unsupported distinct query {}/{}",
                request.collection, request.field
            )));
        }
        let scenario = request.filters.get(SCENARIO_FIELD);
        Ok(self
            .models
            .iter()
            .filter(|(_, by_scenario)| scenario.map_or(true, |s| by_scenario.contains_key(s)))
            .map(|(model, _)| model.clone())
            .collect())
    }
}
