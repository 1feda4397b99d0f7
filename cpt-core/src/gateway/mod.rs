//! The remote geospatial data service, seen through two narrow queries.
//!
//! The service stores the gridded collections and performs the spatial
//! reduction; this crate only asks it for monthly point means and for the
//! distinct values of a categorical property.

use crate::{error::GatewayError, params::Point, year_month::YearMonth};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod fixture;
#[cfg(feature = "api")]
pub mod http;

/// Historical reanalysis collection (3-hourly land surface model output).
pub const HISTORICAL_COLLECTION: &str = "NASA/GLDAS/V021/NOAH/G025/T3H";

/// Near-surface air temperature band of the historical collection, Kelvin.
pub const HISTORICAL_VARIABLE: &str = "Tair_f_inst";

/// Downscaled projection ensemble collection.
pub const PROJECTION_COLLECTION: &str = "NASA/GDDP-CMIP6";

/// Near-surface air temperature band of the projection collection, Kelvin.
pub const PROJECTION_VARIABLE: &str = "tas";

/// Projection property naming the model that produced an image.
pub const MODEL_FIELD: &str = "model";

/// Projection property naming the emissions scenario of an image.
pub const SCENARIO_FIELD: &str = "scenario";

/// Reduction scale in metres around the requested point.
pub const REDUCTION_SCALE_M: u32 = 25_000;

/// Monthly mean of one variable over one collection, reduced at a point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointMeanRequest {
    pub collection: String,
    pub variable: String,
    pub point: Point,
    pub start: YearMonth,
    pub end: YearMonth,
    pub filters: BTreeMap<String, String>,
    pub scale_m: u32,
}

/// Distinct values of a categorical property within a filtered collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistinctRequest {
    pub collection: String,
    pub field: String,
    pub filters: BTreeMap<String, String>,
}

/// One month of a raw gateway answer. `value` is in the collection's
/// native unit and is `None` where the service has no data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodValue {
    pub period: String,
    pub value: Option<f64>,
}

impl PeriodValue {
    pub fn new(period: impl Into<String>, value: f64) -> PeriodValue {
        PeriodValue {
            period: period.into(),
            value: Some(value),
        }
    }
}

#[async_trait]
pub trait DataGateway: Send + Sync {
    async fn query_point_mean(
        &self,
        request: &PointMeanRequest,
    ) -> Result<Vec<PeriodValue>, GatewayError>;

    async fn list_distinct(&self, request: &DistinctRequest) -> Result<Vec<String>, GatewayError>;
}

#[async_trait]
impl<G: DataGateway + ?Sized> DataGateway for std::sync::Arc<G> {
    async fn query_point_mean(
        &self,
        request: &PointMeanRequest,
    ) -> Result<Vec<PeriodValue>, GatewayError> {
        (**self).query_point_mean(request).await
    }

    async fn list_distinct(&self, request: &DistinctRequest) -> Result<Vec<String>, GatewayError> {
        (**self).list_distinct(request).await
    }
}
