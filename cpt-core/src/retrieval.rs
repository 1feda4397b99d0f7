//! Turns query parameters into a [`PointDataset`] by fanning out one
//! historical query and one query per projection model.

use crate::{
    dataset::{DroppedModel, PointDataset},
    error::{GatewayError, Result, RetrievalError, SubQuery},
    gateway::{
        DataGateway, DistinctRequest, PointMeanRequest, HISTORICAL_COLLECTION,
        HISTORICAL_VARIABLE, MODEL_FIELD, PROJECTION_COLLECTION, PROJECTION_VARIABLE,
        REDUCTION_SCALE_M, SCENARIO_FIELD,
    },
    params::{Point, QueryParameters, Scenario},
    series::MonthlySeries,
    year_month::{MonthRange, YearMonth},
};
use futures::future::{join_all, try_join, try_join_all, FutureExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    future::Future,
    sync::Arc,
    time::Duration,
};
use tokio::sync::Semaphore;

/// Last year with observational data in the historical collection.
pub const HISTORICAL_CUTOFF_DEFAULT: i32 = 2022;

/// What to do when some, but not all, model queries fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialPolicy {
    /// Any model failure fails the whole retrieval.
    #[default]
    Strict,
    /// Keep the models that succeeded and record the ones that did not.
    Tolerant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per query, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after every retry.
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub historical_cutoff: i32,
    /// Upper bound on gateway queries in flight at once.
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    pub partial_policy: PartialPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        RetrievalConfig {
            historical_cutoff: HISTORICAL_CUTOFF_DEFAULT,
            max_concurrency: 8,
            retry: RetryPolicy::default(),
            partial_policy: PartialPolicy::default(),
        }
    }
}

/// Stateless apart from its gateway handle and the concurrency limiter,
/// which is shared by every retrieval issued through this orchestrator.
pub struct Orchestrator<G> {
    gateway: G,
    config: RetrievalConfig,
    permits: Arc<Semaphore>,
}

impl<G: DataGateway> Orchestrator<G> {
    pub fn new(gateway: G, config: RetrievalConfig) -> Orchestrator<G> {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Orchestrator {
            gateway,
            config,
            permits,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Months the historical collection is queried for: the start of the
    /// request through the end of the request or the cutoff, whichever
    /// comes first.
    pub fn historical_window(&self, params: &QueryParameters) -> MonthRange {
        let last_year = params.end_year().min(self.config.historical_cutoff);
        MonthRange(
            YearMonth::first_of(params.start_year()),
            YearMonth::last_of(last_year),
        )
    }

    /// Issue a gateway call, retrying transient failures with exponential
    /// backoff. A permit is held only while a call is in flight, never
    /// while sleeping between attempts.
    async fn with_retry<T, F, Fut>(
        &self,
        query: &SubQuery,
        mut call: F,
    ) -> std::result::Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, GatewayError>>,
    {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut sleep_millis = self.config.retry.initial_backoff_ms;

        let mut attempt = 1;
        loop {
            let outcome = {
                let _permit = self
                    .permits
                    .acquire()
                    .await
                    .map_err(|e| GatewayError::Transport(e.to_string()))?;
                call().await
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    warn!(
                        "Attempt {}/{}: {} query failed: {}",
                        attempt, max_attempts, query, e
                    );
                    info!(
                        "Sleeping for {} milliseconds before retry of {} query",
                        sleep_millis, query
                    );
                    tokio::time::sleep(Duration::from_millis(sleep_millis)).await;
                    sleep_millis = sleep_millis.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    warn!("{} query failed after {} attempts: {}", query, attempt, e);
                    return Err(e);
                }
            }
        }
    }

    async fn point_mean(
        &self,
        query: SubQuery,
        request: PointMeanRequest,
    ) -> Result<MonthlySeries> {
        let window = MonthRange(request.start, request.end);
        let fail = |source| RetrievalError::Gateway {
            query: query.clone(),
            source,
        };
        let rows = self
            .with_retry(&query, || self.gateway.query_point_mean(&request))
            .await
            .map_err(fail)?;
        let series = MonthlySeries::from_kelvin_rows(rows, window).map_err(fail)?;
        debug!("{} query returned {} months", query, series.len());
        Ok(series)
    }

    /// Observed monthly means at `point` over `window`. An empty window
    /// issues no query.
    pub async fn fetch_historical(
        &self,
        point: Point,
        window: MonthRange,
    ) -> Result<MonthlySeries> {
        if window.is_empty() {
            info!("Historical window is empty, skipping historical query");
            return Ok(MonthlySeries::new());
        }
        let request = PointMeanRequest {
            collection: HISTORICAL_COLLECTION.to_string(),
            variable: HISTORICAL_VARIABLE.to_string(),
            point,
            start: window.start(),
            end: window.end(),
            filters: BTreeMap::new(),
            scale_m: REDUCTION_SCALE_M,
        };
        self.point_mean(SubQuery::Historical, request).await
    }

    /// Distinct model ids with runs for `scenario`. Blank ids are discarded.
    pub async fn list_models(&self, scenario: Scenario) -> Result<BTreeSet<String>> {
        let request = DistinctRequest {
            collection: PROJECTION_COLLECTION.to_string(),
            field: MODEL_FIELD.to_string(),
            filters: BTreeMap::from([(SCENARIO_FIELD.to_string(), scenario.id().to_string())]),
        };
        let query = SubQuery::ModelList;
        let ids = self
            .with_retry(&query, || self.gateway.list_distinct(&request))
            .await
            .map_err(|source| RetrievalError::Gateway {
                query: query.clone(),
                source,
            })?;
        Ok(ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect())
    }

    /// Projected monthly means of one model at `point` over `window`.
    pub async fn fetch_model(
        &self,
        point: Point,
        window: MonthRange,
        scenario: Scenario,
        model_id: &str,
    ) -> Result<MonthlySeries> {
        let request = PointMeanRequest {
            collection: PROJECTION_COLLECTION.to_string(),
            variable: PROJECTION_VARIABLE.to_string(),
            point,
            start: window.start(),
            end: window.end(),
            filters: BTreeMap::from([
                (SCENARIO_FIELD.to_string(), scenario.id().to_string()),
                (MODEL_FIELD.to_string(), model_id.to_string()),
            ]),
            scale_m: REDUCTION_SCALE_M,
        };
        self.point_mean(SubQuery::Model(model_id.to_string()), request)
            .await
    }

    /// Retrieve the full dataset for `params`: one model listing, then the
    /// historical query and every model query in parallel.
    pub async fn retrieve(&self, params: &QueryParameters) -> Result<PointDataset> {
        let point = params.point();
        let scenario = params.scenario();
        let months = params.months();
        let historical_window = self.historical_window(params);

        let models = self.list_models(scenario).await?;
        info!(
            "Retrieving {} months at ({}, {}) for {} with {} models",
            months.count(),
            point.lat,
            point.lon,
            scenario,
            models.len()
        );

        let historical = self.fetch_historical(point, historical_window);

        match self.config.partial_policy {
            PartialPolicy::Strict => {
                let model_fetches = models.iter().map(|model_id| async move {
                    self.fetch_model(point, months, scenario, model_id)
                        .await
                        .map(|series| (model_id.clone(), series))
                });
                let (observed, projected) =
                    try_join(historical, try_join_all(model_fetches)).await?;
                Ok(PointDataset::new(
                    *params,
                    observed,
                    projected.into_iter().collect(),
                    Vec::new(),
                ))
            }
            PartialPolicy::Tolerant => {
                let model_fetches = models.iter().map(|model_id| async move {
                    (
                        model_id.clone(),
                        self.fetch_model(point, months, scenario, model_id).await,
                    )
                });
                let (observed, outcomes) = try_join(
                    historical,
                    join_all(model_fetches).map(Ok::<_, RetrievalError>),
                )
                .await?;

                let mut projected = BTreeMap::new();
                let mut dropped = Vec::new();
                let mut first_failure = None;
                for (model_id, outcome) in outcomes {
                    match outcome {
                        Ok(series) => {
                            projected.insert(model_id, series);
                        }
                        Err(err) => {
                            warn!("Dropping model {} from the ensemble: {}", model_id, err);
                            let RetrievalError::Gateway { source, .. } = &err;
                            dropped.push(DroppedModel {
                                model_id,
                                reason: source.clone(),
                            });
                            first_failure.get_or_insert(err);
                        }
                    }
                }
                if projected.is_empty() {
                    if let Some(err) = first_failure {
                        return Err(err);
                    }
                }
                Ok(PointDataset::new(*params, observed, projected, dropped))
            }
        }
    }
}
