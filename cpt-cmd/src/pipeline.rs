//! The point query service: validate, look up the cache, retrieve on a
//! miss, then aggregate.

use crate::config::PipelineConfig;
use cpt_cache::{fingerprint, CacheKey, PointCache};
use cpt_core::{
    dataset::{DroppedModel, PointDataset},
    error::{EmptyResult, ParameterError, RetrievalError},
    gateway::DataGateway,
    params::{QueryParameters, Scenario},
    retrieval::Orchestrator,
};
use cpt_data::{aggregate, AggregatedTable, StdDevKind, SummaryMetrics};
use log::{info, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    EmptyResult(#[from] EmptyResult),

    #[error("query was superseded by a newer one")]
    Superseded,
}

/// What one query produces for presentation.
#[derive(Debug, Clone)]
pub struct PointReport {
    pub key: CacheKey,
    pub table: AggregatedTable,
    pub summary: SummaryMetrics,
    /// Models left out of the ensemble under the tolerant policy.
    pub dropped: Vec<DroppedModel>,
}

pub struct Pipeline<G> {
    orchestrator: Orchestrator<G>,
    cache: PointCache<Arc<PointDataset>>,
    std_dev: StdDevKind,
    generation: watch::Sender<u64>,
}

impl<G: DataGateway> Pipeline<G> {
    pub fn new(gateway: G, config: &PipelineConfig) -> Pipeline<G> {
        let (generation, _) = watch::channel(0);
        Pipeline {
            orchestrator: Orchestrator::new(gateway, config.retrieval()),
            cache: PointCache::new(config.cache_ttl(), config.cache_capacity),
            std_dev: config.std_dev,
            generation,
        }
    }

    /// Validate raw inputs and run the query.
    pub async fn query(
        &self,
        lat: f64,
        lon: f64,
        start_year: i32,
        end_year: i32,
        scenario: Scenario,
    ) -> Result<PointReport, PipelineError> {
        let params = QueryParameters::new(lat, lon, start_year, end_year, scenario)?;
        self.run(&params).await
    }

    /// Whether a fresh dataset for `params` is cached.
    pub fn is_cached(&self, params: &QueryParameters) -> bool {
        self.cache.contains(&fingerprint(params))
    }

    fn check_not_empty(&self, dataset: &PointDataset) -> Result<(), EmptyResult> {
        if dataset.model_count() == 0 {
            return Err(EmptyResult::NoModels {
                scenario: dataset.params().scenario().id().to_string(),
            });
        }
        let expects_history = !self
            .orchestrator
            .historical_window(dataset.params())
            .is_empty();
        if expects_history && dataset.observed().is_empty() {
            return Err(EmptyResult::NoHistoricalData);
        }
        Ok(())
    }

    /// Answer `params` from the cache, retrieving the dataset on a miss.
    /// The table and summary are derived fresh on every call. A dataset
    /// with dropped models is returned but not kept, so the next call
    /// asks every model again.
    pub async fn run(&self, params: &QueryParameters) -> Result<PointReport, PipelineError> {
        let key = fingerprint(params);
        let dataset = self
            .cache
            .get_or_try_compute(&key, || async {
                self.orchestrator.retrieve(params).await.map(Arc::new)
            })
            .await?;
        self.check_not_empty(&dataset)?;

        let table = aggregate(&dataset, self.std_dev);
        let summary = SummaryMetrics::from_table(&table);
        if dataset.is_partial() {
            warn!(
                "Ensemble for {} is missing {} of {} models, not caching it",
                key,
                dataset.dropped().len(),
                dataset.dropped().len() + dataset.model_count()
            );
            self.cache.invalidate(&key);
        }
        info!(
            "Query {} ready: {} months, {} models",
            key,
            table.len(),
            table.model_count()
        );
        Ok(PointReport {
            key,
            table,
            summary,
            dropped: dataset.dropped().to_vec(),
        })
    }

    /// Like [`Pipeline::run`], but a later call to `run_interactive` makes
    /// this one return [`PipelineError::Superseded`] and drops its
    /// in-flight queries. Datasets that finished before that stay cached.
    pub async fn run_interactive(
        &self,
        params: &QueryParameters,
    ) -> Result<PointReport, PipelineError> {
        let mut current = 0;
        self.generation.send_modify(|generation| {
            *generation += 1;
            current = *generation;
        });
        let mut newer = self.generation.subscribe();
        let superseded = async move {
            if newer.wait_for(|g| *g != current).await.map(|_| ()).is_err() {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            biased;
            _ = superseded => {
                info!("Query generation {} superseded", current);
                Err(PipelineError::Superseded)
            }
            report = self.run(params) => report,
        }
    }
}
