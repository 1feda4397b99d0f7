//! Pipeline settings, loaded from an optional JSON file.

use anyhow::Context;
use cpt_core::{
    gateway::http::USER_AGENT,
    retrieval::{PartialPolicy, RetrievalConfig, RetryPolicy, HISTORICAL_CUTOFF_DEFAULT},
};
use cpt_data::StdDevKind;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the data gateway, e.g. `https://gateway.example.org`
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            base_url: None,
            timeout_secs: 60,
            user_agent: USER_AGENT.to_string(),
        }
    }
}

/// Every knob of the pipeline. Missing keys in a config file take their
/// default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub historical_cutoff: i32,
    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    pub partial_policy: PartialPolicy,
    pub std_dev: StdDevKind,
    pub gateway: GatewayConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let retrieval = RetrievalConfig::default();
        PipelineConfig {
            historical_cutoff: HISTORICAL_CUTOFF_DEFAULT,
            cache_ttl_secs: cpt_cache::store::DEFAULT_TTL.as_secs(),
            cache_capacity: cpt_cache::store::DEFAULT_CAPACITY,
            max_concurrency: retrieval.max_concurrency,
            retry: retrieval.retry,
            partial_policy: retrieval.partial_policy,
            std_dev: StdDevKind::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> anyhow::Result<PipelineConfig> {
        serde_json::from_str(json).context("Failed to parse pipeline config")
    }

    pub fn from_path(path: impl AsRef<Path>) -> anyhow::Result<PipelineConfig> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        PipelineConfig::from_json(&json)
    }

    pub fn retrieval(&self) -> RetrievalConfig {
        RetrievalConfig {
            historical_cutoff: self.historical_cutoff,
            max_concurrency: self.max_concurrency,
            retry: self.retry,
            partial_policy: self.partial_policy,
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.historical_cutoff, 2022);
        assert_eq!(config.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.cache_capacity, 128);
        assert_eq!(config.retrieval(), RetrievalConfig::default());
        assert_eq!(config.std_dev, StdDevKind::Population);
        assert_eq!(config.gateway.user_agent, USER_AGENT);
    }

    #[test]
    fn test_partial_documents_override_only_their_keys() {
        let config = PipelineConfig::from_json(
            r#"{
                "historical_cutoff": 2020,
                "retry": {"max_attempts": 5},
                "partial_policy": "tolerant",
                "std_dev": "sample",
                "gateway": {"base_url": "http://localhost:8080", "timeout_secs": 5}
            }"#,
        )
        .unwrap();
        assert_eq!(config.historical_cutoff, 2020);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_backoff_ms, 500);
        assert_eq!(config.partial_policy, PartialPolicy::Tolerant);
        assert_eq!(config.std_dev, StdDevKind::Sample);
        assert_eq!(config.gateway.base_url.as_deref(), Some("http://localhost:8080"));
        assert_eq!(config.gateway_timeout(), Duration::from_secs(5));
        assert_eq!(config.max_concurrency, 8);
        assert_eq!(config.retrieval().historical_cutoff, 2020);
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        assert!(PipelineConfig::from_json(r#"{"partial_policy": "lenient"}"#).is_err());
    }
}
