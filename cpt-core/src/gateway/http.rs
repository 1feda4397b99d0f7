use super::{DataGateway, DistinctRequest, PeriodValue, PointMeanRequest};
use crate::error::GatewayError;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;

/// User agent string for gateway requests
pub const USER_AGENT: &str = concat!("cpt-core/", env!("CARGO_PKG_VERSION"));

/// Gateway reached over HTTP with JSON request and response bodies.
///
/// - `POST {base}/v1/point-mean` takes a [`PointMeanRequest`] and answers
///   with a list of [`PeriodValue`]
/// - `POST {base}/v1/distinct` takes a [`DistinctRequest`] and answers with
///   a list of strings
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: &str, timeout: Duration, user_agent: &str) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(HttpGateway {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Makes an HTTP POST request and deserializes the JSON response
    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            return Err(GatewayError::Status(response.status().as_u16()));
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                GatewayError::Malformed(e.to_string())
            } else {
                classify(e)
            }
        })
    }
}

fn classify(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Timeout
    } else if let Some(status) = error.status() {
        GatewayError::Status(status.as_u16())
    } else {
        GatewayError::Transport(error.to_string())
    }
}

#[async_trait]
impl DataGateway for HttpGateway {
    async fn query_point_mean(
        &self,
        request: &PointMeanRequest,
    ) -> Result<Vec<PeriodValue>, GatewayError> {
        self.post("/v1/point-mean", request).await
    }

    async fn list_distinct(&self, request: &DistinctRequest) -> Result<Vec<String>, GatewayError> {
        self.post("/v1/distinct", request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let gateway =
            HttpGateway::new("http://localhost:8080/", Duration::from_secs(5), USER_AGENT).unwrap();
        assert_eq!(gateway.base_url, "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_unreachable_gateway_is_a_transient_failure() {
        let gateway =
            HttpGateway::new("http://127.0.0.1:9", Duration::from_secs(2), USER_AGENT).unwrap();
        let request = DistinctRequest {
            collection: "c".to_string(),
            field: "f".to_string(),
            filters: Default::default(),
        };
        let err = gateway.list_distinct(&request).await.unwrap_err();
        assert!(err.is_transient(), "unexpected error: {err:?}");
    }
}
