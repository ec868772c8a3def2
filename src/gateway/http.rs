use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ClientError;
use crate::gateway::BacktestApi;
use crate::types::*;

/// reqwest-backed client for the backtesting backend. Persistent connection
/// pool; cheap to clone.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
    health_timeout: Duration,
}

impl HttpApi {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let base_url = Url::parse(&config.api_base_url)
            .map_err(|e| ClientError::InvalidField {
                field: "api_base_url",
                reason: format!("{}: {}", config.api_base_url, e),
            })?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidField {
                field: "api_base_url",
                reason: format!("{} is not an http(s) base URL", config.api_base_url),
            });
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!("options-backtester/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            health_timeout: config.health_timeout,
        })
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl BacktestApi for HttpApi {
    async fn health(&self) -> Result<(), ClientError> {
        let resp = self
            .client
            .get(self.endpoint(&["health"]))
            .timeout(self.health_timeout)
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ClientError::Server { status: status.as_u16(), detail: None })
        }
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, ClientError> {
        let url = self.endpoint(&["api", "datasets", "list"]);
        debug!(%url, "listing datasets");
        let resp = self.client.get(url).send().await?;
        let list: DatasetList = read_json(resp).await?;
        Ok(list.datasets)
    }

    async fn dataset_metadata(&self, name: &str) -> Result<DatasetMetadata, ClientError> {
        let url = self.endpoint(&["api", "datasets", name, "metadata"]);
        debug!(%url, "fetching metadata");
        let resp = self.client.get(url).send().await?;
        match read_json(resp).await {
            Err(ClientError::Server { status: 404, detail }) => Err(ClientError::NotFound(
                detail.unwrap_or_else(|| format!("Dataset '{}' not found", name)),
            )),
            other => other,
        }
    }

    async fn validate_strategy(&self, payload: &StrategyPayload) -> Result<ValidationResult, ClientError> {
        let resp = self
            .client
            .post(self.endpoint(&["api", "strategy", "validate"]))
            .json(payload)
            .send()
            .await?;
        read_json(resp).await
    }

    async fn run_backtest(&self, request: &BacktestRequest) -> Result<BacktestResult, ClientError> {
        let resp = self
            .client
            .post(self.endpoint(&["api", "backtest", "run"]))
            .json(request)
            .send()
            .await?;
        let envelope: BacktestEnvelope = read_json(resp).await?;
        envelope_into_result(envelope)
    }
}

/// Read a response body as JSON, mapping non-2xx to `Server` with the
/// structured detail when the body carries one.
async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ClientError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| ClientError::Network(format!("Body error: {}", e)))?;

    if !status.is_success() {
        let detail = extract_detail(&text);
        warn!(status = status.as_u16(), detail = ?detail, "backend returned error status");
        return Err(ClientError::Server { status: status.as_u16(), detail });
    }

    serde_json::from_str(&text).map_err(|e| ClientError::Decode(format!("JSON error: {}", e)))
}

/// Pull a human-readable message out of an error body.
///
/// Accepted shapes: `{"detail": "text"}`, `{"detail": {"message": "text"}}`
/// and request-validation lists `{"detail": [{"msg": "text"}, ...]}`.
fn extract_detail(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    let detail = v.get("detail")?;
    let text = match detail {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Object(obj) => obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(str::to_string),
        serde_json::Value::Array(items) => items
            .iter()
            .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
            .next()
            .map(str::to_string),
        _ => None,
    };
    text.filter(|s| !s.trim().is_empty())
}

fn envelope_into_result(envelope: BacktestEnvelope) -> Result<BacktestResult, ClientError> {
    if envelope.status.as_deref() == Some("error") {
        return Err(ClientError::Server {
            status: StatusCode::OK.as_u16(),
            detail: envelope.message.or(envelope.error_code),
        });
    }
    match (envelope.strategy_summary, envelope.results) {
        (Some(strategy_summary), Some(results)) => Ok(BacktestResult {
            strategy_summary,
            backtest_period: envelope.backtest_period,
            results,
            execution_time_ms: envelope.execution_time_ms,
        }),
        _ => Err(ClientError::Decode(
            "backtest response is missing strategy_summary or results".into(),
        )),
    }
}
