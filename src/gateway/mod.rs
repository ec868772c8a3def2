pub mod http;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{
    BacktestRequest, BacktestResult, Dataset, DatasetMetadata, StrategyPayload, ValidationResult,
};

pub use http::HttpApi;

/// The backend boundary. Everything the client knows about the remote
/// backtester goes through this trait, so tests can script it.
#[async_trait]
pub trait BacktestApi: Send + Sync {
    /// `GET /health`. Any 2xx is healthy.
    async fn health(&self) -> Result<(), ClientError>;

    /// `GET /api/datasets/list`.
    async fn list_datasets(&self) -> Result<Vec<Dataset>, ClientError>;

    /// `GET /api/datasets/{name}/metadata`. Unknown datasets are `NotFound`.
    async fn dataset_metadata(&self, name: &str) -> Result<DatasetMetadata, ClientError>;

    /// `POST /api/strategy/validate`.
    async fn validate_strategy(&self, payload: &StrategyPayload) -> Result<ValidationResult, ClientError>;

    /// `POST /api/backtest/run`. Only a successful envelope becomes `Ok`.
    async fn run_backtest(&self, request: &BacktestRequest) -> Result<BacktestResult, ClientError>;
}
