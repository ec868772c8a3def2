// Shared test fixtures: a scripted backend and canned metadata.
// Only compiled under #[cfg(test)].

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::error::ClientError;
use crate::gateway::BacktestApi;
use crate::types::*;

/// How one scripted health call behaves.
#[derive(Clone, Copy, Debug)]
pub enum HealthReply {
    Ok,
    Fail,
    /// Never answers within any sane timeout.
    Hang,
}

/// In-memory backend with per-endpoint call counters.
#[derive(Default)]
pub struct ScriptedApi {
    pub datasets: Vec<Dataset>,
    pub metadata: HashMap<String, DatasetMetadata>,
    /// Artificial latency per dataset for metadata calls.
    pub metadata_delay: HashMap<String, Duration>,
    pub validation: Mutex<Option<Result<ValidationResult, ClientError>>>,
    pub backtest: Mutex<Option<Result<BacktestResult, ClientError>>>,
    pub health_script: Mutex<VecDeque<HealthReply>>,

    pub health_calls: AtomicUsize,
    pub metadata_calls: AtomicUsize,
    pub validate_calls: AtomicUsize,
    pub backtest_calls: AtomicUsize,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(mut self, meta: DatasetMetadata) -> Self {
        let name = meta.name.clone().unwrap_or_default();
        self.datasets.push(Dataset { name: name.clone(), record_count: meta.record_count });
        self.metadata.insert(name, meta);
        self
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.metadata_delay.insert(name.to_string(), delay);
        self
    }

    pub fn with_health(self, replies: &[HealthReply]) -> Self {
        *self.health_script.lock() = replies.iter().copied().collect();
        self
    }

    pub fn reply_validation(&self, r: Result<ValidationResult, ClientError>) {
        *self.validation.lock() = Some(r);
    }

    pub fn reply_backtest(&self, r: Result<BacktestResult, ClientError>) {
        *self.backtest.lock() = Some(r);
    }

    pub fn network_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst) + self.backtest_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BacktestApi for ScriptedApi {
    async fn health(&self) -> Result<(), ClientError> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.health_script.lock().pop_front().unwrap_or(HealthReply::Ok);
        match reply {
            HealthReply::Ok => Ok(()),
            HealthReply::Fail => Err(ClientError::Server { status: 503, detail: None }),
            HealthReply::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }

    async fn list_datasets(&self) -> Result<Vec<Dataset>, ClientError> {
        Ok(self.datasets.clone())
    }

    async fn dataset_metadata(&self, name: &str) -> Result<DatasetMetadata, ClientError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.metadata_delay.get(name) {
            tokio::time::sleep(*delay).await;
        }
        self.metadata
            .get(name)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("Dataset '{}' not found", name)))
    }

    async fn validate_strategy(&self, _payload: &StrategyPayload) -> Result<ValidationResult, ClientError> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        self.validation
            .lock()
            .clone()
            .unwrap_or_else(|| Err(ClientError::Network("no scripted validation".into())))
    }

    async fn run_backtest(&self, _request: &BacktestRequest) -> Result<BacktestResult, ClientError> {
        self.backtest_calls.fetch_add(1, Ordering::SeqCst);
        self.backtest
            .lock()
            .clone()
            .unwrap_or_else(|| Err(ClientError::Network("no scripted backtest".into())))
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// SPY_2024: two expiries, ladders [400,410,420] and [405,415].
pub fn spy_2024() -> DatasetMetadata {
    let mut strikes = HashMap::new();
    strikes.insert("2024-06-21".to_string(), vec![400.0, 410.0, 420.0]);
    strikes.insert("2024-07-19".to_string(), vec![405.0, 415.0]);
    DatasetMetadata {
        name: Some("SPY_2024".into()),
        available_expiries: vec!["2024-06-21".into(), "2024-07-19".into()],
        available_strikes: strikes,
        date_range: DateRange { start: date(2024, 1, 2), end: date(2024, 6, 28) },
        record_count: Some(1200),
    }
}

/// QQQ_2024: one expiry, ladder [380,390].
pub fn qqq_2024() -> DatasetMetadata {
    let mut strikes = HashMap::new();
    strikes.insert("2024-09-20".to_string(), vec![380.0, 390.0]);
    DatasetMetadata {
        name: Some("QQQ_2024".into()),
        available_expiries: vec!["2024-09-20".into()],
        available_strikes: strikes,
        date_range: DateRange { start: date(2024, 3, 1), end: date(2024, 9, 20) },
        record_count: Some(400),
    }
}

pub fn sample_backtest() -> BacktestResult {
    BacktestResult {
        strategy_summary: StrategySummary {
            option_type: OptionType::Call,
            strike: 400.0,
            expiry: "2024-06-21".into(),
            position_direction: PositionDirection::Buy,
            quantity: Some(1),
            entry_price: 12.5,
            entry_date: "2024-01-02".into(),
        },
        backtest_period: Some(BacktestPeriod {
            start_date: "2024-01-02".into(),
            end_date: "2024-01-05".into(),
            total_days: 4,
        }),
        results: BacktestMetrics {
            daily_pnl: vec![
                DailyPnl { date: "2024-01-02".into(), cumulative_pnl: 0.0, underlying_price: Some(470.0) },
                DailyPnl { date: "2024-01-03".into(), cumulative_pnl: -35.0, underlying_price: Some(467.2) },
                DailyPnl { date: "2024-01-04".into(), cumulative_pnl: 20.0, underlying_price: Some(472.9) },
                DailyPnl { date: "2024-01-05".into(), cumulative_pnl: 85.5, underlying_price: Some(476.4) },
            ],
            final_pnl: 85.5,
            win_rate: 66.67,
            max_drawdown: 35.0,
            position_closed: false,
            exit_reason: "backtest_end".into(),
        },
        execution_time_ms: Some(18),
    }
}
