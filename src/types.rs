use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Datasets ───

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct DatasetList {
    #[serde(default)]
    pub datasets: Vec<Dataset>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn clamp(&self, date: NaiveDate) -> NaiveDate {
        date.clamp(self.start, self.end.max(self.start))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Per-dataset market metadata: expiries, strike ladders, valid dates.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub available_expiries: Vec<String>,
    #[serde(default)]
    pub available_strikes: HashMap<String, Vec<f64>>,
    pub date_range: DateRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_count: Option<u64>,
}

impl DatasetMetadata {
    /// Strike ladder for one expiry. Empty when the expiry is unknown.
    pub fn ladder(&self, expiry: &str) -> &[f64] {
        self.available_strikes
            .get(expiry)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_expiry(&self, expiry: &str) -> bool {
        self.available_expiries.iter().any(|e| e == expiry)
    }
}

// ─── Strategy configuration ───

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    #[default]
    Call,
    Put,
}

impl OptionType {
    pub fn toggle(self) -> Self {
        match self {
            OptionType::Call => OptionType::Put,
            OptionType::Put => OptionType::Call,
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "CALL"),
            OptionType::Put => write!(f, "PUT"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionDirection {
    #[default]
    Buy,
    Sell,
}

impl PositionDirection {
    pub fn toggle(self) -> Self {
        match self {
            PositionDirection::Buy => PositionDirection::Sell,
            PositionDirection::Sell => PositionDirection::Buy,
        }
    }
}

impl std::fmt::Display for PositionDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionDirection::Buy => write!(f, "BUY"),
            PositionDirection::Sell => write!(f, "SELL"),
        }
    }
}

/// Which of the two independent drafts a controller owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DraftKind {
    Validation,
    Backtest,
}

impl DraftKind {
    pub fn label(&self) -> &'static str {
        match self {
            DraftKind::Validation => "validate",
            DraftKind::Backtest => "backtest",
        }
    }
}

/// In-progress, user-editable configuration. Empty fields are `None`.
#[derive(Clone, Debug, PartialEq)]
pub struct StrategyDraft {
    pub dataset_name: String,
    pub option_type: OptionType,
    pub strike: Option<f64>,
    pub expiry: Option<String>,
    pub position_direction: PositionDirection,
    pub quantity: u32,
    // Backtest draft only
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Default for StrategyDraft {
    fn default() -> Self {
        Self {
            dataset_name: String::new(),
            option_type: OptionType::Call,
            strike: None,
            expiry: None,
            position_direction: PositionDirection::Buy,
            quantity: 1,
            start_date: None,
            end_date: None,
        }
    }
}

/// Submission-ready single-leg configuration (`POST /api/strategy/validate`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyPayload {
    pub dataset_name: String,
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: String,
    pub position_direction: PositionDirection,
    pub quantity: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Body of `POST /api/backtest/run`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BacktestRequest {
    pub strategy: StrategyPayload,
    pub date_range: RequestDateRange,
}

// ─── Results ───

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub option_type: OptionType,
    pub strike: f64,
    pub expiry: String,
    pub position_direction: PositionDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    pub entry_price: f64,
    pub entry_date: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyPnl {
    pub date: String,
    pub cumulative_pnl: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying_price: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BacktestPeriod {
    pub start_date: String,
    pub end_date: String,
    pub total_days: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub daily_pnl: Vec<DailyPnl>,
    pub final_pnl: f64,
    /// Percent, 0..=100.
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub position_closed: bool,
    pub exit_reason: String,
}

/// A completed, successful backtest. Only this shape is ever published to
/// the handoff slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy_summary: StrategySummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backtest_period: Option<BacktestPeriod>,
    pub results: BacktestMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_time_ms: Option<u64>,
}

/// Wire envelope of `POST /api/backtest/run`. The backend answers 200 with
/// `status: "error"` for dataset-level failures.
#[derive(Debug, Deserialize)]
pub struct BacktestEnvelope {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub strategy_summary: Option<StrategySummary>,
    #[serde(default)]
    pub backtest_period: Option<BacktestPeriod>,
    #[serde(default)]
    pub results: Option<BacktestMetrics>,
    #[serde(default)]
    pub execution_time_ms: Option<u64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

// ─── Connectivity ───

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectivityStatus {
    #[default]
    Checking,
    Healthy,
    Unhealthy,
}

impl ConnectivityStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectivityStatus::Checking => "Checking Backend...",
            ConnectivityStatus::Healthy => "Backend Connected",
            ConnectivityStatus::Unhealthy => "Backend Disconnected",
        }
    }
}
