use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::engine::form::FormController;
use crate::error::ClientError;
use crate::gateway::BacktestApi;
use crate::handoff::ResultHandoff;
use crate::types::*;

/// Shared request state: busy flag, the single visible error and the
/// latest outcome of each request kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestState {
    /// Calls currently outstanding. Busy while non-zero.
    pub in_flight: u32,
    pub error: Option<String>,
    pub validation: Option<ValidationResult>,
    pub backtest: Option<BacktestResult>,
}

impl RequestState {
    pub fn busy(&self) -> bool {
        self.in_flight > 0
    }
}

/// Runs validate and backtest calls against the backend and owns the state
/// both forms read. Clones share the same state.
///
/// No single-flight guard: overlapping calls all complete and the last
/// response to land wins. For backtests the handoff slot always ends up
/// holding the same result as the state.
#[derive(Clone)]
pub struct RequestOrchestrator {
    api: Arc<dyn BacktestApi>,
    handoff: ResultHandoff,
    state: Arc<watch::Sender<RequestState>>,
    publish_lock: Arc<Mutex<()>>,
}

impl RequestOrchestrator {
    pub fn new(api: Arc<dyn BacktestApi>, handoff: ResultHandoff) -> Self {
        let (tx, _rx) = watch::channel(RequestState::default());
        Self {
            api,
            handoff,
            state: Arc::new(tx),
            publish_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn snapshot(&self) -> RequestState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.state.subscribe()
    }

    pub fn handoff(&self) -> &ResultHandoff {
        &self.handoff
    }

    /// Validate the form's draft. Fails without a network call when the
    /// draft is not ready or incomplete.
    pub async fn validate(&self, form: &FormController) -> Result<ValidationResult, ClientError> {
        let payload = self.validation_payload(form)?;
        self.submit_validation(payload).await
    }

    /// Run a backtest for the form's draft. Fails without a network call when
    /// the draft is not ready or incomplete.
    pub async fn run_backtest(&self, form: &FormController) -> Result<BacktestResult, ClientError> {
        let request = self.backtest_payload(form)?;
        self.submit_backtest(request).await
    }

    /// Precondition half of `validate`. A failure is surfaced in the shared
    /// state without touching the network.
    pub fn validation_payload(&self, form: &FormController) -> Result<StrategyPayload, ClientError> {
        self.precondition(form, |f| f.submission_payload())
    }

    /// Precondition half of `run_backtest`.
    pub fn backtest_payload(&self, form: &FormController) -> Result<BacktestRequest, ClientError> {
        self.precondition(form, |f| f.backtest_request())
    }

    /// Network half of `validate`. Takes an owned payload so it can run on a
    /// spawned task.
    pub async fn submit_validation(&self, payload: StrategyPayload) -> Result<ValidationResult, ClientError> {
        self.begin();
        let outcome = self.api.validate_strategy(&payload).await;
        self.finish(|s| match &outcome {
            Ok(v) => {
                info!(valid = v.valid, entry_price = ?v.entry_price, "validation finished");
                s.error = None;
                s.validation = Some(v.clone());
            }
            Err(e) => {
                warn!(error = %e, "validation failed");
                s.error = Some(e.user_message());
            }
        });
        outcome
    }

    /// Network half of `run_backtest`. A success is published to the handoff
    /// before it lands in state; a publish failure sets the error but keeps
    /// the result.
    pub async fn submit_backtest(&self, request: BacktestRequest) -> Result<BacktestResult, ClientError> {
        self.begin();
        let result = match self.api.run_backtest(&request).await {
            Ok(r) => r,
            Err(e) => {
                self.finish(|s| {
                    warn!(error = %e, "backtest failed");
                    s.error = Some(e.user_message());
                });
                return Err(e);
            }
        };

        // Held across publish and the state update so the slot and the held
        // result follow the same last-write order.
        let _publishing = self.publish_lock.lock().await;
        let published = self.publish(&result).await;
        self.finish(|s| {
            info!(
                final_pnl = result.results.final_pnl,
                win_rate = result.results.win_rate,
                exit_reason = %result.results.exit_reason,
                "backtest finished"
            );
            s.backtest = Some(result.clone());
            s.error = match published {
                Ok(()) => None,
                Err(e) => {
                    warn!(error = %e, "backtest result could not be published");
                    Some(e.user_message())
                }
            };
        });
        Ok(result)
    }

    async fn publish(&self, result: &BacktestResult) -> Result<(), ClientError> {
        let handoff = self.handoff.clone();
        let result = result.clone();
        tokio::task::spawn_blocking(move || handoff.publish(&result))
            .await
            .map_err(|e| ClientError::Storage(format!("publish task failed: {}", e)))?
    }

    /// Build the request body, surfacing a failure in the shared state.
    fn precondition<T>(
        &self,
        form: &FormController,
        build: impl FnOnce(&FormController) -> Result<T, ClientError>,
    ) -> Result<T, ClientError> {
        let result = if form.is_ready() {
            build(form)
        } else {
            Err(ClientError::IncompleteConfiguration(
                "dataset metadata has not loaded yet".into(),
            ))
        };
        if let Err(e) = &result {
            warn!(draft = form.kind().label(), error = %e, "request not sent");
            self.state.send_modify(|s| s.error = Some(e.user_message()));
        }
        result
    }

    fn begin(&self) {
        self.state.send_modify(|s| s.in_flight += 1);
    }

    fn finish(&self, apply: impl FnOnce(&mut RequestState)) {
        self.state.send_modify(|s| {
            s.in_flight = s.in_flight.saturating_sub(1);
            apply(s);
        });
    }
}
