use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Days;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use options_backtester::engine::{FieldUpdate, FormController, RequestOrchestrator};
use options_backtester::error::ClientError;
use options_backtester::gateway::BacktestApi;
use options_backtester::market::MetadataTicket;
use options_backtester::types::*;
use options_backtester::view::ResultsView;

/// Completions delivered back to the event loop.
pub enum AppEvent {
    DatasetsListed(Result<Vec<Dataset>, ClientError>),
    Metadata {
        kind: DraftKind,
        ticket: MetadataTicket,
        outcome: Result<DatasetMetadata, ClientError>,
    },
    Validated(Result<ValidationResult, ClientError>),
    BacktestFinished(Result<BacktestResult, ClientError>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Field {
    Dataset,
    OptionType,
    Expiry,
    Strike,
    Direction,
    Quantity,
    StartDate,
    EndDate,
}

impl Field {
    pub fn label(&self) -> &'static str {
        match self {
            Field::Dataset => "Dataset",
            Field::OptionType => "Option Type",
            Field::Expiry => "Expiry",
            Field::Strike => "Strike",
            Field::Direction => "Position",
            Field::Quantity => "Quantity",
            Field::StartDate => "Start Date",
            Field::EndDate => "End Date",
        }
    }
}

const VALIDATION_FIELDS: &[Field] = &[
    Field::Dataset,
    Field::OptionType,
    Field::Expiry,
    Field::Strike,
    Field::Direction,
    Field::Quantity,
];

const BACKTEST_FIELDS: &[Field] = &[
    Field::Dataset,
    Field::OptionType,
    Field::Expiry,
    Field::Strike,
    Field::Direction,
    Field::Quantity,
    Field::StartDate,
    Field::EndDate,
];

pub fn fields(kind: DraftKind) -> &'static [Field] {
    match kind {
        DraftKind::Validation => VALIDATION_FIELDS,
        DraftKind::Backtest => BACKTEST_FIELDS,
    }
}

pub struct App {
    pub api: Arc<dyn BacktestApi>,
    pub orchestrator: RequestOrchestrator,
    pub tx: mpsc::Sender<AppEvent>,
    pub api_label: String,

    pub validation: FormController,
    pub backtest: FormController,
    pub focus: DraftKind,
    pub cursor: usize,

    pub connectivity: ConnectivityStatus,
    pub results: Option<ResultsView>,
    pub status_msg: Option<(String, Instant)>,
}

impl App {
    pub fn new(
        api: Arc<dyn BacktestApi>,
        orchestrator: RequestOrchestrator,
        tx: mpsc::Sender<AppEvent>,
        api_label: String,
    ) -> Self {
        Self {
            api,
            orchestrator,
            tx,
            api_label,
            validation: FormController::new(DraftKind::Validation),
            backtest: FormController::new(DraftKind::Backtest),
            focus: DraftKind::Validation,
            cursor: 0,
            connectivity: ConnectivityStatus::Checking,
            results: None,
            status_msg: None,
        }
    }

    pub fn form(&self, kind: DraftKind) -> &FormController {
        match kind {
            DraftKind::Validation => &self.validation,
            DraftKind::Backtest => &self.backtest,
        }
    }

    fn form_mut(&mut self, kind: DraftKind) -> &mut FormController {
        match kind {
            DraftKind::Validation => &mut self.validation,
            DraftKind::Backtest => &mut self.backtest,
        }
    }

    pub fn focused_field(&self) -> Field {
        let list = fields(self.focus);
        list[self.cursor.min(list.len() - 1)]
    }

    /// Status line message, shown for a few seconds.
    pub fn notice(&self) -> Option<&str> {
        match &self.status_msg {
            Some((msg, at)) if at.elapsed() < Duration::from_secs(6) => Some(msg),
            _ => None,
        }
    }

    fn set_notice(&mut self, msg: impl Into<String>) {
        self.status_msg = Some((msg.into(), Instant::now()));
    }

    // ─── Background work ───

    pub fn spawn_dataset_list(&self) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = api.list_datasets().await;
            let _ = tx.send(AppEvent::DatasetsListed(outcome)).await;
        });
    }

    fn spawn_metadata(&self, kind: DraftKind, ticket: MetadataTicket) {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = ticket.fetch(api.as_ref()).await;
            let _ = tx.send(AppEvent::Metadata { kind, ticket, outcome }).await;
        });
    }

    fn spawn_validation(&self) {
        let Ok(payload) = self.orchestrator.validation_payload(&self.validation) else {
            return;
        };
        let orchestrator = self.orchestrator.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = orchestrator.submit_validation(payload).await;
            let _ = tx.send(AppEvent::Validated(outcome)).await;
        });
    }

    fn spawn_backtest(&self) {
        let Ok(request) = self.orchestrator.backtest_payload(&self.backtest) else {
            return;
        };
        let orchestrator = self.orchestrator.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = orchestrator.submit_backtest(request).await;
            let _ = tx.send(AppEvent::BacktestFinished(outcome)).await;
        });
    }

    // ─── Completions ───

    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::DatasetsListed(Ok(datasets)) => {
                debug!(count = datasets.len(), "datasets listed");
                if datasets.is_empty() {
                    self.set_notice("Backend reports no datasets");
                }
                for kind in [DraftKind::Validation, DraftKind::Backtest] {
                    if let Some(ticket) = self.form_mut(kind).on_datasets_listed(datasets.clone()) {
                        self.spawn_metadata(kind, ticket);
                    }
                }
            }
            AppEvent::DatasetsListed(Err(e)) => {
                warn!(error = %e, "dataset list failed");
                self.set_notice(format!("Failed to load datasets: {}", e.user_message()));
            }
            AppEvent::Metadata { kind, ticket, outcome } => {
                let form = self.form_mut(kind);
                let error = form
                    .apply_metadata(&ticket, outcome)
                    .then(|| form.last_error().map(str::to_string))
                    .flatten();
                if let Some(err) = error {
                    self.set_notice(err);
                }
            }
            AppEvent::Validated(Ok(v)) => {
                let msg = if v.valid { "Strategy is valid" } else { "Strategy is invalid" };
                self.set_notice(msg);
            }
            AppEvent::BacktestFinished(Ok(_)) => {
                self.set_notice("Backtest complete – press [o] to view results");
            }
            // Failures are already in the orchestrator's state.
            AppEvent::Validated(Err(_)) | AppEvent::BacktestFinished(Err(_)) => {}
        }
    }

    // ─── Input ───

    /// Returns true when the app should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.results.is_some() {
            return self.handle_results_key(key);
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,

            KeyCode::Tab | KeyCode::BackTab => {
                self.focus = match self.focus {
                    DraftKind::Validation => DraftKind::Backtest,
                    DraftKind::Backtest => DraftKind::Validation,
                };
                self.cursor = self.cursor.min(fields(self.focus).len() - 1);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.cursor = self.cursor.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.cursor = (self.cursor + 1).min(fields(self.focus).len() - 1);
            }
            KeyCode::Left | KeyCode::Char('h') => self.cycle(-1),
            KeyCode::Right | KeyCode::Char('l') => self.cycle(1),
            KeyCode::Char('+') | KeyCode::Char('=') => self.step(1),
            KeyCode::Char('-') => self.step(-1),

            KeyCode::Char('v') => self.spawn_validation(),
            KeyCode::Char('r') => self.spawn_backtest(),
            KeyCode::Char('o') => {
                self.results = Some(self.orchestrator.handoff().open_results_view());
            }
            _ => {}
        }
        false
    }

    fn handle_results_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('o') | KeyCode::Esc | KeyCode::Backspace => self.results = None,
            KeyCode::Char('r') => {
                self.results = Some(self.orchestrator.handoff().open_results_view());
            }
            _ => {}
        }
        false
    }

    /// Left/right on the focused field.
    fn cycle(&mut self, dir: i32) {
        let kind = self.focus;
        let outcome = match self.focused_field() {
            Field::Dataset => {
                let form = self.form(kind);
                let names: Vec<String> = form.datasets().iter().map(|d| d.name.clone()).collect();
                match neighbour(&names, &form.draft().dataset_name, dir) {
                    Some(name) => self.form_mut(kind).set_dataset_name(&name).map(|ticket| {
                        self.spawn_metadata(kind, ticket);
                    }),
                    None => Ok(()),
                }
            }
            Field::OptionType => {
                let next = self.form(kind).draft().option_type.toggle();
                self.form_mut(kind).set_field(FieldUpdate::OptionType(next))
            }
            Field::Direction => {
                let next = self.form(kind).draft().position_direction.toggle();
                self.form_mut(kind).set_field(FieldUpdate::PositionDirection(next))
            }
            Field::Expiry => {
                let form = self.form(kind);
                let current = form.draft().expiry.clone().unwrap_or_default();
                match neighbour(form.available_expiries(), &current, dir) {
                    Some(expiry) => self.form_mut(kind).set_expiry(&expiry),
                    None => Ok(()),
                }
            }
            Field::Strike => {
                let form = self.form(kind);
                let ladder = form.available_strikes();
                let next = match form.draft().strike.and_then(|s| ladder.iter().position(|&x| x == s)) {
                    Some(i) => ladder.get(wrap(i, dir, ladder.len())).copied(),
                    None => ladder.first().copied(),
                };
                match next {
                    Some(strike) => self.form_mut(kind).set_strike(strike),
                    None => Ok(()),
                }
            }
            Field::Quantity | Field::StartDate | Field::EndDate => {
                self.step(dir);
                Ok(())
            }
        };
        if let Err(e) = outcome {
            self.set_notice(e.user_message());
        }
    }

    /// +/- on the focused field: quantity by one, dates by one day.
    fn step(&mut self, dir: i32) {
        let kind = self.focus;
        let draft = self.form(kind).draft();
        let update = match self.focused_field() {
            Field::Quantity => {
                let q = if dir > 0 { draft.quantity.saturating_add(1) } else { draft.quantity.saturating_sub(1) };
                if q == 0 {
                    return;
                }
                FieldUpdate::Quantity(q)
            }
            Field::StartDate => match draft.start_date.and_then(|d| shift(d, dir)) {
                Some(d) => FieldUpdate::StartDate(d),
                None => return,
            },
            Field::EndDate => match draft.end_date.and_then(|d| shift(d, dir)) {
                Some(d) => FieldUpdate::EndDate(d),
                None => return,
            },
            _ => return,
        };
        if let Err(e) = self.form_mut(kind).set_field(update) {
            self.set_notice(e.user_message());
        }
    }
}

fn wrap(i: usize, dir: i32, len: usize) -> usize {
    if dir < 0 {
        (i + len - 1) % len
    } else {
        (i + 1) % len
    }
}

/// The item after (or before) `current`, wrapping. First item when `current`
/// is not in the list.
fn neighbour(items: &[String], current: &str, dir: i32) -> Option<String> {
    if items.is_empty() {
        return None;
    }
    let next = match items.iter().position(|s| s == current) {
        Some(i) => wrap(i, dir, items.len()),
        None => 0,
    };
    Some(items[next].clone())
}

fn shift(date: chrono::NaiveDate, dir: i32) -> Option<chrono::NaiveDate> {
    if dir > 0 {
        date.checked_add_days(Days::new(1))
    } else {
        date.checked_sub_days(Days::new(1))
    }
}
