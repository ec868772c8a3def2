use chrono::NaiveDate;
use tracing::{debug, info};

use crate::error::ClientError;
use crate::gateway::BacktestApi;
use crate::market::metadata::{MetadataStore, MetadataTicket};
use crate::types::*;

/// Lifecycle of one draft.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormState {
    /// No dataset list yet, or the last metadata fetch failed.
    Uninitialized,
    AwaitingMetadata,
    Ready,
}

/// Direct edits for fields with no downstream dependents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FieldUpdate {
    OptionType(OptionType),
    PositionDirection(PositionDirection),
    Quantity(u32),
    StartDate(NaiveDate),
    EndDate(NaiveDate),
}

/// Owns one strategy draft and keeps it consistent with the metadata of the
/// selected dataset: dataset → expiries → strike ladder → date range.
///
/// Owned by a single event loop; no interior mutability. Network work is
/// handed out as `MetadataTicket`s and fed back through `apply_metadata`.
pub struct FormController {
    kind: DraftKind,
    draft: StrategyDraft,
    datasets: Vec<Dataset>,
    metadata: MetadataStore,
    state: FormState,
    last_error: Option<String>,
}

impl FormController {
    pub fn new(kind: DraftKind) -> Self {
        Self {
            kind,
            draft: StrategyDraft::default(),
            datasets: Vec::new(),
            metadata: MetadataStore::new(),
            state: FormState::Uninitialized,
            last_error: None,
        }
    }

    pub fn kind(&self) -> DraftKind {
        self.kind
    }

    pub fn draft(&self) -> &StrategyDraft {
        &self.draft
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == FormState::Ready
    }

    pub fn datasets(&self) -> &[Dataset] {
        &self.datasets
    }

    pub fn metadata(&self) -> Option<&DatasetMetadata> {
        self.metadata.current()
    }

    /// Error recorded by the last failed metadata fetch.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn available_expiries(&self) -> &[String] {
        self.metadata()
            .map(|m| m.available_expiries.as_slice())
            .unwrap_or(&[])
    }

    /// Strike ladder for the currently selected expiry.
    pub fn available_strikes(&self) -> &[f64] {
        match (self.metadata(), self.draft.expiry.as_deref()) {
            (Some(m), Some(expiry)) => m.ladder(expiry),
            _ => &[],
        }
    }

    // ─── Dataset selection ───

    /// Record the dataset list. Selects the first dataset when none is
    /// selected yet and returns the metadata ticket to fetch.
    pub fn on_datasets_listed(&mut self, datasets: Vec<Dataset>) -> Option<MetadataTicket> {
        self.datasets = datasets;
        if !self.draft.dataset_name.is_empty() {
            return None;
        }
        let first = self.datasets.first()?.name.clone();
        self.set_dataset_name(&first).ok()
    }

    /// Select a dataset. Expiry and strike are invalid until the returned
    /// ticket's metadata is applied.
    pub fn set_dataset_name(&mut self, name: &str) -> Result<MetadataTicket, ClientError> {
        if !self.datasets.iter().any(|d| d.name == name) {
            return Err(ClientError::NotFound(format!("Dataset '{}' not found", name)));
        }
        self.draft.dataset_name = name.to_string();
        self.draft.expiry = None;
        self.draft.strike = None;
        if self.kind == DraftKind::Backtest {
            self.draft.start_date = None;
            self.draft.end_date = None;
        }
        self.state = FormState::AwaitingMetadata;
        self.last_error = None;
        debug!(draft = self.kind.label(), dataset = name, "dataset selected");
        Ok(self.metadata.request(name))
    }

    /// Feed back the outcome of a ticket's fetch. Returns `true` when the
    /// draft changed, `false` when the ticket was stale.
    pub fn apply_metadata(
        &mut self,
        ticket: &MetadataTicket,
        outcome: Result<DatasetMetadata, ClientError>,
    ) -> bool {
        match self.metadata.accept(ticket, outcome) {
            Ok(false) => false,
            Ok(true) => {
                self.apply_defaults();
                self.state = FormState::Ready;
                true
            }
            Err(e) => {
                self.state = FormState::Uninitialized;
                self.last_error = Some(e.user_message());
                true
            }
        }
    }

    /// Issue, fetch and apply metadata for `name` in sequence.
    pub async fn select_dataset(&mut self, api: &dyn BacktestApi, name: &str) -> Result<(), ClientError> {
        let ticket = self.set_dataset_name(name)?;
        let outcome = ticket.fetch(api).await;
        let failure = outcome.as_ref().err().cloned();
        self.apply_metadata(&ticket, outcome);
        failure.map_or(Ok(()), Err)
    }

    /// Dataset-change path: first expiry, first strike of its ladder, full
    /// date range for the backtest draft.
    fn apply_defaults(&mut self) {
        let Some(meta) = self.metadata.current() else {
            return;
        };
        let expiry = meta.available_expiries.first().cloned();
        let strike = expiry
            .as_deref()
            .and_then(|e| meta.ladder(e).first().copied());
        let range = meta.date_range;

        self.draft.expiry = expiry;
        self.draft.strike = strike;
        if self.kind == DraftKind::Backtest {
            self.draft.start_date = Some(range.start);
            self.draft.end_date = Some(range.end);
        }
        info!(
            draft = self.kind.label(),
            dataset = %self.draft.dataset_name,
            expiry = ?self.draft.expiry,
            strike = ?self.draft.strike,
            "draft defaults applied"
        );
    }

    // ─── Dependent fields ───

    /// User-initiated expiry change. A held strike missing from the new
    /// ladder is cleared and not re-picked; an already-empty strike defaults
    /// to the first entry of the new ladder.
    pub fn set_expiry(&mut self, expiry: &str) -> Result<(), ClientError> {
        let meta = self.require_metadata("expiry")?;
        if !meta.has_expiry(expiry) {
            return Err(ClientError::InvalidField {
                field: "expiry",
                reason: format!("{} is not available for {}", expiry, self.draft.dataset_name),
            });
        }
        let ladder = meta.ladder(expiry);
        let strike = match self.draft.strike {
            Some(s) if ladder.contains(&s) => Some(s),
            Some(_) => None,
            None => ladder.first().copied(),
        };

        self.draft.expiry = Some(expiry.to_string());
        self.draft.strike = strike;
        Ok(())
    }

    pub fn set_strike(&mut self, strike: f64) -> Result<(), ClientError> {
        self.require_metadata("strike")?;
        if !self.available_strikes().contains(&strike) {
            return Err(ClientError::InvalidField {
                field: "strike",
                reason: format!(
                    "{} is not in the ladder for {}",
                    strike,
                    self.draft.expiry.as_deref().unwrap_or("(no expiry)")
                ),
            });
        }
        self.draft.strike = Some(strike);
        Ok(())
    }

    /// Edit a field with no dependents. Dates are clamped into the dataset's
    /// range and against each other so that start <= end always holds.
    pub fn set_field(&mut self, update: FieldUpdate) -> Result<(), ClientError> {
        match update {
            FieldUpdate::OptionType(t) => self.draft.option_type = t,
            FieldUpdate::PositionDirection(d) => self.draft.position_direction = d,
            FieldUpdate::Quantity(0) => {
                return Err(ClientError::InvalidField {
                    field: "quantity",
                    reason: "must be a positive integer".into(),
                });
            }
            FieldUpdate::Quantity(q) => self.draft.quantity = q,
            FieldUpdate::StartDate(date) => {
                let range = self.date_range("start_date")?;
                let upper = self.draft.end_date.unwrap_or(range.end);
                self.draft.start_date = Some(range.clamp(date).min(upper));
            }
            FieldUpdate::EndDate(date) => {
                let range = self.date_range("end_date")?;
                let lower = self.draft.start_date.unwrap_or(range.start);
                self.draft.end_date = Some(range.clamp(date).max(lower));
            }
        }
        Ok(())
    }

    fn date_range(&self, field: &'static str) -> Result<DateRange, ClientError> {
        if self.kind != DraftKind::Backtest {
            return Err(ClientError::InvalidField {
                field,
                reason: "the validation draft has no date range".into(),
            });
        }
        Ok(self.require_metadata(field)?.date_range)
    }

    fn require_metadata(&self, field: &'static str) -> Result<&DatasetMetadata, ClientError> {
        match self.metadata.current() {
            Some(m) if self.state == FormState::Ready => Ok(m),
            _ => Err(ClientError::InvalidField {
                field,
                reason: "dataset metadata has not loaded yet".into(),
            }),
        }
    }

    // ─── Submission ───

    /// The draft coerced to submission types.
    pub fn submission_payload(&self) -> Result<StrategyPayload, ClientError> {
        if self.draft.dataset_name.is_empty() {
            return Err(ClientError::incomplete("dataset_name"));
        }
        let expiry = match self.draft.expiry.as_deref() {
            Some(e) if !e.is_empty() => e.to_string(),
            _ => return Err(ClientError::incomplete("expiry")),
        };
        let strike = self.draft.strike.ok_or_else(|| ClientError::incomplete("strike"))?;

        Ok(StrategyPayload {
            dataset_name: self.draft.dataset_name.clone(),
            option_type: self.draft.option_type,
            strike,
            expiry,
            position_direction: self.draft.position_direction,
            quantity: self.draft.quantity,
        })
    }

    /// Payload plus the date range, for the backtest draft only.
    pub fn backtest_request(&self) -> Result<BacktestRequest, ClientError> {
        if self.kind != DraftKind::Backtest {
            return Err(ClientError::IncompleteConfiguration(
                "the validation draft cannot run a backtest".into(),
            ));
        }
        let strategy = self.submission_payload()?;
        let start_date = self.draft.start_date.ok_or_else(|| ClientError::incomplete("start_date"))?;
        let end_date = self.draft.end_date.ok_or_else(|| ClientError::incomplete("end_date"))?;
        Ok(BacktestRequest {
            strategy,
            date_range: RequestDateRange { start_date, end_date },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{date, qqq_2024, spy_2024, ScriptedApi};
    use std::time::Duration;

    fn spy_api() -> ScriptedApi {
        ScriptedApi::new().with_dataset(spy_2024()).with_dataset(qqq_2024())
    }

    async fn ready_form(kind: DraftKind, api: &ScriptedApi) -> FormController {
        let mut form = FormController::new(kind);
        let ticket = form.on_datasets_listed(api.datasets.clone()).unwrap();
        let outcome = ticket.fetch(api).await;
        assert!(form.apply_metadata(&ticket, outcome));
        form
    }

    /// Scenario: fresh controller before any dataset list arrives
    /// Expected: Uninitialized, default draft (call, buy, quantity 1, empty strike/expiry)
    #[test]
    fn test_new_form_is_uninitialized() {
        let form = FormController::new(DraftKind::Validation);
        assert_eq!(form.state(), FormState::Uninitialized);
        assert_eq!(form.draft().option_type, OptionType::Call);
        assert_eq!(form.draft().position_direction, PositionDirection::Buy);
        assert_eq!(form.draft().quantity, 1);
        assert!(form.draft().strike.is_none());
        assert!(form.draft().expiry.is_none());
    }

    /// Scenario: dataset list arrives empty
    /// Expected: no ticket issued, draft stays Uninitialized
    #[test]
    fn test_empty_dataset_list_stays_uninitialized() {
        let mut form = FormController::new(DraftKind::Validation);
        assert!(form.on_datasets_listed(vec![]).is_none());
        assert_eq!(form.state(), FormState::Uninitialized);
    }

    /// Scenario: SPY_2024 selected, metadata applied
    /// Expected: expiry 2024-06-21, strike 400 (first of its ladder), Ready
    #[tokio::test]
    async fn test_select_dataset_applies_defaults() {
        let api = spy_api();
        let form = ready_form(DraftKind::Validation, &api).await;
        assert_eq!(form.state(), FormState::Ready);
        assert_eq!(form.draft().dataset_name, "SPY_2024");
        assert_eq!(form.draft().expiry.as_deref(), Some("2024-06-21"));
        assert_eq!(form.draft().strike, Some(400.0));
        assert!(form.draft().start_date.is_none(), "validation draft carries no dates");
    }

    /// Scenario: SPY_2024 scenario, then the user moves to 2024-07-19 whose ladder is [405, 415]
    /// Expected: strike 400 not in the new ladder, so it is cleared and not re-picked
    #[tokio::test]
    async fn test_expiry_change_clears_missing_strike() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Validation, &api).await;
        form.set_expiry("2024-07-19").unwrap();
        assert_eq!(form.draft().expiry.as_deref(), Some("2024-07-19"));
        assert_eq!(form.draft().strike, None);
        assert_eq!(form.available_strikes(), &[405.0, 415.0]);
    }

    /// Scenario: every expiry/ladder pair in a metadata object, held strike absent from target ladder
    /// Expected: strike is always empty afterwards
    #[tokio::test]
    async fn test_expiry_change_never_leaves_stale_strike() {
        let api = spy_api();
        let meta = spy_2024();
        for target in &meta.available_expiries {
            let mut form = ready_form(DraftKind::Validation, &api).await;
            let other = meta.available_expiries.iter().find(|e| *e != target).unwrap();
            form.set_expiry(other).unwrap();
            // Choose a strike that the target ladder does not contain.
            let foreign = form
                .available_strikes()
                .iter()
                .copied()
                .find(|s| !meta.ladder(target).contains(s));
            let Some(foreign) = foreign else { continue };
            form.set_strike(foreign).unwrap();

            form.set_expiry(target).unwrap();
            assert_eq!(form.draft().strike, None, "stale strike kept for {}", target);
        }
    }

    /// Scenario: held strike is present in the new expiry's ladder
    /// Expected: strike kept as-is
    #[tokio::test]
    async fn test_expiry_change_keeps_shared_strike() {
        let mut meta = spy_2024();
        meta.available_strikes.insert("2024-07-19".into(), vec![400.0, 405.0]);
        let api = ScriptedApi::new().with_dataset(meta);
        let mut form = ready_form(DraftKind::Validation, &api).await;
        form.set_expiry("2024-07-19").unwrap();
        assert_eq!(form.draft().strike, Some(400.0));
    }

    /// Scenario: strike already empty (cleared by a previous expiry change) when the user picks another expiry
    /// Expected: strike auto-defaults to the first entry of the active ladder
    #[tokio::test]
    async fn test_empty_strike_defaults_on_expiry_change() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Validation, &api).await;
        form.set_expiry("2024-07-19").unwrap();
        assert_eq!(form.draft().strike, None);
        form.set_expiry("2024-06-21").unwrap();
        assert_eq!(form.draft().strike, Some(400.0));
    }

    /// Scenario: expiry not listed in the metadata
    /// Expected: InvalidField, draft untouched
    #[tokio::test]
    async fn test_unknown_expiry_rejected() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Validation, &api).await;
        let err = form.set_expiry("2030-01-18").unwrap_err();
        assert!(matches!(err, ClientError::InvalidField { field: "expiry", .. }));
        assert_eq!(form.draft().expiry.as_deref(), Some("2024-06-21"));
    }

    /// Scenario: strike outside the active ladder
    /// Expected: InvalidField, strike unchanged
    #[tokio::test]
    async fn test_set_strike_outside_ladder() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Validation, &api).await;
        assert!(form.set_strike(405.0).is_err());
        assert_eq!(form.draft().strike, Some(400.0));
        form.set_strike(420.0).unwrap();
        assert_eq!(form.draft().strike, Some(420.0));
    }

    /// Scenario: dataset changed, then changed again before the first fetch resolves;
    /// the first (superseded) response arrives last
    /// Expected: applied metadata and defaults belong to the last-set dataset
    #[tokio::test]
    async fn test_rapid_dataset_change_last_requested_wins() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Backtest, &api).await;

        let first = form.set_dataset_name("QQQ_2024").unwrap();
        let second = form.set_dataset_name("SPY_2024").unwrap();
        let second_resp = second.fetch(&api).await;
        assert!(form.apply_metadata(&second, second_resp));
        let first_resp = first.fetch(&api).await;
        assert!(!form.apply_metadata(&first, first_resp));

        assert_eq!(form.draft().dataset_name, "SPY_2024");
        assert_eq!(form.draft().expiry.as_deref(), Some("2024-06-21"));
        assert_eq!(form.metadata().unwrap().name.as_deref(), Some("SPY_2024"));
    }

    /// Scenario: same race, but responses land in request order (first, then second)
    /// Expected: still the last-set dataset's metadata; first response ignored
    #[tokio::test(start_paused = true)]
    async fn test_rapid_dataset_change_in_order_arrival() {
        let api = spy_api().with_delay("SPY_2024", Duration::from_millis(300));
        let mut form = ready_form(DraftKind::Validation, &api).await;

        let first = form.set_dataset_name("QQQ_2024").unwrap();
        let second = form.set_dataset_name("SPY_2024").unwrap();
        assert_eq!(form.state(), FormState::AwaitingMetadata);

        let (first_resp, second_resp) = tokio::join!(first.fetch(&api), second.fetch(&api));
        assert!(!form.apply_metadata(&first, first_resp));
        assert_eq!(form.state(), FormState::AwaitingMetadata);
        assert!(form.draft().expiry.is_none());
        assert!(form.apply_metadata(&second, second_resp));
        assert_eq!(form.draft().strike, Some(400.0));
    }

    /// Scenario: dataset changed on a Ready draft
    /// Expected: expiry, strike and dates invalidated while awaiting metadata
    #[tokio::test]
    async fn test_dataset_change_invalidates_dependents() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Backtest, &api).await;
        form.set_dataset_name("QQQ_2024").unwrap();
        assert_eq!(form.state(), FormState::AwaitingMetadata);
        assert!(form.draft().expiry.is_none());
        assert!(form.draft().strike.is_none());
        assert!(form.draft().start_date.is_none());
        assert!(form.submission_payload().unwrap_err().is_incomplete());
    }

    /// Scenario: metadata fetch for the selected dataset fails
    /// Expected: back to Uninitialized with the error recorded, not Ready
    #[tokio::test]
    async fn test_metadata_failure_returns_to_uninitialized() {
        let mut api = spy_api();
        api.metadata.remove("QQQ_2024");
        let mut form = ready_form(DraftKind::Validation, &api).await;

        let err = form.select_dataset(&api, "QQQ_2024").await.unwrap_err();
        assert!(matches!(err, ClientError::NotFound(_)));
        assert_eq!(form.state(), FormState::Uninitialized);
        assert!(form.last_error().unwrap().contains("QQQ_2024"));

        // Recovers by selecting again.
        form.select_dataset(&api, "SPY_2024").await.unwrap();
        assert!(form.is_ready());
        assert!(form.last_error().is_none());
    }

    /// Scenario: selecting a dataset not in the listed set
    /// Expected: NotFound, no ticket, state unchanged
    #[tokio::test]
    async fn test_unlisted_dataset_rejected() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Validation, &api).await;
        assert!(matches!(form.set_dataset_name("IWM"), Err(ClientError::NotFound(_))));
        assert!(form.is_ready());
    }

    /// Scenario: backtest draft selects SPY_2024
    /// Expected: start/end dates default to the dataset's full range
    #[tokio::test]
    async fn test_backtest_draft_gets_date_range() {
        let api = spy_api();
        let form = ready_form(DraftKind::Backtest, &api).await;
        assert_eq!(form.draft().start_date, Some(date(2024, 1, 2)));
        assert_eq!(form.draft().end_date, Some(date(2024, 6, 28)));
    }

    /// Scenario: dates set outside the range and past each other
    /// Expected: clamped into the range, start never after end
    #[tokio::test]
    async fn test_dates_are_clamped() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Backtest, &api).await;

        form.set_field(FieldUpdate::StartDate(date(2023, 6, 1))).unwrap();
        assert_eq!(form.draft().start_date, Some(date(2024, 1, 2)));

        form.set_field(FieldUpdate::EndDate(date(2024, 3, 1))).unwrap();
        form.set_field(FieldUpdate::StartDate(date(2024, 4, 1))).unwrap();
        assert_eq!(form.draft().start_date, Some(date(2024, 3, 1)));

        form.set_field(FieldUpdate::EndDate(date(2024, 2, 1))).unwrap();
        assert_eq!(form.draft().end_date, Some(date(2024, 3, 1)));

        form.set_field(FieldUpdate::EndDate(date(2025, 1, 1))).unwrap();
        assert_eq!(form.draft().end_date, Some(date(2024, 6, 28)));
    }

    /// Scenario: date edit on the validation draft
    /// Expected: rejected, the validation draft has no dates
    #[tokio::test]
    async fn test_dates_rejected_on_validation_draft() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Validation, &api).await;
        assert!(form.set_field(FieldUpdate::StartDate(date(2024, 2, 1))).is_err());
    }

    /// Scenario: quantity set to zero, then to 5
    /// Expected: zero rejected, 5 accepted
    #[test]
    fn test_quantity_must_be_positive() {
        let mut form = FormController::new(DraftKind::Validation);
        assert!(form.set_field(FieldUpdate::Quantity(0)).is_err());
        assert_eq!(form.draft().quantity, 1);
        form.set_field(FieldUpdate::Quantity(5)).unwrap();
        assert_eq!(form.draft().quantity, 5);
    }

    /// Scenario: ready draft with put/sell/3 contracts
    /// Expected: payload carries numeric strike and quantity plus the enums
    #[tokio::test]
    async fn test_submission_payload_coerces() {
        let api = spy_api();
        let mut form = ready_form(DraftKind::Validation, &api).await;
        form.set_field(FieldUpdate::OptionType(OptionType::Put)).unwrap();
        form.set_field(FieldUpdate::PositionDirection(PositionDirection::Sell)).unwrap();
        form.set_field(FieldUpdate::Quantity(3)).unwrap();
        let p = form.submission_payload().unwrap();
        assert_eq!(p.dataset_name, "SPY_2024");
        assert_eq!(p.strike, 400.0);
        assert_eq!(p.quantity, 3);
        assert_eq!(p.option_type, OptionType::Put);
        assert_eq!(p.position_direction, PositionDirection::Sell);
    }

    /// Scenario: payload requested with dataset, expiry or strike empty
    /// Expected: IncompleteConfiguration naming the missing field
    #[tokio::test]
    async fn test_submission_payload_incomplete() {
        let form = FormController::new(DraftKind::Validation);
        assert_eq!(
            form.submission_payload().unwrap_err(),
            ClientError::incomplete("dataset_name")
        );

        let api = spy_api();
        let mut form = ready_form(DraftKind::Validation, &api).await;
        form.set_expiry("2024-07-19").unwrap();
        assert_eq!(form.submission_payload().unwrap_err(), ClientError::incomplete("strike"));

        form.set_dataset_name("QQQ_2024").unwrap();
        assert_eq!(form.submission_payload().unwrap_err(), ClientError::incomplete("expiry"));
    }

    /// Scenario: backtest request from a ready backtest draft
    /// Expected: strategy payload wrapped with the draft's date range
    #[tokio::test]
    async fn test_backtest_request() {
        let api = spy_api();
        let form = ready_form(DraftKind::Backtest, &api).await;
        let req = form.backtest_request().unwrap();
        assert_eq!(req.strategy.strike, 400.0);
        assert_eq!(req.date_range.start_date, date(2024, 1, 2));
        assert_eq!(req.date_range.end_date, date(2024, 6, 28));

        let validation = ready_form(DraftKind::Validation, &api).await;
        assert!(validation.backtest_request().unwrap_err().is_incomplete());
    }
}
