pub mod slot;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::ClientError;
use crate::types::BacktestResult;
use crate::view::ResultsView;

pub use slot::{FileSlot, MemorySlot, SlotStore};

/// Single-slot channel carrying the latest successful backtest from the
/// configuration view to any number of results views.
///
/// One writer, many readers. `consume` never clears the slot, so repeated
/// reads return the same result until the next `publish`.
#[derive(Clone)]
pub struct ResultHandoff {
    slot: Arc<dyn SlotStore>,
}

impl ResultHandoff {
    pub fn new(slot: Arc<dyn SlotStore>) -> Self {
        Self { slot }
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileSlot::new(path)))
    }

    pub fn memory() -> Self {
        Self::new(Arc::new(MemorySlot::new()))
    }

    /// Replace the slot with `result`.
    pub fn publish(&self, result: &BacktestResult) -> Result<(), ClientError> {
        let text = serde_json::to_string(result)
            .map_err(|e| ClientError::Decode(format!("JSON error: {}", e)))?;
        self.slot.write(&text)?;
        info!(
            slot = %self.slot.describe(),
            final_pnl = result.results.final_pnl,
            days = result.results.daily_pnl.len(),
            "backtest result published"
        );
        Ok(())
    }

    /// Latest published result. `NotFound` when nothing was published,
    /// `Decode` when the slot holds something that is not a result.
    pub fn consume(&self) -> Result<BacktestResult, ClientError> {
        let text = self
            .slot
            .read()?
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ClientError::NotFound("no backtest results published".into()))?;
        let result = serde_json::from_str(&text)
            .map_err(|e| ClientError::Decode(format!("corrupt handoff slot: {}", e)))?;
        debug!(slot = %self.slot.describe(), "backtest result consumed");
        Ok(result)
    }

    /// A fresh results view that reads the slot on its own.
    pub fn open_results_view(&self) -> ResultsView {
        ResultsView::load(self)
    }
}
