use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::gateway::BacktestApi;
use crate::types::DatasetMetadata;

/// Identifies one metadata request. Issuing a new ticket supersedes every
/// earlier one, whatever order the responses come back in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataTicket {
    dataset: String,
    generation: u64,
}

impl MetadataTicket {
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Perform the network call for this ticket. Borrows nothing from the
    /// store, so it can run on a spawned task.
    pub async fn fetch(&self, api: &dyn BacktestApi) -> Result<DatasetMetadata, ClientError> {
        api.dataset_metadata(&self.dataset).await
    }
}

/// Fetches and holds the metadata for the dataset most recently requested.
///
/// Last-requested-dataset-wins: a response is applied only if its ticket is
/// still the pending one. Metadata is never merged across datasets.
#[derive(Debug, Default)]
pub struct MetadataStore {
    generation: u64,
    pending: Option<MetadataTicket>,
    current: Option<(String, DatasetMetadata)>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request for `dataset`. Drops whatever metadata was held.
    pub fn request(&mut self, dataset: &str) -> MetadataTicket {
        self.generation += 1;
        let ticket = MetadataTicket {
            dataset: dataset.to_string(),
            generation: self.generation,
        };
        if let Some(prev) = self.pending.replace(ticket.clone()) {
            debug!(superseded = %prev.dataset, by = %dataset, "metadata request superseded");
        }
        self.current = None;
        ticket
    }

    /// Apply a response. `Ok(true)` when applied, `Ok(false)` when the ticket
    /// was superseded (response discarded), `Err` when the current request failed.
    pub fn accept(
        &mut self,
        ticket: &MetadataTicket,
        outcome: Result<DatasetMetadata, ClientError>,
    ) -> Result<bool, ClientError> {
        if self.pending.as_ref() != Some(ticket) {
            debug!(
                dataset = %ticket.dataset,
                generation = ticket.generation,
                latest = self.generation,
                "discarding stale metadata response"
            );
            return Ok(false);
        }
        self.pending = None;

        match outcome {
            Ok(meta) => {
                info!(
                    dataset = %ticket.dataset,
                    expiries = meta.available_expiries.len(),
                    start = %meta.date_range.start,
                    end = %meta.date_range.end,
                    "metadata applied"
                );
                self.current = Some((ticket.dataset.clone(), meta));
                Ok(true)
            }
            Err(e) => {
                warn!(dataset = %ticket.dataset, error = %e, "metadata fetch failed");
                Err(e)
            }
        }
    }

    /// Request, fetch and apply in one go.
    pub async fn fetch_metadata(
        &mut self,
        api: &dyn BacktestApi,
        dataset: &str,
    ) -> Result<&DatasetMetadata, ClientError> {
        let ticket = self.request(dataset);
        let outcome = ticket.fetch(api).await;
        self.accept(&ticket, outcome)?;
        self.current
            .as_ref()
            .map(|(_, m)| m)
            .ok_or_else(|| ClientError::NotFound(format!("metadata for '{}'", dataset)))
    }

    pub fn current(&self) -> Option<&DatasetMetadata> {
        self.current.as_ref().map(|(_, m)| m)
    }

    /// Dataset the held metadata belongs to.
    pub fn current_dataset(&self) -> Option<&str> {
        self.current.as_ref().map(|(d, _)| d.as_str())
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}
