//! Lookup of live and finished runs by payment id.

use crate::core::PaymentStatus;
use crate::errors::ExpiryflowError;
use crate::tracker::StatusQuery;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Routes status queries to runs by id.
///
/// An id may not be registered twice while its run is still live. A finished
/// run stays queryable until it is removed.
#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: DashMap<String, StatusQuery>,
}

impl RunRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a run's reader under its id.
    ///
    /// A finished run with the same id is replaced.
    pub fn register(&self, query: StatusQuery) -> Result<(), ExpiryflowError> {
        match self.runs.entry(query.id().to_string()) {
            Entry::Occupied(mut existing) => {
                if !existing.get().is_terminal() {
                    return Err(ExpiryflowError::DuplicateRun(existing.key().clone()));
                }
                debug!(payment_id = %existing.key(), "Replacing finished run");
                existing.insert(query);
            }
            Entry::Vacant(slot) => {
                debug!(payment_id = %slot.key(), "Run registered");
                slot.insert(query);
            }
        }
        Ok(())
    }

    /// Returns the reader for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<StatusQuery> {
        self.runs.get(id).map(|entry| entry.value().clone())
    }

    /// Latest status of run `id`.
    #[must_use]
    pub fn status(&self, id: &str) -> Option<PaymentStatus> {
        self.runs.get(id).map(|entry| entry.get_status())
    }

    /// Whether run `id` expired.
    #[must_use]
    pub fn is_expired(&self, id: &str) -> Option<bool> {
        self.runs.get(id).map(|entry| entry.is_expired())
    }

    /// Stops tracking run `id`.
    pub fn remove(&self, id: &str) -> Option<StatusQuery> {
        self.runs.remove(id).map(|(_, query)| query)
    }

    /// Number of tracked runs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether no runs are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Ids of runs that have not reached a terminal status.
    #[must_use]
    pub fn active_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .runs
            .iter()
            .filter(|entry| !entry.value().is_terminal())
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }
}
