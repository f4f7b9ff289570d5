//! Append-only measurement log.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::Measurement;

/// Ordered, append-only sequence of decoded measurements.
///
/// Insertion order is notification arrival order. Entries are never
/// removed or mutated; the log outlives session teardown, so a caller can
/// rebuild a session against the same log. Cloning shares the underlying
/// storage: the decode pipeline is the single writer, reporting
/// collaborators take read-only snapshots.
#[derive(Debug, Clone, Default)]
pub struct MeasurementLog {
    entries: Arc<RwLock<Vec<Measurement>>>,
}

impl MeasurementLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a measurement.
    pub async fn append(&self, measurement: Measurement) {
        self.entries.write().await.push(measurement);
    }

    /// Returns a read-only snapshot in arrival order.
    pub async fn snapshot(&self) -> Vec<Measurement> {
        self.entries.read().await.clone()
    }

    /// Number of recorded measurements.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Explicitly clears the log.
    ///
    /// Never called by the session itself; resetting is a caller decision.
    pub async fn reset(&self) {
        self.entries.write().await.clear();
    }
}
