use chrono::NaiveDate;
use tracing::debug;

use crate::error::Result;
use crate::measurement::Descriptor;
use crate::meter::{MeterClient, Snapshot};
use crate::projection::{evaluate, DailyMaxima, MeasurementValue};

/// Owns the latest snapshot and the running daily maxima between ticks.
/// One instance per device; refreshes never overlap.
pub struct Poller {
    client: MeterClient,
    descriptors: Vec<Descriptor>,
    snapshot: Option<Snapshot>,
    maxima: DailyMaxima,
}

impl Poller {
    pub fn new(client: MeterClient, descriptors: Vec<Descriptor>, today: NaiveDate) -> Self {
        Self {
            client,
            descriptors,
            snapshot: None,
            maxima: DailyMaxima::new(today),
        }
    }

    pub fn descriptors(&self) -> &[Descriptor] {
        &self.descriptors
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    /// Run one fetch and replace the snapshot wholesale. On failure the
    /// previous snapshot stays in place so readings go stale rather than
    /// blank.
    pub async fn refresh(&mut self) -> Result<()> {
        let snapshot = self.client.fetch_snapshot().await?;
        debug!("snapshot refreshed");
        self.snapshot = Some(snapshot);
        Ok(())
    }

    /// Evaluate every descriptor against the current snapshot, in table
    /// order. Also folds the day's readings into the running maxima, so call
    /// once per tick. The result lines up index-for-index with
    /// `descriptors()`.
    pub fn project(&mut self, today: NaiveDate) -> Vec<MeasurementValue> {
        let snapshot = self.snapshot.as_ref();
        let maxima = &mut self.maxima;
        self.descriptors
            .iter()
            .map(|descriptor| evaluate(&descriptor.rule, snapshot, maxima, today))
            .collect()
    }
}
