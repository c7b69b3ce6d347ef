// Refresh loop
//
// Periodically lists stream consumers from the management API and folds the
// snapshot into the exporter state. One cycle at a time; the first runs
// immediately.
//
// Numan Thabit 2025 Nov

use crate::state::{unix_millis, ExporterState};
use crate::transport::ManagementClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Applied { consumers: usize },
    Empty,
    Failed,
}

pub struct Scraper {
    client: ManagementClient,
    state: Arc<ExporterState>,
    interval: Duration,
}

impl Scraper {
    pub fn new(client: ManagementClient, state: Arc<ExporterState>) -> Self {
        let interval = state.refresh_interval();
        Self {
            client,
            state,
            interval,
        }
    }

    /// One refresh cycle. The last-scrape time advances whatever the outcome.
    pub async fn run_once(&self) -> CycleOutcome {
        let outcome = match self.client.fetch_consumers().await {
            Ok(records) if records.is_empty() => {
                warn!(endpoint = %self.client.endpoint(), "no stream consumers found, keeping previous metrics");
                CycleOutcome::Empty
            }
            Ok(records) => {
                self.state.apply(&records).await;
                debug!(consumers = records.len(), "stream consumer metrics updated");
                CycleOutcome::Applied {
                    consumers: records.len(),
                }
            }
            Err(err) => {
                error!(error = %err, "metrics update failed");
                CycleOutcome::Failed
            }
        };

        self.state.record_scrape(unix_millis());
        outcome
    }

    /// Drive refresh cycles until the task is dropped.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        // A slow fetch pushes the next tick back instead of bunching cycles.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }
}
