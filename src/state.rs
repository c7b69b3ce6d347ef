// Exporter state shared by the refresh loop and the HTTP handlers
//
// Owns the Prometheus registry, the stream consumer instruments and the
// last-scrape clock. Only the refresh loop writes; handlers read.
//
// Numan Thabit 2025 Nov

use crate::consumer::ConsumerRecord;
use crate::metrics::{self, StreamMetrics};
use prometheus::{Gauge, Registry};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

/// A scrape older than this many refresh intervals marks the exporter unhealthy.
pub const STALE_AFTER_INTERVALS: u32 = 3;

pub struct ExporterState {
    registry: Registry,
    collector: RwLock<StreamMetrics>,
    last_scrape_gauge: Gauge,
    clock: ScrapeClock,
    refresh_interval: Duration,
}

impl ExporterState {
    pub fn new(refresh_interval: Duration) -> prometheus::Result<Self> {
        let registry = Registry::new();
        let collector = StreamMetrics::new(&registry)?;
        let last_scrape_gauge = metrics::register_last_scrape(&registry)?;
        Ok(Self {
            registry,
            collector: RwLock::new(collector),
            last_scrape_gauge,
            clock: ScrapeClock::default(),
            refresh_interval,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Replace the counter window with `records`. Readers never observe a
    /// half-applied snapshot.
    pub async fn apply(&self, records: &[ConsumerRecord]) {
        let collector = self.collector.write().await;
        collector.reset_all();
        for record in records {
            collector.update_for_consumer(record);
        }
    }

    pub fn record_scrape(&self, at_ms: u64) {
        self.clock.record(at_ms);
        self.last_scrape_gauge.set(at_ms as f64);
    }

    pub fn last_scrape(&self) -> Option<u64> {
        self.clock.last()
    }

    pub fn is_fresh(&self, now_ms: u64) -> bool {
        self.clock.is_fresh(now_ms, self.refresh_interval)
    }

    pub async fn render(&self) -> prometheus::Result<String> {
        let _guard = self.collector.read().await;
        metrics::render(&self.registry)
    }
}

/// Unix epoch milliseconds of the last refresh attempt; zero means none yet.
#[derive(Debug, Default)]
pub struct ScrapeClock {
    last_ms: AtomicU64,
}

impl ScrapeClock {
    pub fn record(&self, at_ms: u64) {
        self.last_ms.store(at_ms, Ordering::Release);
    }

    pub fn last(&self) -> Option<u64> {
        match self.last_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(ms),
        }
    }

    pub fn is_fresh(&self, now_ms: u64, refresh_interval: Duration) -> bool {
        let window = refresh_interval.saturating_mul(STALE_AFTER_INTERVALS);
        let window = u64::try_from(window.as_millis()).unwrap_or(u64::MAX);
        self.last()
            .map(|last| last > now_ms.saturating_sub(window))
            .unwrap_or(false)
    }
}

pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
