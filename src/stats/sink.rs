//! Periodic stats emission.
//!
//! # Responsibilities
//! - Sample every backend's counters on a fixed cadence
//! - Hand the samples to a sink (the rotating stats file by default)
//! - Emit one last sample on shutdown
//!
//! # Data Flow
//! ```text
//! ticker ──▶ pool.snapshot() ──▶ StatsSink::emit ──▶ stats.txt (rotated)
//! ```
//!
//! # Design Decisions
//! - Reads only atomics, never takes a routing lock
//! - Sink I/O (writes, rotation, gzip) runs on the blocking pool
//! - Sink errors are logged and the loop keeps going

use std::io;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::StatsConfig;
use crate::load_balancer::{BackendPool, StatsSnapshot};
use crate::stats::rotate::{RotatingFile, RotationPolicy};

/// Destination for counter samples.
pub trait StatsSink: Send {
    fn emit(&mut self, at: DateTime<Utc>, snapshots: &[StatsSnapshot]) -> io::Result<()>;
}

/// One stats line for one backend.
pub fn format_line(at: DateTime<Utc>, snapshot: &StatsSnapshot) -> String {
    format!(
        "{} Backend URL: {}, Requests served: {}, Errors: {}, Total Latency: {}",
        at.to_rfc3339_opts(SecondsFormat::Secs, true),
        snapshot.url,
        snapshot.requests,
        snapshot.errors,
        snapshot.latency_ns
    )
}

/// Sink writing one line per backend into a rotating file.
#[derive(Debug)]
pub struct FileSink {
    file: RotatingFile,
}

impl FileSink {
    pub fn new(file: RotatingFile) -> Self {
        Self { file }
    }

    pub fn from_config(config: &StatsConfig) -> Self {
        Self::new(RotatingFile::new(
            &config.path,
            RotationPolicy::from(config),
        ))
    }
}

impl StatsSink for FileSink {
    fn emit(&mut self, at: DateTime<Utc>, snapshots: &[StatsSnapshot]) -> io::Result<()> {
        for snapshot in snapshots {
            self.file.write_line(&format_line(at, snapshot))?;
        }
        self.file.flush()
    }
}

/// Background task sampling the pool into a sink.
pub struct StatsReporter {
    pool: Arc<BackendPool>,
    interval: Duration,
    sink: Arc<Mutex<Box<dyn StatsSink>>>,
}

impl StatsReporter {
    pub fn new(pool: Arc<BackendPool>, interval: Duration, sink: Box<dyn StatsSink>) -> Self {
        Self {
            pool,
            interval,
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Reporter writing to the configured rotating stats file.
    pub fn to_file(pool: Arc<BackendPool>, config: &StatsConfig) -> Self {
        Self::new(
            pool,
            Duration::from_secs(config.interval_secs),
            Box::new(FileSink::from_config(config)),
        )
    }

    /// Run until the shutdown signal, then report once more and return.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?self.interval, "Stats reporter starting");

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.report().await,
                _ = shutdown.recv() => {
                    tracing::info!("Stats reporter received shutdown signal, flushing");
                    self.report().await;
                    break;
                }
            }
        }
    }

    /// Sample every backend once and hand the sample to the sink.
    pub async fn report(&self) {
        let at = Utc::now();
        let snapshots = self.pool.snapshot();
        let sink = self.sink.clone();

        let written = tokio::task::spawn_blocking(move || {
            let mut sink = sink.lock();
            sink.emit(at, &snapshots)
        })
        .await;
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to write stats"),
            Err(e) => tracing::error!(error = %e, "Stats writer task failed"),
        }
    }
}
