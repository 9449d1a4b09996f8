//! Background cleanup of conferences nobody used for a long time.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, MAX_SWEEP_INTERVAL};
use crate::registry::{Registry, RegistryError};

pub struct Sweeper<R> {
    registry: Arc<R>,
    retention: Duration,
    interval: Duration,
}

impl<R: Registry + 'static> Sweeper<R> {
    pub fn new(registry: Arc<R>, config: &Config) -> Self {
        Self { registry, retention: config.retention, interval: config.sweep_interval }
    }

    /// Delete entries whose last use is older than `now - retention`.
    pub fn run_once(&self, now: OffsetDateTime) -> Result<usize, RegistryError> {
        let threshold = time::Duration::try_from(self.retention)
            .ok()
            .and_then(|retention| now.checked_sub(retention));
        let Some(threshold) = threshold else {
            tracing::error!(
                retention = ?self.retention,
                "retention reaches before the calendar, skipping cleanup"
            );
            return Ok(0);
        };
        let removed = self.registry.delete_older_than(threshold)?;
        tracing::info!(
            removed,
            threshold = threshold.unix_timestamp(),
            "cleaned up old conferences"
        );
        Ok(removed)
    }

    /// Run a sweep every `interval`, the first one a full interval from now,
    /// until the returned handle is shut down.
    pub fn spawn(self) -> SweeperHandle {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let sweeper = Arc::new(self);
        let task = tokio::spawn(async move {
            let period = sweeper.interval.min(MAX_SWEEP_INTERVAL);
            if period < sweeper.interval {
                tracing::warn!(interval = ?sweeper.interval, ?period, "sweep interval capped");
            }
            let start = Instant::now();
            let first = start.checked_add(period).unwrap_or_else(|| {
                tracing::error!(?period, "cannot schedule first sweep, sweeping now");
                start
            });
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let pass = Arc::clone(&sweeper);
                        let result = tokio::task::spawn_blocking(move || {
                            pass.run_once(OffsetDateTime::now_utc())
                        });
                        match result.await {
                            Ok(Ok(_)) => {}
                            Ok(Err(err)) => tracing::error!(%err, "conference cleanup failed"),
                            Err(err) => tracing::error!(%err, "conference cleanup task failed"),
                        }
                    }
                }
            }
            tracing::info!("conference sweeper stopped");
        });
        SweeperHandle { token, task }
    }
}

pub struct SweeperHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn cancellation_token(&self) -> CancellationToken { self.token.clone() }

    pub fn is_running(&self) -> bool { !self.task.is_finished() }

    /// Stop the sweeper and wait for an in-flight pass to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(err) = self.task.await {
            tracing::error!(%err, "conference sweeper did not stop cleanly");
        }
    }
}
