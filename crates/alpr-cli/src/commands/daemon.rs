//! Periodic scheduling host.

use std::future::pending;
use std::path::Path;
use std::time::Duration;

use alpr_core::models::{CycleSummary, TriggerOrigin};
use alpr_core::sync::HttpSyncClient;
use alpr_core::{SyncCoordinator, SyncSettings, TriggerOutcome};
use single_instance::SingleInstance;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::commands::common::{acquire_cycle_lock, build_coordinator, open_store};
use crate::error::CliError;

const DAEMON_INSTANCE_NAME: &str = "alpr-outbox-daemon";
const INITIAL_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Exponential backoff between early retries, capped at the schedule interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryBackoff {
    initial: Duration,
    max: Duration,
    next: Option<Duration>,
}

impl RetryBackoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial: initial.min(max),
            max,
            next: None,
        }
    }

    /// Delay before the next early retry.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next.unwrap_or(self.initial);
        self.next = Some(delay.saturating_mul(2).min(self.max));
        delay
    }

    pub fn reset(&mut self) {
        self.next = None;
    }
}

/// What the scheduler should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickVerdict {
    Done,
    Retry,
}

impl TickVerdict {
    pub fn from_outcome(outcome: &TriggerOutcome) -> Self {
        match outcome {
            TriggerOutcome::Completed(report) => {
                if report.summary().map_or(true, CycleSummary::is_retryable) {
                    Self::Retry
                } else {
                    Self::Done
                }
            }
            TriggerOutcome::AlreadyRunning | TriggerOutcome::Skipped => Self::Done,
        }
    }
}

pub async fn run_daemon(
    interval_secs: Option<u64>,
    settings: &SyncSettings,
    db_path: &Path,
) -> Result<(), CliError> {
    let instance = SingleInstance::new(DAEMON_INSTANCE_NAME)
        .map_err(|error| CliError::InstanceLock(error.to_string()))?;
    if !instance.is_single() {
        return Err(CliError::DaemonAlreadyRunning);
    }

    let interval = interval_secs.map_or_else(|| settings.sync_interval(), Duration::from_secs);
    if interval.is_zero() {
        return Err(CliError::Config("interval must be positive".to_string()));
    }

    let store = open_store(db_path)?;
    let (coordinator, client) = build_coordinator(store, settings)?;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut backoff = RetryBackoff::new(INITIAL_RETRY_DELAY, interval);
    let mut retry_at: Option<Instant> = None;

    info!(
        "Scheduling sync every {}s against {}",
        interval.as_secs(),
        client.base_url()
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = wait_until(retry_at) => {
                debug!("Early retry due");
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Shutting down scheduler");
                break;
            }
        }

        retry_at = match scheduled_tick(&coordinator, &client, db_path).await {
            TickVerdict::Done => {
                backoff.reset();
                None
            }
            TickVerdict::Retry => {
                let delay = backoff.next_delay();
                info!("Retrying in {}s", delay.as_secs());
                Some(Instant::now() + delay)
            }
        };
    }

    Ok(())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => pending().await,
    }
}

async fn scheduled_tick(
    coordinator: &SyncCoordinator,
    client: &HttpSyncClient,
    db_path: &Path,
) -> TickVerdict {
    match coordinator.pending_count().await {
        Ok(pending) => debug!("{pending} violations pending"),
        Err(error) => warn!("Failed to count pending violations: {error}"),
    }

    if let Err(error) = client.health().await {
        warn!("Authority unreachable, deferring scheduled sync: {error}");
        return TickVerdict::Retry;
    }

    let lock = match acquire_cycle_lock(db_path) {
        Ok(Some(lock)) => lock,
        Ok(None) => {
            debug!("Another process is syncing this outbox");
            return TickVerdict::Done;
        }
        Err(error) => {
            warn!("{error}");
            return TickVerdict::Retry;
        }
    };

    let verdict = match coordinator.trigger_sync(TriggerOrigin::Scheduled).await {
        Ok(outcome) => {
            if let TriggerOutcome::Completed(report) = &outcome {
                info!("Scheduled sync: {}", report.user_message());
            }
            TickVerdict::from_outcome(&outcome)
        }
        Err(error) => {
            error!("Scheduled sync failed: {error}");
            TickVerdict::Retry
        }
    };
    drop(lock);
    verdict
}
