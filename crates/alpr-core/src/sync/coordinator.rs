//! Single-flight scheduling of sync cycles
//!
//! Manual and scheduled triggers both go through [`SyncCoordinator`]. The
//! cycle itself runs on a spawned task that owns the in-flight guard, so a
//! caller that stops waiting does not cancel the cycle or leak the guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tokio::sync::{oneshot, watch};
use tracing::{debug, error, info, warn};

use super::engine::SyncEngine;
use crate::error::{Error, Result};
use crate::models::{CycleReport, TriggerOrigin, GENERIC_FAILURE_MESSAGE};
use crate::services::OutboxStore;

/// What happened to a trigger request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A cycle ran to its end (the report may carry an aborted outcome)
    Completed(CycleReport),
    /// A manual request arrived while another cycle was running
    AlreadyRunning,
    /// A scheduled run found another cycle in flight
    Skipped,
}

impl TriggerOutcome {
    /// Text suitable for a status line or toast.
    pub fn user_message(&self) -> String {
        match self {
            Self::Completed(report) => report.user_message(),
            Self::AlreadyRunning => "Sync already in progress".to_string(),
            Self::Skipped => "Sync skipped, another cycle is running".to_string(),
        }
    }
}

/// Observable coordinator state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub running: bool,
    pub last_report: Option<CycleReport>,
}

#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    engine: SyncEngine,
    in_flight: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

/// Held by the worker for the lifetime of one cycle.
///
/// Dropping it (including while unwinding) clears the in-flight flag
/// before the waiting caller is told anything.
struct FlightGuard {
    inner: Arc<Inner>,
    reply: Option<oneshot::Sender<CycleReport>>,
}

impl FlightGuard {
    fn acquire(inner: &Arc<Inner>, reply: oneshot::Sender<CycleReport>) -> Option<Self> {
        inner
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        inner.status.send_modify(|status| status.running = true);
        Some(Self {
            inner: Arc::clone(inner),
            reply: Some(reply),
        })
    }

    fn complete(mut self, report: CycleReport) {
        self.inner
            .status
            .send_modify(|status| status.last_report = Some(report.clone()));
        let reply = self.reply.take();
        drop(self);
        if let Some(reply) = reply {
            // The caller may have stopped waiting.
            let _ = reply.send(report);
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
        self.inner.status.send_modify(|status| status.running = false);
    }
}

impl SyncCoordinator {
    pub fn new(engine: SyncEngine) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            inner: Arc::new(Inner {
                engine,
                in_flight: AtomicBool::new(false),
                status,
            }),
        }
    }

    pub fn store(&self) -> &OutboxStore {
        self.inner.engine.store()
    }

    pub fn is_running(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Report of the most recent cycle run by this coordinator.
    pub fn last_report(&self) -> Option<CycleReport> {
        self.inner.status.borrow().last_report.clone()
    }

    /// Follow running/finished transitions.
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// Pending count for display.
    pub async fn pending_count(&self) -> Result<u64> {
        self.store().count_pending().await
    }

    /// Start a cycle unless one is already running, then wait for it.
    ///
    /// Dropping the returned future stops the wait only; the cycle keeps
    /// going and its report is still published.
    pub async fn trigger_sync(&self, origin: TriggerOrigin) -> Result<TriggerOutcome> {
        let (sender, receiver) = oneshot::channel();
        let Some(guard) = FlightGuard::acquire(&self.inner, sender) else {
            return Ok(match origin {
                TriggerOrigin::Manual => {
                    info!("Manual sync requested while a cycle is running");
                    TriggerOutcome::AlreadyRunning
                }
                TriggerOrigin::Scheduled => {
                    debug!("Scheduled sync skipped, a cycle is already running");
                    TriggerOutcome::Skipped
                }
            });
        };

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let report = inner.run_cycle(origin).await;
            guard.complete(report);
        });

        receiver.await.map(TriggerOutcome::Completed).map_err(|_| {
            error!("Sync worker exited without a report");
            Error::Worker(GENERIC_FAILURE_MESSAGE.to_string())
        })
    }
}

impl Inner {
    async fn run_cycle(&self, origin: TriggerOrigin) -> CycleReport {
        let started_at = Utc::now().trunc_subsecs(3);
        info!("Starting {origin} sync cycle");

        let outcome = self.engine.run_cycle().await.map_err(|error| {
            error!("Sync cycle aborted: {error}");
            error.to_string()
        });

        let report = CycleReport {
            origin,
            started_at,
            finished_at: Utc::now().trunc_subsecs(3),
            outcome,
        };

        if let Err(error) = self.engine.store().record_cycle(&report).await {
            warn!("Failed to record sync cycle: {error}");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ViolationPayload;
    use crate::sync::engine::SyncPolicy;
    use crate::sync::testing::{GatedClient, PanickingOnceClient, ScriptedClient};
    use crate::sync::SyncClient;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn payload(plate: &str) -> ViolationPayload {
        ViolationPayload::new(plate, "parking", 0.9, "Officer", "device-1")
    }

    fn coordinator(store: &OutboxStore, client: Arc<dyn SyncClient>) -> SyncCoordinator {
        let policy = SyncPolicy {
            pacing: Duration::ZERO,
            ..SyncPolicy::default()
        };
        SyncCoordinator::new(SyncEngine::new(store.clone(), client, policy))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn completed_cycle_is_reported_and_logged() {
        let store = OutboxStore::open_in_memory().unwrap();
        store.insert(payload("ABC")).await.unwrap();
        let coordinator = coordinator(&store, Arc::new(ScriptedClient::new()));
        let mut status = coordinator.subscribe();

        let outcome = coordinator
            .trigger_sync(TriggerOrigin::Manual)
            .await
            .unwrap();

        let TriggerOutcome::Completed(report) = outcome else {
            panic!("expected a completed cycle, got {outcome:?}");
        };
        assert_eq!(report.origin, TriggerOrigin::Manual);
        assert_eq!(report.summary().unwrap().synced, 1);
        assert_eq!(report.user_message(), "1 succeeded, 0 failed");

        assert!(!coordinator.is_running());
        assert_eq!(coordinator.last_report(), Some(report.clone()));
        assert!(status.has_changed().unwrap());
        assert_eq!(status.borrow_and_update().last_report, Some(report.clone()));
        assert_eq!(store.last_cycle().await.unwrap(), Some(report));
        assert_eq!(coordinator.pending_count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn report_timestamps_match_the_cycle_log() {
        let store = OutboxStore::open_in_memory().unwrap();
        let coordinator = coordinator(&store, Arc::new(ScriptedClient::new()));

        for _ in 0..3 {
            let outcome = coordinator
                .trigger_sync(TriggerOrigin::Scheduled)
                .await
                .unwrap();
            let TriggerOutcome::Completed(report) = outcome else {
                panic!("expected a completed cycle, got {outcome:?}");
            };
            assert_eq!(report.started_at.timestamp_subsec_nanos() % 1_000_000, 0);
            assert_eq!(report.finished_at.timestamp_subsec_nanos() % 1_000_000, 0);
            assert_eq!(store.last_cycle().await.unwrap(), Some(report));
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn idle_status_means_a_new_trigger_runs() {
        let store = OutboxStore::open_in_memory().unwrap();
        store.insert(payload("FIRST")).await.unwrap();
        let client = Arc::new(GatedClient::new());
        let coordinator = coordinator(&store, client.clone());
        let mut status = coordinator.subscribe();

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.trigger_sync(TriggerOrigin::Scheduled).await }
        });
        client.wait_entered().await;
        client.release(1);

        status
            .wait_for(|status| !status.running && status.last_report.is_some())
            .await
            .unwrap();
        assert!(!coordinator.is_running());

        let outcome = coordinator
            .trigger_sync(TriggerOrigin::Manual)
            .await
            .unwrap();
        assert!(matches!(outcome, TriggerOutcome::Completed(_)));
        assert!(matches!(
            first.await.unwrap().unwrap(),
            TriggerOutcome::Completed(_)
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn overlapping_triggers_never_run_concurrently() {
        let store = OutboxStore::open_in_memory().unwrap();
        store.insert(payload("ONE")).await.unwrap();
        store.insert(payload("TWO")).await.unwrap();
        let client = Arc::new(GatedClient::new());
        let coordinator = coordinator(&store, client.clone());

        let first = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.trigger_sync(TriggerOrigin::Scheduled).await }
        });
        client.wait_entered().await;
        assert!(coordinator.is_running());

        assert_eq!(
            coordinator
                .trigger_sync(TriggerOrigin::Manual)
                .await
                .unwrap(),
            TriggerOutcome::AlreadyRunning
        );
        assert_eq!(
            coordinator
                .trigger_sync(TriggerOrigin::Scheduled)
                .await
                .unwrap(),
            TriggerOutcome::Skipped
        );

        client.release(2);
        let outcome = first.await.unwrap().unwrap();
        let TriggerOutcome::Completed(report) = outcome else {
            panic!("expected a completed cycle, got {outcome:?}");
        };
        assert_eq!(report.summary().unwrap().synced, 2);
        assert_eq!(client.max_in_flight(), 1);
        assert_eq!(client.submitted(), 2);
        assert!(!coordinator.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn cycle_survives_caller_going_away() {
        let store = OutboxStore::open_in_memory().unwrap();
        let id = store.insert(payload("DETACHED")).await.unwrap();
        let client = Arc::new(GatedClient::new());
        let coordinator = coordinator(&store, client.clone());
        let mut status = coordinator.subscribe();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(50),
            coordinator.trigger_sync(TriggerOrigin::Manual),
        )
        .await;
        assert!(abandoned.is_err());
        assert!(coordinator.is_running());

        client.release(1);
        status
            .wait_for(|status| status.last_report.is_some() && !status.running)
            .await
            .unwrap();

        assert!(store.get(id).await.unwrap().unwrap().remote_id().is_some());
        assert!(!coordinator.is_running());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn guard_is_released_when_worker_panics() {
        let store = OutboxStore::open_in_memory().unwrap();
        let id = store.insert(payload("BOOM")).await.unwrap();
        let coordinator = coordinator(&store, Arc::new(PanickingOnceClient::default()));

        let error = coordinator
            .trigger_sync(TriggerOrigin::Manual)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Worker(_)));
        assert!(!coordinator.is_running());
        assert!(store.get(id).await.unwrap().unwrap().is_pending());

        let outcome = coordinator
            .trigger_sync(TriggerOrigin::Manual)
            .await
            .unwrap();
        assert!(matches!(outcome, TriggerOutcome::Completed(_)));
        assert!(!store.get(id).await.unwrap().unwrap().is_pending());
    }

    #[test]
    fn trigger_outcome_messages() {
        assert_eq!(
            TriggerOutcome::AlreadyRunning.user_message(),
            "Sync already in progress"
        );
        assert!(TriggerOutcome::Skipped.user_message().contains("skipped"));
    }
}
