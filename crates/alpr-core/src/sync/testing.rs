//! In-process transport doubles for engine and coordinator tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::client::{SubmitOutcome, SyncClient};
use crate::models::{RemoteReceipt, ViolationPayload};

/// Accepts everything unless a plate has scripted outcomes queued.
#[derive(Default)]
pub struct ScriptedClient {
    script: Mutex<HashMap<String, VecDeque<SubmitOutcome>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes returned, in order, for submissions of `plate`.
    pub fn script(&self, plate: &str, outcomes: impl IntoIterator<Item = SubmitOutcome>) {
        self.script
            .lock()
            .unwrap()
            .entry(plate.to_string())
            .or_default()
            .extend(outcomes);
    }

    /// Plates submitted so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn next_outcome(&self, plate: &str) -> SubmitOutcome {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(plate.to_string());
            calls.len()
        };
        self.script
            .lock()
            .unwrap()
            .get_mut(plate)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| accepted(&format!("R-{plate}-{call_number}")))
    }
}

#[async_trait]
impl SyncClient for ScriptedClient {
    async fn submit(&self, payload: &ViolationPayload) -> SubmitOutcome {
        self.next_outcome(&payload.plate_number)
    }
}

/// Blocks every submission until the test hands out permits.
pub struct GatedClient {
    gate: Semaphore,
    entered: Semaphore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    submitted: AtomicUsize,
}

impl GatedClient {
    pub fn new() -> Self {
        Self {
            gate: Semaphore::new(0),
            entered: Semaphore::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            submitted: AtomicUsize::new(0),
        }
    }

    /// Wait until a submission is parked at the gate.
    pub async fn wait_entered(&self) {
        self.entered.acquire().await.unwrap().forget();
    }

    /// Let `count` submissions through.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SyncClient for GatedClient {
    async fn submit(&self, payload: &ViolationPayload) -> SubmitOutcome {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.entered.add_permits(1);

        self.gate.acquire().await.unwrap().forget();

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let n = self.submitted.fetch_add(1, Ordering::SeqCst) + 1;
        accepted(&format!("G-{}-{n}", payload.plate_number))
    }
}

/// Panics on its first submission, accepts afterwards.
#[derive(Default)]
pub struct PanickingOnceClient {
    calls: AtomicUsize,
}

#[async_trait]
impl SyncClient for PanickingOnceClient {
    async fn submit(&self, payload: &ViolationPayload) -> SubmitOutcome {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("transport blew up");
        }
        accepted(&format!("P-{}", payload.plate_number))
    }
}

pub fn accepted(remote_id: &str) -> SubmitOutcome {
    SubmitOutcome::Accepted(RemoteReceipt::new(remote_id))
}

pub fn unreachable() -> SubmitOutcome {
    SubmitOutcome::Unreachable {
        cause: "connection refused".into(),
    }
}

pub fn rejected(reason: &str) -> SubmitOutcome {
    SubmitOutcome::Rejected {
        reason: reason.into(),
    }
}
