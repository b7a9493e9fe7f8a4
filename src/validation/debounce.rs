//! Debounced availability checks for unique fields.
//!
//! Each `FieldKind` owns one slot. Every call to `check_field` bumps the
//! slot's sequence number; a spawned task waits out the debounce window,
//! issues the remote check and applies its result only if its sequence
//! number is still the newest one for the slot. Superseded results are
//! discarded no matter when they arrive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use super::checker::UniquenessChecker;
use super::status::{FieldKind, FieldValidationStatus};
use crate::config::ValidatorConfig;
use crate::error::RemoteCheckError;

/// Per-kind validation slot.
struct Slot {
    /// Sequence number of the newest request issued for this slot.
    latest: u64,
    /// Trimmed value the newest request was issued for.
    value: String,
    tx: watch::Sender<FieldValidationStatus>,
    pending: Option<JoinHandle<()>>,
}

impl Slot {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(FieldValidationStatus::Idle);
        Self {
            latest: 0,
            value: String::new(),
            tx,
            pending: None,
        }
    }

    fn current(&self) -> FieldValidationStatus {
        self.tx.borrow().clone()
    }
}

struct Inner {
    checker: Arc<dyn UniquenessChecker>,
    config: ValidatorConfig,
    slots: Mutex<HashMap<FieldKind, Slot>>,
}

impl Inner {
    fn slots(&self) -> MutexGuard<'_, HashMap<FieldKind, Slot>> {
        self.slots.lock().expect("validator slot mutex poisoned")
    }

    fn is_latest(&self, kind: FieldKind, seq: u64) -> bool {
        self.slots()
            .get(&kind)
            .is_some_and(|slot| slot.latest == seq)
    }

    async fn run_check(self: Arc<Self>, kind: FieldKind, seq: u64, value: String) {
        tokio::time::sleep(self.config.debounce).await;

        if !self.is_latest(kind, seq) {
            debug!(kind = %kind, seq, "Field check superseded before dispatch");
            return;
        }

        debug!(kind = %kind, seq, "Dispatching availability check");
        let outcome = match tokio::time::timeout(
            self.config.check_timeout,
            self.checker.check(kind, &value),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RemoteCheckError::Timeout(self.config.check_timeout)),
        };

        let status = match outcome {
            Ok(availability) if availability.available => FieldValidationStatus::Valid,
            Ok(_) => FieldValidationStatus::taken(kind),
            Err(e) => {
                warn!(kind = %kind, seq, error = %e, "Availability check failed");
                FieldValidationStatus::retry_later(kind)
            }
        };

        self.apply(kind, seq, status);
    }

    /// Publish `status` if `seq` is still the newest request for the slot.
    fn apply(&self, kind: FieldKind, seq: u64, status: FieldValidationStatus) -> bool {
        let mut slots = self.slots();
        match slots.get_mut(&kind) {
            Some(slot) if slot.latest == seq => {
                debug!(kind = %kind, seq, status = %status, "Field status updated");
                slot.tx.send_replace(status);
                slot.pending = None;
                true
            }
            Some(slot) => {
                debug!(
                    kind = %kind,
                    seq,
                    latest = slot.latest,
                    "Discarding stale availability result"
                );
                false
            }
            None => false,
        }
    }
}

/// Rate-limited, race-safe availability checks for unique fields.
///
/// Cheap to clone; clones share the same slots. Must be used from within a
/// tokio runtime since checks run on spawned tasks.
#[derive(Clone)]
pub struct DebouncedValidator {
    inner: Arc<Inner>,
}

impl DebouncedValidator {
    pub fn new(checker: Arc<dyn UniquenessChecker>, config: ValidatorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                checker,
                config,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.inner.config
    }

    /// Record a new value for `kind` and schedule a debounced check.
    ///
    /// Returns the slot's status right after scheduling: `Idle` for values
    /// below the minimum length, `Checking` otherwise. Re-submitting the
    /// value the slot already holds does not issue a new request unless the
    /// previous outcome was `Invalid`.
    pub fn check_field(&self, kind: FieldKind, value: &str) -> FieldValidationStatus {
        let value = value.trim();
        let mut slots = self.inner.slots();
        let slot = slots.entry(kind).or_insert_with(Slot::new);

        let current = slot.current();
        if slot.latest > 0
            && slot.value == value
            && !matches!(current, FieldValidationStatus::Invalid { .. })
        {
            return current;
        }

        slot.latest += 1;
        let seq = slot.latest;
        slot.value = value.to_string();

        if let Some(handle) = slot.pending.take()
            && self.inner.config.abort_superseded
        {
            handle.abort();
        }

        if value.chars().count() < self.inner.config.min_length(kind) {
            debug!(kind = %kind, seq, "Field value below minimum length");
            slot.tx.send_replace(FieldValidationStatus::Idle);
            return FieldValidationStatus::Idle;
        }

        debug!(kind = %kind, seq, "Field check scheduled");
        slot.tx.send_replace(FieldValidationStatus::Checking);
        let inner = Arc::clone(&self.inner);
        slot.pending = Some(tokio::spawn(inner.run_check(kind, seq, value.to_string())));
        FieldValidationStatus::Checking
    }

    /// Current status of a slot.
    pub fn status(&self, kind: FieldKind) -> FieldValidationStatus {
        self.inner
            .slots()
            .get(&kind)
            .map(Slot::current)
            .unwrap_or_default()
    }

    /// Status of a slot, but only if it belongs to `value`.
    fn status_for(&self, kind: FieldKind, value: &str) -> FieldValidationStatus {
        let slots = self.inner.slots();
        match slots.get(&kind) {
            Some(slot) if slot.value == value.trim() => slot.current(),
            _ => FieldValidationStatus::Checking,
        }
    }

    /// Subscribe to status changes of a slot.
    pub fn subscribe(&self, kind: FieldKind) -> watch::Receiver<FieldValidationStatus> {
        self.inner
            .slots()
            .entry(kind)
            .or_insert_with(Slot::new)
            .tx
            .subscribe()
    }

    /// Stream of status changes for a slot, starting with the current value.
    pub fn status_stream(&self, kind: FieldKind) -> WatchStream<FieldValidationStatus> {
        WatchStream::new(self.subscribe(kind))
    }

    /// Check `value` and wait until the slot settles.
    ///
    /// Returns `Checking` if a different value superseded this one before
    /// it settled.
    pub async fn verify(&self, kind: FieldKind, value: &str) -> FieldValidationStatus {
        let mut rx = self.subscribe(kind);
        let status = self.check_field(kind, value);
        if status.is_settled() {
            return status;
        }

        let budget = self.inner.config.debounce + self.inner.config.check_timeout * 2;
        let settled = tokio::time::timeout(budget, async {
            loop {
                if rx.changed().await.is_err() {
                    break;
                }
                if rx.borrow_and_update().is_settled() {
                    break;
                }
            }
        })
        .await;

        if settled.is_err() {
            warn!(kind = %kind, "Field check did not settle in time");
            return FieldValidationStatus::retry_later(kind);
        }
        self.status_for(kind, value)
    }

    /// Drop any pending check for `kind` and return the slot to `Idle`.
    pub fn reset(&self, kind: FieldKind) {
        let mut slots = self.inner.slots();
        if let Some(slot) = slots.get_mut(&kind) {
            slot.latest += 1;
            slot.value.clear();
            if let Some(handle) = slot.pending.take() {
                handle.abort();
            }
            slot.tx.send_replace(FieldValidationStatus::Idle);
        }
    }
}
