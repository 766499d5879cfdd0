//! In-flight operation tracking
//!
//! Every backend call goes through [`OperationTracker::track`]. The
//! tracker mints a monotonically increasing [`OperationId`], runs the
//! call on a Tokio task, and keeps the operation in its tracked set until
//! the settlement is consumed through [`OperationTracker::next_settlement`]
//! on the owning control loop.
//!
//! An operation leaves the tracked set exactly once, when it settles.
//! Cancelling only requests abandonment: the call still settles (as
//! [`Error::Cancelled`] unless its reply was already on the way), so the
//! id stays taken until then.

use crate::error::{Error, Result};
use crate::protocol::{Backend, Envelope, Method, Request};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Identity of one tracked call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct OperationId(u64);

impl OperationId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Completion state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationState {
    Pending,
    Succeeded,
    Failed,
    Cancelled,
}

type SuccessObserver = Box<dyn FnOnce(&Value)>;
type FailureObserver = Box<dyn FnOnce(&Error)>;
type SettledObserver = Box<dyn FnOnce(OperationState)>;

#[derive(Default)]
struct Observers {
    success: Option<SuccessObserver>,
    failure: Option<FailureObserver>,
    settled: Option<SettledObserver>,
}

/// Caller-side view of a tracked operation.
///
/// Observers registered here run on the control loop when the settlement
/// is consumed: `on_success` or `on_failure` first, then `on_settled`.
#[derive(Clone)]
pub struct OperationHandle {
    id: OperationId,
    token: CancellationToken,
    observers: Rc<RefCell<Observers>>,
}

impl OperationHandle {
    #[must_use]
    pub const fn id(&self) -> OperationId {
        self.id
    }

    /// Request abandonment of the underlying call.
    ///
    /// The operation stays tracked until it settles.
    pub fn cancel(&self) {
        debug!("Cancel requested for operation {}", self.id);
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    #[must_use]
    pub fn on_success(self, observer: impl FnOnce(&Value) + 'static) -> Self {
        self.observers.borrow_mut().success = Some(Box::new(observer));
        self
    }

    #[must_use]
    pub fn on_failure(self, observer: impl FnOnce(&Error) + 'static) -> Self {
        self.observers.borrow_mut().failure = Some(Box::new(observer));
        self
    }

    #[must_use]
    pub fn on_settled(self, observer: impl FnOnce(OperationState) + 'static) -> Self {
        self.observers.borrow_mut().settled = Some(Box::new(observer));
        self
    }
}

impl fmt::Debug for OperationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationHandle")
            .field("id", &self.id)
            .field("cancel_requested", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Snapshot of a tracked operation for progress display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationInfo {
    pub id: OperationId,
    pub method: &'static str,
    pub description: String,
    pub cancel_requested: bool,
}

/// A call that has finished, handed back to the control loop.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub id: OperationId,
    pub method: Method,
    pub description: String,
    pub outcome: Result<Value>,
}

impl Settlement {
    #[must_use]
    pub const fn state(&self) -> OperationState {
        match &self.outcome {
            Ok(_) => OperationState::Succeeded,
            Err(Error::Cancelled) => OperationState::Cancelled,
            Err(_) => OperationState::Failed,
        }
    }
}

struct Entry {
    method: Method,
    description: String,
    token: CancellationToken,
    observers: Rc<RefCell<Observers>>,
}

/// Owner of the set of in-flight backend calls.
pub struct OperationTracker {
    backend: Arc<dyn Backend>,
    next_id: u64,
    pending: BTreeMap<OperationId, Entry>,
    settled_tx: mpsc::UnboundedSender<(OperationId, Result<Value>)>,
    settled_rx: mpsc::UnboundedReceiver<(OperationId, Result<Value>)>,
    busy: watch::Sender<bool>,
}

impl OperationTracker {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let (settled_tx, settled_rx) = mpsc::unbounded_channel();
        let (busy, _) = watch::channel(false);
        Self {
            backend,
            next_id: 0,
            pending: BTreeMap::new(),
            settled_tx,
            settled_rx,
            busy,
        }
    }

    /// Issue `request` and track it until it settles.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn track(&mut self, request: Request, description: impl Into<String>) -> OperationHandle {
        self.next_id += 1;
        let id = OperationId(self.next_id);
        let description = description.into();
        let method = request.method;
        let token = CancellationToken::new();

        let backend = Arc::clone(&self.backend);
        let settled_tx = self.settled_tx.clone();
        let cancelled = token.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                () = cancelled.cancelled() => Err(Error::Cancelled),
                reply = backend.call(request) => reply.and_then(|raw| Envelope::open(raw, method)),
            };
            // The receiver only disappears with the tracker itself.
            let _ = settled_tx.send((id, outcome));
        });

        debug!("Tracking operation {} ({}): {}", id, method, description);
        let observers = Rc::new(RefCell::new(Observers::default()));
        self.pending.insert(
            id,
            Entry {
                method,
                description,
                token: token.clone(),
                observers: Rc::clone(&observers),
            },
        );
        self.publish_busy();

        OperationHandle {
            id,
            token,
            observers,
        }
    }

    /// Request cancellation of a tracked operation.
    ///
    /// Returns `false` if `id` is not (or no longer) tracked. The entry is
    /// not removed here; it leaves the set when the call settles.
    pub fn cancel(&self, id: OperationId) -> bool {
        match self.pending.get(&id) {
            Some(entry) => {
                debug!("Cancel requested for operation {}", id);
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Request cancellation of every tracked operation.
    pub fn cancel_all(&self) {
        for entry in self.pending.values() {
            entry.token.cancel();
        }
    }

    /// Wait for the next operation to settle.
    ///
    /// Removes it from the tracked set, runs its observers and returns the
    /// settlement. Returns `None` immediately when nothing is tracked.
    pub async fn next_settlement(&mut self) -> Option<Settlement> {
        while !self.pending.is_empty() {
            let (id, outcome) = self.settled_rx.recv().await?;
            if let Some(settlement) = self.settle(id, outcome) {
                return Some(settlement);
            }
        }
        None
    }

    fn settle(&mut self, id: OperationId, outcome: Result<Value>) -> Option<Settlement> {
        let Some(entry) = self.pending.remove(&id) else {
            warn!("Settlement for untracked operation {}", id);
            return None;
        };
        self.publish_busy();

        let settlement = Settlement {
            id,
            method: entry.method,
            description: entry.description,
            outcome,
        };
        debug!(
            "Operation {} settled as {:?}, {} still pending",
            id,
            settlement.state(),
            self.pending.len()
        );

        let observers = std::mem::take(&mut *entry.observers.borrow_mut());
        match &settlement.outcome {
            Ok(value) => {
                if let Some(observer) = observers.success {
                    observer(value);
                }
            }
            Err(error) => {
                if let Some(observer) = observers.failure {
                    observer(error);
                }
            }
        }
        if let Some(observer) = observers.settled {
            observer(settlement.state());
        }

        Some(settlement)
    }

    fn publish_busy(&self) {
        let busy = !self.pending.is_empty();
        self.busy.send_if_modified(|current| {
            if *current == busy {
                false
            } else {
                *current = busy;
                true
            }
        });
    }

    /// Subscribe to the "has pending work" signal.
    #[must_use]
    pub fn busy(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_tracked(&self, id: OperationId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Tracked operations in issue order.
    pub fn operations(&self) -> impl Iterator<Item = OperationInfo> + '_ {
        self.pending.iter().map(|(id, entry)| OperationInfo {
            id: *id,
            method: entry.method.as_str(),
            description: entry.description.clone(),
            cancel_requested: entry.token.is_cancelled(),
        })
    }
}

impl Drop for OperationTracker {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
