//! Integration tests for `OperationTracker` under concurrent issuance.
//!
//! Calls park in a `GatedBackend` and are released out of order, some
//! after their operation was cancelled, so settlements interleave the
//! way they do against a real backend.

mod fake_backend;

use fake_backend::{GatedBackend, MailboxBuilder};
use mail_ui_core::{Error, OperationState, OperationTracker, Request};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::Arc;

fn gated() -> Arc<GatedBackend> {
    Arc::new(GatedBackend::new(
        MailboxBuilder::new()
            .account("work", "Work", "me@work.example")
            .folder("INBOX")
            .messages_range(1, 5)
            .build(),
    ))
}

// ── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_every_operation_leaves_exactly_once() {
    let backend = gated();
    let mut tracker = OperationTracker::new(backend.clone());

    let handles: Vec<_> = (0..30)
        .map(|i| {
            let request = if i % 2 == 0 {
                Request::get_accounts()
            } else {
                Request::sync_folders()
            };
            tracker.track(request, format!("call {i}"))
        })
        .collect();
    backend.wait_parked(30).await;
    assert_eq!(tracker.pending_count(), 30);

    for handle in handles.iter().step_by(3) {
        handle.cancel();
    }
    // Cancelled operations stay tracked until they settle.
    assert_eq!(tracker.pending_count(), 30);

    backend.release_all_reversed();

    let mut seen = HashSet::new();
    let mut cancelled = 0;
    while let Some(settlement) = tracker.next_settlement().await {
        assert!(seen.insert(settlement.id), "{} settled twice", settlement.id);
        if settlement.state() == OperationState::Cancelled {
            cancelled += 1;
        }
    }

    assert_eq!(seen.len(), 30);
    assert_eq!(cancelled, 10);
    assert_eq!(tracker.pending_count(), 0);
    assert!(handles.iter().all(|h| !tracker.is_tracked(h.id())));
}

#[tokio::test]
async fn test_busy_signal_follows_tracked_set() {
    let backend = gated();
    let mut tracker = OperationTracker::new(backend.clone());
    let busy = tracker.busy();
    assert!(!*busy.borrow());

    tracker.track(Request::get_accounts(), "accounts");
    tracker.track(Request::sync_folders(), "folders");
    assert!(*busy.borrow());

    backend.wait_parked(2).await;
    backend.release(1);
    tracker.next_settlement().await.unwrap();
    assert!(*busy.borrow(), "one call still pending");

    backend.release(0);
    tracker.next_settlement().await.unwrap();
    assert!(!*busy.borrow());
    assert!(tracker.next_settlement().await.is_none());
}

#[tokio::test]
async fn test_cancel_settles_as_cancelled() {
    let backend = gated();
    let mut tracker = OperationTracker::new(backend.clone());
    let id = tracker.track(Request::get_accounts(), "accounts").id();
    backend.wait_parked(1).await;

    assert!(tracker.cancel(id));
    assert!(tracker.is_tracked(id));
    assert!(tracker.operations().next().unwrap().cancel_requested);

    let settlement = tracker.next_settlement().await.unwrap();
    assert_eq!(settlement.id, id);
    assert_eq!(settlement.outcome, Err(Error::Cancelled));
    assert!(!tracker.is_tracked(id));
    assert!(!tracker.cancel(id), "settled ids are no longer cancellable");
}

#[tokio::test]
async fn test_reply_already_delivered_beats_late_cancel() {
    let backend = gated();
    let mut tracker = OperationTracker::new(backend.clone());
    let id = tracker.track(Request::get_accounts(), "accounts").id();

    backend.wait_parked(1).await;
    backend.release(0);
    backend.wait_answered(1).await;
    tracker.cancel(id);

    let settlement = tracker.next_settlement().await.unwrap();
    assert_eq!(settlement.state(), OperationState::Succeeded);
}

#[tokio::test]
async fn test_transport_failure_reaches_failure_observer() {
    let backend = gated();
    let mut tracker = OperationTracker::new(backend.clone());
    let log = Rc::new(RefCell::new(Vec::new()));

    let (failures, settled) = (Rc::clone(&log), Rc::clone(&log));
    let _handle = tracker
        .track(Request::sync_folders(), "folders")
        .on_failure(move |e| failures.borrow_mut().push(e.to_string()))
        .on_settled(move |state| settled.borrow_mut().push(format!("{state:?}")));

    backend.wait_parked(1).await;
    backend.fail(0, "connection reset");
    let settlement = tracker.next_settlement().await.unwrap();

    assert_eq!(settlement.state(), OperationState::Failed);
    assert_eq!(
        *log.borrow(),
        vec!["Transport error: connection reset", "Failed"]
    );
}

#[tokio::test]
async fn test_operations_list_in_issue_order() {
    let backend = gated();
    let mut tracker = OperationTracker::new(backend.clone());
    tracker.track(Request::get_accounts(), "Loading accounts");
    tracker.track(Request::sync_folders(), "Synchronizing folders");

    let listed: Vec<_> = tracker
        .operations()
        .map(|op| (op.method, op.description))
        .collect();
    assert_eq!(
        listed,
        vec![
            ("getAccounts", "Loading accounts".to_string()),
            ("syncFolders", "Synchronizing folders".to_string()),
        ]
    );
}
