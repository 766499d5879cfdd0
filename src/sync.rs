//! UID-windowed message list synchronization
//!
//! Each open folder has a [`SyncState`] holding a [`SyncWindow`]: the
//! messages materialized so far, newest first, bounded by `newest_uid`
//! and `oldest_uid`. Scrolling back fetches a page strictly older than
//! `oldest_uid`; refreshing fetches everything strictly newer than
//! `newest_uid`. At most one fetch per folder is in flight; issuing a new
//! one cancels the previous, and a settlement that is not the current
//! fetch is rejected as [`Error::Stale`] without touching the window.

use crate::error::{Error, Result};
use crate::message::{MessageSummary, Uid};
use crate::protocol::{Method, MessagesReply, Request, decode};
use crate::tracker::{OperationHandle, OperationId, OperationTracker, Settlement};
use serde::Serialize;
use std::fmt;
use tracing::{debug, info, warn};

/// Messages requested per older-page fetch unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Identifies one folder of one account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FolderKey {
    pub account: String,
    pub folder: String,
}

impl FolderKey {
    #[must_use]
    pub fn new(account: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            folder: folder.into(),
        }
    }
}

impl fmt::Display for FolderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.account, self.folder)
    }
}

/// Which end of the window a fetch extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Older,
    Newer,
}

/// The materialized, newest-first message list of one folder.
///
/// Invariants: UIDs are distinct and strictly descending, `oldest_uid`
/// is the UID of the last message, and `newest_uid` is at least the UID
/// of the first one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncWindow {
    newest_uid: Option<Uid>,
    oldest_uid: Option<Uid>,
    reached_end: bool,
    messages: Vec<MessageSummary>,
}

impl SyncWindow {
    #[must_use]
    pub const fn newest_uid(&self) -> Option<Uid> {
        self.newest_uid
    }

    #[must_use]
    pub const fn oldest_uid(&self) -> Option<Uid> {
        self.oldest_uid
    }

    /// Nothing older than `oldest_uid` exists on the backend.
    #[must_use]
    pub const fn reached_end(&self) -> bool {
        self.reached_end
    }

    #[must_use]
    pub fn messages(&self) -> &[MessageSummary] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Neither bound is known yet.
    #[must_use]
    pub const fn is_unsynced(&self) -> bool {
        self.newest_uid.is_none() && self.oldest_uid.is_none()
    }

    fn position(&self, uid: Uid) -> std::result::Result<usize, usize> {
        self.messages.binary_search_by(|m| uid.cmp(&m.uid))
    }

    #[must_use]
    pub fn contains(&self, uid: Uid) -> bool {
        self.position(uid).is_ok()
    }

    #[must_use]
    pub fn get(&self, uid: Uid) -> Option<&MessageSummary> {
        self.position(uid).ok().map(|i| &self.messages[i])
    }

    pub fn get_mut(&mut self, uid: Uid) -> Option<&mut MessageSummary> {
        self.position(uid).ok().map(|i| &mut self.messages[i])
    }

    /// Append a page of older messages at the tail.
    ///
    /// Only messages strictly older than the current tail are kept. An
    /// empty page, or an explicit `no_more`, marks the end of the folder.
    /// A non-empty page with nothing older than the tail is malformed.
    fn merge_older(&mut self, page: Vec<MessageSummary>, no_more: bool) -> Result<usize> {
        if page.is_empty() {
            self.reached_end = true;
            return Ok(0);
        }

        let floor = self.oldest_uid;
        let received = page.len();
        let older = self.distinct_descending(page, |uid| floor.is_none_or(|oldest| uid < oldest));
        if older.is_empty() {
            warn!("Older page of {} message(s) brought nothing below {:?}", received, floor);
            return Err(Error::malformed(
                Method::GetMessages.as_str(),
                format!("{received} message(s) none older than the window"),
            ));
        }

        let added = older.len();
        self.messages.extend(older);
        if no_more {
            self.reached_end = true;
        }
        self.refresh_bounds();
        Ok(added)
    }

    /// Prepend messages newer than the head.
    fn merge_newer(&mut self, batch: Vec<MessageSummary>) -> usize {
        let ceiling = self.newest_uid;
        let newer =
            self.distinct_descending(batch, |uid| ceiling.is_none_or(|newest| uid > newest));

        let added = newer.len();
        self.messages.splice(0..0, newer);
        self.refresh_bounds();
        added
    }

    /// Keep the messages passing `keep` that are not already present,
    /// sorted newest first with duplicates removed.
    fn distinct_descending(
        &self,
        batch: Vec<MessageSummary>,
        keep: impl Fn(Uid) -> bool,
    ) -> Vec<MessageSummary> {
        let mut kept: Vec<MessageSummary> = batch
            .into_iter()
            .filter(|m| keep(m.uid) && !self.contains(m.uid))
            .collect();
        kept.sort_by(|a, b| b.uid.cmp(&a.uid));
        kept.dedup_by_key(|m| m.uid);
        kept
    }

    fn refresh_bounds(&mut self) {
        if let Some(first) = self.messages.first() {
            self.newest_uid = Some(self.newest_uid.map_or(first.uid, |n| n.max(first.uid)));
        }
        if let Some(last) = self.messages.last() {
            self.oldest_uid = Some(last.uid);
        }
        debug_assert!(
            self.messages.windows(2).all(|w| w[0].uid > w[1].uid),
            "sync window must stay strictly descending"
        );
    }
}

/// Result of applying a fetch to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WindowUpdate {
    pub direction: Direction,
    pub added: usize,
    pub reached_end: bool,
}

struct InFlight {
    handle: OperationHandle,
    direction: Direction,
}

/// Sync state of one folder: its window and its single in-flight fetch.
pub struct SyncState {
    key: FolderKey,
    page_size: usize,
    window: SyncWindow,
    in_flight: Option<InFlight>,
}

impl SyncState {
    #[must_use]
    pub fn new(key: FolderKey, page_size: usize) -> Self {
        Self {
            key,
            page_size: page_size.max(1),
            window: SyncWindow::default(),
            in_flight: None,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &FolderKey {
        &self.key
    }

    #[must_use]
    pub const fn window(&self) -> &SyncWindow {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut SyncWindow {
        &mut self.window
    }

    #[must_use]
    pub const fn page_size(&self) -> usize {
        self.page_size
    }

    /// The fetch currently considered current, if any.
    #[must_use]
    pub fn in_flight(&self) -> Option<OperationId> {
        self.in_flight.as_ref().map(|f| f.handle.id())
    }

    #[must_use]
    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Fetch the next page strictly older than the window's tail.
    ///
    /// Returns `None` without issuing anything once the folder's end has
    /// been reached.
    pub fn request_older(&mut self, tracker: &mut OperationTracker) -> Option<OperationId> {
        if self.window.reached_end {
            debug!("{}: no older messages to fetch", self.key);
            return None;
        }

        let request = Request::get_messages(
            &self.key.account,
            &self.key.folder,
            None,
            self.window.oldest_uid,
            self.page_size,
        );
        Some(self.issue(tracker, request, Direction::Older))
    }

    /// Fetch every message strictly newer than the window's head.
    ///
    /// On a window that has never been synced this also asks for the
    /// first page, which seeds both bounds.
    pub fn request_newer(&mut self, tracker: &mut OperationTracker) -> OperationId {
        let seeding = self.window.is_unsynced();
        let request = Request::get_messages(
            &self.key.account,
            &self.key.folder,
            self.window.newest_uid,
            None,
            if seeding { self.page_size } else { 0 },
        );
        self.issue(tracker, request, Direction::Newer)
    }

    fn issue(
        &mut self,
        tracker: &mut OperationTracker,
        request: Request,
        direction: Direction,
    ) -> OperationId {
        self.cancel();
        let description = match direction {
            Direction::Older => format!("Fetching older messages of {}", self.key.folder),
            Direction::Newer => format!("Checking {} for new messages", self.key.folder),
        };
        let handle = tracker.track(request, description);
        let id = handle.id();
        self.in_flight = Some(InFlight { handle, direction });
        id
    }

    /// Cancel the in-flight fetch and stop considering it current.
    pub fn cancel(&mut self) -> Option<OperationId> {
        let superseded = self.in_flight.take()?;
        debug!(
            "{}: superseding fetch {}",
            self.key,
            superseded.handle.id()
        );
        superseded.handle.cancel();
        Some(superseded.handle.id())
    }

    /// Drop the window and any in-flight fetch.
    pub fn reset(&mut self) {
        self.cancel();
        self.window = SyncWindow::default();
    }

    /// Whether `id` is this folder's current fetch.
    #[must_use]
    pub fn owns(&self, id: OperationId) -> bool {
        self.in_flight() == Some(id)
    }

    /// Merge a settled fetch into the window.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stale`] if the settlement is not the current fetch
    /// (the window is untouched), the call's own error if it failed, or
    /// [`Error::Backend`] if the reply is malformed.
    pub fn apply(&mut self, settlement: &Settlement) -> Result<WindowUpdate> {
        let Some(current) = self.in_flight.take_if(|f| f.handle.id() == settlement.id) else {
            debug!("{}: discarding stale fetch {}", self.key, settlement.id);
            return Err(Error::Stale(settlement.id));
        };

        let value = settlement.outcome.as_ref().map_err(Clone::clone)?;
        let reply: MessagesReply = decode(value, Method::GetMessages)?;

        let added = match current.direction {
            Direction::Older => self.window.merge_older(reply.messages, reply.no_more)?,
            Direction::Newer => {
                let mut added = 0;
                if self.window.is_unsynced() {
                    // A seed describes the folder afresh; an earlier empty
                    // result no longer holds.
                    self.window.reached_end = false;
                    added += self.window.merge_older(reply.messages, reply.no_more)?;
                }
                added + self.window.merge_newer(reply.new_messages)
            }
        };

        info!(
            "{}: merged {} {:?} message(s), window holds {}",
            self.key,
            added,
            current.direction,
            self.window.len()
        );
        Ok(WindowUpdate {
            direction: current.direction,
            added,
            reached_end: self.window.reached_end,
        })
    }
}

impl fmt::Debug for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncState")
            .field("key", &self.key)
            .field("page_size", &self.page_size)
            .field("window", &self.window)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Backend;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Arc;

    struct Silent;

    #[async_trait]
    impl Backend for Silent {
        async fn call(&self, _request: Request) -> Result<Value> {
            futures::future::pending().await
        }
    }

    fn summaries(uids: &[u32]) -> Value {
        Value::Array(uids.iter().map(|uid| json!({ "uid": uid.to_string() })).collect())
    }

    fn settled(id: OperationId, result: Value) -> Settlement {
        Settlement {
            id,
            method: Method::GetMessages,
            description: String::new(),
            outcome: Ok(result),
        }
    }

    fn uids(window: &SyncWindow) -> Vec<u32> {
        window.messages().iter().map(|m| m.uid.get()).collect()
    }

    fn state() -> (SyncState, OperationTracker) {
        (
            SyncState::new(FolderKey::new("acc", "INBOX"), 3),
            OperationTracker::new(Arc::new(Silent)),
        )
    }

    #[tokio::test]
    async fn older_pages_append_at_tail() {
        let (mut sync, mut tracker) = state();

        let id = sync.request_older(&mut tracker).unwrap();
        sync.apply(&settled(id, json!({ "messages": summaries(&[10, 9, 8]) })))
            .unwrap();
        let id = sync.request_older(&mut tracker).unwrap();
        let update = sync
            .apply(&settled(id, json!({ "messages": summaries(&[7, 6]) })))
            .unwrap();

        assert_eq!(update.added, 2);
        assert_eq!(uids(sync.window()), vec![10, 9, 8, 7, 6]);
        assert_eq!(sync.window().newest_uid(), Some(Uid(10)));
        assert_eq!(sync.window().oldest_uid(), Some(Uid(6)));
        assert!(!sync.window().reached_end());
    }

    #[tokio::test]
    async fn full_page_is_not_the_end() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_older(&mut tracker).unwrap();
        let update = sync
            .apply(&settled(id, json!({ "messages": summaries(&[3, 2, 1]) })))
            .unwrap();
        assert!(!update.reached_end);

        let id = sync.request_older(&mut tracker).unwrap();
        let update = sync.apply(&settled(id, json!({ "messages": [] }))).unwrap();
        assert!(update.reached_end);
        assert!(sync.request_older(&mut tracker).is_none());
    }

    #[tokio::test]
    async fn explicit_end_marker_is_honoured() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_older(&mut tracker).unwrap();
        let update = sync
            .apply(&settled(id, json!({ "messages": summaries(&[2, 1]), "noMore": true })))
            .unwrap();
        assert!(update.reached_end);
        assert_eq!(uids(sync.window()), vec![2, 1]);
    }

    #[tokio::test]
    async fn empty_folder_ends_immediately() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_older(&mut tracker).unwrap();
        sync.apply(&settled(id, json!({ "messages": [], "newMessages": [] })))
            .unwrap();
        assert!(sync.window().is_empty());
        assert_eq!(sync.window().newest_uid(), None);
        assert_eq!(sync.window().oldest_uid(), None);
        assert!(sync.window().reached_end());
    }

    #[tokio::test]
    async fn newer_messages_are_prepended_without_duplicates() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_older(&mut tracker).unwrap();
        sync.apply(&settled(id, json!({ "messages": summaries(&[5, 4, 3]) })))
            .unwrap();

        let id = sync.request_newer(&mut tracker);
        let update = sync
            .apply(&settled(id, json!({ "newMessages": summaries(&[8, 5, 6, 7, 8]) })))
            .unwrap();

        assert_eq!(update.added, 3);
        assert_eq!(uids(sync.window()), vec![8, 7, 6, 5, 4, 3]);
        assert_eq!(sync.window().newest_uid(), Some(Uid(8)));
        assert_eq!(sync.window().oldest_uid(), Some(Uid(3)));
    }

    #[tokio::test]
    async fn newer_on_empty_window_seeds_both_bounds() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_newer(&mut tracker);
        sync.apply(&settled(
            id,
            json!({ "newMessages": [], "messages": summaries(&[30, 29, 28]) }),
        ))
        .unwrap();

        assert_eq!(sync.window().newest_uid(), Some(Uid(30)));
        assert_eq!(sync.window().oldest_uid(), Some(Uid(28)));
    }

    #[tokio::test]
    async fn seed_after_empty_folder_reopens_paging() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_older(&mut tracker).unwrap();
        sync.apply(&settled(id, json!({ "messages": [] }))).unwrap();
        assert!(sync.window().reached_end());

        let id = sync.request_newer(&mut tracker);
        let update = sync
            .apply(&settled(id, json!({ "messages": summaries(&[9, 8, 7]) })))
            .unwrap();
        assert!(!update.reached_end);
        assert!(sync.request_older(&mut tracker).is_some());
    }

    #[tokio::test]
    async fn older_page_above_the_tail_is_malformed() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_older(&mut tracker).unwrap();
        sync.apply(&settled(id, json!({ "messages": summaries(&[6, 5, 4]) })))
            .unwrap();

        let id = sync.request_older(&mut tracker).unwrap();
        let result = sync.apply(&settled(id, json!({ "messages": summaries(&[6, 5]) })));
        assert!(matches!(result, Err(Error::Backend(_))));
        assert_eq!(uids(sync.window()), vec![6, 5, 4]);
        assert!(!sync.window().reached_end());
    }

    #[tokio::test]
    async fn superseded_fetch_is_stale() {
        let (mut sync, mut tracker) = state();
        let first = sync.request_older(&mut tracker).unwrap();
        let second = sync.request_newer(&mut tracker);
        assert_ne!(first, second);
        assert_eq!(sync.in_flight(), Some(second));

        let result = sync.apply(&settled(first, json!({ "messages": summaries(&[9]) })));
        assert_eq!(result, Err(Error::Stale(first)));
        assert!(sync.window().is_empty());
        assert!(sync.owns(second));
    }

    #[tokio::test]
    async fn reset_discards_window_and_fetch() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_older(&mut tracker).unwrap();
        sync.apply(&settled(id, json!({ "messages": summaries(&[2, 1]) })))
            .unwrap();
        let pending = sync.request_newer(&mut tracker);

        sync.reset();
        assert!(sync.window().is_unsynced());
        assert!(!sync.is_fetching());
        assert_eq!(
            sync.apply(&settled(pending, json!({}))),
            Err(Error::Stale(pending))
        );
    }

    #[tokio::test]
    async fn malformed_reply_is_a_backend_error() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_older(&mut tracker).unwrap();
        let result = sync.apply(&settled(id, json!({ "messages": [{ "subject": "no uid" }] })));
        assert!(matches!(result, Err(Error::Backend(_))));
        assert!(!sync.is_fetching());
    }

    #[tokio::test]
    async fn failed_fetch_propagates_its_error() {
        let (mut sync, mut tracker) = state();
        let id = sync.request_older(&mut tracker).unwrap();
        let settlement = Settlement {
            id,
            method: Method::GetMessages,
            description: String::new(),
            outcome: Err(Error::Transport("gone".to_string())),
        };
        assert_eq!(
            sync.apply(&settlement),
            Err(Error::Transport("gone".to_string()))
        );
        assert!(sync.window().is_unsynced());
    }
}
