//! The state core a mail view drives
//!
//! [`MailSession`] owns every component: the operation tracker, the
//! account directory, one [`SyncState`] per folder and the open message.
//! UI actions are methods that issue tracked calls; settlements come back
//! through [`MailSession::process_next`], which routes each to the state
//! it updates and publishes a [`ChangeEvent`]. Failures surface only as
//! [`ChangeEvent::Error`].
//!
//! # Example
//!
//! ```no_run
//! use mail_ui_core::{CoreConfig, MailSession, MemoryBackend, Snapshot};
//! use std::sync::Arc;
//!
//! # async fn example() {
//! let backend = Arc::new(MemoryBackend::new(Snapshot::default()));
//! let mut session = MailSession::new(backend, &CoreConfig::default());
//! session.refresh_accounts();
//! session.sync_folders();
//! session.run_until_idle().await;
//! # }
//! ```

use crate::compose::{AccountForm, ComposerForm, Draft, ReplyMode};
use crate::config::CoreConfig;
use crate::directory::AccountDirectory;
use crate::error::{Error, Result};
use crate::events::{ChangeEvent, Notifier};
use crate::flag::Flag;
use crate::message::Uid;
use crate::mime::{DisplayParts, MessageHeaders, MimeNode, select_display_parts};
use crate::protocol::{AccountFolders, AccountWire, Backend, Method, Request, decode};
use crate::sync::{FolderKey, SyncState, SyncWindow};
use crate::tracker::{OperationId, OperationInfo, OperationTracker, Settlement};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

/// The message currently open for reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageView {
    pub key: FolderKey,
    pub uid: Uid,
    pub tree: MimeNode,
    pub parts: DisplayParts,
}

/// What a tracked call was issued for.
#[derive(Debug)]
enum Purpose {
    Accounts,
    Folders,
    Fetch(FolderKey),
    Open { key: FolderKey, uid: Uid },
    Flags {
        key: FolderKey,
        uid: Uid,
        set: Vec<Flag>,
        unset: Vec<Flag>,
    },
    AccountChange { removed: Option<String> },
    Compose,
}

/// Component-owned UI state over an asynchronous mail backend.
///
/// Not `Send`: a session lives on one control loop, the way observers on
/// its operations do.
pub struct MailSession {
    tracker: OperationTracker,
    directory: AccountDirectory,
    folders: HashMap<FolderKey, SyncState>,
    active: Option<FolderKey>,
    message_view: Option<MessageView>,
    purposes: HashMap<OperationId, Purpose>,
    accounts_call: Option<OperationId>,
    folders_call: Option<OperationId>,
    open_call: Option<OperationId>,
    notifier: Notifier,
    page_size: usize,
}

impl MailSession {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, config: &CoreConfig) -> Self {
        Self {
            tracker: OperationTracker::new(backend),
            directory: AccountDirectory::new(),
            folders: HashMap::new(),
            active: None,
            message_view: None,
            purposes: HashMap::new(),
            accounts_call: None,
            folders_call: None,
            open_call: None,
            notifier: Notifier::new(config.event_capacity),
            page_size: config.page_size,
        }
    }

    // --- Accessors ---

    #[must_use]
    pub const fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    /// The selected folder, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&FolderKey> {
        self.active.as_ref()
    }

    #[must_use]
    pub fn window(&self, key: &FolderKey) -> Option<&SyncWindow> {
        self.folders.get(key).map(SyncState::window)
    }

    #[must_use]
    pub fn active_window(&self) -> Option<&SyncWindow> {
        self.window(self.active.as_ref()?)
    }

    #[must_use]
    pub const fn message_view(&self) -> Option<&MessageView> {
        self.message_view.as_ref()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    /// The "has pending work" signal.
    #[must_use]
    pub fn busy(&self) -> watch::Receiver<bool> {
        self.tracker.busy()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tracker.pending_count()
    }

    /// In-flight operations for progress display, in issue order.
    #[must_use]
    pub fn operations(&self) -> Vec<OperationInfo> {
        self.tracker.operations().collect()
    }

    /// Cancel a tracked operation on the user's behalf.
    pub fn cancel(&self, id: OperationId) -> bool {
        self.tracker.cancel(id)
    }

    // --- Directory ---

    /// Reload the account list, superseding any reload still in flight.
    pub fn refresh_accounts(&mut self) -> OperationId {
        self.supersede(self.accounts_call);
        let id = self.issue(Request::get_accounts(), "Loading accounts", Purpose::Accounts);
        self.accounts_call = Some(id);
        id
    }

    /// Reload every account's folder tree, superseding any reload still
    /// in flight.
    pub fn sync_folders(&mut self) -> OperationId {
        self.supersede(self.folders_call);
        let id = self.issue(
            Request::sync_folders(),
            "Synchronizing folders",
            Purpose::Folders,
        );
        self.folders_call = Some(id);
        id
    }

    // --- Message list ---

    /// Make `folder` of `account` the active folder and fetch its first
    /// page.
    ///
    /// The previous folder's fetch is cancelled and the new folder's
    /// window starts empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownFolder`] if the account's folder tree is
    /// loaded and does not contain `folder`.
    pub fn select_folder(&mut self, account: &str, folder: &str) -> Result<Option<OperationId>> {
        if let Some(known) = self.directory.account(account)
            && !known.folders.is_empty()
            && known.folder(folder).is_none()
        {
            return Err(Error::UnknownFolder {
                account: account.to_string(),
                folder: folder.to_string(),
            });
        }

        let key = FolderKey::new(account, folder);
        if let Some(previous) = self.active.take()
            && let Some(state) = self.folders.get_mut(&previous)
        {
            state.cancel();
        }
        self.close_message();

        info!("Selecting folder {}", key);
        state_for(&mut self.folders, &key, self.page_size).reset();
        self.active = Some(key.clone());
        self.notifier.emit(ChangeEvent::WindowChanged { key });

        self.request_older()
    }

    /// Fetch the next older page of the active folder.
    ///
    /// Returns `Ok(None)` once the folder's end has been reached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveFolder`] if no folder is selected.
    pub fn request_older(&mut self) -> Result<Option<OperationId>> {
        let key = self.active.clone().ok_or(Error::NoActiveFolder)?;
        let state = state_for(&mut self.folders, &key, self.page_size);
        let Some(id) = state.request_older(&mut self.tracker) else {
            return Ok(None);
        };
        self.register(id, Purpose::Fetch(key));
        Ok(Some(id))
    }

    /// Fetch everything newer than the active folder's newest message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveFolder`] if no folder is selected.
    pub fn request_newer(&mut self) -> Result<OperationId> {
        let key = self.active.clone().ok_or(Error::NoActiveFolder)?;
        let state = state_for(&mut self.folders, &key, self.page_size);
        let id = state.request_newer(&mut self.tracker);
        self.register(id, Purpose::Fetch(key));
        Ok(id)
    }

    // --- Message view ---

    /// Fetch and open message `uid` of the active folder, superseding any
    /// message still loading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveFolder`] if no folder is selected.
    pub fn open_message(&mut self, uid: Uid) -> Result<OperationId> {
        let key = self.active.clone().ok_or(Error::NoActiveFolder)?;
        self.supersede(self.open_call);
        let request = Request::get_message(&key.account, &key.folder, uid);
        let id = self.issue(
            request,
            format!("Opening message {uid}"),
            Purpose::Open { key, uid },
        );
        self.open_call = Some(id);
        Ok(id)
    }

    /// Close the open message and abandon one still loading.
    pub fn close_message(&mut self) {
        self.supersede(self.open_call);
        self.open_call = None;
        self.message_view = None;
    }

    /// A reply to the open message, quoting `original` if given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoOpenMessage`] if no message is open.
    pub fn reply_draft(&self, mode: ReplyMode, original: Option<&str>) -> Result<Draft> {
        let headers = self.open_headers()?;
        Ok(Draft::reply(&headers, mode, original))
    }

    /// # Errors
    ///
    /// Returns [`Error::NoOpenMessage`] if no message is open.
    pub fn forward_draft(&self, original: Option<&str>) -> Result<Draft> {
        let headers = self.open_headers()?;
        Ok(Draft::forward(&headers, original))
    }

    fn open_headers(&self) -> Result<MessageHeaders> {
        let view = self.message_view.as_ref().ok_or(Error::NoOpenMessage)?;
        Ok(view.tree.headers().cloned().unwrap_or_default())
    }

    // --- Flags ---

    /// Set and clear flags on message `uid` of the active folder.
    ///
    /// The summary in the window changes once the backend confirms.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoActiveFolder`] if no folder is selected.
    pub fn flag_message(&mut self, uid: Uid, set: &[Flag], unset: &[Flag]) -> Result<OperationId> {
        let key = self.active.clone().ok_or(Error::NoActiveFolder)?;
        let request = Request::flag_message(&key.account, &key.folder, uid, set, unset);
        Ok(self.issue(
            request,
            format!("Updating flags of message {uid}"),
            Purpose::Flags {
                key,
                uid,
                set: set.to_vec(),
                unset: unset.to_vec(),
            },
        ))
    }

    /// # Errors
    ///
    /// Returns [`Error::NoActiveFolder`] if no folder is selected.
    pub fn mark_read(&mut self, uid: Uid) -> Result<OperationId> {
        self.flag_message(uid, &[Flag::Seen], &[])
    }

    /// # Errors
    ///
    /// Returns [`Error::NoActiveFolder`] if no folder is selected.
    pub fn mark_unread(&mut self, uid: Uid) -> Result<OperationId> {
        self.flag_message(uid, &[], &[Flag::Seen])
    }

    /// # Errors
    ///
    /// Returns [`Error::NoActiveFolder`] if no folder is selected.
    pub fn mark_deleted(&mut self, uid: Uid) -> Result<OperationId> {
        self.flag_message(uid, &[Flag::Deleted], &[])
    }

    // --- Accounts and composer ---

    pub fn add_account(&mut self, form: &AccountForm) -> OperationId {
        let request = Request::with_form(Method::AddAccount, form.to_form_data());
        self.issue(
            request,
            format!("Adding account {}", form.account_name),
            Purpose::AccountChange { removed: None },
        )
    }

    pub fn delete_account(&mut self, account: &str) -> OperationId {
        self.issue(
            Request::delete_account(account),
            format!("Deleting account {account}"),
            Purpose::AccountChange {
                removed: Some(account.to_string()),
            },
        )
    }

    pub fn send(&mut self, form: &ComposerForm) -> OperationId {
        let request = Request::with_form(Method::ComposerSend, form.to_form_data());
        self.issue(request, "Sending message", Purpose::Compose)
    }

    pub fn save_draft(&mut self, form: &ComposerForm) -> OperationId {
        let request = Request::with_form(Method::ComposerSaveDraft, form.to_form_data());
        self.issue(request, "Saving draft", Purpose::Compose)
    }

    // --- Settlements ---

    /// Wait for the next settlement and apply it.
    ///
    /// Returns the settled id, or `None` when nothing is in flight.
    pub async fn process_next(&mut self) -> Option<OperationId> {
        let settlement = self.tracker.next_settlement().await?;
        let id = settlement.id;

        let outcome = match self.purposes.remove(&id) {
            Some(purpose) => self.dispatch(purpose, &settlement),
            None => {
                warn!("No purpose recorded for operation {}", id);
                Ok(())
            }
        };
        if let Err(error) = outcome {
            self.report(&settlement, &error);
        }

        self.notify_operations();
        Some(id)
    }

    /// Process settlements until nothing is in flight, including calls
    /// issued while processing.
    pub async fn run_until_idle(&mut self) {
        while self.process_next().await.is_some() {}
    }

    fn dispatch(&mut self, purpose: Purpose, settlement: &Settlement) -> Result<()> {
        match purpose {
            Purpose::Accounts => {
                take_current(&mut self.accounts_call, settlement.id)?;
                let accounts: Vec<AccountWire> = decode(outcome(settlement)?, Method::GetAccounts)?;
                self.directory.set_accounts(accounts);
                self.notifier.emit(ChangeEvent::AccountsChanged);
                Ok(())
            }
            Purpose::Folders => {
                take_current(&mut self.folders_call, settlement.id)?;
                let trees: Vec<AccountFolders> = decode(outcome(settlement)?, Method::SyncFolders)?;
                let derived = self.directory.set_folders(trees);
                self.notifier.emit(ChangeEvent::FoldersChanged);
                derived
            }
            Purpose::Fetch(key) => {
                let state = self.folders.get_mut(&key).ok_or(Error::Stale(settlement.id))?;
                state.apply(settlement)?;
                self.notifier.emit(ChangeEvent::WindowChanged { key });
                Ok(())
            }
            Purpose::Open { key, uid } => {
                take_current(&mut self.open_call, settlement.id)?;
                let tree: MimeNode = decode(outcome(settlement)?, Method::GetMessage)?;
                let parts = select_display_parts(&tree);
                debug!(
                    "Message {} of {}: {} body part(s), {} attachment(s)",
                    uid,
                    key,
                    parts.bodies.len(),
                    parts.attachments.len()
                );
                self.message_view = Some(MessageView {
                    key: key.clone(),
                    uid,
                    tree,
                    parts,
                });
                self.notifier.emit(ChangeEvent::MessageChanged { key, uid });
                Ok(())
            }
            Purpose::Flags {
                key,
                uid,
                set,
                unset,
            } => {
                outcome(settlement)?;
                if let Some(summary) = self
                    .folders
                    .get_mut(&key)
                    .and_then(|state| state.window_mut().get_mut(uid))
                {
                    summary.apply_flags(&set, &unset);
                    self.notifier.emit(ChangeEvent::WindowChanged { key });
                }
                // Seen and deleted change the folder counters.
                if set.iter().chain(&unset).any(|f| !matches!(f, Flag::Keyword(_))) {
                    self.sync_folders();
                }
                Ok(())
            }
            Purpose::AccountChange { removed } => {
                outcome(settlement)?;
                if let Some(account) = removed {
                    self.forget_account(&account);
                }
                self.refresh_accounts();
                self.sync_folders();
                Ok(())
            }
            Purpose::Compose => {
                outcome(settlement)?;
                self.sync_folders();
                Ok(())
            }
        }
    }

    fn forget_account(&mut self, account: &str) {
        if self.active.as_ref().is_some_and(|key| key.account == account) {
            self.close_message();
            self.active = None;
        }
        self.folders.retain(|key, state| {
            if key.account == account {
                state.cancel();
                false
            } else {
                true
            }
        });
    }

    fn report(&self, settlement: &Settlement, error: &Error) {
        if !error.is_reportable() {
            debug!("Operation {} discarded: {}", settlement.id, error);
            return;
        }
        warn!("{} failed: {}", settlement.description, error);
        self.notifier.emit(ChangeEvent::Error {
            operation: settlement.description.clone(),
            message: error.to_string(),
        });
    }

    // --- Issuing ---

    fn issue(
        &mut self,
        request: Request,
        description: impl Into<String>,
        purpose: Purpose,
    ) -> OperationId {
        let id = self.tracker.track(request, description).id();
        self.register(id, purpose);
        id
    }

    fn register(&mut self, id: OperationId, purpose: Purpose) {
        self.purposes.insert(id, purpose);
        self.notify_operations();
    }

    /// Cancel a superseded call; its settlement is discarded as stale.
    fn supersede(&self, previous: Option<OperationId>) {
        if let Some(id) = previous {
            self.tracker.cancel(id);
        }
    }

    fn notify_operations(&self) {
        self.notifier.emit(ChangeEvent::OperationsChanged {
            pending: self.tracker.pending_count(),
        });
    }
}

impl std::fmt::Debug for MailSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailSession")
            .field("accounts", &self.directory.len())
            .field("active", &self.active)
            .field("pending", &self.tracker.pending_count())
            .finish_non_exhaustive()
    }
}

fn state_for<'a>(
    folders: &'a mut HashMap<FolderKey, SyncState>,
    key: &FolderKey,
    page_size: usize,
) -> &'a mut SyncState {
    folders
        .entry(key.clone())
        .or_insert_with(|| SyncState::new(key.clone(), page_size))
}

/// Clear `slot` if it holds `id`, otherwise the settlement is stale.
fn take_current(slot: &mut Option<OperationId>, id: OperationId) -> Result<()> {
    slot.take_if(|current| *current == id)
        .map(|_| ())
        .ok_or(Error::Stale(id))
}

fn outcome(settlement: &Settlement) -> Result<&Value> {
    settlement.outcome.as_ref().map_err(Clone::clone)
}
