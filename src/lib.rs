//! Client-side state and synchronization core for a mail user interface
//!
//! Sits between a view layer and a mail backend that is reachable only
//! through an asynchronous request protocol. The core tracks every
//! in-flight call, keeps one UID-windowed message list per folder, picks
//! the renderable parts of a message's MIME tree, and maintains the
//! account and folder directory. Views drive a [`MailSession`] and
//! re-render on the [`ChangeEvent`]s it publishes.
//!
//! The backend is anything implementing [`Backend`]; [`MemoryBackend`]
//! serves the protocol from an in-memory mailbox [`Snapshot`].
//!
//! # Example
//!
//! ```
//! use mail_ui_core::{Flag, FolderRole, display_of, split_address_list};
//!
//! assert_eq!(display_of(Some("\"Doe, Jane\" <jane@x.com>")), "Doe, Jane");
//! assert_eq!(split_address_list("a@x.com; b@y.com").len(), 2);
//! assert_eq!(Flag::from("seen"), Flag::Seen);
//! assert!(FolderRole::Sent.is_outgoing());
//! ```

mod address;
mod compose;
mod config;
mod datefmt;
mod directory;
mod error;
mod events;
mod flag;
mod folder;
mod memory;
mod message;
mod mime;
mod protocol;
mod session;
mod sync;
mod tracker;

pub use address::{Mailbox, NO_RECIPIENT, display_of, displays_of_list, split_address_list};
pub use compose::{
    AccountForm, AuthMethod, ComposerForm, Draft, IncomingProtocol, QUOTE_HEADER, ReplyMode,
    Security, format_mailboxes, forward_subject, recipient_line, reply_subject, smtp_default_port,
};
pub use config::{CoreConfig, DEFAULT_EVENT_CAPACITY};
pub use datefmt::format_received;
pub use directory::{Account, AccountDirectory, full_display_name};
pub use error::{Error, Result};
pub use events::{ChangeEvent, Notifier};
pub use flag::{Flag, parse_flag_list};
pub use folder::{Folder, FolderRole, is_inbox_name};
pub use memory::{
    MemoryBackend, Snapshot, StoredAccount, StoredAttachment, StoredFolder, StoredMessage,
};
pub use message::{MessageSummary, SummaryWire, Uid};
pub use mime::{
    AttachmentKind, AttachmentRef, BodyRef, DisplayParts, Disposition, MediaType, Medium,
    MediumContent, MessageHeaders, MimeNode, MultipartKind, TextKind, select_display_parts,
};
pub use protocol::{
    AccountFolders, AccountWire, Backend, Envelope, MessagesReply, Method, Request, decode,
};
pub use session::{MailSession, MessageView};
pub use sync::{DEFAULT_PAGE_SIZE, Direction, FolderKey, SyncState, SyncWindow, WindowUpdate};
pub use tracker::{
    OperationHandle, OperationId, OperationInfo, OperationState, OperationTracker, Settlement,
};
