//! Folder types
//!
//! A [`Folder`] is one node of an account's folder tree as reported by
//! `syncFolders`. The tree is flat on the wire: each folder names its
//! parent by full name, and the root has no parent.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The well-known role a folder plays, derived from the backend's flags.
///
/// # Examples
///
/// ```
/// use mail_ui_core::FolderRole;
///
/// assert_eq!(FolderRole::Inbox.as_str(), "Inbox");
/// assert!(FolderRole::Sent.is_outgoing());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FolderRole {
    Inbox,
    Sent,
    Drafts,
    Outbox,
    Trash,
    /// Any other user or server folder.
    Regular,
}

impl FolderRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inbox => "Inbox",
            Self::Sent => "Sent",
            Self::Drafts => "Drafts",
            Self::Outbox => "Outbox",
            Self::Trash => "Trash",
            Self::Regular => "Regular",
        }
    }

    /// Folders whose messages were written by the account owner.
    ///
    /// Message lists show the recipients of these instead of the sender.
    #[must_use]
    pub const fn is_outgoing(self) -> bool {
        matches!(self, Self::Sent | Self::Drafts | Self::Outbox)
    }
}

impl fmt::Display for FolderRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a full folder name denotes the inbox (case-insensitive).
#[must_use]
pub fn is_inbox_name(full_name: &str) -> bool {
    full_name.eq_ignore_ascii_case("inbox")
}

/// One folder of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    /// Hierarchical server name, e.g. `Work/Reports`.
    pub full_name: String,
    /// Leaf segment shown to the user.
    pub display_name: String,
    /// Full name of the parent folder; `None` for a root folder.
    #[serde(default)]
    pub parent_full_name: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub message_count: u32,
    #[serde(default)]
    pub no_select: bool,
    #[serde(default)]
    pub is_inbox: bool,
    #[serde(default)]
    pub is_sent: bool,
    #[serde(default)]
    pub is_trash: bool,
    #[serde(default)]
    pub is_drafts: bool,
    #[serde(default)]
    pub is_outbox: bool,
    #[serde(default)]
    pub is_local: bool,
    /// Display names from the root down to this folder, joined by `/`.
    ///
    /// Computed by the account directory; never sent by the backend.
    #[serde(skip_deserializing, default, skip_serializing_if = "String::is_empty")]
    pub full_display_name: String,
}

impl Folder {
    /// A selectable root folder with the given names.
    #[must_use]
    pub fn new(full_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        Self {
            display_name: display_name.into(),
            parent_full_name: None,
            unread_count: 0,
            message_count: 0,
            no_select: false,
            is_inbox: is_inbox_name(&full_name),
            is_sent: false,
            is_trash: false,
            is_drafts: false,
            is_outbox: false,
            is_local: false,
            full_display_name: String::new(),
            full_name,
        }
    }

    /// Builder-style setter for the parent link.
    #[must_use]
    pub fn with_parent(mut self, parent_full_name: impl Into<String>) -> Self {
        self.parent_full_name = Some(parent_full_name.into());
        self
    }

    /// Whether messages can be listed in this folder.
    #[must_use]
    pub const fn selectable(&self) -> bool {
        !self.no_select
    }

    #[must_use]
    pub fn role(&self) -> FolderRole {
        if self.is_inbox || is_inbox_name(&self.full_name) {
            FolderRole::Inbox
        } else if self.is_sent {
            FolderRole::Sent
        } else if self.is_drafts {
            FolderRole::Drafts
        } else if self.is_outbox {
            FolderRole::Outbox
        } else if self.is_trash {
            FolderRole::Trash
        } else {
            FolderRole::Regular
        }
    }

    /// The computed full display name, or the leaf name before it is known.
    #[must_use]
    pub fn title(&self) -> &str {
        if self.full_display_name.is_empty() {
            &self.display_name
        } else {
            &self.full_display_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inbox_name_case_insensitive() {
        assert!(is_inbox_name("inbox"));
        assert!(is_inbox_name("INBOX"));
        assert!(is_inbox_name("Inbox"));
        assert!(!is_inbox_name("Inbox/Old"));
    }

    #[test]
    fn role_from_flags() {
        let mut sent = Folder::new("Sent Items", "Sent Items");
        sent.is_sent = true;
        assert_eq!(sent.role(), FolderRole::Sent);
        assert!(sent.role().is_outgoing());

        assert_eq!(Folder::new("INBOX", "Inbox").role(), FolderRole::Inbox);
        assert_eq!(Folder::new("Work", "Work").role(), FolderRole::Regular);
    }

    #[test]
    fn decode_wire_folder() {
        let folder: Folder = serde_json::from_value(json!({
            "fullName": "Work/Reports",
            "displayName": "Reports",
            "parentFullName": "Work",
            "unreadCount": 3,
            "noSelect": true
        }))
        .unwrap();

        assert_eq!(folder.parent_full_name.as_deref(), Some("Work"));
        assert_eq!(folder.unread_count, 3);
        assert!(!folder.selectable());
        assert_eq!(folder.title(), "Reports");
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(format!("{}", FolderRole::Trash), "Trash");
    }
}
