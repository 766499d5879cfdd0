//! Test data for the fake backend
//!
//! Provides a builder-style API for constructing a mailbox snapshot:
//!
//! ```ignore
//! let snapshot = MailboxBuilder::new()
//!     .account("work", "Work", "me@work.example")
//!         .folder("INBOX")
//!             .message(1, "alice@example.com", "Hello")
//!             .message(2, "bob@example.com", "Lunch?").unread()
//!         .folder("Sent").flagged("isSent")
//!     .build();
//! ```

use mail_ui_core::Snapshot;
use serde_json::{Value, json};

/// Builder for a [`Snapshot`].
///
/// `.account()` starts an account, `.folder()` starts a folder in the
/// latest account and `.message()` adds to the latest folder. Modifiers
/// such as `.unread()` apply to the latest item of their kind.
pub struct MailboxBuilder {
    accounts: Vec<Value>,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            accounts: Vec::new(),
        }
    }

    /// Add an account. The first account added is the default one.
    pub fn account(mut self, id: &str, name: &str, email: &str) -> Self {
        let is_default = self.accounts.is_empty();
        self.accounts.push(json!({
            "id": id,
            "display-name": name,
            "full-name": name,
            "email-address": email,
            "is-default": is_default,
            "folders": [],
        }));
        self
    }

    /// Add a root folder to the latest account.
    pub fn folder(self, full_name: &str) -> Self {
        let leaf = full_name.rsplit('/').next().unwrap_or(full_name);
        self.push_folder(json!({
            "fullName": full_name,
            "displayName": leaf,
            "messages": [],
        }))
    }

    /// Add a folder under `parent` to the latest account.
    pub fn subfolder(self, full_name: &str, display_name: &str, parent: &str) -> Self {
        self.push_folder(json!({
            "fullName": full_name,
            "displayName": display_name,
            "parentFullName": parent,
            "messages": [],
        }))
    }

    /// Set a boolean folder attribute such as `isSent` or `noSelect` on
    /// the latest folder.
    pub fn flagged(mut self, attribute: &str) -> Self {
        self.last_folder()[attribute] = json!(true);
        self
    }

    /// Add a read message to the latest folder.
    pub fn message(mut self, uid: u32, from: &str, subject: &str) -> Self {
        self.messages().push(json!({
            "uid": uid,
            "from": from,
            "to": "me@example.com",
            "subject": subject,
            "dateReceived": 1_700_000_000 + i64::from(uid) * 60,
            "text": format!("Body of {subject}"),
        }));
        self
    }

    /// Add messages `first..=last` to the latest folder.
    pub fn messages_range(mut self, first: u32, last: u32) -> Self {
        for uid in first..=last {
            let from = format!("sender{uid}@example.com");
            self = self.message(uid, &from, &format!("Message {uid}"));
        }
        self
    }

    pub fn unread(mut self) -> Self {
        self.last_message()["unread"] = json!(true);
        self
    }

    /// Give the latest message an html alternative.
    pub fn html(mut self, html: &str) -> Self {
        self.last_message()["html"] = json!(html);
        self
    }

    pub fn attachment(mut self, filename: &str, mime_type: &str) -> Self {
        let message = self.last_message();
        if message.get("attachments").is_none() {
            message["attachments"] = json!([]);
        }
        message["attachments"]
            .as_array_mut()
            .expect("attachments is an array")
            .push(json!({ "filename": filename, "mimeType": mime_type }));
        self
    }

    pub fn build(self) -> Snapshot {
        serde_json::from_value(self.to_json()).expect("builder produces a valid snapshot")
    }

    /// The snapshot document, e.g. to write it to a file.
    pub fn to_json(&self) -> Value {
        json!({ "accounts": self.accounts })
    }

    fn push_folder(mut self, folder: Value) -> Self {
        self.accounts
            .last_mut()
            .expect("call .account() before .folder()")["folders"]
            .as_array_mut()
            .expect("folders is an array")
            .push(folder);
        self
    }

    fn last_folder(&mut self) -> &mut Value {
        self.accounts
            .last_mut()
            .expect("call .account() before .folder()")["folders"]
            .as_array_mut()
            .expect("folders is an array")
            .last_mut()
            .expect("call .folder() before adding to it")
    }

    fn messages(&mut self) -> &mut Vec<Value> {
        self.last_folder()["messages"]
            .as_array_mut()
            .expect("messages is an array")
    }

    fn last_message(&mut self) -> &mut Value {
        self.messages()
            .last_mut()
            .expect("call .message() before modifying it")
    }
}
