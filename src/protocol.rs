//! Backend call protocol
//!
//! Every request is a method name plus a parameter map; the backend
//! eventually answers with a JSON envelope
//! `{ "is_ok": bool, "error"?: string, "result"?: value }`.
//! Transport is not this crate's concern: anything implementing
//! [`Backend`] can carry the requests.

use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::message::{MessageSummary, Uid};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;

/// The methods this core issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetAccounts,
    SyncFolders,
    GetMessages,
    GetMessage,
    FlagMessage,
    AddAccount,
    DeleteAccount,
    ComposerSend,
    ComposerSaveDraft,
}

impl Method {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetAccounts => "getAccounts",
            Self::SyncFolders => "syncFolders",
            Self::GetMessages => "getMessages",
            Self::GetMessage => "getMessage",
            Self::FlagMessage => "flagMessage",
            Self::AddAccount => "addAccount",
            Self::DeleteAccount => "deleteAccount",
            Self::ComposerSend => "composerSend",
            Self::ComposerSaveDraft => "composerSaveDraft",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request ready to be handed to a [`Backend`].
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub params: Map<String, Value>,
}

impl Request {
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            params: Map::new(),
        }
    }

    /// Add a parameter; `None` values are left out entirely.
    #[must_use]
    pub fn param(mut self, name: &str, value: impl Into<Option<Value>>) -> Self {
        if let Some(value) = value.into() {
            self.params.insert(name.to_string(), value);
        }
        self
    }

    #[must_use]
    pub fn get_accounts() -> Self {
        Self::new(Method::GetAccounts)
    }

    #[must_use]
    pub fn sync_folders() -> Self {
        Self::new(Method::SyncFolders)
    }

    #[must_use]
    pub fn get_messages(
        account: &str,
        folder: &str,
        newest: Option<Uid>,
        oldest: Option<Uid>,
        count: usize,
    ) -> Self {
        Self::new(Method::GetMessages)
            .param("account", json!(account))
            .param("folder", json!(folder))
            .param("newestUid", newest.map(|uid| json!(uid.to_string())))
            .param("oldestUid", oldest.map(|uid| json!(uid.to_string())))
            .param("count", json!(count))
    }

    #[must_use]
    pub fn get_message(account: &str, folder: &str, uid: Uid) -> Self {
        Self::new(Method::GetMessage)
            .param("account", json!(account))
            .param("folder", json!(folder))
            .param("message", json!(uid.to_string()))
    }

    #[must_use]
    pub fn flag_message(
        account: &str,
        folder: &str,
        uid: Uid,
        set: &[Flag],
        unset: &[Flag],
    ) -> Self {
        Self::new(Method::FlagMessage)
            .param("account", json!(account))
            .param("folder", json!(folder))
            .param("message", json!(uid.to_string()))
            .param("setFlags", Flag::join(set).map(Value::String))
            .param("unsetFlags", Flag::join(unset).map(Value::String))
    }

    #[must_use]
    pub fn delete_account(account: &str) -> Self {
        Self::new(Method::DeleteAccount).param("account", json!(account))
    }

    /// A request whose only parameter is a submitted form.
    #[must_use]
    pub fn with_form(method: Method, form_data: Value) -> Self {
        Self::new(method).param("formData", form_data)
    }

    /// String parameter lookup, treating `""` and `"null"` as absent.
    #[must_use]
    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.params
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty() && *s != "null")
    }
}

/// Something that can carry a [`Request`] to the mail backend.
///
/// Implementations return the raw reply envelope. An `Err` means the
/// request could not be delivered or answered at all and should be an
/// [`Error::Transport`]. Dropping the returned future abandons the call.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn call(&self, request: Request) -> Result<Value>;
}

/// The reply envelope every backend method answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub is_ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl Envelope {
    #[must_use]
    pub fn ok(result: Value) -> Self {
        Self {
            is_ok: true,
            error: None,
            result: Some(result),
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            is_ok: false,
            error: Some(message.into()),
            result: None,
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Unwrap a raw envelope into the call's result value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Backend`] if the envelope reports a failure or
    /// does not have the envelope shape at all.
    pub fn open(raw: Value, method: Method) -> Result<Value> {
        let envelope: Self =
            serde_json::from_value(raw).map_err(|e| Error::malformed(method.as_str(), e))?;
        if envelope.is_ok {
            Ok(envelope.result.unwrap_or(Value::Null))
        } else {
            Err(Error::Backend(
                envelope
                    .error
                    .unwrap_or_else(|| "unknown backend error".to_string()),
            ))
        }
    }
}

/// Decode a settled result into a typed reply.
///
/// # Errors
///
/// Returns [`Error::Backend`] describing the malformed reply.
pub fn decode<T: for<'de> Deserialize<'de>>(value: &Value, method: Method) -> Result<T> {
    T::deserialize(value).map_err(|e| Error::malformed(method.as_str(), e))
}

/// Reply of `getMessages`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReply {
    /// Messages strictly newer than the requested `newestUid`, newest first.
    #[serde(default)]
    pub new_messages: Vec<MessageSummary>,
    /// Up to `count` messages strictly older than `oldestUid`, newest first.
    #[serde(default)]
    pub messages: Vec<MessageSummary>,
    /// Explicit end marker: nothing older than `messages` exists.
    #[serde(default)]
    pub no_more: bool,
}

/// One account as listed by `getAccounts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccountWire {
    pub id: String,
    #[serde(default, alias = "displayName")]
    pub display_name: String,
    #[serde(default, alias = "emailAddress")]
    pub email_address: String,
    #[serde(default, alias = "isDefault")]
    pub is_default: bool,
    #[serde(default = "enabled_default")]
    pub enabled: bool,
}

const fn enabled_default() -> bool {
    true
}

/// One account's folder map as returned by `syncFolders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFolders {
    pub account_id: String,
    #[serde(default)]
    pub account_name: String,
    /// Folders keyed by full name, in backend order.
    #[serde(default)]
    pub folders: indexmap::IndexMap<String, crate::folder::Folder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_ok_envelope() {
        let raw = json!({ "is_ok": true, "result": [1, 2] });
        assert_eq!(Envelope::open(raw, Method::GetAccounts).unwrap(), json!([1, 2]));
    }

    #[test]
    fn open_error_envelope() {
        let raw = json!({ "is_ok": false, "error": "Account does not exist" });
        assert_eq!(
            Envelope::open(raw, Method::DeleteAccount),
            Err(Error::Backend("Account does not exist".to_string()))
        );
    }

    #[test]
    fn open_non_envelope_is_backend_error() {
        let err = Envelope::open(json!("surprise"), Method::SyncFolders).unwrap_err();
        assert!(matches!(err, Error::Backend(ref msg) if msg.starts_with("malformed syncFolders")));
    }

    #[test]
    fn get_messages_params_omit_absent_uids() {
        let req = Request::get_messages("acc", "INBOX", None, Some(Uid(40)), 20);
        assert_eq!(req.method, Method::GetMessages);
        assert!(!req.params.contains_key("newestUid"));
        assert_eq!(req.str_param("oldestUid"), Some("40"));
        assert_eq!(req.params["count"], json!(20));
    }

    #[test]
    fn flag_params_join_lists() {
        let req = Request::flag_message("acc", "INBOX", Uid(3), &[Flag::Seen], &[]);
        assert_eq!(req.str_param("setFlags"), Some("seen"));
        assert!(!req.params.contains_key("unsetFlags"));
    }

    #[test]
    fn account_wire_accepts_both_spellings() {
        let kebab: AccountWire = serde_json::from_value(json!({
            "id": "a1", "display-name": "Work", "email-address": "me@w.com", "is-default": true
        }))
        .unwrap();
        let camel: AccountWire = serde_json::from_value(json!({
            "id": "a1", "displayName": "Work", "emailAddress": "me@w.com", "isDefault": true
        }))
        .unwrap();
        assert_eq!(kebab, camel);
        assert!(kebab.enabled);
    }

    #[test]
    fn folder_map_keeps_backend_order() {
        let tree: AccountFolders = serde_json::from_value(json!({
            "accountId": "a1",
            "accountName": "Work",
            "folders": {
                "INBOX": { "fullName": "INBOX", "displayName": "Inbox" },
                "Archive": { "fullName": "Archive", "displayName": "Archive" },
                "Drafts": { "fullName": "Drafts", "displayName": "Drafts" }
            }
        }))
        .unwrap();
        let names: Vec<_> = tree.folders.keys().cloned().collect();
        assert_eq!(names, vec!["INBOX", "Archive", "Drafts"]);
    }
}
