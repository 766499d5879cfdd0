//! In-process snapshot backend
//!
//! [`MemoryBackend`] answers every protocol method from a [`Snapshot`]
//! held in memory: a JSON document of accounts, folders and messages.
//! It applies flag updates, account changes and outgoing mail to the
//! snapshot, so a session driven against it behaves like one against a
//! real mail service without any network.

use crate::address::{Mailbox, split_address_list};
use crate::error::{Error, Result};
use crate::flag::{Flag, parse_flag_list};
use crate::folder::{Folder, is_inbox_name};
use crate::message::Uid;
use crate::protocol::{AccountFolders, AccountWire, Backend, Envelope, Method, Request};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

/// Page size used when a `getMessages` count is negative.
const FALLBACK_COUNT: usize = 20;

/// A whole mailbox: every account with its folders and messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub accounts: Vec<StoredAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoredAccount {
    pub id: String,
    #[serde(default, alias = "displayName")]
    pub display_name: String,
    /// Name put on outgoing mail.
    #[serde(default, alias = "fullName")]
    pub full_name: String,
    #[serde(default, alias = "emailAddress")]
    pub email_address: String,
    #[serde(default, alias = "isDefault")]
    pub is_default: bool,
    #[serde(default)]
    pub folders: Vec<StoredFolder>,
}

impl StoredAccount {
    fn folder_mut(&mut self, full_name: &str) -> Option<&mut StoredFolder> {
        self.folders.iter_mut().find(|f| f.full_name == full_name)
    }

    fn from_mailbox(&self) -> Mailbox {
        Mailbox::new(&self.full_name, &self.email_address)
    }

    /// The folder flagged with `role`, created as a local folder if missing.
    fn role_folder(
        &mut self,
        role: impl Fn(&StoredFolder) -> bool,
        fallback: StoredFolder,
    ) -> &mut StoredFolder {
        let index = self.folders.iter().position(role).unwrap_or_else(|| {
            self.folders.push(fallback);
            self.folders.len() - 1
        });
        &mut self.folders[index]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoredFolder {
    pub full_name: String,
    pub display_name: String,
    pub parent_full_name: Option<String>,
    pub no_select: bool,
    pub is_inbox: bool,
    pub is_sent: bool,
    pub is_trash: bool,
    pub is_drafts: bool,
    pub is_outbox: bool,
    pub is_local: bool,
    pub messages: Vec<StoredMessage>,
}

impl StoredFolder {
    fn local(name: &str) -> Self {
        Self {
            full_name: name.to_string(),
            display_name: name.to_string(),
            is_local: true,
            ..Self::default()
        }
    }

    fn to_folder(&self) -> Folder {
        Folder {
            full_name: self.full_name.clone(),
            display_name: self.display_name.clone(),
            parent_full_name: self.parent_full_name.clone(),
            unread_count: count_u32(
                self.messages
                    .iter()
                    .filter(|m| m.unread && !m.deleted)
                    .count(),
            ),
            message_count: count_u32(self.messages.len()),
            no_select: self.no_select,
            is_inbox: self.is_inbox || is_inbox_name(&self.full_name),
            is_sent: self.is_sent,
            is_trash: self.is_trash,
            is_drafts: self.is_drafts,
            is_outbox: self.is_outbox,
            is_local: self.is_local,
            full_display_name: String::new(),
        }
    }

    fn next_uid(&self) -> std::result::Result<Uid, String> {
        let max = self.messages.iter().map(|m| m.uid.get()).max().unwrap_or(0);
        max.checked_add(1)
            .map(Uid)
            .ok_or_else(|| format!("Folder {} has no UIDs left", self.full_name))
    }

    fn message_mut(&mut self, uid: Uid) -> Option<&mut StoredMessage> {
        self.messages.iter_mut().find(|m| m.uid == uid)
    }
}

fn count_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAttachment {
    pub filename: String,
    #[serde(default = "octet_stream", alias = "mimeType")]
    pub mime_type: String,
}

fn octet_stream() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub uid: Uid,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub cc: String,
    #[serde(default)]
    pub bcc: String,
    #[serde(default)]
    pub mlist: Option<String>,
    #[serde(default)]
    pub date_received: i64,
    #[serde(default)]
    pub date_sent: i64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub user_flags: Vec<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub html: Option<String>,
    #[serde(default)]
    pub attachments: Vec<StoredAttachment>,
}

impl StoredMessage {
    fn has_user_flag(&self, name: &str) -> bool {
        self.user_flags.iter().any(|f| f == name)
    }

    /// The summary as `getMessages` lists it.
    fn summary(&self) -> Value {
        json!({
            "uid": self.uid.to_string(),
            "subject": self.subject,
            "from": self.from,
            "to": self.to,
            "cc": self.cc,
            "bcc": self.bcc,
            "mlist": self.mlist.clone().unwrap_or_default(),
            "dateReceived": self.date_received,
            "dateSent": self.date_sent,
            "size": self.size,
            "unread": self.unread,
            "deleted": self.deleted,
            "draft": self.draft,
            "hasAttachments": !self.attachments.is_empty(),
            "unblockImages": self.has_user_flag(Flag::UNBLOCK_IMAGES),
        })
    }

    fn set_flag(&mut self, flag: &Flag, on: bool) {
        match flag {
            Flag::Seen => self.unread = !on,
            Flag::Deleted => self.deleted = on,
            Flag::Keyword(name) => {
                self.user_flags.retain(|f| f != name);
                if on {
                    self.user_flags.push(name.clone());
                }
            }
        }
    }
}

/// Serves the backend protocol from an in-memory [`Snapshot`].
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Mutex<Snapshot>,
    /// Decoded body text by part locator, filled as messages are opened.
    bodies: Mutex<HashMap<String, String>>,
    latency: Option<Duration>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            bodies: Mutex::new(HashMap::new()),
            latency: None,
        }
    }

    /// Parse a snapshot document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not a valid snapshot.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map(Self::new)
            .map_err(|e| Error::Config(format!("Invalid mailbox snapshot: {e}")))
    }

    /// Load a snapshot document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Config`] if it is not a valid snapshot.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        info!("Loaded mailbox snapshot from {}", path.display());
        Self::from_json_str(&json)
    }

    /// Delay every reply by `latency`.
    #[must_use]
    pub const fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// A copy of the current mailbox state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.snapshot).clone()
    }

    /// Text of a body part returned by an earlier `getMessage`.
    #[must_use]
    pub fn body_text(&self, uri: &str) -> Option<String> {
        lock(&self.bodies).get(uri).cloned()
    }

    /// Drop cached body text of every part under `base`.
    fn forget_bodies(&self, base: &str) {
        let nested = format!("{base}/");
        lock(&self.bodies).retain(|uri, _| uri != base && !uri.starts_with(&nested));
    }

    fn dispatch(&self, request: &Request) -> std::result::Result<Value, String> {
        let mut snapshot = lock(&self.snapshot);
        match request.method {
            Method::GetAccounts => Ok(get_accounts(&snapshot)),
            Method::SyncFolders => Ok(sync_folders(&snapshot)),
            Method::GetMessages => get_messages(&mut snapshot, request),
            Method::GetMessage => {
                let (tree, bodies) = get_message(&mut snapshot, request)?;
                lock(&self.bodies).extend(bodies);
                Ok(tree)
            }
            Method::FlagMessage => {
                let reply = flag_message(&mut snapshot, request)?;
                let set = parse_flag_list(request.str_param("setFlags").unwrap_or_default());
                if set.contains(&Flag::Deleted)
                    && let (Some(account), Some(folder), Some(uid)) = (
                        request.str_param("account"),
                        request.str_param("folder"),
                        request.str_param("message"),
                    )
                {
                    self.forget_bodies(&format!("cid://{account}/{folder}/{}", uid.trim()));
                }
                Ok(reply)
            }
            Method::AddAccount => add_account(&mut snapshot, request),
            Method::DeleteAccount => {
                let reply = delete_account(&mut snapshot, request)?;
                if let Some(account) = request.str_param("account") {
                    self.forget_bodies(&format!("cid://{account}"));
                }
                Ok(reply)
            }
            Method::ComposerSend => store_composed(&mut snapshot, request, true),
            Method::ComposerSaveDraft => store_composed(&mut snapshot, request, false),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn call(&self, request: Request) -> Result<Value> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let envelope = match self.dispatch(&request) {
            Ok(result) => Envelope::ok(result),
            Err(message) => {
                debug!("{} failed: {}", request.method, message);
                Envelope::failure(message)
            }
        };
        Ok(envelope.to_value())
    }
}

fn get_accounts(snapshot: &Snapshot) -> Value {
    let accounts: Vec<AccountWire> = snapshot
        .accounts
        .iter()
        .map(|a| AccountWire {
            id: a.id.clone(),
            display_name: a.display_name.clone(),
            email_address: a.email_address.clone(),
            is_default: a.is_default,
            enabled: true,
        })
        .collect();
    serde_json::to_value(accounts).unwrap_or(Value::Null)
}

fn sync_folders(snapshot: &Snapshot) -> Value {
    let trees: Vec<AccountFolders> = snapshot
        .accounts
        .iter()
        .map(|a| AccountFolders {
            account_id: a.id.clone(),
            account_name: a.display_name.clone(),
            folders: a
                .folders
                .iter()
                .map(|f| (f.full_name.clone(), f.to_folder()))
                .collect::<IndexMap<_, _>>(),
        })
        .collect();
    serde_json::to_value(trees).unwrap_or(Value::Null)
}

type Reply = std::result::Result<Value, String>;

fn account_mut<'a>(
    snapshot: &'a mut Snapshot,
    request: &Request,
) -> std::result::Result<&'a mut StoredAccount, String> {
    let id = request.str_param("account").ok_or("Missing account")?;
    snapshot
        .accounts
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| format!("Account {id} does not exist"))
}

fn folder_mut<'a>(
    snapshot: &'a mut Snapshot,
    request: &Request,
) -> std::result::Result<&'a mut StoredFolder, String> {
    let name = request.str_param("folder").ok_or("Missing folder")?.to_string();
    account_mut(snapshot, request)?
        .folder_mut(&name)
        .ok_or_else(|| format!("Folder {name} not found"))
}

fn uid_param(request: &Request, name: &str) -> std::result::Result<Option<Uid>, String> {
    request
        .str_param(name)
        .map(|raw| raw.trim().parse().map(Uid).map_err(|e| format!("Invalid {name} {raw:?}: {e}")))
        .transpose()
}

/// Requested page size; absent means zero, negative means the default.
fn count_param(request: &Request) -> usize {
    let raw = match request.params.get("count") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    raw.map_or(0, |n| usize::try_from(n).unwrap_or(FALLBACK_COUNT))
}

fn get_messages(snapshot: &mut Snapshot, request: &Request) -> Reply {
    let newest = uid_param(request, "newestUid")?;
    let oldest = uid_param(request, "oldestUid")?;
    let count = count_param(request);
    let folder = folder_mut(snapshot, request)?;

    let mut messages: Vec<&StoredMessage> = folder.messages.iter().collect();
    messages.sort_by(|a, b| b.uid.cmp(&a.uid));

    let new_messages: Vec<Value> = newest.map_or_else(Vec::new, |newest| {
        messages
            .iter()
            .take_while(|m| m.uid > newest)
            .map(|m| m.summary())
            .collect()
    });
    let page: Vec<Value> = messages
        .iter()
        .filter(|m| match (oldest, newest) {
            (Some(oldest), _) => m.uid < oldest,
            (None, Some(newest)) => m.uid <= newest,
            (None, None) => true,
        })
        .take(count)
        .map(|m| m.summary())
        .collect();

    Ok(json!({ "newMessages": new_messages, "messages": page }))
}

fn get_message(
    snapshot: &mut Snapshot,
    request: &Request,
) -> std::result::Result<(Value, Vec<(String, String)>), String> {
    let account = request.str_param("account").unwrap_or_default().to_string();
    let uid = uid_param(request, "message")?.ok_or("Missing message")?;
    let folder = folder_mut(snapshot, request)?;
    let folder_name = folder.full_name.clone();
    let message = folder
        .messages
        .iter()
        .find(|m| m.uid == uid)
        .ok_or_else(|| format!("Message {uid} not found"))?;

    let base = format!("cid://{account}/{folder_name}/{uid}");
    Ok(message_tree(&base, message))
}

fn content_type(mime: &str) -> Value {
    let (kind, subtype) = mime.split_once('/').unwrap_or((mime, ""));
    json!({ "type": kind, "subType": subtype, "params": {} })
}

fn leaf(uri: &str, mime: &str) -> Value {
    json!({ "uri": uri, "mimeType": content_type(mime), "isMultipart": false, "isMedium": false })
}

fn part(
    uri: &str,
    mime: &str,
    content: Value,
    disposition: Option<&str>,
    filename: Option<&str>,
) -> Value {
    json!({
        "uri": uri,
        "mimeType": content_type(mime),
        "isMultipart": false,
        "isMedium": true,
        "isMessage": false,
        "disposition": disposition,
        "filename": filename,
        "content": content,
    })
}

fn multipart(uri: &str, subtype: &str, parts: Vec<Value>) -> Value {
    json!({
        "uri": uri,
        "mimeType": content_type(&format!("multipart/{subtype}")),
        "isMultipart": true,
        "isMedium": false,
        "parts": parts,
    })
}

fn mailboxes(raw: &str) -> Vec<Mailbox> {
    split_address_list(raw).iter().map(|e| Mailbox::parse(e)).collect()
}

/// The MIME tree of `message`, plus the text of every body part by locator.
fn message_tree(base: &str, message: &StoredMessage) -> (Value, Vec<(String, String)>) {
    let mut bodies = Vec::new();
    let texts: Vec<(&str, &str)> = [
        ("text/plain", message.text.as_deref()),
        ("text/html", message.html.as_deref()),
    ]
    .into_iter()
    .filter_map(|(mime, text)| text.map(|t| (mime, t)))
    .collect();

    let body_base = if message.attachments.is_empty() {
        base.to_string()
    } else {
        format!("{base}/0")
    };
    let (body, body_mime) = match texts.as_slice() {
        [] | [_] => {
            let (mime, text) = texts.first().copied().unwrap_or(("text/plain", ""));
            bodies.push((body_base.clone(), text.to_string()));
            (leaf(&body_base, mime), mime.to_string())
        }
        alternatives => {
            let parts = alternatives
                .iter()
                .enumerate()
                .map(|(i, (mime, text))| {
                    let uri = format!("{body_base}/{i}");
                    bodies.push((uri.clone(), (*text).to_string()));
                    part(&uri, mime, leaf(&uri, mime), None, None)
                })
                .collect();
            (
                multipart(&body_base, "alternative", parts),
                "multipart/alternative".to_string(),
            )
        }
    };

    let content = if message.attachments.is_empty() {
        body
    } else {
        let mut parts = vec![part(&body_base, &body_mime, body, None, None)];
        parts.extend(message.attachments.iter().enumerate().map(|(i, a)| {
            let uri = format!("{base}/{}", i + 1);
            part(
                &uri,
                &a.mime_type,
                leaf(&uri, &a.mime_type),
                Some("attachment"),
                Some(&a.filename),
            )
        }));
        multipart(base, "mixed", parts)
    };

    let tree = json!({
        "uri": base,
        "mimeType": content_type("message/rfc822"),
        "isMultipart": false,
        "isMedium": true,
        "isMessage": true,
        "subject": message.subject,
        "from": mailboxes(&message.from),
        "to": mailboxes(&message.to),
        "cc": mailboxes(&message.cc),
        "bcc": mailboxes(&message.bcc),
        "replyTo": [],
        "mlist": message.mlist.clone().unwrap_or_default(),
        "content": content,
    });
    (tree, bodies)
}

fn flag_message(snapshot: &mut Snapshot, request: &Request) -> Reply {
    let uid = uid_param(request, "message")?.ok_or("Missing message")?;
    let set = parse_flag_list(request.str_param("setFlags").unwrap_or_default());
    let unset = parse_flag_list(request.str_param("unsetFlags").unwrap_or_default());
    let message = folder_mut(snapshot, request)?
        .message_mut(uid)
        .ok_or_else(|| format!("Message {uid} not found"))?;

    for flag in &unset {
        message.set_flag(flag, false);
    }
    for flag in &set {
        message.set_flag(flag, true);
    }
    Ok(Value::Null)
}

fn form(request: &Request) -> Map<String, Value> {
    request
        .params
        .get("formData")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// A form field as text; empty fields count as missing.
fn field(form: &Map<String, Value>, name: &str) -> Option<String> {
    match form.get(name)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn require(
    form: &Map<String, Value>,
    name: &str,
    message: &str,
) -> std::result::Result<String, String> {
    field(form, name).ok_or_else(|| message.to_string())
}

fn require_choice(
    form: &Map<String, Value>,
    name: &str,
    choices: &[&str],
    message: &str,
) -> std::result::Result<(), String> {
    match field(form, name) {
        Some(value) if choices.contains(&value.as_str()) => Ok(()),
        _ => Err(message.to_string()),
    }
}

fn add_account(snapshot: &mut Snapshot, request: &Request) -> Reply {
    const SECURITY: [&str; 4] = ["none", "ssl", "tls", "tls-op"];
    let form = form(request);

    require(&form, "incoming-server-host", "Missing incoming server host")?;
    require(&form, "incoming-server-username", "Missing incoming server username")?;
    require_choice(
        &form,
        "incoming-protocol-choice",
        &["imap", "pop"],
        "Invalid incoming server protocol",
    )?;
    require_choice(
        &form,
        "incoming-security-choice",
        &SECURITY,
        "Invalid incoming server security protocol",
    )?;
    require(&form, "outgoing-server-host", "Missing outgoing server host")?;
    require(&form, "outgoing-server-username", "Missing outgoing server username")?;
    require_choice(
        &form,
        "outgoing-security-choice",
        &SECURITY,
        "Invalid outgoing server security protocol",
    )?;
    require_choice(
        &form,
        "outgoing-auth-choice",
        &["none", "login", "cram-md5"],
        "Invalid outgoing server authentication protocol",
    )?;
    let email_address = require(&form, "emailaddress", "Invalid email address")?;
    let display_name = require(&form, "accountname", "Missing account name")?;

    let id = unique_id(snapshot, &display_name);
    info!("Adding account {} ({})", id, email_address);
    let is_default = snapshot.accounts.is_empty();
    snapshot.accounts.push(StoredAccount {
        id: id.clone(),
        display_name,
        full_name: field(&form, "fullname").unwrap_or_default(),
        email_address,
        is_default,
        folders: vec![StoredFolder {
            full_name: "INBOX".to_string(),
            display_name: "Inbox".to_string(),
            is_inbox: true,
            ..StoredFolder::default()
        }],
    });
    Ok(json!(id))
}

fn unique_id(snapshot: &Snapshot, name: &str) -> String {
    let base: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let base = if base.trim_matches('-').is_empty() {
        "account".to_string()
    } else {
        base
    };
    let taken = |id: &str| snapshot.accounts.iter().any(|a| a.id == id);
    let mut id = base.clone();
    let mut suffix = 2;
    while taken(&id) {
        id = format!("{base}-{suffix}");
        suffix += 1;
    }
    id
}

fn delete_account(snapshot: &mut Snapshot, request: &Request) -> Reply {
    let id = request.str_param("account").ok_or("Missing account")?;
    let index = snapshot
        .accounts
        .iter()
        .position(|a| a.id == id)
        .ok_or("Account does not exist")?;
    let removed = snapshot.accounts.remove(index);
    if removed.is_default
        && let Some(first) = snapshot.accounts.first_mut()
    {
        first.is_default = true;
    }
    info!("Deleted account {}", removed.id);
    Ok(Value::Null)
}

fn store_composed(snapshot: &mut Snapshot, request: &Request, sending: bool) -> Reply {
    let form = form(request);
    let account_id = field(&form, "composer-from-choice")
        .ok_or("No transport account specified trying to send the message")?;
    let account = snapshot
        .accounts
        .iter_mut()
        .find(|a| a.id == account_id)
        .ok_or("Invalid transport account specified trying to send the message")?;

    let to = field(&form, "composer-to").unwrap_or_default();
    let cc = field(&form, "composer-cc").unwrap_or_default();
    let bcc = field(&form, "composer-bcc").unwrap_or_default();
    let recipients = [&to, &cc, &bcc]
        .iter()
        .map(|raw| split_address_list(raw).len())
        .sum::<usize>();
    if sending && recipients == 0 {
        return Err("User didn't set recipients trying to send".to_string());
    }

    let now = chrono::Utc::now().timestamp();
    let body = field(&form, "composer-body");
    let attachments = field(&form, "composer-attachments")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|uri| !uri.is_empty())
                .map(|uri| StoredAttachment {
                    filename: uri.rsplit('/').next().unwrap_or(uri).to_string(),
                    mime_type: octet_stream(),
                })
                .collect()
        })
        .unwrap_or_default();

    let from = account.from_mailbox().to_string();
    let folder = if sending {
        account.role_folder(|f| f.is_outbox, StoredFolder {
            is_outbox: true,
            ..StoredFolder::local("Outbox")
        })
    } else {
        account.role_folder(|f| f.is_drafts, StoredFolder {
            is_drafts: true,
            ..StoredFolder::local("Drafts")
        })
    };

    let uid = folder.next_uid()?;
    folder.messages.push(StoredMessage {
        uid,
        subject: field(&form, "composer-subject").unwrap_or_default(),
        from,
        to,
        cc,
        bcc,
        mlist: None,
        date_received: now,
        date_sent: now,
        size: body.as_ref().map_or(0, |b| u64::try_from(b.len()).unwrap_or(u64::MAX)),
        unread: false,
        deleted: false,
        draft: !sending,
        user_flags: Vec::new(),
        text: body,
        html: None,
        attachments,
    });
    info!("Stored message {} in {}", uid, folder.full_name);
    Ok(json!(uid.to_string()))
}
