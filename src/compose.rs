//! Drafting replies and forwards, and the forms the backend accepts
//!
//! Everything here is pure: the session submits the resulting forms
//! through the tracker.

use crate::address::{Mailbox, display_of};
use crate::message::MessageSummary;
use crate::mime::MessageHeaders;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Line placed above quoted original text.
pub const QUOTE_HEADER: &str = "\n-- Original message --\n";

/// `Re: subject` unless the subject already starts with `Re:` or `RE:`.
#[must_use]
pub fn reply_subject(subject: &str) -> String {
    if subject.starts_with("Re:") || subject.starts_with("RE:") {
        subject.to_string()
    } else {
        format!("Re: {subject}")
    }
}

/// `Fwd: subject` unless the subject already carries a forward prefix.
#[must_use]
pub fn forward_subject(subject: &str) -> String {
    const PREFIXES: [&str; 4] = ["Fw:", "FW:", "Fwd:", "FWD:"];
    if PREFIXES.iter().any(|p| subject.starts_with(p)) {
        subject.to_string()
    } else {
        format!("Fwd: {subject}")
    }
}

/// Join mailboxes into an editable recipient field.
#[must_use]
pub fn format_mailboxes<'a>(mailboxes: impl IntoIterator<Item = &'a Mailbox>) -> String {
    mailboxes
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Who a reply goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReplyMode {
    /// The sender only.
    Sender,
    /// The sender, with every other recipient on Cc.
    All,
    /// The mailing list the message came through.
    MailingList,
}

impl ReplyMode {
    /// Modes that make sense for a message with these headers.
    #[must_use]
    pub fn available(headers: &MessageHeaders) -> Vec<Self> {
        let mut modes = vec![Self::Sender, Self::All];
        if headers.mlist.is_some() {
            modes.push(Self::MailingList);
        }
        modes
    }
}

/// Pre-filled composer fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Draft {
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub body: String,
}

impl Draft {
    /// A reply to the message with `headers`, quoting `original` if given.
    #[must_use]
    pub fn reply(headers: &MessageHeaders, mode: ReplyMode, original: Option<&str>) -> Self {
        let to = match mode {
            ReplyMode::MailingList => headers.mlist.clone().unwrap_or_default(),
            ReplyMode::Sender | ReplyMode::All => format_mailboxes(&headers.from),
        };
        let cc = match mode {
            ReplyMode::All => format_mailboxes(headers.cc.iter().chain(&headers.to)),
            ReplyMode::Sender | ReplyMode::MailingList => String::new(),
        };
        Self {
            to,
            cc,
            bcc: String::new(),
            subject: reply_subject(&headers.subject),
            body: quote(original),
        }
    }

    /// A forward of the message with `headers`, with empty recipients.
    #[must_use]
    pub fn forward(headers: &MessageHeaders, original: Option<&str>) -> Self {
        Self {
            subject: forward_subject(&headers.subject),
            body: quote(original),
            ..Self::default()
        }
    }
}

fn quote(original: Option<&str>) -> String {
    original.map_or_else(String::new, |text| format!("{QUOTE_HEADER}{text}"))
}

/// Text for the correspondent column of a message list row.
///
/// Messages in outgoing folders, and drafts anywhere, show their
/// recipients; everything else shows the sender.
#[must_use]
pub fn recipient_line(summary: &MessageSummary, outgoing_folder: bool) -> String {
    if outgoing_folder || summary.draft {
        if summary.to.is_empty() {
            return display_of(None);
        }
        summary
            .to
            .iter()
            .map(|entry| display_of(Some(entry)))
            .collect::<Vec<_>>()
            .join(", ")
    } else {
        display_of(summary.from.first().map(String::as_str))
    }
}

fn comma_joined<S: Serializer>(items: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&items.join(","))
}

/// The composer form as `composerSend`/`composerSaveDraft` expect it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComposerForm {
    /// Id of the sending account.
    #[serde(rename = "composer-from-choice")]
    pub from_account: String,
    #[serde(rename = "composer-to")]
    pub to: String,
    #[serde(rename = "composer-cc")]
    pub cc: String,
    #[serde(rename = "composer-bcc")]
    pub bcc: String,
    #[serde(rename = "composer-subject")]
    pub subject: String,
    #[serde(rename = "composer-body")]
    pub body: String,
    /// Locators of files to attach.
    #[serde(rename = "composer-attachments", serialize_with = "comma_joined")]
    pub attachments: Vec<String>,
}

impl ComposerForm {
    #[must_use]
    pub fn from_draft(from_account: impl Into<String>, draft: Draft) -> Self {
        Self {
            from_account: from_account.into(),
            to: draft.to,
            cc: draft.cc,
            bcc: draft.bcc,
            subject: draft.subject,
            body: draft.body,
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn to_form_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Incoming mail protocol of a new account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomingProtocol {
    Imap,
    Pop,
}

/// Connection security of a server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Security {
    None,
    Ssl,
    Tls,
}

/// Authentication mechanism for the outgoing server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMethod {
    None,
    Login,
    CramMd5,
}

impl IncomingProtocol {
    /// Standard port for this protocol over `security`.
    #[must_use]
    pub const fn default_port(self, security: Security) -> u16 {
        match (self, security) {
            (Self::Imap, Security::Ssl) => 993,
            (Self::Imap, Security::None | Security::Tls) => 143,
            (Self::Pop, Security::Ssl) => 995,
            (Self::Pop, Security::None | Security::Tls) => 110,
        }
    }
}

/// Standard SMTP port over `security`.
#[must_use]
pub const fn smtp_default_port(security: Security) -> u16 {
    match security {
        Security::Ssl => 465,
        Security::None | Security::Tls => 25,
    }
}

/// The add-account form as `addAccount` expects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountForm {
    #[serde(rename = "accountname")]
    pub account_name: String,
    #[serde(rename = "fullname")]
    pub full_name: String,
    #[serde(rename = "emailaddress")]
    pub email_address: String,
    #[serde(rename = "incoming-protocol-choice")]
    pub incoming_protocol: IncomingProtocol,
    #[serde(rename = "incoming-server-host")]
    pub incoming_host: String,
    #[serde(rename = "incoming-server-port")]
    pub incoming_port: u16,
    #[serde(rename = "incoming-security-choice")]
    pub incoming_security: Security,
    #[serde(rename = "incoming-server-username")]
    pub incoming_username: String,
    #[serde(rename = "outgoing-server-host")]
    pub outgoing_host: String,
    #[serde(rename = "outgoing-server-port")]
    pub outgoing_port: u16,
    #[serde(rename = "outgoing-security-choice")]
    pub outgoing_security: Security,
    #[serde(rename = "outgoing-server-username")]
    pub outgoing_username: String,
    #[serde(rename = "outgoing-auth-choice")]
    pub outgoing_auth: AuthMethod,
}

impl AccountForm {
    /// An IMAP-over-SSL account with SMTP-over-SSL, using standard ports
    /// and the email address as username on both servers.
    #[must_use]
    pub fn new(
        account_name: impl Into<String>,
        full_name: impl Into<String>,
        email_address: impl Into<String>,
    ) -> Self {
        let email_address = email_address.into();
        Self {
            account_name: account_name.into(),
            full_name: full_name.into(),
            incoming_protocol: IncomingProtocol::Imap,
            incoming_host: String::new(),
            incoming_port: IncomingProtocol::Imap.default_port(Security::Ssl),
            incoming_security: Security::Ssl,
            incoming_username: email_address.clone(),
            outgoing_host: String::new(),
            outgoing_port: smtp_default_port(Security::Ssl),
            outgoing_security: Security::Ssl,
            outgoing_username: email_address.clone(),
            outgoing_auth: AuthMethod::Login,
            email_address,
        }
    }

    #[must_use]
    pub fn with_servers(
        mut self,
        incoming: impl Into<String>,
        outgoing: impl Into<String>,
    ) -> Self {
        self.incoming_host = incoming.into();
        self.outgoing_host = outgoing.into();
        self
    }

    /// Change incoming protocol and security, resetting the port to the
    /// standard one for the new combination.
    #[must_use]
    pub const fn with_incoming(mut self, protocol: IncomingProtocol, security: Security) -> Self {
        self.incoming_protocol = protocol;
        self.incoming_security = security;
        self.incoming_port = protocol.default_port(security);
        self
    }

    /// Change outgoing security, resetting the port to the standard one.
    #[must_use]
    pub const fn with_outgoing_security(mut self, security: Security) -> Self {
        self.outgoing_security = security;
        self.outgoing_port = smtp_default_port(security);
        self
    }

    #[must_use]
    pub fn to_form_data(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
