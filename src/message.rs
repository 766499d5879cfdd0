//! Message list entries
//!
//! A [`MessageSummary`] is one row of a folder's message list. UIDs are
//! assigned by the backend per folder and grow monotonically, so they
//! double as the ordering key of a sync window.

use crate::address::split_address_list;
use crate::flag::Flag;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A per-folder message UID.
///
/// The backend sends UIDs as decimal strings; numbers are accepted too.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Uid(pub u32);

impl Uid {
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Uid {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for Uid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u32),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(s) => s
                .trim()
                .parse()
                .map(Self)
                .map_err(|e| serde::de::Error::custom(format!("invalid uid {s:?}: {e}"))),
        }
    }
}

/// One entry of a folder's message list.
///
/// Encoded as a [`SummaryWire`] in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SummaryWire", into = "SummaryWire")]
pub struct MessageSummary {
    pub uid: Uid,
    pub subject: String,
    pub from: Vec<String>,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    /// Mailing list the message was delivered through, if any.
    pub mlist: Option<String>,
    /// Seconds since the epoch.
    pub received: i64,
    pub sent: i64,
    pub size: u64,
    pub unread: bool,
    pub deleted: bool,
    pub draft: bool,
    pub has_attachments: bool,
    pub unblock_images: bool,
}

impl MessageSummary {
    /// Apply a successful flag update to this entry.
    pub fn apply_flags(&mut self, set: &[Flag], unset: &[Flag]) {
        for flag in unset {
            self.toggle(flag, false);
        }
        for flag in set {
            self.toggle(flag, true);
        }
    }

    fn toggle(&mut self, flag: &Flag, on: bool) {
        match flag {
            Flag::Seen => self.unread = !on,
            Flag::Deleted => self.deleted = on,
            Flag::Keyword(kw) if kw == Flag::UNBLOCK_IMAGES => self.unblock_images = on,
            Flag::Keyword(_) => {}
        }
    }
}

/// Summary as the backend encodes it: address headers are raw strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryWire {
    pub uid: Uid,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub cc: Option<String>,
    #[serde(default)]
    pub bcc: Option<String>,
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
    pub has_attachments: bool,
    #[serde(default)]
    pub unblock_images: bool,
}

impl From<SummaryWire> for MessageSummary {
    fn from(wire: SummaryWire) -> Self {
        let split =
            |raw: Option<String>| raw.as_deref().map(split_address_list).unwrap_or_default();
        Self {
            uid: wire.uid,
            subject: wire.subject.unwrap_or_default(),
            from: split(wire.from),
            to: split(wire.to),
            cc: split(wire.cc),
            bcc: split(wire.bcc),
            mlist: wire.mlist.filter(|m| !m.is_empty()),
            received: wire.date_received,
            sent: wire.date_sent,
            size: wire.size,
            unread: wire.unread,
            deleted: wire.deleted,
            draft: wire.draft,
            has_attachments: wire.has_attachments,
            unblock_images: wire.unblock_images,
        }
    }
}

impl From<MessageSummary> for SummaryWire {
    fn from(summary: MessageSummary) -> Self {
        let join = |list: Vec<String>| (!list.is_empty()).then(|| list.join(", "));
        Self {
            uid: summary.uid,
            subject: Some(summary.subject),
            from: join(summary.from),
            to: join(summary.to),
            cc: join(summary.cc),
            bcc: join(summary.bcc),
            mlist: summary.mlist,
            date_received: summary.received,
            date_sent: summary.sent,
            size: summary.size,
            unread: summary.unread,
            deleted: summary.deleted,
            draft: summary.draft,
            has_attachments: summary.has_attachments,
            unblock_images: summary.unblock_images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uid_accepts_strings_and_numbers() {
        let a: Uid = serde_json::from_value(json!("42")).unwrap();
        let b: Uid = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_value::<Uid>(json!("forty-two")).is_err());
    }

    #[test]
    fn summary_splits_address_headers() {
        let summary: MessageSummary = serde_json::from_value(json!({
            "uid": "7",
            "subject": "Lunch",
            "from": "\"Doe, Jane\" <jane@x.com>",
            "to": "bob@y.com, carol@z.com",
            "dateReceived": 1_700_000_000,
            "unread": true
        }))
        .unwrap();

        assert_eq!(summary.uid, Uid(7));
        assert_eq!(summary.from, vec!["\"Doe, Jane\" <jane@x.com>"]);
        assert_eq!(summary.to.len(), 2);
        assert!(summary.cc.is_empty());
        assert!(summary.unread);
        assert_eq!(summary.mlist, None);
    }

    #[test]
    fn summary_encodes_as_wire_shape() {
        let summary: MessageSummary = serde_json::from_value(json!({
            "uid": 9,
            "subject": "Plans",
            "from": "\"Doe, Jane\" <jane@x.com>",
            "to": "bob@y.com, carol@z.com",
            "dateReceived": 1_700_000_000,
            "hasAttachments": true
        }))
        .unwrap();

        let encoded = serde_json::to_value(&summary).unwrap();
        assert_eq!(encoded["uid"], 9);
        assert_eq!(encoded["to"], "bob@y.com, carol@z.com");
        assert_eq!(encoded["dateReceived"], 1_700_000_000);
        assert_eq!(encoded["cc"], serde_json::Value::Null);

        let decoded: MessageSummary = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, summary);
    }

    #[test]
    fn summary_without_uid_is_rejected() {
        assert!(serde_json::from_value::<MessageSummary>(json!({ "subject": "x" })).is_err());
    }

    #[test]
    fn flags_update_summary() {
        let mut summary: MessageSummary =
            serde_json::from_value(json!({ "uid": 1, "unread": true })).unwrap();
        summary.apply_flags(&[Flag::Seen, Flag::Deleted], &[]);
        assert!(!summary.unread);
        assert!(summary.deleted);

        summary.apply_flags(&[], &[Flag::Seen]);
        assert!(summary.unread);
    }
}
