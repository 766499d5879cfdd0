//! Message structure and body selection
//!
//! `getMessage` answers with the message's MIME tree. [`MimeNode`] is that
//! tree as a closed tagged union, and [`select_display_parts`] walks it to
//! decide which parts a message view renders as bodies and which it lists
//! as attachments.

use crate::address::Mailbox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subtype of a `multipart/*` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MultipartKind {
    Alternative,
    Related,
    Mixed,
    Other(String),
}

impl MultipartKind {
    fn from_subtype(subtype: &str) -> Self {
        match subtype.to_ascii_lowercase().as_str() {
            "alternative" => Self::Alternative,
            "related" => Self::Related,
            "mixed" => Self::Mixed,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Content type of a leaf part, narrowed to what body selection cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MediaType {
    Html,
    Plain,
    /// Any other type, as lowercase `type/subtype`.
    Other(String),
}

impl MediaType {
    fn new(kind: &str, subtype: &str) -> Self {
        let kind = kind.to_ascii_lowercase();
        let subtype = subtype.to_ascii_lowercase();
        match (kind.as_str(), subtype.as_str()) {
            ("text", "html") => Self::Html,
            ("text", "plain") => Self::Plain,
            _ => Self::Other(format!("{kind}/{subtype}")),
        }
    }

    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self, Self::Html | Self::Plain)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Html => f.write_str("text/html"),
            Self::Plain => f.write_str("text/plain"),
            Self::Other(mime) => f.write_str(mime),
        }
    }
}

/// How a part asks to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Disposition {
    Attachment,
    Inline,
    Unspecified,
}

impl Disposition {
    fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(d) if d.eq_ignore_ascii_case("attachment") => Self::Attachment,
            Some(d) if d.eq_ignore_ascii_case("inline") => Self::Inline,
            _ => Self::Unspecified,
        }
    }
}

/// Headers of an embedded or top-level message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageHeaders {
    pub subject: String,
    pub from: Vec<Mailbox>,
    pub to: Vec<Mailbox>,
    pub cc: Vec<Mailbox>,
    pub bcc: Vec<Mailbox>,
    pub reply_to: Vec<Mailbox>,
    /// Posting address of the mailing list the message came through.
    pub mlist: Option<String>,
}

/// What a medium carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum MediumContent {
    /// Decoded data, fetched separately by its locator.
    Leaf { uri: String, media_type: MediaType },
    /// Structured content: a multipart or an embedded message.
    Nested(Box<MimeNode>),
}

/// A single part: headers plus its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Medium {
    pub uri: String,
    pub media_type: MediaType,
    pub disposition: Disposition,
    pub filename: Option<String>,
    pub content_id: Option<String>,
    /// Present when this part is itself a message.
    pub headers: Option<MessageHeaders>,
    pub content: MediumContent,
}

impl Medium {
    const fn is_attachment(&self) -> bool {
        matches!(self.disposition, Disposition::Attachment)
    }

    /// Type of the renderable content, if this part is a leaf.
    const fn leaf_type(&self) -> Option<&MediaType> {
        match &self.content {
            MediumContent::Leaf { media_type, .. } => Some(media_type),
            MediumContent::Nested(_) => None,
        }
    }
}

/// A node of a message's MIME tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireNode")]
pub enum MimeNode {
    Multipart {
        kind: MultipartKind,
        uri: String,
        parts: Vec<MimeNode>,
    },
    Medium(Medium),
}

impl MimeNode {
    /// Headers of the message this tree describes, if the root is a message.
    #[must_use]
    pub const fn headers(&self) -> Option<&MessageHeaders> {
        match self {
            Self::Medium(medium) => medium.headers.as_ref(),
            Self::Multipart { .. } => None,
        }
    }
}

/// Which text flavour a body is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextKind {
    Html,
    Plain,
}

/// A part to render as message body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BodyRef {
    pub uri: String,
    pub kind: TextKind,
}

/// Whether a listed part was explicitly attached or just not renderable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttachmentKind {
    Attachment,
    /// Non-text inline content; a view may omit it.
    Inline,
}

/// A part to offer for opening or saving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRef {
    pub uri: String,
    pub filename: Option<String>,
    pub media_type: String,
    pub kind: AttachmentKind,
}

impl AttachmentRef {
    /// Filename if known, otherwise the content type.
    #[must_use]
    pub fn label(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.media_type)
    }
}

/// Result of body selection, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DisplayParts {
    pub bodies: Vec<BodyRef>,
    pub attachments: Vec<AttachmentRef>,
}

/// Select the body parts to render and the parts to list as attachments.
///
/// * `multipart/alternative`: one child, HTML preferred over the first
///   plain text child; no choice yields nothing.
/// * `multipart/related`: the first child only.
/// * any other multipart: every child in order.
/// * a medium disposed as attachment is listed and never descended into.
/// * a text leaf is a body; any other leaf is listed as inline content.
/// * a medium wrapping structured content is walked like that content.
#[must_use]
pub fn select_display_parts(root: &MimeNode) -> DisplayParts {
    let mut parts = DisplayParts::default();
    walk(root, &mut parts);
    parts
}

fn walk(node: &MimeNode, out: &mut DisplayParts) {
    match node {
        MimeNode::Multipart {
            kind: MultipartKind::Alternative,
            parts,
            ..
        } => {
            if let Some(best) = best_alternative(parts) {
                walk(best, out);
            }
        }
        MimeNode::Multipart {
            kind: MultipartKind::Related,
            parts,
            ..
        } => {
            if let Some(first) = parts.first() {
                walk(first, out);
            }
        }
        MimeNode::Multipart { parts, .. } => {
            for part in parts {
                walk(part, out);
            }
        }
        MimeNode::Medium(medium) => walk_medium(medium, out),
    }
}

fn walk_medium(medium: &Medium, out: &mut DisplayParts) {
    if medium.is_attachment() {
        out.attachments.push(AttachmentRef {
            uri: content_uri(medium).to_string(),
            filename: medium.filename.clone(),
            media_type: medium.media_type.to_string(),
            kind: AttachmentKind::Attachment,
        });
        return;
    }

    match &medium.content {
        MediumContent::Nested(inner) => walk(inner, out),
        MediumContent::Leaf { uri, media_type } => {
            let kind = match media_type {
                MediaType::Html => Some(TextKind::Html),
                MediaType::Plain => Some(TextKind::Plain),
                MediaType::Other(_) => None,
            };
            match kind {
                Some(kind) => out.bodies.push(BodyRef {
                    uri: uri.clone(),
                    kind,
                }),
                None => out.attachments.push(AttachmentRef {
                    uri: uri.clone(),
                    filename: medium.filename.clone(),
                    media_type: media_type.to_string(),
                    kind: AttachmentKind::Inline,
                }),
            }
        }
    }
}

fn content_uri(medium: &Medium) -> &str {
    match &medium.content {
        MediumContent::Leaf { uri, .. } => uri,
        MediumContent::Nested(_) => &medium.uri,
    }
}

fn best_alternative(parts: &[MimeNode]) -> Option<&MimeNode> {
    let text_type = |node: &MimeNode| match node {
        MimeNode::Medium(medium) if !medium.is_attachment() => medium.leaf_type().cloned(),
        _ => None,
    };
    parts
        .iter()
        .find(|&p| text_type(p) == Some(MediaType::Html))
        .or_else(|| parts.iter().find(|&p| text_type(p) == Some(MediaType::Plain)))
}

/// A MIME node as `getMessage` encodes it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireNode {
    uri: Option<String>,
    mime_type: WireContentType,
    is_multipart: bool,
    is_medium: bool,
    parts: Option<Vec<WireNode>>,
    disposition: Option<String>,
    filename: Option<String>,
    content_id: Option<String>,
    is_message: bool,
    subject: Option<String>,
    from: Option<Vec<Mailbox>>,
    to: Option<Vec<Mailbox>>,
    cc: Option<Vec<Mailbox>>,
    bcc: Option<Vec<Mailbox>>,
    reply_to: Option<Vec<Mailbox>>,
    mlist: Option<String>,
    content: Option<Box<WireNode>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireContentType {
    #[serde(rename = "type")]
    kind: Option<String>,
    sub_type: Option<String>,
}

impl WireContentType {
    fn media_type(&self) -> MediaType {
        MediaType::new(
            self.kind.as_deref().unwrap_or("application"),
            self.sub_type.as_deref().unwrap_or("octet-stream"),
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<WireNode> for MimeNode {
    type Error = String;

    fn try_from(wire: WireNode) -> Result<Self, Self::Error> {
        let uri = wire.uri.unwrap_or_default();

        if wire.is_multipart {
            let kind =
                MultipartKind::from_subtype(wire.mime_type.sub_type.as_deref().unwrap_or(""));
            let parts = wire
                .parts
                .unwrap_or_default()
                .into_iter()
                .map(Self::try_from)
                .collect::<Result<_, _>>()?;
            return Ok(Self::Multipart { kind, uri, parts });
        }

        let media_type = wire.mime_type.media_type();
        let content = if wire.is_medium {
            let inner = *wire
                .content
                .ok_or_else(|| format!("medium {uri} has no content"))?;
            if inner.is_multipart || inner.is_medium {
                MediumContent::Nested(Box::new(Self::try_from(inner)?))
            } else {
                MediumContent::Leaf {
                    media_type: inner.mime_type.media_type(),
                    uri: inner.uri.unwrap_or_else(|| uri.clone()),
                }
            }
        } else {
            // A bare data wrapper is its own content.
            MediumContent::Leaf {
                uri: uri.clone(),
                media_type: media_type.clone(),
            }
        };

        let headers = wire.is_message.then(|| MessageHeaders {
            subject: wire.subject.unwrap_or_default(),
            from: wire.from.unwrap_or_default(),
            to: wire.to.unwrap_or_default(),
            cc: wire.cc.unwrap_or_default(),
            bcc: wire.bcc.unwrap_or_default(),
            reply_to: wire.reply_to.unwrap_or_default(),
            mlist: non_empty(wire.mlist),
        });

        Ok(Self::Medium(Medium {
            uri,
            media_type,
            disposition: Disposition::parse(wire.disposition.as_deref()),
            filename: non_empty(wire.filename),
            content_id: non_empty(wire.content_id),
            headers,
            content,
        }))
    }
}
