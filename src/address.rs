//! Recipient header text
//!
//! Splits raw `From`/`To`/`Cc` header values into individual entries and
//! derives the short string a message list shows for each of them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder shown when a header carries no recipient at all.
pub const NO_RECIPIENT: &str = "(no recipient)";

/// A parsed mailbox as delivered in a message structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email_address: String,
}

impl Mailbox {
    #[must_use]
    pub fn new(display_name: impl Into<String>, email_address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            email_address: email_address.into(),
        }
    }

    /// Parse one entry of a recipient header, e.g. `"Jane" <jane@x.com>`.
    ///
    /// An entry without `<...>` is taken as a bare address.
    #[must_use]
    pub fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        let mut in_quotes = false;
        for (i, c) in entry.char_indices() {
            match c {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => {
                    let address = entry[i + 1..].trim_end().trim_end_matches('>');
                    return Self::new(trim_quotes(&entry[..i]), address.trim());
                }
                _ => {}
            }
        }
        Self::new("", trim_quotes(entry))
    }
}

impl fmt::Display for Mailbox {
    /// `"Name" <addr>` when a display name is known, bare `addr` otherwise.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.display_name.is_empty() {
            f.write_str(&self.email_address)
        } else {
            write!(f, "\"{}\" <{}>", self.display_name, self.email_address)
        }
    }
}

/// Split a recipient header into its individual entries.
///
/// Commas, semicolons and newlines separate entries, except inside a
/// quoted display name or inside an `<...>` address. Entries are trimmed
/// and empty entries are dropped, so an empty or whitespace-only header
/// yields an empty list.
///
/// # Examples
///
/// ```
/// use mail_ui_core::split_address_list;
///
/// let parts = split_address_list("\"Doe, Jane\" <jane@x.com>, bob@y.com");
/// assert_eq!(parts, vec!["\"Doe, Jane\" <jane@x.com>", "bob@y.com"]);
/// ```
#[must_use]
pub fn split_address_list(raw: &str) -> Vec<String> {
    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut in_angle = false;
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
                continue;
            }
            '"' if !in_angle => in_quotes = !in_quotes,
            '<' if !in_quotes => in_angle = true,
            '>' if !in_quotes => in_angle = false,
            ',' | ';' | '\n' if !in_quotes && !in_angle => {
                push_entry(&mut entries, &current);
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(c);
    }
    push_entry(&mut entries, &current);

    entries
}

fn push_entry(entries: &mut Vec<String>, entry: &str) {
    let trimmed = entry.trim();
    if !trimmed.is_empty() {
        entries.push(trimmed.to_string());
    }
}

/// The short display form of one address entry.
///
/// Returns the display name if the entry has one, the bare address
/// otherwise, with surrounding quotes and whitespace stripped.
#[must_use]
pub fn display_of(address: Option<&str>) -> String {
    let Some(address) = address.map(str::trim).filter(|a| !a.is_empty()) else {
        return NO_RECIPIENT.to_string();
    };

    let mut in_quotes = false;
    for (i, c) in address.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => {
                let name = trim_quotes(&address[..i]);
                if !name.is_empty() {
                    return name.to_string();
                }
                let inner = address[i + 1..].trim_end_matches('>');
                return trim_quotes(inner).to_string();
            }
            _ => {}
        }
    }

    let display = trim_quotes(address);
    if display.is_empty() {
        NO_RECIPIENT.to_string()
    } else {
        display.to_string()
    }
}

/// Display forms of every entry in a raw header, joined with `", "`.
#[must_use]
pub fn displays_of_list(raw: Option<&str>) -> String {
    let entries = raw.map(split_address_list).unwrap_or_default();
    if entries.is_empty() {
        return NO_RECIPIENT.to_string();
    }
    entries
        .iter()
        .map(|entry| display_of(Some(entry)))
        .collect::<Vec<_>>()
        .join(", ")
}

fn trim_quotes(s: &str) -> &str {
    s.trim_matches(|c: char| c.is_whitespace() || c == '"')
}
