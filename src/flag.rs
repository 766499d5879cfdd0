//! Message flags
//!
//! Provides a strongly-typed enum for the flags a `flagMessage` call can
//! set or unset instead of raw strings. The backend understands `seen` and
//! `deleted`; any other word is stored as a user keyword on the message.

use std::fmt;

/// A flag that can be set on or cleared from a message.
///
/// # Examples
///
/// ```
/// use mail_ui_core::Flag;
///
/// assert_eq!(Flag::Seen.as_wire_str(), "seen");
/// assert_eq!(Flag::from("unblockImages"), Flag::Keyword("unblockImages".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Flag {
    /// Message has been read.
    Seen,
    /// Message is marked for deletion.
    Deleted,
    /// A user-defined keyword flag.
    Keyword(String),
}

impl Flag {
    /// Keyword the backend uses to remember that remote images may load.
    pub const UNBLOCK_IMAGES: &'static str = "unblockImages";

    /// The word used for this flag in a `setFlags`/`unsetFlags` list.
    #[must_use]
    pub fn as_wire_str(&self) -> &str {
        match self {
            Self::Seen => "seen",
            Self::Deleted => "deleted",
            Self::Keyword(kw) => kw,
        }
    }

    /// Join flags into the comma-separated list the backend expects.
    ///
    /// Returns `None` for an empty slice so the parameter can be omitted.
    #[must_use]
    pub fn join(flags: &[Self]) -> Option<String> {
        if flags.is_empty() {
            return None;
        }
        Some(
            flags
                .iter()
                .map(Self::as_wire_str)
                .collect::<Vec<_>>()
                .join(","),
        )
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

impl From<&str> for Flag {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if s.eq_ignore_ascii_case("seen") {
            Self::Seen
        } else if s.eq_ignore_ascii_case("deleted") {
            Self::Deleted
        } else {
            Self::Keyword(s.to_string())
        }
    }
}

/// Parse a comma-separated flag list, skipping empty items.
#[must_use]
pub fn parse_flag_list(list: &str) -> Vec<Flag> {
    list.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(Flag::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_flags() {
        assert_eq!(Flag::Seen.as_wire_str(), "seen");
        assert_eq!(Flag::Deleted.as_wire_str(), "deleted");
    }

    #[test]
    fn keyword_flag() {
        let kw = Flag::Keyword(Flag::UNBLOCK_IMAGES.to_string());
        assert_eq!(kw.as_wire_str(), "unblockImages");
    }

    #[test]
    fn join_and_parse() {
        let flags = vec![Flag::Seen, Flag::Keyword("$Junk".to_string())];
        let joined = Flag::join(&flags).unwrap();
        assert_eq!(joined, "seen,$Junk");
        assert_eq!(parse_flag_list(&joined), flags);
        assert_eq!(Flag::join(&[]), None);
    }

    #[test]
    fn parse_is_case_insensitive_for_system_flags() {
        assert_eq!(parse_flag_list("SEEN, Deleted,,"), vec![Flag::Seen, Flag::Deleted]);
    }

    #[test]
    fn display_matches_wire_str() {
        assert_eq!(format!("{}", Flag::Deleted), "deleted");
    }
}
