//! Error types for mail-ui-core

use crate::tracker::OperationId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The call could not be delivered or was never answered.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with an explicit error, or with a reply
    /// whose shape could not be understood.
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Operation cancelled")]
    Cancelled,

    /// Settlement of an operation its owner no longer considers current.
    #[error("Stale response for operation {0}")]
    Stale(OperationId),

    #[error("Folder hierarchy of account {account} loops at {folder}")]
    FolderCycle { account: String, folder: String },

    #[error("Unknown folder {folder} in account {account}")]
    UnknownFolder { account: String, folder: String },

    #[error("No folder is selected")]
    NoActiveFolder,

    #[error("No message is open")]
    NoOpenMessage,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl Error {
    /// Downgrade a malformed reply into a displayable backend error.
    pub(crate) fn malformed(context: &str, detail: impl std::fmt::Display) -> Self {
        Self::Backend(format!("malformed {context} reply: {detail}"))
    }

    /// Whether this error belongs on the user-visible reporting channel.
    ///
    /// Stale responses and cancellations the caller asked for are
    /// swallowed; everything else is reported.
    #[must_use]
    pub const fn is_reportable(&self) -> bool {
        !matches!(self, Self::Stale(_) | Self::Cancelled)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Backend(format!("JSON error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_and_cancelled_are_not_reportable() {
        assert!(!Error::Stale(OperationId::new(3)).is_reportable());
        assert!(!Error::Cancelled.is_reportable());
        assert!(Error::Backend("nope".into()).is_reportable());
        assert!(Error::Transport("down".into()).is_reportable());
    }

    #[test]
    fn malformed_keeps_description() {
        let err = Error::malformed("getMessages", "missing field `uid`");
        assert_eq!(
            err.to_string(),
            "Backend error: malformed getMessages reply: missing field `uid`"
        );
    }
}
