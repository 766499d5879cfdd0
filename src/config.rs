//! Core configuration

use crate::error::{Error, Result};
use crate::sync::DEFAULT_PAGE_SIZE;
use std::env;
use std::path::PathBuf;

/// Default capacity of the change-event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Tunables of a [`MailSession`](crate::MailSession).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Messages requested per older-page fetch.
    pub page_size: usize,
    /// Change events buffered per subscriber before it starts lagging.
    pub event_capacity: usize,
    /// Mailbox snapshot served by the in-process backend, if any.
    pub snapshot: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            snapshot: None,
        }
    }
}

impl CoreConfig {
    /// Load configuration from environment variables
    ///
    /// Reads from `.env` file if present. All variables are optional:
    /// - `MAIL_PAGE_SIZE` (default: `20`)
    /// - `MAIL_EVENT_CAPACITY` (default: `256`)
    /// - `MAIL_SNAPSHOT`: path of a JSON mailbox snapshot
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            page_size: positive_var("MAIL_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            event_capacity: positive_var("MAIL_EVENT_CAPACITY", DEFAULT_EVENT_CAPACITY)?,
            snapshot: env::var_os("MAIL_SNAPSHOT")
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
        })
    }

    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }
}

fn positive_var(name: &str, default: usize) -> Result<usize> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    parse_positive(name, &raw)
}

fn parse_positive(name: &str, raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(Error::Config(format!("{name} must be greater than zero"))),
        Ok(value) => Ok(value),
        Err(e) => Err(Error::Config(format!("Invalid {name}: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = CoreConfig::default();
        assert_eq!(config.page_size, 20);
        assert_eq!(config.event_capacity, 256);
        assert!(config.snapshot.is_none());
    }

    #[test]
    fn positive_values_parse() {
        assert_eq!(parse_positive("MAIL_PAGE_SIZE", " 50 ").unwrap(), 50);
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        assert_eq!(
            parse_positive("MAIL_PAGE_SIZE", "0"),
            Err(Error::Config("MAIL_PAGE_SIZE must be greater than zero".to_string()))
        );
        assert!(matches!(
            parse_positive("MAIL_PAGE_SIZE", "many"),
            Err(Error::Config(msg)) if msg.starts_with("Invalid MAIL_PAGE_SIZE")
        ));
    }
}
