//! In-process fake backend for integration testing
//!
//! Tests build mailbox state with [`MailboxBuilder`] and serve it either
//! straight from a `MemoryBackend` or through a [`GatedBackend`], which
//! parks every call until the test releases it. Releasing calls in a
//! chosen order reproduces replies that overtake each other.
//!
//! ## Module layout
//!
//! - `mailbox` -- builder for snapshot test data
//! - `gated` -- backend whose replies the test releases by hand

#![allow(dead_code)]

pub mod gated;
pub mod mailbox;

pub use gated::GatedBackend;
pub use mailbox::MailboxBuilder;

use async_trait::async_trait;
use mail_ui_core::{Backend, Request, Result};
use serde_json::Value;

/// A backend that never answers.
pub struct Silent;

#[async_trait]
impl Backend for Silent {
    async fn call(&self, _request: Request) -> Result<Value> {
        futures::future::pending().await
    }
}
