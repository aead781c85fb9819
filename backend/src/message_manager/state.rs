//! Shared queue of pending admin messages.
//!
//! - `MessagesState`: a clonable, thread-safe handle injected into the Actix
//!   application as `web::Data`.
//! - `AdminMessage`: one notice, typed as error or success.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Error,
    Success,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdminMessage {
    pub message_type: MessageType,
    pub text: String,
}

/// A thread-safe, shareable queue of messages waiting to be displayed.
///
/// Writers are the save and load handlers that redirect; the listing pages
/// drain it. The queue is protected by an `Arc<RwLock>` so every worker of the
/// server shares the same instance.
///
/// There is one queue per process, not per admin session: with several admins
/// signed in, a message raised by one admin's redirect is shown to whoever
/// loads a listing next. Fine for a single-admin installation.
#[derive(Clone, Default)]
pub struct MessagesState {
    pub messages: Arc<RwLock<Vec<AdminMessage>>>,
}

impl MessagesState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_error(&self, text: impl Into<String>) {
        self.push(MessageType::Error, text.into()).await;
    }

    pub async fn add_success(&self, text: impl Into<String>) {
        self.push(MessageType::Success, text.into()).await;
    }

    async fn push(&self, message_type: MessageType, text: String) {
        let mut messages = self.messages.write().await;
        messages.push(AdminMessage { message_type, text });
    }

    /// Takes every pending message, oldest first.
    pub async fn drain(&self) -> Vec<AdminMessage> {
        let mut messages = self.messages.write().await;
        std::mem::take(&mut *messages)
    }
}
