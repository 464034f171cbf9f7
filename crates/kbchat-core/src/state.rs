//! UI-agnostic chat state types
//!
//! This module contains data structures that are shared between different front
//! ends and don't depend on any specific UI framework.

use chrono::{DateTime, Local};

/// A single transcript message. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    pub text: String,
    pub sent_at: DateTime<Local>,
    pub sources: Vec<String>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            sent_at: Local::now(),
            sources: Vec::new(),
        }
    }

    pub fn assistant(text: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            sent_at: Local::now(),
            sources,
        }
    }
}

/// The role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// Derived online/offline classification from the health check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    Online,
    Offline,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WidgetState {
    pub is_loading: bool,
    pub connectivity: Connectivity,
}

/// Availability flags reported by `GET /api/health`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HealthStatus {
    pub status: Option<String>,
    pub database: Option<String>,
    pub model: Option<String>,
}

impl HealthStatus {
    /// True only when every component reports itself usable.
    pub fn is_all_clear(&self) -> bool {
        self.status.as_deref() == Some("healthy")
            && self.database.as_deref() == Some("available")
            && self.model.as_deref() == Some("available")
    }
}

/// Body of a `POST /api/chat` response. Every field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatReply {
    pub response: Option<String>,
    pub sources: Vec<String>,
    pub error: Option<String>,
}

impl ChatReply {
    /// The reply text, if the backend produced a non-empty one.
    pub fn reply_text(&self) -> Option<&str> {
        self.response.as_deref().filter(|text| !text.is_empty())
    }

    pub fn error_text(&self) -> Option<&str> {
        self.error.as_deref().filter(|text| !text.is_empty())
    }
}
