//! Render port for the chat widget
//!
//! The widget never touches a UI toolkit directly. It issues render commands
//! against a [`View`], which a front end implements (the terminal UI does) and
//! which tests replace with a recording fake.

use std::fmt::Write;

use crate::state::{Connectivity, Message, Role};

/// Default time format for message timestamps (hour:minute)
pub const DEFAULT_TIME_FORMAT: &str = "%H:%M";

/// Visual state of the submit control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SubmitState {
    /// Default send icon, control enabled
    #[default]
    Ready,
    /// Busy spinner, control disabled
    Busy,
}

/// One rendered transcript row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEntry {
    pub role: Role,
    pub avatar: &'static str,
    pub text: String,
    pub time: String,
    pub sources: Vec<String>,
}

impl MessageEntry {
    pub fn from_message(message: &Message, time_format: &str) -> Self {
        // An invalid user-supplied format falls back to hour:minute
        let mut time = String::new();
        if write!(time, "{}", message.sent_at.format(time_format)).is_err() {
            time = message.sent_at.format(DEFAULT_TIME_FORMAT).to_string();
        }

        Self {
            role: message.role,
            avatar: avatar_for(message.role),
            text: message.text.clone(),
            time,
            sources: message.sources.clone(),
        }
    }

    pub fn has_sources(&self) -> bool {
        !self.sources.is_empty()
    }
}

pub fn avatar_for(role: Role) -> &'static str {
    match role {
        Role::User => "You",
        Role::Assistant => "AI",
    }
}

pub trait View {
    /// Current raw contents of the input field
    fn input_text(&self) -> String;

    fn set_input_text(&mut self, text: &str);

    fn focus_input(&mut self);

    /// Enable or disable the input field and the submit control together
    fn set_input_enabled(&mut self, enabled: bool);

    fn set_submit_state(&mut self, state: SubmitState);

    /// Offer the preset questions as shortcuts
    fn set_presets(&mut self, presets: &[String]);

    fn append_message(&mut self, entry: MessageEntry);

    fn show_typing(&mut self);

    fn remove_typing(&mut self);

    fn set_status(&mut self, connectivity: Connectivity, text: &str);

    fn scroll_to_bottom(&mut self);
}
