pub mod api;
pub mod config;
pub mod state;
pub mod view;
pub mod widget;

// Re-export main types for convenience
pub use api::{ChatApiClient, ChatBackend};
pub use config::Config;
pub use state::{ChatReply, Connectivity, HealthStatus, Message, Role, WidgetState};
pub use view::{MessageEntry, SubmitState, View};
pub use widget::{ChatWidget, Command, Key, KeyInput, SendOutcome};
