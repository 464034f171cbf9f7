use std::sync::Arc;

use anyhow::Result;

use crate::api::ChatBackend;
use crate::state::{ChatReply, Connectivity, HealthStatus, Message, WidgetState};
use crate::view::{MessageEntry, SubmitState, View, DEFAULT_TIME_FORMAT};

pub const STATUS_READY: &str = "Ready to chat";
pub const STATUS_UNAVAILABLE: &str = "System unavailable";
pub const STATUS_CONNECTION_ERROR: &str = "Connection error";

/// Shown when the backend answered without a reply or an error string
pub const FALLBACK_ERROR: &str = "Sorry, I encountered an error processing your request.";
/// Shown when the chat request failed in transport
pub const CONNECTION_FAILURE: &str = "Sorry, I'm having trouble connecting. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub shift: bool,
}

impl KeyInput {
    pub fn enter() -> Self {
        Self { key: Key::Enter, shift: false }
    }

    fn is_submit(&self) -> bool {
        self.key == Key::Enter && !self.shift
    }
}

/// Input events the widget reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SubmitActivated,
    KeyPressed(KeyInput),
    PresetChosen(usize),
}

/// Which branch a send took before returning to idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    SoftError,
    TransportError,
}

/// Client-side chat state machine.
///
/// Owns the transcript and the loading flag, and drives an injected [`View`].
/// Every backend failure is absorbed here and rendered as an assistant
/// message or a status line.
pub struct ChatWidget<V: View> {
    backend: Arc<dyn ChatBackend>,
    view: V,
    state: WidgetState,
    transcript: Vec<Message>,
    presets: Vec<String>,
    typing_visible: bool,
    time_format: String,
}

impl<V: View> ChatWidget<V> {
    pub fn new(backend: Arc<dyn ChatBackend>, view: V, presets: Vec<String>) -> Self {
        Self {
            backend,
            view,
            state: WidgetState::default(),
            transcript: Vec::new(),
            presets,
            typing_visible: false,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    pub fn with_time_format(mut self, time_format: impl Into<String>) -> Self {
        self.time_format = time_format.into();
        self
    }

    pub fn state(&self) -> WidgetState {
        self.state
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn presets(&self) -> &[String] {
        &self.presets
    }

    pub fn is_typing(&self) -> bool {
        self.typing_visible
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    /// Shared handle to the backend, for front ends that run the chat
    /// request on their own task.
    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::clone(&self.backend)
    }

    /// Publish the preset shortcuts, run the health check once and focus input.
    pub async fn initialize(&mut self) {
        self.bind_inputs();
        self.check_health().await;
        self.view.focus_input();
    }

    /// The part of [`ChatWidget::initialize`] that needs no network. Front
    /// ends that run the health check on their own task call this, then
    /// hand the result to [`ChatWidget::apply_health`].
    pub fn bind_inputs(&mut self) {
        self.view.set_presets(&self.presets);
        self.view.set_submit_state(SubmitState::Ready);
        self.view.set_input_enabled(true);
    }

    pub async fn check_health(&mut self) -> Connectivity {
        let result = self.backend.health().await;
        self.apply_health(result)
    }

    /// Map a health check result to connectivity and update the status line.
    pub fn apply_health(&mut self, result: Result<HealthStatus>) -> Connectivity {
        let (connectivity, text) = match result {
            Ok(health) if health.is_all_clear() => (Connectivity::Online, STATUS_READY),
            Ok(health) => {
                tracing::info!(?health, "backend reports degraded health");
                (Connectivity::Offline, STATUS_UNAVAILABLE)
            }
            Err(e) => {
                tracing::warn!("Health check failed: {:#}", e);
                (Connectivity::Offline, STATUS_CONNECTION_ERROR)
            }
        };

        self.state.connectivity = connectivity;
        self.view.set_status(connectivity, text);
        connectivity
    }

    /// React to an input event and run any triggered send to completion.
    pub async fn handle(&mut self, command: Command) -> Option<SendOutcome> {
        let message = self.dispatch(command)?;
        let result = self.backend.chat(&message).await;
        self.finish_send(result)
    }

    /// React to an input event without awaiting the network. Returns the
    /// message to send when the event started a send; the caller must hand
    /// the backend result to [`ChatWidget::finish_send`].
    pub fn dispatch(&mut self, command: Command) -> Option<String> {
        match command {
            Command::SubmitActivated => self.begin_send(),
            Command::KeyPressed(key) if key.is_submit() => self.begin_send(),
            Command::KeyPressed(_) => None,
            Command::PresetChosen(index) => {
                if self.state.is_loading {
                    return None;
                }
                let question = self.presets.get(index)?.clone();
                self.view.set_input_text(&question);
                self.begin_send()
            }
        }
    }

    pub async fn send_message(&mut self) -> Option<SendOutcome> {
        let message = self.begin_send()?;
        let result = self.backend.chat(&message).await;
        self.finish_send(result)
    }

    /// Everything a send does before the request goes out. `None` means the
    /// input was blank or a request is already in flight.
    pub fn begin_send(&mut self) -> Option<String> {
        let message = self.view.input_text().trim().to_string();

        if message.is_empty() || self.state.is_loading {
            return None;
        }

        self.render_message(Message::user(message.clone()));
        self.view.set_input_text("");
        self.set_loading(true);
        self.show_typing();

        tracing::debug!(chars = message.chars().count(), "sending chat message");
        Some(message)
    }

    /// Render the outcome of the in-flight request and return to idle.
    /// Returns `None` when no request was in flight.
    pub fn finish_send(&mut self, result: Result<ChatReply>) -> Option<SendOutcome> {
        if !self.state.is_loading {
            tracing::warn!("finish_send called with no request in flight");
            return None;
        }

        self.hide_typing();

        let outcome = match result {
            Ok(reply) => match reply.reply_text() {
                Some(text) => {
                    self.render_message(Message::assistant(text, reply.sources.clone()));
                    SendOutcome::Success
                }
                None => {
                    let text = reply.error_text().unwrap_or(FALLBACK_ERROR);
                    tracing::info!("backend returned no reply: {}", text);
                    self.render_message(Message::assistant(text, Vec::new()));
                    SendOutcome::SoftError
                }
            },
            Err(e) => {
                tracing::warn!("Chat error: {:#}", e);
                self.render_message(Message::assistant(CONNECTION_FAILURE, Vec::new()));
                SendOutcome::TransportError
            }
        };

        self.set_loading(false);
        Some(outcome)
    }

    pub fn render_message(&mut self, message: Message) {
        self.view
            .append_message(MessageEntry::from_message(&message, &self.time_format));
        self.transcript.push(message);
        self.view.scroll_to_bottom();
    }

    pub fn show_typing(&mut self) {
        if self.typing_visible {
            return;
        }
        self.typing_visible = true;
        self.view.show_typing();
        self.view.scroll_to_bottom();
    }

    pub fn hide_typing(&mut self) {
        if !self.typing_visible {
            return;
        }
        self.typing_visible = false;
        self.view.remove_typing();
    }

    fn set_loading(&mut self, loading: bool) {
        self.state.is_loading = loading;
        self.view.set_input_enabled(!loading);
        self.view.set_submit_state(if loading {
            SubmitState::Busy
        } else {
            SubmitState::Ready
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Role;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    enum Scripted {
        Reply(ChatReply),
        Fail(&'static str),
    }

    struct FakeBackend {
        health: Option<HealthStatus>,
        replies: Mutex<VecDeque<Scripted>>,
        chat_calls: AtomicUsize,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                health: None,
                replies: Mutex::new(VecDeque::new()),
                chat_calls: AtomicUsize::new(0),
            }
        }

        fn with_reply(self, reply: ChatReply) -> Self {
            self.replies.lock().unwrap().push_back(Scripted::Reply(reply));
            self
        }

        fn with_failure(self, reason: &'static str) -> Self {
            self.replies.lock().unwrap().push_back(Scripted::Fail(reason));
            self
        }

        fn with_health(mut self, status: &str, database: &str, model: &str) -> Self {
            self.health = Some(HealthStatus {
                status: Some(status.to_string()),
                database: Some(database.to_string()),
                model: Some(model.to_string()),
            });
            self
        }

        fn calls(&self) -> usize {
            self.chat_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatBackend for FakeBackend {
        async fn health(&self) -> Result<HealthStatus> {
            self.health
                .clone()
                .ok_or_else(|| anyhow!("connection refused"))
        }

        async fn chat(&self, _message: &str) -> Result<ChatReply> {
            self.chat_calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.lock().unwrap().pop_front() {
                Some(Scripted::Reply(reply)) => Ok(reply),
                Some(Scripted::Fail(reason)) => Err(anyhow!(reason)),
                None => Err(anyhow!("no scripted reply")),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum ViewEvent {
        Append(MessageEntry),
        ShowTyping,
        RemoveTyping,
        Status(Connectivity, String),
        Presets(Vec<String>),
        Focus,
    }

    #[derive(Default)]
    struct RecordingView {
        input: String,
        input_enabled: bool,
        submit: SubmitState,
        typing_rows: usize,
        events: Vec<ViewEvent>,
    }

    impl RecordingView {
        fn with_input(text: &str) -> Self {
            Self {
                input: text.to_string(),
                input_enabled: true,
                ..Self::default()
            }
        }

        fn entries(&self) -> Vec<&MessageEntry> {
            self.events
                .iter()
                .filter_map(|event| match event {
                    ViewEvent::Append(entry) => Some(entry),
                    _ => None,
                })
                .collect()
        }

        fn last_status(&self) -> Option<(Connectivity, String)> {
            self.events.iter().rev().find_map(|event| match event {
                ViewEvent::Status(connectivity, text) => Some((*connectivity, text.clone())),
                _ => None,
            })
        }
    }

    impl View for RecordingView {
        fn input_text(&self) -> String {
            self.input.clone()
        }

        fn set_input_text(&mut self, text: &str) {
            self.input = text.to_string();
        }

        fn focus_input(&mut self) {
            self.events.push(ViewEvent::Focus);
        }

        fn set_input_enabled(&mut self, enabled: bool) {
            self.input_enabled = enabled;
        }

        fn set_submit_state(&mut self, state: SubmitState) {
            self.submit = state;
        }

        fn set_presets(&mut self, presets: &[String]) {
            self.events.push(ViewEvent::Presets(presets.to_vec()));
        }

        fn append_message(&mut self, entry: MessageEntry) {
            self.events.push(ViewEvent::Append(entry));
        }

        fn show_typing(&mut self) {
            self.typing_rows += 1;
            self.events.push(ViewEvent::ShowTyping);
        }

        fn remove_typing(&mut self) {
            self.typing_rows = self.typing_rows.saturating_sub(1);
            self.events.push(ViewEvent::RemoveTyping);
        }

        fn set_status(&mut self, connectivity: Connectivity, text: &str) {
            self.events.push(ViewEvent::Status(connectivity, text.to_string()));
        }

        fn scroll_to_bottom(&mut self) {}
    }

    fn setup(backend: FakeBackend, input: &str) -> (ChatWidget<RecordingView>, Arc<FakeBackend>) {
        let backend = Arc::new(backend);
        let presets = vec!["What projects has he built?".to_string(), "What are his skills?".to_string()];
        let widget = ChatWidget::new(backend.clone(), RecordingView::with_input(input), presets);
        (widget, backend)
    }

    fn reply(response: Option<&str>, sources: &[&str], error: Option<&str>) -> ChatReply {
        ChatReply {
            response: response.map(str::to_string),
            sources: sources.iter().map(|s| s.to_string()).collect(),
            error: error.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_success_renders_reply_and_sources_in_order() {
        let backend = FakeBackend::new().with_reply(reply(Some("Hello"), &["doc1", "doc2"], None));
        let (mut widget, backend) = setup(backend, "  hi there  ");

        let outcome = widget.send_message().await;

        assert_eq!(outcome, Some(SendOutcome::Success));
        assert_eq!(backend.calls(), 1);
        let entries = widget.view().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].role, Role::User);
        assert_eq!(entries[0].text, "hi there");
        assert_eq!(entries[1].role, Role::Assistant);
        assert_eq!(entries[1].text, "Hello");
        assert_eq!(entries[1].sources, vec!["doc1".to_string(), "doc2".to_string()]);
        assert!(!widget.state().is_loading);
        assert_eq!(widget.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_ordering_user_then_typing_then_reply() {
        let backend = FakeBackend::new().with_reply(reply(Some("Hello"), &[], None));
        let (mut widget, _) = setup(backend, "hi");

        widget.send_message().await;

        let events: Vec<&ViewEvent> = widget
            .view()
            .events
            .iter()
            .filter(|e| matches!(e, ViewEvent::Append(_) | ViewEvent::ShowTyping | ViewEvent::RemoveTyping))
            .collect();
        assert!(matches!(events[0], ViewEvent::Append(entry) if entry.role == Role::User));
        assert_eq!(events[1], &ViewEvent::ShowTyping);
        assert_eq!(events[2], &ViewEvent::RemoveTyping);
        assert!(matches!(events[3], ViewEvent::Append(entry) if entry.role == Role::Assistant));
    }

    #[tokio::test]
    async fn test_soft_error_uses_server_error_text() {
        let backend = FakeBackend::new().with_reply(reply(None, &[], Some("rate limited")));
        let (mut widget, _) = setup(backend, "hi");

        assert_eq!(widget.send_message().await, Some(SendOutcome::SoftError));

        let entries = widget.view().entries();
        assert_eq!(entries.last().unwrap().text, "rate limited");
        assert!(entries.last().unwrap().sources.is_empty());
        assert_eq!(widget.view().typing_rows, 0);
    }

    #[tokio::test]
    async fn test_soft_error_without_error_text_uses_fallback() {
        let backend = FakeBackend::new().with_reply(reply(Some(""), &["ignored"], None));
        let (mut widget, _) = setup(backend, "hi");

        assert_eq!(widget.send_message().await, Some(SendOutcome::SoftError));
        assert_eq!(widget.view().entries().last().unwrap().text, FALLBACK_ERROR);
    }

    #[tokio::test]
    async fn test_transport_failure_renders_fixed_message_and_clears_state() {
        let backend = FakeBackend::new().with_failure("connection refused");
        let (mut widget, _) = setup(backend, "hi");

        assert_eq!(widget.send_message().await, Some(SendOutcome::TransportError));

        let view = widget.view();
        assert_eq!(view.entries().last().unwrap().text, CONNECTION_FAILURE);
        assert_eq!(view.typing_rows, 0);
        assert!(!widget.is_typing());
        assert!(view.input_enabled);
        assert_eq!(view.submit, SubmitState::Ready);
        assert!(!widget.state().is_loading);
    }

    #[tokio::test]
    async fn test_blank_input_is_a_noop() {
        let (mut widget, backend) = setup(FakeBackend::new(), "   \n\t ");

        assert_eq!(widget.send_message().await, None);
        assert!(widget.view().entries().is_empty());
        assert_eq!(backend.calls(), 0);
        assert_eq!(widget.view().input, "   \n\t ");
    }

    #[tokio::test]
    async fn test_send_while_loading_is_a_noop() {
        let backend = FakeBackend::new().with_reply(reply(Some("first"), &[], None));
        let (mut widget, backend) = setup(backend, "first");

        let pending = widget.begin_send();
        assert_eq!(pending.as_deref(), Some("first"));
        assert!(widget.state().is_loading);
        assert!(!widget.view().input_enabled);
        assert_eq!(widget.view().submit, SubmitState::Busy);
        assert_eq!(widget.view().input, "");

        widget.view_mut().set_input_text("second");
        assert_eq!(widget.send_message().await, None);
        assert_eq!(widget.dispatch(Command::SubmitActivated), None);
        assert_eq!(backend.calls(), 0);
        assert_eq!(widget.view().entries().len(), 1);
        assert_eq!(widget.view().typing_rows, 1);
    }

    #[tokio::test]
    async fn test_split_flow_finishes_once() {
        let (mut widget, _) = setup(FakeBackend::new(), "hi");

        let message = widget.begin_send().expect("send should start");
        assert_eq!(message, "hi");

        let outcome = widget.finish_send(Ok(reply(Some("Hello"), &[], None)));
        assert_eq!(outcome, Some(SendOutcome::Success));
        assert_eq!(widget.finish_send(Ok(reply(Some("again"), &[], None))), None);
        assert_eq!(widget.view().entries().len(), 2);
    }

    #[tokio::test]
    async fn test_sequential_sends_each_add_two_messages() {
        let backend = FakeBackend::new()
            .with_reply(reply(Some("one"), &[], None))
            .with_failure("timeout");
        let (mut widget, backend) = setup(backend, "first");

        widget.send_message().await;
        widget.view_mut().set_input_text("second");
        widget.send_message().await;

        assert_eq!(backend.calls(), 2);
        let texts: Vec<&str> = widget.view().entries().iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "one", "second", CONNECTION_FAILURE]);
    }

    #[test]
    fn test_hide_typing_is_idempotent() {
        let (mut widget, _) = setup(FakeBackend::new(), "");

        widget.hide_typing();
        widget.hide_typing();
        assert_eq!(widget.view().typing_rows, 0);

        widget.show_typing();
        widget.show_typing();
        assert_eq!(widget.view().typing_rows, 1);

        widget.hide_typing();
        widget.hide_typing();
        assert_eq!(widget.view().typing_rows, 0);
    }

    #[tokio::test]
    async fn test_health_online() {
        let backend = FakeBackend::new().with_health("healthy", "available", "available");
        let (mut widget, _) = setup(backend, "");

        assert_eq!(widget.check_health().await, Connectivity::Online);
        assert_eq!(
            widget.view().last_status(),
            Some((Connectivity::Online, STATUS_READY.to_string()))
        );
    }

    #[tokio::test]
    async fn test_health_degraded_and_failure_are_distinguishable() {
        let backend = FakeBackend::new().with_health("degraded", "available", "available");
        let (mut widget, _) = setup(backend, "");
        assert_eq!(widget.check_health().await, Connectivity::Offline);
        assert_eq!(
            widget.view().last_status(),
            Some((Connectivity::Offline, STATUS_UNAVAILABLE.to_string()))
        );

        let (mut widget, _) = widget_without_health();
        assert_eq!(widget.check_health().await, Connectivity::Offline);
        assert_eq!(
            widget.view().last_status(),
            Some((Connectivity::Offline, STATUS_CONNECTION_ERROR.to_string()))
        );
    }

    fn widget_without_health() -> (ChatWidget<RecordingView>, Arc<FakeBackend>) {
        setup(FakeBackend::new(), "")
    }

    #[test]
    fn test_bind_inputs_then_apply_health_result() {
        let (mut widget, _) = setup(FakeBackend::new(), "");
        widget.view_mut().input_enabled = false;
        widget.bind_inputs();
        assert_eq!(widget.state().connectivity, Connectivity::Unknown);
        assert!(widget.view().input_enabled);

        let connectivity = widget.apply_health(Err(anyhow!("timed out")));
        assert_eq!(connectivity, Connectivity::Offline);
        assert_eq!(
            widget.view().last_status(),
            Some((Connectivity::Offline, STATUS_CONNECTION_ERROR.to_string()))
        );
    }

    #[tokio::test]
    async fn test_initialize_publishes_presets_checks_health_and_focuses() {
        let backend = FakeBackend::new().with_health("healthy", "available", "available");
        let (mut widget, _) = setup(backend, "");
        assert_eq!(widget.state().connectivity, Connectivity::Unknown);

        widget.initialize().await;

        let events = &widget.view().events;
        assert!(matches!(&events[0], ViewEvent::Presets(p) if p.len() == 2));
        assert!(matches!(events.last(), Some(ViewEvent::Focus)));
        assert_eq!(widget.state().connectivity, Connectivity::Online);
    }

    #[tokio::test]
    async fn test_enter_submits_but_shift_enter_does_not() {
        let backend = FakeBackend::new().with_reply(reply(Some("ok"), &[], None));
        let (mut widget, backend) = setup(backend, "hello");

        let shifted = KeyInput { key: Key::Enter, shift: true };
        assert_eq!(widget.handle(Command::KeyPressed(shifted)).await, None);
        let other = KeyInput { key: Key::Other, shift: false };
        assert_eq!(widget.handle(Command::KeyPressed(other)).await, None);
        assert_eq!(backend.calls(), 0);

        let outcome = widget.handle(Command::KeyPressed(KeyInput::enter())).await;
        assert_eq!(outcome, Some(SendOutcome::Success));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_preset_populates_input_and_submits() {
        let backend = FakeBackend::new().with_reply(reply(Some("Rust and Python"), &["cv"], None));
        let (mut widget, _) = setup(backend, "draft text");

        let outcome = widget.handle(Command::PresetChosen(1)).await;

        assert_eq!(outcome, Some(SendOutcome::Success));
        let entries = widget.view().entries();
        assert_eq!(entries[0].text, "What are his skills?");
        assert_eq!(widget.view().input, "");
    }

    #[tokio::test]
    async fn test_unknown_preset_is_ignored() {
        let (mut widget, backend) = setup(FakeBackend::new(), "draft");

        assert_eq!(widget.handle(Command::PresetChosen(7)).await, None);
        assert_eq!(widget.view().input, "draft");
        assert_eq!(backend.calls(), 0);
    }
}
