use anyhow::anyhow;
use kbchat_core::{
    ChatReply, ChatWidget, Command, Connectivity, HealthStatus, MessageEntry, SendOutcome,
    SubmitState, View,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Input,
    Send,
    Presets,
}

impl FocusPane {
    pub fn next(self) -> Self {
        match self {
            FocusPane::Input => FocusPane::Send,
            FocusPane::Send => FocusPane::Presets,
            FocusPane::Presets => FocusPane::Input,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            FocusPane::Input => FocusPane::Presets,
            FocusPane::Send => FocusPane::Input,
            FocusPane::Presets => FocusPane::Send,
        }
    }
}

/// Terminal implementation of the widget's render port
pub struct TuiView {
    pub entries: Vec<MessageEntry>,
    pub typing: bool,
    pub connectivity: Connectivity,
    pub status_text: String,

    // Input state
    pub input: String,
    pub cursor: usize, // char index into `input`
    pub input_enabled: bool,
    pub submit: SubmitState,
    pub focus: FocusPane,

    // Preset shortcuts
    pub presets: Vec<String>,
    pub preset_state: ListState,

    // Transcript scrolling
    pub scroll: u16,
    pub follow_bottom: bool,
}

impl TuiView {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            typing: false,
            connectivity: Connectivity::Unknown,
            status_text: "Checking connection...".to_string(),

            input: String::new(),
            cursor: 0,
            input_enabled: false,
            submit: SubmitState::Ready,
            focus: FocusPane::Input,

            presets: Vec::new(),
            preset_state: ListState::default(),

            scroll: 0,
            follow_bottom: true,
        }
    }
}

impl Default for TuiView {
    fn default() -> Self {
        Self::new()
    }
}

impl View for TuiView {
    fn input_text(&self) -> String {
        self.input.clone()
    }

    fn set_input_text(&mut self, text: &str) {
        self.input = text.to_string();
        self.cursor = self.input.chars().count();
    }

    fn focus_input(&mut self) {
        self.focus = FocusPane::Input;
    }

    fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
    }

    fn set_submit_state(&mut self, state: SubmitState) {
        self.submit = state;
    }

    fn set_presets(&mut self, presets: &[String]) {
        self.presets = presets.to_vec();
        self.preset_state
            .select(if self.presets.is_empty() { None } else { Some(0) });
    }

    fn append_message(&mut self, entry: MessageEntry) {
        self.entries.push(entry);
    }

    fn show_typing(&mut self) {
        self.typing = true;
    }

    fn remove_typing(&mut self) {
        self.typing = false;
    }

    fn set_status(&mut self, connectivity: Connectivity, text: &str) {
        self.connectivity = connectivity;
        self.status_text = text.to_string();
    }

    fn scroll_to_bottom(&mut self) {
        self.follow_bottom = true;
    }
}

pub struct App {
    pub should_quit: bool,
    pub widget: ChatWidget<TuiView>,

    // In-flight chat request and startup health check
    pub pending: Option<JoinHandle<anyhow::Result<ChatReply>>>,
    pub health_task: Option<JoinHandle<anyhow::Result<HealthStatus>>>,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis/spinner animation

    // Transcript geometry (updated during render)
    pub chat_height: u16,
    pub max_scroll: u16,

    // Panel areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub send_area: Option<Rect>,
    pub presets_area: Option<Rect>,
}

impl App {
    pub fn new(widget: ChatWidget<TuiView>) -> Self {
        Self {
            should_quit: false,
            widget,
            pending: None,
            health_task: None,
            animation_frame: 0,
            chat_height: 0,
            max_scroll: 0,
            chat_area: None,
            send_area: None,
            presets_area: None,
        }
    }

    pub fn view(&self) -> &TuiView {
        self.widget.view()
    }

    pub fn view_mut(&mut self) -> &mut TuiView {
        self.widget.view_mut()
    }

    /// Wire up the widget and start the health check in the background so
    /// input is handled while the backend answers.
    pub fn start(&mut self) {
        self.widget.bind_inputs();
        self.widget.view_mut().focus_input();

        let backend = self.widget.backend();
        self.health_task = Some(tokio::spawn(async move { backend.health().await }));
    }

    /// Feed a command to the widget. A send it starts runs on its own task so
    /// the UI keeps drawing while the backend answers.
    pub fn run_command(&mut self, command: Command) {
        if let Some(message) = self.widget.dispatch(command) {
            let backend = self.widget.backend();
            self.pending = Some(tokio::spawn(async move { backend.chat(&message).await }));
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.pending.is_some()
    }

    /// Hand finished task results to the widget.
    pub async fn poll_pending(&mut self) -> Option<SendOutcome> {
        if self.health_task.as_ref().is_some_and(|task| task.is_finished()) {
            self.finish_health().await;
        }

        if self.pending.as_ref().is_some_and(|task| task.is_finished()) {
            self.finish_pending().await
        } else {
            None
        }
    }

    /// Wait for the in-flight request, if any, and render its outcome.
    pub async fn finish_pending(&mut self) -> Option<SendOutcome> {
        let task = self.pending.take()?;
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("chat request task failed: {}", e)),
        };
        self.widget.finish_send(result)
    }

    /// Wait for the health check, if still running, and show its status.
    pub async fn finish_health(&mut self) -> Option<Connectivity> {
        let task = self.health_task.take()?;
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("health check task failed: {}", e)),
        };
        Some(self.widget.apply_health(result))
    }

    pub fn abort_pending(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        if let Some(task) = self.health_task.take() {
            task.abort();
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.widget.is_typing() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        let view = self.widget.view_mut();
        view.follow_bottom = false;
        view.scroll = view.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        let max_scroll = self.max_scroll;
        let view = self.widget.view_mut();
        view.scroll = view.scroll.saturating_add(lines).min(max_scroll);
        if view.scroll >= max_scroll {
            view.follow_bottom = true;
        }
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    pub fn preset_nav_down(&mut self) {
        let view = self.widget.view_mut();
        let len = view.presets.len();
        if len > 0 {
            let i = view.preset_state.selected().map_or(0, |i| (i + 1) % len);
            view.preset_state.select(Some(i));
        }
    }

    pub fn preset_nav_up(&mut self) {
        let view = self.widget.view_mut();
        let len = view.presets.len();
        if len > 0 {
            let i = view
                .preset_state
                .selected()
                .map_or(0, |i| if i == 0 { len - 1 } else { i - 1 });
            view.preset_state.select(Some(i));
        }
    }

    pub fn selected_preset(&self) -> Option<usize> {
        self.view().preset_state.selected()
    }
}
