use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use kbchat_core::{Connectivity, MessageEntry, Role, SubmitState};
use crate::app::{App, FocusPane, TuiView};

const SPINNER: [&str; 3] = ["◐", "◓", "◑"];

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("**") else {
            break;
        };

        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        let bold_text = &after_open[..end];
        if bold_text.is_empty() {
            spans.push(Span::raw("****"));
        } else {
            spans.push(Span::styled(
                bold_text.to_string(),
                Style::default().add_modifier(Modifier::BOLD),
            ));
        }
        rest = &after_open[end + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

fn avatar_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        Role::Assistant => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    }
}

fn entry_lines(entry: &MessageEntry, lines: &mut Vec<Line<'static>>) {
    lines.push(Line::from(vec![
        Span::styled(format!("{}:", entry.avatar), avatar_style(entry.role)),
        Span::raw(" "),
        Span::styled(entry.time.clone(), Style::default().fg(Color::DarkGray)),
    ]));

    match entry.role {
        Role::User => {
            for line in entry.text.lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Role::Assistant => {
            for line in entry.text.lines() {
                lines.push(parse_markdown_line(line));
            }
        }
    }

    if entry.has_sources() {
        let badge_style = Style::default().bg(Color::DarkGray).fg(Color::White);
        let mut spans = vec![Span::styled("Sources: ", Style::default().fg(Color::DarkGray))];
        for (i, source) in entry.sources.iter().enumerate() {
            if i > 0 {
                spans.push(Span::raw(" "));
            }
            spans.push(Span::styled(format!(" {} ", source), badge_style));
        }
        lines.push(Line::from(spans));
    }

    lines.push(Line::default());
}

/// All transcript lines, including the typing placeholder when shown
pub fn transcript_lines(view: &TuiView, animation_frame: u8) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    for entry in &view.entries {
        entry_lines(entry, &mut lines);
    }

    if view.typing {
        lines.push(Line::from(Span::styled("AI:", avatar_style(Role::Assistant))));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("typing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// Rows the lines occupy once word-wrapped to `width`, counted by the same
/// wrapper the transcript paragraph renders with. Saturates at `u16::MAX`.
fn wrapped_height(lines: &[Line<'static>], width: u16) -> u16 {
    let rows = Paragraph::new(Text::from(lines.to_vec()))
        .wrap(Wrap { trim: false })
        .line_count(width.max(1));
    u16::try_from(rows).unwrap_or(u16::MAX)
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    // Main layout: header, body, footer
    let [header_area, body_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);

    let [chat_column, presets_area] = Layout::horizontal([
        Constraint::Percentage(70),
        Constraint::Percentage(30),
    ])
    .areas(body_area);

    let [chat_area, input_row] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(3),
    ])
    .areas(chat_column);

    let [input_area, send_area] = Layout::horizontal([
        Constraint::Min(0),
        Constraint::Length(8),
    ])
    .areas(input_row);

    // Store areas for mouse hit-testing
    app.chat_area = Some(chat_area);
    app.send_area = Some(send_area);
    app.presets_area = Some(presets_area);

    render_transcript(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_send_button(app, frame, send_area);
    render_presets(app, frame, presets_area);
    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let view = app.view();
    let indicator_color = match view.connectivity {
        Connectivity::Online => Color::Green,
        Connectivity::Offline => Color::Red,
        Connectivity::Unknown => Color::Yellow,
    };

    let title = Line::from(vec![
        Span::styled(" Knowledge Base Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::raw(" "),
        Span::styled("●", Style::default().fg(indicator_color)),
        Span::raw(" "),
        Span::styled(view.status_text.clone(), Style::default().fg(Color::White)),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    let inner_height = area.height.saturating_sub(2);
    let inner_width = area.width.saturating_sub(2);

    let lines = transcript_lines(app.view(), app.animation_frame);
    let total = wrapped_height(&lines, inner_width);

    app.chat_height = inner_height;
    app.max_scroll = total.saturating_sub(inner_height);

    let max_scroll = app.max_scroll;
    let view = app.view_mut();
    if view.follow_bottom {
        view.scroll = max_scroll;
    } else {
        view.scroll = view.scroll.min(max_scroll);
    }
    let scroll = view.scroll;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Chat ");

    let text = if lines.is_empty() {
        Text::from(Span::styled(
            "Ask a question, or pick a suggestion on the right...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let view = app.view();
    let focused = view.focus == FocusPane::Input;

    let border_color = if !view.input_enabled {
        Color::DarkGray
    } else if focused {
        Color::Yellow
    } else {
        Color::Gray
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Message ");

    // Calculate visible portion of input with horizontal scrolling
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = view.cursor;

    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = view.input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let text_style = if view.input_enabled {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let input = Paragraph::new(visible_text).style(text_style).block(block);
    frame.render_widget(input, area);

    if focused && view.input_enabled {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_send_button(app: &App, frame: &mut Frame, area: Rect) {
    let view = app.view();
    let focused = view.focus == FocusPane::Send;

    let (label, style) = match view.submit {
        SubmitState::Ready => (
            "Send".to_string(),
            if focused {
                Style::default().bg(Color::Yellow).fg(Color::Black).bold()
            } else {
                Style::default().fg(Color::Green).bold()
            },
        ),
        SubmitState::Busy => (
            SPINNER[app.animation_frame as usize % SPINNER.len()].to_string(),
            Style::default().fg(Color::DarkGray),
        ),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Yellow } else { Color::DarkGray }));

    let button = Paragraph::new(Line::from(Span::styled(label, style)).centered()).block(block);
    frame.render_widget(button, area);
}

fn render_presets(app: &mut App, frame: &mut Frame, area: Rect) {
    let focused = app.view().focus == FocusPane::Presets;
    let enabled = app.view().input_enabled;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }))
        .title(" Try asking ");

    let item_style = if enabled {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let items: Vec<ListItem> = app
        .view()
        .presets
        .iter()
        .map(|question| ListItem::new(question.clone()).style(item_style))
        .collect();

    let mut list = List::new(items).block(block);
    if focused {
        list = list
            .highlight_style(
                Style::default()
                    .bg(Color::Cyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("> ");
    }

    frame.render_stateful_widget(list, area, &mut app.view_mut().preset_state);
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = if app.is_waiting() {
        vec![Span::styled(" waiting for reply... ", Style::default().bg(Color::Black).fg(Color::Yellow))]
    } else {
        Vec::new()
    };

    hints.extend(match app.view().focus {
        FocusPane::Input => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" send ", label_style),
        ],
        FocusPane::Send => vec![
            Span::styled(" Enter/Space ", key_style),
            Span::styled(" send ", label_style),
        ],
        FocusPane::Presets => vec![
            Span::styled(" j/k ", key_style),
            Span::styled(" nav ", label_style),
            Span::styled(" Enter ", key_style),
            Span::styled(" ask ", label_style),
        ],
    });

    hints.extend(vec![
        Span::styled(" Tab ", key_style),
        Span::styled(" focus ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    let footer = Paragraph::new(Line::from(hints)).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}
