use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use kbchat_core::{Command, Key, KeyInput};
use ratatui::layout::Rect;
use crate::app::{App, FocusPane};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
        }
    }

    app.poll_pending().await;
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any pane
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match key.code {
        KeyCode::Esc => {
            app.should_quit = true;
            return;
        }
        KeyCode::Tab => {
            let focus = app.view().focus.next();
            app.view_mut().focus = focus;
            return;
        }
        KeyCode::BackTab => {
            let focus = app.view().focus.prev();
            app.view_mut().focus = focus;
            return;
        }
        KeyCode::PageUp => {
            app.scroll_up(app.half_page());
            return;
        }
        KeyCode::PageDown => {
            app.scroll_down(app.half_page());
            return;
        }
        _ => {}
    }

    match app.view().focus {
        FocusPane::Input => handle_input_key(app, key),
        FocusPane::Send => {
            if matches!(key.code, KeyCode::Enter | KeyCode::Char(' ')) {
                app.run_command(Command::SubmitActivated);
            }
        }
        FocusPane::Presets => match key.code {
            KeyCode::Char('j') | KeyCode::Down => app.preset_nav_down(),
            KeyCode::Char('k') | KeyCode::Up => app.preset_nav_up(),
            KeyCode::Enter => {
                if let Some(index) = app.selected_preset() {
                    app.run_command(Command::PresetChosen(index));
                }
            }
            _ => {}
        },
    }
}

fn handle_input_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Enter {
        app.run_command(Command::KeyPressed(KeyInput {
            key: Key::Enter,
            shift: key.modifiers.contains(KeyModifiers::SHIFT),
        }));
        return;
    }

    let view = app.view_mut();
    if !view.input_enabled {
        return;
    }

    match key.code {
        KeyCode::Backspace => {
            if view.cursor > 0 {
                view.cursor -= 1;
                let byte_pos = char_to_byte_index(&view.input, view.cursor);
                view.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            let char_count = view.input.chars().count();
            if view.cursor < char_count {
                let byte_pos = char_to_byte_index(&view.input, view.cursor);
                view.input.remove(byte_pos);
            }
        }
        KeyCode::Left => {
            view.cursor = view.cursor.saturating_sub(1);
        }
        KeyCode::Right => {
            let char_count = view.input.chars().count();
            view.cursor = (view.cursor + 1).min(char_count);
        }
        KeyCode::Home => {
            view.cursor = 0;
        }
        KeyCode::End => {
            view.cursor = view.input.chars().count();
        }
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let byte_pos = char_to_byte_index(&view.input, view.cursor);
            view.input.insert(byte_pos, c);
            view.cursor += 1;
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let (x, y) = (mouse.column, mouse.row);

    match mouse.kind {
        MouseEventKind::ScrollUp => {
            if app.chat_area.is_some_and(|area| point_in_rect(x, y, area)) {
                app.scroll_up(3);
            }
        }
        MouseEventKind::ScrollDown => {
            if app.chat_area.is_some_and(|area| point_in_rect(x, y, area)) {
                app.scroll_down(3);
            }
        }
        MouseEventKind::Down(MouseButton::Left) => {
            if app.send_area.is_some_and(|area| point_in_rect(x, y, area)) {
                app.view_mut().focus = FocusPane::Send;
                app.run_command(Command::SubmitActivated);
            } else if let Some(area) = app.presets_area.filter(|area| point_in_rect(x, y, *area)) {
                // Rows start below the top border
                let row = y.saturating_sub(area.y + 1) as usize;
                let offset = app.view().preset_state.offset();
                let index = offset + row;
                if y > area.y && index < app.view().presets.len() {
                    let view = app.view_mut();
                    view.focus = FocusPane::Presets;
                    view.preset_state.select(Some(index));
                    app.run_command(Command::PresetChosen(index));
                }
            } else {
                app.view_mut().focus = FocusPane::Input;
            }
        }
        _ => {}
    }
}
