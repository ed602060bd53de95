use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc::UnboundedSender;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub fn handle_event(app: &mut App, event: AppEvent, tx: &UnboundedSender<AppEvent>) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key, tx),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => app.tick_animation(),
        AppEvent::Stream(event) => app.on_stream(event),
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    // Any keypress acknowledges the last error
    app.status = None;

    match app.input_mode {
        InputMode::Normal => handle_normal(app, key),
        InputMode::Input => handle_input(app, key, tx),
        InputMode::EditMessage => handle_edit(app, key),
        InputMode::Params => handle_params(app, key),
    }
}

fn handle_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Char('i') | KeyCode::Enter => app.input_mode = InputMode::Input,
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_down(app.half_page());
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_up(app.half_page());
        }
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('e') => app.start_edit_selected(),
        KeyCode::Char('d') => app.delete_selected(),
        KeyCode::Char('t') => app.toggle_reasoning_selected(),
        KeyCode::Char('p') => app.toggle_params(),
        KeyCode::Char('g') => {
            app.follow_bottom = false;
            app.scroll = 0;
        }
        KeyCode::Char('G') => app.scroll_to_bottom(),
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        KeyCode::Esc => {
            if app.pending {
                app.cancel_request();
            } else {
                app.selected = None;
            }
        }
        _ => {}
    }
}

fn handle_input(app: &mut App, key: KeyEvent, tx: &UnboundedSender<AppEvent>) {
    match key.code {
        KeyCode::Esc => app.input_mode = InputMode::Normal,
        KeyCode::Char('p') if key.modifiers.contains(KeyModifiers::CONTROL) => app.toggle_params(),
        KeyCode::Enter => {
            app.submit(tx.clone());
        }
        KeyCode::PageDown => app.scroll_down(app.chat_height.max(1)),
        KeyCode::PageUp => app.scroll_up(app.chat_height.max(1)),
        _ => edit_text(&mut app.input, &mut app.input_cursor, key),
    }
}

fn handle_edit(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_edit(),
        KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
            if let Some(buffer) = app.conversation.edit_buffer_mut() {
                let pos = char_to_byte_index(buffer, app.edit_cursor);
                buffer.insert(pos, '\n');
                app.edit_cursor += 1;
            }
        }
        KeyCode::Enter => app.save_edit(),
        _ => {
            if let Some(buffer) = app.conversation.edit_buffer_mut() {
                edit_text(buffer, &mut app.edit_cursor, key);
            }
        }
    }
}

fn handle_params(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('p') | KeyCode::Char('q') => {
            app.toggle_params();
        }
        KeyCode::Char('j') | KeyCode::Down => app.params_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.params_nav_up(),
        KeyCode::Char('l') | KeyCode::Right => app.adjust_param(1),
        KeyCode::Char('h') | KeyCode::Left => app.adjust_param(-1),
        KeyCode::Char('L') => app.adjust_param(10),
        KeyCode::Char('H') => app.adjust_param(-10),
        _ => {}
    }
}

/// Single-line editing keys shared by the input box and the message editor
fn edit_text(text: &mut String, cursor: &mut usize, key: KeyEvent) {
    let len = text.chars().count();
    *cursor = (*cursor).min(len);

    match key.code {
        // Ctrl chords are commands, never text
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            let pos = char_to_byte_index(text, *cursor);
            text.insert(pos, c);
            *cursor += 1;
        }
        KeyCode::Backspace if *cursor > 0 => {
            *cursor -= 1;
            let pos = char_to_byte_index(text, *cursor);
            text.remove(pos);
        }
        KeyCode::Delete if *cursor < len => {
            let pos = char_to_byte_index(text, *cursor);
            text.remove(pos);
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(len),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = len,
        _ => {}
    }
}
