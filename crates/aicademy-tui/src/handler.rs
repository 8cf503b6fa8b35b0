use aicademy_core::{ArtifactLength, ArtifactLevel, RefineAction};
use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, FocusPane, InputMode, PromptTarget};
use crate::form::char_to_byte_index;
use crate::tui::AppEvent;

pub async fn handle_event(app: &mut App, event: AppEvent) -> Result<()> {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize(_, _) => {}
        AppEvent::Tick => {
            app.tick_animation();
            app.poll_task().await;
        }
    }
    Ok(())
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Global keys that work in any mode
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    match (app.input_mode, app.focus) {
        (InputMode::Editing, _) => handle_editing_mode(app, key),
        (InputMode::Normal, FocusPane::Form) => handle_form(app, key),
        (InputMode::Normal, _) => handle_stage_normal(app, key),
    }
}

fn handle_form(app: &mut App, key: KeyEvent) {
    // Step navigation from a form needs a modifier, plain letters are typed
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('n') => app.next_step(),
            KeyCode::Char('p') => app.previous_step(),
            KeyCode::Char('b') => app.toggle_sidebar(),
            KeyCode::Char('x') => app.reset(),
            _ => {}
        }
        return;
    }

    let Some(form) = app.form.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Enter => app.submit_form(),
        KeyCode::Esc => app.previous_step(),
        KeyCode::Tab | KeyCode::Down => form.next_field(),
        KeyCode::BackTab | KeyCode::Up => form.prev_field(),
        KeyCode::Left => form.shift(false),
        KeyCode::Right => form.shift(true),
        KeyCode::Backspace => form.backspace(),
        KeyCode::Char(' ') if !form.focused_field().is_some_and(|f| f.is_text()) => form.toggle(),
        KeyCode::Char(c) => {
            form.error = None;
            form.insert_char(c);
        }
        _ => {}
    }
}

fn handle_stage_normal(app: &mut App, key: KeyEvent) {
    match key.code {
        // Quit
        KeyCode::Char('q') => app.should_quit = true,

        // Step navigation
        KeyCode::Char('n') => app.next_step(),
        KeyCode::Char('p') => app.previous_step(),
        KeyCode::Char('r') => app.follow_redirect(),
        KeyCode::Char('X') => app.reset(),
        KeyCode::Char('b') => app.toggle_sidebar(),

        // Canvas
        KeyCode::Char('j') | KeyCode::Down => {
            if app.focus == FocusPane::Chat {
                app.chat_scroll = app.chat_scroll.saturating_add(1);
            } else {
                app.select_next_block();
            }
        }
        KeyCode::Char('k') | KeyCode::Up => {
            if app.focus == FocusPane::Chat {
                app.chat_scroll = app.chat_scroll.saturating_sub(1);
            } else {
                app.select_prev_block();
            }
        }
        KeyCode::Char('g') => {
            app.canvas_scroll = 0;
            app.selected_block = 0;
        }
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_canvas(true, (app.canvas_height / 2).max(1));
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.scroll_canvas(false, (app.canvas_height / 2).max(1));
        }
        KeyCode::Char(']') => app.jump_page(true),
        KeyCode::Char('[') => app.jump_page(false),
        KeyCode::Tab => {
            app.focus = match app.focus {
                FocusPane::Canvas => FocusPane::Chat,
                FocusPane::Chat | FocusPane::Form => FocusPane::Canvas,
            };
        }

        // Level and length
        KeyCode::Char('1') => {
            app.dispatch_refine(RefineAction::AdjustLevel(ArtifactLevel::Beginner))
        }
        KeyCode::Char('2') => {
            app.dispatch_refine(RefineAction::AdjustLevel(ArtifactLevel::Intermediate))
        }
        KeyCode::Char('3') => {
            app.dispatch_refine(RefineAction::AdjustLevel(ArtifactLevel::Advanced))
        }
        KeyCode::Char('4') => {
            app.dispatch_refine(RefineAction::AdjustLength(ArtifactLength::Shortest))
        }
        KeyCode::Char('5') => {
            app.dispatch_refine(RefineAction::AdjustLength(ArtifactLength::Shorter))
        }
        KeyCode::Char('6') => {
            app.dispatch_refine(RefineAction::AdjustLength(ArtifactLength::Longer))
        }
        KeyCode::Char('7') => {
            app.dispatch_refine(RefineAction::AdjustLength(ArtifactLength::Longest))
        }

        // Prompts
        KeyCode::Char('a') | KeyCode::Char('i') | KeyCode::Enter => {
            app.start_prompt(PromptTarget::Chat)
        }
        KeyCode::Char('s') => app.start_prompt(PromptTarget::Selection),
        KeyCode::Char('o') => app.start_prompt(PromptTarget::ImportPath),

        // Artifact actions
        KeyCode::Char('v') => app.request_edit(),
        KeyCode::Char('e') => app.export_artifact(),
        KeyCode::Char('E') => app.export_package(),

        _ => {}
    }
}

fn handle_editing_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.input_mode = InputMode::Normal;
            app.prompt = PromptTarget::Chat;
        }
        KeyCode::Enter => app.submit_prompt(),
        KeyCode::Backspace => {
            if app.input_cursor > 0 {
                app.input_cursor -= 1;
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if app.input_cursor < app.input.chars().count() {
                let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
                app.input.remove(byte_pos);
            }
        }
        KeyCode::Left => app.input_cursor = app.input_cursor.saturating_sub(1),
        KeyCode::Right => {
            app.input_cursor = (app.input_cursor + 1).min(app.input.chars().count());
        }
        KeyCode::Home => app.input_cursor = 0,
        KeyCode::End => app.input_cursor = app.input.chars().count(),
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(&app.input, app.input_cursor);
            app.input.insert(byte_pos, c);
            app.input_cursor += 1;
        }
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let x = mouse.column;
    let y = mouse.row;

    let in_chat = app.chat_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);
    let in_canvas = app.canvas_area.map(|r| point_in_rect(x, y, r)).unwrap_or(false);

    match mouse.kind {
        MouseEventKind::ScrollDown => {
            if in_chat {
                app.chat_scroll = app.chat_scroll.saturating_add(3);
            } else if in_canvas {
                app.scroll_canvas(true, 3);
            }
        }
        MouseEventKind::ScrollUp => {
            if in_chat {
                app.chat_scroll = app.chat_scroll.saturating_sub(3);
            } else if in_canvas {
                app.scroll_canvas(false, 3);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_in_rect_edges() {
        let rect = Rect::new(2, 3, 4, 2);
        assert!(point_in_rect(2, 3, rect));
        assert!(point_in_rect(5, 4, rect));
        assert!(!point_in_rect(6, 4, rect));
        assert!(!point_in_rect(2, 5, rect));
    }
}
