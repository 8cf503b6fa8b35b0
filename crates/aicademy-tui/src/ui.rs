use aicademy_core::{ChatRole, StagePhase, WorkflowStep};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};

use crate::app::{
    blocks, page_label, App, FocusPane, InputMode, PromptTarget, StageHandle, StepStatus,
};
use crate::form::FieldKind;

/// Parse a line of text and convert **bold** markdown to styled spans
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        match after.find("**") {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                spans.push(Span::styled(
                    after[..end].to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                rest = &after[end + 2..];
            }
            // No closing **, keep the rest literal
            _ => break,
        }
    }
    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    if spans.is_empty() {
        Line::default()
    } else {
        Line::from(spans)
    }
}

/// Markdown heading (`## Brief 1:`) rendered without its hashes
fn heading_line(text: &str) -> Option<Line<'static>> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    let title = trimmed[level..].trim().to_string();
    let color = if level <= 2 { Color::Cyan } else { Color::LightBlue };
    Some(Line::from(Span::styled(
        title,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )))
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

    let sidebar_width = if app.sidebar_collapsed { 5 } else { 24 };
    let [sidebar_area, main_area] =
        Layout::horizontal([Constraint::Length(sidebar_width), Constraint::Min(0)])
            .areas(body_area);

    render_sidebar(app, frame, sidebar_area);

    if app.form.is_some() {
        app.canvas_area = None;
        app.chat_area = None;
        render_form(app, frame, main_area);
    } else {
        render_stage(app, frame, main_area);
    }

    render_footer(app, frame, footer_area);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let title = app
        .workflow_title()
        .map(|t| format!(" {} ", t))
        .unwrap_or_default();

    let mut spans = vec![
        Span::styled(" AIcademy ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!("[{}]", app.workflow_type().display_name()),
            Style::default().fg(Color::White),
        ),
        Span::styled(title, Style::default().fg(Color::White).bold()),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ];
    if let Some(status) = &app.status {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(status.clone(), Style::default().fg(Color::Yellow)));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let items: Vec<ListItem> = app
        .workflow_type()
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let (marker, style) = match app.step_status(*step) {
                StepStatus::Current => (">", Style::default().fg(Color::Cyan).bold()),
                StepStatus::Done => ("✓", Style::default().fg(Color::Green)),
                StepStatus::Blocked => ("✗", Style::default().fg(Color::DarkGray)),
                StepStatus::Pending => (" ", Style::default().fg(Color::White)),
            };
            let text = if app.sidebar_collapsed {
                format!("{}{}", marker, i + 1)
            } else {
                format!("{} {}. {}", marker, i + 1, step.label())
            };
            ListItem::new(text).style(style)
        })
        .collect();

    let title = if app.sidebar_collapsed { "" } else { " Steps " };
    let list = List::new(items).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(title),
    );
    frame.render_widget(list, area);
}

fn render_form(app: &App, frame: &mut Frame, area: Rect) {
    let Some(form) = app.form.as_ref() else {
        return;
    };

    let title = match app.step {
        WorkflowStep::ConnectConfiguration => " Connect Setup ",
        _ => " Configuration ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title);
    let inner = block.inner(area);

    let mut lines: Vec<Line> = Vec::new();
    let mut cursor = None;
    for (i, field) in form.fields.iter().enumerate() {
        let focused = i == form.focused;
        let label_style = if focused {
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        };
        let required = if field.required { " *" } else { "" };
        let prefix = if focused { "> " } else { "  " };
        lines.push(Line::from(vec![
            Span::styled(format!("{}{}", prefix, field.label), label_style),
            Span::styled(required, Style::default().fg(Color::Red)),
        ]));

        if focused {
            if let FieldKind::Text { cursor: c, .. } = &field.kind {
                cursor = Some((4 + *c as u16, lines.len() as u16));
            }
        }
        let value_style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::Gray)
        };
        lines.push(Line::from(Span::styled(
            format!("    {}", field.display_value()),
            value_style,
        )));
        lines.push(Line::default());
    }

    if let Some(error) = &form.error {
        lines.push(Line::from(Span::styled(
            error.clone(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    } else if app.task.is_some() {
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("{}{}", app.task_label, dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    // Keep the focused field on screen
    let focus_line = (form.focused * 3) as u16;
    let scroll = focus_line.saturating_sub(inner.height.saturating_sub(3));

    let paragraph = Paragraph::new(Text::from(lines))
        .block(block)
        .scroll((scroll, 0));
    frame.render_widget(paragraph, area);

    if let Some((x, y)) = cursor {
        let y = y.saturating_sub(scroll);
        if x < inner.width && y < inner.height {
            frame.set_cursor_position((inner.x + x, inner.y + y));
        }
    }
}

fn render_stage(app: &mut App, frame: &mut Frame, area: Rect) {
    let Some(handle) = app.current_handle() else {
        return;
    };

    let [canvas_area, side_area] =
        Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);
    let [chat_area, input_area] =
        Layout::vertical([Constraint::Min(0), Constraint::Length(3)]).areas(side_area);

    // Store areas for mouse hit-testing
    app.canvas_area = Some(canvas_area);
    app.chat_area = Some(chat_area);

    app.canvas_height = canvas_area.height.saturating_sub(2);
    app.chat_height = chat_area.height.saturating_sub(2);
    app.chat_width = chat_area.width.saturating_sub(2);

    render_canvas(app, &handle, frame, canvas_area);
    render_chat(app, &handle, frame, chat_area);
    render_input(app, frame, input_area);
}

fn canvas_title(app: &App, handle: &StageHandle, artifact: &str) -> String {
    match handle {
        StageHandle::Briefs(briefs) => {
            let mut title = format!(" Brief {}/{} ", briefs.current(), briefs.total());
            if let Some(page) = page_label(artifact, app.canvas_scroll as usize) {
                title.push_str(&format!("· {} ", page));
            }
            title
        }
        StageHandle::Single(_) => format!(" {} ", app.step.label()),
    }
}

fn render_canvas(app: &App, handle: &StageHandle, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Canvas;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let artifact = handle.artifact();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(canvas_title(app, handle, &artifact));

    let text = match handle.phase() {
        StagePhase::Blocked { missing, redirect } => {
            let mut lines = vec![
                Line::from(Span::styled(
                    "This step can't run yet.",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::default(),
                Line::from("It still needs:"),
            ];
            for prerequisite in &missing {
                lines.push(Line::from(format!("  - {}", prerequisite.description())));
            }
            lines.push(Line::default());
            lines.push(Line::from(vec![
                Span::raw("Press "),
                Span::styled(" r ", Style::default().bg(Color::DarkGray).fg(Color::White)),
                Span::raw(format!(" to open {}.", redirect.label())),
            ]));
            Text::from(lines)
        }
        phase if artifact.trim().is_empty() => {
            let message = if phase.is_busy() || app.task.is_some() {
                let dots = ".".repeat((app.animation_frame as usize) + 1);
                format!("Generating{}", dots)
            } else {
                "Nothing here yet.".to_string()
            };
            Text::from(Span::styled(
                message,
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            ))
        }
        _ => {
            let selected = blocks(&artifact).into_iter().nth(app.selected_block);
            let selected_range = selected
                .map(|b| b.line..b.line + b.text.lines().count())
                .unwrap_or(0..0);

            let lines: Vec<Line> = artifact
                .lines()
                .enumerate()
                .map(|(idx, line)| {
                    let rendered = heading_line(line).unwrap_or_else(|| parse_markdown_line(line));
                    if focused && selected_range.contains(&idx) {
                        rendered.style(Style::default().bg(Color::DarkGray))
                    } else {
                        rendered
                    }
                })
                .collect();
            Text::from(lines)
        }
    };

    let canvas = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.canvas_scroll, 0));
    frame.render_widget(canvas, area);
}

fn render_chat(app: &App, handle: &StageHandle, frame: &mut Frame, area: Rect) {
    let focused = app.focus == FocusPane::Chat;
    let border_color = if focused { Color::Cyan } else { Color::DarkGray };
    let chat_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(" Assistant ");

    let conversation = handle.conversation();
    let loading = app.task.is_some();

    let chat_text = if conversation.is_empty() && !loading {
        Text::from(Span::styled(
            "Ask for changes, or press 1-3 for level and 4-7 for length.",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in &conversation {
            match msg.role {
                ChatRole::User => {
                    lines.push(Line::from(Span::styled(
                        "You:",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    )));
                    lines.push(Line::from(msg.content.clone()));
                    lines.push(Line::default());
                }
                ChatRole::Assistant | ChatRole::System | ChatRole::Developer => {
                    lines.push(Line::from(Span::styled(
                        "AI:",
                        Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                    )));
                    for line in msg.content.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                    lines.push(Line::default());
                }
            }
        }

        if loading {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            match handle.progress() {
                Some(partial) if !partial.trim().is_empty() => {
                    for line in partial.lines() {
                        lines.push(Line::from(Span::styled(
                            line.to_string(),
                            Style::default().fg(Color::DarkGray),
                        )));
                    }
                }
                _ => {
                    // Animated ellipsis: cycles through ".", "..", "..."
                    let dots = ".".repeat((app.animation_frame as usize) + 1);
                    lines.push(Line::from(Span::styled(
                        format!("{}{}", app.task_label, dots),
                        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                    )));
                }
            }
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(chat_text)
        .block(chat_block)
        .wrap(Wrap { trim: true })
        .scroll((app.chat_scroll, 0));
    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let editing = app.input_mode == InputMode::Editing;
    let border_color = if editing { Color::Yellow } else { Color::DarkGray };
    let title = match app.prompt {
        PromptTarget::Chat => " Ask (a) ",
        PromptTarget::Selection => " Rewrite selected paragraph ",
        PromptTarget::ImportPath => " Import file path ",
    };

    let input_block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    // Horizontal scrolling keeps the cursor visible
    let inner_width = area.width.saturating_sub(2) as usize;
    let cursor_pos = app.input_cursor;
    let scroll_offset = if inner_width == 0 {
        0
    } else if cursor_pos >= inner_width {
        cursor_pos - inner_width + 1
    } else {
        0
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(input_block);
    frame.render_widget(input, area);

    if editing {
        let cursor_x = (cursor_pos - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let mode_style = match app.input_mode {
        InputMode::Normal => Style::default().bg(Color::Blue).fg(Color::White),
        InputMode::Editing => Style::default().bg(Color::Yellow).fg(Color::Black),
    };
    let mode_text = match (app.input_mode, app.focus) {
        (InputMode::Editing, _) => " INPUT ",
        (_, FocusPane::Form) => " FORM ",
        (_, FocusPane::Canvas) => " CANVAS ",
        (_, FocusPane::Chat) => " CHAT ",
    };

    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);
    let hint = |key: &'static str, label: &'static str| {
        [
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!(" {} ", label), label_style),
        ]
    };

    let hints: Vec<Span> = match (app.input_mode, app.focus) {
        (InputMode::Editing, _) => [hint("Enter", "send"), hint("Esc", "cancel")].concat(),
        (_, FocusPane::Form) => [
            hint("Tab", "field"),
            hint("←/→", "change"),
            hint("Space", "toggle"),
            hint("Enter", "continue"),
            hint("^N/^P", "step"),
            hint("^X", "reset"),
        ]
        .concat(),
        _ => {
            let mut hints = vec![
                hint("n/p", "step"),
                hint("j/k", "paragraph"),
                hint("a", "ask"),
                hint("s", "rewrite"),
                hint("1-3", "level"),
                hint("4-7", "length"),
                hint("v", "edit"),
                hint("e/E", "export"),
                hint("o", "import"),
            ];
            if app.step == WorkflowStep::Briefs {
                hints.push(hint("[/]", "page"));
            }
            if matches!(
                app.current_handle().map(|h| h.phase()),
                Some(StagePhase::Blocked { .. })
            ) {
                hints.push(hint("r", "fix"));
            }
            hints.push(hint("b", "sidebar"));
            hints.push(hint("q", "quit"));
            hints.concat()
        }
    };

    let footer_content = Line::from(
        vec![
            Span::styled(mode_text, mode_style),
            Span::styled(" ", label_style),
        ]
        .into_iter()
        .chain(hints)
        .collect::<Vec<_>>(),
    );

    let footer = Paragraph::new(footer_content).style(Style::default().bg(Color::Black));
    frame.render_widget(footer, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_parse_markdown_bold() {
        let line = parse_markdown_line("Key **term** here");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "term");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_parse_markdown_unclosed_is_literal() {
        let line = parse_markdown_line("a **b");
        assert_eq!(plain(&line), "a **b");
    }

    #[test]
    fn test_heading_line_strips_hashes() {
        let line = heading_line("### Page 2: Detail").unwrap();
        assert_eq!(plain(&line), "Page 2: Detail");
        assert!(heading_line("Plain text").is_none());
    }
}
