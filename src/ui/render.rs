use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph};

use crate::app::{Model, RenderPhase};
use crate::render::RENDER_ATTEMPTS;

use super::{SOURCE_LEFT_PADDING, images, overlays, status};

/// Render the complete UI.
///
/// Exactly one copy of the rendered diagram exists per frame: while the
/// fullscreen overlay is open it owns the diagram and the inline view
/// renders nothing at all.
pub fn render(model: &mut Model, frame: &mut Frame) {
    let area = frame.area();

    if model.fullscreen {
        overlays::render_fullscreen_overlay(model, frame, area);
        return;
    }

    render_diagram_view(model, frame, area);

    if model.help_visible {
        overlays::render_help_overlay(model, frame, area);
    }
}

fn render_diagram_view(model: &mut Model, frame: &mut Frame, area: Rect) {
    let toast_active = model.active_toast().is_some();
    let footer_rows = 1 + u16::from(toast_active);
    // Reserve last line for status bar (+ one toast line when active).
    let content_outer_area = Rect {
        height: area.height.saturating_sub(footer_rows),
        ..area
    };
    let toast_area = Rect {
        y: area.y + area.height.saturating_sub(1 + u16::from(toast_active)),
        height: 1,
        ..area
    };
    let status_area = Rect {
        y: area.y + area.height.saturating_sub(1),
        height: 1,
        ..area
    };

    let content_block = Block::default()
        .borders(Borders::NONE)
        .padding(Padding::left(SOURCE_LEFT_PADDING));
    let content_area = content_block.inner(content_outer_area);
    // Clear first so image cells from previous frames do not leak.
    frame.render_widget(Clear, content_outer_area);
    frame.render_widget(content_block, content_outer_area);

    match &model.phase {
        RenderPhase::Idle => {
            let msg = Paragraph::new(Line::styled(
                "No diagram loaded",
                Style::default().fg(Color::DarkGray),
            ));
            frame.render_widget(msg, content_area);
        }
        RenderPhase::Rendering { attempt } => {
            render_in_progress(model, frame, content_area, *attempt);
        }
        RenderPhase::Failed { message } => {
            render_failure(model, frame, content_area, message);
        }
        RenderPhase::Succeeded { .. } => {
            render_success(model, frame, content_area);
        }
    }

    if toast_active {
        status::render_toast_bar(model, frame, toast_area);
    }
    status::render_status_bar(model, frame, status_area);
}

fn render_in_progress(model: &Model, frame: &mut Frame, area: Rect, attempt: usize) {
    let mut lines = vec![
        Line::styled(
            format!(
                "Rendering diagram (attempt {}/{})...",
                attempt + 1,
                RENDER_ATTEMPTS.len()
            ),
            Style::default().fg(Color::Yellow),
        ),
        Line::raw(""),
    ];
    lines.extend(source_lines(model, Style::default().fg(Color::DarkGray)));
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_failure(model: &Model, frame: &mut Frame, area: Rect, message: &str) {
    // Terminal failure: the original, never-sanitized source is displayed
    // so the user can copy and debug it.
    let mut lines = vec![
        Line::styled(
            "Failed to render diagram. Showing raw Mermaid source:",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Line::styled(message.to_string(), Style::default().fg(Color::Red)),
        Line::raw(""),
    ];
    lines.extend(source_lines(model, Style::default()));
    frame.render_widget(Paragraph::new(lines), area);
}

fn render_success(model: &mut Model, frame: &mut Frame, area: Rect) {
    let advisory = model.degradation().and_then(|level| level.advisory());

    let mut header: Vec<Line> = Vec::new();
    if let Some(advisory) = advisory {
        header.push(Line::styled(
            advisory,
            Style::default().fg(Color::Yellow),
        ));
        header.push(Line::styled(
            format!(
                "s: {} raw Mermaid source",
                if model.show_raw { "hide" } else { "show" }
            ),
            Style::default().fg(Color::DarkGray),
        ));
        header.push(Line::raw(""));
    }

    #[allow(clippy::cast_possible_truncation)]
    // Header is at most a handful of lines.
    let header_rows = (header.len() as u16).min(area.height);
    if header_rows > 0 {
        let header_area = Rect {
            height: header_rows,
            ..area
        };
        frame.render_widget(Paragraph::new(header), header_area);
    }

    let body_area = Rect {
        y: area.y + header_rows,
        height: area.height.saturating_sub(header_rows),
        ..area
    };
    if body_area.height == 0 {
        return;
    }

    if model.show_raw {
        let lines: Vec<Line> = source_lines(model, Style::default());
        frame.render_widget(Paragraph::new(lines), body_area);
        return;
    }

    if model.images_enabled && model.picker.is_some() {
        images::render_diagram(model, frame, body_area);
    } else {
        // No graphics protocol available; the raw source is all we can show.
        let mut lines = vec![
            Line::styled(
                "Diagram rendered (inline images unavailable in this terminal).",
                Style::default().fg(Color::DarkGray),
            ),
            Line::raw(""),
        ];
        lines.extend(source_lines(model, Style::default()));
        frame.render_widget(Paragraph::new(lines), body_area);
    }
}

fn source_lines(model: &Model, style: Style) -> Vec<Line<'static>> {
    model
        .visible_source_lines()
        .into_iter()
        .map(|line| Line::styled(line.to_string(), style))
        .collect()
}
