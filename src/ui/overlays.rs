use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph};

use crate::app::Model;

use super::images;

/// Fullscreen overlay owning the rendered diagram.
///
/// Covers the whole viewport and intercepts all input below it; while it is
/// open the inline view renders nothing, so the single live copy of the
/// diagram moves here.
pub fn render_fullscreen_overlay(model: &mut Model, frame: &mut Frame, area: Rect) {
    frame.render_widget(Clear, area);

    let title_area = Rect { height: 1, ..area };
    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            " Diagram ",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            "Esc or f closes",
            Style::default().fg(Color::Gray),
        ),
    ]))
    .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(title, title_area);

    let body_area = Rect {
        x: area.x + 2,
        y: area.y + 2,
        width: area.width.saturating_sub(4),
        height: area.height.saturating_sub(3),
    };
    if body_area.width == 0 || body_area.height == 0 {
        return;
    }

    if model.images_enabled && model.picker.is_some() {
        images::render_diagram(model, frame, body_area);
    } else {
        let msg = Paragraph::new(Line::styled(
            "Inline images unavailable in this terminal.",
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(msg, body_area);
    }
}

pub fn render_help_overlay(model: &Model, frame: &mut Frame, area: Rect) {
    let popup_width = area.width.saturating_sub(12).max(48);
    let popup_height = area.height.saturating_sub(6).max(12);
    let popup = centered_popup_rect(popup_width, popup_height, area);

    let global_cfg = model
        .config_global_path
        .as_ref()
        .map_or_else(|| "<unknown>".to_string(), |p| p.display().to_string());
    let local_cfg = model
        .config_local_path
        .as_ref()
        .map_or_else(|| "<none>".to_string(), |p| p.display().to_string());

    let section_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let mut all_lines: Vec<Line> = Vec::new();

    // Diagram
    all_lines.push(Line::styled("Diagram", section_style));
    all_lines.push(Line::raw("  f / Enter           Fullscreen diagram"));
    all_lines.push(Line::raw("  Esc                 Close fullscreen"));
    all_lines.push(Line::raw("  s                   Toggle raw Mermaid source"));
    all_lines.push(Line::raw("  y                   Copy raw source"));
    all_lines.push(Line::raw(""));

    // Navigation
    all_lines.push(Line::styled("Source navigation", section_style));
    all_lines.push(Line::raw("  j/k or Up/Down      Scroll"));
    all_lines.push(Line::raw("  Space/PageDown      Page down"));
    all_lines.push(Line::raw("  b/PageUp            Page up"));
    all_lines.push(Line::raw("  Ctrl-d / Ctrl-u     Half page"));
    all_lines.push(Line::raw("  g / G               Top / bottom"));
    all_lines.push(Line::raw(""));

    // File
    all_lines.push(Line::styled("File", section_style));
    all_lines.push(Line::raw("  w                   Toggle watch"));
    all_lines.push(Line::raw("  r / R               Reload + re-render"));
    all_lines.push(Line::raw(""));

    // Other
    all_lines.push(Line::styled("Other", section_style));
    all_lines.push(Line::raw("  q / Ctrl-c          Quit"));
    all_lines.push(Line::raw("  ? / F1              Toggle help"));
    all_lines.push(Line::raw(""));

    // Config
    all_lines.push(Line::styled("Config", section_style));
    all_lines.push(Line::raw(format!("  Global: {global_cfg}")));
    all_lines.push(Line::raw(format!("  Local override: {local_cfg}")));

    let block = Block::default()
        .title("Help")
        .borders(Borders::ALL)
        .padding(Padding::uniform(1))
        .style(Style::default().bg(Color::Black).fg(Color::White));

    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(all_lines).block(block), popup);
}

fn centered_popup_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(w) / 2);
    let y = area.y + (area.height.saturating_sub(h) / 2);
    Rect::new(x, y, w, h)
}
