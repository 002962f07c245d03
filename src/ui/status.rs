use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::{Model, RenderPhase};
use crate::render::RENDER_ATTEMPTS;

pub fn render_status_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let filename = model
        .file_path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string());

    let phase_info = match &model.phase {
        RenderPhase::Idle => "idle".to_string(),
        RenderPhase::Rendering { attempt } => {
            format!("rendering {}/{}", attempt + 1, RENDER_ATTEMPTS.len())
        }
        RenderPhase::Succeeded { degradation, .. } => degradation.advisory().map_or_else(
            || "rendered".to_string(),
            |_| format!("rendered [{}]", degradation.tag()),
        ),
        RenderPhase::Failed { .. } => "render failed".to_string(),
    };

    let percent = model.viewport.scroll_percent();
    let line_info = format!(
        "Line {}/{}",
        model.viewport.offset() + 1,
        model.viewport.total_lines()
    );

    let watch_indicator = if model.watch_enabled {
        " [watching]"
    } else {
        ""
    };

    let status =
        format!(" {filename}  [{phase_info}]  [{percent}%]  {line_info}{watch_indicator}  ?:help");

    let status_bar =
        Paragraph::new(status).style(Style::default().bg(Color::DarkGray).fg(Color::White));

    frame.render_widget(status_bar, area);
}

pub fn render_toast_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let Some((message, level)) = model.active_toast() else {
        return;
    };
    let (prefix, style) = match level {
        crate::app::ToastLevel::Info => (
            "[info]",
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ),
        crate::app::ToastLevel::Warning => (
            "[warn]",
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ),
        crate::app::ToastLevel::Error => {
            ("[error]", Style::default().bg(Color::Red).fg(Color::White))
        }
    };
    let toast = Paragraph::new(format!("{prefix} {message}")).style(style);
    frame.render_widget(toast, area);
}
