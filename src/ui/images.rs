use ratatui::prelude::*;
use ratatui_image::protocol::StatefulProtocolType;
use ratatui_image::{Resize, StatefulImage};

use crate::app::Model;

/// Render the prepared diagram image into `area`, centered horizontally.
///
/// There is a single protocol object for the diagram and it is rendered in
/// exactly one place per frame; the caller decides whether that place is
/// the inline pane or the fullscreen overlay.
pub fn render_diagram(model: &mut Model, frame: &mut Frame, area: Rect) {
    let Some(diagram) = model.diagram_image() else {
        return;
    };

    let width = diagram.width_cols.min(area.width);
    let height = diagram.height_rows.min(area.height);
    if width == 0 || height == 0 {
        return;
    }

    let x = area.x + area.width.saturating_sub(width) / 2;
    let target = Rect::new(x, area.y, width, height);

    let resize = if matches!(
        diagram.protocol.protocol_type(),
        StatefulProtocolType::Halfblocks(_)
    ) {
        // Nearest-neighbor causes strong color aliasing artifacts in
        // half-cell mode.
        Resize::Scale(Some(image::imageops::FilterType::CatmullRom))
    } else {
        Resize::Scale(None)
    };

    let image_widget = StatefulImage::default().resize(resize);
    image_widget.render(target, frame.buffer_mut(), &mut diagram.protocol);

    crate::perf::log_event(
        "render.diagram",
        format!(
            "target={}x{} at=({},{})",
            target.width, target.height, target.x, target.y
        ),
    );
}
