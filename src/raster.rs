//! SVG rasterization for terminal display.
//!
//! Takes the engine's SVG markup and produces a raster image sized for the
//! terminal, using `resvg`. The vector is rasterized directly at the final
//! display resolution so nothing is upscaled lossily.

use std::sync::Arc;

use anyhow::Result;
use image::DynamicImage;
use resvg::usvg::fontdb;

/// Rasterize SVG markup to an image `target_width_px` wide.
///
/// Font quoting is normalized first so the markup parses with standard SVG
/// tools; aspect ratio is preserved.
///
/// # Errors
///
/// Returns an error if the SVG cannot be parsed or the pixel buffer cannot
/// be allocated.
pub fn rasterize(svg: &str, target_width_px: u32) -> Result<DynamicImage> {
    let svg = normalize_font_quoting(svg);
    rasterize_svg(&svg, target_width_px)
}

/// Fix unescaped double quotes inside font-family attributes.
///
/// Rendering engines emit font-family values like:
///   `font-family="Inter, ... "Segoe UI", sans-serif"`
/// The inner `"Segoe UI"` breaks XML parsing. We replace inner double
/// quotes with single quotes so resvg can parse the SVG.
pub fn normalize_font_quoting(svg: &str) -> String {
    const MARKER: &str = "font-family=\"";
    let mut result = String::with_capacity(svg.len());
    let mut rest = svg;

    while let Some(pos) = rest.find(MARKER) {
        // Copy everything up to and including the opening quote.
        result.push_str(&rest[..pos + MARKER.len()]);
        rest = &rest[pos + MARKER.len()..];

        // Scan for the closing quote: a `"` followed by `>`, ` `, `/`, or end.
        let mut value = String::new();
        let mut end_offset = rest.len();
        for (i, ch) in rest.char_indices() {
            if ch == '"' {
                // Check what follows this quote.
                let after = rest.get(i + 1..i + 2).unwrap_or("");
                if after.is_empty()
                    || after.starts_with('>')
                    || after.starts_with(' ')
                    || after.starts_with('/')
                {
                    // Real closing quote.
                    result.push_str(&value.replace('"', "'"));
                    result.push('"');
                    end_offset = i + 1;
                    break;
                }
                // Inner quote — part of value.
                value.push('"');
            } else {
                value.push(ch);
            }
        }
        rest = &rest[end_offset..];
    }
    result.push_str(rest);
    result
}

/// Rasterize an SVG string to a `DynamicImage`.
///
/// Scales the SVG so its width matches `target_width_px`, preserving
/// aspect ratio.
fn rasterize_svg(svg: &str, target_width_px: u32) -> Result<DynamicImage> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let opts = resvg::usvg::Options {
        fontdb: Arc::new(db),
        ..Default::default()
    };

    let tree = resvg::usvg::Tree::from_str(svg, &opts)?;
    let size = tree.size();

    let scale = target_width_px as f32 / size.width();

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let width = (size.width() * scale).ceil() as u32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let height = (size.height() * scale).ceil() as u32;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| anyhow::anyhow!("failed to create pixmap {width}x{height}"))?;

    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(scale, scale),
        &mut pixmap.as_mut(),
    );

    let rgba = pixmap.data().to_vec();
    let img_buf = image::RgbaImage::from_raw(width, height, rgba)
        .ok_or_else(|| anyhow::anyhow!("failed to create image from pixmap data"))?;

    Ok(DynamicImage::ImageRgba8(img_buf))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_font_quoting_replaces_inner_quotes() {
        let input = r#"<text font-family="Inter, "Segoe UI", sans-serif" font-size="14">"#;
        let fixed = normalize_font_quoting(input);
        assert_eq!(
            fixed,
            r#"<text font-family="Inter, 'Segoe UI', sans-serif" font-size="14">"#
        );
    }

    #[test]
    fn test_normalize_font_quoting_no_op_when_clean() {
        let input = r#"<text font-family="Inter, sans-serif" font-size="14">"#;
        let fixed = normalize_font_quoting(input);
        assert_eq!(fixed, input);
    }

    #[test]
    fn test_rasterize_scales_to_target_width() {
        let svg = r#"<svg xmlns="http://www.w3.org/2000/svg" width="100" height="50"><rect width="100" height="50" fill="red"/></svg>"#;
        let img = rasterize(svg, 300).expect("rasterize");
        assert_eq!(img.width(), 300);
        assert_eq!(img.height(), 150);
    }

    #[test]
    fn test_rasterize_rejects_invalid_markup() {
        assert!(rasterize("not svg at all", 100).is_err());
    }
}
