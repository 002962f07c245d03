use std::path::PathBuf;
use std::time::{Duration, Instant};

use ratatui_image::picker::{Picker, ProtocolType};
use ratatui_image::protocol::StatefulProtocol;

use crate::render::DegradationLevel;
use crate::ui::viewport::Viewport;

/// Diagram display width as a percentage of the inline pane width.
///
/// Rendered diagrams contain their own internal layout and read best at a
/// narrower width than the full pane. 60 was chosen empirically as a good
/// balance between readability and not overwhelming the terminal.
const DIAGRAM_WIDTH_PERCENT: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Toast {
    level: ToastLevel,
    message: String,
    expires_at: Instant,
}

/// Render pipeline state for the current source text.
///
/// A new source text resets to `Rendering` and clears any previous error;
/// `Succeeded` and `Failed` are stable until the next source change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Rendering {
        /// Zero-based index of the fallback attempt currently running.
        attempt: usize,
    },
    Succeeded {
        svg: String,
        degradation: DegradationLevel,
    },
    Failed {
        message: String,
    },
}

/// Which on-screen location currently owns the rendered diagram.
///
/// Exactly one location owns it at any instant: the produced markup embeds
/// its render-target identifier, so two live copies would collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramSlot {
    Inline,
    Fullscreen,
}

/// The rendered diagram prepared for the terminal, sized in cells.
pub struct DiagramImage {
    pub protocol: StatefulProtocol,
    pub width_cols: u16,
    pub height_rows: u16,
}

/// The complete application state.
///
/// All state lives here - no global or scattered state.
pub struct Model {
    /// Raw, never-sanitized diagram source as read from disk
    pub source: String,
    /// Path to the source file
    pub file_path: PathBuf,
    /// Render pipeline state for the current source
    pub phase: RenderPhase,
    /// Generation of the render request this model is waiting on;
    /// completions with any other generation are stale and ignored
    pub render_generation: u64,
    /// Whether the fullscreen overlay owns the diagram
    pub fullscreen: bool,
    /// Whether the raw source pane replaces the diagram (degraded renders)
    pub show_raw: bool,
    /// Whether help overlay is visible
    pub help_visible: bool,
    /// Whether file watching is enabled
    pub watch_enabled: bool,
    /// Whether inline diagram images are enabled
    pub images_enabled: bool,
    /// Viewport managing raw-source scroll position
    pub viewport: Viewport,
    /// Image picker for terminal rendering
    pub picker: Option<Picker>,
    /// Global config path shown in help
    pub config_global_path: Option<PathBuf>,
    /// Local override path shown in help
    pub config_local_path: Option<PathBuf>,
    /// Whether the app should quit
    pub should_quit: bool,
    diagram: Option<DiagramImage>,
    /// Pane width used when the diagram was last rasterized
    last_scale_width: u16,
    /// Set once rasterization of the current SVG has failed, so the view
    /// falls back to raw source instead of retrying every frame
    raster_failed: bool,
    toast: Option<Toast>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("file_path", &self.file_path)
            .field("phase", &self.phase)
            .field("fullscreen", &self.fullscreen)
            .field("watch_enabled", &self.watch_enabled)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Create a new model for the given source text.
    pub fn new(file_path: PathBuf, source: String, terminal_size: (u16, u16)) -> Self {
        let total_lines = source.lines().count();
        Self {
            source,
            file_path,
            phase: RenderPhase::Idle,
            render_generation: 0,
            fullscreen: false,
            show_raw: false,
            help_visible: false,
            watch_enabled: false,
            images_enabled: true,
            viewport: Viewport::new(
                terminal_size.0,
                terminal_size.1.saturating_sub(1),
                total_lines,
            ),
            picker: None,
            config_global_path: None,
            config_local_path: None,
            should_quit: false,
            diagram: None,
            last_scale_width: 0,
            raster_failed: false,
            toast: None,
        }
    }

    /// Set the image picker.
    #[must_use]
    pub fn with_picker(mut self, picker: Option<Picker>) -> Self {
        self.picker = picker;
        self
    }

    /// Install freshly loaded source text and reset the render pipeline.
    ///
    /// Clears any previous error, drops the displayed diagram, and leaves
    /// the model waiting for attempt 0 of a new fallback ladder.
    pub fn set_source(&mut self, source: String) {
        self.source = source;
        self.phase = RenderPhase::Rendering { attempt: 0 };
        self.show_raw = false;
        self.fullscreen = false;
        self.invalidate_diagram();
        self.viewport.set_total_lines(self.source.lines().count());
        self.viewport.go_to_top();
    }

    /// Which location owns the rendered diagram this frame.
    pub const fn diagram_slot(&self) -> DiagramSlot {
        if self.fullscreen {
            DiagramSlot::Fullscreen
        } else {
            DiagramSlot::Inline
        }
    }

    pub const fn degradation(&self) -> Option<DegradationLevel> {
        match &self.phase {
            RenderPhase::Succeeded { degradation, .. } => Some(*degradation),
            _ => None,
        }
    }

    /// Lines of the raw source for the visible range of the viewport.
    pub fn visible_source_lines(&self) -> Vec<&str> {
        let range = self.viewport.visible_range();
        self.source
            .lines()
            .skip(range.start)
            .take(range.end - range.start)
            .collect()
    }

    /// Drop the prepared diagram image so it is rebuilt on the next frame.
    pub fn invalidate_diagram(&mut self) {
        self.diagram = None;
        self.last_scale_width = 0;
        self.raster_failed = false;
    }

    pub fn diagram_image(&mut self) -> Option<&mut DiagramImage> {
        self.diagram.as_mut()
    }

    /// Target diagram width in columns for the current slot.
    fn diagram_width_cols(&self) -> u16 {
        let pane_width = self.viewport.width();
        if self.fullscreen {
            pane_width.saturating_sub(4).max(1)
        } else {
            #[allow(clippy::cast_possible_truncation)]
            // Always positive and within u16 range (a fraction of a u16).
            let cols = (u32::from(pane_width) * DIAGRAM_WIDTH_PERCENT / 100) as u16;
            cols.max(1)
        }
    }

    /// Rasterize the current SVG for the terminal if it is missing or was
    /// built for a different pane width.
    pub fn ensure_diagram_protocol(&mut self) {
        if !self.images_enabled || self.raster_failed {
            return;
        }
        let target_width_cols = self.diagram_width_cols();
        if self.diagram.is_some() && self.last_scale_width == target_width_cols {
            return;
        }
        let RenderPhase::Succeeded { svg, .. } = &self.phase else {
            return;
        };
        let Some(picker) = &self.picker else {
            return;
        };

        let font_size = picker.font_size();
        let target_width_px = u32::from(target_width_cols) * u32::from(font_size.0);
        let use_halfblocks = matches!(picker.protocol_type(), ProtocolType::Halfblocks);
        let quantize = use_halfblocks && !crate::image::supports_truecolor_terminal();

        match crate::raster::rasterize(svg, target_width_px) {
            Ok(img) => {
                let img = if quantize {
                    crate::image::quantize_to_ansi256(&img)
                } else {
                    img
                };
                let protocol = picker.new_resize_protocol(img);
                let (width_cols, height_rows) = protocol_render_size(&protocol, target_width_cols);
                crate::perf::log_event(
                    "diagram.protocol",
                    format!(
                        "width_cols={width_cols} height_rows={height_rows} halfblocks={use_halfblocks} ansi256={quantize}"
                    ),
                );
                self.diagram = Some(DiagramImage {
                    protocol,
                    width_cols,
                    height_rows,
                });
                self.last_scale_width = target_width_cols;
            }
            Err(err) => {
                crate::perf::log_event("diagram.raster.error", format!("{err}"));
                self.raster_failed = true;
                self.show_raw = true;
                self.show_toast(
                    ToastLevel::Error,
                    format!("Could not rasterize diagram: {err}"),
                );
            }
        }
    }

    pub fn show_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            message: message.into(),
            expires_at: Instant::now() + Duration::from_secs(4),
        });
    }

    pub fn expire_toast(&mut self, now: Instant) -> bool {
        if self
            .toast
            .as_ref()
            .is_some_and(|toast| toast.expires_at <= now)
        {
            self.toast = None;
            return true;
        }
        false
    }

    pub fn active_toast(&self) -> Option<(&str, ToastLevel)> {
        self.toast
            .as_ref()
            .map(|toast| (toast.message.as_str(), toast.level))
    }
}

fn protocol_render_size(protocol: &StatefulProtocol, target_width_cols: u16) -> (u16, u16) {
    use ratatui::layout::Rect;
    use ratatui_image::Resize;
    let resize = if matches!(
        protocol.protocol_type(),
        ratatui_image::protocol::StatefulProtocolType::Halfblocks(_)
    ) {
        Resize::Scale(Some(image::imageops::FilterType::CatmullRom))
    } else {
        Resize::Scale(None)
    };
    let area = Rect::new(0, 0, target_width_cols, u16::MAX);
    let rect = protocol.size_for(resize, area);
    (rect.width.max(1), rect.height.max(1))
}

// Implement Default for Model to allow std::mem::take
impl Default for Model {
    fn default() -> Self {
        Self::new(PathBuf::new(), String::new(), (80, 24))
    }
}
