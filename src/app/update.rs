use crate::app::{Model, RenderPhase};
use crate::render::{LadderOutcome, RENDER_ATTEMPTS};

/// All possible events and actions in the application.
///
/// These represent user input, system events, and internal actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Navigation (raw-source pane)
    /// Scroll up by n lines
    ScrollUp(usize),
    /// Scroll down by n lines
    ScrollDown(usize),
    /// Scroll up one page
    PageUp,
    /// Scroll down one page
    PageDown,
    /// Scroll up half page
    HalfPageUp,
    /// Scroll down half page
    HalfPageDown,
    /// Go to beginning of source
    GoToTop,
    /// Go to end of source
    GoToBottom,

    // Diagram display
    /// Promote the diagram to the fullscreen overlay, or demote it back
    ToggleFullscreen,
    /// Close the fullscreen overlay
    CloseFullscreen,
    /// Toggle the raw-source pane under a degradation advisory
    ToggleRawSource,
    /// Copy the raw source to the clipboard (side effect)
    CopyRawSource,

    // Render pipeline
    /// The fallback ladder started an attempt for a generation
    RenderAttemptStarted { generation: u64, attempt: usize },
    /// The fallback ladder resolved for a generation
    RenderFinished {
        generation: u64,
        outcome: LadderOutcome,
    },

    // File watching
    /// Toggle file watching
    ToggleWatch,
    /// File changed externally, reload and re-render
    FileChanged,
    /// Force reload and re-render
    ForceReload,

    // Help
    /// Toggle help overlay
    ToggleHelp,
    /// Hide help overlay
    HideHelp,

    // Window
    /// Terminal resized
    Resize(u16, u16),

    // Application
    /// Quit the application
    Quit,
}

/// Pure function that updates the model based on a message.
///
/// This is the core of TEA - all state transitions happen here.
/// No side effects should occur in this function.
pub fn update(mut model: Model, msg: Message) -> Model {
    // While the fullscreen overlay is open it intercepts all input below
    // it: background scrolling is suspended until it closes.
    if model.fullscreen
        && matches!(
            msg,
            Message::ScrollUp(_)
                | Message::ScrollDown(_)
                | Message::PageUp
                | Message::PageDown
                | Message::HalfPageUp
                | Message::HalfPageDown
                | Message::GoToTop
                | Message::GoToBottom
                | Message::ToggleRawSource
        )
    {
        return model;
    }

    match msg {
        // Navigation
        Message::ScrollUp(n) => model.viewport.scroll_up(n),
        Message::ScrollDown(n) => model.viewport.scroll_down(n),
        Message::PageUp => model.viewport.page_up(),
        Message::PageDown => model.viewport.page_down(),
        Message::HalfPageUp => model.viewport.half_page_up(),
        Message::HalfPageDown => model.viewport.half_page_down(),
        Message::GoToTop => model.viewport.go_to_top(),
        Message::GoToBottom => model.viewport.go_to_bottom(),

        // Diagram display
        Message::ToggleFullscreen => {
            // Only a successful render can be promoted.
            if matches!(model.phase, RenderPhase::Succeeded { .. }) {
                model.fullscreen = !model.fullscreen;
                // The single live copy moves between slots with a different
                // target width; rebuild it for the new owner.
                model.invalidate_diagram();
            }
        }
        Message::CloseFullscreen => {
            if model.fullscreen {
                model.fullscreen = false;
                model.invalidate_diagram();
            }
        }
        Message::ToggleRawSource => {
            model.show_raw = !model.show_raw;
        }

        // Render pipeline
        Message::RenderAttemptStarted {
            generation,
            attempt,
        } => {
            if generation == model.render_generation {
                model.phase = RenderPhase::Rendering { attempt };
            }
        }
        Message::RenderFinished {
            generation,
            outcome,
        } => {
            // A completion from a superseded request resolves after a newer
            // one started; its result is discarded, never displayed.
            if generation == model.render_generation {
                apply_render_outcome(&mut model, outcome);
            }
        }

        // File watching
        Message::ToggleWatch => {
            model.watch_enabled = !model.watch_enabled;
        }
        Message::ToggleHelp => {
            model.help_visible = !model.help_visible;
        }
        Message::HideHelp => {
            model.help_visible = false;
        }
        // FileChanged/ForceReload/CopyRawSource: handled in effects
        Message::FileChanged | Message::ForceReload | Message::CopyRawSource => {}

        // Window
        Message::Resize(width, height) => {
            model.viewport.resize(width, height.saturating_sub(1));
            model.invalidate_diagram();
        }

        // Application
        Message::Quit => {
            model.should_quit = true;
        }
    }
    model
}

fn apply_render_outcome(model: &mut Model, outcome: LadderOutcome) {
    match outcome {
        LadderOutcome::Rendered(rendered) => {
            crate::perf::log_event(
                "app.render.success",
                format!(
                    "attempt={}/{} degradation={}",
                    rendered.attempt + 1,
                    RENDER_ATTEMPTS.len(),
                    rendered.degradation.tag()
                ),
            );
            model.phase = RenderPhase::Succeeded {
                svg: rendered.svg,
                degradation: rendered.degradation,
            };
            model.invalidate_diagram();
        }
        LadderOutcome::Failed(failure) => {
            crate::perf::log_event("app.render.failed", &failure.message);
            model.phase = RenderPhase::Failed {
                message: failure.message,
            };
            // The raw source stays on the model for the fallback display.
        }
        // The worker suppresses superseded outcomes; nothing to apply if
        // one slips through.
        LadderOutcome::Superseded => {}
    }
}
