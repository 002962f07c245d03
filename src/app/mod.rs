//! Application state and main event loop.
//!
//! This module implements The Elm Architecture (TEA):
//! - [`Model`]: The complete application state
//! - [`Message`]: All possible events and actions
//! - [`update`]: Pure function for state transitions
//! - [`App::run`]: Main event loop with rendering

mod effects;
mod event_loop;
mod input;
mod model;
mod update;

pub use model::{DiagramImage, DiagramSlot, Model, RenderPhase, ToastLevel};
pub use update::{Message, update};

use std::path::PathBuf;

use crate::config::{DEFAULT_ENGINE_TIMEOUT_SECS, DEFAULT_ENGINE_URL};

/// Main application struct that owns the terminal and runs the event loop.
pub struct App {
    file_path: PathBuf,
    watch_enabled: bool,
    images_enabled: bool,
    force_half_cell: bool,
    engine_url: String,
    engine_timeout_secs: u64,
    config_global_path: Option<PathBuf>,
    config_local_path: Option<PathBuf>,
}

impl App {
    /// Create a new application for the given diagram source file.
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            watch_enabled: false,
            images_enabled: true,
            force_half_cell: false,
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            engine_timeout_secs: DEFAULT_ENGINE_TIMEOUT_SECS,
            config_global_path: None,
            config_local_path: None,
        }
    }

    /// Enable or disable file watching.
    pub fn with_watch(mut self, enabled: bool) -> Self {
        self.watch_enabled = enabled;
        self
    }

    /// Enable or disable inline diagram rendering.
    pub fn with_images_enabled(mut self, enabled: bool) -> Self {
        self.images_enabled = enabled;
        self
    }

    /// Force image rendering to use half-cell fallback mode.
    pub const fn with_force_half_cell(mut self, enabled: bool) -> Self {
        self.force_half_cell = enabled;
        self
    }

    /// Set the rendering engine server URL.
    pub fn with_engine_url(mut self, url: impl Into<String>) -> Self {
        self.engine_url = url.into();
        self
    }

    /// Set the per-request engine timeout in seconds.
    pub const fn with_engine_timeout_secs(mut self, secs: u64) -> Self {
        self.engine_timeout_secs = secs;
        self
    }

    /// Set config paths to show in help.
    pub fn with_config_paths(
        mut self,
        global_path: Option<PathBuf>,
        local_path: Option<PathBuf>,
    ) -> Self {
        self.config_global_path = global_path;
        self.config_local_path = local_path;
        self
    }
}
