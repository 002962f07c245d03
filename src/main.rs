//! Flowless - a terminal viewer for AI-generated Mermaid diagrams.
//!
//! # Usage
//!
//! ```bash
//! flowless diagram.mmd
//! flowless --watch diagram.mmd
//! flowless --engine-url http://localhost:8000 diagram.mmd
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use flowless::app::App;
use flowless::config::{
    ConfigFlags, DEFAULT_ENGINE_TIMEOUT_SECS, DEFAULT_ENGINE_URL, clear_config_flags,
    global_config_path, load_config_flags, local_override_path, parse_flag_tokens,
    save_config_flags,
};
use flowless::perf;

/// A terminal viewer for AI-generated Mermaid diagrams
#[derive(Parser, Debug)]
#[command(name = "flowless", version, about, long_about = None)]
struct Cli {
    /// Mermaid source file to view
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Watch the file for changes and re-render automatically
    #[arg(short, long)]
    watch: bool,

    /// Disable inline diagram rendering (show raw source only)
    #[arg(long)]
    no_images: bool,

    /// Rendering engine (Kroki) server URL
    #[arg(long, value_name = "URL")]
    engine_url: Option<String>,

    /// Per-request engine timeout in seconds
    #[arg(long, value_name = "SECS")]
    engine_timeout_secs: Option<u64>,

    /// Enable startup performance logging
    #[arg(long)]
    perf: bool,

    /// Write detailed render debug events to a file
    #[arg(long, value_name = "PATH")]
    render_debug_log: Option<PathBuf>,

    /// Force image rendering to use half-cell fallback mode
    #[arg(long)]
    force_half_cell: bool,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let render_debug_log_path = effective
        .render_debug_log
        .clone()
        .or_else(|| std::env::var_os("FLOWLESS_RENDER_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(render_debug_log_path.as_deref()) {
        eprintln!(
            "[warn] Failed to initialize render debug log {}: {}",
            render_debug_log_path
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()),
            err
        );
    }

    // Verify file exists
    if !cli.file.exists() {
        anyhow::bail!("File not found: {}", cli.file.display());
    }

    // Run the application
    let mut app = App::new(cli.file)
        .with_watch(effective.watch)
        .with_images_enabled(!effective.no_images)
        .with_force_half_cell(effective.force_half_cell)
        .with_engine_url(
            effective
                .engine_url
                .unwrap_or_else(|| DEFAULT_ENGINE_URL.to_string()),
        )
        .with_engine_timeout_secs(
            effective
                .engine_timeout_secs
                .unwrap_or(DEFAULT_ENGINE_TIMEOUT_SECS),
        )
        .with_config_paths(
            Some(global_path.clone()),
            if local_path.exists() {
                Some(local_path.clone())
            } else {
                None
            },
        );

    app.run().context("Application error")
}
