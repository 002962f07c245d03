use std::io::{Write, stdout};
use std::time::Duration;

use base64::Engine;

use crate::app::{App, Message, Model, RenderPhase, ToastLevel};
use crate::render::RenderWorker;
use crate::watcher::FileWatcher;

impl App {
    pub(super) fn make_file_watcher(model: &Model) -> notify::Result<FileWatcher> {
        FileWatcher::new(&model.file_path, Duration::from_millis(200))
    }

    pub(super) fn handle_message_side_effects(
        model: &mut Model,
        worker: &mut RenderWorker,
        file_watcher: &mut Option<FileWatcher>,
        msg: &Message,
    ) {
        match msg {
            Message::ToggleWatch => {
                if model.watch_enabled {
                    match Self::make_file_watcher(model) {
                        Ok(watcher) => {
                            *file_watcher = Some(watcher);
                            model.show_toast(ToastLevel::Info, "Watching source changes");
                        }
                        Err(err) => {
                            model.watch_enabled = false;
                            *file_watcher = None;
                            model.show_toast(
                                ToastLevel::Warning,
                                format!("Watch unavailable: {err}"),
                            );
                            crate::perf::log_event(
                                "watcher.error",
                                format!("failed path={} err={err}", model.file_path.display()),
                            );
                        }
                    }
                } else {
                    *file_watcher = None;
                    model.show_toast(ToastLevel::Info, "Watch disabled");
                }
            }
            Message::ForceReload | Message::FileChanged => {
                if let Err(err) = Self::reload_source(model, worker) {
                    model.show_toast(ToastLevel::Error, format!("Reload failed: {err}"));
                    crate::perf::log_event(
                        "reload.error",
                        format!("failed path={} err={err}", model.file_path.display()),
                    );
                } else if matches!(msg, Message::ForceReload) {
                    model.show_toast(ToastLevel::Info, "Reloaded");
                }
            }
            Message::CopyRawSource => {
                Self::copy_source(model);
            }
            _ => {}
        }
    }

    /// Submit the model's current source to the render worker.
    ///
    /// The returned generation supersedes any in-flight ladder; the model
    /// remembers it so stale completions are ignored.
    pub(super) fn submit_render(model: &mut Model, worker: &mut RenderWorker) {
        model.render_generation = worker.submit(model.source.clone());
        model.phase = RenderPhase::Rendering { attempt: 0 };
    }

    /// Re-read the source file and start a fresh render, superseding any
    /// in-flight one.
    fn reload_source(model: &mut Model, worker: &mut RenderWorker) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(&model.file_path)?;
        model.set_source(text);
        Self::submit_render(model, worker);
        Ok(())
    }

    fn copy_source(model: &mut Model) {
        if model.source.is_empty() {
            return;
        }
        match copy_to_clipboard(&model.source) {
            Ok(()) => {
                let lines = model.source.lines().count();
                model.show_toast(ToastLevel::Info, format!("Copied {lines} line(s) of source"));
            }
            Err(err) => model.show_toast(ToastLevel::Error, format!("Copy failed: {err}")),
        }
    }
}

fn copy_to_clipboard(text: &str) -> std::io::Result<()> {
    #[cfg(target_os = "macos")]
    {
        if copy_to_pbcopy(text).is_ok() {
            return Ok(());
        }
    }
    copy_to_clipboard_osc52(text)
}

#[cfg(target_os = "macos")]
fn copy_to_pbcopy(text: &str) -> std::io::Result<()> {
    use std::process::{Command, Stdio};

    let mut child = Command::new("pbcopy").stdin(Stdio::piped()).spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(text.as_bytes())?;
    }
    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other("pbcopy failed"))
    }
}

fn copy_to_clipboard_osc52(text: &str) -> std::io::Result<()> {
    let osc = osc52_sequence(text);
    let mut out = stdout();
    out.write_all(osc.as_bytes())?;
    out.flush()
}

fn osc52_sequence(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    format!("\x1b]52;c;{encoded}\x07")
}

#[cfg(test)]
mod tests {
    use super::osc52_sequence;

    #[test]
    fn test_osc52_sequence_encodes_text() {
        let seq = osc52_sequence("hi");
        assert_eq!(seq, "\x1b]52;c;aGk=\x07");
    }
}
