//! Kroki-backed rendering engine.
//!
//! Sends diagram source to a Kroki server over HTTP and returns the SVG
//! response. The active [`EngineConfig`] is attached to each request as a
//! Mermaid init directive, and every render is spooled under its target
//! identifier in a work directory: a pending marker is written before the
//! request and removed only on success, so a failed attempt leaves
//! artifacts that [`DiagramEngine::remove_artifacts`] cleans up.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ureq::Agent;

use super::{BASE_CONFIG, DiagramEngine, EngineConfig, EngineError};

/// Create an HTTP agent with the specified global timeout.
///
/// Reusable across render calls for connection pooling.
pub fn create_agent(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

pub struct KrokiEngine {
    agent: Agent,
    server_url: String,
    work_dir: PathBuf,
    config: EngineConfig,
}

impl KrokiEngine {
    pub fn new(server_url: &str, timeout: Duration, work_dir: PathBuf) -> Self {
        Self {
            agent: create_agent(timeout),
            server_url: server_url.trim_end_matches('/').to_string(),
            work_dir,
            config: BASE_CONFIG,
        }
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn spool_path(&self, target_id: &str, ext: &str) -> PathBuf {
        self.work_dir.join(format!("{target_id}.{ext}"))
    }
}

impl DiagramEngine for KrokiEngine {
    fn configure(&mut self, config: &EngineConfig) {
        self.config = *config;
    }

    fn render(&mut self, target_id: &str, code: &str) -> Result<String, EngineError> {
        let _ = fs::create_dir_all(&self.work_dir);
        // Marker stays behind if anything below fails.
        let pending = self.spool_path(target_id, "pending");
        let _ = fs::write(&pending, code);

        let url = format!("{}/mermaid/svg", self.server_url);
        let body = format!("{}\n{}", self.config.init_directive(), code);
        crate::perf::log_event(
            "engine.render",
            format!("target={target_id} url={url} bytes={}", body.len()),
        );

        let response = self
            .agent
            .post(&url)
            .header("Content-Type", "text/plain")
            .send(body.as_bytes())
            .map_err(|e| EngineError::Http(e.to_string()))?;

        let status = response.status().as_u16();
        let mut response_body = response.into_body();

        if status >= 400 {
            let error_body = response_body
                .read_to_string()
                .unwrap_or_else(|_| String::from("(unable to read error body)"));
            return Err(EngineError::Http(format!("HTTP {status}: {error_body}")));
        }

        let svg = response_body
            .read_to_string()
            .map_err(|e| EngineError::Io(e.to_string()))?;
        let svg = tag_render_target(&svg, target_id);

        let _ = fs::write(self.spool_path(target_id, "svg"), &svg);
        let _ = fs::remove_file(&pending);
        Ok(svg)
    }

    fn remove_artifacts(&mut self, target_id: &str) {
        remove_spool_entries(&self.work_dir, target_id);
        crate::perf::log_event("engine.remove_artifacts", target_id);
    }
}

/// Set the render target identifier on the SVG root element.
///
/// The identifier ends up embedded in the produced markup, which is why a
/// given id must never appear in two live copies at once.
fn tag_render_target(svg: &str, target_id: &str) -> String {
    let Some(open) = svg.find("<svg") else {
        return svg.to_string();
    };
    let after_open = open + "<svg".len();
    let Some(tag_len) = svg[after_open..].find('>') else {
        return svg.to_string();
    };
    let tag = &svg[after_open..after_open + tag_len];

    if let Some(id_offset) = tag.find(" id=\"") {
        let value_start = after_open + id_offset + " id=\"".len();
        let Some(value_len) = svg[value_start..].find('"') else {
            return svg.to_string();
        };
        let mut out = String::with_capacity(svg.len() + target_id.len());
        out.push_str(&svg[..value_start]);
        out.push_str(target_id);
        out.push_str(&svg[value_start + value_len..]);
        out
    } else {
        let mut out = String::with_capacity(svg.len() + target_id.len() + 8);
        out.push_str(&svg[..after_open]);
        out.push_str(" id=\"");
        out.push_str(target_id);
        out.push('"');
        out.push_str(&svg[after_open..]);
        out
    }
}

fn remove_spool_entries(work_dir: &Path, target_id: &str) {
    for ext in ["pending", "svg"] {
        let _ = fs::remove_file(work_dir.join(format!("{target_id}.{ext}")));
    }
}
