//! Rendering engine boundary.
//!
//! The layout-and-draw engine is an external collaborator: it takes a
//! configuration plus a `(target-id, code)` pair and produces SVG markup or
//! an error. Its configuration is effectively process-wide state, so all
//! interaction goes through [`SharedEngine`], which re-applies the intended
//! configuration immediately before every render inside a single critical
//! section. Concurrent diagram instances can therefore never observe each
//! other's configuration.

mod kroki;

pub use kroki::{KrokiEngine, create_agent};

use std::sync::Mutex;

use serde::Serialize;

/// Flowchart layout tuning passed to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowchartTuning {
    pub curve: &'static str,
    pub node_spacing: u32,
    pub rank_spacing: u32,
}

/// Engine configuration for one render call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    pub start_on_load: bool,
    pub theme: &'static str,
    pub security_level: &'static str,
    pub font_family: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flowchart: Option<FlowchartTuning>,
}

/// Default settings.
pub const BASE_CONFIG: EngineConfig = EngineConfig {
    start_on_load: false,
    theme: "default",
    security_level: "loose",
    font_family: "inherit",
    flowchart: None,
};

/// Smoother curves and more node/rank spacing.
pub const RELAXED_CONFIG: EngineConfig = EngineConfig {
    start_on_load: false,
    theme: "default",
    security_level: "loose",
    font_family: "inherit",
    flowchart: Some(FlowchartTuning {
        curve: "basis",
        node_spacing: 60,
        rank_spacing: 60,
    }),
};

/// Widest spacing, for layouts that overlap under the relaxed settings.
pub const WIDE_CONFIG: EngineConfig = EngineConfig {
    start_on_load: false,
    theme: "default",
    security_level: "loose",
    font_family: "inherit",
    flowchart: Some(FlowchartTuning {
        curve: "basis",
        node_spacing: 80,
        rank_spacing: 80,
    }),
};

impl EngineConfig {
    /// Serialize the configuration as a Mermaid init directive.
    ///
    /// The directive travels with the diagram source, so every render call
    /// carries the full intended configuration.
    pub fn init_directive(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("%%{{init: {json}}}%%")
    }
}

/// Error returned by a rendering engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("engine error: {0}")]
    Engine(String),
}

/// A graph layout-and-draw engine.
///
/// `render` resolves to self-contained SVG markup tagged with `target_id`,
/// or an error. Engines may spool intermediate output under the target
/// identifier; `remove_artifacts` must delete anything left behind by a
/// failed render for that identifier.
pub trait DiagramEngine: Send {
    fn configure(&mut self, config: &EngineConfig);

    fn render(&mut self, target_id: &str, code: &str) -> Result<String, EngineError>;

    fn remove_artifacts(&mut self, target_id: &str);
}

/// Serialized access to a shared engine.
///
/// Configuration and render happen under one lock with no suspension point
/// in between, so interleaved renders from other diagram instances cannot
/// clobber the configuration mid-call.
pub struct SharedEngine<E> {
    inner: Mutex<E>,
}

impl<E: DiagramEngine> SharedEngine<E> {
    pub const fn new(engine: E) -> Self {
        Self {
            inner: Mutex::new(engine),
        }
    }

    /// Re-apply `config` and render in a single critical section.
    pub fn render_configured(
        &self,
        config: &EngineConfig,
        target_id: &str,
        code: &str,
    ) -> Result<String, EngineError> {
        let mut engine = self.inner.lock().expect("engine lock poisoned");
        engine.configure(config);
        engine.render(target_id, code)
    }

    pub fn remove_artifacts(&self, target_id: &str) {
        let mut engine = self.inner.lock().expect("engine lock poisoned");
        engine.remove_artifacts(target_id);
    }

    #[cfg(test)]
    pub fn into_inner(self) -> E {
        self.inner.into_inner().expect("engine lock poisoned")
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{DiagramEngine, EngineConfig, EngineError};

    type Verdict = Box<dyn FnMut(usize, &str) -> Result<String, EngineError> + Send>;

    /// In-memory engine with scripted outcomes, recording every call.
    pub(crate) struct ScriptedEngine {
        verdict: Verdict,
        pub configures: Vec<EngineConfig>,
        pub renders: Vec<(String, String)>,
        pub removed: Vec<String>,
        calls: usize,
    }

    impl ScriptedEngine {
        pub fn new(
            verdict: impl FnMut(usize, &str) -> Result<String, EngineError> + Send + 'static,
        ) -> Self {
            Self {
                verdict: Box::new(verdict),
                configures: Vec::new(),
                renders: Vec::new(),
                removed: Vec::new(),
                calls: 0,
            }
        }

        /// Fail the first `n` render calls, then succeed.
        pub fn failing_first(n: usize) -> Self {
            Self::new(move |call, _| {
                if call < n {
                    Err(EngineError::Engine(format!("attempt {call} failed")))
                } else {
                    Ok("<svg id=\"scripted\"></svg>".to_string())
                }
            })
        }
    }

    impl DiagramEngine for ScriptedEngine {
        fn configure(&mut self, config: &EngineConfig) {
            self.configures.push(*config);
        }

        fn render(&mut self, target_id: &str, code: &str) -> Result<String, EngineError> {
            let call = self.calls;
            self.calls += 1;
            self.renders.push((target_id.to_string(), code.to_string()));
            (self.verdict)(call, code)
        }

        fn remove_artifacts(&mut self, target_id: &str) {
            self.removed.push(target_id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_directive_serializes_camel_case() {
        let directive = RELAXED_CONFIG.init_directive();
        assert!(directive.starts_with("%%{init: {"));
        assert!(directive.ends_with("}%%"));
        assert!(directive.contains("\"startOnLoad\":false"));
        assert!(directive.contains("\"securityLevel\":\"loose\""));
        assert!(directive.contains("\"nodeSpacing\":60"));
        assert!(directive.contains("\"rankSpacing\":60"));
        assert!(directive.contains("\"curve\":\"basis\""));
    }

    #[test]
    fn test_init_directive_omits_absent_flowchart_tuning() {
        let directive = BASE_CONFIG.init_directive();
        assert!(!directive.contains("flowchart"));
        assert!(directive.contains("\"fontFamily\":\"inherit\""));
    }

    #[test]
    fn test_config_presets_widen_spacing() {
        let relaxed = RELAXED_CONFIG.flowchart.expect("tuning");
        let wide = WIDE_CONFIG.flowchart.expect("tuning");
        assert!(wide.node_spacing > relaxed.node_spacing);
        assert!(wide.rank_spacing > relaxed.rank_spacing);
        assert_eq!(BASE_CONFIG.flowchart, None);
    }

    #[test]
    fn test_shared_engine_reapplies_config_before_every_render() {
        let shared = SharedEngine::new(testing::ScriptedEngine::failing_first(0));
        shared
            .render_configured(&BASE_CONFIG, "id-0", "graph TD")
            .expect("render");
        shared
            .render_configured(&WIDE_CONFIG, "id-1", "graph TD")
            .expect("render");

        let engine = shared.into_inner();
        assert_eq!(engine.configures, vec![BASE_CONFIG, WIDE_CONFIG]);
        assert_eq!(engine.renders.len(), 2);
    }
}
