//! Progressive-degradation render pipeline.
//!
//! AI-generated diagram source frequently fails to render as written, so a
//! single render call is never trusted. [`render_with_fallback`] drives the
//! engine through [`RENDER_ATTEMPTS`], a fixed ladder ordered from least to
//! most destructive: layout tweaks first, then structural simplification,
//! then stripping edge labels as a last resort. The first success wins and
//! reports how much fidelity was sacrificed; if every attempt fails, the
//! original unsanitized source is handed back for fallback display.

mod worker;

pub use worker::{RenderWorker, WorkerEvent};

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::engine::{
    BASE_CONFIG, DiagramEngine, EngineConfig, EngineError, RELAXED_CONFIG, SharedEngine,
    WIDE_CONFIG,
};
use crate::sanitize::{flatten_subgraphs, sanitize, strip_edge_labels, use_flowchart_keyword};
use crate::validate::validate;

/// How much visual information was sacrificed to achieve a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DegradationLevel {
    /// Full fidelity.
    None,
    /// Subgraph grouping boxes removed.
    Simplified,
    /// Edge labels stripped.
    NoLabels,
}

impl DegradationLevel {
    /// Advisory message shown to the user, or `None` at full fidelity.
    pub const fn advisory(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Simplified => {
                Some("Subgraph groupings were removed to render this complex diagram.")
            }
            Self::NoLabels => Some("Edge labels were removed to render this complex diagram."),
        }
    }

    pub const fn tag(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Simplified => "simplified",
            Self::NoLabels => "no-labels",
        }
    }
}

/// One rung of the fallback ladder.
pub struct RenderAttempt {
    pub config: EngineConfig,
    pub transform: Option<fn(&str) -> String>,
    pub degradation: DegradationLevel,
}

fn flatten_and_use_flowchart(code: &str) -> String {
    use_flowchart_keyword(&flatten_subgraphs(code))
}

/// The fixed fallback ladder, tried strictly in order.
///
/// Represented as data rather than branching code so new degradation tiers
/// can be appended.
pub static RENDER_ATTEMPTS: [RenderAttempt; 6] = [
    // 1. Default settings, unmodified code.
    RenderAttempt {
        config: BASE_CONFIG,
        transform: None,
        degradation: DegradationLevel::None,
    },
    // 2. Smoother curves + more spacing.
    RenderAttempt {
        config: RELAXED_CONFIG,
        transform: None,
        degradation: DegradationLevel::None,
    },
    // 3. Switch to the "flowchart" keyword + more spacing.
    RenderAttempt {
        config: WIDE_CONFIG,
        transform: Some(use_flowchart_keyword),
        degradation: DegradationLevel::None,
    },
    // 4. Flatten subgraphs (drops grouping boxes, keeps all labels).
    RenderAttempt {
        config: RELAXED_CONFIG,
        transform: Some(flatten_subgraphs),
        degradation: DegradationLevel::Simplified,
    },
    // 5. Flatten + flowchart keyword.
    RenderAttempt {
        config: WIDE_CONFIG,
        transform: Some(flatten_and_use_flowchart),
        degradation: DegradationLevel::Simplified,
    },
    // 6. Last resort: strip edge labels entirely.
    RenderAttempt {
        config: RELAXED_CONFIG,
        transform: Some(strip_edge_labels),
        degradation: DegradationLevel::NoLabels,
    },
];

/// Format a render target identifier.
///
/// Pure; uniqueness comes entirely from the inputs. The instance
/// discriminator separates concurrent diagram instances, the epoch
/// timestamp separates successive render invocations of one instance, and
/// the attempt index separates retries within one invocation.
pub fn format_target_id(instance: u32, epoch_ms: u64, attempt: usize) -> String {
    format!("mermaid-{instance}-{epoch_ms}-{attempt}")
}

/// Target identifiers for one run of the fallback ladder.
#[derive(Debug, Clone, Copy)]
pub struct TargetIdSeries {
    instance: u32,
    epoch_ms: u64,
}

impl TargetIdSeries {
    /// A fresh series guaranteed not to collide with any prior one.
    pub fn next() -> Self {
        static INSTANCE: AtomicU32 = AtomicU32::new(0);
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        Self {
            instance: INSTANCE.fetch_add(1, Ordering::Relaxed),
            epoch_ms,
        }
    }

    /// A series with explicit parts, for deterministic tests.
    pub const fn with_parts(instance: u32, epoch_ms: u64) -> Self {
        Self { instance, epoch_ms }
    }

    pub fn target_id(&self, attempt: usize) -> String {
        format_target_id(self.instance, self.epoch_ms, attempt)
    }
}

/// A successful render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDiagram {
    /// Self-contained SVG markup.
    pub svg: String,
    pub degradation: DegradationLevel,
    /// Zero-based index of the attempt that succeeded.
    pub attempt: usize,
}

/// Terminal failure: every attempt in the ladder failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    /// The last engine error, human-readable.
    pub message: String,
    /// The original, never-sanitized source for fallback display.
    pub raw_source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LadderOutcome {
    Rendered(RenderedDiagram),
    Failed(RenderFailure),
    /// A newer request arrived; this run was abandoned and its result
    /// discarded.
    Superseded,
}

/// Run the fallback ladder against `raw_source`.
///
/// Attempts are strictly sequential: attempt *i + 1* never starts before
/// attempt *i* has resolved, because each attempt mutates the shared engine
/// configuration. `superseded` is probed between attempts; once it reports
/// true the run is abandoned. `on_attempt` fires as each attempt starts so
/// progress can be surfaced.
pub fn render_with_fallback<E: DiagramEngine>(
    engine: &SharedEngine<E>,
    ids: &TargetIdSeries,
    raw_source: &str,
    superseded: &dyn Fn() -> bool,
    mut on_attempt: impl FnMut(usize),
) -> LadderOutcome {
    let sanitized = sanitize(raw_source);

    // Advisory only: the ladder below is the enforcement mechanism.
    if let Some(defect) = validate(&sanitized) {
        tracing::warn!(%defect, "diagram failed pre-render validation");
        crate::perf::log_event("render.validate", &defect);
    }

    let mut last_error: Option<EngineError> = None;

    for (attempt, step) in RENDER_ATTEMPTS.iter().enumerate() {
        if superseded() {
            crate::perf::log_event("render.superseded", format!("attempt={attempt}"));
            return LadderOutcome::Superseded;
        }
        on_attempt(attempt);

        let target_id = ids.target_id(attempt);
        let code = step
            .transform
            .map_or_else(|| sanitized.clone(), |transform| transform(&sanitized));
        crate::perf::log_event(
            "render.attempt",
            format!(
                "attempt={attempt} target={target_id} degradation={}",
                step.degradation.tag()
            ),
        );

        match engine.render_configured(&step.config, &target_id, &code) {
            Ok(svg) => {
                crate::perf::log_event(
                    "render.success",
                    format!("attempt={attempt} bytes={}", svg.len()),
                );
                return LadderOutcome::Rendered(RenderedDiagram {
                    svg,
                    degradation: step.degradation,
                    attempt,
                });
            }
            Err(err) => {
                // Failed attempts can leave partial artifacts tagged with the
                // target identifier; remove them before the next attempt.
                engine.remove_artifacts(&target_id);
                crate::perf::log_event("render.attempt.failed", format!("attempt={attempt} err={err}"));
                last_error = Some(err);
            }
        }
    }

    LadderOutcome::Failed(RenderFailure {
        message: last_error
            .map_or_else(|| "Failed to render diagram".to_string(), |err| err.to_string()),
        raw_source: raw_source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedEngine;

    fn never_superseded() -> bool {
        false
    }

    #[test]
    fn test_first_attempt_success_stops_ladder() {
        let shared = SharedEngine::new(ScriptedEngine::failing_first(0));
        let ids = TargetIdSeries::with_parts(0, 1000);

        let outcome =
            render_with_fallback(&shared, &ids, "graph TD\nA-->B", &never_superseded, |_| {});

        let LadderOutcome::Rendered(rendered) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(rendered.degradation, DegradationLevel::None);
        assert_eq!(rendered.attempt, 0);

        let engine = shared.into_inner();
        assert_eq!(engine.renders.len(), 1);
        assert!(engine.removed.is_empty());
    }

    #[test]
    fn test_ladder_exhaustion_and_ordering() {
        // Only renders once every edge label is gone, which is exactly what
        // the sixth attempt's transform does.
        let shared = SharedEngine::new(ScriptedEngine::new(|_, code| {
            if code.contains('|') {
                Err(EngineError::Engine("label overlap".to_string()))
            } else {
                Ok("<svg id=\"ok\"></svg>".to_string())
            }
        }));
        let ids = TargetIdSeries::with_parts(3, 42);
        let source = "graph TD\nsubgraph G\nA -->|uses| B\nend";

        let mut attempts_seen = Vec::new();
        let outcome = render_with_fallback(&shared, &ids, source, &never_superseded, |attempt| {
            attempts_seen.push(attempt);
        });

        let LadderOutcome::Rendered(rendered) = outcome else {
            panic!("expected success, got {outcome:?}");
        };
        assert_eq!(rendered.degradation, DegradationLevel::NoLabels);
        assert_eq!(rendered.attempt, 5);
        assert_eq!(attempts_seen, vec![0, 1, 2, 3, 4, 5]);

        let engine = shared.into_inner();
        assert_eq!(engine.renders.len(), 6);
        // Attempts 1-5 failed and were cleaned up, in order.
        assert_eq!(
            engine.removed,
            (0..5).map(|i| ids.target_id(i)).collect::<Vec<_>>()
        );
        // Each attempt re-applied its own configuration.
        let expected: Vec<_> = RENDER_ATTEMPTS.iter().map(|a| a.config).collect();
        assert_eq!(engine.configures, expected);
        // The winning attempt received label-free code.
        assert!(!engine.renders[5].1.contains('|'));
    }

    #[test]
    fn test_attempt_transforms_degrade_in_order() {
        let shared = SharedEngine::new(ScriptedEngine::new(|_, _| {
            Err(EngineError::Engine("always".to_string()))
        }));
        let ids = TargetIdSeries::with_parts(0, 7);
        let source = "graph TD\nsubgraph G\nA -->|uses| B\nend";

        let _ = render_with_fallback(&shared, &ids, source, &never_superseded, |_| {});
        let engine = shared.into_inner();

        // 1-2: untouched sanitized code.
        assert!(engine.renders[0].1.contains("subgraph"));
        assert!(engine.renders[1].1.contains("|uses|"));
        // 3: keyword swap only.
        assert!(engine.renders[2].1.starts_with("flowchart TD"));
        assert!(engine.renders[2].1.contains("subgraph"));
        // 4: subgraphs flattened, labels intact.
        assert!(!engine.renders[3].1.contains("subgraph"));
        assert!(engine.renders[3].1.contains("|uses|"));
        // 5: flattened and keyword swapped.
        assert!(engine.renders[4].1.starts_with("flowchart TD"));
        assert!(!engine.renders[4].1.contains("subgraph"));
        // 6: labels stripped.
        assert!(!engine.renders[5].1.contains('|'));
    }

    #[test]
    fn test_terminal_failure_retains_original_source() {
        let shared = SharedEngine::new(ScriptedEngine::new(|_, _| {
            Err(EngineError::Http("HTTP 400: parse error".to_string()))
        }));
        let ids = TargetIdSeries::with_parts(1, 9);
        // Fenced input: the fallback must carry the pre-sanitization text.
        let raw = "```mermaid\ngraph TD\nA-->B\n```";

        let outcome = render_with_fallback(&shared, &ids, raw, &never_superseded, |_| {});

        let LadderOutcome::Failed(failure) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert_eq!(failure.raw_source, raw);
        assert!(!failure.message.is_empty());
        assert!(failure.message.contains("HTTP 400"));

        let engine = shared.into_inner();
        assert_eq!(engine.renders.len(), RENDER_ATTEMPTS.len());
        assert_eq!(engine.removed.len(), RENDER_ATTEMPTS.len());
    }

    #[test]
    fn test_superseded_run_abandons_between_attempts() {
        let shared = SharedEngine::new(ScriptedEngine::new(|_, _| {
            Err(EngineError::Engine("nope".to_string()))
        }));
        let ids = TargetIdSeries::with_parts(0, 1);

        // Let the first attempt run, then report superseded.
        let probes = std::cell::Cell::new(0_usize);
        let superseded = || {
            let count = probes.get();
            probes.set(count + 1);
            count >= 1
        };

        let outcome = render_with_fallback(&shared, &ids, "graph TD\nA-->B", &superseded, |_| {});
        assert_eq!(outcome, LadderOutcome::Superseded);

        let engine = shared.into_inner();
        assert_eq!(engine.renders.len(), 1);
    }

    #[test]
    fn test_target_id_format_is_pure() {
        assert_eq!(format_target_id(2, 123, 4), "mermaid-2-123-4");
        assert_eq!(format_target_id(2, 123, 4), format_target_id(2, 123, 4));
        assert_ne!(format_target_id(2, 123, 4), format_target_id(2, 123, 5));
        assert_ne!(format_target_id(2, 123, 4), format_target_id(3, 123, 4));
    }

    #[test]
    fn test_target_id_series_distinct_per_attempt() {
        let ids = TargetIdSeries::with_parts(0, 55);
        let all: Vec<_> = (0..RENDER_ATTEMPTS.len()).map(|i| ids.target_id(i)).collect();
        let mut deduped = all.clone();
        deduped.dedup();
        assert_eq!(all, deduped);
    }

    #[test]
    fn test_next_series_are_distinct() {
        let a = TargetIdSeries::next();
        let b = TargetIdSeries::next();
        assert_ne!(a.target_id(0), b.target_id(0));
    }

    #[test]
    fn test_degradation_advisories() {
        assert_eq!(DegradationLevel::None.advisory(), None);
        assert!(
            DegradationLevel::Simplified
                .advisory()
                .expect("advisory")
                .contains("Subgraph groupings")
        );
        assert!(
            DegradationLevel::NoLabels
                .advisory()
                .expect("advisory")
                .contains("Edge labels")
        );
    }

    #[test]
    fn test_ladder_orders_degradation_monotonically() {
        let mut last = DegradationLevel::None;
        for attempt in &RENDER_ATTEMPTS {
            assert!(attempt.degradation >= last);
            last = attempt.degradation;
        }
        assert_eq!(last, DegradationLevel::NoLabels);
    }
}
