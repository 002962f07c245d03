//! Background render worker.
//!
//! The fallback ladder talks to an HTTP engine, so it runs off the UI
//! thread. A single worker thread serves the whole app; requests carry a
//! monotonically increasing generation, and a newer submission fully
//! supersedes (never queues behind) anything in flight: the worker drains
//! its queue to the newest request and the ladder probes for staleness
//! between attempts. There is no explicit cancel signal; stale completions
//! are simply discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use crate::engine::{DiagramEngine, SharedEngine};

use super::{LadderOutcome, TargetIdSeries, render_with_fallback};

/// Event emitted by the worker, tagged with the generation of the request
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The ladder started the given attempt.
    AttemptStarted { generation: u64, attempt: usize },
    /// The ladder resolved.
    Finished {
        generation: u64,
        outcome: LadderOutcome,
    },
}

impl WorkerEvent {
    pub const fn generation(&self) -> u64 {
        match self {
            Self::AttemptStarted { generation, .. } | Self::Finished { generation, .. } => {
                *generation
            }
        }
    }
}

struct RenderRequest {
    generation: u64,
    source: String,
}

pub struct RenderWorker {
    request_tx: Sender<RenderRequest>,
    events: Receiver<WorkerEvent>,
    latest: Arc<AtomicU64>,
    next_generation: u64,
}

impl RenderWorker {
    /// Spawn the worker thread around a shared engine.
    pub fn spawn<E: DiagramEngine + 'static>(engine: Arc<SharedEngine<E>>) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<RenderRequest>();
        let (event_tx, events) = mpsc::channel();
        let latest = Arc::new(AtomicU64::new(0));
        let latest_in_worker = Arc::clone(&latest);

        thread::spawn(move || {
            while let Ok(mut request) = request_rx.recv() {
                // Drain to the newest pending request; older ones are
                // superseded, not queued.
                while let Ok(newer) = request_rx.try_recv() {
                    request = newer;
                }
                let generation = request.generation;
                if latest_in_worker.load(Ordering::SeqCst) != generation {
                    continue;
                }

                let ids = TargetIdSeries::next();
                let superseded =
                    || latest_in_worker.load(Ordering::SeqCst) != generation;
                let outcome = render_with_fallback(
                    &engine,
                    &ids,
                    &request.source,
                    &superseded,
                    |attempt| {
                        let _ = event_tx.send(WorkerEvent::AttemptStarted {
                            generation,
                            attempt,
                        });
                    },
                );

                if outcome == LadderOutcome::Superseded {
                    continue;
                }
                let _ = event_tx.send(WorkerEvent::Finished {
                    generation,
                    outcome,
                });
            }
        });

        Self {
            request_tx,
            events,
            latest,
            next_generation: 0,
        }
    }

    /// Submit new source text, superseding any in-flight render.
    ///
    /// Returns the generation the caller should remember; completions with
    /// any other generation belong to superseded requests.
    pub fn submit(&mut self, source: String) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.latest.store(generation, Ordering::SeqCst);
        crate::perf::log_event("worker.submit", format!("generation={generation}"));
        let _ = self.request_tx.send(RenderRequest { generation, source });
        generation
    }

    pub const fn current_generation(&self) -> u64 {
        self.next_generation
    }

    /// Non-blocking poll for the next live event.
    ///
    /// Events from superseded generations are dropped here rather than
    /// surfaced.
    pub fn try_next_event(&self) -> Option<WorkerEvent> {
        while let Ok(event) = self.events.try_recv() {
            if event.generation() == self.latest.load(Ordering::SeqCst) {
                return Some(event);
            }
            crate::perf::log_event(
                "worker.stale_event",
                format!("generation={}", event.generation()),
            );
        }
        None
    }
}
