//! Progress events emitted while a summary is being produced.
//!
//! The [`Summarizer`](crate::summarize::Summarizer) reports each decision and
//! each priced call through an [`EventHandler`]; a
//! [`Session`](crate::session::Session) also reports its priced chat turns. Handlers observe only; they
//! cannot steer the pipeline.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures (progress bars, counters) |

use crate::summarize::{CallPhase, Strategy};
use tracing::{debug, info};

/// Events emitted during one `summarize` invocation or chat turn.
#[derive(Debug, Clone, PartialEq)]
pub enum SummarizeEvent {
    /// The stuff/map-reduce decision for the source document.
    StrategySelected {
        strategy: Strategy,
        document_tokens: usize,
        budget: usize,
    },
    /// A round of chunk summaries is about to start. Round 0 maps the
    /// source document; later rounds collapse partial summaries.
    RoundStarted {
        round: usize,
        chunks: usize,
        input_tokens: usize,
    },
    /// A chunk summary came back.
    ChunkSummarized {
        round: usize,
        sequence_index: usize,
        chunks: usize,
    },
    /// A completed call was priced and appended to the ledger.
    CallRecorded { phase: CallPhase, cost: f64 },
    /// The final summary is ready.
    Finished { calls: usize, cost: f64 },
}

/// Observer for [`SummarizeEvent`]s.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &SummarizeEvent) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// Forwards events to `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &SummarizeEvent) {
        match event {
            SummarizeEvent::StrategySelected {
                strategy,
                document_tokens,
                budget,
            } => info!("[summarize] {strategy}: {document_tokens} tokens, budget {budget}"),
            SummarizeEvent::RoundStarted {
                round,
                chunks,
                input_tokens,
            } => info!("[summarize] round {round}: {chunks} chunk(s), {input_tokens} tokens"),
            SummarizeEvent::ChunkSummarized {
                round,
                sequence_index,
                chunks,
            } => debug!(
                "[summarize] round {round}: chunk {}/{chunks} done",
                sequence_index + 1
            ),
            SummarizeEvent::CallRecorded { phase, cost } => {
                debug!("[summarize] {phase} call cost ${cost:.5}")
            }
            SummarizeEvent::Finished { calls, cost } => {
                info!("[summarize] done in {calls} call(s), ${cost:.5}")
            }
        }
    }
}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&SummarizeEvent) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&SummarizeEvent) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&SummarizeEvent) + Send + Sync,
{
    fn on_event(&self, event: &SummarizeEvent) {
        (self.0)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn fn_handler_sees_events() {
        let seen = Mutex::new(Vec::new());
        let handler = FnEventHandler::new(|e: &SummarizeEvent| {
            seen.lock().unwrap().push(e.clone());
        });
        handler.on_event(&SummarizeEvent::Finished {
            calls: 1,
            cost: 0.5,
        });
        LoggingHandler.on_event(&SummarizeEvent::CallRecorded {
            phase: CallPhase::Stuff,
            cost: 0.5,
        });
        NoopHandler.on_event(&SummarizeEvent::Finished {
            calls: 0,
            cost: 0.0,
        });
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
