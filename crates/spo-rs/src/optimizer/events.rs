//! Events emitted by the [`PromptOptimizer`](super::PromptOptimizer).
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use crate::evaluate::Verdict;
use crate::template::QaPair;
use tracing::{debug, info};

// ── Events ─────────────────────────────────────────────────────────

/// Lifecycle of an optimization run.
#[derive(Debug)]
pub enum OptimizerEvent<'a> {
    /// A round is starting. `last_round` is the final round of this run.
    RoundStart { round: u32, last_round: u32 },
    /// A prompt was chosen for this round (template prompt or rewrite).
    PromptGenerated { round: u32, prompt: &'a str },
    /// The optimizer's explanation of what it changed.
    Modification { round: u32, modification: &'a str },
    /// The round's prompt was executed.
    AnswersCollected {
        round: u32,
        answers: &'a [QaPair],
    },
    /// The judge compared this round against `best_round`.
    Judged {
        round: u32,
        best_round: u32,
        verdict: &'a Verdict,
    },
    /// The round was recorded in the ledger.
    RoundFinished { round: u32, succeed: bool },
    /// All rounds ran.
    Finished {
        best_round: Option<u32>,
        best_prompt: &'a str,
    },
}

/// Observer for optimizer events.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &OptimizerEvent<'_>) {
        let _ = event;
    }
}

/// Ignores every event.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
///
/// ```ignore
/// let handler = FnEventHandler::new(|event| {
///     if let OptimizerEvent::RoundFinished { round, succeed } = event {
///         println!("round {round}: {succeed}");
///     }
/// });
/// ```
pub struct FnEventHandler<F>(F)
where
    F: Fn(&OptimizerEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&OptimizerEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&OptimizerEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &OptimizerEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches each event to every inner handler, in registration order.
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &OptimizerEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &OptimizerEvent<'_>) {
        match event {
            OptimizerEvent::RoundStart { round, last_round } => {
                info!("[round {round}/{last_round}] starting");
            }
            OptimizerEvent::PromptGenerated { round, prompt } => {
                let preview: String = prompt.chars().take(200).collect();
                debug!(
                    "Round {round} prompt: {preview}{}",
                    if prompt.chars().count() > 200 { "..." } else { "" }
                );
            }
            OptimizerEvent::Modification {
                round,
                modification,
            } => {
                info!("Round {round} modification: {modification}");
            }
            OptimizerEvent::AnswersCollected { round, answers } => {
                debug!("Round {round}: collected {} answer(s)", answers.len());
            }
            OptimizerEvent::Judged {
                round,
                best_round,
                verdict,
            } => {
                info!(
                    "Round {round} vs round {best_round}: {} ({}-{})",
                    if verdict.succeed { "improved" } else { "rejected" },
                    verdict.votes_for,
                    verdict.votes_against
                );
            }
            OptimizerEvent::RoundFinished { round, succeed } => {
                debug!("Round {round} recorded (succeed={succeed})");
            }
            OptimizerEvent::Finished {
                best_round,
                best_prompt,
            } => match best_round {
                Some(round) => info!("Best round: {round}\n{best_prompt}"),
                None => info!("No successful round recorded"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn composite_dispatches_to_all() {
        let count = Arc::new(AtomicUsize::new(0));
        let (c1, c2) = (count.clone(), count.clone());
        let handler = CompositeEventHandler::new()
            .with(FnEventHandler::new(move |_| {
                c1.fetch_add(1, Ordering::SeqCst);
            }))
            .with(NoopHandler)
            .with(FnEventHandler::new(move |_| {
                c2.fetch_add(10, Ordering::SeqCst);
            }));

        handler.on_event(&OptimizerEvent::RoundFinished {
            round: 1,
            succeed: true,
        });
        assert_eq!(count.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn logging_handler_accepts_every_event() {
        let verdict = Verdict::default();
        let answers = [QaPair::new("q", "a")];
        let long_prompt = "p".repeat(300);
        let events = [
            OptimizerEvent::RoundStart {
                round: 1,
                last_round: 3,
            },
            OptimizerEvent::PromptGenerated {
                round: 1,
                prompt: &long_prompt,
            },
            OptimizerEvent::Modification {
                round: 2,
                modification: "tightened tone",
            },
            OptimizerEvent::AnswersCollected {
                round: 1,
                answers: &answers,
            },
            OptimizerEvent::Judged {
                round: 2,
                best_round: 1,
                verdict: &verdict,
            },
            OptimizerEvent::RoundFinished {
                round: 2,
                succeed: false,
            },
            OptimizerEvent::Finished {
                best_round: None,
                best_prompt: "",
            },
        ];
        for event in &events {
            LoggingHandler.on_event(event);
        }
    }
}
