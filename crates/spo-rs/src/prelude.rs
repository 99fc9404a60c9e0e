//! Convenience re-exports for common `spo-rs` types.
//!
//! ```ignore
//! use spo_rs::prelude::*;
//! ```
//!
//! Covers what a typical optimization program needs: the chat client,
//! configuration, the [`PromptOptimizer`] with its event handlers, and the
//! [`Responder`] seam for custom backends. Lower-level pieces (meta-prompt
//! rendering, ledger internals) stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{ChatClient, ChatRequest, Message};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::api::retry::RetryConfig;
pub use crate::config::{LlmConfig, SpoConfig};
pub use crate::llm::{
    CostReport, LlmFuture, ModelSettings, RequestType, Responder, RoleModels, SpoLlm,
};
pub use crate::template::{IterationTemplate, QaPair};

// ── Optimization ────────────────────────────────────────────────────
pub use crate::evaluate::{QuickEvaluate, Verdict};
pub use crate::execute::QuickExecute;
pub use crate::ledger::{ResultsLedger, RoundRecord};
pub use crate::optimizer::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
    OptimizationSummary, OptimizerEvent, PromptOptimizer,
};
