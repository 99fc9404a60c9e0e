//! API plumbing shared by every LLM role: retry and cost tracking.
//!
//! - [`retry`]: transient error detection (429, 5xx, network timeouts) with
//!   exponential backoff and jitter. Never retries 400/401 errors.
//! - [`tracing`]: per-model pricing tables and a cumulative [`CostTracker`]
//!   used to fill `cost.json`.

pub mod retry;
pub mod tracing;

pub use retry::{RetryConfig, retry_api_call};
pub use tracing::{CostTracker, ModelPricing, pricing_for_model};
