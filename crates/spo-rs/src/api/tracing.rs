//! Token and cost accounting for LLM calls.
//!
//! Each role (optimize / evaluate / execute) keeps its own [`CostTracker`];
//! the optimizer snapshots them into `cost.json` after every round.

use crate::UsageInfo;
use serde::{Deserialize, Serialize};

/// Per-model pricing for cost estimation (USD per 1M tokens).
#[derive(Debug, Clone)]
pub struct ModelPricing {
    /// Price per 1M input tokens.
    pub input_per_million: f64,
    /// Price per 1M output tokens.
    pub output_per_million: f64,
}

impl ModelPricing {
    /// Estimate cost for given token counts.
    pub fn estimate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (completion_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        // Mid-range estimate for unknown models.
        Self {
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }
}

/// Lookup approximate pricing for a model by name.
///
/// Matches on the segment after the last `/` (`"gpt-4o-mini"` in
/// `"openai/gpt-4o-mini"`) so organisation prefixes don't cause false hits.
/// Figures are approximate; they exist to spot runaway spend, not to bill.
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    let (input, output) = if name.contains("opus") {
        (15.0, 75.0)
    } else if name.contains("sonnet") {
        (3.0, 15.0)
    } else if name.contains("haiku") {
        (0.25, 1.25)
    } else if name.contains("4o-mini") {
        (0.15, 0.60)
    } else if name.contains("gpt-4o") || name.contains("gpt-4") {
        (2.50, 10.0)
    } else if name.starts_with("o1") || name.starts_with("o3") {
        (15.0, 60.0)
    } else if name.contains("gemini") && name.contains("flash") {
        (0.075, 0.30)
    } else if name.contains("gemini") {
        (1.25, 5.0)
    } else if name.contains("deepseek") {
        (0.27, 1.10)
    } else if name.contains("qwen") || name.contains("glm") {
        (0.40, 1.60)
    } else {
        return ModelPricing::default();
    };

    ModelPricing {
        input_per_million: input,
        output_per_million: output,
    }
}

/// Cumulative token and cost counter for one role.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostTracker {
    pub calls: u64,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub estimated_cost_usd: f64,
}

impl CostTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record token usage for one call.
    pub fn record(&mut self, prompt_tokens: u32, completion_tokens: u32, pricing: &ModelPricing) {
        self.calls += 1;
        self.total_prompt_tokens += prompt_tokens as u64;
        self.total_completion_tokens += completion_tokens as u64;
        self.estimated_cost_usd += pricing.estimate_cost(prompt_tokens, completion_tokens);
    }

    /// Record the usage block of an API response. Missing counts are zero.
    pub fn record_usage(&mut self, usage: Option<&UsageInfo>, pricing: &ModelPricing) {
        let (prompt, completion) = usage.map_or((0, 0), |u| {
            (
                u.prompt_tokens.unwrap_or(0),
                u.completion_tokens.unwrap_or(0),
            )
        });
        self.record(prompt, completion, pricing);
    }

    /// Total tokens consumed.
    pub fn total_tokens(&self) -> u64 {
        self.total_prompt_tokens + self.total_completion_tokens
    }

    /// Add another tracker's totals into this one.
    pub fn merge(&mut self, other: &CostTracker) {
        self.calls += other.calls;
        self.total_prompt_tokens += other.total_prompt_tokens;
        self.total_completion_tokens += other.total_completion_tokens;
        self.estimated_cost_usd += other.estimated_cost_usd;
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        format!(
            "{} call(s), tokens: {} prompt + {} completion = {} total, est. cost: ${:.4}",
            self.calls,
            self.total_prompt_tokens,
            self.total_completion_tokens,
            self.total_tokens(),
            self.estimated_cost_usd,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_estimation() {
        let pricing = ModelPricing {
            input_per_million: 3.0,
            output_per_million: 15.0,
        };
        let cost = pricing.estimate_cost(1_000_000, 100_000);
        assert!((cost - 4.5).abs() < 0.01);
    }

    #[test]
    fn cost_tracker_accumulates() {
        let mut tracker = CostTracker::new();
        let pricing = ModelPricing::default();
        tracker.record(1000, 500, &pricing);
        tracker.record(2000, 1000, &pricing);
        assert_eq!(tracker.calls, 2);
        assert_eq!(tracker.total_prompt_tokens, 3000);
        assert_eq!(tracker.total_completion_tokens, 1500);
        assert!(tracker.estimated_cost_usd > 0.0);
    }

    #[test]
    fn record_usage_without_block_counts_call() {
        let mut tracker = CostTracker::new();
        tracker.record_usage(None, &ModelPricing::default());
        assert_eq!(tracker.calls, 1);
        assert_eq!(tracker.total_tokens(), 0);

        let usage = UsageInfo {
            prompt_tokens: Some(10),
            completion_tokens: None,
            total_tokens: None,
        };
        tracker.record_usage(Some(&usage), &ModelPricing::default());
        assert_eq!(tracker.total_prompt_tokens, 10);
    }

    #[test]
    fn merge_sums_fields() {
        let pricing = ModelPricing::default();
        let mut a = CostTracker::new();
        a.record(100, 50, &pricing);
        let mut b = CostTracker::new();
        b.record(200, 25, &pricing);
        a.merge(&b);
        assert_eq!(a.calls, 2);
        assert_eq!(a.total_tokens(), 375);
    }

    #[test]
    fn pricing_lookup_known_models() {
        assert!(pricing_for_model("anthropic/claude-opus-4").input_per_million > 10.0);
        assert!(pricing_for_model("openai/gpt-4o-mini").input_per_million < 1.0);
        assert!(pricing_for_model("my-org/custom-model").input_per_million > 0.0);
    }

    #[test]
    fn cost_summary_format() {
        let mut tracker = CostTracker::new();
        tracker.record(1000, 500, &ModelPricing::default());
        let summary = tracker.summary();
        assert!(summary.starts_with("1 call(s)"));
        assert!(summary.contains("cost:"));
    }
}
