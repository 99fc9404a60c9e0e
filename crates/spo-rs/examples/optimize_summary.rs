//! Optimize the summarization template in `settings/Summary.yaml`.
//!
//! Runs five rounds with a single model for every role and prints each
//! judgment as it happens.
//!
//! # Usage
//!
//! ```bash
//! SPO_API_KEY=sk-... cargo run --example optimize_summary
//! ```

use spo_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<(), String> {
    let config = SpoConfig::default()
        .with_name("Summary")
        .with_template("Summary.yaml")
        .with_models(RoleModels::single("openai/gpt-4o-mini"))
        .with_max_rounds(5);

    let llm = LlmConfig::default()
        .with_env_fallback()
        .build_llm(config.models.clone(), config.retry.clone())?;

    let printer = FnEventHandler::new(|event| match event {
        OptimizerEvent::Modification {
            round,
            modification,
        } => println!("[round {round}] {modification}"),
        OptimizerEvent::Judged {
            round,
            best_round,
            verdict,
        } => println!(
            "[round {round}] vs round {best_round}: {}/{} votes",
            verdict.votes_for,
            verdict.votes_for + verdict.votes_against
        ),
        _ => {}
    });

    let summary = PromptOptimizer::new(&llm, config)?
        .with_event_handler(&printer)
        .optimize()
        .await?;

    println!("\n{}", summary.best_prompt);
    println!("\n--- {} ---", summary.costs.total().summary());
    Ok(())
}
