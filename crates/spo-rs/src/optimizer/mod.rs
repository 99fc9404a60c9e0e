//! The optimization loop.
//!
//! Each round produces one candidate prompt:
//!
//! 1. The first round (or any round with no successful predecessor in the
//!    ledger) adopts the template prompt as the baseline. It is executed and
//!    recorded as succeeded without judging.
//! 2. Later rounds ask the optimize model to rewrite the best prompt so far,
//!    given its answers, the requirements, and a few golden answers. The
//!    rewrite is executed on freshly sampled questions and judged pairwise
//!    against the best round's answers.
//!
//! Every round is appended to `results.json`, so a run can be resumed from
//! any round with [`SpoConfig::with_initial_round`].

pub mod events;

pub use events::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler,
    OptimizerEvent,
};

use crate::Message;
use crate::config::SpoConfig;
use crate::evaluate::{QuickEvaluate, Verdict};
use crate::execute::QuickExecute;
use crate::ledger::{ResultsLedger, RoundRecord, save_cost};
use crate::llm::{CostReport, RequestType, Responder};
use crate::prompts::{extract_tag, optimize_prompt, qa_to_markdown};
use crate::template::IterationTemplate;
use crate::workspace::PromptWorkspace;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::Path;
use tracing::{debug, info, warn};

/// Result of [`PromptOptimizer::optimize`] or [`PromptOptimizer::test_prompt`].
#[derive(Debug, Clone)]
pub struct OptimizationSummary {
    /// Highest succeeded round in the ledger, if any.
    pub best_round: Option<u32>,
    /// Prompt of `best_round` (empty when there is none).
    pub best_prompt: String,
    /// Rounds executed by this call.
    pub rounds_run: u32,
    pub costs: CostReport,
}

/// Drives rounds of rewrite, execute, and judge.
pub struct PromptOptimizer<'a> {
    llm: &'a dyn Responder,
    handler: &'a dyn EventHandler,
    config: SpoConfig,
    template: IterationTemplate,
    workspace: PromptWorkspace,
    ledger: ResultsLedger,
    rng: StdRng,
    round: u32,
}

impl<'a> PromptOptimizer<'a> {
    /// Validate `config`, load its template, and open the project's prompts
    /// directory.
    pub fn new(llm: &'a dyn Responder, config: SpoConfig) -> Result<Self, String> {
        config.validate()?;
        let template = IterationTemplate::load(&config.template_path())?;
        Self::with_template(llm, config, template)
    }

    /// Like [`new`](Self::new) with an already loaded template.
    pub fn with_template(
        llm: &'a dyn Responder,
        config: SpoConfig,
        template: IterationTemplate,
    ) -> Result<Self, String> {
        let workspace = PromptWorkspace::new(config.prompts_path())?;
        let ledger = ResultsLedger::load(workspace.dir())?;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        if ledger.is_empty() {
            info!("Project '{}': starting fresh in {}", config.name, workspace.dir().display());
        } else {
            info!(
                "Project '{}': {} prior round record(s) in {}",
                config.name,
                ledger.records().len(),
                ledger.path().display()
            );
        }
        let on_disk = workspace.existing_rounds()?;
        if !on_disk.is_empty() {
            debug!("Existing round directories: {on_disk:?}");
        }
        if let Some(previous) = ledger.record_for(config.initial_round) {
            warn!(
                "Round {} already recorded (succeed={}); its directory will be reused and a new record appended",
                previous.round, previous.succeed
            );
        }
        Ok(Self {
            llm,
            handler: &NoopHandler,
            round: config.initial_round,
            config,
            template,
            workspace,
            ledger,
            rng,
        })
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.handler = handler;
        self
    }

    /// The next round to run.
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn ledger(&self) -> &ResultsLedger {
        &self.ledger
    }

    pub fn workspace(&self) -> &PromptWorkspace {
        &self.workspace
    }

    /// Run `max_rounds` rounds starting at the current round.
    ///
    /// With `iterate = false` this is [`test_prompt`](Self::test_prompt).
    pub async fn optimize(&mut self) -> Result<OptimizationSummary, String> {
        if !self.config.iterate {
            return self.test_prompt().await;
        }

        // The counter must still hold the round after the last one run.
        if self.round.checked_add(self.config.max_rounds).is_none() {
            return Err(format!(
                "round counter overflow: cannot run {} round(s) from round {}",
                self.config.max_rounds, self.round
            ));
        }
        let last_round = self.round + self.config.max_rounds.saturating_sub(1);
        let mut rounds_run = 0;
        for _ in 0..self.config.max_rounds {
            self.handler.on_event(&OptimizerEvent::RoundStart {
                round: self.round,
                last_round,
            });
            self.run_round().await?;
            self.save_costs()?;
            self.round += 1;
            rounds_run += 1;
        }
        Ok(self.finish(rounds_run))
    }

    /// Execute the template prompt once in the current round and record it
    /// as succeeded. No rewrite, no judging.
    pub async fn test_prompt(&mut self) -> Result<OptimizationSummary, String> {
        self.handler.on_event(&OptimizerEvent::RoundStart {
            round: self.round,
            last_round: self.round,
        });
        self.baseline_round().await?;
        self.save_costs()?;
        Ok(self.finish(1))
    }

    async fn run_round(&mut self) -> Result<(), String> {
        if self.round == 1 || self.ledger.best_round().is_none() {
            self.baseline_round().await
        } else {
            self.optimized_round().await
        }
    }

    async fn baseline_round(&mut self) -> Result<(), String> {
        let round = self.round;
        let prompt = self.template.prompt.clone();
        let dir = self.workspace.create_round_directory(round)?;
        self.workspace.write_prompt(&dir, &prompt)?;
        self.handler.on_event(&OptimizerEvent::PromptGenerated {
            round,
            prompt: &prompt,
        });

        let questions = self
            .template
            .sample_qa(self.config.sample_size, &mut self.rng);
        let answers = QuickExecute::new(self.llm, &prompt).run(&questions).await;
        self.handler.on_event(&OptimizerEvent::AnswersCollected {
            round,
            answers: &answers,
        });

        info!("Round {round}: baseline recorded");
        self.record(&dir, RoundRecord::new(round, answers, prompt, true))
    }

    async fn optimized_round(&mut self) -> Result<(), String> {
        let round = self.round;
        let best = self
            .ledger
            .best_round()
            .cloned()
            .ok_or_else(|| format!("round {round}: no successful round to optimize from"))?;
        debug!("Round {round}: optimizing from round {}", best.round);

        let prompt = self.generate_optimized_prompt(&best).await?;
        let dir = self.workspace.create_round_directory(round)?;
        self.workspace.write_prompt(&dir, &prompt)?;
        self.handler.on_event(&OptimizerEvent::PromptGenerated {
            round,
            prompt: &prompt,
        });

        let questions = self
            .template
            .sample_qa(self.config.sample_size, &mut self.rng);
        let answers = QuickExecute::new(self.llm, &prompt).run(&questions).await;
        self.handler.on_event(&OptimizerEvent::AnswersCollected {
            round,
            answers: &answers,
        });

        let verdict: Verdict = QuickEvaluate::new(self.llm)
            .compare(
                &best.answers,
                &answers,
                &self.template.requirements,
                &questions,
                &mut self.rng,
            )
            .await;
        self.handler.on_event(&OptimizerEvent::Judged {
            round,
            best_round: best.round,
            verdict: &verdict,
        });

        self.record(
            &dir,
            RoundRecord::new(round, answers, prompt, verdict.succeed),
        )
    }

    /// Ask the optimize model for a rewrite of `best.prompt`.
    ///
    /// A response without a `<prompt>` tag yields an empty prompt.
    async fn generate_optimized_prompt(&mut self, best: &RoundRecord) -> Result<String, String> {
        let round = self.round;
        let golden = self
            .template
            .sample_qa(self.config.sample_size, &mut self.rng);
        let message = optimize_prompt(
            &self.template.requirements,
            &best.prompt,
            &qa_to_markdown(&best.answers),
            &qa_to_markdown(&golden),
            &self.template.count_clause(),
        );

        let response = self
            .llm
            .respond(RequestType::Optimize, vec![Message::user(message)])
            .await
            .map_err(|e| format!("round {round}: optimize call failed: {e}"))?;

        let modification = extract_tag(&response, "modification").unwrap_or_default();
        self.handler.on_event(&OptimizerEvent::Modification {
            round,
            modification: &modification,
        });

        match extract_tag(&response, "prompt") {
            Some(prompt) => Ok(prompt),
            None => {
                warn!("Round {round}: optimizer response had no <prompt> tag; using an empty prompt");
                Ok(String::new())
            }
        }
    }

    fn record(&mut self, dir: &Path, record: RoundRecord) -> Result<(), String> {
        let (round, succeed) = (record.round, record.succeed);
        self.workspace.write_answers(dir, &record.answers)?;
        self.ledger.append(record);
        self.ledger.save()?;
        self.handler
            .on_event(&OptimizerEvent::RoundFinished { round, succeed });
        Ok(())
    }

    fn save_costs(&self) -> Result<(), String> {
        save_cost(self.workspace.dir(), &self.llm.cost_report())
    }

    fn finish(&self, rounds_run: u32) -> OptimizationSummary {
        let best = self.ledger.best_round();
        let best_round = best.map(|r| r.round);
        let best_prompt = best.map(|r| r.prompt.clone()).unwrap_or_default();
        self.handler.on_event(&OptimizerEvent::Finished {
            best_round,
            best_prompt: &best_prompt,
        });
        OptimizationSummary {
            best_round,
            best_prompt,
            rounds_run,
            costs: self.llm.cost_report(),
        }
    }
}
