//! Pairwise LLM judge.
//!
//! The judge never sees which answer set is the incumbent. Each of the
//! [`EVALUATION_REPETITION`] calls randomly decides whether the candidate is
//! shown as `A` or `B`, which cancels the judge's position bias on average.
//! A candidate replaces the incumbent only with a strict majority of votes.

use crate::Message;
use crate::llm::{RequestType, Responder};
use crate::prompts::{answers_for_judge, evaluate_prompt, extract_tag};
use crate::template::QaPair;
use futures::future::join_all;
use rand::Rng;
use tracing::{debug, info, warn};

/// Judge calls per comparison.
pub const EVALUATION_REPETITION: usize = 4;

/// Which position the judge preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    A,
    B,
}

/// Parse the `<choose>` tag of a judge reply.
///
/// Accepts `A`, `b`, `"B"`, or `B (clearer)`; anything else is `None`.
pub fn parse_choice(reply: &str) -> Option<Choice> {
    let raw = extract_tag(reply, "choose")?;
    let cleaned = raw.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'' || c == '*');
    let mut chars = cleaned.chars();
    let first = chars.next()?;
    if chars.next().is_some_and(|c| c.is_alphanumeric()) {
        return None;
    }
    match first.to_ascii_uppercase() {
        'A' => Some(Choice::A),
        'B' => Some(Choice::B),
        _ => None,
    }
}

/// Aggregate outcome of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Verdict {
    /// Whether the candidate won a strict majority.
    pub succeed: bool,
    pub votes_for: usize,
    /// Includes failed or unparsable judge calls.
    pub votes_against: usize,
    /// Judge calls that errored or returned no usable choice.
    pub invalid: usize,
}

impl Verdict {
    fn from_votes(votes: &[Option<bool>]) -> Self {
        let votes_for = votes.iter().filter(|v| **v == Some(true)).count();
        let invalid = votes.iter().filter(|v| v.is_none()).count();
        let votes_against = votes.len() - votes_for;
        Self {
            succeed: votes_for > votes_against,
            votes_for,
            votes_against,
            invalid,
        }
    }
}

/// Compares a candidate answer set against the incumbent.
pub struct QuickEvaluate<'a> {
    llm: &'a dyn Responder,
    repetitions: usize,
}

impl<'a> QuickEvaluate<'a> {
    pub fn new(llm: &'a dyn Responder) -> Self {
        Self {
            llm,
            repetitions: EVALUATION_REPETITION,
        }
    }

    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions.max(1);
        self
    }

    /// Run the judge `repetitions` times concurrently and tally the votes.
    ///
    /// `golden` are the template's reference pairs (may have empty answers).
    pub async fn compare<R: Rng + ?Sized>(
        &self,
        incumbent: &[QaPair],
        candidate: &[QaPair],
        requirement: &str,
        golden: &[QaPair],
        rng: &mut R,
    ) -> Verdict {
        let incumbent_text = answers_for_judge(incumbent);
        let candidate_text = answers_for_judge(candidate);
        let golden_text = answers_for_judge(golden);

        // Decide every swap before spawning so the RNG is not shared across calls.
        let swaps: Vec<bool> = (0..self.repetitions).map(|_| rng.gen_bool(0.5)).collect();

        let calls = swaps.iter().enumerate().map(|(i, &swapped)| {
            let (a, b) = if swapped {
                (&candidate_text, &incumbent_text)
            } else {
                (&incumbent_text, &candidate_text)
            };
            let message = evaluate_prompt(requirement, a, b, &golden_text);
            async move {
                let reply = match self
                    .llm
                    .respond(RequestType::Evaluate, vec![Message::user(message)])
                    .await
                {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!("Judge call {} failed: {e}", i + 1);
                        return None;
                    }
                };
                let Some(choice) = parse_choice(&reply) else {
                    warn!("Judge call {} returned no usable <choose> tag", i + 1);
                    return None;
                };
                let candidate_position = if swapped { Choice::A } else { Choice::B };
                debug!(
                    "Judge call {}: chose {choice:?} (candidate shown as {candidate_position:?})",
                    i + 1
                );
                Some(choice == candidate_position)
            }
        });

        let votes = join_all(calls).await;
        let verdict = Verdict::from_votes(&votes);
        info!(
            "Judge votes: {} for, {} against ({} invalid)",
            verdict.votes_for, verdict.votes_against, verdict.invalid
        );
        verdict
    }
}
