//! Run one prompt over a set of questions.

use crate::Message;
use crate::llm::{RequestType, Responder};
use crate::template::QaPair;
use futures::future::join_all;
use tracing::{debug, warn};

/// Executes a candidate prompt against sample questions.
pub struct QuickExecute<'a> {
    llm: &'a dyn Responder,
    prompt: &'a str,
}

impl<'a> QuickExecute<'a> {
    pub fn new(llm: &'a dyn Responder, prompt: &'a str) -> Self {
        Self { llm, prompt }
    }

    /// The user message sent for `question`.
    pub fn message_for(&self, question: &str) -> String {
        format!("{}\n\n{}", self.prompt, question)
    }

    /// Answer every question concurrently.
    ///
    /// Output order matches `questions`. A failed call does not abort the
    /// batch: its error text is recorded as the answer.
    pub async fn run(&self, questions: &[QaPair]) -> Vec<QaPair> {
        let futures = questions.iter().map(|qa| async move {
            let messages = vec![Message::user(self.message_for(&qa.question))];
            let answer = match self.llm.respond(RequestType::Execute, messages).await {
                Ok(answer) => answer,
                Err(e) => {
                    warn!("Execution failed for question '{}': {e}", preview(&qa.question));
                    e
                }
            };
            QaPair::new(qa.question.clone(), answer)
        });

        let answers = join_all(futures).await;
        debug!("Collected {} answer(s)", answers.len());
        answers
    }
}

fn preview(text: &str) -> String {
    let short: String = text.chars().take(60).collect();
    if text.chars().count() > 60 {
        format!("{short}...")
    } else {
        short
    }
}
