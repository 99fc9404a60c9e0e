//! Round-numbered directories and their text artifacts.
//!
//! Directory layout:
//! ```text
//! prompts_dir/
//!   results.json
//!   round_1/
//!     prompt.txt
//!     answers.txt
//!   round_2/
//!     ...
//! ```

use crate::template::QaPair;
use std::path::{Path, PathBuf};
use tracing::debug;

const PROMPT_FILE: &str = "prompt.txt";
const ANSWERS_FILE: &str = "answers.txt";

/// Manager for the `prompts/` directory of one optimization project.
#[derive(Debug, Clone)]
pub struct PromptWorkspace {
    prompts_dir: PathBuf,
}

impl PromptWorkspace {
    /// Create a manager, ensuring the prompts directory exists.
    pub fn new(prompts_dir: impl Into<PathBuf>) -> Result<Self, String> {
        let prompts_dir = prompts_dir.into();
        std::fs::create_dir_all(&prompts_dir).map_err(|e| {
            format!(
                "failed to create prompts dir '{}': {e}",
                prompts_dir.display()
            )
        })?;
        Ok(Self { prompts_dir })
    }

    /// The prompts root.
    pub fn dir(&self) -> &Path {
        &self.prompts_dir
    }

    /// Path of a round's directory (not created).
    pub fn round_dir(&self, round: u32) -> PathBuf {
        self.prompts_dir.join(format!("round_{round}"))
    }

    /// Create a round's directory. Reusing an existing one is fine.
    pub fn create_round_directory(&self, round: u32) -> Result<PathBuf, String> {
        let dir = self.round_dir(round);
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("failed to create round dir '{}': {e}", dir.display()))?;
        Ok(dir)
    }

    /// Write `prompt.txt` into `dir`.
    pub fn write_prompt(&self, dir: &Path, prompt: &str) -> Result<(), String> {
        let path = dir.join(PROMPT_FILE);
        std::fs::write(&path, prompt)
            .map_err(|e| format!("failed to write '{}': {e}", path.display()))?;
        debug!("Wrote {} ({} chars)", path.display(), prompt.chars().count());
        Ok(())
    }

    /// Write `answers.txt` into `dir`.
    pub fn write_answers(&self, dir: &Path, answers: &[QaPair]) -> Result<(), String> {
        let path = dir.join(ANSWERS_FILE);
        std::fs::write(&path, render_answers(answers))
            .map_err(|e| format!("failed to write '{}': {e}", path.display()))?;
        debug!("Wrote {} ({} answer(s))", path.display(), answers.len());
        Ok(())
    }

    /// Read a round's `prompt.txt`.
    pub fn load_prompt(&self, round: u32) -> Result<String, String> {
        let path = self.round_dir(round).join(PROMPT_FILE);
        std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read prompt for round {round} at '{}': {e}", path.display()))
    }

    /// Rounds that have a directory on disk, ascending.
    pub fn existing_rounds(&self) -> Result<Vec<u32>, String> {
        let entries = std::fs::read_dir(&self.prompts_dir).map_err(|e| {
            format!(
                "failed to read prompts dir '{}': {e}",
                self.prompts_dir.display()
            )
        })?;

        let mut rounds = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("failed to read entry: {e}"))?;
            if !entry.file_type().is_ok_and(|ft| ft.is_dir()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(round) = name
                .strip_prefix("round_")
                .and_then(|s| s.parse::<u32>().ok())
            {
                rounds.push(round);
            }
        }
        rounds.sort_unstable();
        Ok(rounds)
    }
}

/// `answers.txt` body: one `Question:` / `Answer:` block per pair.
pub fn render_answers(answers: &[QaPair]) -> String {
    let mut out = String::new();
    for qa in answers {
        out.push_str(&format!(
            "Question:\n{}\nAnswer:\n{}\n\n",
            qa.question, qa.answer
        ));
    }
    out
}
