//! Iteration templates: the task being optimized.
//!
//! A template is a small YAML file:
//!
//! ```yaml
//! prompt: |
//!   Write a poem about the given topic.
//! requirements: |
//!   Vivid imagery, no clichés.
//! count: 120          # optional target word count
//! faq:
//!   - question: Write a poem about the sea.
//!     answer: ""      # answers are optional style references
//! ```
//!
//! The FAQ questions drive execution; the answers (when present) are shown
//! to the optimizer and the judge as "golden" references, never as labels.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Number of FAQ pairs sampled per execution / judgment.
pub const DEFAULT_SAMPLE_SIZE: usize = 3;

/// A question with an optional reference answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaPair {
    pub question: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub answer: String,
}

impl QaPair {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// The task definition loaded from a template file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IterationTemplate {
    /// Starting prompt. May be empty.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub prompt: String,
    /// What a good answer must satisfy.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub requirements: String,
    /// Target word count for the optimized prompt.
    #[serde(default, deserialize_with = "lenient_count")]
    pub count: Option<u32>,
    #[serde(default)]
    pub faq: Vec<QaPair>,
}

fn null_as_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Accepts `120`, `"120"`, `null`, `""`, or `None` for the word count.
fn lenient_count<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CountField {
        Number(u32),
        Text(String),
    }

    match Option::<CountField>::deserialize(d)? {
        None => Ok(None),
        Some(CountField::Number(n)) => Ok(Some(n)),
        Some(CountField::Text(s)) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("none") || s.eq_ignore_ascii_case("null") {
                Ok(None)
            } else {
                s.parse::<u32>()
                    .map(Some)
                    .map_err(|_| serde::de::Error::custom(format!("invalid word count '{s}'")))
            }
        }
    }
}

impl IterationTemplate {
    /// Parse a template from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse template: {e}"))
    }

    /// Load a template file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read template '{}': {e}", path.display()))?;
        let template: Self = serde_yaml::from_str(&text)
            .map_err(|e| format!("failed to parse template '{}': {e}", path.display()))?;

        if template.faq.is_empty() {
            warn!(
                "Template '{}' has no FAQ entries; executions will produce no answers",
                path.display()
            );
        }
        debug!(
            "Loaded template '{}' ({} FAQ pair(s), count={:?})",
            path.display(),
            template.faq.len(),
            template.count
        );
        Ok(template)
    }

    /// Resolve a template name to a path.
    ///
    /// Names containing a path separator, or that exist as given, are used
    /// as-is. Bare names are looked up in `settings_dir`, with `.yaml`
    /// appended when no extension is present.
    pub fn resolve_path(settings_dir: &Path, name: &str) -> PathBuf {
        let as_given = PathBuf::from(name);
        if as_given.components().count() > 1 || as_given.exists() {
            return as_given;
        }
        let mut path = settings_dir.join(name);
        if path.extension().is_none() {
            path.set_extension("yaml");
        }
        path
    }

    /// Sample up to `k` distinct FAQ pairs.
    pub fn sample_qa<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Vec<QaPair> {
        self.faq
            .choose_multiple(rng, k.min(self.faq.len()))
            .cloned()
            .collect()
    }

    /// Suffix appended to the optimizer's `<prompt>` instruction.
    pub fn count_clause(&self) -> String {
        match self.count {
            Some(n) => format!(", within {n} words"),
            None => String::new(),
        }
    }
}
