//! Configuration for an optimization run and for the LLM endpoints.
//!
//! [`SpoConfig`] covers the loop itself: where artifacts go, which template
//! to optimize, how many rounds, and which model plays each role. Build it
//! with [`SpoConfig::default()`] and the `with_*` methods.
//!
//! [`LlmConfig`] covers endpoints and credentials. It is read from a small
//! YAML file, with environment variables as fallback:
//!
//! ```yaml
//! base_url: https://openrouter.ai/api/v1
//! api_key: sk-...
//! models:
//!   gpt-4o-mini:
//!     base_url: https://api.openai.com/v1
//!     api_key: sk-...
//! ```

use crate::api::retry::RetryConfig;
use crate::llm::{ModelSettings, RoleModels, SpoLlm};
use crate::template::{DEFAULT_SAMPLE_SIZE, IterationTemplate};
use crate::{ChatClient, DEFAULT_BASE_URL};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["SPO_API_KEY", "OPENROUTER_KEY"];

/// Environment variable overriding the default endpoint.
pub const BASE_URL_ENV_VAR: &str = "SPO_BASE_URL";

// ── SpoConfig ─────────────────────────────────────────────────────

/// Settings for one optimization project.
#[derive(Debug, Clone)]
pub struct SpoConfig {
    /// Root under which each project gets a directory. Default: `"workspace"`.
    pub workspace: PathBuf,
    /// Project name; artifacts land in `workspace/<name>/prompts`. Default: `"Poem"`.
    pub name: String,
    /// Template file name or path. Default: `"Poem.yaml"`.
    pub template: String,
    /// Directory searched for bare template names. Default: `"settings"`.
    pub settings_dir: PathBuf,
    /// First round to run. Default: `1`.
    pub initial_round: u32,
    /// Number of rounds to run. Default: `10`.
    pub max_rounds: u32,
    /// `false` runs the template prompt once without optimizing. Default: `true`.
    pub iterate: bool,
    /// FAQ pairs sampled per execution and judgment. Default: `3`.
    pub sample_size: usize,
    /// Seed for sampling and judge position swaps. `None` seeds from entropy.
    pub seed: Option<u64>,
    /// Retry policy for every LLM call.
    pub retry: RetryConfig,
    /// Model settings per role.
    pub models: RoleModels,
}

impl Default for SpoConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("workspace"),
            name: "Poem".to_string(),
            template: "Poem.yaml".to_string(),
            settings_dir: PathBuf::from("settings"),
            initial_round: 1,
            max_rounds: 10,
            iterate: true,
            sample_size: DEFAULT_SAMPLE_SIZE,
            seed: None,
            retry: RetryConfig::default(),
            models: RoleModels::default(),
        }
    }
}

impl SpoConfig {
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_settings_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.settings_dir = dir.into();
        self
    }

    pub fn with_initial_round(mut self, round: u32) -> Self {
        self.initial_round = round.max(1);
        self
    }

    pub fn with_max_rounds(mut self, rounds: u32) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_iterate(mut self, iterate: bool) -> Self {
        self.iterate = iterate;
        self
    }

    pub fn with_sample_size(mut self, k: usize) -> Self {
        self.sample_size = k;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry = RetryConfig::with_retries(retries);
        self
    }

    pub fn with_models(mut self, models: RoleModels) -> Self {
        self.models = models;
        self
    }

    pub fn with_optimize_model(mut self, settings: ModelSettings) -> Self {
        self.models.optimize = settings;
        self
    }

    pub fn with_evaluate_model(mut self, settings: ModelSettings) -> Self {
        self.models.evaluate = settings;
        self
    }

    pub fn with_execute_model(mut self, settings: ModelSettings) -> Self {
        self.models.execute = settings;
        self
    }

    /// `workspace/<name>`.
    pub fn root_path(&self) -> PathBuf {
        self.workspace.join(&self.name)
    }

    /// `workspace/<name>/prompts`.
    pub fn prompts_path(&self) -> PathBuf {
        self.root_path().join("prompts")
    }

    /// Resolved template file path.
    pub fn template_path(&self) -> PathBuf {
        IterationTemplate::resolve_path(&self.settings_dir, &self.template)
    }

    /// Check invariants that would otherwise surface mid-run.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("project name must not be empty".to_string());
        }
        if self.initial_round == 0 {
            return Err("initial round must be at least 1".to_string());
        }
        if self.initial_round.checked_add(self.max_rounds).is_none() {
            return Err(format!(
                "initial round {} plus {} round(s) overflows the round counter",
                self.initial_round, self.max_rounds
            ));
        }
        if self.sample_size == 0 {
            return Err("sample size must be at least 1".to_string());
        }
        for (role, settings) in [
            ("optimize", &self.models.optimize),
            ("evaluate", &self.models.evaluate),
            ("execute", &self.models.execute),
        ] {
            if settings.model.trim().is_empty() {
                return Err(format!("{role} model must not be empty"));
            }
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(format!(
                    "{role} temperature {} is outside 0.0-2.0",
                    settings.temperature
                ));
            }
        }
        Ok(())
    }
}

// ── LlmConfig ─────────────────────────────────────────────────────

/// Endpoint override for one model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

/// Endpoints and credentials.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Per-model endpoint overrides, keyed by model name.
    #[serde(default)]
    pub models: HashMap<String, EndpointConfig>,
}

impl LlmConfig {
    /// Parse from YAML text.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse LLM config: {e}"))
    }

    /// Load from a YAML file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read LLM config '{}': {e}", path.display()))?;
        let config: Self = serde_yaml::from_str(&text)
            .map_err(|e| format!("failed to parse LLM config '{}': {e}", path.display()))?;
        debug!(
            "Loaded LLM config '{}' ({} model override(s))",
            path.display(),
            config.models.len()
        );
        Ok(config)
    }

    /// Fill unset fields from the process environment.
    pub fn with_env_fallback(self) -> Self {
        self.with_fallback_from(|key| std::env::var(key).ok())
    }

    /// Fill unset fields using `lookup` (an environment-like source).
    pub fn with_fallback_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.api_key.is_none() {
            self.api_key = API_KEY_ENV_VARS
                .iter()
                .find_map(|var| lookup(var).filter(|v| !v.trim().is_empty()));
        }
        if self.base_url.is_none() {
            self.base_url = lookup(BASE_URL_ENV_VAR).filter(|v| !v.trim().is_empty());
        }
        self
    }

    /// The default endpoint.
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    /// Build an [`SpoLlm`] for `models`, wiring per-model endpoint overrides.
    pub fn build_llm(&self, models: RoleModels, retry: RetryConfig) -> Result<SpoLlm, String> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            format!(
                "no API key: set api_key in the LLM config or one of {}",
                API_KEY_ENV_VARS.join(", ")
            )
        })?;

        let client = ChatClient::with_base_url(api_key.clone(), self.base_url())?;
        let mut llm = SpoLlm::new(client, models).with_retry(retry);

        for (model, endpoint) in &self.models {
            let key = endpoint.api_key.clone().unwrap_or_else(|| api_key.clone());
            let url = endpoint.base_url.as_deref().unwrap_or(self.base_url());
            llm = llm.with_model_client(model.clone(), ChatClient::with_base_url(key, url)?);
        }
        Ok(llm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SpoConfig::default();
        assert_eq!(config.initial_round, 1);
        assert_eq!(config.max_rounds, 10);
        assert_eq!(config.sample_size, 3);
        assert!(config.iterate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn paths_derive_from_workspace_and_name() {
        let config = SpoConfig::default()
            .with_workspace("/tmp/ws")
            .with_name("Summary")
            .with_settings_dir("/etc/spo")
            .with_template("Summary");
        assert_eq!(config.prompts_path(), PathBuf::from("/tmp/ws/Summary/prompts"));
        assert_eq!(config.template_path(), PathBuf::from("/etc/spo/Summary.yaml"));
    }

    #[test]
    fn initial_round_clamped_to_one() {
        assert_eq!(SpoConfig::default().with_initial_round(0).initial_round, 1);
    }

    #[test]
    fn validate_rejects_bad_settings() {
        assert!(SpoConfig::default().with_name(" ").validate().is_err());
        assert!(SpoConfig::default().with_sample_size(0).validate().is_err());
        let err = SpoConfig::default()
            .with_initial_round(u32::MAX)
            .with_max_rounds(1)
            .validate()
            .unwrap_err();
        assert!(err.contains("overflows"));
        assert!(SpoConfig::default()
            .with_initial_round(u32::MAX - 10)
            .with_max_rounds(10)
            .validate()
            .is_ok());
        let err = SpoConfig::default()
            .with_execute_model(ModelSettings::new("m", 3.5))
            .validate()
            .unwrap_err();
        assert!(err.contains("execute temperature"));
        assert!(SpoConfig::default()
            .with_optimize_model(ModelSettings::new("", 0.7))
            .validate()
            .is_err());
    }

    #[test]
    fn llm_config_parses_model_overrides() {
        let config = LlmConfig::from_yaml_str(
            "base_url: https://api.example.com/v1\napi_key: k\nmodels:\n  judge:\n    base_url: https://judge.example.com/v1\n",
        )
        .unwrap();
        assert_eq!(config.base_url(), "https://api.example.com/v1");
        assert_eq!(
            config.models["judge"].base_url.as_deref(),
            Some("https://judge.example.com/v1")
        );
        assert!(config.models["judge"].api_key.is_none());
    }

    #[test]
    fn fallback_prefers_first_env_var() {
        let config = LlmConfig::default().with_fallback_from(|key| match key {
            "SPO_API_KEY" => Some("spo".into()),
            "OPENROUTER_KEY" => Some("router".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("spo"));
        assert_eq!(config.base_url(), DEFAULT_BASE_URL);

        let config = LlmConfig::default().with_fallback_from(|key| match key {
            "SPO_API_KEY" => Some("  ".into()),
            "OPENROUTER_KEY" => Some("router".into()),
            "SPO_BASE_URL" => Some("http://localhost:8000/v1".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("router"));
        assert_eq!(config.base_url(), "http://localhost:8000/v1");
    }

    #[test]
    fn file_values_win_over_fallback() {
        let config = LlmConfig {
            api_key: Some("file".into()),
            ..Default::default()
        }
        .with_fallback_from(|_| Some("env".into()));
        assert_eq!(config.api_key.as_deref(), Some("file"));
    }

    #[test]
    fn build_llm_requires_key() {
        let err = LlmConfig::default()
            .build_llm(RoleModels::default(), RetryConfig::none())
            .err()
            .unwrap();
        assert!(err.contains("SPO_API_KEY"));

        let llm = LlmConfig {
            api_key: Some("k".into()),
            ..Default::default()
        }
        .build_llm(RoleModels::single("m"), RetryConfig::none())
        .unwrap();
        assert_eq!(llm.models().execute.model, "m");
    }

    #[test]
    fn load_missing_file_names_path() {
        let err = LlmConfig::load(Path::new("/definitely/missing.yaml")).unwrap_err();
        assert!(err.contains("missing.yaml"));
    }
}
