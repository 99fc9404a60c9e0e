//! Role-based model routing.
//!
//! Every LLM call made by the optimizer belongs to one of three roles
//! ([`RequestType`]). Each role has its own [`ModelSettings`], so a strong
//! model can rewrite prompts while a cheap one answers questions and judges.
//!
//! The [`Responder`] trait is the seam between the optimization loop and the
//! network: [`SpoLlm`] implements it over [`ChatClient`], tests implement it
//! with scripted replies.

use crate::api::retry::{RetryConfig, retry_api_call};
use crate::api::tracing::{CostTracker, pricing_for_model};
use crate::{ChatClient, ChatCompletion, ChatRequest, DEFAULT_MAX_TOKENS, Message};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tracing::debug;

/// Boxed future returned by [`Responder::respond`].
pub type LlmFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// The role an LLM call plays in a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    /// Rewrite the current best prompt.
    Optimize,
    /// Judge two answer sets against each other.
    Evaluate,
    /// Answer a sample question with a candidate prompt.
    Execute,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Optimize => "optimize",
            RequestType::Evaluate => "evaluate",
            RequestType::Execute => "execute",
        }
    }
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model, temperature, and output limit for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model: String,
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

impl ModelSettings {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Model settings for all three roles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleModels {
    pub optimize: ModelSettings,
    pub evaluate: ModelSettings,
    pub execute: ModelSettings,
}

impl Default for RoleModels {
    fn default() -> Self {
        Self {
            optimize: ModelSettings::new("anthropic/claude-3.5-sonnet", 0.7),
            evaluate: ModelSettings::new(crate::DEFAULT_MODEL, 0.3),
            execute: ModelSettings::new(crate::DEFAULT_MODEL, 0.0),
        }
    }
}

impl RoleModels {
    /// Use one model for every role, keeping the per-role temperatures.
    pub fn single(model: impl Into<String>) -> Self {
        let model = model.into();
        let defaults = Self::default();
        Self {
            optimize: ModelSettings::new(model.clone(), defaults.optimize.temperature),
            evaluate: ModelSettings::new(model.clone(), defaults.evaluate.temperature),
            execute: ModelSettings::new(model, defaults.execute.temperature),
        }
    }

    pub fn for_request(&self, request: RequestType) -> &ModelSettings {
        match request {
            RequestType::Optimize => &self.optimize,
            RequestType::Evaluate => &self.evaluate,
            RequestType::Execute => &self.execute,
        }
    }
}

/// Token usage and estimated spend, split by role. Serialized as `cost.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostReport {
    pub optimize: CostTracker,
    pub evaluate: CostTracker,
    pub execute: CostTracker,
}

impl CostReport {
    pub fn tracker_mut(&mut self, request: RequestType) -> &mut CostTracker {
        match request {
            RequestType::Optimize => &mut self.optimize,
            RequestType::Evaluate => &mut self.evaluate,
            RequestType::Execute => &mut self.execute,
        }
    }

    /// All roles combined.
    pub fn total(&self) -> CostTracker {
        let mut total = self.optimize.clone();
        total.merge(&self.evaluate);
        total.merge(&self.execute);
        total
    }
}

/// Something that can answer a role-tagged chat request.
///
/// Errors are plain strings, like every other fallible call in this crate.
/// An empty reply must be reported as an error, not as `Ok("")`.
pub trait Responder: Send + Sync {
    /// Send `messages` using the model configured for `request`.
    fn respond(&self, request: RequestType, messages: Vec<Message>) -> LlmFuture<'_>;

    /// Usage accumulated so far. Responders that don't track cost return zeros.
    fn cost_report(&self) -> CostReport {
        CostReport::default()
    }
}

/// [`Responder`] backed by an OpenAI-compatible [`ChatClient`].
///
/// Individual models can be pointed at a different endpoint with
/// [`with_model_client`](SpoLlm::with_model_client); everything else goes
/// through the default client.
pub struct SpoLlm {
    client: ChatClient,
    model_clients: HashMap<String, ChatClient>,
    models: RoleModels,
    retry: RetryConfig,
    costs: Mutex<CostReport>,
}

impl SpoLlm {
    pub fn new(client: ChatClient, models: RoleModels) -> Self {
        Self {
            client,
            model_clients: HashMap::new(),
            models,
            retry: RetryConfig::default(),
            costs: Mutex::new(CostReport::default()),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Route requests for `model` through `client`.
    pub fn with_model_client(mut self, model: impl Into<String>, client: ChatClient) -> Self {
        self.model_clients.insert(model.into(), client);
        self
    }

    pub fn models(&self) -> &RoleModels {
        &self.models
    }

    fn client_for(&self, model: &str) -> &ChatClient {
        self.model_clients.get(model).unwrap_or(&self.client)
    }

    /// Send one request for `request`'s role and return the reply text.
    pub async fn complete(
        &self,
        request: RequestType,
        messages: Vec<Message>,
    ) -> Result<String, String> {
        let settings = self.models.for_request(request);
        let client = self.client_for(&settings.model);
        let body = ChatRequest {
            model: settings.model.clone(),
            messages,
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            ..Default::default()
        };

        let completion = retry_api_call(&self.retry, request.as_str(), || client.chat(&body)).await?;

        {
            let pricing = pricing_for_model(&settings.model);
            let mut costs = self.costs.lock().unwrap_or_else(|e| e.into_inner());
            costs
                .tracker_mut(request)
                .record_usage(completion.usage.as_ref(), &pricing);
        }

        completion_text(completion, request)
    }
}

/// Reply text of a completion. Missing or blank content is an error.
fn completion_text(completion: ChatCompletion, request: RequestType) -> Result<String, String> {
    let content = completion.content.unwrap_or_default();
    if content.trim().is_empty() {
        return Err(format!("empty LLM response ({request})"));
    }
    debug!("{request} reply: {} chars", content.chars().count());
    Ok(content)
}

impl Responder for SpoLlm {
    fn respond(&self, request: RequestType, messages: Vec<Message>) -> LlmFuture<'_> {
        Box::pin(self.complete(request, messages))
    }

    fn cost_report(&self) -> CostReport {
        self.costs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
