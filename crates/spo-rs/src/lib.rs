//! Self-supervised prompt optimization (SPO) for LLM tasks.
//!
//! `spo-rs` iteratively rewrites a natural-language prompt, runs each
//! candidate against a handful of sample questions, and asks a second LLM to
//! judge whether the new answers beat the best answers seen so far. No
//! ground-truth labels are needed: the template's example answers are only a
//! style reference, and pairwise judgments drive the search.
//!
//! Three LLM roles take part in every round, each with its own model and
//! temperature (see [`llm::RequestType`]):
//!
//! - **optimize** rewrites the current best prompt,
//! - **execute** answers the sample questions with a candidate prompt,
//! - **evaluate** is the judge comparing two answer sets.
//!
//! # Getting started
//!
//! ```ignore
//! use spo_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let config = SpoConfig::default()
//!         .with_template("settings/Poem.yaml")
//!         .with_max_rounds(10);
//!
//!     let client = ChatClient::new(std::env::var("SPO_API_KEY").unwrap())?;
//!     let llm = SpoLlm::new(client, config.models.clone());
//!
//!     let summary = PromptOptimizer::new(&llm, config)?
//!         .with_event_handler(&LoggingHandler)
//!         .optimize()
//!         .await?;
//!
//!     println!("{}", summary.best_prompt);
//!     Ok(())
//! }
//! ```
//!
//! # On-disk layout
//!
//! ```text
//! workspace/<name>/prompts/
//!   results.json       one RoundRecord per evaluated round
//!   cost.json          token usage and estimated spend per role
//!   round_1/
//!     prompt.txt
//!     answers.txt
//!   round_2/
//!     ...
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`optimizer`] | [`PromptOptimizer`](optimizer::PromptOptimizer) round loop and events |
//! | [`execute`] | Run one prompt over the sampled questions concurrently |
//! | [`evaluate`] | Pairwise LLM judge with position swapping and majority vote |
//! | [`template`] | Iteration template (prompt, requirements, count, FAQ) |
//! | [`prompts`] | Optimizer and judge meta-prompts, XML tag extraction |
//! | [`workspace`] | Round-numbered directories and their text artifacts |
//! | [`ledger`] | `results.json` / `cost.json` persistence and best-round selection |
//! | [`llm`] | Role-based model routing over the chat client |
//! | [`config`] | Optimizer and LLM endpoint configuration |
//! | [`api`] | Retry with backoff and cost tracking |

pub mod api;
pub mod config;
pub mod evaluate;
pub mod execute;
pub mod ledger;
pub mod llm;
pub mod optimizer;
pub mod prelude;
pub mod prompts;
pub mod template;
pub mod tokens;
pub mod workspace;

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

/// Default OpenAI-compatible chat completions endpoint.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model for every role.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

/// Default per-response token limit.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// A message in the conversation.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type from [`ChatClient::chat()`].
#[derive(Debug)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for OpenAI-compatible chat completions endpoints.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ChatClient {
    /// Create a client for the default endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client for a custom OpenAI-compatible endpoint.
    ///
    /// `base_url` is the API root (e.g. `https://api.openai.com/v1`); the
    /// `/chat/completions` path is appended per request.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("spo-rs/0.1")
            .timeout(Duration::from_secs(180))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// The API root this client posts to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        debug!(
            "LLM request: model={}, messages={}, max_tokens={}, temp={}",
            body.model,
            body.messages.len(),
            body.max_tokens,
            body.temperature,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("LLM API HTTP {status}: {text}"));
        }

        parse_chat_response(&text)
    }
}

/// Parse a raw chat completions response body.
pub(crate) fn parse_chat_response(text: &str) -> Result<ChatCompletion, String> {
    let parsed: RawChatResponse =
        serde_json::from_str(text).map_err(|e| format!("failed to parse response: {e}"))?;

    if let Some(err) = parsed.error {
        return Err(format!("LLM API error: {}", err.message));
    }

    if let Some(ref usage) = parsed.usage {
        debug!(
            "Token usage: prompt={}, completion={}, total={}",
            usage.prompt_tokens.unwrap_or(0),
            usage.completion_tokens.unwrap_or(0),
            usage.total_tokens.unwrap_or(0),
        );
    }

    match parsed.choices.and_then(|c| c.into_iter().next()) {
        Some(c) => Ok(ChatCompletion {
            content: c.message.content,
            usage: parsed.usage,
            finish_reason: c.finish_reason,
        }),
        None => {
            debug!("LLM output: empty (no choices)");
            Ok(ChatCompletion {
                content: None,
                usage: parsed.usage,
                finish_reason: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors() {
        let sys = Message::system("hello");
        assert_eq!(sys.role, MessageRole::System);
        assert_eq!(sys.content, "hello");

        let user = Message::user("world");
        assert_eq!(user.role, MessageRole::User);

        let assist = Message::assistant("reply");
        assert_eq!(assist.role, MessageRole::Assistant);
    }

    #[test]
    fn chat_request_skips_unset_fields() {
        let req = ChatRequest {
            model: "test-model".into(),
            messages: vec![Message::user("hi")],
            max_tokens: 100,
            temperature: 0.5,
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("top_p").is_none());
        assert!(json.get("seed").is_none());
        assert!(json.get("stop").is_none());
    }

    #[test]
    fn zero_temperature_is_still_sent() {
        let req = ChatRequest {
            model: "m".into(),
            temperature: 0.0,
            ..Default::default()
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["temperature"], 0.0);
        assert!(json.get("max_tokens").is_none());
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = ChatClient::with_base_url("key", "https://api.example.com/v1/").unwrap();
        assert_eq!(client.base_url(), "https://api.example.com/v1");
        assert_eq!(
            client.completions_url(),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn parse_response_with_content_and_usage() {
        let body = r#"{
            "choices": [{"message": {"content": "hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let completion = parse_chat_response(body).unwrap();
        assert_eq!(completion.content.as_deref(), Some("hi there"));
        assert_eq!(completion.finish_reason.as_deref(), Some("stop"));
        assert_eq!(completion.usage.unwrap().total_tokens, Some(15));
    }

    #[test]
    fn parse_response_error_body() {
        let body = r#"{"error": {"message": "model not found"}}"#;
        let err = parse_chat_response(body).unwrap_err();
        assert!(err.contains("model not found"));
    }

    #[test]
    fn parse_response_without_choices() {
        let completion = parse_chat_response(r#"{"choices": []}"#).unwrap();
        assert!(completion.content.is_none());
    }
}
