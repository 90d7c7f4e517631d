//! OpenAI-compatible chat-completions client used as the model oracle.

use std::time::Duration;

use async_trait::async_trait;
use autopatch_core::{AutopatchError, ModelOracle, RESPONSE_FORMAT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Role framing placed ahead of the reply-format instructions.
const ROLE_PROMPT: &str =
    "You are an expert software developer assistant. Please execute the task described below.";

pub fn system_prompt() -> String {
    format!("{ROLE_PROMPT}\n\n{RESPONSE_FORMAT}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    /// Create from environment variables
    ///
    /// Reads:
    /// - OPENAI_API_KEY (required)
    /// - AUTOPATCH_MODEL (optional, default: "gpt-4o-mini")
    /// - AUTOPATCH_MODEL_ENDPOINT (optional, default: OpenAI chat completions)
    pub fn from_env() -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable is not set"))?;
        Ok(Self {
            api_key,
            model: std::env::var("AUTOPATCH_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            endpoint: std::env::var("AUTOPATCH_MODEL_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string()),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

fn chat_request(model: &str, prompt: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![
            Message {
                role: "system".to_string(),
                content: system_prompt(),
            },
            Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            },
        ],
    }
}

/// Content of the first choice.
fn first_choice(response: ChatResponse) -> autopatch_core::Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| AutopatchError::Model("no choices in model response".to_string()))
}

pub struct OpenAiClient {
    config: OpenAiConfig,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("autopatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, http })
    }
}

#[async_trait]
impl ModelOracle for OpenAiClient {
    async fn send(&self, prompt: &str) -> autopatch_core::Result<String> {
        let request = chat_request(&self.config.model, prompt);
        debug!(model = %self.config.model, prompt_bytes = prompt.len(), "sending model request");

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AutopatchError::Model(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AutopatchError::Model(format!("API error {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AutopatchError::Model(format!("invalid response body: {e}")))?;
        let content = first_choice(parsed)?;
        info!(model = %self.config.model, reply_bytes = content.len(), "model replied");
        Ok(content)
    }
}
