use crate::error::LlmError;
use crate::llm::{Message, ModelClient, Role};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const PROVIDER: &str = "huggingface";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_RETRY_AFTER_MS: u64 = 60000;

/// Client for an OpenAI-compatible chat-completions endpoint, by default the
/// Hugging Face inference router.
pub struct HuggingFaceClient {
    client: Client,
    api_token: SecretString,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl HuggingFaceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_token: SecretString,
        timeout_secs: u64,
    ) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_token,
            base_url: base_url.into(),
            model: crate::config::DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Shapes an inference endpoint may answer with.
#[derive(Deserialize)]
#[serde(untagged)]
enum CompletionResponse {
    Chat { choices: Vec<Choice> },
    Generated(Vec<GeneratedText>),
    Plain(String),
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<MessageContent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    part_type: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct GeneratedText {
    generated_text: String,
}

impl MessageContent {
    fn into_text(self) -> String {
        match self {
            MessageContent::Text(text) => text,
            MessageContent::Parts(parts) => parts
                .into_iter()
                .filter(|p| p.part_type.as_deref().map_or(true, |t| t == "text"))
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

impl CompletionResponse {
    /// Flattens whichever shape came back into plain text.
    fn into_text(self) -> Option<String> {
        match self {
            CompletionResponse::Chat { choices } => choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .map(MessageContent::into_text),
            CompletionResponse::Generated(items) => {
                items.into_iter().next().map(|g| g.generated_text)
            }
            CompletionResponse::Plain(text) => Some(text),
        }
    }
}

#[async_trait]
impl ModelClient for HuggingFaceClient {
    async fn chat(&self, messages: &[Message], system: Option<&str>) -> Result<String, LlmError> {
        let mut chat_messages: Vec<ChatMessage> = Vec::with_capacity(messages.len() + 1);

        if let Some(sys) = system {
            chat_messages.push(ChatMessage {
                role: Role::System.as_str(),
                content: sys.to_string(),
            });
        }

        chat_messages.extend(messages.iter().map(|m| ChatMessage {
            role: m.role.as_str(),
            content: m.content.clone(),
        }));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: chat_messages,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(model = %self.model, "Sending chat completion request");

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(self.api_token.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(LlmError::Network)?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::AuthenticationFailed(body));
            }
            StatusCode::NOT_FOUND => {
                return Err(LlmError::ModelNotFound {
                    model: self.model.clone(),
                });
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_ms = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(|secs| secs.saturating_mul(1000))
                    .unwrap_or(DEFAULT_RETRY_AFTER_MS);
                return Err(LlmError::RateLimited { retry_after_ms });
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                return Err(LlmError::Unavailable {
                    provider: PROVIDER.to_string(),
                });
            }
            _ => {}
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::InvalidResponse(format!(
                "API error ({}): {}",
                status, body
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Invalid response: {}", e)))?;

        let text = completion
            .into_text()
            .ok_or_else(|| LlmError::InvalidResponse("No text content in response".to_string()))?;

        if text.trim().is_empty() {
            tracing::warn!(model = %self.model, "Model returned empty content");
        }
        Ok(text)
    }
}
