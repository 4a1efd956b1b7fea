pub mod huggingface;

pub use huggingface::HuggingFaceClient;

use crate::error::LlmError;
use async_trait::async_trait;

/// Text-generation capability: a conversation in, the model's text out.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn chat(&self, messages: &[Message], system: Option<&str>) -> Result<String, LlmError>;
}

#[derive(Debug, Clone)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}
