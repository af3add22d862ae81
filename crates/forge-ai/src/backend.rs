//! Chat backend abstraction and the OpenRouter implementation.

use std::fmt;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    fn wire_name(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Model and sampling settings for one pipeline role. Which model backs
/// which role is configuration, not code.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    pub model: String,
    pub temperature: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentError {
    /// The backend could not produce a completion. The pipeline treats this
    /// as terminal; corrective retries are reserved for bad programs, not
    /// bad transport.
    Unavailable(String),
}

impl fmt::Display for AgentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentError::Unavailable(reason) => {
                write!(f, "chat backend unavailable: {reason}")
            }
        }
    }
}

impl std::error::Error for AgentError {}

/// One operation: turn an ordered conversation into the next assistant
/// message. Implementations do not retry and keep no per-call state.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        capability: &Capability,
        messages: &[ChatMessage],
    ) -> Result<String, AgentError>;
}

/// OpenAI-compatible chat client pointed at OpenRouter by default.
pub struct OpenRouterBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl OpenRouterBackend {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireReply,
}

#[derive(Debug, Deserialize)]
struct WireReply {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
struct WireErrorDetail {
    message: String,
}

#[async_trait]
impl ChatBackend for OpenRouterBackend {
    async fn complete(
        &self,
        capability: &Capability,
        messages: &[ChatMessage],
    ) -> Result<String, AgentError> {
        let request = WireRequest {
            model: &capability.model,
            temperature: capability.temperature,
            messages: messages
                .iter()
                .map(|message| WireMessage {
                    role: message.role.wire_name(),
                    content: &message.content,
                })
                .collect(),
        };

        tracing::debug!(model = %capability.model, turns = messages.len(), "requesting completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|err| AgentError::Unavailable(format!("request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<WireError>(&body) {
                Ok(wire) => wire.error.message,
                Err(_) => format!("HTTP {status}"),
            };
            return Err(AgentError::Unavailable(reason));
        }

        let completion: WireResponse = response
            .json()
            .await
            .map_err(|err| AgentError::Unavailable(format!("malformed response: {err}")))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AgentError::Unavailable("completion contained no content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{Capability, ChatMessage, Role, WireMessage, WireRequest, WireResponse};

    #[test]
    fn request_serializes_roles_in_wire_form() {
        let capability = Capability {
            model: "test/model".to_string(),
            temperature: 0.2,
        };
        let messages = [
            ChatMessage::system("be brief"),
            ChatMessage::user("a cube"),
            ChatMessage::assistant("result = box(10, 10, 10)"),
        ];
        let request = WireRequest {
            model: &capability.model,
            temperature: capability.temperature,
            messages: messages
                .iter()
                .map(|message| WireMessage {
                    role: message.role.wire_name(),
                    content: &message.content,
                })
                .collect(),
        };

        let json = serde_json::to_value(&request).expect("request should serialize");
        assert_eq!(json["model"], "test/model");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][2]["role"], "assistant");
        assert_eq!(json["messages"][1]["content"], "a cube");
    }

    #[test]
    fn response_parses_first_choice_content() {
        let body = r#"{"choices":[{"message":{"content":"result = sphere(5)"}}]}"#;
        let parsed: WireResponse = serde_json::from_str(body).expect("response should parse");
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("result = sphere(5)")
        );
    }

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("x").role, Role::System);
        assert_eq!(ChatMessage::user("x").role, Role::User);
        assert_eq!(ChatMessage::assistant("x").role, Role::Assistant);
    }
}
