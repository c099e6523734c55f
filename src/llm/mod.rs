use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod cohere;
pub mod openai;

pub use cohere::CohereClient;
pub use openai::OpenAIClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Cohere,
    OpenAI,
}

impl Provider {
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            Provider::Cohere => "COHERE_API_KEY",
            Provider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Cohere => write!(f, "cohere"),
            Provider::OpenAI => write!(f, "openai"),
        }
    }
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

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
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
}

/// Unset options are left to the provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_completion_tokens: Option<i32>,
}

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("Error building request: {0}")]
    RequestBuildingError(String),
    #[error("Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("API request failed with status {status}: {body}")]
    ApiError {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Empty response")]
    EmptyResponse,
    #[error("API call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Request cancelled")]
    Cancelled,
    #[error("API client not initialized")]
    NotInitialized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub options: CompletionOptions,
}

#[derive(Debug, Default)]
pub struct CompletionBuilder {
    model: String,
    messages: Vec<Message>,
    options: CompletionOptions,
}

impl CompletionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.options.temperature = Some(temperature);
        self
    }

    pub fn max_completion_tokens(mut self, max_completion_tokens: i32) -> Self {
        self.options.max_completion_tokens = Some(max_completion_tokens);
        self
    }

    pub fn build(self) -> CompletionRequest {
        CompletionRequest {
            model: self.model,
            messages: self.messages,
            options: self.options,
        }
    }
}

/// A hosted chat-completion backend. Dropping the returned future aborts the
/// underlying HTTP request.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LLMError>;
}

pub fn client_for(provider: Provider, api_key: String) -> Arc<dyn CompletionClient> {
    match provider {
        Provider::Cohere => Arc::new(CohereClient::new(api_key)),
        Provider::OpenAI => Arc::new(OpenAIClient::new(api_key)),
    }
}

fn bearer_headers(api_key: &str) -> Result<reqwest::header::HeaderMap, LLMError> {
    use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};

    let mut headers = HeaderMap::new();
    let auth_header = HeaderValue::from_str(&format!("Bearer {api_key}"))
        .map_err(|e| LLMError::RequestBuildingError(e.to_string()))?;
    headers.insert(AUTHORIZATION, auth_header);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, LLMError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    Err(LLMError::ApiError { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_options() {
        let request = CompletionBuilder::new()
            .model("command-a-03-2025")
            .messages(vec![Message::system("be brief"), Message::user("hi")])
            .temperature(0.75)
            .max_completion_tokens(80)
            .build();
        assert_eq!(request.model, "command-a-03-2025");
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.options.temperature, Some(0.75));
        assert_eq!(request.options.max_completion_tokens, Some(80));
    }

    #[test]
    fn zero_temperature_is_kept() {
        let request = CompletionBuilder::new().temperature(0.0).build();
        assert_eq!(request.options.temperature, Some(0.0));
        assert_eq!(request.options.max_completion_tokens, None);
    }

    #[test]
    fn bearer_headers_reject_invalid_keys() {
        assert!(bearer_headers("abc").is_ok());
        assert!(matches!(
            bearer_headers("bad\nkey"),
            Err(LLMError::RequestBuildingError(_))
        ));
    }

    #[test]
    fn provider_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Provider::OpenAI).unwrap(), "\"openai\"");
        assert_eq!(Provider::Cohere.api_key_env_var(), "COHERE_API_KEY");
    }
}
