use crate::llm::{bearer_headers, error_for_status, CompletionClient, CompletionRequest, LLMError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const COHERE_API_URL: &str = "https://api.cohere.com/v2/chat";

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    messages: Vec<CohereMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i32>,
}

#[derive(Serialize)]
struct CohereMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Response {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    type_: String,
    #[serde(default)]
    text: String,
}

/// Client for the Cohere v2 chat endpoint.
pub struct CohereClient {
    api_key: String,
    url: String,
    http: reqwest::Client,
}

impl CohereClient {
    pub fn new(api_key: String) -> Self {
        Self::with_url(api_key, COHERE_API_URL.to_string())
    }

    pub fn with_url(api_key: String, url: String) -> Self {
        Self {
            api_key,
            url,
            http: reqwest::Client::new(),
        }
    }
}

fn request_body(request: &CompletionRequest) -> RequestBody<'_> {
    let opt = &request.options;
    RequestBody {
        model: &request.model,
        messages: request
            .messages
            .iter()
            .map(|msg| CohereMessage {
                role: msg.role.as_str(),
                content: &msg.content,
            })
            .collect(),
        temperature: opt.temperature,
        max_tokens: opt.max_completion_tokens,
    }
}

fn first_text_block(response: Response) -> Result<String, LLMError> {
    response
        .message
        .content
        .into_iter()
        .find(|block| block.type_ == "text")
        .map(|block| block.text)
        .ok_or(LLMError::EmptyResponse)
}

#[async_trait]
impl CompletionClient for CohereClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LLMError> {
        let headers = bearer_headers(&self.api_key)?;
        debug!(model = %request.model, messages = request.messages.len(), "sending chat request");
        let response = self
            .http
            .post(&self.url)
            .headers(headers)
            .json(&request_body(request))
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let response_body: Response = response.json().await?;
        first_text_block(response_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionBuilder, Message};
    use serde_json::json;

    #[test]
    fn body_matches_v2_chat_shape() {
        let request = CompletionBuilder::new()
            .model("command-a-03-2025")
            .messages(vec![Message::system("sys"), Message::user("chat")])
            .temperature(0.75)
            .max_completion_tokens(80)
            .build();
        let body = serde_json::to_value(request_body(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "command-a-03-2025",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "chat"}
                ],
                "temperature": 0.75,
                "max_tokens": 80
            })
        );
    }

    #[test]
    fn zero_temperature_is_sent() {
        let request = CompletionBuilder::new()
            .model("command-a-03-2025")
            .messages(vec![Message::user("chat")])
            .temperature(0.0)
            .build();
        let body = serde_json::to_value(request_body(&request)).unwrap();
        assert_eq!(body["temperature"], json!(0.0));
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn picks_first_text_block() {
        let response: Response = serde_json::from_value(json!({
            "id": "abc",
            "finish_reason": "COMPLETE",
            "message": {
                "role": "assistant",
                "content": [
                    {"type": "thinking", "thinking": "..."},
                    {"type": "text", "text": "Haan bhai, bol?"}
                ]
            }
        }))
        .unwrap();
        assert_eq!(first_text_block(response).unwrap(), "Haan bhai, bol?");
    }

    #[test]
    fn missing_content_is_an_empty_response() {
        let response: Response =
            serde_json::from_value(json!({"message": {"role": "assistant"}})).unwrap();
        assert!(matches!(first_text_block(response), Err(LLMError::EmptyResponse)));
    }
}
