use crate::llm::{bearer_headers, error_for_status, CompletionClient, CompletionRequest, LLMError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Serialize)]
struct RequestBody<'a> {
    model: &'a str,
    messages: Vec<OpenAIMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<i32>,
}

#[derive(Serialize)]
struct OpenAIMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct Response {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAIClient {
    api_key: String,
    url: String,
    http: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(api_key: String) -> Self {
        Self::with_url(api_key, OPENAI_API_URL.to_string())
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
            .map(|msg| OpenAIMessage {
                role: msg.role.as_str(),
                content: &msg.content,
            })
            .collect(),
        temperature: opt.temperature,
        max_tokens: opt.max_completion_tokens,
    }
}

fn first_choice_text(response: Response) -> Result<String, LLMError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(LLMError::EmptyResponse)
}

#[async_trait]
impl CompletionClient for OpenAIClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LLMError> {
        let headers = bearer_headers(&self.api_key)?;
        let response = self
            .http
            .post(&self.url)
            .headers(headers)
            .json(&request_body(request))
            .send()
            .await?;
        let response = error_for_status(response).await?;
        let response_body: Response = response.json().await?;
        first_choice_text(response_body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionBuilder, Message};
    use serde_json::json;

    #[test]
    fn body_omits_unset_options() {
        let request = CompletionBuilder::new()
            .model("gpt-4o-mini")
            .messages(vec![Message::system("sys"), Message::user("chat")])
            .build();
        let body = serde_json::to_value(request_body(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "chat"}
                ]
            })
        );
    }

    #[test]
    fn zero_temperature_is_sent() {
        let request = CompletionBuilder::new()
            .model("gpt-4o-mini")
            .messages(vec![Message::user("chat")])
            .temperature(0.0)
            .max_completion_tokens(80)
            .build();
        let body = serde_json::to_value(request_body(&request)).unwrap();
        assert_eq!(body["temperature"], json!(0.0));
        assert_eq!(body["max_tokens"], json!(80));
    }

    #[test]
    fn null_content_is_an_empty_response() {
        let response: Response =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        assert!(matches!(first_choice_text(response), Err(LLMError::EmptyResponse)));

        let response: Response = serde_json::from_value(
            json!({"choices": [{"message": {"role": "assistant", "content": "hey"}}]}),
        )
        .unwrap();
        assert_eq!(first_choice_text(response).unwrap(), "hey");
    }
}
