use crate::config::Settings;
use crate::llm::{CompletionBuilder, CompletionClient, CompletionRequest, LLMError};
use crate::prompts::{reply_prompt, Persona, FALLBACK_RESPONSES};
use crate::utils::{clean_reply, truncate_chars};
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Roughly how many tokens a word of chat costs.
const TOKENS_PER_WORD: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorOptions {
    pub persona_name: String,
    pub platform: String,
    pub language_mix: String,
    pub tone: String,
    pub max_length: u32,
    pub temperature: f64,
    pub model: String,
    pub timeout: Duration,
    pub use_fallback: bool,
}

impl From<&Settings> for GeneratorOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            persona_name: settings.persona_name.clone(),
            platform: settings.platform.clone(),
            language_mix: settings.language_mix.clone(),
            tone: settings.tone.clone(),
            max_length: settings.max_length,
            temperature: settings.temperature,
            model: settings.model.clone(),
            timeout: Duration::from_secs(settings.api_timeout),
            use_fallback: settings.use_fallback_mode,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplySource {
    Generated,
    Fallback,
    /// A user-visible error message; only produced with fallback disabled.
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub source: ReplySource,
}

pub struct ResponseGenerator {
    client: Option<Arc<dyn CompletionClient>>,
    options: GeneratorOptions,
}

impl ResponseGenerator {
    pub fn new(client: Option<Arc<dyn CompletionClient>>, options: GeneratorOptions) -> Self {
        Self { client, options }
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Whether `generate` can produce something worth sending.
    pub fn can_reply(&self) -> bool {
        self.has_client() || self.options.use_fallback
    }

    pub async fn generate(&self, chat_history: &str) -> Reply {
        self.generate_with_cancel(chat_history, &CancellationToken::new())
            .await
    }

    /// Makes a single completion attempt bounded by the configured timeout.
    /// When the bound elapses or `cancel` fires the request future is
    /// dropped, which aborts the HTTP call.
    pub async fn generate_with_cancel(&self, chat_history: &str, cancel: &CancellationToken) -> Reply {
        let Some(client) = &self.client else {
            warn!("completion client not initialized");
            return self.recover(&LLMError::NotInitialized);
        };
        let request = self.build_request(chat_history);
        let timeout = self.options.timeout;
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(LLMError::Cancelled),
            result = tokio::time::timeout(timeout, client.complete(&request)) => match result {
                Ok(result) => result,
                Err(_) => Err(LLMError::Timeout(timeout)),
            },
        };
        match result {
            Ok(raw) => {
                debug!(raw = %raw, "raw completion");
                let text = clean_reply(&raw, &self.options.persona_name);
                if text.is_empty() {
                    warn!("completion was empty after cleanup");
                    return self.recover(&LLMError::EmptyResponse);
                }
                info!(reply = %text, "AI generated reply");
                Reply {
                    text,
                    source: ReplySource::Generated,
                }
            }
            Err(e) => {
                error!(error = %e, "error calling completion API");
                self.recover(&e)
            }
        }
    }

    fn build_request(&self, chat_history: &str) -> CompletionRequest {
        let opts = &self.options;
        let persona = Persona {
            name: &opts.persona_name,
            platform: &opts.platform,
            language_mix: &opts.language_mix,
            tone: &opts.tone,
            max_length: opts.max_length,
        };
        let max_tokens = i32::try_from(opts.max_length.saturating_mul(TOKENS_PER_WORD)).unwrap_or(i32::MAX);
        CompletionBuilder::new()
            .model(opts.model.clone())
            .messages(reply_prompt(&persona, chat_history).build_messages())
            .temperature(opts.temperature)
            .max_completion_tokens(max_tokens)
            .build()
    }

    fn recover(&self, error: &LLMError) -> Reply {
        if self.options.use_fallback {
            return Reply {
                text: fallback_response().to_string(),
                source: ReplySource::Fallback,
            };
        }
        Reply {
            text: format!(
                "Sorry, couldn't get a response: {}",
                truncate_chars(&error.to_string(), 50)
            ),
            source: ReplySource::Error,
        }
    }
}

/// Picks a canned reply uniformly at random.
pub fn fallback_response() -> &'static str {
    FALLBACK_RESPONSES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    enum Behavior {
        Reply(&'static str),
        Fail,
        Hang,
    }

    struct FakeClient {
        behavior: Behavior,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl FakeClient {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CompletionClient for FakeClient {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, LLMError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.behavior {
                Behavior::Reply(text) => Ok(text.to_string()),
                Behavior::Fail => Err(LLMError::EmptyResponse),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok("too late".to_string())
                }
            }
        }
    }

    fn options(use_fallback: bool) -> GeneratorOptions {
        GeneratorOptions {
            timeout: Duration::from_secs(10),
            use_fallback,
            ..GeneratorOptions::from(&Settings::default())
        }
    }

    fn generator(client: Arc<FakeClient>, use_fallback: bool) -> ResponseGenerator {
        ResponseGenerator::new(Some(client), options(use_fallback))
    }

    #[tokio::test]
    async fn generated_reply_is_cleaned() {
        let client = FakeClient::new(Behavior::Reply("Nitesh: \"Haan, main free hoon!\""));
        let reply = generator(client.clone(), true)
            .generate("Alice: are you free?")
            .await;
        assert_eq!(
            reply,
            Reply {
                text: "Haan, main free hoon!".to_string(),
                source: ReplySource::Generated,
            }
        );

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, "command-a-03-2025");
        assert_eq!(request.options.max_completion_tokens, Some(80));
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[1].content.contains("Alice: are you free?"));
    }

    #[tokio::test]
    async fn empty_history_still_sends_a_request() {
        let client = FakeClient::new(Behavior::Reply("hey"));
        generator(client.clone(), true).generate("").await;
        assert_eq!(client.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failures_fall_back_to_canned_set() {
        for behavior in [Behavior::Fail, Behavior::Reply("  \"\" ")] {
            let gen = generator(FakeClient::new(behavior), true);
            for _ in 0..20 {
                let reply = gen.generate("Alice: hi").await;
                assert_eq!(reply.source, ReplySource::Fallback);
                assert!(FALLBACK_RESPONSES.contains(&reply.text.as_str()));
            }
        }
    }

    #[tokio::test]
    async fn failure_without_fallback_is_an_error_message() {
        let reply = generator(FakeClient::new(Behavior::Fail), false)
            .generate("Alice: hi")
            .await;
        assert_eq!(reply.source, ReplySource::Error);
        assert!(reply.text.starts_with("Sorry,"));
    }

    #[tokio::test]
    async fn missing_client_uses_fallback_or_error() {
        let gen = ResponseGenerator::new(None, options(true));
        assert!(gen.can_reply());
        assert_eq!(gen.generate("x").await.source, ReplySource::Fallback);

        let gen = ResponseGenerator::new(None, options(false));
        assert!(!gen.can_reply());
        let reply = gen.generate("x").await;
        assert_eq!(reply.source, ReplySource::Error);
        assert!(reply.text.contains("not initialized"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_is_abandoned_at_the_timeout() {
        let client = FakeClient::new(Behavior::Hang);
        let gen = generator(client, true);
        let started = Instant::now();
        let reply = gen.generate("Alice: hi").await;
        let elapsed = started.elapsed();
        assert_eq!(reply.source, ReplySource::Fallback);
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_a_pending_call() {
        let gen = generator(FakeClient::new(Behavior::Hang), false);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let started = Instant::now();
        let reply = gen.generate_with_cancel("Alice: hi", &cancel).await;
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(reply.source, ReplySource::Error);
        assert!(reply.text.contains("cancelled"));
    }
}
