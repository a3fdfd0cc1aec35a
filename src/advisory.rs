use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::config::AdvisoryConfig;
use crate::error::AdvisoryError;
use crate::models::{ChatMessage, ChatTranscript};

pub const MODEL: &str = "gpt-4.1-mini";
pub const TEMPERATURE: f32 = 0.3;

pub const APOLOGY: &str = "Sorry, the assistant is unavailable right now. \
Your question was not recorded; please try again in a moment.";

const PERSONA: &str = "\
You are an AI assistant specialized in public management and institutional maturity.
Your job is to analyze the diagnostic of a public agency and suggest practical paths
to raise its maturity across the different dimensions (governance, processes, people,
data, technology, etc.).

Rules:
- ALWAYS use the information from the diagnostic and from the benchmark comparison provided.
- Start by briefly summarizing the main strengths and weaknesses.
- Help the user prioritize: say where to start and what is most critical.
- Make realistic suggestions for the context of Brazilian public agencies
  (taking into account time, budget and bureaucratic constraints).
- Avoid excessive jargon; explain concepts in plain language.
- Do not promise anything impossible (e.g. \"solve every problem quickly\").
- If the user asks something out of scope, answer briefly and steer back to
  institutional maturity and improving the agency.";

const REFERENCE_NARRATIVE: &str = "\
About the benchmark: the observatory base aggregates self-assessments from Brazilian
public agencies answering the same questionnaire on a 0 to 3 scale (0 = nonexistent,
1 = very incipient, 2 = partially structured, 3 = well structured). Base means are
arithmetic means per dimension across all respondents, and where available also per
branch of government (power) and level of government (sphere). A dimension more than
0.10 above its base mean is above base, more than 0.10 below is below base, and
anything in between is near base. When a dimension has no benchmark, do not invent one.";

const PROFILE_INTRO: &str = "The structured diagnostic of the organization follows:";

#[async_trait]
pub trait ReasoningService: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AdvisoryError>;
}

/// Bounded retry with exponential backoff and 25% jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(2u64.saturating_pow(attempt));
        let capped_ms = exp_ms.min(self.max_delay.as_millis() as u64);

        let jitter_range = capped_ms / 4;
        let jitter = if jitter_range > 0 {
            let offset = rand::thread_rng().gen_range(0..=jitter_range.saturating_mul(2));
            offset as i64 - jitter_range as i64
        } else {
            0
        };
        Duration::from_millis((capped_ms as i64 + jitter).max(0) as u64)
    }
}

pub fn build_messages(
    profile: &str,
    transcript: &ChatTranscript,
    user_message: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(transcript.len() + 4);
    messages.push(ChatMessage::system(PERSONA));
    messages.push(ChatMessage::system(REFERENCE_NARRATIVE));
    messages.push(ChatMessage::system(format!("{PROFILE_INTRO}\n\n{profile}")));
    messages.extend(transcript.messages().iter().cloned());
    messages.push(ChatMessage::user(user_message));
    messages
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Answer(String),
    Apology(String),
}

impl ChatReply {
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) | Self::Apology(text) => text,
        }
    }
}

pub struct AdvisoryClient {
    service: Box<dyn ReasoningService>,
    retry: RetryPolicy,
}

impl AdvisoryClient {
    pub fn new(service: Box<dyn ReasoningService>, retry: RetryPolicy) -> Self {
        Self { service, retry }
    }

    pub fn from_config(config: &AdvisoryConfig) -> Result<Self, AdvisoryError> {
        let service = OpenAiChatService::new(config)?;
        Ok(Self::new(Box::new(service), config.retry))
    }

    pub async fn ask(
        &self,
        profile: &str,
        transcript: &ChatTranscript,
        user_message: &str,
    ) -> Result<String, AdvisoryError> {
        let messages = build_messages(profile, transcript, user_message);
        let mut attempt = 0u32;

        loop {
            match self.service.complete(&messages).await {
                Ok(reply) => {
                    if attempt > 0 {
                        tracing::info!(retries = attempt, "Reasoning service recovered");
                    }
                    return Ok(reply);
                }
                Err(error) => {
                    let attempts = attempt + 1;
                    if !error.is_transient() || attempt >= self.retry.max_retries {
                        return Err(AdvisoryError::Unavailable {
                            attempts,
                            last: Box::new(error),
                        });
                    }

                    let delay = self.retry.backoff_delay(attempt);
                    tracing::warn!(
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "Reasoning service call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn ask_or_apology(
        &self,
        profile: &str,
        transcript: &ChatTranscript,
        user_message: &str,
    ) -> ChatReply {
        match self.ask(profile, transcript, user_message).await {
            Ok(reply) => ChatReply::Answer(reply),
            Err(error) => {
                tracing::error!(%error, "Advisory unavailable");
                ChatReply::Apology(APOLOGY.to_string())
            }
        }
    }
}

pub struct OpenAiChatService {
    client: Client,
    base_url: String,
    api_key: SecretString,
    timeout: Duration,
}

impl OpenAiChatService {
    pub fn new(config: &AdvisoryConfig) -> Result<Self, AdvisoryError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(AdvisoryError::CredentialMissing)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdvisoryError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            timeout: config.timeout,
        })
    }

    /// `{base}/v1/chat/completions`, tolerating a trailing `/v1` on the base.
    fn completions_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let base = base.strip_suffix("/v1").unwrap_or(base);
        format!("{base}/v1/chat/completions")
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionContent,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionContent {
    #[serde(default)]
    content: Option<String>,
}

fn parse_completion(body: &str) -> Result<String, AdvisoryError> {
    let response: ChatCompletionResponse =
        serde_json::from_str(body).map_err(|e| AdvisoryError::InvalidResponse {
            reason: format!("JSON parse error: {e}"),
        })?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AdvisoryError::InvalidResponse {
            reason: "response contained no message content".to_string(),
        })
}

#[async_trait]
impl ReasoningService for OpenAiChatService {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, AdvisoryError> {
        let url = self.completions_url();
        let body = ChatCompletionRequest {
            model: MODEL,
            messages,
            temperature: TEMPERATURE,
        };

        tracing::debug!(%url, messages = messages.len(), "Sending chat completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdvisoryError::Timeout(self.timeout)
                } else {
                    AdvisoryError::RequestFailed {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AdvisoryError::RequestFailed {
                reason: format!("failed to read response body: {e}"),
            })?;

        tracing::debug!(%status, "Chat completion response received");

        match status.as_u16() {
            200..=299 => parse_completion(&text),
            401 | 403 => Err(AdvisoryError::AuthFailed),
            429 => Err(AdvisoryError::RateLimited),
            _ => Err(AdvisoryError::RequestFailed {
                reason: format!("HTTP {}: {}", status, truncate(&text, 200)),
            }),
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
