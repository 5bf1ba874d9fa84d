use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tenun_types::models::Voice;

use crate::error::UpstreamError;

/// A single prompt for the text-generation service.
#[derive(Debug, Clone)]
pub struct Completion<'a> {
    pub system: &'a str,
    pub user: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Prompt in, text out. Implementations make exactly one call per request.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, request: Completion<'_>) -> Result<String, UpstreamError>;
}

/// Text plus voice in, MP3 audio out.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Bytes, UpstreamError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub chat_model: String,
    pub speech_model: String,
    pub timeout: Duration,
}

/// Client for the OpenAI-compatible chat completion and speech endpoints.
pub struct OpenAiClient {
    http: reqwest::Client,
    config: OpenAiConfig,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    voice: &'a str,
    input: &'a str,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, UpstreamError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn complete(&self, request: Completion<'_>) -> Result<String, UpstreamError> {
        let body = ChatCompletionRequest {
            model: &self.config.chat_model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let parsed: ChatCompletionResponse = self.post("chat/completions", &body).await?.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| UpstreamError::Malformed("completion had no content".into()))?;

        debug!("Completion returned {} chars", content.len());
        Ok(content)
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAiClient {
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Bytes, UpstreamError> {
        let body = SpeechRequest {
            model: &self.config.speech_model,
            voice: voice.as_str(),
            input: text,
        };

        let audio = self.post("audio/speech", &body).await?.bytes().await?;
        debug!("Speech synthesis returned {} bytes", audio.len());
        Ok(audio)
    }
}
