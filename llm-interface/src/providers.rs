use crate::http::{build_client, empty_response, missing_key, send_json};
use crate::TextGenerator;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;
use trendpost_core::{CoreError, GenerationSettings, ProviderKind};

const GEMINI_DEFAULT_MODEL: &str = "gemini-2.5-flash";
const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
const CLAUDE_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_DEFAULT_MODEL: &str = "claude-3-sonnet-20240229";
const ANTHROPIC_VERSION: &str = "2023-06-01";

const PERSONA: &str =
    "당신은 AI 트렌드 전문가입니다. 최신 기술 동향을 분석하고 고품질의 블로그 콘텐츠를 작성합니다.";

/// Decoding parameters shared by every provider.
#[derive(Debug, Clone, Copy)]
struct Decoding {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    top_k: u32,
}

impl From<&GenerationSettings> for Decoding {
    fn from(settings: &GenerationSettings) -> Self {
        Self {
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
            top_p: settings.top_p,
            top_k: settings.top_k,
        }
    }
}

fn non_empty(key: Option<&str>) -> Option<String> {
    key.map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------- Gemini

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    top_p: f32,
    top_k: u32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

/// Google Gemini `generateContent`. The key travels in the query string.
#[derive(Debug)]
pub struct GeminiProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    decoding: Decoding,
}

impl GeminiProvider {
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, CoreError> {
        let overrides = settings.overrides_for(ProviderKind::Gemini);
        let model = overrides.model.as_deref().unwrap_or(GEMINI_DEFAULT_MODEL);
        let endpoint = overrides.endpoint.clone().unwrap_or_else(|| {
            format!(
                "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
                model
            )
        });
        Ok(Self {
            client: build_client(Duration::from_secs(settings.timeout_secs))?,
            api_key: non_empty(settings.gemini_api_key.as_deref()),
            endpoint,
            decoding: Decoding::from(settings),
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiProvider {
    fn provider_name(&self) -> &str {
        "gemini"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_key(self.provider_name()))?;

        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.decoding.temperature,
                max_output_tokens: self.decoding.max_output_tokens,
                top_p: self.decoding.top_p,
                top_k: self.decoding.top_k,
            },
        };

        info!("Requesting generation from gemini ({} prompt chars)", prompt.chars().count());
        let request = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&body);
        let response: GeminiResponse = send_json(self.provider_name(), request).await?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| empty_response(self.provider_name(), "candidates"))
    }
}

// ---------------------------------------------------------------- OpenAI

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI chat completions with a fixed system persona.
#[derive(Debug)]
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    decoding: Decoding,
}

impl OpenAiProvider {
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, CoreError> {
        let overrides = settings.overrides_for(ProviderKind::OpenAi);
        Ok(Self {
            client: build_client(Duration::from_secs(settings.timeout_secs))?,
            api_key: non_empty(settings.openai_api_key.as_deref()),
            endpoint: overrides
                .endpoint
                .clone()
                .unwrap_or_else(|| OPENAI_ENDPOINT.to_string()),
            model: overrides
                .model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            decoding: Decoding::from(settings),
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_key(self.provider_name()))?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: PERSONA,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.decoding.max_output_tokens,
            temperature: self.decoding.temperature,
            top_p: self.decoding.top_p,
        };

        info!("Requesting generation from openai model {}", self.model);
        let request = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body);
        let response: ChatResponse = send_json(self.provider_name(), request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| empty_response(self.provider_name(), "choices"))
    }
}

// ---------------------------------------------------------------- Claude

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<MessagesContentBlock>,
}

#[derive(Deserialize)]
struct MessagesContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic messages API.
#[derive(Debug)]
pub struct ClaudeProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    decoding: Decoding,
}

impl ClaudeProvider {
    pub fn from_settings(settings: &GenerationSettings) -> Result<Self, CoreError> {
        let overrides = settings.overrides_for(ProviderKind::Claude);
        Ok(Self {
            client: build_client(Duration::from_secs(settings.timeout_secs))?,
            api_key: non_empty(settings.anthropic_api_key.as_deref()),
            endpoint: overrides
                .endpoint
                .clone()
                .unwrap_or_else(|| CLAUDE_ENDPOINT.to_string()),
            model: overrides
                .model
                .clone()
                .unwrap_or_else(|| CLAUDE_DEFAULT_MODEL.to_string()),
            decoding: Decoding::from(settings),
        })
    }
}

#[async_trait]
impl TextGenerator for ClaudeProvider {
    fn provider_name(&self) -> &str {
        "claude"
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| missing_key(self.provider_name()))?;

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.decoding.max_output_tokens,
            temperature: self.decoding.temperature,
            system: PERSONA,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        info!("Requesting generation from claude model {}", self.model);
        let request = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        let response: MessagesResponse = send_json(self.provider_name(), request).await?;

        response
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| empty_response(self.provider_name(), "text content"))
    }
}
