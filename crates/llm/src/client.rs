use std::env;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::adapter::{AdapterError, AnsweringAdapter, GenerateRequest, Generation};
use crate::local::synthesize_local_answer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Anthropic,
    Gemini,
    Local,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Local => "local",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" | "ollama" => Some(LlmProvider::OpenAi),
            "anthropic" => Some(LlmProvider::Anthropic),
            "gemini" => Some(LlmProvider::Gemini),
            "local" => Some(LlmProvider::Local),
            _ => None,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "gpt-4.1-mini",
            LlmProvider::Anthropic => "claude-3-5-sonnet",
            LlmProvider::Gemini => "gemini-1.5-flash",
            LlmProvider::Local => "local-extractive",
        }
    }
}

#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    provider: LlmProvider,
    model: String,
    config: ProviderConfig,
}

#[derive(Clone)]
enum ProviderConfig {
    OpenAi(OpenAiConfig),
    Anthropic(AnthropicConfig),
    Gemini(GeminiConfig),
    Local,
}

#[derive(Clone)]
struct OpenAiConfig {
    api_key: Option<String>,
    base_url: String,
}

#[derive(Clone)]
struct AnthropicConfig {
    api_key: String,
}

#[derive(Clone)]
struct GeminiConfig {
    api_key: String,
}

impl LlmClient {
    /// Builds a client from environment credentials. `base_url` overrides the
    /// OpenAI endpoint so self-hosted OpenAI-compatible servers can act as
    /// the local model.
    pub fn new(
        provider: LlmProvider,
        model: impl Into<String>,
        base_url: Option<String>,
    ) -> Result<Self> {
        let model = model.into();
        let http = Client::new();
        let config = match provider {
            LlmProvider::OpenAi => {
                let base_url = base_url
                    .or_else(|| env::var("OPENAI_BASE_URL").ok())
                    .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
                let api_key = env::var("OPENAI_API_KEY").ok();
                if api_key.is_none() && base_url.contains("api.openai.com") {
                    return Err(anyhow!("OPENAI_API_KEY is not set"));
                }
                ProviderConfig::OpenAi(OpenAiConfig { api_key, base_url })
            }
            LlmProvider::Anthropic => ProviderConfig::Anthropic(AnthropicConfig {
                api_key: read_api_key("ANTHROPIC_API_KEY")?,
            }),
            LlmProvider::Gemini => ProviderConfig::Gemini(GeminiConfig {
                api_key: read_api_key("GEMINI_API_KEY")?,
            }),
            LlmProvider::Local => ProviderConfig::Local,
        };
        Ok(Self {
            http,
            provider,
            model,
            config,
        })
    }

    pub fn local() -> Self {
        Self {
            http: Client::new(),
            provider: LlmProvider::Local,
            model: LlmProvider::Local.default_model().to_string(),
            config: ProviderConfig::Local,
        }
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_remote(&self) -> bool {
        match &self.config {
            ProviderConfig::OpenAi(cfg) => !is_loopback(&cfg.base_url),
            ProviderConfig::Anthropic(_) | ProviderConfig::Gemini(_) => true,
            ProviderConfig::Local => false,
        }
    }

    pub async fn chat(&self, req: &GenerateRequest) -> Result<Generation> {
        match &self.config {
            ProviderConfig::OpenAi(cfg) => self.chat_openai(cfg, req).await,
            ProviderConfig::Anthropic(cfg) => self.chat_anthropic(cfg, req).await,
            ProviderConfig::Gemini(cfg) => self.chat_gemini(cfg, req).await,
            ProviderConfig::Local => Ok(Generation {
                text: synthesize_local_answer(&req.prompt),
                prompt_tokens: 0,
                completion_tokens: 0,
            }),
        }
    }

    async fn chat_openai(&self, cfg: &OpenAiConfig, req: &GenerateRequest) -> Result<Generation> {
        let url = format!("{}/chat/completions", cfg.base_url.trim_end_matches('/'));
        let mut messages = Vec::new();
        if let Some(system) = &req.system {
            messages.push(json!({"role": "system", "content": system }));
        }
        messages.push(json!({"role": "user", "content": req.prompt }));
        let payload = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": req.max_tokens,
        });
        let mut builder = self.http.post(&url).json(&payload);
        if let Some(key) = &cfg.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .with_context(|| "openai request failed")?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("openai returned error (status {status}): {body}"));
        }
        let value: Value = serde_json::from_str(&body).context("failed to decode openai response")?;
        let text = extract_openai_text(&value)
            .ok_or_else(|| anyhow!("missing text in OpenAI response"))?;
        let usage: OpenAiUsage = value
            .get("usage")
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .unwrap_or_default();
        Ok(Generation {
            text,
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
        })
    }

    async fn chat_anthropic(
        &self,
        cfg: &AnthropicConfig,
        req: &GenerateRequest,
    ) -> Result<Generation> {
        let mut payload = json!({
            "model": self.model,
            "max_tokens": req.max_tokens,
            "messages": [ { "role": "user", "content": req.prompt } ],
        });
        if let Some(system) = &req.system {
            payload["system"] = json!(system);
        }
        let response = self
            .http
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", &cfg.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .with_context(|| "anthropic request failed")?
            .error_for_status()
            .context("anthropic returned an error")?
            .json::<AnthropicResponse>()
            .await
            .context("failed to decode anthropic response")?;
        let text = response
            .content
            .into_iter()
            .find_map(|part| part.text)
            .ok_or_else(|| anyhow!("missing text in Anthropic response"))?;
        let usage = response.usage.unwrap_or_default();
        Ok(Generation {
            text,
            prompt_tokens: usage.input_tokens.unwrap_or(0),
            completion_tokens: usage.output_tokens.unwrap_or(0),
        })
    }

    async fn chat_gemini(&self, cfg: &GeminiConfig, req: &GenerateRequest) -> Result<Generation> {
        let mut prompt = String::new();
        if let Some(system) = &req.system {
            prompt.push_str("[SYSTEM]\n");
            prompt.push_str(system.trim());
            prompt.push_str("\n\n");
        }
        prompt.push_str(&req.prompt);
        let payload = json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
            "generationConfig": { "maxOutputTokens": req.max_tokens },
        });
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent",
            self.model
        );
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &cfg.api_key)
            .json(&payload)
            .send()
            .await
            .with_context(|| "gemini request failed")?
            .error_for_status()
            .context("gemini returned an error")?
            .json::<GeminiResponse>()
            .await
            .context("failed to decode gemini response")?;
        let text = response
            .candidates
            .and_then(|mut c| c.pop())
            .and_then(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .find_map(|part| part.text)
            })
            .ok_or_else(|| anyhow!("missing text in Gemini response"))?;
        let usage = response.usage.unwrap_or_default();
        Ok(Generation {
            text,
            prompt_tokens: usage.prompt_tokens.unwrap_or(0),
            completion_tokens: usage.completion_tokens.unwrap_or(0),
        })
    }
}

#[async_trait]
impl AnsweringAdapter for LlmClient {
    fn name(&self) -> &str {
        self.provider.as_str()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<Generation, AdapterError> {
        let started = Instant::now();
        let generation = tokio::time::timeout(request.timeout, self.chat(request))
            .await
            .map_err(|_| AdapterError::Timeout(request.timeout))?
            .map_err(|err| AdapterError::Provider(format!("{err:#}")))?;
        debug!(
            provider = self.provider.as_str(),
            model = %self.model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            total_tokens = generation.total_tokens(),
            "generation finished"
        );
        if generation.text.trim().is_empty() {
            return Err(AdapterError::Provider(format!(
                "{} returned an empty completion",
                self.provider.as_str()
            )));
        }
        Ok(generation)
    }
}

fn is_loopback(base_url: &str) -> bool {
    let lower = base_url.to_lowercase();
    lower.contains("://localhost") || lower.contains("://127.0.0.1") || lower.contains("://[::1]")
}

fn read_api_key(var: &str) -> Result<String> {
    let value = env::var(var).map_err(|_| anyhow!(format!("{var} is not set")))?;
    if value.trim().is_empty() {
        return Err(anyhow!(format!("{var} is empty")));
    }
    Ok(value)
}

fn extract_openai_text(value: &Value) -> Option<String> {
    let choice = value.get("choices")?.as_array()?.first()?;
    if let Some(text) = choice.get("text").and_then(|t| t.as_str()) {
        return Some(text.to_string());
    }
    let content = choice.get("message")?.get("content")?;
    if let Some(text) = content.as_str() {
        return Some(text.to_string());
    }
    content
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(|t| t.as_str()))
        .map(|text| text.to_string())
}

#[derive(Default, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: Option<u32>,
    completion_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
    #[serde(default)]
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: Option<String>,
}

#[derive(Default, Deserialize)]
struct AnthropicUsage {
    input_tokens: Option<u32>,
    output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    #[serde(rename = "usageMetadata")]
    usage: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Deserialize)]
struct GeminiPart {
    text: Option<String>,
}

#[derive(Default, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "promptTokenCount")]
    prompt_tokens: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    completion_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn provider_names_roundtrip() {
        for provider in [
            LlmProvider::OpenAi,
            LlmProvider::Anthropic,
            LlmProvider::Gemini,
            LlmProvider::Local,
        ] {
            assert_eq!(LlmProvider::from_str(provider.as_str()), Some(provider));
        }
        assert_eq!(LlmProvider::from_str("Ollama"), Some(LlmProvider::OpenAi));
        assert_eq!(LlmProvider::from_str("unknown"), None);
    }

    #[test]
    fn loopback_openai_endpoint_is_not_remote() {
        let client = LlmClient::new(
            LlmProvider::OpenAi,
            "llama3",
            Some("http://localhost:11434/v1".to_string()),
        )
        .unwrap();
        assert!(!client.is_remote());
        assert!(!LlmClient::local().is_remote());
    }

    #[test]
    fn extracts_chat_completion_text() {
        let value = json!({"choices": [{"message": {"content": "hello"}}]});
        assert_eq!(extract_openai_text(&value).as_deref(), Some("hello"));
        let parts = json!({"choices": [{"message": {"content": [{"type": "text", "text": "hi"}]}}]});
        assert_eq!(extract_openai_text(&parts).as_deref(), Some("hi"));
        assert_eq!(extract_openai_text(&json!({})), None);
    }

    #[tokio::test]
    async fn local_adapter_answers_from_context() {
        let request = GenerateRequest {
            system: None,
            prompt: "=== CONTEXT START ===\n[SOURCE: msmed-act, passage p1]\nMicro enterprises have investment up to one crore.\n=== CONTEXT END ===\n\nQuestion: What is a micro enterprise?\nAnswer:".to_string(),
            max_tokens: 64,
            timeout: Duration::from_secs(1),
        };
        let generation = LlmClient::local().generate(&request).await.unwrap();
        assert!(generation.text.contains("Micro enterprises"));
    }
}
