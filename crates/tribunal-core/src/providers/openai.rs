use super::JudgeProvider;
use crate::verdict::JudgeConfig;
use async_trait::async_trait;
use serde_json::json;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI-compatible chat-completions judge backend.
pub struct OpenAIProvider {
    pub api_key: String,
    pub base_url: String,
    pub default_model: String,
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    fn request_body(&self, prompt: &str, config: &JudgeConfig) -> serde_json::Value {
        let mut body = json!({
            "model": config.model.as_deref().unwrap_or(&self.default_model),
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": config.temperature.unwrap_or(0.0),
        });
        if let Some(max_tokens) = config.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl JudgeProvider for OpenAIProvider {
    async fn call(&self, prompt: &str, config: &JudgeConfig) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(prompt, config);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI chat API error (status {}): {}", status, error_text);
        }

        let json: serde_json::Value = resp.json().await?;
        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("OpenAI API response missing content"))?
            .to_string();
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}
