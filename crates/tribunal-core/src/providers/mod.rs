use crate::verdict::JudgeConfig;
use async_trait::async_trait;

pub mod fake;
pub mod openai;

/// Wire-level judge backend: takes a rendered prompt, returns raw model text.
///
/// The simple judge expects the text to start with `YES` or `NO`. Transport
/// failures are returned as errors and passed through opaquely.
#[async_trait]
pub trait JudgeProvider: Send + Sync {
    async fn call(&self, prompt: &str, config: &JudgeConfig) -> anyhow::Result<String>;
    fn provider_name(&self) -> &'static str;
}
