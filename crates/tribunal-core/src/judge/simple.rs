use super::prompt::{build_prompt, parse_verdict};
use super::Judge;
use crate::errors::JudgeError;
use crate::providers::JudgeProvider;
use crate::verdict::{JudgeConfig, Verdict, VerdictValue};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Single-delegate judge speaking the `YES` / `NO` text protocol.
#[derive(Clone)]
pub struct SimpleJudge {
    name: String,
    provider: Arc<dyn JudgeProvider>,
}

impl SimpleJudge {
    pub fn new(provider: Arc<dyn JudgeProvider>) -> Self {
        Self {
            name: format!("simple:{}", provider.provider_name()),
            provider,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Judge for SimpleJudge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(
        &self,
        response: &Value,
        criteria: &str,
        config: &JudgeConfig,
    ) -> Result<Verdict, JudgeError> {
        let span = info_span!(
            "judge.simple",
            "judge.name" = self.name.as_str(),
            "judge.provider" = self.provider.provider_name(),
            "judge.model" = config.model.as_deref().unwrap_or("default"),
            "judge.passed" = tracing::field::Empty,
            "error" = tracing::field::Empty,
            "error.message" = tracing::field::Empty
        );

        async move {
            let prompt = build_prompt(criteria, response);
            let span = tracing::Span::current();

            let raw = match self.provider.call(&prompt, config).await {
                Ok(raw) => raw,
                Err(e) => {
                    let msg = format!("{e:#}");
                    span.record("error", true);
                    span.record("error.message", msg.as_str());
                    return Err(JudgeError::ProviderTransport(msg));
                }
            };

            match parse_verdict(&raw) {
                Ok(verdict) => {
                    if let VerdictValue::Boolean(passed) = verdict.value {
                        span.record("judge.passed", passed);
                    }
                    debug!(chars = raw.len(), "judge responded");
                    Ok(verdict.with_meta("judge", self.name.as_str()))
                }
                Err(e) => {
                    span.record("error", true);
                    span.record("error.message", e.to_string().as_str());
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }
}
