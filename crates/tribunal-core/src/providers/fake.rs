use super::JudgeProvider;
use crate::verdict::JudgeConfig;
use async_trait::async_trait;

/// Provider that always answers with the same text. Used for offline runs and tests.
#[derive(Debug, Clone)]
pub struct FakeProvider {
    fixed_response: String,
}

impl FakeProvider {
    pub fn new(fixed_response: impl Into<String>) -> Self {
        Self {
            fixed_response: fixed_response.into(),
        }
    }

    pub fn passing() -> Self {
        Self::new("YES")
    }

    pub fn failing() -> Self {
        Self::new("NO")
    }
}

#[async_trait]
impl JudgeProvider for FakeProvider {
    async fn call(&self, _prompt: &str, _config: &JudgeConfig) -> anyhow::Result<String> {
        Ok(self.fixed_response.clone())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
