//! Judges turn a response plus pass criteria into a [`Verdict`].
//!
//! - [`SimpleJudge`]: one provider call, `YES` / `NO` text protocol.
//! - [`ConsensusJudge`]: N delegates, majority / unanimous / threshold vote.
//! - [`WeightedJudge`]: N weighted delegates, combined into a score.
//!
//! Composite judges own their delegates and call them concurrently. A single
//! delegate failure fails the whole evaluation.

mod composite;
mod consensus;
mod prompt;
mod simple;
mod weighted;

pub use composite::Delegate;
pub use consensus::{ConsensusJudge, ConsensusStrategy};
pub use prompt::{build_prompt, parse_verdict};
pub use simple::SimpleJudge;
pub use weighted::WeightedJudge;

use crate::errors::JudgeError;
use crate::verdict::{JudgeConfig, Verdict};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Judge: Send + Sync {
    /// Short label used in logs and result metadata.
    fn name(&self) -> &str;

    async fn evaluate(
        &self,
        response: &Value,
        criteria: &str,
        config: &JudgeConfig,
    ) -> Result<Verdict, JudgeError>;
}
