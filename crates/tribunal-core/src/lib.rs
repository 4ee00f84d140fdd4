//! Evaluation execution core.
//!
//! A [`engine::Runner`] takes one or more [`model::Dataset`]s, runs every eligible
//! case through its response generator and [`judge::Judge`], classifies the verdict
//! and streams each [`model::CaseResult`] to a [`report::Reporter`].

pub mod config;
pub mod engine;
pub mod errors;
pub mod judge;
pub mod model;
pub mod providers;
pub mod report;
pub mod verdict;

pub use config::RunConfig;
pub use engine::{CaseExecutor, Runner};
pub use errors::{CaseError, ConfigError, JudgeError, ReporterError, RunError};
pub use judge::{ConsensusJudge, ConsensusStrategy, Judge, SimpleJudge, WeightedJudge};
pub use model::{CaseResult, CaseStatus, Dataset, EvalCase, RunMetrics, RunStatus, RunSummary};
pub use report::Reporter;
pub use verdict::{JudgeConfig, Verdict, VerdictValue};
