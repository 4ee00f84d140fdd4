use crate::errors::CaseError;
use crate::judge::Judge;
use crate::verdict::{JudgeConfig, Verdict};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// One input/criteria pair. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalCase {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub input: Value,
    pub criteria: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
}

impl EvalCase {
    pub fn new(input: impl Into<Value>, criteria: impl Into<String>) -> Self {
        Self {
            id: None,
            input: input.into(),
            criteria: criteria.into(),
            category: None,
            expected: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_expected(mut self, expected: impl Into<Value>) -> Self {
        self.expected = Some(expected.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Pass,
    Fail,
    Error,
}

/// Outcome of exactly one case. Built once by the executor, never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub dataset: String,
    pub index: usize,
    pub case: EvalCase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    pub status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CaseError>,
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl CaseResult {
    /// Display label: the case id when present, else `dataset#index`.
    pub fn label(&self) -> String {
        match &self.case.id {
            Some(id) => format!("{}/{}", self.dataset, id),
            None => format!("{}#{}", self.dataset, self.index),
        }
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
}

impl RunMetrics {
    pub fn record(&mut self, status: CaseStatus) {
        self.total += 1;
        match status {
            CaseStatus::Pass => self.passed += 1,
            CaseStatus::Fail => self.failed += 1,
            CaseStatus::Error => self.errored += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Random v4 id, unique per `Runner::run` call.
    pub run_id: String,
    pub status: RunStatus,
    /// Completion order. Matches input order only for sequential runs.
    pub results: Vec<CaseResult>,
    pub metrics: RunMetrics,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn pass_rate(&self) -> Option<f64> {
        if self.metrics.total == 0 {
            None
        } else {
            Some(self.metrics.passed as f64 / self.metrics.total as f64)
        }
    }

    pub fn all_passed(&self) -> bool {
        self.status == RunStatus::Completed
            && self.metrics.failed == 0
            && self.metrics.errored == 0
    }
}

/// Produces the response under evaluation for a case input.
///
/// `context` is the value returned by the dataset's [`Setup`], if it has one.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, input: &Value, context: Option<&Value>) -> anyhow::Result<Value>;
}

/// Dataset-level initializer, run once before any of the dataset's cases.
#[async_trait]
pub trait Setup: Send + Sync {
    async fn setup(&self) -> anyhow::Result<Value>;
}

pub struct FnResponder<F>(F);

#[async_trait]
impl<F, Fut> ResponseGenerator for FnResponder<F>
where
    F: Fn(Value, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn generate(&self, input: &Value, context: Option<&Value>) -> anyhow::Result<Value> {
        (self.0)(input.clone(), context.cloned()).await
    }
}

/// Wrap an async closure `(input, context) -> response` as a [`ResponseGenerator`].
pub fn response_fn<F, Fut>(f: F) -> Arc<dyn ResponseGenerator>
where
    F: Fn(Value, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnResponder(f))
}

pub struct FnSetup<F>(F);

#[async_trait]
impl<F, Fut> Setup for FnSetup<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn setup(&self) -> anyhow::Result<Value> {
        (self.0)().await
    }
}

pub fn setup_fn<F, Fut>(f: F) -> Arc<dyn Setup>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnSetup(f))
}

/// Everything the runner needs to evaluate one group of cases.
#[derive(Clone)]
pub struct Dataset {
    pub name: String,
    pub cases: Vec<EvalCase>,
    pub responder: Arc<dyn ResponseGenerator>,
    pub judge: Arc<dyn Judge>,
    pub config: JudgeConfig,
    pub setup: Option<Arc<dyn Setup>>,
}

impl Dataset {
    pub fn new(
        name: impl Into<String>,
        cases: Vec<EvalCase>,
        responder: Arc<dyn ResponseGenerator>,
        judge: Arc<dyn Judge>,
    ) -> Self {
        Self {
            name: name.into(),
            cases,
            responder,
            judge,
            config: JudgeConfig::default(),
            setup: None,
        }
    }

    pub fn with_config(mut self, config: JudgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_setup(mut self, setup: Arc<dyn Setup>) -> Self {
        self.setup = Some(setup);
        self
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("cases", &self.cases.len())
            .field("judge", &self.judge.name())
            .field("has_setup", &self.setup.is_some())
            .finish()
    }
}
