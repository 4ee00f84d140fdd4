//! Run settings and YAML suite files.
//!
//! A suite file lists datasets, each with cases, a judge tree and judge config.
//! Responses come from the file itself (`expected` replay or input echo); live
//! response generators are wired in code through [`crate::model::Dataset`].

use crate::errors::{ConfigError, JudgeError, RunError};
use crate::judge::{ConsensusJudge, ConsensusStrategy, Delegate, Judge, SimpleJudge, WeightedJudge};
use crate::model::{Dataset, EvalCase, ResponseGenerator};
use crate::providers::JudgeProvider;
use crate::verdict::JudgeConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

fn default_true() -> bool {
    true
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_true")]
    pub parallel: bool,
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Empty means no filter.
    #[serde(default)]
    pub categories: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_timeout_secs: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            categories: BTreeSet::new(),
            case_timeout_secs: None,
        }
    }
}

impl RunConfig {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_case_timeout(mut self, secs: u64) -> Self {
        self.case_timeout_secs = Some(secs);
        self
    }

    pub fn validate(&self) -> Result<(), RunError> {
        if self.max_concurrency == 0 {
            return Err(RunError::InvalidConfig(
                "max_concurrency must be at least 1".into(),
            ));
        }
        if self.case_timeout_secs == Some(0) {
            return Err(RunError::InvalidConfig(
                "case_timeout_secs must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }

    pub fn case_timeout(&self) -> Option<Duration> {
        self.case_timeout_secs.map(Duration::from_secs)
    }

    /// Category filter: everything passes an empty filter, otherwise the case
    /// must carry one of the listed categories.
    pub fn admits(&self, case: &EvalCase) -> bool {
        self.categories.is_empty()
            || case
                .category
                .as_ref()
                .is_some_and(|c| self.categories.contains(c))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Replay the case's recorded `expected` value.
    #[default]
    Expected,
    /// Echo the case input back as the response.
    Input,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategySpec {
    Majority,
    Unanimous,
    Threshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DelegateSpec {
    pub judge: JudgeSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<JudgeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JudgeSpec {
    Simple {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Consensus {
        strategy: StrategySpec,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f64>,
        #[serde(default)]
        aggregate_metadata: bool,
        judges: Vec<DelegateSpec>,
    },
    Weighted {
        judges: Vec<DelegateSpec>,
    },
}

impl Default for JudgeSpec {
    fn default() -> Self {
        JudgeSpec::Simple { name: None }
    }
}

impl JudgeSpec {
    /// Build the judge tree. Every simple leaf talks to `provider`.
    pub fn build(&self, provider: &Arc<dyn JudgeProvider>) -> Result<Box<dyn Judge>, JudgeError> {
        match self {
            JudgeSpec::Simple { name } => {
                let mut judge = SimpleJudge::new(provider.clone());
                if let Some(name) = name {
                    judge = judge.with_name(name.clone());
                }
                Ok(Box::new(judge))
            }
            JudgeSpec::Consensus {
                strategy,
                threshold,
                aggregate_metadata,
                judges,
            } => {
                let strategy = match (strategy, threshold) {
                    (StrategySpec::Majority, _) => ConsensusStrategy::Majority,
                    (StrategySpec::Unanimous, _) => ConsensusStrategy::Unanimous,
                    (StrategySpec::Threshold, Some(t)) => ConsensusStrategy::Threshold(*t),
                    (StrategySpec::Threshold, None) => {
                        return Err(JudgeError::InvalidConfig(
                            "consensus strategy 'threshold' requires `threshold`".into(),
                        ))
                    }
                };
                let delegates = judges
                    .iter()
                    .map(|d| d.build(provider))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Box::new(
                    ConsensusJudge::new(delegates, strategy)?
                        .with_aggregate_metadata(*aggregate_metadata),
                ))
            }
            JudgeSpec::Weighted { judges } => {
                let delegates = judges
                    .iter()
                    .enumerate()
                    .map(|(i, d)| {
                        let weight = d.weight.ok_or_else(|| {
                            JudgeError::InvalidConfig(format!(
                                "weighted delegate #{} is missing `weight`",
                                i
                            ))
                        })?;
                        Ok((d.build(provider)?, weight))
                    })
                    .collect::<Result<Vec<_>, JudgeError>>()?;
                Ok(Box::new(WeightedJudge::new(delegates)?))
            }
        }
    }
}

impl DelegateSpec {
    fn build(&self, provider: &Arc<dyn JudgeProvider>) -> Result<Delegate, JudgeError> {
        let mut delegate = Delegate::boxed(self.judge.build(provider)?);
        if let Some(cfg) = &self.config {
            delegate = delegate.with_config(cfg.clone());
        }
        Ok(delegate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
    pub name: String,
    #[serde(default)]
    pub response: ResponseSource,
    #[serde(default)]
    pub judge: JudgeSpec,
    #[serde(default)]
    pub config: JudgeConfig,
    pub cases: Vec<EvalCase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteFile {
    pub version: u32,
    #[serde(default)]
    pub run: RunConfig,
    pub datasets: Vec<DatasetSpec>,
}

impl SuiteFile {
    pub fn total_cases(&self) -> usize {
        self.datasets.iter().map(|d| d.cases.len()).sum()
    }

    /// Turn the file into runnable datasets, building judges on top of `provider`.
    pub fn into_datasets(
        self,
        provider: Arc<dyn JudgeProvider>,
    ) -> Result<(RunConfig, Vec<Dataset>), ConfigError> {
        let mut datasets = Vec::with_capacity(self.datasets.len());
        for spec in self.datasets {
            let judge = spec
                .judge
                .build(&provider)
                .map_err(|source| ConfigError::Judge {
                    dataset: spec.name.clone(),
                    source,
                })?;
            let responder: Arc<dyn ResponseGenerator> = match spec.response {
                ResponseSource::Expected => Arc::new(RecordedResponses::from_cases(&spec.cases)),
                ResponseSource::Input => Arc::new(EchoInput),
            };
            datasets.push(
                Dataset::new(spec.name, spec.cases, responder, Arc::from(judge))
                    .with_config(spec.config),
            );
        }
        Ok((self.run, datasets))
    }
}

pub fn load_suite(path: &Path) -> Result<SuiteFile, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_suite(&raw)
}

pub fn parse_suite(raw: &str) -> Result<SuiteFile, ConfigError> {
    let suite: SuiteFile = serde_yaml::from_str(raw)?;
    if suite.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: suite.version,
            supported: SUPPORTED_CONFIG_VERSION,
        });
    }
    if suite.datasets.is_empty() {
        return Err(ConfigError::Invalid("suite has no datasets".into()));
    }
    suite
        .run
        .validate()
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

    let mut seen = BTreeSet::new();
    for d in &suite.datasets {
        if !seen.insert(d.name.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate dataset name '{}'",
                d.name
            )));
        }
        if d.response == ResponseSource::Expected {
            RecordedResponses::check_unambiguous(&d.name, &d.cases)?;
        }
    }
    Ok(suite)
}

/// Replays `expected` values looked up by case input.
pub struct RecordedResponses {
    by_input: HashMap<String, Value>,
}

impl RecordedResponses {
    pub fn from_cases(cases: &[EvalCase]) -> Self {
        let by_input = cases
            .iter()
            .filter_map(|c| c.expected.clone().map(|e| (c.input.to_string(), e)))
            .collect();
        Self { by_input }
    }

    fn check_unambiguous(dataset: &str, cases: &[EvalCase]) -> Result<(), ConfigError> {
        let mut seen: HashMap<String, &Value> = HashMap::new();
        for c in cases {
            let Some(expected) = &c.expected else {
                continue;
            };
            if let Some(prev) = seen.insert(c.input.to_string(), expected) {
                if prev != expected {
                    return Err(ConfigError::Invalid(format!(
                        "dataset '{}': input {} has conflicting recorded responses",
                        dataset, c.input
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ResponseGenerator for RecordedResponses {
    async fn generate(&self, input: &Value, _context: Option<&Value>) -> anyhow::Result<Value> {
        self.by_input
            .get(&input.to_string())
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no recorded response for input {}", input))
    }
}

pub struct EchoInput;

#[async_trait]
impl ResponseGenerator for EchoInput {
    async fn generate(&self, input: &Value, _context: Option<&Value>) -> anyhow::Result<Value> {
        Ok(input.clone())
    }
}
