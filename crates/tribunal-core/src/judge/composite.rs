use super::Judge;
use crate::errors::JudgeError;
use crate::verdict::{JudgeConfig, Verdict};
use futures::future::try_join_all;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// A sub-judge of a composite, optionally with its own config.
///
/// Without an override the delegate sees the config the composite was called with.
pub struct Delegate {
    pub judge: Box<dyn Judge>,
    pub config: Option<JudgeConfig>,
}

impl Delegate {
    pub fn new(judge: impl Judge + 'static) -> Self {
        Self {
            judge: Box::new(judge),
            config: None,
        }
    }

    pub fn boxed(judge: Box<dyn Judge>) -> Self {
        Self {
            judge,
            config: None,
        }
    }

    pub fn with_config(mut self, config: JudgeConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn effective_config<'a>(&'a self, parent: &'a JudgeConfig) -> &'a JudgeConfig {
        self.config.as_ref().unwrap_or(parent)
    }
}

pub(crate) struct DelegateOutcome {
    pub(crate) verdict: Verdict,
    pub(crate) normalized: f64,
}

/// Run every delegate concurrently and normalize each verdict.
///
/// Joined before returning. The first delegate error wins and is wrapped in
/// `DelegateFailed`; a verdict that cannot be normalized fails with its own error.
pub(crate) async fn evaluate_all(
    delegates: &[Delegate],
    response: &Value,
    criteria: &str,
    config: &JudgeConfig,
) -> Result<Vec<DelegateOutcome>, JudgeError> {
    let calls = delegates.iter().enumerate().map(|(index, d)| async move {
        let cfg = d.effective_config(config);
        let verdict = d
            .judge
            .evaluate(response, criteria, cfg)
            .await
            .map_err(|e| JudgeError::delegate(index, e))?;
        let normalized = verdict.normalize(cfg)?;
        Ok::<_, JudgeError>(DelegateOutcome {
            verdict,
            normalized,
        })
    });
    try_join_all(calls).await
}

pub(crate) fn bucket(normalized: f64) -> String {
    format!("{:.2}", normalized)
}

pub(crate) fn distribution(outcomes: &[DelegateOutcome]) -> BTreeMap<String, usize> {
    let mut dist = BTreeMap::new();
    for o in outcomes {
        *dist.entry(bucket(o.normalized)).or_insert(0) += 1;
    }
    dist
}

/// Indexed per-delegate detail: normalized value, reasoning and metadata.
pub(crate) fn delegate_details(outcomes: &[DelegateOutcome]) -> Vec<Value> {
    outcomes
        .iter()
        .enumerate()
        .map(|(index, o)| {
            json!({
                "index": index,
                "value": o.verdict.value,
                "normalized": o.normalized,
                "reasoning": o.verdict.reasoning,
                "metadata": Value::Object(o.verdict.metadata.clone()),
            })
        })
        .collect()
}

pub(crate) fn distribution_value(outcomes: &[DelegateOutcome]) -> Value {
    let map: Map<String, Value> = distribution(outcomes)
        .into_iter()
        .map(|(k, v)| (k, json!(v)))
        .collect();
    Value::Object(map)
}
