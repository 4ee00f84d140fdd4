use super::composite::{evaluate_all, Delegate};
use super::Judge;
use crate::errors::JudgeError;
use crate::verdict::{JudgeConfig, Verdict};
use async_trait::async_trait;
use serde_json::{json, Value};

/// Weighted average of delegate pass-probabilities.
///
/// Produces a `Score`; binarizing it is left to the caller (`pass_threshold`).
pub struct WeightedJudge {
    name: String,
    delegates: Vec<Delegate>,
    weights: Vec<f64>,
}

impl WeightedJudge {
    pub fn new(delegates: Vec<(Delegate, f64)>) -> Result<Self, JudgeError> {
        if delegates.is_empty() {
            return Err(JudgeError::InvalidConfig(
                "weighted judge needs at least one delegate".into(),
            ));
        }
        if let Some((i, w)) = delegates
            .iter()
            .enumerate()
            .map(|(i, (_, w))| (i, *w))
            .find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(JudgeError::InvalidConfig(format!(
                "weight of delegate #{} must be a non-negative number, got {}",
                i, w
            )));
        }
        let (delegates, weights): (Vec<_>, Vec<_>) = delegates.into_iter().unzip();
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(JudgeError::InvalidConfig(
                "weighted judge weights sum to zero".into(),
            ));
        }
        Ok(Self {
            name: "weighted".to_string(),
            delegates,
            weights,
        })
    }

    /// `weight_i / Σweight`, in delegate order.
    pub fn effective_weights(&self) -> Vec<f64> {
        let total: f64 = self.weights.iter().sum();
        self.weights.iter().map(|w| w / total).collect()
    }
}

#[async_trait]
impl Judge for WeightedJudge {
    fn name(&self) -> &str {
        &self.name
    }

    async fn evaluate(
        &self,
        response: &Value,
        criteria: &str,
        config: &JudgeConfig,
    ) -> Result<Verdict, JudgeError> {
        let outcomes = evaluate_all(&self.delegates, response, criteria, config).await?;
        let effective = self.effective_weights();

        let weighted_score: f64 = outcomes
            .iter()
            .zip(&effective)
            .map(|(o, w)| w * o.normalized)
            .sum::<f64>()
            // float rounding can drift just past the unit interval
            .clamp(0.0, 1.0);

        let distribution: Vec<Value> = outcomes
            .iter()
            .enumerate()
            .map(|(index, o)| {
                json!({
                    "index": index,
                    "weight": self.weights[index],
                    "effective_weight": effective[index],
                    "normalized": o.normalized,
                    "contribution": effective[index] * o.normalized,
                    "reasoning": o.verdict.reasoning,
                })
            })
            .collect();

        Ok(Verdict::score(weighted_score)
            .with_meta("strategy", "weighted")
            .with_meta("weighted_score", weighted_score)
            .with_meta("distribution", Value::Array(distribution)))
    }
}
