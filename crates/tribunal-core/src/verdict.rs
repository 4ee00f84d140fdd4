use crate::errors::JudgeError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Default cut-off between pass and fail on the normalized [0, 1] scale.
pub const DEFAULT_PASS_THRESHOLD: f64 = 0.5;

/// Raw value a judge produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum VerdictValue {
    Boolean(bool),
    Score(f64),
    Category(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub value: VerdictValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Verdict {
    pub fn new(value: VerdictValue) -> Self {
        Self {
            value,
            reasoning: None,
            metadata: Map::new(),
        }
    }

    pub fn boolean(b: bool) -> Self {
        Self::new(VerdictValue::Boolean(b))
    }

    pub fn score(s: f64) -> Self {
        Self::new(VerdictValue::Score(s))
    }

    pub fn category(c: impl Into<String>) -> Self {
        Self::new(VerdictValue::Category(c.into()))
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Pass-probability in [0, 1].
    ///
    /// Booleans map to 1.0 / 0.0 and scores pass through. Categories are only
    /// normalized through an explicit `category_weights` entry; there is no default.
    pub fn normalize(&self, config: &JudgeConfig) -> Result<f64, JudgeError> {
        match &self.value {
            VerdictValue::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            VerdictValue::Score(s) => check_unit(*s),
            VerdictValue::Category(c) => config
                .category_weights
                .get(c)
                .copied()
                .ok_or_else(|| JudgeError::UnclassifiableVerdict(c.clone()))
                .and_then(check_unit),
        }
    }

    /// Pass/fail decision used by the case executor.
    pub fn classify(&self, config: &JudgeConfig) -> Result<bool, JudgeError> {
        match &self.value {
            VerdictValue::Boolean(b) => Ok(*b),
            VerdictValue::Score(s) => Ok(check_unit(*s)? >= config.pass_threshold),
            VerdictValue::Category(c) => {
                if let Some(pass) = &config.pass_categories {
                    return Ok(pass.contains(c));
                }
                Ok(self.normalize(config)? >= config.pass_threshold)
            }
        }
    }
}

fn check_unit(s: f64) -> Result<f64, JudgeError> {
    if s.is_finite() && (0.0..=1.0).contains(&s) {
        Ok(s)
    } else {
        Err(JudgeError::ScoreOutOfRange(s))
    }
}

fn default_pass_threshold() -> f64 {
    DEFAULT_PASS_THRESHOLD
}

/// Per-dataset (or per-delegate) judge settings.
///
/// Unknown keys are kept in `extra` and handed to the provider untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,
    #[serde(default)]
    pub category_weights: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pass_categories: Option<BTreeSet<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            model: None,
            temperature: None,
            max_tokens: None,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            category_weights: BTreeMap::new(),
            pass_categories: None,
            extra: Map::new(),
        }
    }
}

impl JudgeConfig {
    pub fn with_category_weight(mut self, category: impl Into<String>, weight: f64) -> Self {
        self.category_weights.insert(category.into(), weight);
        self
    }

    pub fn with_pass_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pass_categories = Some(categories.into_iter().map(Into::into).collect());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_and_scores_normalize_without_config() {
        let cfg = JudgeConfig::default();
        assert_eq!(Verdict::boolean(true).normalize(&cfg).unwrap(), 1.0);
        assert_eq!(Verdict::boolean(false).normalize(&cfg).unwrap(), 0.0);
        assert_eq!(Verdict::score(0.42).normalize(&cfg).unwrap(), 0.42);
    }

    #[test]
    fn category_requires_explicit_weight() {
        let v = Verdict::category("x");
        assert_eq!(
            v.normalize(&JudgeConfig::default()),
            Err(JudgeError::UnclassifiableVerdict("x".into()))
        );
        let cfg = JudgeConfig::default().with_category_weight("x", 0.25);
        assert_eq!(v.normalize(&cfg).unwrap(), 0.25);
    }

    #[test]
    fn out_of_range_score_is_rejected() {
        let cfg = JudgeConfig::default();
        assert_eq!(
            Verdict::score(1.5).normalize(&cfg),
            Err(JudgeError::ScoreOutOfRange(1.5))
        );
        assert!(Verdict::score(f64::NAN).classify(&cfg).is_err());
    }

    #[test]
    fn classify_uses_threshold_and_pass_rules() {
        let cfg = JudgeConfig::default();
        assert!(Verdict::score(0.5).classify(&cfg).unwrap());
        assert!(!Verdict::score(0.49).classify(&cfg).unwrap());

        let strict = JudgeConfig {
            pass_threshold: 0.8,
            ..JudgeConfig::default()
        };
        assert!(!Verdict::score(0.7).classify(&strict).unwrap());

        let by_set = JudgeConfig::default().with_pass_categories(["good"]);
        assert!(Verdict::category("good").classify(&by_set).unwrap());
        assert!(!Verdict::category("bad").classify(&by_set).unwrap());

        let by_weight = JudgeConfig::default().with_category_weight("meh", 0.4);
        assert!(!Verdict::category("meh").classify(&by_weight).unwrap());
        assert!(matches!(
            Verdict::category("other").classify(&by_weight),
            Err(JudgeError::UnclassifiableVerdict(_))
        ));
    }

    #[test]
    fn config_keeps_unknown_keys() {
        let cfg: JudgeConfig =
            serde_yaml::from_str("model: gpt-4o-mini\nseed: 7\ncategory_weights: {ok: 1.0}\n")
                .unwrap();
        assert_eq!(cfg.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cfg.pass_threshold, DEFAULT_PASS_THRESHOLD);
        assert_eq!(cfg.extra.get("seed"), Some(&Value::from(7)));
        assert_eq!(cfg.category_weights.get("ok"), Some(&1.0));
    }
}
