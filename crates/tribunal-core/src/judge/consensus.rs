use super::composite::{delegate_details, distribution_value, evaluate_all, Delegate};
use super::Judge;
use crate::errors::JudgeError;
use crate::verdict::{JudgeConfig, Verdict};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

/// Vote threshold on the normalized scale: a delegate passes at `>= 0.5`.
pub const PASS_VOTE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsensusStrategy {
    /// More than half of the delegates pass.
    Majority,
    /// Every delegate passes.
    Unanimous,
    /// At least this fraction of delegates pass.
    Threshold(f64),
}

impl ConsensusStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsensusStrategy::Majority => "majority",
            ConsensusStrategy::Unanimous => "unanimous",
            ConsensusStrategy::Threshold(_) => "threshold",
        }
    }

    /// Decide from `passing` votes out of `total`.
    pub fn decide(&self, passing: usize, total: usize) -> bool {
        if total == 0 {
            return false;
        }
        let ratio = passing as f64 / total as f64;
        match self {
            ConsensusStrategy::Majority => ratio > 0.5,
            ConsensusStrategy::Unanimous => passing == total,
            ConsensusStrategy::Threshold(t) => ratio >= *t,
        }
    }
}

pub struct ConsensusJudge {
    name: String,
    delegates: Vec<Delegate>,
    strategy: ConsensusStrategy,
    aggregate_metadata: bool,
}

impl ConsensusJudge {
    pub fn new(delegates: Vec<Delegate>, strategy: ConsensusStrategy) -> Result<Self, JudgeError> {
        if delegates.is_empty() {
            return Err(JudgeError::InvalidConfig(
                "consensus judge needs at least one delegate".into(),
            ));
        }
        if let ConsensusStrategy::Threshold(t) = strategy {
            if !t.is_finite() || !(0.0..=1.0).contains(&t) {
                return Err(JudgeError::InvalidConfig(format!(
                    "consensus threshold must be within [0, 1], got {}",
                    t
                )));
            }
        }
        Ok(Self {
            name: format!("consensus:{}", strategy.as_str()),
            delegates,
            strategy,
            aggregate_metadata: false,
        })
    }

    pub fn with_aggregate_metadata(mut self, aggregate: bool) -> Self {
        self.aggregate_metadata = aggregate;
        self
    }

    pub fn strategy(&self) -> ConsensusStrategy {
        self.strategy
    }
}

#[async_trait]
impl Judge for ConsensusJudge {
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

        let total = outcomes.len();
        let passing = outcomes.iter().filter(|o| o.normalized >= PASS_VOTE).count();
        let agreement_ratio = passing as f64 / total as f64;
        let consensus = self.strategy.decide(passing, total);
        debug!(
            strategy = self.strategy.as_str(),
            passing, total, consensus, "consensus reached"
        );

        let mut verdict = Verdict::boolean(consensus)
            .with_meta("strategy", self.strategy.as_str())
            .with_meta("consensus", consensus)
            .with_meta("agreement_ratio", agreement_ratio);
        if let ConsensusStrategy::Threshold(t) = self.strategy {
            verdict = verdict.with_meta("threshold", t);
        }
        if self.aggregate_metadata {
            verdict = verdict
                .with_meta("delegates", Value::Array(delegate_details(&outcomes)))
                .with_meta("distribution", distribution_value(&outcomes));
        }
        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verdict::VerdictValue;
    use proptest::prelude::*;

    struct Fixed(Verdict);

    #[async_trait]
    impl Judge for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn evaluate(&self, _: &Value, _: &str, _: &JudgeConfig) -> Result<Verdict, JudgeError> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl Judge for Broken {
        fn name(&self) -> &str {
            "broken"
        }
        async fn evaluate(&self, _: &Value, _: &str, _: &JudgeConfig) -> Result<Verdict, JudgeError> {
            Err(JudgeError::ProviderTransport("timeout".into()))
        }
    }

    fn votes(v: &[bool]) -> Vec<Delegate> {
        v.iter()
            .map(|b| Delegate::new(Fixed(Verdict::boolean(*b))))
            .collect()
    }

    async fn run(judge: &ConsensusJudge) -> Result<Verdict, JudgeError> {
        judge
            .evaluate(&Value::from("r"), "c", &JudgeConfig::default())
            .await
    }

    #[tokio::test]
    async fn three_true_majority() {
        let judge = ConsensusJudge::new(votes(&[true, true, true]), ConsensusStrategy::Majority)
            .unwrap();
        let v = run(&judge).await.unwrap();
        assert_eq!(v.value, VerdictValue::Boolean(true));
        assert_eq!(v.metadata["consensus"], true);
        assert_eq!(v.metadata["agreement_ratio"], 1.0);
        assert!(!v.metadata.contains_key("distribution"));
    }

    #[tokio::test]
    async fn half_split_misses_threshold() {
        let judge = ConsensusJudge::new(
            votes(&[true, true, false, false]),
            ConsensusStrategy::Threshold(0.75),
        )
        .unwrap();
        let v = run(&judge).await.unwrap();
        assert_eq!(v.value, VerdictValue::Boolean(false));
        assert_eq!(v.metadata["consensus"], false);
        assert_eq!(v.metadata["agreement_ratio"], 0.5);
        assert_eq!(v.metadata["threshold"], 0.75);
    }

    #[tokio::test]
    async fn aggregate_metadata_lists_delegates_and_buckets() {
        let delegates = vec![
            Delegate::new(Fixed(Verdict::boolean(true).with_reasoning("clear yes"))),
            Delegate::new(Fixed(Verdict::score(0.7))),
            Delegate::new(Fixed(Verdict::category("ok"))),
        ];
        let judge = ConsensusJudge::new(delegates, ConsensusStrategy::Unanimous)
            .unwrap()
            .with_aggregate_metadata(true);
        let cfg = JudgeConfig::default().with_category_weight("ok", 0.2);
        let v = judge.evaluate(&Value::from("r"), "c", &cfg).await.unwrap();

        assert_eq!(v.value, VerdictValue::Boolean(false));
        let delegates = v.metadata["delegates"].as_array().unwrap();
        assert_eq!(delegates.len(), 3);
        assert_eq!(delegates[0]["reasoning"], "clear yes");
        assert_eq!(delegates[2]["normalized"], 0.2);
        assert_eq!(v.metadata["distribution"]["1.00"], 1);
        assert_eq!(v.metadata["distribution"]["0.70"], 1);
        assert_eq!(v.metadata["distribution"]["0.20"], 1);
    }

    #[tokio::test]
    async fn delegate_override_config_is_used() {
        let delegates = vec![
            Delegate::new(Fixed(Verdict::category("good")))
                .with_config(JudgeConfig::default().with_category_weight("good", 1.0)),
            Delegate::new(Fixed(Verdict::boolean(true))),
        ];
        let judge = ConsensusJudge::new(delegates, ConsensusStrategy::Unanimous).unwrap();
        let v = run(&judge).await.unwrap();
        assert_eq!(v.value, VerdictValue::Boolean(true));
    }

    #[tokio::test]
    async fn any_failure_fails_the_vote() {
        let mut delegates = votes(&[true, true]);
        delegates.push(Delegate::new(Broken));
        let judge = ConsensusJudge::new(delegates, ConsensusStrategy::Majority).unwrap();
        match run(&judge).await {
            Err(JudgeError::DelegateFailed { index, source }) => {
                assert_eq!(index, 2);
                assert_eq!(*source, JudgeError::ProviderTransport("timeout".into()));
            }
            other => panic!("expected DelegateFailed, got {:?}", other),
        }
    }

    #[test]
    fn construction_is_validated() {
        assert!(ConsensusJudge::new(vec![], ConsensusStrategy::Majority).is_err());
        assert!(ConsensusJudge::new(votes(&[true]), ConsensusStrategy::Threshold(1.5)).is_err());
        assert!(ConsensusJudge::new(votes(&[true]), ConsensusStrategy::Threshold(f64::NAN)).is_err());
    }

    proptest! {
        #[test]
        fn vote_rules_match_counts(n in 1usize..12, k_seed in 0usize..100, t in 0.0f64..=1.0) {
            let k = k_seed % (n + 1);
            let mut v = vec![true; k];
            v.extend(std::iter::repeat(false).take(n - k));

            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let decide = |strategy| {
                let judge = ConsensusJudge::new(votes(&v), strategy).unwrap();
                let verdict = rt.block_on(run(&judge)).unwrap();
                verdict.value == VerdictValue::Boolean(true)
            };

            prop_assert_eq!(decide(ConsensusStrategy::Majority), 2 * k > n);
            prop_assert_eq!(decide(ConsensusStrategy::Unanimous), k == n);
            prop_assert_eq!(decide(ConsensusStrategy::Threshold(t)), k as f64 / n as f64 >= t);
        }

        #[test]
        fn injected_failure_always_fails(n in 1usize..8, fail_at_seed in 0usize..100) {
            let fail_at = fail_at_seed % n;
            let mut delegates = Vec::new();
            for i in 0..n {
                if i == fail_at {
                    delegates.push(Delegate::new(Broken));
                } else {
                    delegates.push(Delegate::new(Fixed(Verdict::boolean(true))));
                }
            }
            let judge = ConsensusJudge::new(delegates, ConsensusStrategy::Majority).unwrap();
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let is_delegate_failure =
                matches!(rt.block_on(run(&judge)), Err(JudgeError::DelegateFailed { .. }));
            prop_assert!(is_delegate_failure);
        }
    }
}
