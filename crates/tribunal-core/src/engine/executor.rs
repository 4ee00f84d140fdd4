use crate::errors::CaseError;
use crate::judge::Judge;
use crate::model::{CaseResult, CaseStatus, EvalCase, ResponseGenerator};
use crate::verdict::{JudgeConfig, Verdict};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info_span, Instrument};

/// Runs single cases of one dataset: generate a response, judge it, classify.
///
/// Shared by every task of that dataset; holds nothing mutable.
pub struct CaseExecutor {
    dataset: String,
    responder: Arc<dyn ResponseGenerator>,
    judge: Arc<dyn Judge>,
    config: JudgeConfig,
    context: Option<Value>,
    timeout: Option<Duration>,
}

struct Outcome {
    response: Option<Value>,
    status: CaseStatus,
    verdict: Option<Verdict>,
    metadata: Map<String, Value>,
    error: Option<CaseError>,
}

impl Outcome {
    fn errored(response: Option<Value>, error: CaseError) -> Self {
        Self {
            response,
            status: CaseStatus::Error,
            verdict: None,
            metadata: Map::new(),
            error: Some(error),
        }
    }
}

impl CaseExecutor {
    pub fn new(
        dataset: impl Into<String>,
        responder: Arc<dyn ResponseGenerator>,
        judge: Arc<dyn Judge>,
        config: JudgeConfig,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            responder,
            judge,
            config,
            context: None,
            timeout: None,
        }
    }

    /// Value produced by the dataset's setup, handed to the responder.
    pub fn with_context(mut self, context: Option<Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Always yields exactly one result. Failures and panics become `status = error`.
    pub async fn execute(&self, index: usize, case: EvalCase) -> CaseResult {
        let started = Instant::now();
        let span = info_span!(
            "case",
            dataset = %self.dataset,
            index,
            id = case.id.as_deref().unwrap_or(""),
        );

        let stages =
            AssertUnwindSafe(self.run_stages(&case).instrument(span.clone())).catch_unwind();
        let caught = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, stages).await {
                Ok(caught) => caught,
                Err(_) => Ok(Outcome::errored(None, CaseError::Timeout(limit))),
            },
            None => stages.await,
        };
        let outcome = caught.unwrap_or_else(|payload| {
            Outcome::errored(None, CaseError::Panicked(panic_message(payload.as_ref())))
        });

        let duration = started.elapsed();
        span.in_scope(|| {
            debug!(
                status = ?outcome.status,
                duration_ms = duration.as_millis() as u64,
                error = outcome.error.as_ref().map(|e| e.kind()),
                "case finished"
            )
        });

        CaseResult {
            dataset: self.dataset.clone(),
            index,
            case,
            response: outcome.response,
            status: outcome.status,
            verdict: outcome.verdict,
            metadata: outcome.metadata,
            error: outcome.error,
            duration,
        }
    }

    async fn run_stages(&self, case: &EvalCase) -> Outcome {
        let response = match self
            .responder
            .generate(&case.input, self.context.as_ref())
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return Outcome::errored(None, CaseError::ResponseGeneration(format!("{e:#}")))
            }
        };

        let verdict = match self
            .judge
            .evaluate(&response, &case.criteria, &self.config)
            .await
        {
            Ok(v) => v,
            Err(e) => return Outcome::errored(Some(response), e.into()),
        };

        match verdict.classify(&self.config) {
            Ok(passed) => {
                let mut metadata = verdict.metadata.clone();
                metadata.insert("judge".into(), Value::from(self.judge.name()));
                if let Ok(p) = verdict.normalize(&self.config) {
                    metadata.insert("pass_probability".into(), Value::from(p));
                }
                Outcome {
                    response: Some(response),
                    status: if passed {
                        CaseStatus::Pass
                    } else {
                        CaseStatus::Fail
                    },
                    verdict: Some(verdict),
                    metadata,
                    error: None,
                }
            }
            Err(e) => {
                // error results carry no verdict; keep the raw value for diagnosis
                let mut outcome = Outcome::errored(Some(response), e.into());
                if let Ok(raw) = serde_json::to_value(&verdict.value) {
                    outcome.metadata.insert("unclassified_verdict".into(), raw);
                }
                outcome
            }
        }
    }
}

pub(crate) fn errored_result(
    dataset: &str,
    index: usize,
    case: EvalCase,
    error: CaseError,
) -> CaseResult {
    CaseResult {
        dataset: dataset.to_string(),
        index,
        case,
        response: None,
        status: CaseStatus::Error,
        verdict: None,
        metadata: Map::new(),
        error: Some(error),
        duration: Duration::ZERO,
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::JudgeError;
    use crate::model::response_fn;
    use async_trait::async_trait;

    struct Returns(Result<Verdict, JudgeError>);

    #[async_trait]
    impl Judge for Returns {
        fn name(&self) -> &str {
            "returns"
        }
        async fn evaluate(&self, _: &Value, _: &str, _: &JudgeConfig) -> Result<Verdict, JudgeError> {
            self.0.clone()
        }
    }

    fn echo() -> Arc<dyn ResponseGenerator> {
        response_fn(|input, _| async move { Ok(input) })
    }

    fn executor(judge: Returns) -> CaseExecutor {
        CaseExecutor::new("ds", echo(), Arc::new(judge), JudgeConfig::default())
    }

    #[tokio::test]
    async fn pass_and_fail_carry_verdict() {
        let pass = executor(Returns(Ok(Verdict::score(0.9))))
            .execute(0, EvalCase::new("hi", "c"))
            .await;
        assert_eq!(pass.status, CaseStatus::Pass);
        assert_eq!(pass.response, Some(Value::from("hi")));
        assert_eq!(pass.metadata["judge"], "returns");
        assert_eq!(pass.metadata["pass_probability"], 0.9);
        assert!(pass.error.is_none());

        let fail = executor(Returns(Ok(Verdict::boolean(false))))
            .execute(1, EvalCase::new("hi", "c"))
            .await;
        assert_eq!(fail.status, CaseStatus::Fail);
        assert!(fail.verdict.is_some());
        assert_eq!(fail.index, 1);
    }

    #[tokio::test]
    async fn responder_failure_skips_judge() {
        let failing = response_fn(|_, _| async { Err(anyhow::anyhow!("model offline")) });
        let exec = CaseExecutor::new(
            "ds",
            failing,
            Arc::new(Returns(Ok(Verdict::boolean(true)))),
            JudgeConfig::default(),
        );
        let r = exec.execute(0, EvalCase::new("hi", "c")).await;
        assert_eq!(r.status, CaseStatus::Error);
        assert!(r.response.is_none());
        assert!(r.verdict.is_none());
        assert_eq!(
            r.error,
            Some(CaseError::ResponseGeneration("model offline".into()))
        );
    }

    #[tokio::test]
    async fn judge_failure_keeps_response() {
        let r = executor(Returns(Err(JudgeError::MalformedResponse("MAYBE".into()))))
            .execute(0, EvalCase::new("hi", "c"))
            .await;
        assert_eq!(r.status, CaseStatus::Error);
        assert_eq!(r.response, Some(Value::from("hi")));
        assert_eq!(r.error.as_ref().map(|e| e.kind()), Some("malformed_response"));
    }

    #[tokio::test]
    async fn unclassifiable_category_is_an_error() {
        let r = executor(Returns(Ok(Verdict::category("x"))))
            .execute(0, EvalCase::new("hi", "c"))
            .await;
        assert_eq!(r.status, CaseStatus::Error);
        assert_eq!(
            r.error,
            Some(CaseError::Judge(JudgeError::UnclassifiableVerdict("x".into())))
        );
        assert!(r.verdict.is_none());
        assert_eq!(r.metadata["unclassified_verdict"]["value"], "x");
    }

    #[tokio::test]
    async fn context_reaches_responder() {
        let responder = response_fn(|_, ctx| async move {
            Ok(ctx.unwrap_or(Value::Null))
        });
        let exec = CaseExecutor::new(
            "ds",
            responder,
            Arc::new(Returns(Ok(Verdict::boolean(true)))),
            JudgeConfig::default(),
        )
        .with_context(Some(Value::from("ctx")));
        let r = exec.execute(0, EvalCase::new("hi", "c")).await;
        assert_eq!(r.response, Some(Value::from("ctx")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_case_times_out() {
        let slow = response_fn(|input, _| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(input)
        });
        let exec = CaseExecutor::new(
            "ds",
            slow,
            Arc::new(Returns(Ok(Verdict::boolean(true)))),
            JudgeConfig::default(),
        )
        .with_timeout(Some(Duration::from_secs(2)));
        let r = exec.execute(0, EvalCase::new("hi", "c")).await;
        assert_eq!(r.status, CaseStatus::Error);
        assert_eq!(r.error, Some(CaseError::Timeout(Duration::from_secs(2))));
    }

    #[tokio::test]
    async fn panicking_responder_is_contained() {
        let boom = response_fn(|_, _| async move {
            if true {
                panic!("responder exploded");
            }
            Ok(Value::Null)
        });
        let exec = CaseExecutor::new(
            "ds",
            boom,
            Arc::new(Returns(Ok(Verdict::boolean(true)))),
            JudgeConfig::default(),
        );
        let r = exec.execute(3, EvalCase::new("hi", "c")).await;
        assert_eq!(r.status, CaseStatus::Error);
        assert_eq!(r.index, 3);
        assert_eq!(r.error, Some(CaseError::Panicked("responder exploded".into())));
    }
}
