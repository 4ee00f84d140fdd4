use super::executor::{errored_result, panic_message, CaseExecutor};
use crate::config::RunConfig;
use crate::errors::{CaseError, RunError};
use crate::model::{CaseResult, Dataset, EvalCase, RunMetrics, RunStatus, RunSummary};
use crate::report::Reporter;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{info, info_span, warn, Instrument};

/// Lifecycle of one run. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Pending => "pending",
            RunPhase::Running => "running",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        }
    }
}

struct Job {
    executor: Arc<CaseExecutor>,
    index: usize,
    case: EvalCase,
}

/// Drives datasets through their executors and streams results to a reporter.
#[derive(Debug, Clone)]
pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Run every eligible case and return the summary.
    ///
    /// Case-level failures never abort the run: each eligible case yields exactly
    /// one result, reported once as soon as it completes. Setup failures, an empty
    /// selection and reporter finalize errors mark the run `failed`.
    pub async fn run(&self, datasets: &[Dataset], reporter: &mut dyn Reporter) -> RunSummary {
        let span = info_span!(
            "run",
            parallel = self.config.parallel,
            max_concurrency = self.config.max_concurrency
        );
        self.run_inner(datasets, reporter).instrument(span).await
    }

    async fn run_inner(&self, datasets: &[Dataset], reporter: &mut dyn Reporter) -> RunSummary {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let mut phase = RunPhase::Pending;
        info!(
            run_id = %run_id,
            phase = phase.as_str(),
            datasets = datasets.len(),
            "run created"
        );

        let selected: Vec<(&Dataset, Vec<(usize, EvalCase)>)> = datasets
            .iter()
            .map(|d| {
                let eligible = d
                    .cases
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| self.config.admits(c))
                    .map(|(i, c)| (i, c.clone()))
                    .collect::<Vec<_>>();
                (d, eligible)
            })
            .collect();
        let total: usize = selected.iter().map(|(_, cases)| cases.len()).sum();

        reporter.init(total);
        let mut collected = Collected::default();

        if total == 0 {
            collected.fail(RunError::NoEligibleCases {
                categories: self.config.categories.iter().cloned().collect(),
            });
        } else {
            phase = RunPhase::Running;
            info!(phase = phase.as_str(), total, "run started");

            let mut jobs = Vec::with_capacity(total);
            for (dataset, cases) in selected {
                if cases.is_empty() {
                    continue;
                }
                match prepare(dataset, &self.config).await {
                    Ok(executor) => {
                        let executor = Arc::new(executor);
                        jobs.extend(cases.into_iter().map(|(index, case)| Job {
                            executor: executor.clone(),
                            index,
                            case,
                        }));
                    }
                    Err(reason) => {
                        warn!(dataset = %dataset.name, error = %reason, "dataset setup failed");
                        for (index, case) in cases {
                            let result = errored_result(
                                &dataset.name,
                                index,
                                case,
                                CaseError::Setup(reason.clone()),
                            );
                            collected.push(result, reporter);
                        }
                        collected.fail(RunError::SetupFailed {
                            dataset: dataset.name.clone(),
                            reason,
                        });
                    }
                }
            }

            if self.config.parallel {
                self.run_parallel(jobs, &mut collected, reporter).await;
            } else {
                run_sequential(jobs, &mut collected, reporter).await;
            }
        }

        let mut summary = collected.into_summary(run_id, started_at);
        if let Err(e) = reporter.finalize(&summary) {
            warn!(error = %e, "reporter failed to finalize");
            let err = RunError::Reporter(e.0);
            summary.status = RunStatus::Failed;
            summary.error.get_or_insert_with(|| err.to_string());
        }

        phase = match summary.status {
            RunStatus::Completed => RunPhase::Completed,
            RunStatus::Failed => RunPhase::Failed,
        };
        info!(
            run_id = %summary.run_id,
            phase = phase.as_str(),
            total = summary.metrics.total,
            passed = summary.metrics.passed,
            failed = summary.metrics.failed,
            errored = summary.metrics.errored,
            "run finished"
        );
        summary
    }

    async fn run_parallel(
        &self,
        jobs: Vec<Job>,
        collected: &mut Collected,
        reporter: &mut dyn Reporter,
    ) {
        let permits = self.config.max_concurrency.min(Semaphore::MAX_PERMITS);
        let sem = Arc::new(Semaphore::new(permits));
        let mut pending = FuturesUnordered::new();

        for job in jobs {
            let sem = sem.clone();
            let Job {
                executor,
                index,
                case,
            } = job;
            let dataset = executor.dataset().to_string();
            let fallback_case = case.clone();
            let spawned_at = Instant::now();
            let handle = tokio::spawn(async move {
                // held until the case finishes
                let _permit = sem.acquire_owned().await.ok();
                executor.execute(index, case).await
            });
            pending.push(async move {
                match handle.await {
                    Ok(result) => result,
                    Err(e) => {
                        let reason = if e.is_panic() {
                            panic_message(e.into_panic().as_ref())
                        } else {
                            format!("case task aborted: {}", e)
                        };
                        let mut result = errored_result(
                            &dataset,
                            index,
                            fallback_case,
                            CaseError::Panicked(reason),
                        );
                        result.duration = spawned_at.elapsed();
                        result
                    }
                }
            });
        }

        while let Some(result) = pending.next().await {
            collected.push(result, reporter);
        }
    }
}

async fn run_sequential(jobs: Vec<Job>, collected: &mut Collected, reporter: &mut dyn Reporter) {
    for job in jobs {
        let result = job.executor.execute(job.index, job.case).await;
        collected.push(result, reporter);
    }
}

/// Runs the dataset's setup (if any) and builds its executor.
async fn prepare(dataset: &Dataset, config: &RunConfig) -> Result<CaseExecutor, String> {
    let context = match &dataset.setup {
        Some(setup) => match AssertUnwindSafe(setup.setup()).catch_unwind().await {
            Ok(Ok(context)) => Some(context),
            Ok(Err(e)) => return Err(format!("{e:#}")),
            Err(payload) => {
                return Err(format!(
                    "setup panicked: {}",
                    panic_message(payload.as_ref())
                ))
            }
        },
        None => None,
    };
    Ok(CaseExecutor::new(
        dataset.name.clone(),
        dataset.responder.clone(),
        dataset.judge.clone(),
        dataset.config.clone(),
    )
    .with_context(context)
    .with_timeout(config.case_timeout()))
}

#[derive(Default)]
struct Collected {
    results: Vec<CaseResult>,
    metrics: RunMetrics,
    error: Option<RunError>,
}

impl Collected {
    fn push(&mut self, result: CaseResult, reporter: &mut dyn Reporter) {
        self.metrics.record(result.status);
        reporter.report_result(&result);
        self.results.push(result);
    }

    /// Keeps the first run-level error.
    fn fail(&mut self, error: RunError) {
        self.error.get_or_insert(error);
    }

    fn into_summary(self, run_id: String, started_at: chrono::DateTime<Utc>) -> RunSummary {
        RunSummary {
            run_id,
            status: if self.error.is_some() {
                RunStatus::Failed
            } else {
                RunStatus::Completed
            },
            results: self.results,
            metrics: self.metrics,
            started_at,
            finished_at: Utc::now(),
            error: self.error.map(|e| e.to_string()),
        }
    }
}
