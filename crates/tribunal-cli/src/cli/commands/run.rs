use super::build_provider;
use crate::cli::args::RunArgs;
use crate::exit_codes;
use anyhow::Context;
use tribunal_core::config::{load_suite, RunConfig};
use tribunal_core::report::console::ConsoleReporter;
use tribunal_core::report::json::JsonReporter;
use tribunal_core::report::FanoutReporter;
use tribunal_core::{RunStatus, RunSummary, Runner};

pub async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let suite = load_suite(&args.config)
        .with_context(|| format!("loading suite {}", args.config.display()))?;
    let provider = build_provider(&args.judge)?;
    let (run_cfg, datasets) = suite
        .into_datasets(provider)
        .with_context(|| format!("building judges for {}", args.config.display()))?;

    let run_cfg = apply_overrides(run_cfg, &args);
    let runner = Runner::new(run_cfg).context("invalid run settings")?;
    tracing::info!(
        config = %args.config.display(),
        datasets = datasets.len(),
        judge = ?args.judge.judge,
        "starting run"
    );

    let mut reporter = FanoutReporter::new().push(ConsoleReporter::stderr().verbose(args.verbose));
    if let Some(path) = &args.json {
        reporter = reporter.push(JsonReporter::new(path));
    }
    let summary = runner.run(&datasets, &mut reporter).await;
    Ok(exit_code(&summary))
}

/// Command-line flags win over the suite's `run:` block.
pub(crate) fn apply_overrides(mut cfg: RunConfig, args: &RunArgs) -> RunConfig {
    if args.sequential {
        cfg.parallel = false;
    }
    if let Some(n) = args.max_concurrency {
        cfg.max_concurrency = n;
    }
    if !args.categories.is_empty() {
        cfg.categories = args.categories.iter().cloned().collect();
    }
    if let Some(secs) = args.case_timeout {
        cfg.case_timeout_secs = Some(secs);
    }
    cfg
}

pub(crate) fn exit_code(summary: &RunSummary) -> i32 {
    if summary.status == RunStatus::Failed {
        exit_codes::CONFIG_ERROR
    } else if summary.all_passed() {
        exit_codes::SUCCESS
    } else {
        exit_codes::CASES_FAILED
    }
}
