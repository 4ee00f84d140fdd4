use crate::cli::args::ValidateArgs;
use crate::exit_codes;
use anyhow::Context;
use std::sync::Arc;
use tribunal_core::config::load_suite;
use tribunal_core::providers::fake::FakeProvider;
use tribunal_core::providers::JudgeProvider;
use tribunal_core::Runner;

/// Loads the suite and builds every judge tree against a fake provider.
pub fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let suite = load_suite(&args.config)
        .with_context(|| format!("loading suite {}", args.config.display()))?;
    let datasets = suite.datasets.len();
    let cases = suite.total_cases();

    let provider: Arc<dyn JudgeProvider> = Arc::new(FakeProvider::passing());
    let (run_cfg, _) = suite
        .into_datasets(provider)
        .with_context(|| format!("building judges for {}", args.config.display()))?;
    Runner::new(run_cfg).context("invalid run settings")?;

    eprintln!(
        "OK: {} ({} datasets, {} cases)",
        args.config.display(),
        datasets,
        cases
    );
    Ok(exit_codes::SUCCESS)
}
