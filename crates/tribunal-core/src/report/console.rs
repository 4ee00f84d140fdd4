use crate::errors::ReporterError;
use crate::model::{CaseResult, CaseStatus, RunStatus, RunSummary};
use crate::report::Reporter;
use std::io::Write;
use std::time::{Duration, Instant};

/// Minimum interval between progress lines.
const PROGRESS_MIN_INTERVAL_MS: u64 = 200;

#[must_use]
pub fn format_progress_line(done: usize, total: usize) -> String {
    format!("Running case {}/{}...", done, total)
}

/// Emit every case for small runs, roughly every 10% for large ones.
pub(crate) fn progress_step(total: usize) -> usize {
    if total <= 10 {
        1
    } else {
        std::cmp::max(1, total / 10)
    }
}

/// Human-readable progress and summary, written to stderr by default.
///
/// Failing and erroring cases are printed as they arrive; passing ones only
/// advance the throttled progress line.
pub struct ConsoleReporter<W: Write + Send = std::io::Stderr> {
    out: W,
    total: usize,
    done: usize,
    step: usize,
    last_emit: Option<Instant>,
    verbose: bool,
}

impl ConsoleReporter {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            total: 0,
            done: 0,
            step: 1,
            last_emit: None,
            verbose: false,
        }
    }

    /// Also print passing cases.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn should_emit_progress(&mut self) -> bool {
        if self.total <= 1 {
            return false;
        }
        let now = Instant::now();
        let is_final = self.done == self.total;
        let on_step = self.done.is_multiple_of(self.step) || self.done == 1;
        let interval_ok = self.last_emit.is_none_or(|t| {
            now.saturating_duration_since(t) >= Duration::from_millis(PROGRESS_MIN_INTERVAL_MS)
        });
        let emit = is_final || (on_step && interval_ok);
        if emit {
            self.last_emit = Some(now);
        }
        emit
    }
}

fn status_icon(status: CaseStatus) -> &'static str {
    match status {
        CaseStatus::Pass => "✅",
        CaseStatus::Fail => "❌",
        CaseStatus::Error => "⚠️ ",
    }
}

pub fn format_result_line(result: &CaseResult) -> String {
    let secs = result.duration.as_secs_f64();
    let detail = match (&result.error, &result.verdict) {
        (Some(err), _) => format!(" {}", err),
        (None, Some(v)) => v
            .reasoning
            .as_deref()
            .map(|r| format!(" {}", r))
            .unwrap_or_default(),
        (None, None) => String::new(),
    };
    format!(
        "{} {:<24} ({:.1}s){}",
        status_icon(result.status),
        result.label(),
        secs,
        detail
    )
}

pub fn format_summary_line(summary: &RunSummary) -> String {
    let m = &summary.metrics;
    let rate = summary
        .pass_rate()
        .map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "n/a".into());
    format!(
        "Results: {} passed, {} failed, {} errors ({} total, pass rate {})",
        m.passed, m.failed, m.errored, m.total, rate
    )
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn init(&mut self, total: usize) {
        self.total = total;
        self.done = 0;
        self.step = progress_step(total);
        self.last_emit = None;
    }

    fn report_result(&mut self, result: &CaseResult) {
        self.done += 1;
        // progress output is best effort
        if self.verbose || result.status != CaseStatus::Pass {
            let _ = writeln!(self.out, "{}", format_result_line(result));
        }
        if self.should_emit_progress() {
            let _ = writeln!(self.out, "{}", format_progress_line(self.done, self.total));
        }
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReporterError> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", format_summary_line(summary))?;
        if summary.status == RunStatus::Failed {
            let reason = summary.error.as_deref().unwrap_or("unknown error");
            writeln!(self.out, "Run failed: {}", reason)?;
        }
        self.out.flush()?;
        Ok(())
    }
}
