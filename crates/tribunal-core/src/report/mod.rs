//! Result sinks driven by the runner.
//!
//! The runner calls `init` once, `report_result` once per case in completion
//! order and `finalize` once at the end. All calls come from the runner's own
//! task, so implementations keep plain `&mut self` state.

pub mod console;
pub mod json;

use crate::errors::ReporterError;
use crate::model::{CaseResult, RunSummary};

pub trait Reporter: Send {
    fn init(&mut self, total: usize);

    fn report_result(&mut self, result: &CaseResult);

    /// A failure here marks the run as failed; earlier results stay valid.
    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReporterError>;
}

/// Keeps everything it is handed. Handy when embedding the runner.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    pub total: Option<usize>,
    pub results: Vec<CaseResult>,
    pub summary: Option<RunSummary>,
}

impl Reporter for CollectingReporter {
    fn init(&mut self, total: usize) {
        self.total = Some(total);
    }

    fn report_result(&mut self, result: &CaseResult) {
        self.results.push(result.clone());
    }

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReporterError> {
        self.summary = Some(summary.clone());
        Ok(())
    }
}

/// Forwards every call to each inner reporter in order.
#[derive(Default)]
pub struct FanoutReporter {
    inner: Vec<Box<dyn Reporter>>,
}

impl FanoutReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, reporter: impl Reporter + 'static) -> Self {
        self.inner.push(Box::new(reporter));
        self
    }
}

impl Reporter for FanoutReporter {
    fn init(&mut self, total: usize) {
        for r in &mut self.inner {
            r.init(total);
        }
    }

    fn report_result(&mut self, result: &CaseResult) {
        for r in &mut self.inner {
            r.report_result(result);
        }
    }

    /// Every reporter gets finalized; the first error wins.
    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReporterError> {
        let mut first_err = None;
        for r in &mut self.inner {
            if let Err(e) = r.finalize(summary) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
