use crate::errors::ReporterError;
use crate::model::{CaseResult, RunSummary};
use crate::report::Reporter;
use std::path::{Path, PathBuf};

pub fn write_json(summary: &RunSummary, out: &Path) -> Result<(), ReporterError> {
    let v = serde_json::json!({
        "run_id": summary.run_id,
        "status": summary.status,
        "started_at": summary.started_at,
        "finished_at": summary.finished_at,
        "metrics": summary.metrics,
        "pass_rate": summary.pass_rate(),
        "error": summary.error,
        "results": summary.results,
    });
    let body = serde_json::to_string_pretty(&v).map_err(|e| ReporterError(e.to_string()))?;
    std::fs::write(out, body)?;
    Ok(())
}

/// Writes the whole summary to a file on finalize.
#[derive(Debug, Clone)]
pub struct JsonReporter {
    path: PathBuf,
}

impl JsonReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reporter for JsonReporter {
    fn init(&mut self, _total: usize) {}

    fn report_result(&mut self, _result: &CaseResult) {}

    fn finalize(&mut self, summary: &RunSummary) -> Result<(), ReporterError> {
        write_json(summary, &self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{RunMetrics, RunStatus};
    use chrono::Utc;

    fn empty_summary() -> RunSummary {
        RunSummary {
            run_id: "run-1".into(),
            status: RunStatus::Failed,
            results: vec![],
            metrics: RunMetrics::default(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            error: Some("no eligible cases".into()),
        }
    }

    #[test]
    fn writes_summary_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let mut r = JsonReporter::new(&path);
        r.finalize(&empty_summary()).unwrap();

        let v: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["run_id"], "run-1");
        assert_eq!(v["status"], "failed");
        assert_eq!(v["metrics"]["total"], 0);
        assert!(v["pass_rate"].is_null());
        assert_eq!(v["error"], "no eligible cases");
    }

    #[test]
    fn unwritable_path_is_reporter_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut r = JsonReporter::new(dir.path().join("missing").join("out.json"));
        assert!(r.finalize(&empty_summary()).is_err());
    }
}
