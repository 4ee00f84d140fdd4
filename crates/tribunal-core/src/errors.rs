use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::time::Duration;
use thiserror::Error;

/// Failure of a single judge evaluation (simple or composite).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JudgeError {
    /// Provider text did not start with the `YES` / `NO` token.
    #[error("malformed judge response: {0}")]
    MalformedResponse(String),

    /// One delegate of a consensus or weighted judge failed; no partial result is produced.
    #[error("delegate judge #{index} failed: {source}")]
    DelegateFailed {
        index: usize,
        #[source]
        source: Box<JudgeError>,
    },

    /// A categorical verdict with no configured weight or pass rule.
    #[error("unclassifiable verdict: category '{0}' has no configured pass rule or weight")]
    UnclassifiableVerdict(String),

    #[error("score {0} is outside [0, 1]")]
    ScoreOutOfRange(f64),

    /// Network / timeout / API error from the underlying provider, passed through as text.
    #[error("judge provider error: {0}")]
    ProviderTransport(String),

    #[error("invalid judge configuration: {0}")]
    InvalidConfig(String),
}

impl JudgeError {
    pub fn delegate(index: usize, source: JudgeError) -> Self {
        Self::DelegateFailed {
            index,
            source: Box::new(source),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::MalformedResponse(_) => "malformed_response",
            JudgeError::DelegateFailed { .. } => "delegate_failed",
            JudgeError::UnclassifiableVerdict(_) => "unclassifiable_verdict",
            JudgeError::ScoreOutOfRange(_) => "score_out_of_range",
            JudgeError::ProviderTransport(_) => "provider_transport",
            JudgeError::InvalidConfig(_) => "invalid_config",
        }
    }

    /// Innermost error, following `DelegateFailed` chains.
    pub fn root(&self) -> &JudgeError {
        match self {
            JudgeError::DelegateFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Why a case ended with `status = error`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CaseError {
    #[error("response generation failed: {0}")]
    ResponseGeneration(String),

    #[error(transparent)]
    Judge(#[from] JudgeError),

    #[error("dataset setup failed: {0}")]
    Setup(String),

    #[error("case timed out after {0:?}")]
    Timeout(Duration),

    #[error("case task panicked: {0}")]
    Panicked(String),
}

impl CaseError {
    pub fn kind(&self) -> &'static str {
        match self {
            CaseError::ResponseGeneration(_) => "response_generation",
            CaseError::Judge(e) => e.kind(),
            CaseError::Setup(_) => "setup",
            CaseError::Timeout(_) => "timeout",
            CaseError::Panicked(_) => "panicked",
        }
    }
}

impl Serialize for CaseError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("CaseError", 2)?;
        s.serialize_field("kind", self.kind())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

/// Process-level run failures. Anything here turns the summary into `failed`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RunError {
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    #[error("no eligible cases after category filter {categories:?}")]
    NoEligibleCases { categories: Vec<String> },

    #[error("setup failed for dataset '{dataset}': {reason}")]
    SetupFailed { dataset: String, reason: String },

    #[error("reporter failed to finalize: {0}")]
    Reporter(String),
}

#[derive(Debug, Error)]
#[error("reporter error: {0}")]
pub struct ReporterError(pub String);

impl From<std::io::Error> for ReporterError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

/// Errors while reading or interpreting a suite file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("unsupported config version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("config error: {0}")]
    Invalid(String),

    #[error("dataset '{dataset}': {source}")]
    Judge {
        dataset: String,
        #[source]
        source: JudgeError,
    },
}
