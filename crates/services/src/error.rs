//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{ExamError, GeneratorSettingsError, ProgressError, QuestionError};
use storage::sqlite::SqliteInitError;

/// Errors emitted by content generators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("content generation is not configured")]
    Disabled,
    #[error("content generation returned an empty response")]
    EmptyResponse,
    #[error("content generation request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("exam response is not valid JSON: {0}")]
    Malformed(String),
    #[error("exam question {index} is invalid: {source}")]
    InvalidQuestion {
        index: usize,
        #[source]
        source: QuestionError,
    },
    #[error("expected {expected} exam questions, got {found}")]
    TooFewQuestions { expected: usize, found: usize },
    /// Failure reported by a non-HTTP generator.
    #[error("content generation failed: {0}")]
    Other(String),
}

/// Errors emitted by `CourseService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CourseError {
    #[error("section title cannot be empty")]
    EmptySection,
    #[error("section \"{0}\" is already being expanded")]
    ExpansionInFlight(String),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Errors emitted while producing a certificate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CertificateError {
    #[error("the certificate is available once the final exam is passed")]
    Locked,
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Settings(#[from] GeneratorSettingsError),
}
