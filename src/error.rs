//! Typed failures from the external services.
//!
//! Application flow uses `anyhow`; these variants exist so callers (and
//! tests) can tell a missing credential from an upstream rejection.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DistillError {
    /// A required credential or endpoint was not provided.
    #[error("Missing required setting: {0}. Set it in the environment or .distill.toml.")]
    MissingCredential(&'static str),

    /// The upstream service answered with a non-success status.
    #[error("{service} API error {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The document service reported a failed analysis.
    #[error("Document analysis failed: {0}")]
    AnalysisFailed(String),

    /// The document service did not finish within the polling budget.
    #[error("Document analysis did not finish after {0} polls")]
    AnalysisTimeout(usize),

    /// A download did not return a PDF.
    #[error(
        "Expected a PDF response but got Content-Type: {0}. \
         The URL may be invalid or the server may be rate-limiting."
    )]
    NotAPdf(String),

    /// The model's reply could not be read as a JSON object.
    #[error("Failed to parse JSON from LLM response. Raw response:\n{0}")]
    InvalidModelJson(String),
}
