//! Generative categorization service boundary.
//!
//! The engine treats the service as an advisory collaborator behind the
//! narrow [`JudgmentService`] trait: Stage 1 asks it to select which indexed
//! patterns are relevant, Stage 2 asks it for a full categorization when no
//! deterministic evidence applies. Any backend satisfying the trait is
//! acceptable; [`GenerativeBackend`] speaks an Ollama-style HTTP API and
//! [`MockJudge`] serves tests.

pub mod client;
pub mod mock;
pub mod parsing;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

use tally_core::TransactionCandidate;

pub use client::GenerativeBackend;
pub use mock::MockJudge;
pub use types::{
    CategorizationJudgment, CategoryPatternSummary, PatternSummary, PaymentPatternSummary,
    StageOneSelection, VendorPatternSummary,
};

#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned status {0}")]
    Status(u16),
    #[error("service returned no response text")]
    Empty,
    #[error("service call timed out")]
    Timeout,
    #[error("malformed service response: {0}")]
    Malformed(String),
}

/// The swappable generative-service contract.
///
/// Both calls are advisory: the caller always holds a deterministic fallback
/// and treats any error as "proceed without the service".
#[async_trait]
pub trait JudgmentService: Send + Sync {
    /// Stage 1: given the deterministic findings, say which are relevant.
    /// The response filters and labels — it never invents categorization.
    async fn select_patterns(
        &self,
        tx: &TransactionCandidate,
        summary: &PatternSummary,
    ) -> Result<StageOneSelection, AiError>;

    /// Stage 2: full categorization, constrained by the decision rules the
    /// caller encodes in `rules`.
    async fn categorize(
        &self,
        tx: &TransactionCandidate,
        summary: &PatternSummary,
        rules: &str,
    ) -> Result<CategorizationJudgment, AiError>;
}
