//! The external judging capability.

use async_trait::async_trait;

use super::types::{AdjudicationRequest, Judge, JudgeRuling};

/// Error from a single judge call. Always recoverable: the judge simply
/// has no verdict for the pass until a later invocation succeeds.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AdjudicatorError {
    #[error("judge call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("judge request failed: {0}")]
    Request(String),

    #[error("malformed judge response: {0}")]
    Malformed(String),
}

/// Scores a finished debate as one judge persona.
///
/// Implementations are called concurrently for different judges of the
/// same pass and must not assume any ordering between them.
#[async_trait]
pub trait Adjudicator: Send + Sync {
    async fn score(
        &self,
        judge: &Judge,
        request: &AdjudicationRequest,
    ) -> Result<JudgeRuling, AdjudicatorError>;
}
