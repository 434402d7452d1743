use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::models::score::ParseScoreError;
use crate::db::repository::RepoError;

pub mod deadline;
pub mod leaderboard;
pub mod predict;
pub mod scoring;

pub mod prelude {
    pub use crate::engine::deadline::DeadlinePolicy;
    pub use crate::engine::leaderboard::LeaderboardView;
    pub use crate::engine::predict::PredictionEngine;
    pub use crate::engine::scoring::ScoringEngine;
    pub use crate::engine::{EngineError, EngineResult, ValidationErr};
}

pub type EngineResult<T> = core::result::Result<T, EngineError>;

/// Input that failed grammar checks before touching storage.
#[derive(Debug, Error)]
pub enum ValidationErr {
    #[error(transparent)]
    Score(#[from] ParseScoreError),

    #[error("team names must not be blank")]
    BlankTeam,
}

/// Every way a game operation can be refused. Callers branch on the variant;
/// none of these collapse into a bare boolean.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationErr),

    #[error("prediction window closed at {0}")]
    DeadlineExceeded(DateTime<Utc>),

    #[error("prediction already on record for this fixture")]
    AlreadyPredicted,

    #[error("no such fixture open for predictions")]
    UnknownFixture,

    #[error("chat is not registered")]
    UnknownUser,

    #[error("result already entered for this fixture")]
    ResultAlreadyEntered,

    #[error("not allowed")]
    Forbidden,

    #[error("storage failure: {0}")]
    Storage(#[from] RepoError),
}

impl EngineError {
    /// True for transient faults worth retrying. Everything else is a final
    /// verdict on the request itself.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

impl From<ParseScoreError> for EngineError {
    fn from(e: ParseScoreError) -> Self {
        Self::Validation(ValidationErr::Score(e))
    }
}
