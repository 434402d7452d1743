use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::fixture::FixtureId;
use super::punter::PunterId;
use super::score::Score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct PredictionId(pub i64);

/// Base prediction table model. One row per (punter, fixture), enforced by
/// the store; rows are never edited or deleted after insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub id: PredictionId,
    pub punter_id: PunterId,
    pub fixture_id: FixtureId,
    pub predicted: Score,
    pub created_at: DateTime<Utc>,
}

/// A punter's prediction joined with its fixture, for the "my predictions"
/// view. Earned points are recomputed from the points table on display,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionView {
    pub fixture_id: FixtureId,
    pub home: String,
    pub away: String,
    pub kicks_off_at: DateTime<Utc>,
    pub predicted: Score,
    pub final_score: Option<Score>,
}

impl From<i64> for PredictionId {
    fn from(value: i64) -> Self {
        PredictionId(value)
    }
}

impl fmt::Display for PredictionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
