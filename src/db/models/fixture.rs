use core::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::score::Score;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct FixtureId(pub i64);

/// Base fixture table model. `final_score` stays empty until an admin enters
/// the authoritative result, and is written at most once.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub id: FixtureId,
    pub home: String,
    pub away: String,
    pub kicks_off_at: DateTime<Utc>,
    pub final_score: Option<Score>,
    pub created_at: DateTime<Utc>,
}

impl Fixture {
    pub fn has_result(&self) -> bool {
        self.final_score.is_some()
    }

    /// Short human label for chat replies.
    pub fn label(&self) -> String {
        format!("{} vs {}", self.home, self.away)
    }
}

impl From<i64> for FixtureId {
    fn from(value: i64) -> Self {
        FixtureId(value)
    }
}

impl FromStr for FixtureId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(FixtureId)
    }
}

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
