use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{DEFAULT_POINTS_EXACT, DEFAULT_POINTS_OUTCOME};

/// A full-time score line in the `"<home>-<away>"` shape users type in chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    pub home: u16,
    pub away: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    HomeWin,
    AwayWin,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseScoreError {
    #[error("expected two goal counts joined by '-', like 2-1")]
    Shape,

    #[error("goal count out of range")]
    OutOfRange,
}

impl Score {
    pub const fn new(home: u16, away: u16) -> Self {
        Self { home, away }
    }

    pub fn outcome(&self) -> Outcome {
        match self.home.cmp(&self.away) {
            Ordering::Greater => Outcome::HomeWin,
            Ordering::Less => Outcome::AwayWin,
            Ordering::Equal => Outcome::Draw,
        }
    }
}

impl FromStr for Score {
    type Err = ParseScoreError;

    /// Accepts exactly `\d+-\d+`, with surrounding whitespace tolerated.
    /// Signs, inner spaces and anything else are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (home, away) = s.trim().split_once('-').ok_or(ParseScoreError::Shape)?;

        Ok(Self {
            home: parse_goals(home)?,
            away: parse_goals(away)?,
        })
    }
}

fn parse_goals(part: &str) -> Result<u16, ParseScoreError> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseScoreError::Shape);
    }

    part.parse().map_err(|_| ParseScoreError::OutOfRange)
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// Literal point values per prediction tier. Deliberately plain data so the
/// tiers come from configuration rather than hard-coded rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsTable {
    pub exact: i64,
    pub outcome: i64,
}

impl PointsTable {
    pub const fn new(exact: i64, outcome: i64) -> Self {
        Self { exact, outcome }
    }

    /// Points a prediction earns against the authoritative result: the full
    /// reward for the exact score line, the lesser one for calling the right
    /// winner (or a draw) with the wrong numbers, nothing otherwise.
    pub fn award(&self, predicted: Score, actual: Score) -> i64 {
        if predicted == actual {
            self.exact
        } else if predicted.outcome() == actual.outcome() {
            self.outcome
        } else {
            0
        }
    }
}

impl Default for PointsTable {
    fn default() -> Self {
        Self::new(DEFAULT_POINTS_EXACT, DEFAULT_POINTS_OUTCOME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_score_lines() {
        assert_eq!("2-1".parse::<Score>().unwrap(), Score::new(2, 1));
        assert_eq!("0-0".parse::<Score>().unwrap(), Score::new(0, 0));
        assert_eq!(" 10-3 ".parse::<Score>().unwrap(), Score::new(10, 3));
    }

    #[test]
    fn rejects_everything_else() {
        for bad in [
            "", "2", "2-", "-1", "2:1", "2 - 1", "a-b", "2-b", "+2-1", "2--1", "2-1-3", "2.0-1",
        ] {
            assert!(bad.parse::<Score>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn rejects_absurd_goal_counts() {
        assert_eq!(
            "70000-0".parse::<Score>().unwrap_err(),
            ParseScoreError::OutOfRange
        );
    }

    #[test]
    fn outcome_covers_all_three_results() {
        assert_eq!(Score::new(3, 1).outcome(), Outcome::HomeWin);
        assert_eq!(Score::new(0, 2).outcome(), Outcome::AwayWin);
        assert_eq!(Score::new(1, 1).outcome(), Outcome::Draw);
    }

    #[test]
    fn award_tiers() {
        let table = PointsTable::default();
        let actual = Score::new(2, 1);

        assert_eq!(table.award(Score::new(2, 1), actual), 3);
        assert_eq!(table.award(Score::new(3, 0), actual), 1); // right winner
        assert_eq!(table.award(Score::new(1, 1), actual), 0);
        assert_eq!(table.award(Score::new(1, 2), actual), 0);
    }

    #[test]
    fn draw_predictions_score_the_outcome_tier() {
        let table = PointsTable::new(5, 2);
        assert_eq!(table.award(Score::new(0, 0), Score::new(2, 2)), 2);
        assert_eq!(table.award(Score::new(2, 2), Score::new(2, 2)), 5);
    }

    #[test]
    fn round_trips_through_display() {
        let score = Score::new(12, 0);
        assert_eq!(score.to_string().parse::<Score>().unwrap(), score);
    }
}
