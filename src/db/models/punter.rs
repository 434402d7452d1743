use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The stable external chat identity the transport hands us. Everything
/// user-facing is keyed by this, never by the internal row id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct ChatId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(transparent)]
pub struct PunterId(pub i64);

/// Base punter table model.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Punter {
    pub id: PunterId,
    pub chat_id: ChatId,
    pub name: String,
    pub points: i64,
    pub created_at: DateTime<Utc>,
}

/// What `ensure_punter` found: a freshly inserted row or one that was
/// already there.
#[derive(Debug, Clone, PartialEq)]
pub enum Registration {
    Created(Punter),
    Existing(Punter),
}

impl Registration {
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

impl From<i64> for ChatId {
    fn from(value: i64) -> Self {
        ChatId(value)
    }
}

impl From<i64> for PunterId {
    fn from(value: i64) -> Self {
        PunterId(value)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PunterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
