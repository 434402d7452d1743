use serde::{Deserialize, Serialize};

/// One leaderboard row. `rank` is assigned by the store (points descending,
/// ties broken by registration order), so callers never depend on iteration
/// order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Standing {
    pub rank: i64,
    pub name: String,
    pub points: i64,
}
