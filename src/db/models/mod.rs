pub mod fixture;
pub mod leaderboard;
pub mod prediction;
pub mod punter;
pub mod score;
