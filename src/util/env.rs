//! Process configuration, read once at bootstrap and passed down explicitly.
//!
//! Everything lives in the environment (a `.env` file is honored during
//! development via [`dotenvy`]); nothing here is global state.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use thiserror::Error;

use crate::constants;

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error("missing required env var {0}")]
    Missing(&'static str),

    #[error("bad value for {var}: {reason}")]
    Parse { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub database_url: String,
    /// Telegram chat id granted the admin capability.
    pub admin_chat_id: i64,
    pub cutoff_weekday: Weekday,
    pub cutoff_time: NaiveTime,
    pub points_exact: i64,
    pub points_outcome: i64,
    pub leaderboard_size: i64,
    /// OTLP collector endpoint; unset means console logging only.
    pub otlp_endpoint: Option<String>,
    /// Dump spans to stdout when no collector is configured (dev aid).
    pub otel_stdout: bool,
}

impl Config {
    pub fn load() -> EnvResult<Self> {
        // a missing .env file is fine; the real environment always wins
        dotenvy::dotenv().ok();

        Ok(Self {
            bot_token: require("BOT_TOKEN")?,
            database_url: require("DATABASE_URL")?,
            admin_chat_id: parse_num("ADMIN_CHAT_ID", &require("ADMIN_CHAT_ID")?)?,
            cutoff_weekday: parse_weekday(
                "CUTOFF_WEEKDAY",
                &or_default("CUTOFF_WEEKDAY", constants::DEFAULT_CUTOFF_WEEKDAY),
            )?,
            cutoff_time: parse_time(
                "CUTOFF_TIME",
                &or_default("CUTOFF_TIME", constants::DEFAULT_CUTOFF_TIME),
            )?,
            points_exact: parse_num(
                "POINTS_EXACT",
                &or_default("POINTS_EXACT", &constants::DEFAULT_POINTS_EXACT.to_string()),
            )?,
            points_outcome: parse_num(
                "POINTS_OUTCOME",
                &or_default("POINTS_OUTCOME", &constants::DEFAULT_POINTS_OUTCOME.to_string()),
            )?,
            leaderboard_size: parse_num(
                "LEADERBOARD_SIZE",
                &or_default(
                    "LEADERBOARD_SIZE",
                    &constants::DEFAULT_LEADERBOARD_SIZE.to_string(),
                ),
            )?,
            otlp_endpoint: optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
            otel_stdout: parse_flag("OTEL_STDOUT_SPANS", &or_default("OTEL_STDOUT_SPANS", "0"))?,
        })
    }
}

fn require(var: &'static str) -> EnvResult<String> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(EnvErr::Missing(var))
}

fn optional(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn or_default(var: &str, default: &str) -> String {
    optional(var).unwrap_or_else(|| default.to_string())
}

fn parse_num<T>(var: &'static str, raw: &str) -> EnvResult<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| EnvErr::Parse {
        var,
        reason: e.to_string(),
    })
}

fn parse_weekday(var: &'static str, raw: &str) -> EnvResult<Weekday> {
    raw.trim().parse::<Weekday>().map_err(|_| EnvErr::Parse {
        var,
        reason: format!("unrecognized weekday '{raw}'"),
    })
}

fn parse_time(var: &'static str, raw: &str) -> EnvResult<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| EnvErr::Parse {
        var,
        reason: e.to_string(),
    })
}

fn parse_flag(var: &'static str, raw: &str) -> EnvResult<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(EnvErr::Parse {
            var,
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}
