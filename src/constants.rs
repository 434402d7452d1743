pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

pub const SERVICE_NAME: &str = "totobot";
pub const TRACER_NAME: &str = "totobot-tracer";

// prediction window: cutoff weekday/time, overridable via env
pub const DEFAULT_CUTOFF_WEEKDAY: &str = "fri";
pub const DEFAULT_CUTOFF_TIME: &str = "20:00";

// points awarded per prediction, overridable via env
pub const DEFAULT_POINTS_EXACT: i64 = 3;
pub const DEFAULT_POINTS_OUTCOME: i64 = 1;

pub const DEFAULT_LEADERBOARD_SIZE: i64 = 10;

// display-name cap for registration
pub const MAX_NAME_CHARS: usize = 64;

// long-poll window for getUpdates; the http client timeout must outlive it
pub const POLL_TIMEOUT_SECS: u64 = 30;
pub const HTTP_TIMEOUT_SLACK_SECS: u64 = 10;

// telegram allows ~30 messages/sec across all chats; stay under it
pub const SEND_RATE_PER_SEC: usize = 25;

// reconnect backoff bounds for the poll loop
pub const BACKOFF_BASE_MS: u64 = 500;
pub const BACKOFF_MAX_MS: u64 = 30_000;
pub const BACKOFF_JITTER_MS: u64 = 250;

pub const KICKOFF_FORMAT: &str = "%Y-%m-%d %H:%M";
