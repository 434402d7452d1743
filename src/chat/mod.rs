use chrono::{DateTime, Utc};

use crate::db::models::punter::ChatId;

pub mod commands;
pub mod dispatch;
pub mod session;

pub mod prelude {
    pub use crate::chat::commands::Command;
    pub use crate::chat::dispatch::Dispatcher;
    pub use crate::chat::session::Session;
    pub use crate::chat::{Inbound, Reply};
}

/// One inbound chat message, reduced to what the game needs. `at` is the
/// message timestamp and doubles as `now` for every window check downstream.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub chat_id: ChatId,
    pub display_name: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// Outbound reply. `buttons` render as a reply keyboard when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub buttons: Option<Vec<Vec<String>>>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            buttons: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, buttons: Vec<Vec<String>>) -> Self {
        Self {
            text: text.into(),
            buttons: Some(buttons),
        }
    }
}
