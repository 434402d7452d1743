pub const BTN_PROFILE: &str = "My profile";
pub const BTN_PREDICT: &str = "Make a prediction";
pub const BTN_MY_PREDICTIONS: &str = "My predictions";
pub const BTN_LEADERBOARD: &str = "Leaderboard";
pub const BTN_NEW_FIXTURE: &str = "New fixture";
pub const BTN_ENTER_RESULT: &str = "Enter result";

/// Everything a message can mean. Raw text only survives as [`Command::Text`]
/// for the active conversation to consume; nothing downstream re-parses
/// message strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Profile,
    Predict,
    MyPredictions,
    Leaderboard,
    NewFixture,
    EnterResult,
    Text(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();

        // Telegram appends "@botname" to commands in group chats
        if trimmed == "/start" || trimmed.starts_with("/start@") {
            return Self::Start;
        }

        match trimmed {
            BTN_PROFILE => Self::Profile,
            BTN_PREDICT => Self::Predict,
            BTN_MY_PREDICTIONS => Self::MyPredictions,
            BTN_LEADERBOARD => Self::Leaderboard,
            BTN_NEW_FIXTURE => Self::NewFixture,
            BTN_ENTER_RESULT => Self::EnterResult,
            other => Self::Text(other.to_string()),
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text(_))
    }
}

/// Reply keyboard rows for a chat. Admin rows are appended, not swapped in,
/// so the admin keeps the player buttons too.
pub fn keyboard(is_admin: bool) -> Vec<Vec<String>> {
    let mut rows = vec![
        vec![BTN_PROFILE.to_string()],
        vec![BTN_PREDICT.to_string()],
        vec![BTN_MY_PREDICTIONS.to_string()],
        vec![BTN_LEADERBOARD.to_string()],
    ];

    if is_admin {
        rows.push(vec![BTN_NEW_FIXTURE.to_string(), BTN_ENTER_RESULT.to_string()]);
    }

    rows
}
