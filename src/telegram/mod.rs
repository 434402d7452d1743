pub mod api;
pub mod poller;
pub mod types;

pub mod prelude {
    pub use crate::telegram::api::{BotApi, TgErr, TgResult};
    pub use crate::telegram::poller::Poller;
    pub use crate::telegram::types::{
        ApiResponse, Chat, GetUpdates, KeyboardButton, Message, OutgoingMessage,
        ReplyKeyboardMarkup, TgUser, Update,
    };
}
