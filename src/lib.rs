pub mod chat;
pub mod constants;
pub mod db;
pub mod engine;
pub mod telegram;
pub mod util;
