use std::collections::VecDeque;

use crate::db::models::fixture::Fixture;

/// Where a chat currently is in a conversation. Held by the dispatcher only;
/// engines and storage never see session state. Any recognized button press
/// abandons the session, so a stale one can always be escaped.
#[derive(Debug, Clone, Default)]
pub enum Session {
    #[default]
    Idle,
    /// `/start` from an unknown chat; the next message is the name.
    AwaitingName,
    /// Stepping through the open fixtures front to back; the next message is
    /// a score for the front of the queue.
    Predicting { queue: VecDeque<Fixture> },
    /// Admin fixture entry; the next message describes one fixture.
    AwaitingFixture,
    /// Admin result entry; the next message is `<fixture id> <score>`.
    AwaitingResult,
}
