use serde::{Deserialize, Serialize};

/// Identifier for a live transport connection. Allocated by the server,
/// unique among currently-connected players, rebound in place on rejoin.
pub type ConnectionId = u64;

/// A participant in a quizroom session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub connection_id: ConnectionId,
    /// Durable identity supplied by the client (or synthesized at first
    /// join). Matches a returning connection to this slot across
    /// disconnects.
    pub client_id: String,
    pub name: String,
    pub score: u32,
    pub answered: bool,
    /// `None` doubles as the no-answer sentinel when a round expires.
    pub selected_answer: Option<u8>,
    pub answer_time_secs: f64,
    pub round_points: u32,
    /// Gates the next match start during a rematch lobby.
    pub ready: bool,
}

impl Player {
    pub fn new(connection_id: ConnectionId, client_id: String, name: String) -> Self {
        Self {
            connection_id,
            client_id,
            name,
            score: 0,
            answered: false,
            selected_answer: None,
            answer_time_secs: 0.0,
            round_points: 0,
            ready: false,
        }
    }

    /// Clear the fields scoped to a single question.
    pub fn reset_round(&mut self) {
        self.answered = false;
        self.selected_answer = None;
        self.answer_time_secs = 0.0;
        self.round_points = 0;
    }

    /// Clear everything scoped to a match (quiz start or rematch start).
    pub fn reset_match(&mut self) {
        self.score = 0;
        self.ready = false;
        self.reset_round();
    }
}
