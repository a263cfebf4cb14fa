use serde::{Deserialize, Serialize};

use crate::player::{ConnectionId, Player};
use crate::question::Question;

/// Allowed per-question countdown durations in seconds.
pub const QUESTION_TIME_CHOICES: &[u64] = &[10, 15, 20, 30, 60];

pub const DEFAULT_QUESTION_TIME_SECS: u64 = 30;
pub const MIN_QUESTION_COUNT: u8 = 1;
pub const MAX_QUESTION_COUNT: u8 = 20;

/// Lobby-configurable quiz settings. Any change invalidates a previously
/// generated question set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub topic: String,
    pub difficulty: String,
    pub question_count: u8,
    pub question_time_secs: u64,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            topic: "General Knowledge".to_string(),
            difficulty: "medium".to_string(),
            question_count: 5,
            question_time_secs: DEFAULT_QUESTION_TIME_SECS,
        }
    }
}

/// Current phase of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Waiting,
    Quiz,
    Finished,
}

/// One isolated game session: players, settings, and question progression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub code: String,
    /// Connection id of the player holding host authority. Transferred to
    /// the next player in join order when the admin leaves.
    pub admin_id: ConnectionId,
    pub status: RoomStatus,
    /// Once any player requests a new match after `Finished`, the room acts
    /// as a second lobby while still showing results.
    pub rematch: bool,
    /// Insertion order is join order; admin succession depends on it.
    pub players: Vec<Player>,
    pub questions: Vec<Question>,
    /// Gate for starting a quiz. Cleared whenever the question set would go
    /// stale (settings change, rematch).
    pub questions_ready: bool,
    pub current_question: usize,
    pub settings: RoomSettings,
}

impl Room {
    pub fn new(code: String, host: Player) -> Self {
        let admin_id = host.connection_id;
        Self {
            code,
            admin_id,
            status: RoomStatus::Waiting,
            rematch: false,
            players: vec![host],
            questions: Vec::new(),
            questions_ready: false,
            current_question: 0,
            settings: RoomSettings::default(),
        }
    }

    /// Lobby-like: settings may be edited and new players admitted.
    pub fn is_lobby_like(&self) -> bool {
        match self.status {
            RoomStatus::Waiting => true,
            RoomStatus::Finished => self.rematch,
            RoomStatus::Quiz => false,
        }
    }

    pub fn player(&self, id: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.connection_id == id)
    }

    pub fn player_mut(&mut self, id: ConnectionId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.connection_id == id)
    }

    pub fn player_by_client_id_mut(&mut self, client_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.client_id == client_id)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|p| p.connection_id).collect()
    }

    pub fn all_answered(&self) -> bool {
        self.players.iter().all(|p| p.answered)
    }

    pub fn current_question_ref(&self) -> Option<&Question> {
        self.questions.get(self.current_question)
    }
}

const CODE_LEN: usize = 6;
/// Uppercase alphanumerics minus the lookalikes (0/O, 1/I).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generate a short room code. Callers retry on collision with live rooms.
pub fn generate_room_code() -> String {
    use rand::Rng;
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

/// Room codes are case-insensitive on input.
pub fn normalize_room_code(input: &str) -> String {
    input.trim().to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> Player {
        Player::new(1, "client-1".into(), "Alice".into())
    }

    #[test]
    fn new_room_is_waiting_lobby() {
        let room = Room::new("ABCDEF".into(), host());
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.admin_id, 1);
        assert!(room.is_lobby_like());
        assert!(!room.questions_ready);
        assert_eq!(room.players.len(), 1);
    }

    #[test]
    fn quiz_is_not_lobby_like() {
        let mut room = Room::new("ABCDEF".into(), host());
        room.status = RoomStatus::Quiz;
        assert!(!room.is_lobby_like());
    }

    #[test]
    fn finished_is_lobby_like_only_with_rematch() {
        let mut room = Room::new("ABCDEF".into(), host());
        room.status = RoomStatus::Finished;
        assert!(!room.is_lobby_like());
        room.rematch = true;
        assert!(room.is_lobby_like());
    }

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(is_valid_room_code(&code), "invalid room code: {code}");
        }
    }

    #[test]
    fn normalize_uppercases_and_trims() {
        assert_eq!(normalize_room_code("  ab2xyz "), "AB2XYZ");
    }

    #[test]
    fn lookalike_characters_rejected() {
        assert!(!is_valid_room_code("ABCDE0"));
        assert!(!is_valid_room_code("ABCDEI"));
        assert!(!is_valid_room_code("ABC"));
    }

    #[test]
    fn default_settings_within_bounds() {
        let s = RoomSettings::default();
        assert!(s.question_count >= MIN_QUESTION_COUNT && s.question_count <= MAX_QUESTION_COUNT);
        assert!(QUESTION_TIME_CHOICES.contains(&s.question_time_secs));
    }
}
