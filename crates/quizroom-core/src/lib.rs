pub mod net;
pub mod player;
pub mod question;
pub mod room;
pub mod scoring;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::{ConnectionId, Player};
    use crate::question::Question;
    use crate::room::Room;

    /// Create `n` test players with sequential connection ids starting at 1.
    pub fn make_players(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| {
                Player::new(
                    i as ConnectionId + 1,
                    format!("client-{}", i + 1),
                    format!("Player{}", i + 1),
                )
            })
            .collect()
    }

    /// Create `n` well-formed questions; the correct answer cycles 0..4.
    pub fn make_questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                id: format!("q{}", i + 1),
                text: format!("Question {}?", i + 1),
                options: vec![
                    "Option A".to_string(),
                    "Option B".to_string(),
                    "Option C".to_string(),
                    "Option D".to_string(),
                ],
                correct_answer: (i % 4) as u8,
                difficulty: "easy".to_string(),
            })
            .collect()
    }

    /// Create a waiting room with `n` players; the first one is admin.
    pub fn make_room(code: &str, n: usize) -> Room {
        let mut players = make_players(n);
        let host = players.remove(0);
        let mut room = Room::new(code.to_string(), host);
        room.players.extend(players);
        room
    }
}
