use std::collections::HashMap;
use std::time::{Duration, Instant};

use quizroom_core::player::ConnectionId;
use quizroom_core::room::{Room, generate_room_code};

struct RoomEntry {
    room: Room,
    last_activity: Instant,
}

/// In-memory collection of live rooms. Owned by the Lifecycle Engine; no
/// ambient singleton, so tests can construct independent stores.
pub struct RoomStore {
    rooms: HashMap<String, RoomEntry>,
    /// connection-id -> room-code reverse index, kept in lockstep with room
    /// membership so disconnect cleanup is O(1) instead of a scan.
    by_connection: HashMap<ConnectionId, String>,
    next_connection_id: ConnectionId,
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
            by_connection: HashMap::new(),
            next_connection_id: 1,
        }
    }

    pub fn alloc_connection_id(&mut self) -> ConnectionId {
        let id = self.next_connection_id;
        self.next_connection_id += 1;
        id
    }

    /// Generate a room code that does not collide with any live room.
    pub fn unique_code(&self) -> String {
        loop {
            let code = generate_room_code();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }

    pub fn insert(&mut self, room: Room) {
        self.rooms.insert(
            room.code.clone(),
            RoomEntry {
                room,
                last_activity: Instant::now(),
            },
        );
    }

    pub fn get(&self, code: &str) -> Option<&Room> {
        self.rooms.get(code).map(|e| &e.room)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Room> {
        self.rooms.get_mut(code).map(|e| &mut e.room)
    }

    pub fn remove(&mut self, code: &str) -> Option<Room> {
        self.rooms.remove(code).map(|e| e.room)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.rooms.contains_key(code)
    }

    /// Bind a live connection to a room code in the reverse index.
    pub fn bind(&mut self, conn: ConnectionId, code: String) {
        self.by_connection.insert(conn, code);
    }

    pub fn unbind(&mut self, conn: ConnectionId) {
        self.by_connection.remove(&conn);
    }

    pub fn room_code_for(&self, conn: ConnectionId) -> Option<&str> {
        self.by_connection.get(&conn).map(String::as_str)
    }

    /// Touch room activity (call on any accepted action).
    pub fn touch(&mut self, code: &str) {
        if let Some(entry) = self.rooms.get_mut(code) {
            entry.last_activity = Instant::now();
        }
    }

    /// Codes of rooms idle for longer than `max_idle`.
    pub fn idle_codes(&self, max_idle: Duration) -> Vec<String> {
        let now = Instant::now();
        self.rooms
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_activity) >= max_idle)
            .map(|(code, _)| code.clone())
            .collect()
    }

    #[cfg(test)]
    pub fn age(&mut self, code: &str, by: Duration) {
        if let Some(entry) = self.rooms.get_mut(code) {
            entry.last_activity = Instant::now() - by;
        }
    }

    /// (active rooms, connected players) for the health endpoint.
    pub fn stats(&self) -> (usize, usize) {
        let players = self.rooms.values().map(|e| e.room.players.len()).sum();
        (self.rooms.len(), players)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizroom_core::room::is_valid_room_code;
    use quizroom_core::test_helpers::make_room;

    #[test]
    fn unique_code_is_valid() {
        let store = RoomStore::new();
        assert!(is_valid_room_code(&store.unique_code()));
    }

    #[test]
    fn connection_ids_are_sequential() {
        let mut store = RoomStore::new();
        assert_eq!(store.alloc_connection_id(), 1);
        assert_eq!(store.alloc_connection_id(), 2);
    }

    #[test]
    fn insert_get_remove_roundtrip() {
        let mut store = RoomStore::new();
        store.insert(make_room("AB2XYZ", 2));
        assert!(store.contains("AB2XYZ"));
        assert_eq!(store.get("AB2XYZ").unwrap().players.len(), 2);
        store.remove("AB2XYZ");
        assert!(!store.contains("AB2XYZ"));
    }

    #[test]
    fn reverse_index_binds_and_unbinds() {
        let mut store = RoomStore::new();
        store.insert(make_room("AB2XYZ", 1));
        store.bind(1, "AB2XYZ".into());
        assert_eq!(store.room_code_for(1), Some("AB2XYZ"));
        store.unbind(1);
        assert_eq!(store.room_code_for(1), None);
    }

    #[test]
    fn idle_codes_only_reports_stale_rooms() {
        let mut store = RoomStore::new();
        store.insert(make_room("AB2XYZ", 1));
        store.insert(make_room("CD3PQR", 1));
        store.age("AB2XYZ", Duration::from_secs(7200));

        let idle = store.idle_codes(Duration::from_secs(3600));
        assert_eq!(idle, vec!["AB2XYZ".to_string()]);
    }

    #[test]
    fn stats_counts_rooms_and_players() {
        let mut store = RoomStore::new();
        store.insert(make_room("AB2XYZ", 3));
        store.insert(make_room("CD3PQR", 2));
        assert_eq!(store.stats(), (2, 5));
    }
}
