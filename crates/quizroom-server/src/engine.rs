use std::sync::Arc;
use std::time::Duration;

use quizroom_core::net::messages::{
    AllAnsweredMsg, ErrorMsg, GeneratingQuestionsMsg, GoToLobbyMsg, PlayerSubmittedMsg,
    QuestionUpdatedMsg, QuestionsGeneratedMsg, QuizFinishedMsg, QuizStartedMsg, RoomCreatedMsg,
    RoomJoinedMsg, RoomUpdatedMsg, ServerMessage, TimeUpMsg, UpdateSettingsMsg,
};
use quizroom_core::player::{ConnectionId, Player};
use quizroom_core::question::{OPTION_COUNT, Question};
use quizroom_core::room::{
    MAX_QUESTION_COUNT, MIN_QUESTION_COUNT, QUESTION_TIME_CHOICES, Room, RoomStatus,
    normalize_room_code,
};
use quizroom_core::scoring;

use crate::config::ServerConfig;
use crate::error::GameError;
use crate::gateway::Gateway;
use crate::generator::{GenerateError, QuestionGenerator, validate_set};
use crate::state::SharedEngine;
use crate::store::RoomStore;
use crate::timer::RoundTimers;

/// Inbound action, tagged with its payload. The transport decodes wire
/// frames into this; `Disconnect` is synthesized when a socket closes.
#[derive(Debug, Clone)]
pub enum Action {
    CreateRoom {
        name: String,
        client_id: Option<String>,
    },
    JoinRoom {
        code: String,
        name: String,
        client_id: Option<String>,
    },
    RejoinRoom {
        code: String,
        client_id: String,
        name: String,
    },
    UpdateSettings(UpdateSettingsMsg),
    GenerateQuestions,
    StartQuiz,
    SelectAnswer {
        answer: Option<u8>,
        time_remaining_secs: f64,
    },
    NextQuestion,
    PlayAgain,
    Leave,
    Disconnect,
}

/// The room lifecycle state machine. Owns the Room Store and the Round
/// Timers; talks to the transport through the Gateway seam and to the
/// question provider through the generator seam.
pub struct Engine {
    store: RoomStore,
    timers: RoundTimers,
    gateway: Arc<dyn Gateway>,
    generator: Arc<dyn QuestionGenerator>,
    max_players: usize,
}

impl Engine {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        generator: Arc<dyn QuestionGenerator>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            store: RoomStore::new(),
            timers: RoundTimers::new(),
            gateway,
            generator,
            max_players: config.rooms.max_players,
        }
    }

    pub fn alloc_connection_id(&mut self) -> ConnectionId {
        self.store.alloc_connection_id()
    }

    /// (active rooms, connected players) for the health endpoint.
    pub fn stats(&self) -> (usize, usize) {
        self.store.stats()
    }

    /// Single entry point for all inbound actions. Guards fail closed:
    /// an `Err` means nothing was mutated, and the transport reports it to
    /// the acting caller only.
    pub fn handle(
        &mut self,
        shared: &SharedEngine,
        caller: ConnectionId,
        action: Action,
    ) -> Result<(), GameError> {
        match action {
            Action::CreateRoom { name, client_id } => self.create_room(caller, name, client_id),
            Action::JoinRoom {
                code,
                name,
                client_id,
            } => self.join_room(caller, code, name, client_id),
            Action::RejoinRoom {
                code,
                client_id,
                name,
            } => self.rejoin_room(caller, code, client_id, name),
            Action::UpdateSettings(update) => self.update_settings(caller, update),
            Action::GenerateQuestions => self.generate_questions(shared, caller),
            Action::StartQuiz => self.start_quiz(shared, caller),
            Action::SelectAnswer {
                answer,
                time_remaining_secs,
            } => self.select_answer(caller, answer, time_remaining_secs),
            Action::NextQuestion => self.next_question(shared, caller),
            Action::PlayAgain => self.play_again(caller),
            Action::Leave | Action::Disconnect => {
                self.remove_player(caller);
                Ok(())
            },
        }
    }

    fn create_room(
        &mut self,
        caller: ConnectionId,
        name: String,
        client_id: Option<String>,
    ) -> Result<(), GameError> {
        if self.store.room_code_for(caller).is_some() {
            return Err(GameError::InvalidState("already in a room".into()));
        }
        let name = validate_name(&name)?;
        let client_id = effective_client_id(client_id);
        let code = self.store.unique_code();

        let host = Player::new(caller, client_id.clone(), name);
        let room = Room::new(code.clone(), host);
        self.gateway.reply(
            caller,
            &ServerMessage::RoomCreated(Box::new(RoomCreatedMsg {
                room: room.clone(),
                player_id: caller,
                client_id,
            })),
        );
        self.store.insert(room);
        self.store.bind(caller, code.clone());
        tracing::info!(room = %code, connection_id = caller, "Room created");
        Ok(())
    }

    fn join_room(
        &mut self,
        caller: ConnectionId,
        code: String,
        name: String,
        client_id: Option<String>,
    ) -> Result<(), GameError> {
        if self.store.room_code_for(caller).is_some() {
            return Err(GameError::InvalidState("already in a room".into()));
        }
        let name = validate_name(&name)?;
        let code = normalize_room_code(&code);
        {
            let room = self.store.get(&code).ok_or(GameError::NotFound)?;
            if !room.is_lobby_like() {
                return Err(GameError::InvalidState("game in progress".into()));
            }
        }

        // A returning client id rebinds its existing slot instead of
        // appending a duplicate player.
        let rebound = match client_id {
            Some(ref cid) => self.rebind_slot(&code, cid, caller, &name),
            None => None,
        };
        let snapshot = match rebound {
            Some(snap) => snap,
            None => self.append_player(&code, caller, name, client_id)?,
        };

        tracing::info!(room = %code, connection_id = caller, "Player joined");
        self.gateway.reply(
            caller,
            &ServerMessage::RoomJoined(Box::new(RoomJoinedMsg {
                room: snapshot.clone(),
                player_id: caller,
            })),
        );
        self.publish_room(&snapshot);
        Ok(())
    }

    fn rejoin_room(
        &mut self,
        caller: ConnectionId,
        code: String,
        client_id: String,
        name: String,
    ) -> Result<(), GameError> {
        if self.store.room_code_for(caller).is_some() {
            return Err(GameError::InvalidState("already in a room".into()));
        }
        let name = validate_name(&name)?;
        let code = normalize_room_code(&code);
        if !self.store.contains(&code) {
            return Err(GameError::NotFound);
        }

        if let Some(snapshot) = self.rebind_slot(&code, &client_id, caller, &name) {
            tracing::info!(room = %code, connection_id = caller, "Player rejoined");
            self.gateway.reply(
                caller,
                &ServerMessage::RoomJoined(Box::new(RoomJoinedMsg {
                    room: snapshot.clone(),
                    player_id: caller,
                })),
            );
            self.publish_room(&snapshot);
            return Ok(());
        }

        // Unknown client id: admit as a fresh join only while lobby-like.
        if !self.store.get(&code).is_some_and(Room::is_lobby_like) {
            return Err(GameError::InvalidState("game in progress".into()));
        }
        let snapshot = self.append_player(&code, caller, name, Some(client_id))?;
        tracing::info!(room = %code, connection_id = caller, "Player joined (rejoin as new)");
        self.gateway.reply(
            caller,
            &ServerMessage::RoomJoined(Box::new(RoomJoinedMsg {
                room: snapshot.clone(),
                player_id: caller,
            })),
        );
        self.publish_room(&snapshot);
        Ok(())
    }

    /// Rebind the player slot matching `client_id` to a new connection.
    /// Returns the updated snapshot when a slot matched. Admin authority
    /// follows the rebound connection.
    fn rebind_slot(
        &mut self,
        code: &str,
        client_id: &str,
        caller: ConnectionId,
        name: &str,
    ) -> Option<Room> {
        let (old_conn, snapshot) = {
            let room = self.store.get_mut(code)?;
            let player = room.player_by_client_id_mut(client_id)?;
            let old_conn = player.connection_id;
            player.connection_id = caller;
            player.name = name.to_string();
            if room.admin_id == old_conn {
                room.admin_id = caller;
            }
            (old_conn, room.clone())
        };
        self.store.unbind(old_conn);
        self.store.bind(caller, code.to_string());
        self.store.touch(code);
        Some(snapshot)
    }

    fn append_player(
        &mut self,
        code: &str,
        caller: ConnectionId,
        name: String,
        client_id: Option<String>,
    ) -> Result<Room, GameError> {
        let client_id = effective_client_id(client_id);
        let max_players = self.max_players;
        let snapshot = {
            let room = self.store.get_mut(code).ok_or(GameError::NotFound)?;
            if room.players.len() >= max_players {
                return Err(GameError::Full);
            }
            room.players.push(Player::new(caller, client_id, name));
            room.clone()
        };
        self.store.bind(caller, code.to_string());
        self.store.touch(code);
        Ok(snapshot)
    }

    fn update_settings(
        &mut self,
        caller: ConnectionId,
        update: UpdateSettingsMsg,
    ) -> Result<(), GameError> {
        let code = self.caller_room(caller)?;
        {
            let room = self.store.get(&code).ok_or(GameError::NotFound)?;
            if room.admin_id != caller {
                return Err(GameError::Unauthorized);
            }
            if !room.is_lobby_like() {
                return Err(GameError::InvalidState(
                    "settings are locked during a quiz".into(),
                ));
            }
        }
        // Validate everything before touching the room: guards fail closed
        // with no partial application.
        if let Some(count) = update.question_count
            && !(MIN_QUESTION_COUNT..=MAX_QUESTION_COUNT).contains(&count)
        {
            return Err(GameError::InvalidState(format!(
                "question count must be between {MIN_QUESTION_COUNT} and {MAX_QUESTION_COUNT}"
            )));
        }
        if let Some(secs) = update.question_time_secs
            && !QUESTION_TIME_CHOICES.contains(&secs)
        {
            return Err(GameError::InvalidState(format!(
                "question time must be one of {QUESTION_TIME_CHOICES:?} seconds"
            )));
        }
        let topic = match update.topic {
            Some(t) => {
                let t = t.trim().to_string();
                if t.is_empty() || t.len() > 128 {
                    return Err(GameError::InvalidState("invalid topic".into()));
                }
                Some(t)
            },
            None => None,
        };
        let difficulty = match update.difficulty {
            Some(d) => {
                let d = d.trim().to_string();
                if d.is_empty() || d.len() > 32 {
                    return Err(GameError::InvalidState("invalid difficulty".into()));
                }
                Some(d)
            },
            None => None,
        };

        let snapshot = {
            let room = self.store.get_mut(&code).ok_or(GameError::NotFound)?;
            if let Some(t) = topic {
                room.settings.topic = t;
            }
            if let Some(d) = difficulty {
                room.settings.difficulty = d;
            }
            if let Some(count) = update.question_count {
                room.settings.question_count = count;
            }
            if let Some(secs) = update.question_time_secs {
                room.settings.question_time_secs = secs;
            }
            // Stale-invalidation: any accepted update forces regeneration,
            // even a rewrite of identical values.
            room.questions.clear();
            room.questions_ready = false;
            room.clone()
        };
        self.store.touch(&code);
        self.publish_room(&snapshot);
        Ok(())
    }

    fn generate_questions(
        &mut self,
        shared: &SharedEngine,
        caller: ConnectionId,
    ) -> Result<(), GameError> {
        let code = self.caller_room(caller)?;
        let (topic, difficulty, count, conns) = {
            let room = self.store.get(&code).ok_or(GameError::NotFound)?;
            if room.admin_id != caller {
                return Err(GameError::Unauthorized);
            }
            if !room.is_lobby_like() {
                return Err(GameError::InvalidState(
                    "cannot generate questions during a quiz".into(),
                ));
            }
            (
                room.settings.topic.clone(),
                room.settings.difficulty.clone(),
                room.settings.question_count,
                room.connection_ids(),
            )
        };
        self.store.touch(&code);
        self.gateway.publish(
            &conns,
            &ServerMessage::GeneratingQuestions(GeneratingQuestionsMsg {
                room_code: code.clone(),
            }),
        );
        tracing::info!(room = %code, topic = %topic, count, "Generating questions");

        let generator = Arc::clone(&self.generator);
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            let result = generator.generate(&topic, &difficulty, count).await;
            let mut engine = shared.write().await;
            engine.install_generated(&code, caller, count, result);
        });
        Ok(())
    }

    /// Completion handler for the async generation call. Re-fetches the
    /// room by code: it may have been mutated or destroyed while the call
    /// was in flight, and a completion for a destroyed room is a no-op.
    pub(crate) fn install_generated(
        &mut self,
        code: &str,
        requester: ConnectionId,
        requested_count: u8,
        result: Result<Vec<Question>, GenerateError>,
    ) {
        let Some(room) = self.store.get_mut(code) else {
            tracing::debug!(room = %code, "Generation completed for a destroyed room");
            return;
        };

        let questions = match result {
            Ok(qs) => qs,
            Err(e) => {
                tracing::warn!(room = %code, error = %e, "Question generation failed");
                self.gateway
                    .reply(requester, &error_reply(&GameError::Upstream(e.to_string())));
                return;
            },
        };
        if let Err(e) = validate_set(&questions, requested_count) {
            tracing::warn!(room = %code, error = %e, "Generator returned an invalid set");
            self.gateway
                .reply(requester, &error_reply(&GameError::Upstream(e.to_string())));
            return;
        }
        if !room.is_lobby_like() || room.settings.question_count != requested_count {
            self.gateway.reply(
                requester,
                &error_reply(&GameError::InvalidState(
                    "room changed while generating questions".into(),
                )),
            );
            return;
        }

        room.questions = questions;
        room.questions_ready = true;
        let snapshot = room.clone();
        tracing::info!(room = %code, count = snapshot.questions.len(), "Questions ready");
        self.gateway.publish(
            &snapshot.connection_ids(),
            &ServerMessage::QuestionsGenerated(Box::new(QuestionsGeneratedMsg { room: snapshot })),
        );
    }

    fn start_quiz(&mut self, shared: &SharedEngine, caller: ConnectionId) -> Result<(), GameError> {
        let code = self.caller_room(caller)?;
        let (snapshot, question_time) = {
            let room = self.store.get_mut(&code).ok_or(GameError::NotFound)?;
            if room.admin_id != caller {
                return Err(GameError::Unauthorized);
            }
            if !room.questions_ready || room.questions.is_empty() {
                return Err(GameError::InvalidState("questions are not ready".into()));
            }
            match room.status {
                RoomStatus::Waiting => {},
                RoomStatus::Finished if room.rematch => {
                    if !room.players.iter().all(|p| p.ready) {
                        return Err(GameError::InvalidState("not all players are ready".into()));
                    }
                },
                _ => return Err(GameError::InvalidState("quiz already running".into())),
            }
            for p in &mut room.players {
                p.reset_match();
            }
            room.rematch = false;
            room.status = RoomStatus::Quiz;
            room.current_question = 0;
            (room.clone(), room.settings.question_time_secs)
        };
        self.store.touch(&code);
        tracing::info!(room = %code, questions = snapshot.questions.len(), "Quiz started");
        self.gateway.publish(
            &snapshot.connection_ids(),
            &ServerMessage::QuizStarted(Box::new(QuizStartedMsg { room: snapshot })),
        );
        self.timers
            .start(Arc::clone(shared), code, Duration::from_secs(question_time));
        Ok(())
    }

    fn select_answer(
        &mut self,
        caller: ConnectionId,
        answer: Option<u8>,
        time_remaining_secs: f64,
    ) -> Result<(), GameError> {
        let code = self.caller_room(caller)?;
        let (submitted, all_answered, snapshot) = {
            let room = self.store.get_mut(&code).ok_or(GameError::NotFound)?;
            if room.status != RoomStatus::Quiz {
                return Err(GameError::InvalidState("no quiz in progress".into()));
            }
            let limit = room.settings.question_time_secs;
            let correct = room
                .current_question_ref()
                .ok_or_else(|| GameError::InvalidState("no active question".into()))?
                .correct_answer;
            let player = room.player_mut(caller).ok_or(GameError::NotFound)?;
            if player.answered {
                return Err(GameError::InvalidState("answer already submitted".into()));
            }

            // The countdown remainder is caller-reported; clamp it to the
            // question window before deriving elapsed time.
            let remaining = time_remaining_secs.clamp(0.0, limit as f64);
            let elapsed = limit as f64 - remaining;
            // An out-of-range index counts as no answer.
            let answer = answer.filter(|&a| (a as usize) < OPTION_COUNT);
            let points = scoring::score(answer, correct, elapsed, limit);

            player.answered = true;
            player.selected_answer = answer;
            player.answer_time_secs = elapsed;
            player.round_points = points;
            player.score += points;
            let submitted = PlayerSubmittedMsg {
                player_id: caller,
                player_name: player.name.clone(),
            };
            (submitted, room.all_answered(), room.clone())
        };
        self.store.touch(&code);

        let conns = snapshot.connection_ids();
        self.gateway
            .publish(&conns, &ServerMessage::PlayerSubmitted(submitted));
        if all_answered {
            self.timers.cancel(&code);
            self.gateway.publish(
                &conns,
                &ServerMessage::AllAnswered(Box::new(AllAnsweredMsg {
                    room: snapshot.clone(),
                })),
            );
        }
        self.publish_room(&snapshot);
        Ok(())
    }

    fn next_question(
        &mut self,
        shared: &SharedEngine,
        caller: ConnectionId,
    ) -> Result<(), GameError> {
        let code = self.caller_room(caller)?;
        let (snapshot, next_round) = {
            let room = self.store.get_mut(&code).ok_or(GameError::NotFound)?;
            if room.admin_id != caller {
                return Err(GameError::Unauthorized);
            }
            if room.status != RoomStatus::Quiz {
                return Err(GameError::InvalidState("no quiz in progress".into()));
            }
            for p in &mut room.players {
                p.reset_round();
            }
            room.current_question += 1;
            if room.current_question >= room.questions.len() {
                room.status = RoomStatus::Finished;
                (room.clone(), None)
            } else {
                (room.clone(), Some(room.settings.question_time_secs))
            }
        };
        self.store.touch(&code);

        match next_round {
            Some(secs) => {
                self.timers
                    .start(Arc::clone(shared), code, Duration::from_secs(secs));
                self.gateway.publish(
                    &snapshot.connection_ids(),
                    &ServerMessage::QuestionUpdated(Box::new(QuestionUpdatedMsg {
                        room: snapshot.clone(),
                    })),
                );
            },
            None => {
                self.timers.cancel(&code);
                tracing::info!(room = %code, "Quiz finished");
                self.gateway.publish(
                    &snapshot.connection_ids(),
                    &ServerMessage::QuizFinished(Box::new(QuizFinishedMsg {
                        room: snapshot.clone(),
                    })),
                );
            },
        }
        Ok(())
    }

    fn play_again(&mut self, caller: ConnectionId) -> Result<(), GameError> {
        let code = self.caller_room(caller)?;
        let snapshot = {
            let room = self.store.get_mut(&code).ok_or(GameError::NotFound)?;
            if room.status != RoomStatus::Finished {
                return Err(GameError::InvalidState("the quiz has not finished".into()));
            }
            let player = room.player_mut(caller).ok_or(GameError::NotFound)?;
            player.ready = true;
            room.rematch = true;
            // The next match needs a fresh set.
            room.questions_ready = false;
            room.clone()
        };
        self.store.touch(&code);
        self.gateway.reply(
            caller,
            &ServerMessage::GoToLobby(Box::new(GoToLobbyMsg {
                room: snapshot.clone(),
            })),
        );
        self.publish_room(&snapshot);
        Ok(())
    }

    /// Remove a player on leave or disconnect. Destroys the room the
    /// instant it empties; otherwise promotes the next player in join
    /// order when the admin left.
    fn remove_player(&mut self, caller: ConnectionId) {
        let Some(code) = self.store.room_code_for(caller).map(str::to_string) else {
            return; // never joined, or already cleaned up
        };
        self.store.unbind(caller);

        let survivors = {
            let Some(room) = self.store.get_mut(&code) else {
                return;
            };
            room.players.retain(|p| p.connection_id != caller);
            if room.players.is_empty() {
                None
            } else {
                if room.admin_id == caller {
                    room.admin_id = room.players[0].connection_id;
                    tracing::info!(room = %code, admin = room.admin_id, "Admin left, promoted next player");
                }
                Some(room.clone())
            }
        };

        match survivors {
            None => {
                self.timers.cancel(&code);
                self.store.remove(&code);
                tracing::info!(room = %code, "Room destroyed (last player left)");
            },
            Some(snapshot) => {
                self.store.touch(&code);
                tracing::info!(room = %code, connection_id = caller, "Player left");
                self.publish_room(&snapshot);
            },
        }
    }

    /// Round Timer expiry. Re-fetches the room by code; silently no-ops
    /// when the room is gone or no quiz is running anymore.
    pub(crate) fn handle_time_up(&mut self, code: &str) {
        self.timers.clear_finished(code);
        let snapshot = {
            let Some(room) = self.store.get_mut(code) else {
                return;
            };
            if room.status != RoomStatus::Quiz {
                return;
            }
            for p in &mut room.players {
                if !p.answered {
                    p.answered = true;
                    p.selected_answer = None;
                    p.round_points = 0;
                }
            }
            room.clone()
        };
        tracing::debug!(room = %code, "Round timer expired");
        let conns = snapshot.connection_ids();
        self.gateway.publish(
            &conns,
            &ServerMessage::TimeUp(Box::new(TimeUpMsg {
                room: snapshot.clone(),
            })),
        );
        self.gateway.publish(
            &conns,
            &ServerMessage::AllAnswered(Box::new(AllAnsweredMsg { room: snapshot })),
        );
    }

    /// Destroy rooms idle past `max_idle`. Returns the number removed.
    pub fn sweep_idle(&mut self, max_idle: Duration) -> usize {
        let codes = self.store.idle_codes(max_idle);
        for code in &codes {
            self.timers.cancel(code);
            if let Some(room) = self.store.remove(code) {
                for p in &room.players {
                    self.store.unbind(p.connection_id);
                }
                tracing::info!(room = %code, players = room.players.len(), "Idle room removed");
            }
        }
        codes.len()
    }

    fn caller_room(&self, caller: ConnectionId) -> Result<String, GameError> {
        self.store
            .room_code_for(caller)
            .map(str::to_string)
            .ok_or(GameError::NotFound)
    }

    /// Full-snapshot fan-out sent after every mutation visible to the room.
    fn publish_room(&self, room: &Room) {
        self.gateway.publish(
            &room.connection_ids(),
            &ServerMessage::RoomUpdated(Box::new(RoomUpdatedMsg { room: room.clone() })),
        );
    }

    #[cfg(test)]
    pub fn room_snapshot(&self, code: &str) -> Option<Room> {
        self.store.get(code).cloned()
    }

    #[cfg(test)]
    pub fn room_code_of(&self, conn: ConnectionId) -> Option<String> {
        self.store.room_code_for(conn).map(str::to_string)
    }

    #[cfg(test)]
    pub fn timer_armed(&self, code: &str) -> bool {
        self.timers.is_armed(code)
    }

    #[cfg(test)]
    pub fn room_count(&self) -> usize {
        self.stats().0
    }
}

fn validate_name(name: &str) -> Result<String, GameError> {
    let name = name.trim();
    if name.is_empty() || name.len() > 32 || name.chars().any(char::is_control) {
        return Err(GameError::InvalidState("invalid player name".into()));
    }
    Ok(name.to_string())
}

fn effective_client_id(client_id: Option<String>) -> String {
    client_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}

fn error_reply(err: &GameError) -> ServerMessage {
    ServerMessage::Error(ErrorMsg {
        message: err.to_string(),
    })
}
