use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use quizroom_core::net::messages::{ClientMessage, ErrorMsg, ServerMessage};
use quizroom_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, encode_server_message,
};
use quizroom_core::player::ConnectionId;

use crate::engine::Action;
use crate::gateway::Gateway;
use crate::state::{AppState, ConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // First frame must enter a room: createRoom, joinRoom, or rejoinRoom.
    let first = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    let Ok(client_msg) = decode_client_message(&first) else {
        return;
    };
    let Some(version) = entry_protocol_version(&client_msg) else {
        send_error(
            &mut ws_sender,
            "expected createRoom, joinRoom, or rejoinRoom",
        )
        .await;
        return;
    };
    if version != 0 && version != PROTOCOL_VERSION {
        send_error(
            &mut ws_sender,
            &format!("protocol version mismatch: client={version}, server={PROTOCOL_VERSION}"),
        )
        .await;
        return;
    }

    // Register the outbound channel before dispatching so the engine's
    // entry reply is deliverable.
    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    let conn_id = state.engine.write().await.alloc_connection_id();
    state.gateway.register(conn_id, tx);

    let entry_result = {
        let mut engine = state.engine.write().await;
        engine.handle(&state.engine, conn_id, action_from(client_msg))
    };
    if let Err(e) = entry_result {
        state.gateway.unregister(conn_id);
        send_error(&mut ws_sender, &e.to_string()).await;
        return;
    }

    spawn_writer(ws_sender, rx);
    read_loop(&mut ws_receiver, &state, conn_id).await;

    // Socket closed: synthesize the disconnect action.
    {
        let mut engine = state.engine.write().await;
        let _ = engine.handle(&state.engine, conn_id, Action::Disconnect);
    }
    state.gateway.unregister(conn_id);
    tracing::info!(connection_id = conn_id, "Connection closed");
}

fn entry_protocol_version(msg: &ClientMessage) -> Option<u8> {
    match msg {
        ClientMessage::CreateRoom(m) => Some(m.protocol_version),
        ClientMessage::JoinRoom(m) => Some(m.protocol_version),
        ClientMessage::RejoinRoom(m) => Some(m.protocol_version),
        _ => None,
    }
}

fn action_from(msg: ClientMessage) -> Action {
    match msg {
        ClientMessage::CreateRoom(m) => Action::CreateRoom {
            name: m.name,
            client_id: m.client_id,
        },
        ClientMessage::JoinRoom(m) => Action::JoinRoom {
            code: m.code,
            name: m.name,
            client_id: m.client_id,
        },
        ClientMessage::RejoinRoom(m) => Action::RejoinRoom {
            code: m.code,
            client_id: m.client_id,
            name: m.name,
        },
        ClientMessage::UpdateSettings(m) => Action::UpdateSettings(m),
        ClientMessage::GenerateQuestions(_) => Action::GenerateQuestions,
        ClientMessage::StartQuiz(_) => Action::StartQuiz,
        ClientMessage::SelectAnswer(m) => Action::SelectAnswer {
            answer: m.answer,
            time_remaining_secs: m.time_remaining_secs,
        },
        ClientMessage::NextQuestion(_) => Action::NextQuestion,
        ClientMessage::PlayAgain(_) => Action::PlayAgain,
        ClientMessage::LeaveRoom(_) => Action::Leave,
    }
}

async fn send_error(ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>, error: &str) {
    let msg = ServerMessage::Error(ErrorMsg {
        message: error.to_string(),
    });
    if let Ok(data) = encode_server_message(&msg)
        && let Err(e) = ws_sender.send(Message::Binary(data.into())).await
    {
        tracing::warn!(error = %e, "Failed to send error response");
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender
                .send(Message::Binary(data.to_vec().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    conn_id: ConnectionId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d,
            Message::Close(_) => break,
            _ => continue,
        };

        if !rate_limiter.allow() {
            tracing::warn!(connection_id = conn_id, "Rate limited");
            continue;
        }
        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        // Undecodable frames (including server-only message types) are
        // dropped without feedback.
        let client_msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(connection_id = conn_id, error = %e, "Dropped bad frame");
                continue;
            },
        };

        let action = action_from(client_msg);
        let is_leave = matches!(action, Action::Leave);
        let result = {
            let mut engine = state.engine.write().await;
            engine.handle(&state.engine, conn_id, action)
        };
        if let Err(e) = result {
            tracing::debug!(connection_id = conn_id, error = %e, "Action rejected");
            state.gateway.reply(
                conn_id,
                &ServerMessage::Error(ErrorMsg {
                    message: e.to_string(),
                }),
            );
        }
        if is_leave {
            break;
        }
    }
}
