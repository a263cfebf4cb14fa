use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use quizroom_core::net::messages::{
    ClientMessage, CreateRoomMsg, JoinRoomMsg, RoomCreatedMsg, RoomJoinedMsg, ServerMessage,
};
use quizroom_core::net::protocol::{
    PROTOCOL_VERSION, decode_server_message, encode_client_message,
};
use quizroom_core::question::Question;
use quizroom_core::test_helpers::make_questions;

use quizroom_server::build_app;
use quizroom_server::config::ServerConfig;
use quizroom_server::generator::{GenerateError, QuestionGenerator};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Deterministic in-process stand-in for the question service.
pub struct MockGenerator;

impl QuestionGenerator for MockGenerator {
    fn generate<'a>(
        &'a self,
        _topic: &'a str,
        _difficulty: &'a str,
        count: u8,
    ) -> BoxFuture<'a, Result<Vec<Question>, GenerateError>> {
        Box::pin(async move { Ok(make_questions(count as usize)) })
    }
}

/// Generator that always fails, for upstream-error paths.
pub struct FailingGenerator;

impl QuestionGenerator for FailingGenerator {
    fn generate<'a>(
        &'a self,
        _topic: &'a str,
        _difficulty: &'a str,
        _count: u8,
    ) -> BoxFuture<'a, Result<Vec<Question>, GenerateError>> {
        Box::pin(async move { Err(GenerateError::Http("generator unavailable".into())) })
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with the mock generator.
    pub async fn new() -> Self {
        Self::with_generator(Arc::new(MockGenerator)).await
    }

    pub async fn with_generator(generator: Arc<dyn QuestionGenerator>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, _state) = build_app(ServerConfig::default(), generator);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _shutdown: handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

pub async fn ws_send(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Read the next server message (5s timeout).
pub async fn ws_read(stream: &mut WsStream) -> ServerMessage {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return decode_server_message(&data).unwrap();
                },
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read a server message, returning None on timeout.
pub async fn ws_try_read(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerMessage> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return Some(decode_server_message(&data).unwrap());
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                _ => continue,
            }
        }
    })
    .await
    .unwrap_or(None)
}

/// Read messages until one matches `pred`, skipping unrelated broadcasts.
pub async fn ws_read_until<F>(stream: &mut WsStream, pred: F) -> ServerMessage
where
    F: Fn(&ServerMessage) -> bool,
{
    for _ in 0..20 {
        let msg = ws_read(stream).await;
        if pred(&msg) {
            return msg;
        }
    }
    panic!("Expected message never arrived");
}

/// Create a room and return the server's confirmation.
pub async fn ws_create_room(stream: &mut WsStream, name: &str, client_id: &str) -> RoomCreatedMsg {
    ws_send(
        stream,
        &ClientMessage::CreateRoom(CreateRoomMsg {
            name: name.to_string(),
            client_id: Some(client_id.to_string()),
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;

    match ws_read(stream).await {
        ServerMessage::RoomCreated(created) => *created,
        other => panic!("Expected roomCreated, got: {other:?}"),
    }
}

/// Join an existing room and return the server's confirmation.
pub async fn ws_join_room(
    stream: &mut WsStream,
    code: &str,
    name: &str,
    client_id: &str,
) -> RoomJoinedMsg {
    ws_send(
        stream,
        &ClientMessage::JoinRoom(JoinRoomMsg {
            code: code.to_string(),
            name: name.to_string(),
            client_id: Some(client_id.to_string()),
            protocol_version: PROTOCOL_VERSION,
        }),
    )
    .await;

    match ws_read_until(stream, |m| matches!(m, ServerMessage::RoomJoined(_))).await {
        ServerMessage::RoomJoined(joined) => *joined,
        other => panic!("Expected roomJoined, got: {other:?}"),
    }
}
