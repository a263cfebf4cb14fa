use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::mpsc;

use quizroom_core::net::messages::ServerMessage;
use quizroom_core::net::protocol::encode_server_message;
use quizroom_core::player::ConnectionId;

/// Per-connection sender for outbound WebSocket binary messages.
/// Bounded to prevent memory exhaustion from slow clients.
/// Uses `Bytes` for zero-copy cloning when fanning out to a room.
pub type OutboundSender = mpsc::Sender<Bytes>;

/// Delivery seam between the Lifecycle Engine and the transport. `reply`
/// answers the acting caller; `publish` fans out to a room's connections.
pub trait Gateway: Send + Sync {
    fn reply(&self, conn: ConnectionId, msg: &ServerMessage);
    fn publish(&self, conns: &[ConnectionId], msg: &ServerMessage);
}

/// Production gateway backed by one bounded channel per live connection.
/// The WebSocket layer registers a sender on upgrade and unregisters it
/// when the socket closes.
pub struct ChannelGateway {
    senders: Mutex<HashMap<ConnectionId, OutboundSender>>,
}

impl Default for ChannelGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelGateway {
    pub fn new() -> Self {
        Self {
            senders: Mutex::new(HashMap::new()),
        }
    }

    pub fn register(&self, conn: ConnectionId, sender: OutboundSender) {
        self.senders.lock().unwrap().insert(conn, sender);
    }

    pub fn unregister(&self, conn: ConnectionId) {
        self.senders.lock().unwrap().remove(&conn);
    }

    fn send_bytes(&self, conn: ConnectionId, bytes: Bytes) {
        let sender = self.senders.lock().unwrap().get(&conn).cloned();
        if let Some(sender) = sender
            && let Err(e) = sender.try_send(bytes)
        {
            tracing::debug!(
                connection_id = conn, error = %e,
                "Dropping message to slow or disconnected client"
            );
        }
    }
}

impl Gateway for ChannelGateway {
    fn reply(&self, conn: ConnectionId, msg: &ServerMessage) {
        match encode_server_message(msg) {
            Ok(data) => self.send_bytes(conn, Bytes::from(data)),
            Err(e) => tracing::error!(connection_id = conn, error = %e, "Failed to encode reply"),
        }
    }

    fn publish(&self, conns: &[ConnectionId], msg: &ServerMessage) {
        let data = match encode_server_message(msg) {
            Ok(data) => Bytes::from(data),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode broadcast");
                return;
            },
        };
        for &conn in conns {
            self.send_bytes(conn, data.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizroom_core::net::messages::ErrorMsg;
    use quizroom_core::net::protocol::decode_server_message;

    fn error_msg(text: &str) -> ServerMessage {
        ServerMessage::Error(ErrorMsg {
            message: text.into(),
        })
    }

    #[tokio::test]
    async fn reply_reaches_registered_connection() {
        let gw = ChannelGateway::new();
        let (tx, mut rx) = mpsc::channel(8);
        gw.register(1, tx);

        gw.reply(1, &error_msg("oops"));
        let data = rx.recv().await.unwrap();
        match decode_server_message(&data).unwrap() {
            ServerMessage::Error(e) => assert_eq!(e.message, "oops"),
            other => panic!("wrong message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn publish_fans_out_to_all_listed_connections() {
        let gw = ChannelGateway::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        gw.register(1, tx1);
        gw.register(2, tx2);

        gw.publish(&[1, 2], &error_msg("hi"));
        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn unregistered_connection_is_skipped() {
        let gw = ChannelGateway::new();
        let (tx, mut rx) = mpsc::channel(8);
        gw.register(1, tx);
        gw.unregister(1);

        gw.reply(1, &error_msg("gone"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let gw = ChannelGateway::new();
        let (tx, mut rx) = mpsc::channel(1);
        gw.register(1, tx);

        gw.reply(1, &error_msg("first"));
        gw.reply(1, &error_msg("second")); // dropped, channel full
        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
