use serde::{Deserialize, Serialize};

use super::messages::{
    AllAnsweredMsg, ClientMessage, CreateRoomMsg, ErrorMsg, GenerateQuestionsMsg,
    GeneratingQuestionsMsg, GoToLobbyMsg, JoinRoomMsg, LeaveRoomMsg, MessageType, NextQuestionMsg,
    PlayAgainMsg, PlayerSubmittedMsg, QuestionUpdatedMsg, QuestionsGeneratedMsg, QuizFinishedMsg,
    QuizStartedMsg, RejoinRoomMsg, RoomCreatedMsg, RoomJoinedMsg, RoomUpdatedMsg, SelectAnswerMsg,
    ServerMessage, StartQuizMsg, TimeUpMsg, UpdateSettingsMsg,
};

/// Current protocol version. Checked on the first message of a connection.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    UnexpectedMessageType(MessageType),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::UnexpectedMessageType(t) => write!(f, "unexpected message type: {t:?}"),
            Self::PayloadTooLarge(size) => {
                write!(f, "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})")
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::CreateRoom(m) => encode_message(MessageType::CreateRoom, m),
        ClientMessage::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientMessage::RejoinRoom(m) => encode_message(MessageType::RejoinRoom, m),
        ClientMessage::UpdateSettings(m) => encode_message(MessageType::UpdateSettings, m),
        ClientMessage::GenerateQuestions(m) => encode_message(MessageType::GenerateQuestions, m),
        ClientMessage::StartQuiz(m) => encode_message(MessageType::StartQuiz, m),
        ClientMessage::SelectAnswer(m) => encode_message(MessageType::SelectAnswer, m),
        ClientMessage::NextQuestion(m) => encode_message(MessageType::NextQuestion, m),
        ClientMessage::PlayAgain(m) => encode_message(MessageType::PlayAgain, m),
        ClientMessage::LeaveRoom(m) => encode_message(MessageType::LeaveRoom, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::RoomCreated(m) => encode_message(MessageType::RoomCreated, m),
        ServerMessage::RoomJoined(m) => encode_message(MessageType::RoomJoined, m),
        ServerMessage::RoomUpdated(m) => encode_message(MessageType::RoomUpdated, m),
        ServerMessage::GeneratingQuestions(m) => {
            encode_message(MessageType::GeneratingQuestions, m)
        },
        ServerMessage::QuestionsGenerated(m) => encode_message(MessageType::QuestionsGenerated, m),
        ServerMessage::QuizStarted(m) => encode_message(MessageType::QuizStarted, m),
        ServerMessage::QuestionUpdated(m) => encode_message(MessageType::QuestionUpdated, m),
        ServerMessage::PlayerSubmitted(m) => encode_message(MessageType::PlayerSubmitted, m),
        ServerMessage::AllAnswered(m) => encode_message(MessageType::AllAnswered, m),
        ServerMessage::TimeUp(m) => encode_message(MessageType::TimeUp, m),
        ServerMessage::QuizFinished(m) => encode_message(MessageType::QuizFinished, m),
        ServerMessage::GoToLobby(m) => encode_message(MessageType::GoToLobby, m),
        ServerMessage::Error(m) => encode_message(MessageType::Error, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::CreateRoom => Ok(ClientMessage::CreateRoom(
            decode_payload::<CreateRoomMsg>(data)?,
        )),
        MessageType::JoinRoom => Ok(ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::RejoinRoom => Ok(ClientMessage::RejoinRoom(
            decode_payload::<RejoinRoomMsg>(data)?,
        )),
        MessageType::UpdateSettings => Ok(ClientMessage::UpdateSettings(decode_payload::<
            UpdateSettingsMsg,
        >(data)?)),
        MessageType::GenerateQuestions => Ok(ClientMessage::GenerateQuestions(decode_payload::<
            GenerateQuestionsMsg,
        >(data)?)),
        MessageType::StartQuiz => Ok(ClientMessage::StartQuiz(decode_payload::<StartQuizMsg>(
            data,
        )?)),
        MessageType::SelectAnswer => Ok(ClientMessage::SelectAnswer(
            decode_payload::<SelectAnswerMsg>(data)?,
        )),
        MessageType::NextQuestion => Ok(ClientMessage::NextQuestion(
            decode_payload::<NextQuestionMsg>(data)?,
        )),
        MessageType::PlayAgain => Ok(ClientMessage::PlayAgain(decode_payload::<PlayAgainMsg>(
            data,
        )?)),
        MessageType::LeaveRoom => Ok(ClientMessage::LeaveRoom(decode_payload::<LeaveRoomMsg>(
            data,
        )?)),
        other => Err(ProtocolError::UnexpectedMessageType(other)),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::RoomCreated => Ok(ServerMessage::RoomCreated(Box::new(decode_payload::<
            RoomCreatedMsg,
        >(data)?))),
        MessageType::RoomJoined => Ok(ServerMessage::RoomJoined(Box::new(decode_payload::<
            RoomJoinedMsg,
        >(data)?))),
        MessageType::RoomUpdated => Ok(ServerMessage::RoomUpdated(Box::new(decode_payload::<
            RoomUpdatedMsg,
        >(data)?))),
        MessageType::GeneratingQuestions => Ok(ServerMessage::GeneratingQuestions(
            decode_payload::<GeneratingQuestionsMsg>(data)?,
        )),
        MessageType::QuestionsGenerated => Ok(ServerMessage::QuestionsGenerated(Box::new(
            decode_payload::<QuestionsGeneratedMsg>(data)?,
        ))),
        MessageType::QuizStarted => Ok(ServerMessage::QuizStarted(Box::new(decode_payload::<
            QuizStartedMsg,
        >(data)?))),
        MessageType::QuestionUpdated => Ok(ServerMessage::QuestionUpdated(Box::new(
            decode_payload::<QuestionUpdatedMsg>(data)?,
        ))),
        MessageType::PlayerSubmitted => Ok(ServerMessage::PlayerSubmitted(decode_payload::<
            PlayerSubmittedMsg,
        >(data)?)),
        MessageType::AllAnswered => Ok(ServerMessage::AllAnswered(Box::new(decode_payload::<
            AllAnsweredMsg,
        >(data)?))),
        MessageType::TimeUp => Ok(ServerMessage::TimeUp(Box::new(
            decode_payload::<TimeUpMsg>(data)?,
        ))),
        MessageType::QuizFinished => Ok(ServerMessage::QuizFinished(Box::new(decode_payload::<
            QuizFinishedMsg,
        >(data)?))),
        MessageType::GoToLobby => Ok(ServerMessage::GoToLobby(Box::new(decode_payload::<
            GoToLobbyMsg,
        >(data)?))),
        MessageType::Error => Ok(ServerMessage::Error(decode_payload::<ErrorMsg>(data)?)),
        other => Err(ProtocolError::UnexpectedMessageType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use crate::room::Room;

    #[test]
    fn client_message_roundtrip() {
        let msg = ClientMessage::JoinRoom(JoinRoomMsg {
            code: "AB2XYZ".into(),
            name: "Alice".into(),
            client_id: Some("client-a".into()),
            protocol_version: PROTOCOL_VERSION,
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::JoinRoom as u8);
        match decode_client_message(&encoded).unwrap() {
            ClientMessage::JoinRoom(m) => {
                assert_eq!(m.code, "AB2XYZ");
                assert_eq!(m.name, "Alice");
            },
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn server_message_roundtrip() {
        let room = Room::new(
            "AB2XYZ".into(),
            Player::new(1, "client-a".into(), "Alice".into()),
        );
        let msg = ServerMessage::RoomUpdated(Box::new(RoomUpdatedMsg { room }));
        let encoded = encode_server_message(&msg).unwrap();
        match decode_server_message(&encoded).unwrap() {
            ServerMessage::RoomUpdated(m) => {
                assert_eq!(m.room.code, "AB2XYZ");
                assert_eq!(m.room.players.len(), 1);
            },
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn select_answer_pass_roundtrip() {
        let msg = ClientMessage::SelectAnswer(SelectAnswerMsg {
            answer: None,
            time_remaining_secs: 12.5,
        });
        let encoded = encode_client_message(&msg).unwrap();
        match decode_client_message(&encoded).unwrap() {
            ClientMessage::SelectAnswer(m) => {
                assert!(m.answer.is_none());
                assert!((m.time_remaining_secs - 12.5).abs() < f64::EPSILON);
            },
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn empty_data_rejected() {
        assert!(matches!(
            decode_message_type(&[]),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn unknown_type_rejected() {
        assert!(matches!(
            decode_message_type(&[0xEE]),
            Err(ProtocolError::UnknownMessageType(0xEE))
        ));
    }

    #[test]
    fn server_type_rejected_as_client_message() {
        let msg = ServerMessage::Error(ErrorMsg {
            message: "nope".into(),
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert!(matches!(
            decode_client_message(&encoded),
            Err(ProtocolError::UnexpectedMessageType(MessageType::Error))
        ));
    }
}
