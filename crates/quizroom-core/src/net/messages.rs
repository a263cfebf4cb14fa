use serde::{Deserialize, Serialize};

use crate::player::ConnectionId;
use crate::room::Room;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    CreateRoom = 0x01,
    JoinRoom = 0x02,
    RejoinRoom = 0x03,
    UpdateSettings = 0x04,
    GenerateQuestions = 0x05,
    StartQuiz = 0x06,
    SelectAnswer = 0x07,
    NextQuestion = 0x08,
    PlayAgain = 0x09,
    LeaveRoom = 0x0A,

    // Server -> Client
    RoomCreated = 0x10,
    RoomJoined = 0x11,
    RoomUpdated = 0x12,
    GeneratingQuestions = 0x13,
    QuestionsGenerated = 0x14,
    QuizStarted = 0x15,
    QuestionUpdated = 0x16,
    PlayerSubmitted = 0x17,
    AllAnswered = 0x18,
    TimeUp = 0x19,
    QuizFinished = 0x1A,
    GoToLobby = 0x1B,
    Error = 0x1F,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x01 => Self::CreateRoom,
            0x02 => Self::JoinRoom,
            0x03 => Self::RejoinRoom,
            0x04 => Self::UpdateSettings,
            0x05 => Self::GenerateQuestions,
            0x06 => Self::StartQuiz,
            0x07 => Self::SelectAnswer,
            0x08 => Self::NextQuestion,
            0x09 => Self::PlayAgain,
            0x0A => Self::LeaveRoom,
            0x10 => Self::RoomCreated,
            0x11 => Self::RoomJoined,
            0x12 => Self::RoomUpdated,
            0x13 => Self::GeneratingQuestions,
            0x14 => Self::QuestionsGenerated,
            0x15 => Self::QuizStarted,
            0x16 => Self::QuestionUpdated,
            0x17 => Self::PlayerSubmitted,
            0x18 => Self::AllAnswered,
            0x19 => Self::TimeUp,
            0x1A => Self::QuizFinished,
            0x1B => Self::GoToLobby,
            0x1F => Self::Error,
            _ => return None,
        })
    }
}

// ---- Client -> Server payloads ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoomMsg {
    pub name: String,
    /// Durable identity; synthesized server-side when absent.
    pub client_id: Option<String>,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub code: String,
    pub name: String,
    pub client_id: Option<String>,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejoinRoomMsg {
    pub code: String,
    pub client_id: String,
    pub name: String,
    pub protocol_version: u8,
}

/// Partial settings update; absent fields keep their current value.
/// Any accepted update invalidates the generated question set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsMsg {
    pub topic: Option<String>,
    pub difficulty: Option<String>,
    pub question_count: Option<u8>,
    pub question_time_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectAnswerMsg {
    /// `None` submits a deliberate pass.
    pub answer: Option<u8>,
    /// Caller-reported countdown remainder used for the time bonus.
    pub time_remaining_secs: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateQuestionsMsg {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartQuizMsg {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NextQuestionMsg {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayAgainMsg {}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaveRoomMsg {}

// ---- Server -> Client payloads ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomCreatedMsg {
    pub room: Room,
    pub player_id: ConnectionId,
    pub client_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomJoinedMsg {
    pub room: Room,
    pub player_id: ConnectionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomUpdatedMsg {
    pub room: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratingQuestionsMsg {
    pub room_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionsGeneratedMsg {
    pub room: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizStartedMsg {
    pub room: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionUpdatedMsg {
    pub room: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSubmittedMsg {
    pub player_id: ConnectionId,
    pub player_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllAnsweredMsg {
    pub room: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeUpMsg {
    pub room: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizFinishedMsg {
    pub room: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoToLobbyMsg {
    pub room: Room,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub message: String,
}

/// All messages a client may send.
#[derive(Debug, Clone)]
pub enum ClientMessage {
    CreateRoom(CreateRoomMsg),
    JoinRoom(JoinRoomMsg),
    RejoinRoom(RejoinRoomMsg),
    UpdateSettings(UpdateSettingsMsg),
    GenerateQuestions(GenerateQuestionsMsg),
    StartQuiz(StartQuizMsg),
    SelectAnswer(SelectAnswerMsg),
    NextQuestion(NextQuestionMsg),
    PlayAgain(PlayAgainMsg),
    LeaveRoom(LeaveRoomMsg),
}

/// All messages the server may send.
#[derive(Debug, Clone)]
pub enum ServerMessage {
    RoomCreated(Box<RoomCreatedMsg>),
    RoomJoined(Box<RoomJoinedMsg>),
    RoomUpdated(Box<RoomUpdatedMsg>),
    GeneratingQuestions(GeneratingQuestionsMsg),
    QuestionsGenerated(Box<QuestionsGeneratedMsg>),
    QuizStarted(Box<QuizStartedMsg>),
    QuestionUpdated(Box<QuestionUpdatedMsg>),
    PlayerSubmitted(PlayerSubmittedMsg),
    AllAnswered(Box<AllAnsweredMsg>),
    TimeUp(Box<TimeUpMsg>),
    QuizFinished(Box<QuizFinishedMsg>),
    GoToLobby(Box<GoToLobbyMsg>),
    Error(ErrorMsg),
}
