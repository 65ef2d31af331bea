//! Line-delimited JSON messages exchanged between players and the server.
//!
//! Every line is one object tagged by `"type"`. Clients send [`ClientMessage`]s, the server
//! answers with [`ServerMessage`]s.

use duosweep_core::{
    BoardSnapshot, CellCount, Coord, GameError, Mode, RoomCode, Seat, SessionSnapshot,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Opens a new room. Dimensions left out fall back to the server defaults.
    Create {
        #[serde(default)]
        mode: Mode,
        #[serde(default)]
        width: Option<Coord>,
        #[serde(default)]
        height: Option<Coord>,
        #[serde(default)]
        mines: Option<CellCount>,
    },
    Join {
        code: RoomCode,
    },
    Move {
        code: RoomCode,
        x: Coord,
        y: Coord,
    },
    Reset {
        code: RoomCode,
    },
    Reconfigure {
        code: RoomCode,
        width: Coord,
        height: Coord,
        mines: CellCount,
    },
    Chat {
        code: RoomCode,
        message: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Created {
        code: RoomCode,
    },
    /// Sent to a participant right after joining.
    GameState {
        seat: Seat,
        session: SessionSnapshot,
    },
    /// Both seats of a multi room are taken.
    GameStart {
        session: SessionSnapshot,
    },
    BoardUpdate {
        board: BoardSnapshot,
        turn: Seat,
    },
    GameOver {
        result: GameResult,
        board: BoardSnapshot,
    },
    GameReset {
        session: SessionSnapshot,
    },
    Reconfigured {
        session: SessionSnapshot,
    },
    Chat {
        seat: Seat,
        message: String,
    },
    Error {
        kind: ErrorKind,
        message: String,
    },
}

impl ServerMessage {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }
}

impl From<GameError> for ServerMessage {
    fn from(err: GameError) -> Self {
        Self::error(ErrorKind::from(err), err.to_string())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GameResult {
    Mine { loser: Seat, winner: Option<Seat> },
    Draw,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RoomNotFound,
    RoomFull,
    Unauthorized,
    WaitingForPlayers,
    GameOver,
    InvalidConfig,
    BadRequest,
    ServerFull,
}

impl From<GameError> for ErrorKind {
    fn from(err: GameError) -> Self {
        use GameError::*;
        match err {
            RoomNotFound => Self::RoomNotFound,
            RoomFull => Self::RoomFull,
            Unauthorized => Self::Unauthorized,
            WaitingForPlayers => Self::WaitingForPlayers,
            AlreadyEnded => Self::GameOver,
            EmptyBoard | TooManyMines { .. } => Self::InvalidConfig,
            InvalidCoords => Self::BadRequest,
            RegistryFull | CodeInUse => Self::ServerFull,
        }
    }
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Message spans more than one line")]
    Multiline,
}

pub fn decode_line(line: &str) -> Result<ClientMessage, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.contains('\n') {
        return Err(ProtocolError::Multiline);
    }
    Ok(serde_json::from_str(line)?)
}

/// Encodes one message without the trailing newline.
pub fn encode_line(message: &ServerMessage) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}
