use thiserror::Error;

use crate::CellCount;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Invalid coordinates")]
    InvalidCoords,
    #[error("Board needs at least one row and one column")]
    EmptyBoard,
    #[error("Too many mines, requested {mines} but the board only has {cells} cells")]
    TooManyMines { mines: CellCount, cells: CellCount },
    #[error("Room not found")]
    RoomNotFound,
    #[error("Room is full")]
    RoomFull,
    #[error("Participant is not allowed to do that")]
    Unauthorized,
    #[error("Waiting for a second player to join")]
    WaitingForPlayers,
    #[error("Game already ended, no new moves are accepted")]
    AlreadyEnded,
    #[error("No room codes left")]
    RegistryFull,
    #[error("Room code already in use")]
    CodeInUse,
}

pub type Result<T> = core::result::Result<T, GameError>;
