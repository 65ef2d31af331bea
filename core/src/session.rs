use core::fmt;

use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::*;

/// Opaque identity of a connected participant, assigned by the transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Fixed position of a participant: 0 for whoever joined first, 1 for the second.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Seat(u8);

impl Seat {
    pub const FIRST: Self = Self(0);
    pub const SECOND: Self = Self(1);

    pub const fn other(self) -> Self {
        Self((self.0 + 1) % 2)
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seat {}", self.0)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Single,
    #[default]
    Multi,
}

impl Mode {
    pub const fn capacity(self) -> usize {
        match self {
            Self::Single => 1,
            Self::Multi => 2,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub seat: Seat,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    WaitingForPlayers,
    InProgress,
    Over,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Game goes on. `changed` is false when the move hit a cell that was not hidden.
    Continue { turn: Seat, changed: bool },
    Mine { loser: Seat, winner: Option<Seat> },
    /// Board cleared with nobody hitting a mine.
    Draw,
}

/// Everything a client needs to render the session from scratch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub code: RoomCode,
    pub mode: Mode,
    pub phase: Phase,
    pub turn: Seat,
    pub board: BoardSnapshot,
}

#[derive(Debug)]
pub struct Session {
    code: RoomCode,
    mode: Mode,
    config: GameConfig,
    board: Board,
    participants: Vec<Participant>,
    turn: Seat,
    finished: bool,
    rng: SmallRng,
}

impl Session {
    /// Fresh session with randomly placed mines drawn from `rng`.
    pub fn new(code: RoomCode, mode: Mode, config: GameConfig, mut rng: SmallRng) -> Self {
        let layout = RandomMinefieldGenerator::new(&mut rng).generate(config);
        Self::from_parts(code, mode, config, layout, rng)
    }

    /// Session over a known mine layout. Later resets still draw from `rng`.
    pub fn with_layout(code: RoomCode, mode: Mode, layout: MineLayout, rng: SmallRng) -> Result<Self> {
        let (width, height) = layout.size();
        let config = GameConfig::new(width, height, layout.mine_count())?;
        Ok(Self::from_parts(code, mode, config, layout, rng))
    }

    fn from_parts(code: RoomCode, mode: Mode, config: GameConfig, layout: MineLayout, rng: SmallRng) -> Self {
        Self {
            code,
            mode,
            config,
            board: Board::new(layout),
            participants: Vec::with_capacity(mode.capacity()),
            turn: Seat::FIRST,
            finished: false,
            rng,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn config(&self) -> GameConfig {
        self.config
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn turn(&self) -> Seat {
        self.turn
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.mode.capacity()
    }

    pub fn phase(&self) -> Phase {
        if self.finished {
            Phase::Over
        } else if self.is_full() {
            Phase::InProgress
        } else {
            Phase::WaitingForPlayers
        }
    }

    pub fn seat_of(&self, id: ParticipantId) -> Option<Seat> {
        self.participants
            .iter()
            .find(|participant| participant.id == id)
            .map(|participant| participant.seat)
    }

    pub fn join(&mut self, id: ParticipantId) -> Result<Seat> {
        if let Some(seat) = self.seat_of(id) {
            return Ok(seat);
        }
        if self.is_full() {
            return Err(GameError::RoomFull);
        }

        let seat = Seat(self.participants.len() as u8);
        self.participants.push(Participant { id, seat });
        log::info!("Room {}: participant {} took {}", self.code, id, seat);
        Ok(seat)
    }

    pub fn apply_move(&mut self, id: ParticipantId, coords: Coord2) -> Result<MoveOutcome> {
        self.authorize_move(id)?;

        let outcome = self.board.reveal(coords);
        log::debug!(
            "Room {}: {} revealed {:?} -> {:?}",
            self.code,
            id,
            coords,
            outcome
        );
        if outcome.is_terminal() {
            self.finished = true;
        }

        Ok(match outcome {
            RevealOutcome::AlreadyRevealed => MoveOutcome::Continue {
                turn: self.turn,
                changed: false,
            },
            RevealOutcome::Safe => {
                if self.mode == Mode::Multi {
                    self.turn = self.turn.other();
                }
                MoveOutcome::Continue {
                    turn: self.turn,
                    changed: true,
                }
            }
            RevealOutcome::Mine => match self.mode {
                Mode::Single => MoveOutcome::Mine {
                    loser: Seat::FIRST,
                    winner: None,
                },
                Mode::Multi => MoveOutcome::Mine {
                    loser: self.turn,
                    winner: Some(self.turn.other()),
                },
            },
            RevealOutcome::Cleared => MoveOutcome::Draw,
        })
    }

    /// Single mode accepts a move from anyone; multi mode only from the seated turn holder.
    fn authorize_move(&self, id: ParticipantId) -> Result<()> {
        if self.mode == Mode::Single {
            return if self.finished {
                Err(GameError::AlreadyEnded)
            } else {
                Ok(())
            };
        }

        let seat = self.seat_of(id).ok_or(GameError::Unauthorized)?;
        if self.finished {
            return Err(GameError::AlreadyEnded);
        }
        if !self.is_full() {
            return Err(GameError::WaitingForPlayers);
        }
        if seat != self.turn {
            return Err(GameError::Unauthorized);
        }
        Ok(())
    }

    /// New board with the same dimensions and mine count. Seat 0 only.
    pub fn reset(&mut self, requester: ParticipantId) -> Result<()> {
        self.authorize_host(requester)?;
        self.regenerate();
        log::info!("Room {}: reset by {}", self.code, requester);
        Ok(())
    }

    /// New board with new dimensions and mine count. Seat 0 only.
    pub fn reconfigure(&mut self, requester: ParticipantId, config: GameConfig) -> Result<()> {
        self.authorize_host(requester)?;
        self.config = config;
        self.regenerate();
        log::info!(
            "Room {}: reconfigured by {} to {}x{} with {} mines",
            self.code,
            requester,
            config.width(),
            config.height(),
            config.mines()
        );
        Ok(())
    }

    fn authorize_host(&self, requester: ParticipantId) -> Result<()> {
        match self.participants.first() {
            Some(host) if host.id == requester => Ok(()),
            _ => Err(GameError::Unauthorized),
        }
    }

    fn regenerate(&mut self) {
        let layout = RandomMinefieldGenerator::new(&mut self.rng).generate(self.config);
        self.board = Board::new(layout);
        self.turn = Seat::FIRST;
        self.finished = false;
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            code: self.code.clone(),
            mode: self.mode,
            phase: self.phase(),
            turn: self.turn,
            board: self.board.snapshot(),
        }
    }
}
