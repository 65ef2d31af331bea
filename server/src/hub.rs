//! Intent dispatch.
//!
//! The hub owns the [`Registry`] and applies one client intent at a time, turning the result
//! into messages addressed to individual participants. It never touches sockets, which keeps
//! every game rule testable without a network.

use std::time::Instant;

use duosweep_core::{
    CellCount, Coord, GameConfig, GameError, Mode, MoveOutcome, ParticipantId, Registry, RoomCode,
    Session,
};
use duosweep_protocol::{ClientMessage, ErrorKind, GameResult, ServerMessage};
use thiserror::Error;

use crate::ServerConfig;

/// One message for one participant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub to: ParticipantId,
    pub message: ServerMessage,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("Chat message is empty")]
    EmptyChat,
    #[error("Chat message is {len} characters, the limit is {max}")]
    ChatTooLong { len: usize, max: usize },
}

impl From<HubError> for ServerMessage {
    fn from(err: HubError) -> Self {
        match err {
            HubError::Game(err) => err.into(),
            other => ServerMessage::error(ErrorKind::BadRequest, other.to_string()),
        }
    }
}

pub struct Hub {
    registry: Registry,
    config: ServerConfig,
}

impl Hub {
    pub fn new(registry: Registry, config: ServerConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Applies `message` on behalf of `from`. Rejections come back as a single error for `from`.
    pub fn handle(&mut self, from: ParticipantId, message: ClientMessage) -> Vec<Envelope> {
        match self.dispatch(from, message) {
            Ok(envelopes) => envelopes,
            Err(err) => {
                log::debug!("Rejected intent from {}: {}", from, err);
                vec![Envelope {
                    to: from,
                    message: err.into(),
                }]
            }
        }
    }

    fn dispatch(
        &mut self,
        from: ParticipantId,
        message: ClientMessage,
    ) -> Result<Vec<Envelope>, HubError> {
        match message {
            ClientMessage::Create {
                mode,
                width,
                height,
                mines,
            } => self.create(from, mode, width, height, mines),
            ClientMessage::Join { code } => self.join(from, &code),
            ClientMessage::Move { code, x, y } => self.apply_move(from, &code, (x, y)),
            ClientMessage::Reset { code } => {
                let session = self.registry.get_mut(&code)?;
                session.reset(from)?;
                let snapshot = session.snapshot();
                Ok(broadcast(
                    session,
                    ServerMessage::GameReset { session: snapshot },
                ))
            }
            ClientMessage::Reconfigure {
                code,
                width,
                height,
                mines,
            } => {
                let config = GameConfig::new(width, height, mines)?;
                let session = self.registry.get_mut(&code)?;
                session.reconfigure(from, config)?;
                let snapshot = session.snapshot();
                Ok(broadcast(
                    session,
                    ServerMessage::Reconfigured { session: snapshot },
                ))
            }
            ClientMessage::Chat { code, message } => self.chat(from, &code, message),
        }
    }

    fn create(
        &mut self,
        from: ParticipantId,
        mode: Mode,
        width: Option<Coord>,
        height: Option<Coord>,
        mines: Option<CellCount>,
    ) -> Result<Vec<Envelope>, HubError> {
        let defaults = self.config.defaults;
        let config = GameConfig::new(
            width.unwrap_or(defaults.width()),
            height.unwrap_or(defaults.height()),
            mines.unwrap_or(defaults.mines()),
        )?;
        let code = self.registry.create(mode, config)?;
        Ok(vec![Envelope {
            to: from,
            message: ServerMessage::Created { code },
        }])
    }

    fn join(&mut self, from: ParticipantId, code: &RoomCode) -> Result<Vec<Envelope>, HubError> {
        let session = self.registry.get_mut(code)?;
        let seated_before = session.participants().len();
        let seat = session.join(from)?;

        let mut envelopes = vec![Envelope {
            to: from,
            message: ServerMessage::GameState {
                seat,
                session: session.snapshot(),
            },
        }];

        let completed_roster = session.participants().len() > seated_before && session.is_full();
        if session.mode() == Mode::Multi && completed_roster {
            let snapshot = session.snapshot();
            envelopes.extend(broadcast(
                session,
                ServerMessage::GameStart { session: snapshot },
            ));
        }
        Ok(envelopes)
    }

    fn apply_move(
        &mut self,
        from: ParticipantId,
        code: &RoomCode,
        coords: (Coord, Coord),
    ) -> Result<Vec<Envelope>, HubError> {
        let session = self.registry.get_mut(code)?;
        let outcome = session.apply_move(from, coords)?;

        let message = match outcome {
            MoveOutcome::Continue { turn, .. } => ServerMessage::BoardUpdate {
                board: session.board().snapshot(),
                turn,
            },
            MoveOutcome::Mine { loser, winner } => {
                log::info!("Room {}: {} hit a mine", code, loser);
                ServerMessage::GameOver {
                    result: GameResult::Mine { loser, winner },
                    board: session.board().snapshot(),
                }
            }
            MoveOutcome::Draw => {
                log::info!("Room {}: board cleared", code);
                ServerMessage::GameOver {
                    result: GameResult::Draw,
                    board: session.board().snapshot(),
                }
            }
        };
        let mut envelopes = broadcast(session, message.clone());
        // Single-mode rooms take moves from anyone; the mover sees the result even without a seat.
        if session.seat_of(from).is_none() {
            envelopes.push(Envelope { to: from, message });
        }
        Ok(envelopes)
    }

    fn chat(
        &mut self,
        from: ParticipantId,
        code: &RoomCode,
        message: String,
    ) -> Result<Vec<Envelope>, HubError> {
        let max = self.config.max_chat_len;
        let session = self.registry.get_mut(code)?;
        let seat = session.seat_of(from).ok_or(GameError::Unauthorized)?;

        if message.trim().is_empty() {
            return Err(HubError::EmptyChat);
        }
        let len = message.chars().count();
        if len > max {
            return Err(HubError::ChatTooLong { len, max });
        }

        Ok(broadcast(session, ServerMessage::Chat { seat, message }))
    }

    /// Drops rooms idle past the configured timeout.
    pub fn sweep(&mut self, now: Instant) -> Vec<RoomCode> {
        self.registry.sweep_idle(now, self.config.idle_timeout)
    }

    /// Seats stay taken when their connection drops; the room lives until the idle sweep.
    pub fn disconnect(&mut self, id: ParticipantId) {
        log::info!("Participant {} disconnected", id);
    }
}

fn broadcast(session: &Session, message: ServerMessage) -> Vec<Envelope> {
    session
        .participants()
        .iter()
        .map(|participant| Envelope {
            to: participant.id,
            message: message.clone(),
        })
        .collect()
}
