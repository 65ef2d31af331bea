use core::fmt;
use core::str::FromStr;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::prelude::*;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use crate::*;

const CODE_ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 4;
const CODE_SPACE: usize = 36 * 36 * 36 * 36;

/// Short public code players share to find a session, 4 characters of `A-Z0-9`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomCode(String);

impl RoomCode {
    fn random(rng: &mut SmallRng) -> Self {
        let code = (0..CODE_LEN)
            .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for RoomCode {
    type Err = InvalidRoomCode;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        if code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b)) {
            Ok(Self(code))
        } else {
            Err(InvalidRoomCode(s.to_owned()))
        }
    }
}

impl TryFrom<String> for RoomCode {
    type Error = InvalidRoomCode;

    fn try_from(value: String) -> core::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RoomCode> for String {
    fn from(code: RoomCode) -> Self {
        code.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid room code {0:?}, expected 4 characters of A-Z or 0-9")]
pub struct InvalidRoomCode(String);

/// Internal identity of a session, never shown to players.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

#[derive(Debug)]
struct Entry {
    session: Session,
    last_activity: Instant,
}

/// Owns every live session and the public code mapping onto it.
///
/// Not shared: whoever routes intents owns the registry and applies them one at a time.
#[derive(Debug)]
pub struct Registry {
    sessions: HashMap<SessionId, Entry>,
    codes: HashMap<RoomCode, SessionId>,
    next_id: u64,
    capacity: usize,
    rng: SmallRng,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::from_rng(SmallRng::from_os_rng())
    }

    /// Registry whose codes and boards are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(SmallRng::seed_from_u64(seed))
    }

    fn from_rng(rng: SmallRng) -> Self {
        Self {
            sessions: HashMap::new(),
            codes: HashMap::new(),
            next_id: 0,
            capacity: CODE_SPACE,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn create(&mut self, mode: Mode, config: GameConfig) -> Result<RoomCode> {
        let code = self.unused_code()?;
        let rng = SmallRng::from_rng(&mut self.rng);
        let session = Session::new(code.clone(), mode, config, rng);
        let id = self.insert(session);
        log::info!(
            "Created {:?} room {} ({:?}) with {}x{} and {} mines",
            mode,
            code,
            id,
            config.width(),
            config.height(),
            config.mines()
        );
        Ok(code)
    }

    /// Registers a session built elsewhere, e.g. over a fixed layout.
    /// Its code must have come from [`Registry::reserve_code`] or be otherwise unused.
    pub fn adopt(&mut self, session: Session) -> Result<RoomCode> {
        if self.codes.contains_key(session.code()) {
            return Err(GameError::CodeInUse);
        }
        let code = session.code().clone();
        self.insert(session);
        Ok(code)
    }

    /// A code no live session uses, plus an rng for the session that will carry it.
    pub fn reserve_code(&mut self) -> Result<(RoomCode, SmallRng)> {
        let code = self.unused_code()?;
        Ok((code, SmallRng::from_rng(&mut self.rng)))
    }

    fn unused_code(&mut self) -> Result<RoomCode> {
        if self.codes.len() >= self.capacity {
            return Err(GameError::RegistryFull);
        }
        loop {
            let code = RoomCode::random(&mut self.rng);
            if !self.codes.contains_key(&code) {
                return Ok(code);
            }
            log::debug!("Room code {} already taken, drawing again", code);
        }
    }

    fn insert(&mut self, session: Session) -> SessionId {
        let id = SessionId(self.next_id);
        self.next_id += 1;
        self.codes.insert(session.code().clone(), id);
        self.sessions.insert(
            id,
            Entry {
                session,
                last_activity: Instant::now(),
            },
        );
        id
    }

    pub fn resolve(&self, code: &RoomCode) -> Option<SessionId> {
        self.codes.get(code).copied()
    }

    pub fn get(&self, code: &RoomCode) -> Result<&Session> {
        let id = self.resolve(code).ok_or(GameError::RoomNotFound)?;
        self.sessions
            .get(&id)
            .map(|entry| &entry.session)
            .ok_or(GameError::RoomNotFound)
    }

    /// Mutable access for applying an intent; counts as activity for the idle sweep.
    pub fn get_mut(&mut self, code: &RoomCode) -> Result<&mut Session> {
        let id = self.resolve(code).ok_or(GameError::RoomNotFound)?;
        let entry = self.sessions.get_mut(&id).ok_or(GameError::RoomNotFound)?;
        entry.last_activity = Instant::now();
        Ok(&mut entry.session)
    }

    /// Drops sessions untouched for longer than `max_idle` as of `now`.
    pub fn sweep_idle(&mut self, now: Instant, max_idle: Duration) -> Vec<RoomCode> {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_activity) > max_idle)
            .map(|(&id, _)| id)
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for id in expired {
            if let Some(entry) = self.sessions.remove(&id) {
                let code = entry.session.code().clone();
                self.codes.remove(&code);
                removed.push(code);
            }
        }
        if !removed.is_empty() {
            log::info!("Swept {} idle rooms, {} left", removed.len(), self.len());
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn codes_parse_case_insensitively() {
        let code: RoomCode = "ab1z".parse().unwrap();
        assert_eq!(code.as_str(), "AB1Z");
        assert!("AB1".parse::<RoomCode>().is_err());
        assert!("AB12C".parse::<RoomCode>().is_err());
        assert!("AB-1".parse::<RoomCode>().is_err());
    }

    #[test]
    fn codes_round_trip_through_json() {
        let code: RoomCode = serde_json::from_str("\"Q7ZX\"").unwrap();
        assert_eq!(serde_json::to_string(&code).unwrap(), "\"Q7ZX\"");
        assert!(serde_json::from_str::<RoomCode>("\"nope!\"").is_err());
    }

    #[test]
    fn create_fails_once_every_code_is_taken() {
        let mut registry = Registry {
            capacity: 2,
            ..Registry::with_seed(5)
        };
        let config = GameConfig::new(2, 2, 1).unwrap();

        registry.create(Mode::Single, config).unwrap();
        let (code, rng) = registry.reserve_code().unwrap();
        registry
            .adopt(Session::new(code, Mode::Multi, config, rng))
            .unwrap();

        assert_eq!(registry.create(Mode::Multi, config), Err(GameError::RegistryFull));
        assert_eq!(registry.reserve_code().map(|_| ()), Err(GameError::RegistryFull));
        assert_eq!(registry.len(), 2);

        registry.sweep_idle(Instant::now() + Duration::from_secs(60), Duration::ZERO);
        assert!(registry.create(Mode::Multi, config).is_ok());
    }

    #[test]
    fn created_sessions_get_distinct_codes() {
        let mut registry = Registry::with_seed(3);
        let config = GameConfig::default();

        let codes: Vec<_> = (0..500)
            .map(|_| registry.create(Mode::Multi, config).unwrap())
            .collect();

        let unique: HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), 500);
        assert_eq!(registry.len(), 500);

        let ids: HashSet<_> = codes.iter().map(|code| registry.resolve(code).unwrap()).collect();
        assert_eq!(ids.len(), 500);
        for code in &codes {
            assert_eq!(registry.get(code).unwrap().code(), code);
            assert!(code.as_str().bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn created_session_starts_fresh() {
        let mut registry = Registry::with_seed(5);
        let config = GameConfig::new(12, 7, 15).unwrap();
        let code = registry.create(Mode::Single, config).unwrap();

        let session = registry.get(&code).unwrap();
        assert_eq!(session.mode(), Mode::Single);
        assert_eq!(session.board().size(), (12, 7));
        assert_eq!(session.board().mine_count(), 15);
        assert_eq!(session.board().hidden_count(), 84);
        assert!(session.participants().is_empty());
        assert_eq!(session.turn(), Seat::FIRST);
    }

    #[test]
    fn unknown_code_is_not_found() {
        let mut registry = Registry::with_seed(1);
        let code: RoomCode = "ZZZZ".parse().unwrap();

        assert!(registry.resolve(&code).is_none());
        assert_eq!(registry.get(&code).err(), Some(GameError::RoomNotFound));
        assert_eq!(registry.get_mut(&code).err(), Some(GameError::RoomNotFound));
    }

    #[test]
    fn sessions_are_independent() {
        let mut registry = Registry::with_seed(9);
        let config = GameConfig::new(4, 4, 0).unwrap();
        let first = registry.create(Mode::Single, config).unwrap();
        let second = registry.create(Mode::Single, config).unwrap();

        let session = registry.get_mut(&first).unwrap();
        session.join(ParticipantId(1)).unwrap();
        assert_eq!(session.apply_move(ParticipantId(1), (0, 0)), Ok(MoveOutcome::Draw));

        let other = registry.get(&second).unwrap();
        assert_eq!(other.board().hidden_count(), 16);
        assert!(other.participants().is_empty());
    }

    #[test]
    fn adopted_session_is_reachable() {
        let mut registry = Registry::with_seed(11);
        let (code, rng) = registry.reserve_code().unwrap();
        let layout = MineLayout::from_mine_coords((3, 3), &[(2, 2)]).unwrap();
        let session = Session::with_layout(code.clone(), Mode::Multi, layout, rng).unwrap();

        assert_eq!(registry.adopt(session).unwrap(), code);
        assert!(registry.get(&code).unwrap().board().has_mine_at((2, 2)));
    }

    #[test]
    fn sweep_removes_only_idle_sessions() {
        let mut registry = Registry::with_seed(2);
        let config = GameConfig::default();
        let stale = registry.create(Mode::Multi, config).unwrap();
        let fresh = registry.create(Mode::Multi, config).unwrap();

        let max_idle = Duration::from_secs(60);
        assert!(registry.sweep_idle(Instant::now(), max_idle).is_empty());

        let later = Instant::now() + Duration::from_secs(120);
        let fresh_id = registry.resolve(&fresh).unwrap();
        registry.sessions.get_mut(&fresh_id).unwrap().last_activity = later;

        let removed = registry.sweep_idle(later + Duration::from_secs(1), max_idle);
        assert_eq!(removed, vec![stale.clone()]);
        assert!(registry.resolve(&stale).is_none());
        assert!(registry.resolve(&fresh).is_some());
        assert_eq!(registry.len(), 1);
    }
}
