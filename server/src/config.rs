use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use duosweep_core::GameConfig;

/// Server configuration
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Board used when a create request leaves dimensions out.
    pub defaults: GameConfig,
    /// Rooms without any intent for this long are dropped.
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    /// In characters.
    pub max_chat_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 3000)),
            defaults: GameConfig::default(),
            idle_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
            max_chat_len: 500,
        }
    }
}
