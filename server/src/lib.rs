//! Room hub and TCP transport for two-player co-op minesweeper.

mod config;
mod hub;
mod server;

pub use config::ServerConfig;
pub use hub::{Envelope, Hub, HubError};
pub use server::run_server;
