use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use duosweep_core::{CellCount, Coord, GameConfig};
use duosweep_server::{ServerConfig, run_server};
use tracing_subscriber::filter::LevelFilter;

/// Two-player minesweeper room server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// What log level to use
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,

    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    bind: SocketAddr,

    /// Default board width for new rooms
    #[arg(long, default_value_t = 10)]
    width: Coord,

    /// Default board height for new rooms
    #[arg(long, default_value_t = 10)]
    height: Coord,

    /// Default mine count for new rooms
    #[arg(long, default_value_t = 10)]
    mines: CellCount,

    /// Drop rooms without activity for this many seconds
    #[arg(long, default_value_t = 30 * 60)]
    idle_timeout_secs: u64,

    /// How often to look for idle rooms
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    sweep_interval_secs: u64,

    /// Longest chat message accepted, in characters
    #[arg(long, default_value_t = 500)]
    max_chat_len: usize,
}

impl Args {
    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        let defaults = GameConfig::new(self.width, self.height, self.mines)
            .context("Invalid default board")?;
        Ok(ServerConfig {
            bind: self.bind,
            defaults,
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
            max_chat_len: self.max_chat_len,
        })
    }
}

fn level_filter(level: log::LevelFilter) -> LevelFilter {
    match level {
        log::LevelFilter::Off => LevelFilter::OFF,
        log::LevelFilter::Error => LevelFilter::ERROR,
        log::LevelFilter::Warn => LevelFilter::WARN,
        log::LevelFilter::Info => LevelFilter::INFO,
        log::LevelFilter::Debug => LevelFilter::DEBUG,
        log::LevelFilter::Trace => LevelFilter::TRACE,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(level_filter(args.verbose.log_level_filter()))
        .init();

    let config = args.server_config()?;
    log::debug!("{:?}", config);
    run_server(config, None).await
}
