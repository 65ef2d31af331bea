//! TCP transport.
//!
//! Each connection gets a reader task that decodes lines into intents and a writer task that
//! drains its outbound queue. A single hub task applies intents in arrival order, so a move's
//! flood fill always finishes before the next intent is looked at.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use duosweep_core::{ParticipantId, Registry};
use duosweep_protocol::{ClientMessage, ErrorKind, ServerMessage, decode_line, encode_line};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

use crate::{Envelope, Hub, ServerConfig};

/// Lines buffered for one client before it counts as not reading.
const OUTBOUND_QUEUE: usize = 256;

/// The hub's handle on one client: its outbound queue and the task draining it.
#[derive(Debug)]
struct Connection {
    outbound: mpsc::Sender<String>,
    writer: AbortHandle,
}

/// Event delivered to the hub task.
#[derive(Debug)]
enum Inbound {
    Connected {
        id: ParticipantId,
        connection: Connection,
    },
    Message {
        from: ParticipantId,
        message: ClientMessage,
    },
    Malformed {
        from: ParticipantId,
        reason: String,
    },
    Disconnected {
        id: ParticipantId,
    },
}

/// Binds `config.bind` and serves until the listener fails.
///
/// `ready` receives the bound address, which is how callers learn the port when binding port 0.
pub async fn run_server(
    config: ServerConfig,
    ready: Option<oneshot::Sender<SocketAddr>>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(config.bind).await?;
    let bound = listener.local_addr()?;
    log::info!("Listening on {}", bound);
    if let Some(tx) = ready {
        let _ = tx.send(bound);
    }

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let sweep_interval = config.sweep_interval;
    let hub = Hub::new(Registry::new(), config);
    tokio::spawn(run_hub(hub, inbound_rx, sweep_interval));

    let mut last_id = 0u64;
    loop {
        let (socket, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                log::warn!("Failed to accept connection: {}", err);
                continue;
            }
        };
        last_id += 1;
        let id = ParticipantId(last_id);
        log::info!("Participant {} connected from {}", id, addr);

        let inbound_tx = inbound_tx.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(socket, id, &inbound_tx).await {
                log::warn!("Participant {} connection error: {}", id, err);
            }
            let _ = inbound_tx.send(Inbound::Disconnected { id });
        });
    }
}

async fn run_hub(
    mut hub: Hub,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    sweep_interval: std::time::Duration,
) {
    let mut connections: HashMap<ParticipantId, Connection> = HashMap::new();
    let mut sweep = tokio::time::interval(sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = inbound.recv() => {
                let Some(event) = event else {
                    break;
                };
                match event {
                    Inbound::Connected { id, connection } => {
                        connections.insert(id, connection);
                    }
                    Inbound::Message { from, message } => {
                        deliver(&mut connections, hub.handle(from, message));
                    }
                    Inbound::Malformed { from, reason } => {
                        let message = ServerMessage::error(ErrorKind::BadRequest, reason);
                        deliver(&mut connections, vec![Envelope { to: from, message }]);
                    }
                    Inbound::Disconnected { id } => {
                        connections.remove(&id);
                        hub.disconnect(id);
                    }
                }
            }
            _ = sweep.tick() => {
                hub.sweep(Instant::now());
            }
        }
    }
    log::debug!("Hub stopped");
}

/// Queues each envelope for its recipient. A client whose queue is full is cut off.
fn deliver(connections: &mut HashMap<ParticipantId, Connection>, envelopes: Vec<Envelope>) {
    for Envelope { to, message } in envelopes {
        let Some(connection) = connections.get(&to) else {
            log::debug!("Dropping message for disconnected participant {}", to);
            continue;
        };
        let line = match encode_line(&message) {
            Ok(line) => line,
            Err(err) => {
                log::warn!("Failed to encode message for {}: {}", to, err);
                continue;
            }
        };
        match connection.outbound.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::warn!("Participant {} is not reading, dropping the connection", to);
                if let Some(connection) = connections.remove(&to) {
                    connection.writer.abort();
                }
            }
            Err(TrySendError::Closed(_)) => {
                connections.remove(&to);
            }
        }
    }
}

async fn handle_connection(
    socket: TcpStream,
    id: ParticipantId,
    inbound: &mpsc::UnboundedSender<Inbound>,
) -> anyhow::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);

    // Ends once the hub forgets this connection and drops the sender, or aborts it.
    let mut write_task = tokio::spawn(async move {
        while let Some(line) = outbound_rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err()
                || writer.write_all(b"\n").await.is_err()
            {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });
    inbound.send(Inbound::Connected {
        id,
        connection: Connection {
            outbound: outbound_tx,
            writer: write_task.abort_handle(),
        },
    })?;

    let mut lines = BufReader::new(reader).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = &mut write_task => {
                log::debug!("Participant {} writer stopped", id);
                break;
            }
        };
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }
        let event = match decode_line(&line) {
            Ok(message) => Inbound::Message { from: id, message },
            Err(err) => Inbound::Malformed {
                from: id,
                reason: err.to_string(),
            },
        };
        inbound.send(event)?;
    }

    Ok(())
}
