use std::net::SocketAddr;
use std::time::Duration;

use duosweep_server::{ServerConfig, run_server};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::time::timeout;

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let (reader, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send_raw(&mut self, line: &str) {
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
    }

    async fn send(&mut self, message: Value) {
        self.send_raw(&message.to_string()).await;
    }

    async fn recv(&mut self) -> Value {
        let line = timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for the server")
            .unwrap()
            .expect("server closed the connection");
        serde_json::from_str(&line).unwrap()
    }

    async fn expect_error(&mut self, kind: &str) {
        let reply = self.recv().await;
        assert_eq!(reply["type"], "error", "{reply}");
        assert_eq!(reply["kind"], kind, "{reply}");
    }
}

async fn start() -> SocketAddr {
    let config = ServerConfig {
        bind: "127.0.0.1:0".parse().unwrap(),
        ..ServerConfig::default()
    };
    let (tx, rx) = oneshot::channel();
    tokio::spawn(run_server(config, Some(tx)));
    rx.await.unwrap()
}

#[tokio::test]
async fn two_players_share_a_room() {
    let addr = start().await;
    let mut alice = Client::connect(addr).await;
    let mut bob = Client::connect(addr).await;
    let mut carol = Client::connect(addr).await;

    alice
        .send(json!({ "type": "create", "mode": "multi", "width": 4, "height": 4, "mines": 0 }))
        .await;
    let created = alice.recv().await;
    assert_eq!(created["type"], "created");
    let code = created["code"].as_str().unwrap().to_owned();
    assert_eq!(code.len(), 4);

    alice.send(json!({ "type": "join", "code": code })).await;
    let state = alice.recv().await;
    assert_eq!(state["type"], "game_state");
    assert_eq!(state["seat"], 0);
    assert_eq!(state["session"]["phase"], "waiting_for_players");

    // Codes are case-insensitive on the wire.
    bob.send(json!({ "type": "join", "code": code.to_lowercase() }))
        .await;
    let state = bob.recv().await;
    assert_eq!(state["type"], "game_state");
    assert_eq!(state["seat"], 1);
    for client in [&mut alice, &mut bob] {
        let start = client.recv().await;
        assert_eq!(start["type"], "game_start");
        assert_eq!(start["session"]["phase"], "in_progress");
        assert_eq!(start["session"]["turn"], 0);
    }

    bob.send(json!({ "type": "move", "code": code, "x": 0, "y": 0 }))
        .await;
    bob.expect_error("unauthorized").await;

    alice
        .send(json!({ "type": "chat", "code": code, "message": "on it" }))
        .await;
    for client in [&mut alice, &mut bob] {
        assert_eq!(
            client.recv().await,
            json!({ "type": "chat", "seat": 0, "message": "on it" })
        );
    }

    alice
        .send(json!({ "type": "move", "code": code, "x": 0, "y": 0 }))
        .await;
    for client in [&mut alice, &mut bob] {
        let over = client.recv().await;
        assert_eq!(over["type"], "game_over");
        assert_eq!(over["result"], json!({ "outcome": "draw" }));
        assert_eq!(over["board"]["rows"][3][3], json!({ "revealed": 0 }));
    }

    bob.send(json!({ "type": "move", "code": code, "x": 1, "y": 1 }))
        .await;
    bob.expect_error("game_over").await;

    bob.send(json!({ "type": "reset", "code": code })).await;
    bob.expect_error("unauthorized").await;

    alice.send(json!({ "type": "reset", "code": code })).await;
    for client in [&mut alice, &mut bob] {
        let reset = client.recv().await;
        assert_eq!(reset["type"], "game_reset");
        assert_eq!(reset["session"]["phase"], "in_progress");
        assert_eq!(reset["session"]["board"]["rows"][0][0], "hidden");
    }

    carol.send(json!({ "type": "join", "code": code })).await;
    carol.expect_error("room_full").await;

    let missing = if code == "ZZZZ" { "YYYY" } else { "ZZZZ" };
    carol.send(json!({ "type": "join", "code": missing })).await;
    carol.expect_error("room_not_found").await;

    carol.send_raw("").await;
    carol.send_raw("{\"type\":\"teleport\"}").await;
    carol.expect_error("bad_request").await;
}

#[tokio::test]
async fn dropped_connection_does_not_close_the_room() {
    let addr = start().await;
    let mut alice = Client::connect(addr).await;

    alice.send(json!({ "type": "create", "mode": "single" })).await;
    let code = alice.recv().await["code"].as_str().unwrap().to_owned();
    alice.send(json!({ "type": "join", "code": code })).await;
    let state = alice.recv().await;
    assert_eq!(state["session"]["mode"], "single");
    assert_eq!(state["session"]["phase"], "in_progress");
    drop(alice);

    let mut other = Client::connect(addr).await;
    other.send(json!({ "type": "join", "code": code })).await;
    other.expect_error("room_full").await;
}
