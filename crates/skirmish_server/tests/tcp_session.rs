//! Clients talking to a live host over loopback TCP.

use std::net::SocketAddr;
use std::time::Duration;

use skirmish_core::error::CommandError;
use skirmish_core::events::MatchEvent;
use skirmish_core::turn::TurnPhase;
use skirmish_server::connection::MAX_LINE_BYTES;
use skirmish_server::protocol::ServerMessage;
use skirmish_server::{serve, ServerConfig};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Self {
            lines: BufReader::new(reader).lines(),
            writer,
        }
    }

    async fn send(&mut self, json: &str) {
        self.writer
            .write_all(format!("{json}\n").as_bytes())
            .await
            .unwrap();
    }

    async fn next_line(&mut self) -> Option<String> {
        timeout(WAIT, self.lines.next_line())
            .await
            .expect("timed out waiting for the host")
            .unwrap()
    }

    async fn next(&mut self) -> ServerMessage {
        let line = self.next_line().await.expect("connection closed");
        ServerMessage::from_json(&line).unwrap()
    }

    async fn next_matching(&mut self, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
        loop {
            let message = self.next().await;
            if pred(&message) {
                return message;
            }
        }
    }
}

async fn start_host() -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();
    let config = ServerConfig::default();
    tokio::spawn(async move {
        serve(listener, &config, async move {
            stopped.await.ok();
        })
        .await
        .unwrap();
    });
    (addr, stop)
}

async fn seated_pair(addr: SocketAddr) -> (Client, Client) {
    let mut first = Client::connect(addr).await;
    assert!(matches!(
        first.next().await,
        ServerMessage::Welcome { player_id: 1, .. }
    ));
    let mut second = Client::connect(addr).await;
    assert!(matches!(
        second.next().await,
        ServerMessage::Welcome { player_id: 2, .. }
    ));
    (first, second)
}

#[tokio::test]
async fn players_take_turns_over_tcp() {
    let (addr, _stop) = start_host().await;
    let (mut first, mut second) = seated_pair(addr).await;

    // Player two moves out of turn; only they hear about it.
    second.send(r#"{"cmd":"move","unit":6,"x":30.0,"y":0.0}"#).await;
    let rejected = second
        .next_matching(|m| matches!(m, ServerMessage::Rejected { .. }))
        .await;
    assert_eq!(
        rejected,
        ServerMessage::Rejected {
            cmd: "move".to_string(),
            reason: CommandError::NotYourTurn { current: Some(1) },
        }
    );

    first.send(r#"{"cmd":"end_turn"}"#).await;
    first
        .next_matching(|m| {
            matches!(
                m,
                ServerMessage::Event {
                    event: MatchEvent::TurnStarted { player: 2, .. }
                }
            )
        })
        .await;

    second.send(r#"{"cmd":"query"}"#).await;
    let state = second
        .next_matching(|m| matches!(m, ServerMessage::State { .. }))
        .await;
    let ServerMessage::State { snapshot } = state else {
        unreachable!()
    };
    assert_eq!(snapshot.turn.phase, TurnPhase::TurnActive { player: 2 });
    assert_eq!(snapshot.players, vec![1, 2]);
    assert_eq!(snapshot.units.len(), 10);
}

#[tokio::test]
async fn third_client_is_turned_away() {
    let (addr, _stop) = start_host().await;
    let (_first, _second) = seated_pair(addr).await;

    let mut late = Client::connect(addr).await;
    assert_eq!(late.next().await, ServerMessage::RoomFull);
    assert_eq!(late.next_line().await, None);
}

#[tokio::test]
async fn malformed_line_gets_an_error() {
    let (addr, _stop) = start_host().await;
    let (mut first, _second) = seated_pair(addr).await;

    first.send("this is not json").await;
    let error = first
        .next_matching(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    assert!(matches!(error, ServerMessage::Error { message } if message.starts_with("Parse error")));
}

#[tokio::test]
async fn oversized_line_is_discarded_and_session_continues() {
    let (addr, _stop) = start_host().await;
    let (mut first, _second) = seated_pair(addr).await;

    let flood = "x".repeat(MAX_LINE_BYTES * 3);
    first.send(&flood).await;
    let error = first
        .next_matching(|m| matches!(m, ServerMessage::Error { .. }))
        .await;
    assert!(matches!(error, ServerMessage::Error { message } if message.starts_with("Line too long")));

    first.send(r#"{"cmd":"query"}"#).await;
    let state = first
        .next_matching(|m| matches!(m, ServerMessage::State { .. }))
        .await;
    assert!(matches!(state, ServerMessage::State { .. }));
}

#[tokio::test]
async fn line_at_the_limit_is_still_parsed() {
    let (addr, _stop) = start_host().await;
    let (mut first, _second) = seated_pair(addr).await;

    let query = r#"{"cmd":"query"}"#;
    let padded = format!("{query}{}", " ".repeat(MAX_LINE_BYTES - query.len()));
    first.send(&padded).await;
    let state = first
        .next_matching(|m| matches!(m, ServerMessage::State { .. } | ServerMessage::Error { .. }))
        .await;
    assert!(matches!(state, ServerMessage::State { .. }));
}

#[tokio::test]
async fn reconnecting_client_takes_the_empty_seat() {
    let (addr, _stop) = start_host().await;
    let (first, mut second) = seated_pair(addr).await;

    drop(first);
    second
        .next_matching(|m| {
            matches!(
                m,
                ServerMessage::Event {
                    event: MatchEvent::PlayerLeft { player: 1 }
                }
            )
        })
        .await;

    let mut returning = Client::connect(addr).await;
    assert!(matches!(
        returning.next().await,
        ServerMessage::Welcome { player_id: 1, .. }
    ));
}
