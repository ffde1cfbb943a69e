//! Per-client connection task.

use skirmish_core::components::PlayerId;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::{Result, ServerError};
use crate::host::{Envelope, HostHandle, JoinReply};
use crate::protocol::{ClientMessage, ServerMessage};

/// Longest line a client may send, newline excluded.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Serve one client from accept to disconnect.
///
/// The client is seated (or told the room is full), then its lines are
/// forwarded to the host while outbound messages addressed to it are
/// written back.
///
/// # Errors
///
/// Returns an error if the socket fails or the host stops.
pub async fn handle_connection(stream: TcpStream, handle: HostHandle) -> Result<()> {
    let peer = stream.peer_addr().ok();
    let (reader, mut writer) = stream.into_split();
    let outbox = handle.subscribe();

    let player = match handle.join().await? {
        JoinReply::Accepted { player, tick } => {
            write_message(
                &mut writer,
                &ServerMessage::Welcome {
                    player_id: player,
                    tick,
                },
            )
            .await?;
            player
        }
        JoinReply::RoomFull => {
            tracing::info!(?peer, "Room full, closing connection");
            write_message(&mut writer, &ServerMessage::RoomFull).await?;
            writer.shutdown().await?;
            return Ok(());
        }
    };

    tracing::info!(player, ?peer, "Client connected");
    let result = session(player, reader, writer, outbox, &handle).await;
    if handle.leave(player).await.is_err() {
        tracing::debug!(player, "Host already stopped");
    }
    tracing::info!(player, "Client disconnected");
    result
}

async fn session(
    player: PlayerId,
    reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
    mut outbox: broadcast::Receiver<Envelope>,
    handle: &HostHandle,
) -> Result<()> {
    let mut lines = LineReader::new(reader);

    loop {
        tokio::select! {
            incoming = lines.next() => {
                let line = match incoming? {
                    None => return Ok(()),
                    Some(Incoming::TooLong) => {
                        tracing::warn!(player, limit = MAX_LINE_BYTES, "Oversized line discarded");
                        write_message(
                            &mut writer,
                            &ServerMessage::error(format!("Line too long (limit {MAX_LINE_BYTES} bytes)")),
                        )
                        .await?;
                        continue;
                    }
                    Some(Incoming::Line(bytes)) => bytes,
                };
                let Ok(line) = std::str::from_utf8(&line) else {
                    write_message(&mut writer, &ServerMessage::error("Parse error: line is not UTF-8"))
                        .await?;
                    continue;
                };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match ClientMessage::from_json(line) {
                    Ok(message) => {
                        tracing::debug!(player, cmd = message.name(), "Command received");
                        handle.send(player, message).await?;
                    }
                    Err(e) => {
                        tracing::debug!(player, error = %e, "Unparseable line");
                        write_message(&mut writer, &ServerMessage::error(format!("Parse error: {e}")))
                            .await?;
                    }
                }
            }
            envelope = outbox.recv() => match envelope {
                Ok(envelope) => {
                    if envelope.is_for(player) {
                        write_message(&mut writer, &envelope.message).await?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(player, skipped, "Client fell behind, messages dropped");
                }
                Err(RecvError::Closed) => return Err(ServerError::HostClosed),
            },
        }
    }
}

enum Incoming {
    Line(Vec<u8>),
    TooLong,
}

/// Newline-delimited reader that never buffers more than
/// [`MAX_LINE_BYTES`] of one line. Partial input lives in the reader, so
/// `next` may be dropped in a `select!` without losing data.
struct LineReader {
    inner: BufReader<OwnedReadHalf>,
    pending: Vec<u8>,
    overflowed: bool,
}

impl LineReader {
    fn new(reader: OwnedReadHalf) -> Self {
        Self {
            inner: BufReader::new(reader),
            pending: Vec::new(),
            overflowed: false,
        }
    }

    /// Next line without its newline, or `None` at end of stream.
    async fn next(&mut self) -> std::io::Result<Option<Incoming>> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                if self.overflowed || self.pending.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(Incoming::Line(std::mem::take(&mut self.pending))));
            }

            let newline = available.iter().position(|&byte| byte == b'\n');
            let chunk = &available[..newline.unwrap_or(available.len())];
            if !self.overflowed {
                if self.pending.len() + chunk.len() > MAX_LINE_BYTES {
                    self.overflowed = true;
                    self.pending = Vec::new();
                } else {
                    self.pending.extend_from_slice(chunk);
                }
            }
            let used = newline.map_or(available.len(), |end| end + 1);
            self.inner.consume(used);

            if newline.is_some() {
                if std::mem::take(&mut self.overflowed) {
                    return Ok(Some(Incoming::TooLong));
                }
                return Ok(Some(Incoming::Line(std::mem::take(&mut self.pending))));
            }
        }
    }
}

async fn write_message(writer: &mut OwnedWriteHalf, message: &ServerMessage) -> Result<()> {
    writer.write_all(message.to_json_line().as_bytes()).await?;
    Ok(())
}
