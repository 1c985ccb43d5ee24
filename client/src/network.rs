//! Session with a snake server: handshake, receive loop and move commands.
//!
//! A session owns three background tasks:
//! - the receive loop, which decodes every server line and applies it to the
//!   shared [`World`],
//! - the writer, which drains queued move commands onto the socket,
//! - the history recorder, which hands lifecycle events to a
//!   [`HistorySink`] on a blocking worker.
//!
//! Only connecting and the handshake can fail. After that, receive errors
//! end the receive loop quietly and send errors are logged and dropped.

use crate::history::{HistorySink, LifecycleEvent, Recorder};
use crate::world::{World, WorldError};
use chrono::Local;
use log::{debug, info, warn};
use snake_shared::{decode_line, Direction, MoveCommand, ProtocolError};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{
    split, AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub player_name: String,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, port: u16, player_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            player_name: player_name.into(),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server closed the connection during the handshake")]
    ClosedDuringHandshake,
    #[error("invalid {field} in handshake: {line:?}")]
    Handshake { field: &'static str, line: String },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    World(#[from] WorldError),
}

pub struct Session {
    world: Arc<World>,
    player_id: i32,
    world_size: i32,
    commands: mpsc::UnboundedSender<Direction>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
    receiver: JoinHandle<()>,
    sender: JoinHandle<()>,
    recorder: JoinHandle<()>,
}

impl Session {
    /// Connects over TCP and runs the handshake.
    pub async fn connect(
        config: &SessionConfig,
        world: Arc<World>,
        sink: Box<dyn HistorySink>,
    ) -> Result<Self, SessionError> {
        let addr = config.address();
        info!("Connecting to {} as {}", addr, config.player_name);

        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|source| SessionError::Connect { addr, source })?;
        stream.set_nodelay(true)?;

        Self::start(stream, &config.player_name, world, sink).await
    }

    /// Runs the handshake over an established stream and starts the
    /// background tasks. `world` must not have been initialized yet.
    pub async fn start<S>(
        stream: S,
        player_name: &str,
        world: Arc<World>,
        sink: Box<dyn HistorySink>,
    ) -> Result<Self, SessionError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, mut writer) = split(stream);
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        writer
            .write_all(format!("{}\n", player_name).as_bytes())
            .await?;
        writer.flush().await?;

        let player_id = read_handshake_value(&mut reader, &mut buf, "player id").await?;
        let world_size = read_handshake_value(&mut reader, &mut buf, "world size").await?;
        world.initialize(player_id, world_size)?;
        info!(
            "Joined as player {} in a {}x{} world",
            player_id, world_size, world_size
        );

        let (events, event_rx) = mpsc::unbounded_channel();
        let recorder = tokio::task::spawn_blocking(move || Recorder::new(sink).run(event_rx));
        let _ = events.send(LifecycleEvent::GameStarted { at: Local::now() });

        let (commands, command_rx) = mpsc::unbounded_channel();
        let sender = tokio::spawn(send_loop(writer, command_rx));
        let receiver = tokio::spawn(receive_loop(reader, Arc::clone(&world), events.clone()));

        Ok(Session {
            world,
            player_id,
            world_size,
            commands,
            events,
            receiver,
            sender,
            recorder,
        })
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn player_id(&self) -> i32 {
        self.player_id
    }

    pub fn world_size(&self) -> i32 {
        self.world_size
    }

    /// False once the server has closed the stream or a read failed.
    pub fn is_receiving(&self) -> bool {
        !self.receiver.is_finished()
    }

    /// Queues a move command. Never blocks and never fails; a command that
    /// cannot be delivered is dropped.
    pub fn send_move(&self, direction: Direction) {
        if self.commands.send(direction).is_err() {
            debug!("Writer has stopped, dropping move {:?}", direction);
        }
    }

    pub fn move_up(&self) {
        self.send_move(Direction::Up);
    }

    pub fn move_down(&self) {
        self.send_move(Direction::Down);
    }

    pub fn move_left(&self) {
        self.send_move(Direction::Left);
    }

    pub fn move_right(&self) {
        self.send_move(Direction::Right);
    }

    /// Ends the session. The game end and a leave for every snake still held
    /// are recorded before the connection is torn down; returns once the
    /// recorder has flushed.
    pub async fn disconnect(self) {
        let Session {
            world,
            commands,
            events,
            receiver,
            sender,
            recorder,
            ..
        } = self;

        // Stop applying frames first so nothing is recorded after the game end.
        // The socket stays open until the writer shuts it down below.
        receiver.abort();
        let _ = receiver.await;

        let at = Local::now();
        let _ = events.send(LifecycleEvent::GameEnded { at });
        for event in world.mark_all_disconnected(at) {
            let _ = events.send(event);
        }

        drop(commands);
        if let Err(e) = sender.await {
            warn!("Writer task failed: {}", e);
        }

        drop(events);
        if let Err(e) = recorder.await {
            warn!("History recorder failed: {}", e);
        }

        info!("Disconnected");
    }
}

async fn read_handshake_value<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    field: &'static str,
) -> Result<i32, SessionError>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader, buf)
        .await?
        .ok_or(SessionError::ClosedDuringHandshake)?;

    line.trim()
        .parse()
        .map_err(|_| SessionError::Handshake { field, line })
}

async fn receive_loop<R>(
    mut reader: R,
    world: Arc<World>,
    events: mpsc::UnboundedSender<LifecycleEvent>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    loop {
        match read_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => match decode_line(&line) {
                Ok(message) => {
                    for event in world.apply(message) {
                        let _ = events.send(event);
                    }
                }
                Err(ProtocolError::Empty) => {}
                Err(e) => debug!("Dropping server line: {}", e),
            },
            Ok(None) => {
                info!("Server closed the connection");
                break;
            }
            Err(e) => {
                warn!("Error receiving from server: {}", e);
                break;
            }
        }
    }
}

/// Reads one line without its terminator. Bytes that are not valid UTF-8
/// are replaced instead of failing the read.
async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }

    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
}

async fn send_loop<W>(mut writer: W, mut commands: mpsc::UnboundedReceiver<Direction>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(direction) = commands.recv().await {
        if let Err(e) = send_move(&mut writer, direction).await {
            debug!("Dropping move {:?}: {}", direction, e);
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Error closing connection: {}", e);
    }
}

async fn send_move<W>(writer: &mut W, direction: Direction) -> Result<(), SessionError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = MoveCommand::new(direction).to_line()?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
