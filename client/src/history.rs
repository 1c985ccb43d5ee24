//! Game history: lifecycle events and the sinks that persist them.
//!
//! The world store never talks to storage. Its mutations return
//! [`LifecycleEvent`]s, the session pushes them down a channel, and a
//! [`Recorder`] running on a blocking worker hands them to a [`HistorySink`].
//! Sink failures are logged and dropped so that recording history can never
//! stall or break the game session.

use chrono::{DateTime, Local};
use log::{info, warn};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

pub type Timestamp = DateTime<Local>;

/// Identifier handed out by a sink when a game starts.
pub type GameId = u64;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn format_timestamp(at: &Timestamp) -> String {
    at.format(TIME_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    GameStarted {
        at: Timestamp,
    },
    GameEnded {
        at: Timestamp,
    },
    PlayerJoined {
        player_id: i32,
        name: String,
        max_score: i32,
        at: Timestamp,
    },
    PlayerLeft {
        player_id: i32,
        at: Timestamp,
    },
    MaxScoreChanged {
        player_id: i32,
        max_score: i32,
    },
}

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode history record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable destination for game history.
pub trait HistorySink: Send {
    fn start_game(&mut self, at: Timestamp) -> Result<GameId, HistoryError>;

    fn end_game(&mut self, game: GameId, at: Timestamp) -> Result<(), HistoryError>;

    fn player_joined(
        &mut self,
        game: GameId,
        player_id: i32,
        name: &str,
        max_score: i32,
        at: Timestamp,
    ) -> Result<(), HistoryError>;

    fn player_left(&mut self, game: GameId, player_id: i32, at: Timestamp)
        -> Result<(), HistoryError>;

    fn max_score_changed(
        &mut self,
        game: GameId,
        player_id: i32,
        max_score: i32,
    ) -> Result<(), HistoryError>;
}

/// Applies lifecycle events to a sink, tracking the current game id.
pub struct Recorder {
    sink: Box<dyn HistorySink>,
    game: GameId,
}

impl Recorder {
    pub fn new(sink: Box<dyn HistorySink>) -> Self {
        Self { sink, game: 0 }
    }

    pub fn game(&self) -> GameId {
        self.game
    }

    pub fn record(&mut self, event: LifecycleEvent) {
        let result = match &event {
            LifecycleEvent::GameStarted { at } => match self.sink.start_game(*at) {
                Ok(game) => {
                    self.game = game;
                    Ok(())
                }
                Err(e) => {
                    self.game = 0;
                    Err(e)
                }
            },
            LifecycleEvent::GameEnded { at } => self.sink.end_game(self.game, *at),
            LifecycleEvent::PlayerJoined {
                player_id,
                name,
                max_score,
                at,
            } => self
                .sink
                .player_joined(self.game, *player_id, name, *max_score, *at),
            LifecycleEvent::PlayerLeft { player_id, at } => {
                self.sink.player_left(self.game, *player_id, *at)
            }
            LifecycleEvent::MaxScoreChanged {
                player_id,
                max_score,
            } => self
                .sink
                .max_score_changed(self.game, *player_id, *max_score),
        };

        if let Err(e) = result {
            warn!("Failed to record {:?}: {}", event, e);
        }
    }

    /// Drains the channel until every sender is gone. Blocks the thread.
    pub fn run(mut self, mut events: mpsc::UnboundedReceiver<LifecycleEvent>) {
        while let Some(event) = events.blocking_recv() {
            self.record(event);
        }
    }
}

/// Writes history to the log only.
#[derive(Debug, Default)]
pub struct LogSink {
    next_game: GameId,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistorySink for LogSink {
    fn start_game(&mut self, at: Timestamp) -> Result<GameId, HistoryError> {
        self.next_game += 1;
        info!("Game {} started at {}", self.next_game, format_timestamp(&at));
        Ok(self.next_game)
    }

    fn end_game(&mut self, game: GameId, at: Timestamp) -> Result<(), HistoryError> {
        info!("Game {} ended at {}", game, format_timestamp(&at));
        Ok(())
    }

    fn player_joined(
        &mut self,
        game: GameId,
        player_id: i32,
        name: &str,
        max_score: i32,
        at: Timestamp,
    ) -> Result<(), HistoryError> {
        info!(
            "Player {} ({}) joined game {} at {} with max score {}",
            player_id,
            name,
            game,
            format_timestamp(&at),
            max_score
        );
        Ok(())
    }

    fn player_left(
        &mut self,
        game: GameId,
        player_id: i32,
        at: Timestamp,
    ) -> Result<(), HistoryError> {
        info!(
            "Player {} left game {} at {}",
            player_id,
            game,
            format_timestamp(&at)
        );
        Ok(())
    }

    fn max_score_changed(
        &mut self,
        game: GameId,
        player_id: i32,
        max_score: i32,
    ) -> Result<(), HistoryError> {
        info!(
            "Player {} reached max score {} in game {}",
            player_id, max_score, game
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameRow {
    pub id: GameId,
    pub start: Timestamp,
    pub end: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRow {
    pub game: GameId,
    pub player_id: i32,
    pub name: String,
    pub max_score: i32,
    pub enter: Timestamp,
    pub leave: Option<Timestamp>,
}

#[derive(Debug, Default)]
struct Tables {
    games: Vec<GameRow>,
    players: Vec<PlayerRow>,
}

/// In-memory games and players tables. Clones share the same tables, so one
/// handle can be given to the recorder and another kept for reading.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn games(&self) -> Vec<GameRow> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .games
            .clone()
    }

    /// Player rows of one game, in join order.
    pub fn players(&self, game: GameId) -> Vec<PlayerRow> {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .players
            .iter()
            .filter(|row| row.game == game)
            .cloned()
            .collect()
    }

    fn with_player<F>(&self, game: GameId, player_id: i32, update: F)
    where
        F: FnOnce(&mut PlayerRow),
    {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        // The most recent row wins when an id rejoins.
        if let Some(row) = tables
            .players
            .iter_mut()
            .rev()
            .find(|row| row.game == game && row.player_id == player_id)
        {
            update(row);
        }
    }
}

impl HistorySink for MemoryHistory {
    fn start_game(&mut self, at: Timestamp) -> Result<GameId, HistoryError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let id = tables.games.len() as GameId + 1;
        tables.games.push(GameRow {
            id,
            start: at,
            end: None,
        });
        Ok(id)
    }

    fn end_game(&mut self, game: GameId, at: Timestamp) -> Result<(), HistoryError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(row) = tables.games.iter_mut().find(|row| row.id == game) {
            row.end = Some(at);
        }
        Ok(())
    }

    fn player_joined(
        &mut self,
        game: GameId,
        player_id: i32,
        name: &str,
        max_score: i32,
        at: Timestamp,
    ) -> Result<(), HistoryError> {
        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.players.push(PlayerRow {
            game,
            player_id,
            name: name.to_string(),
            max_score,
            enter: at,
            leave: None,
        });
        Ok(())
    }

    fn player_left(
        &mut self,
        game: GameId,
        player_id: i32,
        at: Timestamp,
    ) -> Result<(), HistoryError> {
        self.with_player(game, player_id, |row| row.leave = Some(at));
        Ok(())
    }

    fn max_score_changed(
        &mut self,
        game: GameId,
        player_id: i32,
        max_score: i32,
    ) -> Result<(), HistoryError> {
        self.with_player(game, player_id, |row| row.max_score = max_score);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum HistoryRecord<'a> {
    GameStarted {
        game: GameId,
        at: String,
    },
    GameEnded {
        game: GameId,
        at: String,
    },
    PlayerJoined {
        game: GameId,
        player_id: i32,
        name: &'a str,
        max_score: i32,
        at: String,
    },
    PlayerLeft {
        game: GameId,
        player_id: i32,
        at: String,
    },
    MaxScoreChanged {
        game: GameId,
        player_id: i32,
        max_score: i32,
    },
}

/// Appends one JSON object per history record to a file.
///
/// Game ids are the start time in milliseconds since the epoch, so ids stay
/// unique across runs appending to the same file.
pub struct JsonLinesHistory {
    writer: BufWriter<File>,
}

impl JsonLinesHistory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    fn append(&mut self, record: &HistoryRecord<'_>) -> Result<(), HistoryError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl HistorySink for JsonLinesHistory {
    fn start_game(&mut self, at: Timestamp) -> Result<GameId, HistoryError> {
        let game = at.timestamp_millis().max(0) as GameId;
        self.append(&HistoryRecord::GameStarted {
            game,
            at: format_timestamp(&at),
        })?;
        Ok(game)
    }

    fn end_game(&mut self, game: GameId, at: Timestamp) -> Result<(), HistoryError> {
        self.append(&HistoryRecord::GameEnded {
            game,
            at: format_timestamp(&at),
        })
    }

    fn player_joined(
        &mut self,
        game: GameId,
        player_id: i32,
        name: &str,
        max_score: i32,
        at: Timestamp,
    ) -> Result<(), HistoryError> {
        self.append(&HistoryRecord::PlayerJoined {
            game,
            player_id,
            name,
            max_score,
            at: format_timestamp(&at),
        })
    }

    fn player_left(
        &mut self,
        game: GameId,
        player_id: i32,
        at: Timestamp,
    ) -> Result<(), HistoryError> {
        self.append(&HistoryRecord::PlayerLeft {
            game,
            player_id,
            at: format_timestamp(&at),
        })
    }

    fn max_score_changed(
        &mut self,
        game: GameId,
        player_id: i32,
        max_score: i32,
    ) -> Result<(), HistoryError> {
        self.append(&HistoryRecord::MaxScoreChanged {
            game,
            player_id,
            max_score,
        })
    }
}
