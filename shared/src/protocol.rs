//! Line protocol: decoding server entity lines and encoding move commands.
//!
//! Server lines carry no explicit type tag. The entity kind is inferred from
//! which identity key is present (`snake`, `wall` or `power`), tried in that
//! order; the first shape that decodes wins. Snakes go first because a
//! player's name is the only free text on the wire.

use crate::{Powerup, Snake, Wall};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,
    #[error("malformed json: {0}")]
    Malformed(#[source] serde_json::Error),
    #[error("line is not a known entity")]
    Unrecognized,
    #[error("failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),
}

/// One entity decoded from a server line.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(untagged)]
pub enum DecodedMessage {
    Snake(Snake),
    Wall(Wall),
    Powerup(Powerup),
}

impl DecodedMessage {
    pub fn id(&self) -> i32 {
        match self {
            DecodedMessage::Snake(snake) => snake.id,
            DecodedMessage::Wall(wall) => wall.id,
            DecodedMessage::Powerup(powerup) => powerup.id,
        }
    }
}

/// Decodes a single line from the server.
///
/// Trailing whitespace and line terminators are ignored. Anything that is
/// not a JSON object matching one of the three entity shapes is an error;
/// callers in the receive path drop those lines.
pub fn decode_line(line: &str) -> Result<DecodedMessage, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }

    let value: Value = serde_json::from_str(line).map_err(ProtocolError::Malformed)?;
    if !value.is_object() {
        return Err(ProtocolError::Unrecognized);
    }

    serde_json::from_value(value).map_err(|_| ProtocolError::Unrecognized)
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

/// `{"moving":"<direction>"}`, the only command a client sends after the
/// handshake.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct MoveCommand {
    pub moving: Direction,
}

impl MoveCommand {
    pub fn new(moving: Direction) -> Self {
        Self { moving }
    }

    /// Single-line JSON, without the trailing newline.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}
