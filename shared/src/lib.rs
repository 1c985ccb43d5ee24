//! Entity model shared by everything that speaks the snake wire protocol.
//!
//! The server streams three kinds of entity, one JSON object per line. Field
//! names follow the wire format exactly; see [`protocol`] for line decoding
//! and the outbound move commands.

pub mod protocol;

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

pub use protocol::{decode_line, DecodedMessage, Direction, MoveCommand, ProtocolError};

/// Default port of the snake game server.
pub const DEFAULT_PORT: u16 = 11000;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    #[serde(rename = "X")]
    pub x: i32,
    #[serde(rename = "Y")]
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Axis-aligned wall segment. Walls are identified by id alone.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Wall {
    #[serde(rename = "wall")]
    pub id: i32,
    pub p1: Point,
    pub p2: Point,
}

impl Wall {
    pub fn new(id: i32, p1: Point, p2: Point) -> Self {
        Self { id, p1, p2 }
    }
}

impl PartialEq for Wall {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Wall {}

impl Hash for Wall {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Powerup {
    #[serde(rename = "power")]
    pub id: i32,
    pub loc: Point,
    /// Set only on the frame the powerup was eaten; sent once.
    #[serde(default)]
    pub died: bool,
}

impl Powerup {
    pub fn new(id: i32, loc: Point) -> Self {
        Self {
            id,
            loc,
            died: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Snake {
    #[serde(rename = "snake")]
    pub id: i32,
    #[serde(default)]
    pub name: String,
    /// Body vertices, tail first and head last.
    #[serde(default)]
    pub body: Vec<Point>,
    #[serde(default)]
    pub dir: Point,
    #[serde(default)]
    pub score: i32,
    /// True only on the frame the snake died.
    #[serde(default)]
    pub died: bool,
    /// False between death and respawn. Assumed true when missing.
    #[serde(default = "default_alive")]
    pub alive: bool,
    /// Disconnected. Sent once, after which the id leaves the feed.
    #[serde(default)]
    pub dc: bool,
    /// True only on the spawn frame.
    #[serde(default)]
    pub join: bool,
    /// Tracked locally by the client, never read from the wire.
    #[serde(skip)]
    pub max_score: i32,
}

fn default_alive() -> bool {
    true
}

impl Snake {
    /// A live snake with an empty body, mostly useful for building fixtures.
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            body: Vec::new(),
            dir: Point::default(),
            score: 0,
            died: false,
            alive: true,
            dc: false,
            join: false,
            max_score: 0,
        }
    }

    pub fn head(&self) -> Option<Point> {
        self.body.last().copied()
    }

    pub fn tail(&self) -> Option<Point> {
        self.body.first().copied()
    }
}
