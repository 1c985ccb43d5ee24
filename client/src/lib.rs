//! # Snake Client Library
//!
//! Client side of a networked multiplayer snake game. The server streams the
//! whole world as line-delimited JSON; this library keeps a local model of it
//! that a renderer and an input path can use while the stream is applied in
//! the background.
//!
//! ## Architecture Overview
//!
//! ### Receive Path
//! After a short handshake (player name out, player id and world size in) a
//! background task reads the stream line by line. Each line is decoded into a
//! snake, wall or powerup by [`snake_shared::decode_line`] and applied to the
//! shared [`world::World`]. Lines that fail to decode are dropped; a broken
//! connection simply stops updates and leaves the last known world in place.
//!
//! ### World Model
//! The world keeps live snakes, dead snakes, walls and powerups behind one
//! lock each. A snake id is always in exactly one of the two snake
//! collections until it disconnects, after which it is gone. Readers take
//! lock-consistent snapshots instead of iterating live collections.
//!
//! ### Game History
//! Joins, leaves and new best scores come out of the world as lifecycle
//! events. They are recorded by a [`history::HistorySink`] on a separate
//! worker so a slow or failing store never holds up the game.
//!
//! ### Commands
//! Move commands are queued to a writer task and sent fire-and-forget; a
//! failed send is logged and dropped without touching the connection.
//!
//! ## Module Organization
//!
//! - `world`: shared world state, lifecycle transitions and snapshots
//! - `history`: lifecycle events, history sinks and the recorder
//! - `network`: session handshake, receive loop, move commands, disconnect
//! - `input`: keyboard sampling with press detection
//! - `rendering`: draws a world snapshot centred on the local player
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use snake_client::history::LogSink;
//! use snake_client::network::{Session, SessionConfig};
//! use snake_client::world::World;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let world = Arc::new(World::new());
//!     let config = SessionConfig::new("localhost", 11000, "alice");
//!     let session = Session::connect(&config, Arc::clone(&world), Box::new(LogSink::new())).await?;
//!
//!     session.move_up();
//!     let snapshot = world.snapshot();
//!     println!("{} snakes alive", snapshot.snakes.len());
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod history;
pub mod input;
pub mod network;
pub mod rendering;
pub mod world;
