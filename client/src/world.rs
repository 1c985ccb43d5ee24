//! Client-side model of the game world.
//!
//! [`World`] is shared between the receive loop, which applies every entity
//! the server streams, and the frontend, which reads snapshots and looks up
//! the local player. Each collection sits behind its own lock. Snake updates
//! always take the active lock and then the dead lock and hold both for the
//! whole transition, so a reader never sees an id in both collections or in
//! neither while it moves between them.
//!
//! Mutations return the [`LifecycleEvent`]s they cause; persisting those is
//! somebody else's job (see [`crate::history`]).

use crate::history::{LifecycleEvent, Timestamp};
use chrono::Local;
use log::debug;
use snake_shared::{DecodedMessage, Powerup, Snake, Wall};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorldError {
    #[error("world has already been initialized")]
    AlreadyInitialized,
}

/// Values fixed by the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldSetup {
    pub player_id: i32,
    pub size: i32,
}

/// Lock-consistent copy of the world, taken for rendering.
#[derive(Debug, Clone, Default)]
pub struct WorldSnapshot {
    pub setup: Option<WorldSetup>,
    pub snakes: HashMap<i32, Snake>,
    pub dead_snakes: HashMap<i32, Snake>,
    pub walls: Vec<Wall>,
    pub powerups: HashMap<i32, Powerup>,
}

impl WorldSnapshot {
    pub fn player_id(&self) -> Option<i32> {
        self.setup.map(|setup| setup.player_id)
    }

    /// The local player's snake, alive or dead.
    pub fn player(&self) -> Option<&Snake> {
        let id = self.player_id()?;
        self.snakes.get(&id).or_else(|| self.dead_snakes.get(&id))
    }
}

#[derive(Debug, Default)]
pub struct World {
    setup: OnceLock<WorldSetup>,
    snakes: Mutex<HashMap<i32, Snake>>,
    dead_snakes: Mutex<HashMap<i32, Snake>>,
    walls: Mutex<HashSet<Wall>>,
    powerups: Mutex<HashMap<i32, Powerup>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the handshake values. Succeeds once per world.
    pub fn initialize(&self, player_id: i32, world_size: i32) -> Result<(), WorldError> {
        self.setup
            .set(WorldSetup {
                player_id,
                size: world_size,
            })
            .map_err(|_| WorldError::AlreadyInitialized)
    }

    pub fn setup(&self) -> Option<WorldSetup> {
        self.setup.get().copied()
    }

    pub fn player_id(&self) -> Option<i32> {
        self.setup().map(|setup| setup.player_id)
    }

    /// Side length of the square world.
    pub fn world_size(&self) -> Option<i32> {
        self.setup().map(|setup| setup.size)
    }

    pub fn width(&self) -> Option<i32> {
        self.world_size()
    }

    pub fn height(&self) -> Option<i32> {
        self.world_size()
    }

    /// Applies one decoded server line.
    pub fn apply(&self, message: DecodedMessage) -> Vec<LifecycleEvent> {
        match message {
            DecodedMessage::Snake(snake) => self.update_snake(snake),
            DecodedMessage::Wall(wall) => {
                self.add_wall(wall);
                Vec::new()
            }
            DecodedMessage::Powerup(powerup) => {
                self.update_powerup(powerup);
                Vec::new()
            }
        }
    }

    /// Applies a snake frame and moves the id between the active and dead
    /// collections according to its flags.
    pub fn update_snake(&self, snake: Snake) -> Vec<LifecycleEvent> {
        self.update_snake_at(snake, Local::now())
    }

    fn update_snake_at(&self, mut snake: Snake, now: Timestamp) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        let id = snake.id;

        let mut snakes = lock(&self.snakes);
        let mut dead_snakes = lock(&self.dead_snakes);

        let previous_max = snakes
            .get(&id)
            .or_else(|| dead_snakes.get(&id))
            .map(|previous| previous.max_score);

        let previous_max = match previous_max {
            Some(max_score) => max_score,
            None => {
                events.push(LifecycleEvent::PlayerJoined {
                    player_id: id,
                    name: snake.name.clone(),
                    max_score: 0,
                    at: now,
                });
                0
            }
        };
        snake.max_score = previous_max;

        if snake.dc {
            snakes.remove(&id);
            dead_snakes.remove(&id);
            debug!("Snake {} disconnected", id);
            events.push(LifecycleEvent::PlayerLeft {
                player_id: id,
                at: now,
            });
        } else if !snake.alive {
            snakes.remove(&id);
            dead_snakes.insert(id, snake);
        } else {
            if snake.score > snake.max_score {
                snake.max_score = snake.score;
                events.push(LifecycleEvent::MaxScoreChanged {
                    player_id: id,
                    max_score: snake.max_score,
                });
            }
            dead_snakes.remove(&id);
            snakes.insert(id, snake);
        }

        events
    }

    /// Walls are static: the first wall seen for an id is kept.
    pub fn add_wall(&self, wall: Wall) -> bool {
        lock(&self.walls).insert(wall)
    }

    pub fn update_powerup(&self, powerup: Powerup) {
        let mut powerups = lock(&self.powerups);
        if powerup.died {
            powerups.remove(&powerup.id);
            return;
        }
        powerups.insert(powerup.id, powerup);
    }

    /// Emits a leave event for every snake currently held. Used when this
    /// client ends its own session; the collections are left as they are.
    pub fn mark_all_disconnected(&self, at: Timestamp) -> Vec<LifecycleEvent> {
        let snakes = lock(&self.snakes);
        let dead_snakes = lock(&self.dead_snakes);

        let mut ids: Vec<i32> = snakes.keys().chain(dead_snakes.keys()).copied().collect();
        ids.sort_unstable();

        ids.into_iter()
            .map(|player_id| LifecycleEvent::PlayerLeft { player_id, at })
            .collect()
    }

    /// The local player's snake, looked up in the active collection first and
    /// then among the dead.
    pub fn player(&self) -> Option<Snake> {
        let id = self.player_id()?;
        let snakes = lock(&self.snakes);
        let dead_snakes = lock(&self.dead_snakes);
        snakes
            .get(&id)
            .or_else(|| dead_snakes.get(&id))
            .cloned()
    }

    pub fn contains_snake(&self, id: i32) -> bool {
        let snakes = lock(&self.snakes);
        let dead_snakes = lock(&self.dead_snakes);
        snakes.contains_key(&id) || dead_snakes.contains_key(&id)
    }

    pub fn snakes(&self) -> HashMap<i32, Snake> {
        lock(&self.snakes).clone()
    }

    pub fn dead_snakes(&self) -> HashMap<i32, Snake> {
        lock(&self.dead_snakes).clone()
    }

    pub fn walls(&self) -> Vec<Wall> {
        lock(&self.walls).iter().cloned().collect()
    }

    pub fn powerups(&self) -> HashMap<i32, Powerup> {
        lock(&self.powerups).clone()
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        let (snakes, dead_snakes) = {
            let snakes = lock(&self.snakes);
            let dead_snakes = lock(&self.dead_snakes);
            (snakes.clone(), dead_snakes.clone())
        };

        WorldSnapshot {
            setup: self.setup(),
            snakes,
            dead_snakes,
            walls: self.walls(),
            powerups: self.powerups(),
        }
    }
}
