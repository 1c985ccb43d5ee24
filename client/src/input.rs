//! Keyboard input turned into move commands, with edge detection

use macroquad::prelude::*;
use snake_shared::Direction;

/// Keys of interest sampled for one frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub quit: bool,
}

impl KeyState {
    /// Reads the current keyboard state (WASD and arrow keys, Escape to quit)
    pub fn sample() -> Self {
        Self {
            up: is_key_down(KeyCode::W) || is_key_down(KeyCode::Up),
            down: is_key_down(KeyCode::S) || is_key_down(KeyCode::Down),
            left: is_key_down(KeyCode::A) || is_key_down(KeyCode::Left),
            right: is_key_down(KeyCode::D) || is_key_down(KeyCode::Right),
            quit: is_key_down(KeyCode::Escape),
        }
    }
}

/// What the frontend should do this frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInput {
    pub direction: Option<Direction>,
    pub quit: bool,
}

/// Emits one move per key press rather than one per frame the key is held
#[derive(Debug, Default)]
pub struct InputManager {
    previous: KeyState,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self) -> FrameInput {
        self.process(KeyState::sample())
    }

    /// Compares against the previous frame. When several direction keys go
    /// down on the same frame, up wins over down over left over right.
    pub fn process(&mut self, keys: KeyState) -> FrameInput {
        let previous = self.previous;
        self.previous = keys;

        let pressed = [
            (keys.up && !previous.up, Direction::Up),
            (keys.down && !previous.down, Direction::Down),
            (keys.left && !previous.left, Direction::Left),
            (keys.right && !previous.right, Direction::Right),
        ];

        FrameInput {
            direction: pressed
                .iter()
                .find(|(pressed, _)| *pressed)
                .map(|(_, direction)| *direction),
            quit: keys.quit && !previous.quit,
        }
    }
}
