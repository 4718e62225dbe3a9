//! Per-frame input snapshot supplied by the platform layer.

use glam::Vec2;

/// Keys the fly camera reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    W,
    A,
    S,
    D,
    Q,
    E,
}

impl Key {
    pub const COUNT: usize = 6;

    const fn slot(self) -> usize {
        self as usize
    }
}

/// Edge-aware button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ButtonState {
    #[default]
    Idle,
    /// Went down this frame.
    Press,
    /// Held down.
    Pressed,
    /// Went up this frame.
    Release,
}

impl ButtonState {
    #[must_use]
    pub const fn is_held(self) -> bool {
        matches!(self, Self::Pressed)
    }
}

/// Delta time, key and mouse state for one frame.
#[derive(Debug, Clone, Default)]
pub struct FrameInput {
    pub delta_time: f32,
    keys: [ButtonState; Key::COUNT],
    pub right_mouse: ButtonState,
    pub mouse_delta: Vec2,
    pub scroll_delta: Vec2,
}

impl FrameInput {
    #[must_use]
    pub fn new(delta_time: f32) -> Self {
        Self {
            delta_time,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_key(mut self, key: Key, state: ButtonState) -> Self {
        self.set_key(key, state);
        self
    }

    #[must_use]
    pub fn with_mouse_drag(mut self, delta: Vec2) -> Self {
        self.right_mouse = ButtonState::Pressed;
        self.mouse_delta = delta;
        self
    }

    #[must_use]
    pub fn with_scroll(mut self, delta: f32) -> Self {
        self.scroll_delta.y = delta;
        self
    }

    pub fn set_key(&mut self, key: Key, state: ButtonState) {
        self.keys[key.slot()] = state;
    }

    #[must_use]
    pub fn key(&self, key: Key) -> ButtonState {
        self.keys[key.slot()]
    }
}
