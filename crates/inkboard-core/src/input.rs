//! Pointer and keyboard input as delivered by the host.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        shift: false,
        ctrl: false,
        alt: false,
        meta: false,
    };

    pub const SHIFT: Modifiers = Modifiers {
        shift: true,
        ..Modifiers::NONE
    };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn command(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// One pointer sample in screen coordinates.
///
/// `timestamp_ms` comes from the host clock and drives broadcast throttling
/// and double-click detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerInput {
    pub position: Point,
    pub button: MouseButton,
    pub modifiers: Modifiers,
    pub timestamp_ms: u64,
}

impl PointerInput {
    pub fn new(position: Point, timestamp_ms: u64) -> Self {
        Self {
            position,
            button: MouseButton::Left,
            modifiers: Modifiers::NONE,
            timestamp_ms,
        }
    }

    pub fn with_button(mut self, button: MouseButton) -> Self {
        self.button = button;
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Wheel input; negative `delta_y` zooms in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelInput {
    pub position: Point,
    pub delta: Vec2,
    pub modifiers: Modifiers,
}

/// Keyboard event type. Keys use DOM-style names (`"Escape"`, `" "`, `"z"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum KeyEvent {
    Pressed { key: String, modifiers: Modifiers },
    Released { key: String },
}

/// Double-click detection constants.
const DOUBLE_CLICK_TIME_MS: u64 = 500;
const DOUBLE_CLICK_DISTANCE: f64 = 5.0;

/// Input state that spans events: held keys and click history.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    /// Last pointer position in screen coordinates.
    pub pointer_position: Point,
    pressed_keys: HashSet<String>,
    last_click: Option<(u64, Point)>,
    last_timestamp_ms: u64,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle_key_event(&mut self, event: &KeyEvent) {
        match event {
            KeyEvent::Pressed { key, .. } => {
                self.pressed_keys.insert(key.clone());
            }
            KeyEvent::Released { key } => {
                self.pressed_keys.remove(key);
            }
        }
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }

    /// Remember the position and time of a pointer sample.
    pub fn track(&mut self, input: &PointerInput) {
        self.pointer_position = input.position;
        self.last_timestamp_ms = self.last_timestamp_ms.max(input.timestamp_ms);
    }

    /// Host time of the latest pointer sample, for events that carry none.
    pub fn last_timestamp(&self) -> u64 {
        self.last_timestamp_ms
    }

    /// Whether the space bar is held for panning.
    pub fn space_held(&self) -> bool {
        self.is_key_pressed(" ")
    }

    /// Record a primary-button press and report whether it completes a
    /// double-click.
    pub fn register_click(&mut self, input: &PointerInput) -> bool {
        self.track(input);
        if input.button != MouseButton::Left {
            return false;
        }
        if let Some((time, pos)) = self.last_click {
            let elapsed = input.timestamp_ms.saturating_sub(time);
            if elapsed < DOUBLE_CLICK_TIME_MS && (input.position - pos).hypot() < DOUBLE_CLICK_DISTANCE {
                // Reset so a triple click is not a second double-click
                self.last_click = None;
                return true;
            }
        }
        self.last_click = Some((input.timestamp_ms, input.position));
        false
    }
}
