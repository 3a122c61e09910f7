//! Input event types for pointer, keyboard and text editing
//!
//! Hosts translate their native DOM/platform events into these before
//! handing them to a widget. Coordinates are widget-local pixels.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Identity of one mounted widget instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId(u64);

impl TileId {
    /// Allocate a fresh process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        TileId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Input events delivered to a widget
#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// Pointer (mouse, touch, pen) event
    Pointer(PointerEvent),
    /// Keyboard event
    Keyboard(KeyboardEvent),
    /// The text of an editable field changed to this value
    Edit(String),
    /// The widget gained keyboard focus
    Focus,
    /// The widget lost keyboard focus
    Blur,
}

impl InputEvent {
    /// Primary pointer pressed on the widget body
    pub fn press(x: f32, y: f32) -> Self {
        InputEvent::Pointer(PointerEvent::Down {
            x,
            y,
            pointer: PointerKind::Mouse,
            part: Part::Body,
        })
    }

    /// Primary pointer pressed on a specific part of the widget
    pub fn press_part(x: f32, y: f32, part: Part) -> Self {
        InputEvent::Pointer(PointerEvent::Down {
            x,
            y,
            pointer: PointerKind::Mouse,
            part,
        })
    }

    /// Pointer moved
    pub fn move_to(x: f32, y: f32) -> Self {
        InputEvent::Pointer(PointerEvent::Moved { x, y })
    }

    /// Primary pointer released
    pub fn release(x: f32, y: f32) -> Self {
        InputEvent::Pointer(PointerEvent::Up { x, y })
    }

    /// Key pressed
    pub fn key_down(key: Key) -> Self {
        InputEvent::Keyboard(KeyboardEvent::new(key, KeyState::Pressed))
    }

    /// Key released
    pub fn key_up(key: Key) -> Self {
        InputEvent::Keyboard(KeyboardEvent::new(key, KeyState::Released))
    }
}

// ============================================================================
// Pointer Events
// ============================================================================

/// Pointer events
#[derive(Clone, Debug, PartialEq)]
pub enum PointerEvent {
    /// Pointer pressed
    Down {
        x: f32,
        y: f32,
        pointer: PointerKind,
        /// Which part of the widget was hit
        part: Part,
    },
    /// Pointer moved (only delivered while the widget tracks the pointer)
    Moved { x: f32, y: f32 },
    /// Pointer released
    Up { x: f32, y: f32 },
    /// Pointer left the widget bounds
    Left { pointer: PointerKind },
    /// The platform cancelled the gesture (scroll takeover, system UI)
    Cancelled,
}

/// Kind of pointing device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerKind {
    #[default]
    Mouse,
    Touch,
    Pen,
}

/// Sub-target of a widget hit by a pointer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    /// The widget itself
    #[default]
    Body,
    /// Spinbox increment button
    Increment,
    /// Spinbox decrement button
    Decrement,
    /// Dropdown / selector option by index
    Option(usize),
}

/// Running pointer geometry for the gesture in progress
///
/// Exposed to templates as `initialX`, `initialY`, `currentX`, `currentY`,
/// `deltaX` and `deltaY`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerDeltas {
    pub initial_x: f32,
    pub initial_y: f32,
    pub current_x: f32,
    pub current_y: f32,
}

impl PointerDeltas {
    /// Start tracking at a press position
    pub fn start(x: f32, y: f32) -> Self {
        Self {
            initial_x: x,
            initial_y: y,
            current_x: x,
            current_y: y,
        }
    }

    /// Update the current position
    pub fn track(&mut self, x: f32, y: f32) {
        self.current_x = x;
        self.current_y = y;
    }

    pub fn delta_x(&self) -> f32 {
        self.current_x - self.initial_x
    }

    pub fn delta_y(&self) -> f32 {
        self.current_y - self.initial_y
    }
}

// ============================================================================
// Keyboard Events
// ============================================================================

/// Keyboard event
#[derive(Clone, Debug, PartialEq)]
pub struct KeyboardEvent {
    /// The key that was pressed or released
    pub key: Key,
    /// Whether the key was pressed or released
    pub state: KeyState,
    /// Auto-repeat from a held key
    pub repeat: bool,
    /// Modifier keys held during this event
    pub modifiers: Modifiers,
}

impl KeyboardEvent {
    pub fn new(key: Key, state: KeyState) -> Self {
        Self {
            key,
            state,
            repeat: false,
            modifiers: Modifiers::default(),
        }
    }
}

/// Key press/release state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyState {
    Pressed,
    Released,
}

/// Modifier key state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Keys widgets react to
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    Enter,
    Space,
    Escape,
    Tab,
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Home,
    End,
    /// Any printable character
    Character(char),
    /// Anything else, by DOM key name
    Other(String),
}

impl Key {
    /// Parse a DOM `KeyboardEvent.key` name
    pub fn from_dom(name: &str) -> Self {
        match name {
            "Enter" => Key::Enter,
            " " | "Space" | "Spacebar" => Key::Space,
            "Escape" | "Esc" => Key::Escape,
            "Tab" => Key::Tab,
            "ArrowUp" => Key::ArrowUp,
            "ArrowDown" => Key::ArrowDown,
            "ArrowLeft" => Key::ArrowLeft,
            "ArrowRight" => Key::ArrowRight,
            "Home" => Key::Home,
            "End" => Key::End,
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Character(c),
                    _ => Key::Other(other.to_string()),
                }
            }
        }
    }

    /// Keys that activate a focused control like a click
    pub fn is_activation(&self) -> bool {
        matches!(self, Key::Enter | Key::Space)
    }
}
