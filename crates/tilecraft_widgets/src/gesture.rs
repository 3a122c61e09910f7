//! Gesture classification
//!
//! Turns raw pointer and keyboard input into the logical interactions that
//! actions are bound to: tap, hold, double tap and the momentary
//! start/end pair.
//!
//! ```text
//!          down                hold timer            up
//! Idle ──────────▶ Pressed ─────────────────▶ Held ──────▶ Idle   (hold)
//!   │                │   │                     │
//!   │                │   └── hold timer ──▶ Repeating ─ up ─▶ Idle
//!   │                │         (repeat)        (tap every repeat_delay)
//!   │                │ up
//!   │                └──────▶ Idle   (tap, or arm the double-tap window)
//!   │  down (momentary)           up / leave / cancel
//!   └────────────────▶ Momentary ──────────────────────▶ Idle (end)
//!
//! Pressed / Held / Repeating ── movement past threshold ──▶ Swiping
//! ```
//!
//! The classifier owns no clock: it arms and cancels timers in the
//! widget's [`TimerSlots`] and is told when they come due.

use tilecraft_core::{
    InteractionKind, Key, KeyState, KeyboardEvent, PointerDeltas, PointerEvent, PointerKind,
    Timestamp,
};
use tilecraft_scheduler::TimerSlots;

use crate::pipeline::TimerKind;

/// Default hold threshold
pub const DEFAULT_HOLD_MS: i64 = 500;
/// Default repeat interval for `repeat` hold actions
pub const DEFAULT_REPEAT_MS: i64 = 100;
/// Default double-tap window
pub const DEFAULT_DOUBLE_TAP_MS: i64 = 200;
/// Default swipe sensitivity in pixels
pub const DEFAULT_SWIPE_THRESHOLD: f32 = 16.0;

/// Axis along which movement counts as a swipe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SwipeAxis {
    /// Movement in any direction
    #[default]
    Any,
    Horizontal,
    Vertical,
}

/// Movement limit before a gesture stops being a tap or hold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwipeGuard {
    pub threshold: f32,
    pub axis: SwipeAxis,
}

impl SwipeGuard {
    pub fn new(axis: SwipeAxis) -> Self {
        Self {
            threshold: DEFAULT_SWIPE_THRESHOLD,
            axis,
        }
    }

    /// Whether the deltas moved past the threshold on the guarded axis
    pub fn tripped(&self, deltas: &PointerDeltas) -> bool {
        let (dx, dy) = (deltas.delta_x().abs(), deltas.delta_y().abs());
        match self.axis {
            SwipeAxis::Any => dx.max(dy) > self.threshold,
            SwipeAxis::Horizontal => dx > self.threshold,
            SwipeAxis::Vertical => dy > self.threshold,
        }
    }
}

/// What a completed hold does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldMode {
    /// Fire the hold action on release
    Fire,
    /// Fire the tap action on an interval while held
    Repeat,
}

/// Timing and movement parameters, refreshed before each press
#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// `None` when no hold action is configured
    pub hold: Option<HoldMode>,
    pub hold_time: i64,
    pub repeat_delay: i64,
    /// Double-tap window, `None` when no double-tap action is configured
    pub double_tap_window: Option<i64>,
    /// Momentary start/end replace tap/hold entirely
    pub momentary: bool,
    pub swipe: Option<SwipeGuard>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            hold: None,
            hold_time: DEFAULT_HOLD_MS,
            repeat_delay: DEFAULT_REPEAT_MS,
            double_tap_window: None,
            momentary: false,
            swipe: Some(SwipeGuard::new(SwipeAxis::Any)),
        }
    }
}

/// Classifier phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GesturePhase {
    #[default]
    Idle,
    Pressed,
    Held,
    Repeating,
    Momentary,
    Swiping,
}

/// Phase-changing events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GestureEvent {
    Down { momentary: bool },
    HoldElapsed { repeat: bool },
    SwipeDetected,
    Up,
    Abort,
}

impl GesturePhase {
    fn on_event(&self, event: GestureEvent) -> Option<Self> {
        use GestureEvent::*;
        use GesturePhase::*;
        match (self, event) {
            (_, Down { momentary: true }) => Some(Momentary),
            (_, Down { momentary: false }) => Some(Pressed),

            (Pressed, HoldElapsed { repeat: false }) => Some(Held),
            (Pressed, HoldElapsed { repeat: true }) => Some(Repeating),

            // Momentary gestures are never reclassified
            (Pressed | Held | Repeating, SwipeDetected) => Some(Swiping),

            (Idle, Up | Abort) => None,
            (_, Up | Abort) => Some(Idle),

            _ => None,
        }
    }

    /// A pointer is down
    pub fn is_active(&self) -> bool {
        !matches!(self, GesturePhase::Idle)
    }
}

/// Per-widget gesture state machine
#[derive(Debug, Clone, Default)]
pub struct GestureClassifier {
    config: GestureConfig,
    phase: GesturePhase,
    deltas: PointerDeltas,
    momentary_start: Option<Timestamp>,
    momentary_end: Option<Timestamp>,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Replace the timing parameters; takes effect from the next press
    pub fn configure(&mut self, config: GestureConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    pub fn deltas(&self) -> PointerDeltas {
        self.deltas
    }

    /// Seconds between momentary start and end, 0 until both happened
    pub fn hold_secs(&self) -> f64 {
        match (self.momentary_start, self.momentary_end) {
            (Some(start), Some(end)) if end >= start => (end - start) as f64 / 1000.0,
            _ => 0.0,
        }
    }

    fn transition(&mut self, event: GestureEvent) -> bool {
        match self.phase.on_event(event) {
            Some(next) => {
                tracing::trace!(from = ?self.phase, to = ?next, ?event, "gesture transition");
                self.phase = next;
                true
            }
            None => false,
        }
    }

    fn cancel_gesture_timers(timers: &mut TimerSlots<TimerKind>, include_double_tap: bool) {
        timers.cancel(TimerKind::Hold);
        timers.cancel(TimerKind::Repeat);
        if include_double_tap {
            timers.cancel(TimerKind::DoubleTap);
        }
    }

    /// Route a pointer event
    pub fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        now: Timestamp,
        timers: &mut TimerSlots<TimerKind>,
    ) -> Option<InteractionKind> {
        match *event {
            PointerEvent::Down { x, y, .. } => self.press(x, y, now, timers),
            PointerEvent::Moved { x, y } => {
                self.moved(x, y, timers);
                None
            }
            PointerEvent::Up { x, y } => self.release(x, y, now, timers),
            PointerEvent::Left {
                pointer: PointerKind::Mouse,
            } => self.cancel(now, timers),
            PointerEvent::Left { .. } => None,
            PointerEvent::Cancelled => self.cancel(now, timers),
        }
    }

    /// Enter and Space act like a press and release at the origin
    pub fn handle_key(
        &mut self,
        event: &KeyboardEvent,
        now: Timestamp,
        timers: &mut TimerSlots<TimerKind>,
    ) -> Option<InteractionKind> {
        if !matches!(event.key, Key::Enter | Key::Space) {
            return None;
        }
        match event.state {
            KeyState::Pressed if !event.repeat => self.press(0.0, 0.0, now, timers),
            KeyState::Pressed => None,
            KeyState::Released => self.release(0.0, 0.0, now, timers),
        }
    }

    /// Pointer down
    pub fn press(
        &mut self,
        x: f32,
        y: f32,
        now: Timestamp,
        timers: &mut TimerSlots<TimerKind>,
    ) -> Option<InteractionKind> {
        // A second press inside the double-tap window keeps the window open
        Self::cancel_gesture_timers(timers, false);
        self.deltas = PointerDeltas::start(x, y);

        if self.config.momentary {
            self.transition(GestureEvent::Down { momentary: true });
            self.momentary_start = Some(now);
            self.momentary_end = None;
            return Some(InteractionKind::MomentaryStart);
        }

        self.transition(GestureEvent::Down { momentary: false });
        if self.config.hold.is_some() {
            timers.arm_once(TimerKind::Hold, now, self.config.hold_time);
        }
        None
    }

    /// Pointer moved; returns true when this move turned the gesture into a swipe
    pub fn moved(&mut self, x: f32, y: f32, timers: &mut TimerSlots<TimerKind>) -> bool {
        if !self.phase.is_active() {
            return false;
        }
        self.deltas.track(x, y);

        let tripped = self
            .config
            .swipe
            .is_some_and(|guard| guard.tripped(&self.deltas));
        if tripped && self.transition(GestureEvent::SwipeDetected) {
            Self::cancel_gesture_timers(timers, true);
            tracing::trace!(dx = self.deltas.delta_x(), dy = self.deltas.delta_y(), "swipe detected");
            return true;
        }
        false
    }

    /// Pointer up
    pub fn release(
        &mut self,
        x: f32,
        y: f32,
        now: Timestamp,
        timers: &mut TimerSlots<TimerKind>,
    ) -> Option<InteractionKind> {
        let phase = self.phase;
        if !self.transition(GestureEvent::Up) {
            return None;
        }
        self.deltas.track(x, y);
        Self::cancel_gesture_timers(timers, false);

        match phase {
            GesturePhase::Momentary => {
                self.momentary_end = Some(now);
                Some(InteractionKind::MomentaryEnd)
            }
            GesturePhase::Held => Some(InteractionKind::Hold),
            GesturePhase::Pressed => match self.config.double_tap_window {
                None => Some(InteractionKind::Tap),
                Some(_) if timers.is_armed(TimerKind::DoubleTap) => {
                    timers.cancel(TimerKind::DoubleTap);
                    Some(InteractionKind::DoubleTap)
                }
                Some(window) => {
                    timers.arm_once(TimerKind::DoubleTap, now, window);
                    None
                }
            },
            GesturePhase::Repeating | GesturePhase::Swiping | GesturePhase::Idle => None,
        }
    }

    /// Leave or cancel: back to idle, dropping timers and deltas
    pub fn cancel(
        &mut self,
        now: Timestamp,
        timers: &mut TimerSlots<TimerKind>,
    ) -> Option<InteractionKind> {
        let phase = self.phase;
        if !self.transition(GestureEvent::Abort) {
            return None;
        }
        Self::cancel_gesture_timers(timers, true);
        self.deltas = PointerDeltas::default();

        if phase == GesturePhase::Momentary {
            self.momentary_end = Some(now);
            return Some(InteractionKind::MomentaryEnd);
        }
        None
    }

    /// Forget the gesture without firing anything
    pub fn reset(&mut self, timers: &mut TimerSlots<TimerKind>) {
        Self::cancel_gesture_timers(timers, true);
        self.phase = GesturePhase::Idle;
        self.deltas = PointerDeltas::default();
        self.momentary_start = None;
        self.momentary_end = None;
    }

    /// A gesture timer came due at `at`
    pub fn on_timer(
        &mut self,
        kind: TimerKind,
        at: Timestamp,
        timers: &mut TimerSlots<TimerKind>,
    ) -> Option<InteractionKind> {
        match kind {
            TimerKind::Hold => {
                let repeat = self.config.hold == Some(HoldMode::Repeat);
                if self.transition(GestureEvent::HoldElapsed { repeat }) && repeat {
                    timers.arm_interval(TimerKind::Repeat, at, self.config.repeat_delay);
                }
                None
            }
            TimerKind::Repeat if self.phase == GesturePhase::Repeating => Some(InteractionKind::Tap),
            TimerKind::Repeat => {
                timers.cancel(TimerKind::Repeat);
                None
            }
            TimerKind::DoubleTap => Some(InteractionKind::Tap),
            _ => None,
        }
    }
}
