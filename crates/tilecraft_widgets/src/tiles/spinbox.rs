//! Spinbox tile
//!
//! The increment and decrement buttons either run their own configured
//! actions or step the value locally. Local steps are debounced: the value
//! is dispatched once the buttons have been quiet for `debounce_time`.
//! Holding a button repeats the step unless a hold action is configured.

use tilecraft_core::resolver::number_of;
use tilecraft_core::{
    DispatchError, Entry, InputEvent, InteractionKind, Key, KeyState, Part, PointerEvent,
    Timestamp,
};

use super::{defaults, number_json, Variant};
use crate::gesture::{GesturePhase, HoldMode, SwipeAxis, SwipeGuard};
use crate::host::HostBridge;
use crate::pipeline::{Pipeline, TimerKind};
use crate::validation::NumberConstraints;
use crate::view::ViewDetail;

/// Default quiet period before a stepped value is dispatched
pub const DEFAULT_DEBOUNCE_MS: i64 = 1_000;

#[derive(Debug)]
pub struct SpinboxTile {
    pipeline: Pipeline,
    pressed: Option<Part>,
}

impl SpinboxTile {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            pressed: None,
        }
    }

    /// The button's own entry, if it configures actions
    fn delegate(&self, part: Part) -> Option<&Entry> {
        let entry = self.pipeline.entry();
        let sub = match part {
            Part::Increment => entry.increment.as_deref(),
            Part::Decrement => entry.decrement.as_deref(),
            _ => None,
        };
        sub.filter(|sub| sub.has_actions())
    }

    fn constraints(&self) -> NumberConstraints {
        let (min, max) = self.pipeline.range();
        NumberConstraints::new().min(min).max(max)
    }

    fn press(&mut self, part: Part, event: &PointerEvent, now: Timestamp) -> Option<InteractionKind> {
        self.pressed = Some(part);
        let mut config = self.pipeline.gesture_config(Some(SwipeGuard::new(SwipeAxis::Any)));
        if config.hold.is_none() && self.delegate(part).is_none() {
            config.hold = Some(HoldMode::Repeat);
        }
        self.pipeline.configure_gesture(config);

        let (gesture, timers) = self.pipeline.gesture_parts();
        gesture.handle_pointer(event, now, timers)
    }

    /// Forget the pressed button once its gesture can emit nothing more
    fn release_if_settled(&mut self) {
        let idle = self.pipeline.gesture().phase() == GesturePhase::Idle;
        if idle && !self.pipeline.timers().is_armed(TimerKind::DoubleTap) {
            self.pressed = None;
        }
    }

    fn interact(
        &mut self,
        kind: InteractionKind,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError> {
        let Some(part) = self.pressed else {
            return self.pipeline.send_action(kind, now, host).map(drop);
        };
        if let Some(sub) = self.delegate(part) {
            let action = sub.action_for(kind).cloned();
            return self
                .pipeline
                .send_resolved(action, kind, None, now, host)
                .map(drop);
        }
        match kind {
            InteractionKind::Tap => {
                self.step(part == Part::Increment, now, host);
                Ok(())
            }
            other => self.pipeline.send_action(other, now, host).map(drop),
        }
    }

    /// Move one step up or down and restart the debounce
    fn step(&mut self, up: bool, now: Timestamp, host: &mut dyn HostBridge) {
        let c = self.constraints();
        let step = self.pipeline.step();
        let current = self
            .pipeline
            .value()
            .and_then(number_of)
            .unwrap_or(c.min.unwrap_or(0.0));
        let next = c.clamp(if up { current + step } else { current - step });
        let json = number_json(next, self.pipeline.precision());
        tracing::trace!(id = ?self.pipeline.id(), value = %json, "spinbox stepped");

        self.pipeline.set_local_value(Some(json));
        self.pipeline.hold_gate();
        let delay = self
            .pipeline
            .render_number(self.pipeline.entry().debounce_time.as_ref(), DEFAULT_DEBOUNCE_MS as f64)
            .max(0.0) as i64;
        self.pipeline
            .timers_mut()
            .arm_once(TimerKind::Debounce, now, delay);
        host.request_render();
    }
}

impl Variant for SpinboxTile {
    fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    fn handle_input(
        &mut self,
        event: &InputEvent,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError> {
        let interaction = match event {
            InputEvent::Pointer(pointer @ PointerEvent::Down { part, .. }) => match part {
                Part::Increment | Part::Decrement => self.press(*part, pointer, now),
                _ => None,
            },
            InputEvent::Pointer(pointer) => {
                let (gesture, timers) = self.pipeline.gesture_parts();
                gesture.handle_pointer(pointer, now, timers)
            }
            InputEvent::Keyboard(key) if key.state == KeyState::Pressed => {
                match key.key {
                    Key::ArrowUp => self.step(true, now, host),
                    Key::ArrowDown => self.step(false, now, host),
                    _ => {}
                }
                None
            }
            _ => None,
        };
        match interaction {
            Some(kind) => self.on_interaction(kind, now, host),
            None => {
                if matches!(event, InputEvent::Pointer(_)) {
                    self.release_if_settled();
                }
                Ok(())
            }
        }
    }

    fn on_interaction(
        &mut self,
        kind: InteractionKind,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError> {
        let result = self.interact(kind, now, host);
        self.release_if_settled();
        result
    }

    fn on_debounce(&mut self, at: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        let Some(value) = self.pipeline.value().cloned() else {
            return Ok(());
        };
        tracing::debug!(id = ?self.pipeline.id(), %value, "spinbox value settled");
        self.pipeline.suppress(at);

        let (action, overrides) = match self.pipeline.entry().tap_action.clone() {
            Some(action) => (Some(action), None),
            None => (
                self.pipeline.entity_id().map(|entity| defaults::setter_action(&entity)),
                Some(defaults::value_override(value)),
            ),
        };
        self.pipeline
            .send_resolved(action, InteractionKind::Tap, overrides, at, host)
            .map(drop)
    }

    fn disconnect(&mut self) {
        self.pressed = None;
    }

    fn detail(&self) -> ViewDetail {
        let c = self.constraints();
        ViewDetail::Spinbox {
            formatted: self.pipeline.value_text(),
            min: c.min.unwrap_or(0.0),
            max: c.max.unwrap_or(100.0),
            step: self.pipeline.step(),
        }
    }
}
