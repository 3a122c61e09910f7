//! Slider tile
//!
//! Dragging moves the displayed value without dispatching. Release snaps to
//! the step and dispatches once. A mostly vertical drag is a scroll: it
//! aborts the drag, restores backend tracking and dispatches nothing.
//!
//! Pointer x is mapped onto the range across `track_width` pixels.

use tilecraft_core::resolver::number_of;
use tilecraft_core::{
    DispatchError, InputEvent, InteractionKind, Key, KeyState, PointerDeltas, PointerEvent,
    Timestamp,
};

use super::{defaults, number_json, Variant};
use crate::gesture::DEFAULT_SWIPE_THRESHOLD;
use crate::host::HostBridge;
use crate::pipeline::Pipeline;
use crate::validation::NumberConstraints;
use crate::view::ViewDetail;

/// Default track length in pixels
pub const DEFAULT_TRACK_WIDTH: f32 = 100.0;

#[derive(Debug)]
pub struct SliderTile {
    pipeline: Pipeline,
    track_width: f32,
    drag: Option<PointerDeltas>,
}

impl SliderTile {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            track_width: DEFAULT_TRACK_WIDTH,
            drag: None,
        }
    }

    /// The host laid the track out at `width` pixels
    pub fn set_track_width(&mut self, width: f32) {
        if width > 0.0 {
            self.track_width = width;
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    fn constraints(&self) -> NumberConstraints {
        let (min, max) = self.pipeline.range();
        NumberConstraints::new()
            .min(min)
            .max(max)
            .step(self.pipeline.step())
    }

    fn current(&self) -> Option<f64> {
        self.pipeline.value().and_then(number_of)
    }

    fn value_at(&self, x: f32) -> f64 {
        let c = self.constraints();
        let (min, max) = (c.min.unwrap_or(0.0), c.max.unwrap_or(0.0));
        let fraction = f64::from((x / self.track_width).clamp(0.0, 1.0));
        c.snap(min + fraction * (max - min))
    }

    fn show(&mut self, value: f64) {
        let json = number_json(value, self.pipeline.precision());
        self.pipeline.set_local_value(Some(json));
    }

    fn commit(&mut self, value: f64, now: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        let json = number_json(value, self.pipeline.precision());
        tracing::debug!(id = ?self.pipeline.id(), value = %json, "slider committed");
        self.pipeline.set_local_value(Some(json.clone()));
        self.pipeline.suppress(now);

        let (action, overrides) = match self.pipeline.entry().tap_action.clone() {
            Some(action) => (Some(action), None),
            None => (
                self.pipeline.entity_id().map(|entity| defaults::setter_action(&entity)),
                Some(defaults::value_override(json)),
            ),
        };
        self.pipeline
            .send_resolved(action, InteractionKind::Tap, overrides, now, host)
            .map(drop)
    }

    fn abort(&mut self, now: Timestamp, host: &mut dyn HostBridge) {
        tracing::trace!(id = ?self.pipeline.id(), "slider drag became a scroll");
        self.drag = None;
        self.pipeline.force_reset(now);
        host.request_render();
    }

    fn handle_pointer(
        &mut self,
        event: &PointerEvent,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError> {
        match *event {
            PointerEvent::Down { x, y, .. } => {
                self.drag = Some(PointerDeltas::start(x, y));
                self.pipeline.hold_gate();
                let value = self.value_at(x);
                self.show(value);
            }
            PointerEvent::Moved { x, y } => {
                let Some(drag) = self.drag.as_mut() else {
                    return Ok(());
                };
                drag.track(x, y);
                let (dx, dy) = (drag.delta_x().abs(), drag.delta_y().abs());
                if dy > DEFAULT_SWIPE_THRESHOLD && dy > dx {
                    self.abort(now, host);
                } else {
                    let value = self.value_at(x);
                    self.show(value);
                }
            }
            PointerEvent::Up { x, .. } => {
                if self.drag.take().is_some() {
                    let value = self.value_at(x);
                    return self.commit(value, now, host);
                }
            }
            PointerEvent::Cancelled => {
                if self.drag.is_some() {
                    self.abort(now, host);
                }
            }
            // Dragging keeps the pointer captured
            PointerEvent::Left { .. } => {}
        }
        Ok(())
    }
}

impl Variant for SliderTile {
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
        match event {
            InputEvent::Pointer(pointer) => self.handle_pointer(pointer, now, host),
            InputEvent::Keyboard(key) if key.state == KeyState::Pressed => {
                let c = self.constraints();
                let step = c.step.unwrap_or(1.0);
                let current = self.current().unwrap_or(c.min.unwrap_or(0.0));
                let target = match key.key {
                    Key::ArrowRight | Key::ArrowUp => current + step,
                    Key::ArrowLeft | Key::ArrowDown => current - step,
                    Key::Home => c.min.unwrap_or(current),
                    Key::End => c.max.unwrap_or(current),
                    _ => return Ok(()),
                };
                self.commit(c.snap(target), now, host)
            }
            _ => Ok(()),
        }
    }

    fn disconnect(&mut self) {
        self.drag = None;
    }

    fn detail(&self) -> ViewDetail {
        let c = self.constraints();
        let (min, max) = (c.min.unwrap_or(0.0), c.max.unwrap_or(100.0));
        let percent = self
            .current()
            .map_or(0.0, |v| ((v - min) / (max - min) * 100.0).clamp(0.0, 100.0));
        ViewDetail::Slider {
            percent,
            thumb: self.pipeline.entry().thumb.unwrap_or_default(),
            min,
            max,
            step: c.step.unwrap_or(1.0),
            dragging: self.is_dragging(),
        }
    }
}
