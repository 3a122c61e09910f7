//! Toggle tile
//!
//! A tap flips the switch. A horizontal swipe commits only when its direction
//! matches the new state (right turns on, left turns off); a swipe toward the
//! current state does nothing. Vertical movement is a scroll and cancels.

use serde_json::Value;
use tilecraft_core::{DispatchError, InputEvent, InteractionKind, PointerEvent, Timestamp};

use super::{classify, defaults, Variant};
use crate::gesture::{GesturePhase, SwipeAxis, SwipeGuard, DEFAULT_SWIPE_THRESHOLD};
use crate::host::HostBridge;
use crate::pipeline::Pipeline;
use crate::view::ViewDetail;

/// States that read as "on"
const TRUTHY_STATES: &[&str] = &[
    "true", "yes", "on", "enable", "enabled", "1", "open", "opening", "locked", "active",
    "playing", "buffering", "home", "heat", "cool", "heat_cool", "dry", "fan_only", "auto",
];

/// Coerce a displayed value to the switch position
pub fn is_checked(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => {
            let s = s.trim().to_ascii_lowercase();
            TRUTHY_STATES.contains(&s.as_str())
        }
        _ => false,
    }
}

#[derive(Debug)]
pub struct ToggleTile {
    pipeline: Pipeline,
}

impl ToggleTile {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn checked(&self) -> bool {
        is_checked(self.pipeline.value())
    }

    /// Direction of a committed horizontal swipe ending at `(x, y)`
    fn swipe_direction(&self, x: f32, y: f32) -> Option<bool> {
        let gesture = self.pipeline.gesture();
        if !matches!(gesture.phase(), GesturePhase::Pressed | GesturePhase::Held) {
            return None;
        }
        let mut deltas = gesture.deltas();
        deltas.track(x, y);
        let dx = deltas.delta_x();
        (dx.abs() >= DEFAULT_SWIPE_THRESHOLD).then_some(dx > 0.0)
    }

    fn flip(&mut self, now: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        let on = !self.checked();
        let state = if on { "on" } else { "off" };
        tracing::debug!(id = ?self.pipeline.id(), state, "toggle flipped");

        self.pipeline.set_local_value(Some(Value::String(state.into())));
        self.pipeline.suppress(now);

        let action = match self.pipeline.entry().tap_action.clone() {
            Some(action) => Some(action),
            None => self
                .pipeline
                .entity_id()
                .map(|entity| defaults::toggle_action(&entity, on)),
        };
        self.pipeline
            .send_resolved(action, InteractionKind::Tap, None, now, host)
            .map(drop)
    }
}

impl Variant for ToggleTile {
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
        if let InputEvent::Pointer(PointerEvent::Up { x, y }) = event {
            if let Some(on) = self.swipe_direction(*x, *y) {
                let (gesture, timers) = self.pipeline.gesture_parts();
                gesture.reset(timers);
                if on == self.checked() {
                    tracing::trace!(on, "swipe toward current state ignored");
                    return Ok(());
                }
                return self.flip(now, host);
            }
        }

        let swipe = Some(SwipeGuard::new(SwipeAxis::Vertical));
        match classify(&mut self.pipeline, event, now, swipe) {
            Some(kind) => self.on_interaction(kind, now, host),
            None => Ok(()),
        }
    }

    fn on_interaction(
        &mut self,
        kind: InteractionKind,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError> {
        match kind {
            InteractionKind::Tap => self.flip(now, host),
            other => self.pipeline.send_action(other, now, host).map(drop),
        }
    }

    fn detail(&self) -> ViewDetail {
        ViewDetail::Toggle {
            checked: self.checked(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::host::RecordingHost;
    use crate::pipeline::DispatchOutcome;
    use serde_json::json;
    use tilecraft_core::{EntityState, HostAction};

    fn service(host: &RecordingHost) -> Vec<String> {
        host.performed()
            .into_iter()
            .filter_map(|intent| match intent {
                HostAction::CallService {
                    domain, service, ..
                } => Some(format!("{domain}.{service}")),
                _ => None,
            })
            .collect()
    }

    fn tap(t: &mut super::super::Tile, at: Timestamp, host: &mut RecordingHost) {
        t.handle_input(InputEvent::press(10.0, 10.0), at, host).unwrap();
        t.handle_input(InputEvent::release(10.0, 10.0), at + 50, host).unwrap();
    }

    #[test]
    fn test_truthy_states() {
        assert!(is_checked(Some(&json!("on"))));
        assert!(is_checked(Some(&json!("Playing"))));
        assert!(is_checked(Some(&json!(true))));
        assert!(!is_checked(Some(&json!("off"))));
        assert!(!is_checked(Some(&json!("unavailable"))));
        assert!(!is_checked(None));
    }

    #[test]
    fn test_tap_turns_switch_on_and_reconciles() {
        let mut t = tile(json!({ "type": "toggle", "entity_id": "switch.x" }));
        let mut host = RecordingHost::new();
        t.set_hass(hass("switch.x", EntityState::new("off")), 0);
        assert_eq!(t.view().detail, ViewDetail::Toggle { checked: false });

        tap(&mut t, 100, &mut host);
        let performed = host.performed();
        let HostAction::CallService {
            domain,
            service,
            target,
            ..
        } = performed[0]
        else {
            panic!("expected a service call");
        };
        assert_eq!((domain.as_str(), service.as_str()), ("switch", "turn_on"));
        assert_eq!(target.get("entity_id"), Some(&json!("switch.x")));
        assert!(!t.pipeline().is_tracking());
        assert_eq!(t.view().detail, ViewDetail::Toggle { checked: true });

        // stale echo inside the window is ignored
        t.set_hass(hass("switch.x", EntityState::new("off")), 500);
        assert_eq!(t.view().detail, ViewDetail::Toggle { checked: true });

        t.advance(1_150, &mut host).unwrap();
        assert!(t.pipeline().is_tracking());
        assert_eq!(t.view().detail, ViewDetail::Toggle { checked: false });
    }

    #[test]
    fn test_swipe_commits_only_in_matching_direction() {
        let mut t = tile(json!({ "type": "toggle", "entity_id": "light.desk" }));
        let mut host = RecordingHost::new();
        t.set_hass(hass("light.desk", EntityState::new("off")), 0);

        // left swipe toward "off" while off: nothing
        t.handle_input(InputEvent::press(50.0, 10.0), 0, &mut host).unwrap();
        t.handle_input(InputEvent::move_to(10.0, 12.0), 20, &mut host).unwrap();
        t.handle_input(InputEvent::release(10.0, 12.0), 40, &mut host).unwrap();
        t.advance(500, &mut host).unwrap();
        assert!(service(&host).is_empty());

        // right swipe turns on
        t.handle_input(InputEvent::press(10.0, 10.0), 1_000, &mut host).unwrap();
        t.handle_input(InputEvent::move_to(60.0, 10.0), 1_020, &mut host).unwrap();
        t.handle_input(InputEvent::release(60.0, 10.0), 1_040, &mut host).unwrap();
        assert_eq!(service(&host), vec!["light.turn_on"]);
    }

    #[test]
    fn test_vertical_scroll_cancels() {
        let mut t = tile(json!({ "type": "toggle", "entity_id": "switch.x" }));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press(10.0, 10.0), 0, &mut host).unwrap();
        t.handle_input(InputEvent::move_to(12.0, 80.0), 20, &mut host).unwrap();
        t.handle_input(InputEvent::release(12.0, 80.0), 40, &mut host).unwrap();
        t.advance(1_000, &mut host).unwrap();
        assert!(host.performed().is_empty());
    }

    #[test]
    fn test_configured_tap_action_wins() {
        let mut t = tile(json!({
            "type": "toggle",
            "entity_id": "input_boolean.guest",
            "tap_action": {
                "action": "perform-action",
                "perform_action": "input_boolean.toggle"
            }
        }));
        let mut host = RecordingHost::new();
        tap(&mut t, 0, &mut host);
        assert_eq!(service(&host), vec!["input_boolean.toggle"]);
    }

    #[test]
    fn test_declined_confirmation_restores_state() {
        let mut t = tile(json!({
            "type": "toggle",
            "entity_id": "lock.front",
            "tap_action": {
                "action": "perform-action",
                "perform_action": "lock.unlock",
                "confirmation": true
            }
        }));
        let mut host = RecordingHost::new();
        t.set_hass(hass("lock.front", EntityState::new("locked")), 0);
        tap(&mut t, 0, &mut host);
        assert_eq!(t.view().detail, ViewDetail::Toggle { checked: false });

        let id = host.last_confirmation().unwrap().id;
        assert_eq!(t.confirm(id, false, 100, &mut host), Ok(DispatchOutcome::Skipped));
        assert_eq!(t.view().detail, ViewDetail::Toggle { checked: true });
        assert!(host.performed().is_empty());
    }
}
