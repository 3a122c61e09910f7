//! Button tile: tap, hold, double tap and momentary actions, no value

use tilecraft_core::{DispatchError, InputEvent, Timestamp};

use super::{classify, Variant};
use crate::gesture::{SwipeAxis, SwipeGuard};
use crate::host::HostBridge;
use crate::pipeline::Pipeline;
use crate::view::ViewDetail;

#[derive(Debug)]
pub struct ButtonTile {
    pipeline: Pipeline,
}

impl ButtonTile {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }
}

impl Variant for ButtonTile {
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
        let swipe = Some(SwipeGuard::new(SwipeAxis::Any));
        match classify(&mut self.pipeline, event, now, swipe) {
            Some(kind) => self.on_interaction(kind, now, host),
            None => Ok(()),
        }
    }

    fn detail(&self) -> ViewDetail {
        ViewDetail::Button
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use crate::host::{HapticKind, RecordingHost};
    use serde_json::json;
    use tilecraft_core::{HostAction, InputEvent, Key, PointerEvent, PointerKind};

    fn paths(host: &RecordingHost) -> Vec<String> {
        host.performed()
            .into_iter()
            .map(|intent| match intent {
                HostAction::Navigate { path, .. } => path.clone(),
                other => format!("{other:?}"),
            })
            .collect()
    }

    fn nav_button(extra: serde_json::Value) -> super::super::Tile {
        let mut entry = json!({
            "tap_action": { "action": "navigate", "navigation_path": "tap" },
            "hold_action": { "action": "navigate", "navigation_path": "hold" },
            "double_tap_action": { "action": "navigate", "navigation_path": "double" }
        });
        if let (Some(base), Some(extra)) = (entry.as_object_mut(), extra.as_object()) {
            base.extend(extra.clone());
        }
        tile(entry)
    }

    #[test]
    fn test_short_press_taps_after_double_tap_window() {
        let mut t = nav_button(json!({}));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press(5.0, 5.0), 0, &mut host).unwrap();
        t.handle_input(InputEvent::release(5.0, 5.0), 100, &mut host).unwrap();
        assert!(host.performed().is_empty());

        t.advance(299, &mut host).unwrap();
        assert!(host.performed().is_empty());
        t.advance(300, &mut host).unwrap();
        assert_eq!(paths(&host), vec!["tap"]);
    }

    #[test]
    fn test_double_tap() {
        let mut t = nav_button(json!({}));
        let mut host = RecordingHost::new();
        for (down, up) in [(0, 50), (120, 160)] {
            t.handle_input(InputEvent::press(0.0, 0.0), down, &mut host).unwrap();
            t.advance(up, &mut host).unwrap();
            t.handle_input(InputEvent::release(0.0, 0.0), up, &mut host).unwrap();
        }
        t.advance(1_000, &mut host).unwrap();
        assert_eq!(paths(&host), vec!["double"]);
    }

    #[test]
    fn test_hold_excludes_tap() {
        let mut t = nav_button(json!({}));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press(0.0, 0.0), 0, &mut host).unwrap();
        t.advance(500, &mut host).unwrap();
        t.handle_input(InputEvent::release(0.0, 0.0), 700, &mut host).unwrap();
        t.advance(2_000, &mut host).unwrap();
        assert_eq!(paths(&host), vec!["hold"]);
    }

    #[test]
    fn test_swipe_suppresses_everything() {
        let mut t = nav_button(json!({}));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press(0.0, 0.0), 0, &mut host).unwrap();
        t.handle_input(InputEvent::move_to(40.0, 0.0), 20, &mut host).unwrap();
        t.handle_input(InputEvent::move_to(0.0, 0.0), 40, &mut host).unwrap();
        t.handle_input(InputEvent::release(0.0, 0.0), 60, &mut host).unwrap();
        t.advance(5_000, &mut host).unwrap();
        assert!(host.performed().is_empty());
    }

    #[test]
    fn test_repeat_hold_fires_tap_until_release() {
        let mut t = tile(json!({
            "tap_action": { "action": "navigate", "navigation_path": "tap" },
            "hold_action": { "action": "repeat", "hold_time": 300, "repeat_delay": 100 }
        }));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press(0.0, 0.0), 0, &mut host).unwrap();
        t.advance(650, &mut host).unwrap();
        // repeats at 400, 500, 600
        assert_eq!(paths(&host).len(), 3);
        t.handle_input(InputEvent::release(0.0, 0.0), 650, &mut host).unwrap();
        t.advance(2_000, &mut host).unwrap();
        assert_eq!(paths(&host).len(), 3);
    }

    #[test]
    fn test_momentary_pair_with_hold_secs() {
        let mut t = tile(json!({
            "momentary_start_action": { "action": "navigate", "navigation_path": "start" },
            "momentary_end_action": {
                "action": "navigate",
                "navigation_path": "end-{{ hold_secs }}"
            }
        }));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press(0.0, 0.0), 1_000, &mut host).unwrap();
        t.handle_input(InputEvent::release(0.0, 0.0), 3_500, &mut host).unwrap();
        assert_eq!(paths(&host), vec!["start", "end-2.5"]);
    }

    #[test]
    fn test_mouse_leave_ends_momentary() {
        let mut t = tile(json!({
            "momentary_start_action": { "action": "navigate", "navigation_path": "start" },
            "momentary_end_action": { "action": "navigate", "navigation_path": "end" }
        }));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press(0.0, 0.0), 0, &mut host).unwrap();
        let leave = InputEvent::Pointer(PointerEvent::Left {
            pointer: PointerKind::Mouse,
        });
        t.handle_input(leave, 100, &mut host).unwrap();
        t.handle_input(InputEvent::release(0.0, 0.0), 200, &mut host).unwrap();
        assert_eq!(paths(&host), vec!["start", "end"]);
    }

    #[test]
    fn test_keyboard_activation() {
        let mut t = tile(json!({
            "haptics": true,
            "tap_action": { "action": "navigate", "navigation_path": "tap" }
        }));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::key_down(Key::Enter), 0, &mut host).unwrap();
        t.handle_input(InputEvent::key_up(Key::Enter), 30, &mut host).unwrap();
        t.handle_input(InputEvent::key_down(Key::Character('a')), 40, &mut host).unwrap();
        assert_eq!(paths(&host), vec!["tap"]);
        assert_eq!(host.haptics(), vec![HapticKind::Light]);
    }

    #[test]
    fn test_templated_hold_time() {
        let mut t = tile(json!({
            "entity_id": "input_number.delay",
            "tap_action": { "action": "navigate", "navigation_path": "tap" },
            "hold_action": {
                "action": "navigate",
                "navigation_path": "hold",
                "hold_time": "{{ states('input_number.delay') | int }}"
            }
        }));
        t.set_hass(hass("input_number.delay", tilecraft_core::EntityState::new("1000")), 0);
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press(0.0, 0.0), 0, &mut host).unwrap();
        t.advance(900, &mut host).unwrap();
        t.handle_input(InputEvent::release(0.0, 0.0), 900, &mut host).unwrap();
        assert_eq!(paths(&host), vec!["tap"]);
    }

    #[cfg(feature = "eval")]
    #[test]
    fn test_eval_action_reaches_host() {
        use crate::host::HostCall;

        let mut t = tile(json!({
            "tap_action": { "action": "eval", "eval": "console.log(value)" }
        }));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press(0.0, 0.0), 0, &mut host).unwrap();
        t.handle_input(InputEvent::release(0.0, 0.0), 10, &mut host).unwrap();
        assert_eq!(
            host.calls(),
            &[HostCall::Eval {
                expression: "console.log(value)".into()
            }]
        );
    }
}
