//! Dropdown and selector tiles
//!
//! Both pick one of the entry's options. A dropdown has an open/closed list
//! that collapses on an outside click; a selector shows every option at once.
//! Arrow keys move focus between options and wrap at the ends.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::{Map, Value};
use tilecraft_core::{
    DispatchError, Entry, InputEvent, InteractionKind, Key, KeyState, ListenerHandle,
    OutsideClickRegistry, Part, PointerEvent, Timestamp,
};

use super::{defaults, Variant};
use crate::host::{HapticKind, HostBridge};
use crate::pipeline::Pipeline;
use crate::view::{OptionView, ViewDetail};

/// How the options are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsMode {
    Dropdown,
    Selector,
}

pub struct OptionsTile {
    pipeline: Pipeline,
    mode: OptionsMode,
    open: Rc<Cell<bool>>,
    focused: Option<usize>,
    listener: Option<ListenerHandle>,
}

impl std::fmt::Debug for OptionsTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionsTile")
            .field("pipeline", &self.pipeline)
            .field("mode", &self.mode)
            .field("open", &self.open.get())
            .field("focused", &self.focused)
            .finish()
    }
}

impl OptionsTile {
    pub fn new(pipeline: Pipeline, mode: OptionsMode) -> Self {
        Self {
            pipeline,
            mode,
            open: Rc::new(Cell::new(false)),
            focused: None,
            listener: None,
        }
    }

    pub fn mode(&self) -> OptionsMode {
        self.mode
    }

    /// Whether the dropdown list is showing (always true for a selector)
    pub fn is_open(&self) -> bool {
        self.mode == OptionsMode::Selector || self.open.get()
    }

    fn options(&self) -> &[Entry] {
        &self.pipeline.entry().options
    }

    /// The value option `index` stands for
    fn option_value(&self, index: usize) -> Option<String> {
        let option = self.options().get(index)?;
        let value = option
            .option
            .as_deref()
            .or(option.label.as_deref())
            .map(|raw| self.pipeline.render_str(raw))
            .unwrap_or_else(|| index.to_string());
        Some(value)
    }

    fn selected_index(&self) -> Option<usize> {
        let current = self.pipeline.value_text()?;
        (0..self.options().len()).find(|&i| self.option_value(i).as_deref() == Some(current.as_str()))
    }

    fn set_open(&mut self, open: bool) {
        if self.mode == OptionsMode::Selector {
            return;
        }
        if open && !self.open.get() {
            self.focused = self.selected_index().or(Some(0));
        }
        self.open.set(open);
    }

    fn move_focus(&mut self, forward: bool) {
        let len = self.options().len();
        if len == 0 {
            return;
        }
        self.focused = Some(match (self.focused, forward) {
            (None, true) => 0,
            (None, false) => len - 1,
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
        });
    }

    fn select(&mut self, index: usize, now: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        let Some(option) = self.options().get(index).cloned() else {
            return Ok(());
        };
        let Some(value) = self.option_value(index) else {
            return Ok(());
        };
        tracing::debug!(id = ?self.pipeline.id(), option = %value, "option selected");

        self.pipeline.set_local_value(Some(Value::String(value.clone())));
        self.pipeline.suppress(now);
        self.focused = Some(index);
        self.set_open(false);
        self.pipeline.haptic(HapticKind::Selection, host);

        let entity = option
            .entity_id
            .as_deref()
            .map(|raw| self.pipeline.render_str(raw))
            .filter(|e| !e.is_empty())
            .or_else(|| self.pipeline.entity_id());
        let action = option
            .tap_action
            .or_else(|| self.pipeline.entry().tap_action.clone())
            .or_else(|| entity.map(|e| defaults::select_action(&e)));

        let mut overrides = Map::new();
        overrides.insert("option".into(), Value::String(value));
        self.pipeline
            .send_resolved(action, InteractionKind::Tap, Some(overrides), now, host)
            .map(drop)
    }

    fn handle_key(&mut self, key: &Key, now: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        if !self.is_open() {
            if matches!(key, Key::Enter | Key::Space | Key::ArrowDown | Key::ArrowUp) {
                self.set_open(true);
            }
            return Ok(());
        }
        match key {
            Key::ArrowDown | Key::ArrowRight => self.move_focus(true),
            Key::ArrowUp | Key::ArrowLeft => self.move_focus(false),
            Key::Home if !self.options().is_empty() => self.focused = Some(0),
            Key::End if !self.options().is_empty() => self.focused = Some(self.options().len() - 1),
            Key::Enter | Key::Space => {
                if let Some(index) = self.focused {
                    return self.select(index, now, host);
                }
            }
            Key::Escape | Key::Tab => self.set_open(false),
            _ => {}
        }
        Ok(())
    }
}

impl Variant for OptionsTile {
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
            InputEvent::Pointer(PointerEvent::Down { part, .. }) => match *part {
                Part::Option(index) if self.is_open() => self.select(index, now, host),
                Part::Body => {
                    let open = self.is_open();
                    self.set_open(!open);
                    Ok(())
                }
                _ => Ok(()),
            },
            InputEvent::Keyboard(key) if key.state == KeyState::Pressed => {
                self.handle_key(&key.key, now, host)
            }
            InputEvent::Blur => {
                self.set_open(false);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn connect(&mut self, registry: &OutsideClickRegistry) {
        if self.mode != OptionsMode::Dropdown {
            return;
        }
        let open = self.open.clone();
        self.listener = Some(registry.subscribe(self.pipeline.id(), move || open.set(false)));
    }

    fn disconnect(&mut self) {
        self.listener = None;
        self.open.set(false);
    }

    fn detail(&self) -> ViewDetail {
        let selected = self.selected_index();
        let options = self
            .options()
            .iter()
            .enumerate()
            .map(|(i, option)| {
                let value = self.option_value(i).unwrap_or_default();
                OptionView {
                    label: option
                        .label
                        .as_deref()
                        .map(|raw| self.pipeline.render_str(raw))
                        .unwrap_or_else(|| value.clone()),
                    icon: option.icon.as_deref().map(|raw| self.pipeline.render_str(raw)),
                    selected: selected == Some(i),
                    option: value,
                }
            })
            .collect();

        match self.mode {
            OptionsMode::Dropdown => ViewDetail::Dropdown {
                open: self.open.get(),
                focused: self.focused,
                options,
            },
            OptionsMode::Selector => ViewDetail::Selector {
                focused: self.focused,
                options,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::super::Tile;
    use super::*;
    use crate::host::RecordingHost;
    use serde_json::json;
    use tilecraft_core::{EntityState, HostAction};

    fn dropdown() -> Tile {
        tile(json!({
            "type": "dropdown",
            "entity_id": "input_select.mode",
            "haptics": true,
            "options": [
                { "option": "eco", "label": "Eco" },
                { "option": "comfort" },
                { "option": "boost", "icon": "mdi:fire" }
            ]
        }))
    }

    fn is_open(t: &Tile) -> bool {
        match t.view().detail {
            ViewDetail::Dropdown { open, .. } => open,
            other => panic!("expected dropdown, got {other:?}"),
        }
    }

    fn selected_options(host: &RecordingHost) -> Vec<Value> {
        host.performed()
            .into_iter()
            .filter_map(|intent| match intent {
                HostAction::CallService { service, data, .. } if service == "select_option" => {
                    data.get("option").cloned()
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_outside_click_closes() {
        let registry = OutsideClickRegistry::new();
        let mut t = dropdown();
        let mut host = RecordingHost::new();
        t.connect(&registry);

        t.handle_input(InputEvent::press(0.0, 0.0), 0, &mut host).unwrap();
        assert!(is_open(&t));
        registry.dispatch_click(Some(t.id()));
        assert!(is_open(&t));
        registry.dispatch_click(None);
        assert!(!is_open(&t));
    }

    #[test]
    fn test_listener_released_on_disconnect() {
        let registry = OutsideClickRegistry::new();
        let mut t = dropdown();
        for _ in 0..5 {
            t.connect(&registry);
            assert_eq!(registry.len(), 1);
            t.disconnect();
        }
        assert!(registry.is_empty());
    }

    #[test]
    fn test_keyboard_navigation_wraps_and_selects() {
        let mut t = dropdown();
        let mut host = RecordingHost::new();
        t.set_hass(hass("input_select.mode", EntityState::new("comfort")), 0);

        t.handle_input(InputEvent::key_down(Key::Enter), 0, &mut host).unwrap();
        let ViewDetail::Dropdown { open, focused, .. } = t.view().detail else {
            panic!("expected dropdown");
        };
        assert!(open);
        assert_eq!(focused, Some(1));

        t.handle_input(InputEvent::key_down(Key::ArrowDown), 10, &mut host).unwrap();
        t.handle_input(InputEvent::key_down(Key::ArrowDown), 20, &mut host).unwrap();
        t.handle_input(InputEvent::key_down(Key::Enter), 30, &mut host).unwrap();

        assert_eq!(selected_options(&host), vec![json!("eco")]);
        assert!(!is_open(&t));
        assert!(host.haptics().contains(&HapticKind::Selection));
        assert_eq!(t.view().value.as_deref(), Some("eco"));
    }

    #[test]
    fn test_arrow_up_wraps_to_last() {
        let mut t = dropdown();
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::key_down(Key::ArrowDown), 0, &mut host).unwrap();
        t.handle_input(InputEvent::key_down(Key::ArrowUp), 10, &mut host).unwrap();
        let ViewDetail::Dropdown { focused, .. } = t.view().detail else {
            panic!("expected dropdown");
        };
        assert_eq!(focused, Some(2));

        t.handle_input(InputEvent::key_down(Key::Escape), 20, &mut host).unwrap();
        assert!(!is_open(&t));
        assert!(host.performed().is_empty());
    }

    #[test]
    fn test_closed_dropdown_ignores_option_clicks() {
        let mut t = dropdown();
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press_part(0.0, 0.0, Part::Option(2)), 0, &mut host)
            .unwrap();
        assert!(host.performed().is_empty());

        t.handle_input(InputEvent::press(0.0, 0.0), 10, &mut host).unwrap();
        t.handle_input(InputEvent::press_part(0.0, 0.0, Part::Option(2)), 20, &mut host)
            .unwrap();
        assert_eq!(selected_options(&host), vec![json!("boost")]);
    }

    #[test]
    fn test_option_action_sees_option_override() {
        let mut t = tile(json!({
            "type": "selector",
            "entity_id": "media_player.den",
            "options": [
                {
                    "option": "radio",
                    "tap_action": {
                        "action": "perform-action",
                        "perform_action": "media_player.select_source",
                        "data": { "source": "{{ option | upper }}" }
                    }
                },
                { "option": "tv" }
            ]
        }));
        let mut host = RecordingHost::new();
        t.handle_input(InputEvent::press_part(0.0, 0.0, Part::Option(0)), 0, &mut host)
            .unwrap();

        let performed = host.performed();
        let HostAction::CallService {
            service,
            data,
            target,
            ..
        } = performed[0]
        else {
            panic!("expected a service call");
        };
        assert_eq!(service, "select_source");
        assert_eq!(data.get("source"), Some(&json!("RADIO")));
        assert_eq!(target.get("entity_id"), Some(&json!("media_player.den")));

        let ViewDetail::Selector { options, .. } = t.view().detail else {
            panic!("expected selector");
        };
        assert!(options[0].selected);
        assert!(!options[1].selected);
        assert_eq!(options[1].label, "tv");
    }
}
