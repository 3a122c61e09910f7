//! Input and textbox tiles
//!
//! Edits accumulate in a draft that is validated on every change. Enter
//! (single-line only), blur or an outside click commits a valid, changed
//! draft; Escape drops it and returns to the backend value.

use std::cell::Cell;
use std::rc::Rc;

use serde_json::Value;
use tilecraft_core::{
    ConfigError, DispatchError, InputEvent, InputType, InteractionKind, Key, KeyState,
    ListenerHandle, OutsideClickRegistry, PointerEvent, Timestamp,
};

use super::{defaults, Variant};
use crate::host::HostBridge;
use crate::pipeline::Pipeline;
use crate::validation::InputRules;
use crate::view::ViewDetail;

pub struct InputTile {
    pipeline: Pipeline,
    multiline: bool,
    rules: InputRules,
    draft: Option<String>,
    invalid: bool,
    focused: bool,
    outside_click: Rc<Cell<bool>>,
    listener: Option<ListenerHandle>,
}

impl std::fmt::Debug for InputTile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputTile")
            .field("pipeline", &self.pipeline)
            .field("multiline", &self.multiline)
            .field("draft", &self.draft)
            .field("invalid", &self.invalid)
            .finish()
    }
}

impl InputTile {
    pub fn new(pipeline: Pipeline, multiline: bool) -> Result<Self, ConfigError> {
        let entry = pipeline.entry();
        let input_type = entry
            .input_type
            .unwrap_or(if multiline { InputType::Textarea } else { InputType::Text });
        let mut rules = InputRules {
            min_length: entry.min_length,
            max_length: entry.max_length,
            ..InputRules::new(input_type)
        };
        if let Some(pattern) = &entry.pattern {
            rules = rules.with_pattern(pattern)?;
        }

        Ok(Self {
            pipeline,
            multiline,
            rules,
            draft: None,
            invalid: false,
            focused: false,
            outside_click: Rc::new(Cell::new(false)),
            listener: None,
        })
    }

    pub fn input_type(&self) -> InputType {
        self.rules.input_type
    }

    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    pub fn is_invalid(&self) -> bool {
        self.invalid
    }

    /// Validate against the rules with the range rendered now
    fn check(&self, text: &str) -> bool {
        let bounds = self
            .pipeline
            .entry()
            .range
            .as_ref()
            .map(|[min, max]| (self.pipeline.render(min), self.pipeline.render(max)));
        let rules = match bounds {
            Some((min, max)) => self.rules.clone().with_bounds(Some(min), Some(max)),
            None => self.rules.clone(),
        };
        rules.check(text)
    }

    fn edit(&mut self, text: &str) {
        self.invalid = !self.check(text);
        self.draft = Some(text.to_string());
        self.pipeline.hold_gate();
    }

    fn revert(&mut self, now: Timestamp, host: &mut dyn HostBridge) {
        tracing::trace!(id = ?self.pipeline.id(), "edit reverted");
        self.draft = None;
        self.invalid = false;
        self.pipeline.force_reset(now);
        host.request_render();
    }

    fn commit(&mut self, now: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        let Some(text) = self.draft.clone() else {
            return Ok(());
        };
        if !self.check(&text) {
            self.invalid = true;
            tracing::debug!(id = ?self.pipeline.id(), "invalid draft not committed");
            return Ok(());
        }
        self.draft = None;
        self.invalid = false;

        if self.pipeline.value_text().as_deref() == Some(text.as_str()) {
            self.pipeline.force_reset(now);
            return Ok(());
        }

        tracing::debug!(id = ?self.pipeline.id(), "input committed");
        self.pipeline.set_local_value(Some(Value::String(text.clone())));
        self.pipeline.suppress(now);

        let input_type = self.input_type();
        let (action, overrides) = match self.pipeline.entry().tap_action.clone() {
            Some(action) => (Some(action), None),
            None => (
                self.pipeline
                    .entity_id()
                    .map(|entity| defaults::input_action(&entity, input_type)),
                Some(defaults::value_override(defaults::input_value(input_type, &text))),
            ),
        };
        self.pipeline
            .send_resolved(action, InteractionKind::Tap, overrides, now, host)
            .map(drop)
    }

    fn blur(&mut self, now: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        // An invalid draft survives the blur, marker included
        self.focused = false;
        self.commit(now, host)
    }
}

impl Variant for InputTile {
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
            InputEvent::Focus | InputEvent::Pointer(PointerEvent::Down { .. }) => {
                self.focused = true;
                Ok(())
            }
            InputEvent::Edit(text) => {
                self.edit(text);
                Ok(())
            }
            InputEvent::Keyboard(key) if key.state == KeyState::Pressed => match key.key {
                Key::Escape => {
                    self.revert(now, host);
                    Ok(())
                }
                Key::Enter if !self.multiline => self.commit(now, host),
                _ => Ok(()),
            },
            InputEvent::Blur => self.blur(now, host),
            _ => Ok(()),
        }
    }

    fn poll(&mut self, now: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        if self.outside_click.replace(false) && self.focused {
            return self.blur(now, host);
        }
        Ok(())
    }

    fn connect(&mut self, registry: &OutsideClickRegistry) {
        let flag = self.outside_click.clone();
        self.listener = Some(registry.subscribe(self.pipeline.id(), move || flag.set(true)));
    }

    fn disconnect(&mut self) {
        self.listener = None;
        self.outside_click.set(false);
        self.draft = None;
        self.invalid = false;
        self.focused = false;
    }

    fn detail(&self) -> ViewDetail {
        ViewDetail::Input {
            draft: self.draft.clone(),
            invalid: self.invalid,
            input_type: self.input_type(),
            placeholder: self
                .pipeline
                .entry()
                .placeholder
                .as_deref()
                .map(|raw| self.pipeline.render_str(raw)),
            multiline: self.multiline,
        }
    }
}
