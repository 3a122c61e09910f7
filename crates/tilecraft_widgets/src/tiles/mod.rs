//! Tile variants
//!
//! Every variant owns a [`Pipeline`] and adds its own input handling on top.
//! [`Tile`] is the closed set of variants the host mounts; it routes the
//! lifecycle calls and drains due timers.

pub mod button;
pub mod defaults;
pub mod input;
pub mod options;
pub mod slider;
pub mod spinbox;
pub mod toggle;

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{Number, Value};
use tilecraft_core::template::{display, format_fixed};
use tilecraft_core::{
    ConfigError, DispatchError, Entry, HassSnapshot, InputEvent, InteractionKind, KeyState,
    OutsideClickRegistry, PointerEvent, TemplateEngine, TileId, Timestamp, WidgetKind,
};

use crate::gesture::SwipeGuard;
use crate::host::{ConfirmationId, HostBridge};
use crate::pipeline::{DispatchOutcome, Pipeline, TimerKind};
use crate::view::{TileView, ViewDetail};

pub use button::ButtonTile;
pub use input::InputTile;
pub use options::{OptionsMode, OptionsTile};
pub use slider::SliderTile;
pub use spinbox::SpinboxTile;
pub use toggle::ToggleTile;

/// Per-variant behavior layered on the shared pipeline
pub(crate) trait Variant {
    fn pipeline(&self) -> &Pipeline;

    fn pipeline_mut(&mut self) -> &mut Pipeline;

    /// Route one input event
    fn handle_input(
        &mut self,
        event: &InputEvent,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError>;

    /// A gesture timer produced an interaction
    fn on_interaction(
        &mut self,
        kind: InteractionKind,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError> {
        self.pipeline_mut().send_action(kind, now, host).map(drop)
    }

    /// The debounce timer came due
    fn on_debounce(&mut self, _at: Timestamp, _host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        Ok(())
    }

    /// Work deferred from outside the event path (outside clicks)
    fn poll(&mut self, _now: Timestamp, _host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        Ok(())
    }

    fn connect(&mut self, _registry: &OutsideClickRegistry) {}

    fn disconnect(&mut self) {}

    fn detail(&self) -> ViewDetail;
}

/// Route pointer and keyboard input through the gesture classifier
///
/// Gesture parameters are refreshed from the entry before each press so
/// templated timings see the current state.
pub(crate) fn classify(
    pipeline: &mut Pipeline,
    event: &InputEvent,
    now: Timestamp,
    swipe: Option<SwipeGuard>,
) -> Option<InteractionKind> {
    let is_press = match event {
        InputEvent::Pointer(PointerEvent::Down { .. }) => true,
        InputEvent::Keyboard(key) => key.state == KeyState::Pressed && !key.repeat,
        _ => false,
    };
    if is_press {
        let config = pipeline.gesture_config(swipe);
        pipeline.configure_gesture(config);
    }

    let (gesture, timers) = pipeline.gesture_parts();
    match event {
        InputEvent::Pointer(pointer) => gesture.handle_pointer(pointer, now, timers),
        InputEvent::Keyboard(key) => gesture.handle_key(key, now, timers),
        _ => None,
    }
}

/// A number as entities expect it: integral unless the step is fractional
pub(crate) fn number_json(value: f64, precision: Option<usize>) -> Value {
    match precision {
        Some(p) if p > 0 => format_fixed(value, p)
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or(Value::Null, Value::Number),
        _ => Value::Number(Number::from(value.trunc() as i64)),
    }
}

/// A mounted tile
#[derive(Debug)]
pub enum Tile {
    Button(ButtonTile),
    Toggle(ToggleTile),
    Slider(SliderTile),
    Options(OptionsTile),
    Input(InputTile),
    Spinbox(SpinboxTile),
}

impl Tile {
    /// Build the variant named by the entry's `type`
    pub fn from_entry(entry: Entry, engine: Arc<dyn TemplateEngine>) -> Result<Self, ConfigError> {
        let kind = entry.kind;
        let pipeline = Pipeline::new(entry, engine)?;
        let tile = match kind {
            WidgetKind::Button => Tile::Button(ButtonTile::new(pipeline)),
            WidgetKind::Toggle => Tile::Toggle(ToggleTile::new(pipeline)),
            WidgetKind::Slider => Tile::Slider(SliderTile::new(pipeline)),
            WidgetKind::Dropdown => Tile::Options(OptionsTile::new(pipeline, OptionsMode::Dropdown)),
            WidgetKind::Selector => Tile::Options(OptionsTile::new(pipeline, OptionsMode::Selector)),
            WidgetKind::Input => Tile::Input(InputTile::new(pipeline, false)?),
            WidgetKind::Textbox => Tile::Input(InputTile::new(pipeline, true)?),
            WidgetKind::Spinbox => Tile::Spinbox(SpinboxTile::new(pipeline)),
        };
        Ok(tile)
    }

    fn variant(&self) -> &dyn Variant {
        match self {
            Tile::Button(t) => t,
            Tile::Toggle(t) => t,
            Tile::Slider(t) => t,
            Tile::Options(t) => t,
            Tile::Input(t) => t,
            Tile::Spinbox(t) => t,
        }
    }

    fn variant_mut(&mut self) -> &mut dyn Variant {
        match self {
            Tile::Button(t) => t,
            Tile::Toggle(t) => t,
            Tile::Slider(t) => t,
            Tile::Options(t) => t,
            Tile::Input(t) => t,
            Tile::Spinbox(t) => t,
        }
    }

    pub fn id(&self) -> TileId {
        self.pipeline().id()
    }

    pub fn kind(&self) -> WidgetKind {
        self.pipeline().entry().kind
    }

    pub fn pipeline(&self) -> &Pipeline {
        self.variant().pipeline()
    }

    /// Mount: resume timers and subscribe to outside clicks
    pub fn connect(&mut self, registry: &OutsideClickRegistry) {
        let variant = self.variant_mut();
        variant.pipeline_mut().connect();
        variant.connect(registry);
    }

    /// Unmount: cancel timers, drop confirmations, release listeners
    pub fn disconnect(&mut self) {
        let variant = self.variant_mut();
        variant.disconnect();
        variant.pipeline_mut().disconnect();
    }

    /// Take a new backend snapshot; returns whether the displayed value changed
    pub fn set_hass(&mut self, hass: Arc<HassSnapshot>, now: Timestamp) -> bool {
        self.variant_mut().pipeline_mut().set_hass(hass, now)
    }

    /// Deliver one input event
    pub fn handle_input(
        &mut self,
        event: InputEvent,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError> {
        if !self.pipeline().is_connected() {
            tracing::trace!(id = ?self.id(), "input on disconnected tile ignored");
            return Ok(());
        }
        self.variant_mut().handle_input(&event, now, host)
    }

    /// Run every timer due at or before `now`, in deadline order
    pub fn advance(&mut self, now: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        let variant = self.variant_mut();
        if !variant.pipeline().is_connected() {
            return Ok(());
        }
        variant.poll(now, host)?;

        while let Some((kind, at)) = variant.pipeline_mut().pop_timer(now) {
            if kind == TimerKind::Debounce {
                variant.on_debounce(at, host)?;
                continue;
            }
            if let Some(interaction) = variant.pipeline_mut().on_timer(kind, at, host) {
                variant.on_interaction(interaction, at, host)?;
            }
        }
        Ok(())
    }

    /// Answer a confirmation prompt raised by this tile
    pub fn confirm(
        &mut self,
        id: ConfirmationId,
        accepted: bool,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.variant_mut().pipeline_mut().confirm(id, accepted, now, host)
    }

    /// Render the view model
    pub fn view(&self) -> TileView {
        let pipeline = self.pipeline();
        let entry = pipeline.entry();
        let render_opt = |raw: Option<&String>| {
            raw.map(|raw| pipeline.render_str(raw))
                .filter(|text| !text.is_empty())
        };

        let style: IndexMap<String, String> = entry
            .style
            .iter()
            .map(|(key, raw)| (key.clone(), display(&pipeline.render(raw))))
            .filter(|(_, value)| !value.is_empty())
            .collect();

        TileView {
            id: pipeline.id(),
            kind: entry.kind,
            entity_id: pipeline.entity_id(),
            label: render_opt(entry.label.as_ref()),
            icon: render_opt(entry.icon.as_ref()),
            unit: render_opt(entry.unit_of_measurement.as_ref()),
            style,
            styles: render_opt(entry.styles.as_ref()),
            value: pipeline.value_text(),
            tracking: pipeline.is_tracking(),
            detail: self.variant().detail(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use serde_json::Value;
    use tilecraft_core::{EntityState, Entry, HassSnapshot, SimpleTemplates};

    use super::Tile;

    pub fn tile(entry: Value) -> Tile {
        let entry = Entry::from_value(entry).unwrap();
        Tile::from_entry(entry, Arc::new(SimpleTemplates::new())).unwrap()
    }

    pub fn hass(entity: &str, state: EntityState) -> Arc<HassSnapshot> {
        Arc::new(HassSnapshot::new().with_entity(entity, state))
    }
}
