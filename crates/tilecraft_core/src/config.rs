//! Entry and card configuration
//!
//! Configuration arrives as a JSON tree (the host does any YAML parsing).
//! Loading runs in three steps:
//!
//! 1. [`normalize_config`] rewrites deprecated layouts in place
//! 2. serde deserializes into typed [`CardConfig`] / [`Entry`] values,
//!    rejecting unknown widget, action and thumb tags
//! 3. auto-fill back-fills missing entity ids from the enclosing context
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tilecraft_core::config::{CardConfig, WidgetKind};
//!
//! let card = CardConfig::from_value(json!({
//!     "entity_id": "light.kitchen",
//!     "buttons": [{ "type": "slider", "value_attribute": "brightness" }]
//! }))
//! .unwrap();
//!
//! assert_eq!(card.entries[0].kind, WidgetKind::Slider);
//! assert_eq!(card.entries[0].entity_id.as_deref(), Some("light.kitchen"));
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::action::{Action, ActionKind, InteractionKind};
use crate::error::{ConfigError, Result};

/// Widget kinds
///
/// An entry without `type` is a button; any other unknown tag is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    #[default]
    Button,
    Toggle,
    Slider,
    Dropdown,
    Selector,
    Input,
    Textbox,
    Spinbox,
}

/// Slider thumb styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbKind {
    #[default]
    Default,
    Line,
    Flat,
    Round,
}

/// Value types for input and textbox widgets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputType {
    #[default]
    Text,
    Password,
    Email,
    Url,
    Tel,
    Search,
    Number,
    Date,
    Time,
    DatetimeLocal,
    Week,
    Month,
    Color,
    /// Multi-line text (textbox only)
    Textarea,
}

impl InputType {
    /// Date and time types are validated as calendar values
    pub fn is_temporal(self) -> bool {
        matches!(
            self,
            InputType::Date
                | InputType::Time
                | InputType::DatetimeLocal
                | InputType::Week
                | InputType::Month
        )
    }

    /// Free text types are validated by length and pattern
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            InputType::Text
                | InputType::Password
                | InputType::Email
                | InputType::Url
                | InputType::Tel
                | InputType::Search
                | InputType::Textarea
        )
    }
}

/// One widget's declarative configuration
///
/// Options of dropdowns/selectors and the increment/decrement buttons of a
/// spinbox are nested entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entry {
    #[serde(rename = "type")]
    pub kind: WidgetKind,
    /// Target entity (template)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// Back-fill `entity_id` from the enclosing context (default on)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autofill_entity_id: Option<bool>,
    /// Attribute path for the displayed value (template), `state` if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_attribute: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tap_action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hold_action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_tap_action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub momentary_start_action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub momentary_end_action: Option<Action>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Style properties (values may be templates)
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub style: IndexMap<String, Value>,
    /// Raw CSS (template)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,

    /// `[min, max]`, numbers or templates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<[Value; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<ThumbKind>,

    /// Dropdown / selector choices
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Entry>,
    /// The value this entry stands for when it is an option
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,

    /// Input / textbox value type
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_type: Option<InputType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Spinbox button overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<Box<Entry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decrement: Option<Box<Entry>>,
    /// Spinbox dispatch debounce in ms (number or template)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_time: Option<Value>,

    /// Haptic feedback flag (bool or template)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub haptics: Option<Value>,
    /// Delay before backend state is trusted again after a local change (ms)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_from_hass_delay: Option<Value>,
}

impl Entry {
    /// An empty entry of the given kind
    pub fn new(kind: WidgetKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    /// Parse a single entry, normalizing legacy fields first
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Err(ConfigError::Missing);
        }
        let mut value = value;
        normalize_entry(&mut value);
        let entry: Entry = serde_json::from_value(value)?;
        entry.validate()?;
        Ok(entry)
    }

    /// Resolve the action for an interaction
    ///
    /// `hold` and `double_tap` fall back to `tap`; momentary actions have no
    /// fallback.
    pub fn action_for(&self, kind: InteractionKind) -> Option<&Action> {
        match kind {
            InteractionKind::Tap => self.tap_action.as_ref(),
            InteractionKind::Hold => self.hold_action.as_ref().or(self.tap_action.as_ref()),
            InteractionKind::DoubleTap => self
                .double_tap_action
                .as_ref()
                .or(self.tap_action.as_ref()),
            InteractionKind::MomentaryStart => self.momentary_start_action.as_ref(),
            InteractionKind::MomentaryEnd => self.momentary_end_action.as_ref(),
        }
    }

    /// Whether any action at all is configured
    pub fn has_actions(&self) -> bool {
        self.tap_action.is_some()
            || self.hold_action.is_some()
            || self.double_tap_action.is_some()
            || self.momentary_start_action.is_some()
            || self.momentary_end_action.is_some()
    }

    /// Structural checks beyond what serde enforces
    pub fn validate(&self) -> Result<()> {
        if let Some([min, max]) = &self.range {
            if let (Some(min), Some(max)) = (min.as_f64(), max.as_f64()) {
                if min >= max {
                    return Err(ConfigError::InvalidRange { min, max });
                }
            }
        }
        if let Some(step) = self.step.as_ref().and_then(Value::as_f64) {
            if !step.is_finite() || step <= 0.0 {
                return Err(ConfigError::InvalidStep(step));
            }
        }
        if let Some(pattern) = &self.pattern {
            regex::Regex::new(pattern)?;
        }
        for option in &self.options {
            option.validate()?;
        }
        for sub in [&self.increment, &self.decrement].into_iter().flatten() {
            sub.validate()?;
        }
        Ok(())
    }

    /// Back-fill missing entity ids from `parent_entity`
    ///
    /// Runs once at load time; the filled id is then fixed for the widget's
    /// lifetime. Nested options and spinbox buttons inherit this entry's
    /// entity, and entity-less service calls target it.
    pub fn autofill(&mut self, parent_entity: Option<&str>) {
        if self.autofill_entity_id == Some(false) {
            return;
        }
        if self.entity_id.is_none() {
            self.entity_id = parent_entity.map(str::to_string);
        }
        let Some(entity) = self.entity_id.clone() else {
            return;
        };

        for action in [
            &mut self.tap_action,
            &mut self.hold_action,
            &mut self.double_tap_action,
            &mut self.momentary_start_action,
            &mut self.momentary_end_action,
        ]
        .into_iter()
        .flatten()
        {
            match action.action {
                // any explicit target, even one without entity_id, is kept
                ActionKind::PerformAction
                    if action.target.is_none()
                        && !action.has_entity_target()
                        && !matches!(action.data, Some(Value::String(_))) =>
                {
                    let mut target = Map::new();
                    target.insert("entity_id".into(), Value::String(entity.clone()));
                    action.target = Some(Value::Object(target));
                }
                ActionKind::MoreInfo if action.entity.is_none() => {
                    action.entity = Some(entity.clone());
                }
                _ => {}
            }
        }

        for option in &mut self.options {
            option.autofill(Some(&entity));
        }
        for sub in [&mut self.increment, &mut self.decrement].into_iter().flatten() {
            sub.autofill(Some(&entity));
        }
    }
}

/// A card: a row of entries sharing a default entity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub entries: Vec<Entry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,
}

impl CardConfig {
    /// Normalize, deserialize, validate and auto-fill a card
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ConfigError::Missing);
        }
        let value = normalize_config(value);
        if value.get("entries").map_or(true, Value::is_null) {
            return Err(ConfigError::MissingField("entries"));
        }

        let mut card: CardConfig = serde_json::from_value(value)?;
        for entry in &mut card.entries {
            entry.validate()?;
            entry.autofill(card.entity_id.as_deref());
        }
        tracing::debug!(entries = card.entries.len(), "card configuration loaded");
        Ok(card)
    }
}

/// Flat style fields from older configurations
const LEGACY_STYLE_FIELDS: &[&str] = &[
    "color",
    "opacity",
    "icon_color",
    "label_color",
    "background_color",
    "background_opacity",
    "flex_basis",
];

/// Rewrite deprecated configuration layouts
///
/// - top-level `buttons` becomes `entries`
/// - legacy flat style fields move into each entry's `style` map
///   (explicit `style` keys win)
/// - legacy `service` / `service_data` on actions become
///   `perform_action` / `data`, and `call-service` becomes `perform-action`
pub fn normalize_config(mut value: Value) -> Value {
    if let Some(card) = value.as_object_mut() {
        if !card.contains_key("entries") {
            if let Some(buttons) = card.remove("buttons") {
                tracing::debug!("renaming legacy `buttons` to `entries`");
                card.insert("entries".into(), buttons);
            }
        }
        if let Some(Value::Array(entries)) = card.get_mut("entries") {
            for entry in entries {
                normalize_entry(entry);
            }
        }
    }
    value
}

/// Normalize one entry (and its nested entries)
pub fn normalize_entry(entry: &mut Value) {
    let Some(fields) = entry.as_object_mut() else {
        return;
    };

    let mut folded = Map::new();
    for &name in LEGACY_STYLE_FIELDS {
        if let Some(value) = fields.remove(name) {
            folded.insert(name.replace('_', "-"), value);
        }
    }
    if !folded.is_empty() {
        let style = fields
            .entry("style")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Some(style) = style.as_object_mut() {
            for (name, value) in folded {
                style.entry(name).or_insert(value);
            }
        }
    }

    for key in [
        "tap_action",
        "hold_action",
        "double_tap_action",
        "momentary_start_action",
        "momentary_end_action",
    ] {
        if let Some(Value::Object(action)) = fields.get_mut(key) {
            normalize_action(action);
        }
    }

    if let Some(Value::Array(options)) = fields.get_mut("options") {
        for option in options {
            normalize_entry(option);
        }
    }
    for key in ["increment", "decrement"] {
        if let Some(sub) = fields.get_mut(key) {
            normalize_entry(sub);
        }
    }
}

fn normalize_action(action: &mut Map<String, Value>) {
    if action.get("action").and_then(Value::as_str) == Some("call-service") {
        action.insert("action".into(), Value::String("perform-action".into()));
    }
    if !action.contains_key("perform_action") {
        if let Some(service) = action.remove("service") {
            action.insert("perform_action".into(), service);
        }
    }
    if !action.contains_key("data") {
        if let Some(data) = action.remove("service_data") {
            action.insert("data".into(), data);
        }
    }
}
