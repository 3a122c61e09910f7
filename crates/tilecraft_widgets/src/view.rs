//! Rendered view model
//!
//! What a tile hands to the host's presentation layer after rendering its
//! templates. Hosts diff these between renders; nothing in here is live.

use indexmap::IndexMap;
use serde::Serialize;
use tilecraft_core::{InputType, ThumbKind, TileId, WidgetKind};

/// Everything needed to draw one tile
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileView {
    pub id: TileId,
    pub kind: WidgetKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Rendered style properties
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub style: IndexMap<String, String>,
    /// Rendered raw CSS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles: Option<String>,
    /// Displayed value, precision applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Whether backend state currently drives the value
    pub tracking: bool,
    pub detail: ViewDetail,
}

/// Kind-specific part of a [`TileView`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewDetail {
    Button,
    Toggle {
        checked: bool,
    },
    Slider {
        /// Thumb position, 0 to 100
        percent: f64,
        thumb: ThumbKind,
        min: f64,
        max: f64,
        step: f64,
        dragging: bool,
    },
    Dropdown {
        open: bool,
        focused: Option<usize>,
        options: Vec<OptionView>,
    },
    Selector {
        focused: Option<usize>,
        options: Vec<OptionView>,
    },
    Input {
        /// Text being edited, if an edit is in progress
        draft: Option<String>,
        invalid: bool,
        input_type: InputType,
        placeholder: Option<String>,
        multiline: bool,
    },
    Spinbox {
        formatted: Option<String>,
        min: f64,
        max: f64,
        step: f64,
    },
}

/// One rendered dropdown or selector choice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionView {
    /// The value this option stands for
    pub option: String,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub selected: bool,
}
