//! Tilecraft Core
//!
//! Foundational pieces shared by every tilecraft widget:
//!
//! - **Configuration**: typed entries and cards, legacy normalization, entity auto-fill
//! - **Backend State**: immutable entity snapshots pushed in by the host
//! - **Value Resolution**: attribute paths with kind-specific transforms
//! - **Templates**: render contexts, the fail-soft rendering wrapper and a built-in evaluator
//! - **Actions**: action descriptors and the normalized intents handed to the host
//! - **Input**: pointer, keyboard and text events
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use tilecraft_core::{resolve, EntityState};
//!
//! let light = EntityState::new("on").with_attr("brightness", 128);
//! let resolved = resolve("light.kitchen", &light, Some("brightness"), 0);
//! assert_eq!(resolved.value, Some(json!(50)));
//! ```

pub mod action;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod listeners;
pub mod resolver;
pub mod state;
pub mod template;
pub mod time;

pub use action::{
    Action, ActionKind, Confirmation, ConfirmationDetails, Exemption, HostAction, InteractionKind,
};
pub use config::{normalize_config, CardConfig, Entry, InputType, ThumbKind, WidgetKind};
pub use engine::SimpleTemplates;
pub use error::{ConfigError, DispatchError, TemplateError};
pub use input::{
    InputEvent, Key, KeyState, KeyboardEvent, Modifiers, Part, PointerDeltas, PointerEvent,
    PointerKind, TileId,
};
pub use listeners::{ListenerHandle, OutsideClickRegistry};
pub use resolver::{resolve, AttributePath, Resolved, LIVE_REFRESH_MS};
pub use state::{domain_of, EntityState, HassSnapshot};
pub use template::{
    build_context, deep_render, render_string, render_template, ContextInputs, RenderContext,
    TemplateEngine,
};
pub use time::Timestamp;
