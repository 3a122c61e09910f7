//! Tilecraft Widgets
//!
//! Dashboard tiles driven by an explicit, host-ticked interaction pipeline.
//!
//! # Architecture
//!
//! Every tile is built on three pieces:
//!
//! 1. **The pipeline** ([`Pipeline`]): value resolution, template rendering,
//!    action dispatch with confirmation, and the reconciliation gate that
//!    keeps stale backend echoes from overwriting local edits.
//!
//! 2. **The gesture classifier** ([`GestureClassifier`]): an FSM turning
//!    pointer and keyboard input into tap, hold, double tap and momentary
//!    interactions.
//!
//! 3. **The host bridge** ([`HostBridge`]): the only way out of a widget.
//!    Service calls, prompts, haptics and render requests all go through it.
//!
//! Nothing here owns a clock. The host delivers input with a timestamp and
//! calls [`Tile::advance`] from its event loop; timers come due there.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use serde_json::json;
//! use tilecraft_core::{EntityState, HassSnapshot, InputEvent, SimpleTemplates};
//! use tilecraft_widgets::{RecordingHost, Tile};
//!
//! let entry = tilecraft_core::Entry::from_value(json!({
//!     "type": "toggle",
//!     "entity_id": "switch.fan"
//! }))
//! .unwrap();
//! let mut tile = Tile::from_entry(entry, Arc::new(SimpleTemplates::new())).unwrap();
//! let mut host = RecordingHost::new();
//!
//! let hass = HassSnapshot::new().with_entity("switch.fan", EntityState::new("off"));
//! tile.set_hass(Arc::new(hass), 0);
//!
//! tile.handle_input(InputEvent::press(10.0, 10.0), 0, &mut host).unwrap();
//! tile.handle_input(InputEvent::release(10.0, 10.0), 50, &mut host).unwrap();
//! assert_eq!(host.performed().len(), 1);
//! ```

pub mod card;
pub mod gesture;
pub mod host;
pub mod pipeline;
pub mod reconcile;
pub mod tiles;
pub mod validation;
pub mod view;

pub use card::Card;
pub use gesture::{
    GestureClassifier, GestureConfig, GesturePhase, HoldMode, SwipeAxis, SwipeGuard,
};
pub use host::{
    ConfirmationId, ConfirmationRequest, HapticKind, HostBridge, HostCall, RecordingHost,
};
pub use pipeline::{DispatchOutcome, Pipeline, TimerKind};
pub use reconcile::Reconciler;
pub use tiles::Tile;
pub use validation::{parse_temporal, InputRules, NumberConstraints};
pub use view::{OptionView, TileView, ViewDetail};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::card::Card;
    pub use crate::host::{HapticKind, HostBridge, RecordingHost};
    pub use crate::pipeline::DispatchOutcome;
    pub use crate::tiles::Tile;
    pub use crate::view::{TileView, ViewDetail};
}
