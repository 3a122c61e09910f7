//! Card: a row of tiles sharing one outside-click registry
//!
//! The card is what a host mounts. It builds a tile per entry, routes input
//! to the tile that was hit and tells every other tile about the click.

use std::sync::Arc;

use serde_json::Value;
use tilecraft_core::{
    CardConfig, ConfigError, DispatchError, HassSnapshot, InputEvent, OutsideClickRegistry,
    PointerEvent, TemplateEngine, TileId, Timestamp,
};

use crate::host::{ConfirmationId, HostBridge};
use crate::pipeline::DispatchOutcome;
use crate::tiles::Tile;
use crate::view::TileView;

pub struct Card {
    tiles: Vec<Tile>,
    registry: OutsideClickRegistry,
    styles: Option<String>,
}

impl std::fmt::Debug for Card {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Card")
            .field("tiles", &self.tiles)
            .field("listeners", &self.registry.len())
            .field("styles", &self.styles)
            .finish()
    }
}

impl Card {
    /// Build every tile of a loaded card
    ///
    /// Tiles start connected but not subscribed; call [`Card::connect`]
    /// once the card is mounted.
    pub fn from_config(config: CardConfig, engine: Arc<dyn TemplateEngine>) -> Result<Self, ConfigError> {
        let tiles = config
            .entries
            .into_iter()
            .map(|entry| Tile::from_entry(entry, engine.clone()))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(tiles = tiles.len(), "card built");
        Ok(Self {
            tiles,
            registry: OutsideClickRegistry::new(),
            styles: config.styles,
        })
    }

    /// Normalize, validate and build a card from raw JSON
    pub fn from_value(value: Value, engine: Arc<dyn TemplateEngine>) -> Result<Self, ConfigError> {
        Self::from_config(CardConfig::from_value(value)?, engine)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, index: usize) -> Option<&Tile> {
        self.tiles.get(index)
    }

    pub fn tile_mut(&mut self, index: usize) -> Option<&mut Tile> {
        self.tiles.get_mut(index)
    }

    pub fn styles(&self) -> Option<&str> {
        self.styles.as_deref()
    }

    pub fn registry(&self) -> &OutsideClickRegistry {
        &self.registry
    }

    pub fn connect(&mut self) {
        for tile in &mut self.tiles {
            tile.connect(&self.registry);
        }
    }

    pub fn disconnect(&mut self) {
        for tile in &mut self.tiles {
            tile.disconnect();
        }
    }

    /// Push a snapshot to every tile; returns whether any displayed value changed
    pub fn set_hass(&mut self, hass: Arc<HassSnapshot>, now: Timestamp) -> bool {
        self.tiles
            .iter_mut()
            .fold(false, |changed, tile| tile.set_hass(hass.clone(), now) | changed)
    }

    /// Deliver input aimed at the tile at `index`
    ///
    /// A press is announced to the registry first, so other tiles see it as
    /// an outside click.
    pub fn handle_input(
        &mut self,
        index: usize,
        event: InputEvent,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<(), DispatchError> {
        let Some(tile) = self.tiles.get_mut(index) else {
            tracing::warn!(index, "input for unknown tile ignored");
            return Ok(());
        };
        if matches!(event, InputEvent::Pointer(PointerEvent::Down { .. })) {
            self.registry.dispatch_click(Some(tile.id()));
        }
        tile.handle_input(event, now, host)
    }

    /// A click that landed outside every tile
    pub fn click_outside(&self) {
        self.registry.dispatch_click(None);
    }

    /// Advance every tile; the first error is returned after all tiles ran
    pub fn advance(&mut self, now: Timestamp, host: &mut dyn HostBridge) -> Result<(), DispatchError> {
        let mut first_error = None;
        for tile in &mut self.tiles {
            if let Err(err) = tile.advance(now, host) {
                tracing::warn!(id = ?tile.id(), %err, "tile failed while advancing");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Answer a confirmation prompt raised by the tile `tile_id`
    pub fn confirm(
        &mut self,
        tile_id: TileId,
        id: ConfirmationId,
        accepted: bool,
        now: Timestamp,
        host: &mut dyn HostBridge,
    ) -> Result<DispatchOutcome, DispatchError> {
        let tile = self
            .tiles
            .iter_mut()
            .find(|tile| tile.id() == tile_id)
            .ok_or(DispatchError::UnknownConfirmation)?;
        tile.confirm(id, accepted, now, host)
    }

    pub fn views(&self) -> Vec<TileView> {
        self.tiles.iter().map(Tile::view).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::view::ViewDetail;
    use serde_json::json;
    use tilecraft_core::{EntityState, HostAction, Part, SimpleTemplates};

    fn card(value: Value) -> Card {
        let mut card = Card::from_value(value, Arc::new(SimpleTemplates::new())).unwrap();
        card.connect();
        card
    }

    fn dropdown_open(card: &Card, index: usize) -> bool {
        matches!(
            card.tile(index).map(|t| t.view().detail),
            Some(ViewDetail::Dropdown { open: true, .. })
        )
    }

    #[test]
    fn test_entries_inherit_card_entity() {
        let card = card(json!({
            "entity_id": "light.porch",
            "entries": [
                { "type": "toggle" },
                { "type": "slider", "entity_id": "light.hall" }
            ]
        }));
        let ids: Vec<_> = card.views().into_iter().map(|v| v.entity_id).collect();
        assert_eq!(
            ids,
            vec![Some("light.porch".to_string()), Some("light.hall".to_string())]
        );
    }

    #[test]
    fn test_legacy_buttons_key() {
        let card = card(json!({ "buttons": [{ "label": "A" }, { "label": "B" }] }));
        assert_eq!(card.tiles().len(), 2);
    }

    #[test]
    fn test_missing_entries_is_error() {
        let result = Card::from_value(json!({ "entity_id": "x.y" }), Arc::new(SimpleTemplates::new()));
        assert!(matches!(result, Err(ConfigError::MissingField("entries"))));
    }

    #[test]
    fn test_press_on_another_tile_closes_dropdown() {
        let mut card = card(json!({
            "entries": [
                { "type": "dropdown", "entity_id": "select.mode", "options": [{ "option": "a" }, { "option": "b" }] },
                { "type": "button" }
            ]
        }));
        let mut host = RecordingHost::new();

        card.handle_input(0, InputEvent::press(0.0, 0.0), 0, &mut host).unwrap();
        assert!(dropdown_open(&card, 0));

        // clicks inside the dropdown keep it open
        card.handle_input(0, InputEvent::release(0.0, 0.0), 20, &mut host).unwrap();
        card.handle_input(0, InputEvent::press_part(0.0, 0.0, Part::Option(1)), 100, &mut host)
            .unwrap();
        assert_eq!(host.performed().len(), 1);

        card.handle_input(0, InputEvent::press(0.0, 0.0), 200, &mut host).unwrap();
        assert!(dropdown_open(&card, 0));
        card.handle_input(1, InputEvent::press(0.0, 0.0), 300, &mut host).unwrap();
        assert!(!dropdown_open(&card, 0));
    }

    #[test]
    fn test_click_outside_and_disconnect_release_listeners() {
        let mut card = card(json!({
            "entries": [
                { "type": "dropdown", "entity_id": "select.mode", "options": [{ "option": "a" }] },
                { "type": "input", "entity_id": "input_text.note" }
            ]
        }));
        assert_eq!(card.registry().len(), 2);
        let mut host = RecordingHost::new();
        card.handle_input(0, InputEvent::press(0.0, 0.0), 0, &mut host).unwrap();
        card.click_outside();
        assert!(!dropdown_open(&card, 0));

        card.disconnect();
        assert!(card.registry().is_empty());
        card.connect();
        assert_eq!(card.registry().len(), 2);
    }

    #[test]
    fn test_set_hass_and_advance_reach_every_tile() {
        let mut card = card(json!({
            "entries": [
                { "type": "toggle", "entity_id": "switch.a" },
                { "type": "toggle", "entity_id": "switch.b" }
            ]
        }));
        let mut host = RecordingHost::new();
        let hass = tilecraft_core::HassSnapshot::new()
            .with_entity("switch.a", EntityState::new("on"))
            .with_entity("switch.b", EntityState::new("off"));
        assert!(card.set_hass(Arc::new(hass), 0));

        card.handle_input(1, InputEvent::press(0.0, 0.0), 100, &mut host).unwrap();
        card.handle_input(1, InputEvent::release(0.0, 0.0), 150, &mut host).unwrap();
        assert!(!card.tile(1).unwrap().pipeline().is_tracking());

        card.advance(5_000, &mut host).unwrap();
        assert!(card.tiles().iter().all(|t| t.pipeline().is_tracking()));
        let performed = host.performed();
        let HostAction::CallService { service, .. } = performed[0] else {
            panic!("expected a service call");
        };
        assert_eq!(service, "turn_on");
    }

    #[test]
    fn test_confirm_unknown_request() {
        let mut card = card(json!({ "entries": [{}] }));
        let mut host = RecordingHost::new();
        let tile_id = card.tile(0).unwrap().id();
        let result = card.confirm(tile_id, ConfirmationId::default(), true, 0, &mut host);
        assert!(matches!(result, Err(DispatchError::UnknownConfirmation)));
    }
}
