//! Action descriptors and the normalized intents handed to the host
//!
//! An [`Action`] is the user-authored fragment (`tap_action: {...}`). After
//! template rendering it is turned into a [`HostAction`], the only thing the
//! host framework ever sees.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// Closed set of action kinds
///
/// Unknown tags fail deserialization; nothing silently degrades to `none`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    /// Call a backend service (`call-service` is the legacy tag)
    #[serde(alias = "call-service")]
    PerformAction,
    Navigate,
    Url,
    Assist,
    MoreInfo,
    FireDomEvent,
    /// Hold-only: re-fire the tap action on an interval while held
    Repeat,
    None,
    /// Run a host-side expression. Trusted input only, never sandboxed.
    #[cfg(feature = "eval")]
    Eval,
}

impl ActionKind {
    /// `repeat` and `none` never confirm or dispatch
    pub fn is_dispatchable(self) -> bool {
        !matches!(self, ActionKind::Repeat | ActionKind::None)
    }

    pub fn tag(self) -> &'static str {
        match self {
            ActionKind::PerformAction => "perform-action",
            ActionKind::Navigate => "navigate",
            ActionKind::Url => "url",
            ActionKind::Assist => "assist",
            ActionKind::MoreInfo => "more-info",
            ActionKind::FireDomEvent => "fire-dom-event",
            ActionKind::Repeat => "repeat",
            ActionKind::None => "none",
            #[cfg(feature = "eval")]
            ActionKind::Eval => "eval",
        }
    }
}

/// Logical interaction an action is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Tap,
    Hold,
    DoubleTap,
    MomentaryStart,
    MomentaryEnd,
}

impl InteractionKind {
    /// The entry field holding this interaction's action
    pub fn config_key(self) -> &'static str {
        match self {
            InteractionKind::Tap => "tap_action",
            InteractionKind::Hold => "hold_action",
            InteractionKind::DoubleTap => "double_tap_action",
            InteractionKind::MomentaryStart => "momentary_start_action",
            InteractionKind::MomentaryEnd => "momentary_end_action",
        }
    }
}

/// One action descriptor as authored in configuration
///
/// String fields may contain templates; `data` and `target` may also be a
/// templated string holding an embedded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub action: ActionKind,
    /// `domain.service` for `perform-action`
    #[serde(default, alias = "service", skip_serializing_if = "Option::is_none")]
    pub perform_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_replace: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_listening: Option<bool>,
    /// Entity for `more-info`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[cfg(feature = "eval")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
    /// Hold threshold in ms (hold actions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_time: Option<Value>,
    /// Repeat interval in ms (`repeat` hold actions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_delay: Option<Value>,
    /// Double-tap window in ms (double-tap actions)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub double_tap_window: Option<Value>,
    /// Anything else, forwarded untouched (fire-dom-event payloads)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Action {
    /// An action of the given kind with every optional field unset
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            perform_action: None,
            data: None,
            target: None,
            navigation_path: None,
            navigation_replace: None,
            url_path: None,
            pipeline_id: None,
            start_listening: None,
            entity: None,
            #[cfg(feature = "eval")]
            eval: None,
            confirmation: None,
            hold_time: None,
            repeat_delay: None,
            double_tap_window: None,
            extra: Map::new(),
        }
    }

    /// A `perform-action` call of `domain.service` with the given data
    pub fn perform(service: impl Into<String>, data: Value) -> Self {
        Self {
            perform_action: Some(service.into()),
            data: Some(data),
            ..Self::new(ActionKind::PerformAction)
        }
    }

    /// Builder: target a single entity
    pub fn with_target_entity(mut self, entity_id: impl Into<String>) -> Self {
        let mut target = Map::new();
        target.insert("entity_id".into(), Value::String(entity_id.into()));
        self.target = Some(Value::Object(target));
        self
    }

    /// Whether the action names an entity through `target` or `data`
    pub fn has_entity_target(&self) -> bool {
        let names_entity = |v: &Option<Value>| {
            v.as_ref()
                .and_then(Value::as_object)
                .is_some_and(|o| o.contains_key("entity_id"))
        };
        names_entity(&self.target) || names_entity(&self.data)
    }

    /// Turn a rendered action into the host intent
    ///
    /// Returns `Ok(None)` for kinds that never reach the host.
    pub fn to_host_action(&self) -> Result<Option<HostAction>, DispatchError> {
        let intent = match self.action {
            ActionKind::PerformAction => {
                let name = self.perform_action.as_deref().ok_or_else(|| {
                    DispatchError::InvalidAction("perform-action without a service".into())
                })?;
                let (domain, service) = name.split_once('.').ok_or_else(|| {
                    DispatchError::InvalidAction(format!("service `{name}` is not domain.service"))
                })?;
                HostAction::CallService {
                    domain: domain.to_string(),
                    service: service.to_string(),
                    data: object_or_empty(self.data.as_ref(), "data")?,
                    target: object_or_empty(self.target.as_ref(), "target")?,
                }
            }
            ActionKind::Navigate => HostAction::Navigate {
                path: self.navigation_path.clone().ok_or_else(|| {
                    DispatchError::InvalidAction("navigate without navigation_path".into())
                })?,
                replace: self.navigation_replace.unwrap_or(false),
            },
            ActionKind::Url => HostAction::Url {
                path: self.url_path.clone().ok_or_else(|| {
                    DispatchError::InvalidAction("url without url_path".into())
                })?,
            },
            ActionKind::Assist => HostAction::Assist {
                pipeline_id: self.pipeline_id.clone(),
                start_listening: self.start_listening.unwrap_or(false),
            },
            ActionKind::MoreInfo => HostAction::MoreInfo {
                entity_id: self.entity.clone(),
            },
            ActionKind::FireDomEvent => HostAction::FireDomEvent {
                payload: serde_json::to_value(self)
                    .map_err(|e| DispatchError::InvalidAction(e.to_string()))?,
            },
            ActionKind::Repeat | ActionKind::None => return Ok(None),
            #[cfg(feature = "eval")]
            ActionKind::Eval => return Ok(None),
        };
        Ok(Some(intent))
    }
}

fn object_or_empty(value: Option<&Value>, field: &str) -> Result<Map<String, Value>, DispatchError> {
    match value {
        None | Some(Value::Null) => Ok(Map::new()),
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(other) => Err(DispatchError::InvalidAction(format!(
            "`{field}` must be a mapping, got {other}"
        ))),
    }
}

/// Confirmation policy: `true`, or text plus a list of exempt users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confirmation {
    Enabled(bool),
    Detailed(ConfirmationDetails),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfirmationDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exemptions: Vec<Exemption>,
}

/// A user who is never asked to confirm
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemption {
    pub user: String,
}

impl Confirmation {
    /// Whether `user` must confirm before dispatch
    pub fn required_for(&self, user: Option<&str>) -> bool {
        match self {
            Confirmation::Enabled(enabled) => *enabled,
            Confirmation::Detailed(details) => !user
                .is_some_and(|user| details.exemptions.iter().any(|e| e.user == user)),
        }
    }

    /// Custom prompt text, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Confirmation::Enabled(_) => None,
            Confirmation::Detailed(details) => details.text.as_deref(),
        }
    }
}

/// Normalized intent executed by the host framework
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum HostAction {
    CallService {
        domain: String,
        service: String,
        data: Map<String, Value>,
        target: Map<String, Value>,
    },
    Navigate {
        path: String,
        replace: bool,
    },
    Url {
        path: String,
    },
    Assist {
        pipeline_id: Option<String>,
        start_listening: bool,
    },
    MoreInfo {
        entity_id: Option<String>,
    },
    FireDomEvent {
        payload: Value,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_legacy_call_service_tag() {
        let action: Action = serde_json::from_value(json!({
            "action": "call-service",
            "service": "light.toggle",
            "data": { "entity_id": "light.kitchen" }
        }))
        .unwrap();
        assert_eq!(action.action, ActionKind::PerformAction);
        assert_eq!(action.perform_action.as_deref(), Some("light.toggle"));
        assert!(action.has_entity_target());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<Action, _> = serde_json::from_value(json!({ "action": "explode" }));
        assert!(result.is_err());
    }

    #[cfg(not(feature = "eval"))]
    #[test]
    fn test_eval_rejected_without_feature() {
        let result: Result<Action, _> =
            serde_json::from_value(json!({ "action": "eval", "eval": "1 + 1" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_to_host_action_call_service() {
        let action = Action::perform("switch.turn_on", json!({})).with_target_entity("switch.x");
        let intent = action.to_host_action().unwrap().unwrap();
        match intent {
            HostAction::CallService {
                domain,
                service,
                target,
                ..
            } => {
                assert_eq!(domain, "switch");
                assert_eq!(service, "turn_on");
                assert_eq!(target.get("entity_id"), Some(&json!("switch.x")));
            }
            other => panic!("unexpected intent {other:?}"),
        }
    }

    #[test]
    fn test_to_host_action_rejects_malformed() {
        let bad = Action::perform("not_a_service", json!({}));
        assert!(bad.to_host_action().is_err());

        let bad_data = Action::perform("light.toggle", json!("entity_id: light.x"));
        assert!(bad_data.to_host_action().is_err());

        assert!(Action::new(ActionKind::Navigate).to_host_action().is_err());
    }

    #[test]
    fn test_inert_kinds_produce_nothing() {
        assert_eq!(Action::new(ActionKind::None).to_host_action(), Ok(None));
        assert_eq!(Action::new(ActionKind::Repeat).to_host_action(), Ok(None));
        assert!(!ActionKind::None.is_dispatchable());
        assert!(!ActionKind::Repeat.is_dispatchable());
        assert!(ActionKind::Navigate.is_dispatchable());
    }

    #[test]
    fn test_confirmation_exemptions() {
        let policy: Confirmation = serde_json::from_value(json!({
            "text": "Really?",
            "exemptions": [{ "user": "abc" }]
        }))
        .unwrap();
        assert!(!policy.required_for(Some("abc")));
        assert!(policy.required_for(Some("xyz")));
        assert!(policy.required_for(None));
        assert_eq!(policy.text(), Some("Really?"));

        assert!(Confirmation::Enabled(true).required_for(Some("abc")));
        assert!(!Confirmation::Enabled(false).required_for(None));
    }

    #[test]
    fn test_fire_dom_event_keeps_extra_fields() {
        let action: Action = serde_json::from_value(json!({
            "action": "fire-dom-event",
            "browser_mod": { "service": "browser_mod.popup" }
        }))
        .unwrap();
        let intent = action.to_host_action().unwrap().unwrap();
        let HostAction::FireDomEvent { payload } = intent else {
            panic!("expected fire-dom-event");
        };
        assert_eq!(payload["browser_mod"]["service"], json!("browser_mod.popup"));
    }
}
