//! Actions used when an entry configures no `tap_action`
//!
//! Each builder returns a `perform-action` targeting the entry's entity.
//! The committed value is never written into the action itself: the data
//! holds a `{{ value }}` (or `{{ option }}`) placeholder and the value
//! reaches it as a render-context override, so user text is never
//! evaluated as a template.

use serde_json::{json, Map, Value};
use tilecraft_core::{domain_of, Action, InputType};

const VALUE: &str = "{{ value }}";
const OPTION: &str = "{{ option }}";

/// Context override carrying a committed value into a default action
pub fn value_override(value: Value) -> Map<String, Value> {
    let mut overrides = Map::new();
    overrides.insert("value".into(), value);
    overrides
}

/// Turn an entity on or off
pub fn toggle_action(entity_id: &str, on: bool) -> Action {
    let domain = domain_of(entity_id);
    let service = match (domain, on) {
        ("lock", true) => "lock",
        ("lock", false) => "unlock",
        ("cover", true) => "open_cover",
        ("cover", false) => "close_cover",
        (_, true) => "turn_on",
        (_, false) => "turn_off",
    };
    Action::perform(format!("{domain}.{service}"), json!({})).with_target_entity(entity_id)
}

/// Set a numeric value with the domain's setter service
pub fn setter_action(entity_id: &str) -> Action {
    let domain = domain_of(entity_id);
    let (service, field) = match domain {
        "light" => ("turn_on", "brightness_pct"),
        "media_player" => ("volume_set", "volume_level"),
        "cover" => ("set_cover_position", "position"),
        "fan" => ("set_percentage", "percentage"),
        "climate" => ("set_temperature", "temperature"),
        _ => ("set_value", "value"),
    };
    Action::perform(format!("{domain}.{service}"), json!({ field: VALUE }))
        .with_target_entity(entity_id)
}

/// Pick an option of a select-like entity; expects an `option` override
pub fn select_action(entity_id: &str) -> Action {
    let domain = domain_of(entity_id);
    Action::perform(format!("{domain}.select_option"), json!({ "option": OPTION }))
        .with_target_entity(entity_id)
}

/// Commit the text of an input widget
pub fn input_action(entity_id: &str, input_type: InputType) -> Action {
    let field = match input_type {
        InputType::Date => Some("date"),
        InputType::Time => Some("time"),
        InputType::DatetimeLocal => Some("datetime"),
        _ => None,
    };
    if let Some(field) = field {
        return Action::perform("input_datetime.set_datetime", json!({ field: VALUE }))
            .with_target_entity(entity_id);
    }
    let domain = domain_of(entity_id);
    Action::perform(format!("{domain}.set_value"), json!({ "value": VALUE }))
        .with_target_entity(entity_id)
}

/// The value an input commit sends: numbers for number inputs, text otherwise
pub fn input_value(input_type: InputType, text: &str) -> Value {
    match input_type {
        InputType::Number => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|n| serde_json::Number::from_f64(n).map(Value::Number))
            .unwrap_or_else(|| Value::String(text.to_string())),
        _ => Value::String(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilecraft_core::{build_context, deep_render, ContextInputs, HostAction, SimpleTemplates};

    fn service_of(action: &Action, overrides: Map<String, Value>) -> (String, String, Map<String, Value>) {
        let engine = SimpleTemplates::new();
        let ctx = build_context(&engine, None, ContextInputs::default(), Some(overrides));
        let rendered = deep_render(&ctx, &serde_json::to_value(action).unwrap());
        let action: Action = serde_json::from_value(rendered).unwrap();
        match action.to_host_action().unwrap() {
            Some(HostAction::CallService {
                domain,
                service,
                data,
                target,
            }) => {
                assert!(target.get("entity_id").and_then(Value::as_str).is_some());
                (domain, service, data)
            }
            other => panic!("expected a service call, got {other:?}"),
        }
    }

    #[test]
    fn test_toggle_services() {
        let service = |entity, on| service_of(&toggle_action(entity, on), Map::new()).1;
        assert_eq!(service("switch.x", true), "turn_on");
        assert_eq!(service("light.x", false), "turn_off");
        assert_eq!(service("lock.door", true), "lock");
        assert_eq!(service("cover.blind", false), "close_cover");
    }

    #[test]
    fn test_setters_by_domain() {
        let (domain, service, data) = service_of(&setter_action("light.desk"), value_override(json!(70)));
        assert_eq!((domain.as_str(), service.as_str()), ("light", "turn_on"));
        assert_eq!(data.get("brightness_pct"), Some(&json!(70)));

        let (_, service, data) = service_of(&setter_action("climate.hall"), value_override(json!(21.5)));
        assert_eq!(service, "set_temperature");
        assert_eq!(data.get("temperature"), Some(&json!(21.5)));

        let (domain, service, _) = service_of(&setter_action("input_number.x"), value_override(json!(1)));
        assert_eq!((domain.as_str(), service.as_str()), ("input_number", "set_value"));
    }

    #[test]
    fn test_input_actions() {
        let (domain, service, data) = service_of(
            &input_action("input_datetime.alarm", InputType::Time),
            value_override(input_value(InputType::Time, "07:30")),
        );
        assert_eq!((domain.as_str(), service.as_str()), ("input_datetime", "set_datetime"));
        assert_eq!(data.get("time"), Some(&json!("07:30")));

        let (_, _, data) = service_of(
            &input_action("input_number.x", InputType::Number),
            value_override(input_value(InputType::Number, "4.5")),
        );
        assert_eq!(data.get("value"), Some(&json!(4.5)));

        let (_, service, data) = service_of(
            &input_action("input_text.note", InputType::Text),
            value_override(input_value(InputType::Text, "hi")),
        );
        assert_eq!(service, "set_value");
        assert_eq!(data.get("value"), Some(&json!("hi")));
    }

    #[test]
    fn test_template_syntax_in_values_stays_literal() {
        for text in ["a {{ b", "{{ states('lock.front') }}", "{{ 5 }}"] {
            let (_, _, data) = service_of(
                &input_action("input_text.note", InputType::Text),
                value_override(input_value(InputType::Text, text)),
            );
            assert_eq!(data.get("value"), Some(&json!(text)));
        }
    }

    #[test]
    fn test_select_option() {
        let mut overrides = Map::new();
        overrides.insert("option".into(), json!("eco"));
        let (domain, service, data) = service_of(&select_action("input_select.mode"), overrides);
        assert_eq!((domain.as_str(), service.as_str()), ("input_select", "select_option"));
        assert_eq!(data.get("option"), Some(&json!("eco")));
    }
}
