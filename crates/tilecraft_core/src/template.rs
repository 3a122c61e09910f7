//! Template rendering
//!
//! Configuration strings are templates evaluated against a context built
//! fresh for every render:
//!
//! ```text
//! base fields (value, hold_secs, unit, pointer deltas)
//!     ↓
//! config snapshot (+ computed entity / attribute)
//!     ↓
//! caller overrides                 (later keys shadow earlier ones)
//!     ↓
//! render()                         (nested evaluation, same context)
//! ```
//!
//! The evaluator itself is pluggable through [`TemplateEngine`]; the
//! wrapper functions here own the fail-soft policy: evaluator errors are
//! logged and become an empty string, never an error for the caller.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::TemplateError;
use crate::input::PointerDeltas;
use crate::state::HassSnapshot;

/// Maximum depth of nested `render` calls
pub const MAX_RENDER_DEPTH: usize = 16;

/// A template evaluator
///
/// Pure from the widget's point of view: same template and context give the
/// same result. Implementations may call [`RenderContext::render`] to
/// evaluate nested templates.
pub trait TemplateEngine {
    /// Render `template` against `ctx`
    fn render(&self, template: &str, ctx: &RenderContext<'_>) -> Result<Value, TemplateError>;
}

/// Evaluation context for one render
///
/// Lives only for the duration of a render call.
#[derive(Clone)]
pub struct RenderContext<'a> {
    vars: IndexMap<String, Value>,
    engine: &'a dyn TemplateEngine,
    hass: Option<&'a HassSnapshot>,
    depth: usize,
}

impl<'a> RenderContext<'a> {
    /// An empty context
    pub fn new(engine: &'a dyn TemplateEngine, hass: Option<&'a HassSnapshot>) -> Self {
        Self {
            vars: IndexMap::new(),
            engine,
            hass,
            depth: 0,
        }
    }

    /// Set a variable; a later insert of the same key wins
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.vars.insert(key.into(), value);
    }

    /// Merge overrides on top of the current variables
    pub fn extend<I>(&mut self, overrides: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in overrides {
            self.vars.insert(key, value);
        }
    }

    /// Look up a top-level variable
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.vars.get(key)
    }

    /// Backend state available to the template
    pub fn hass(&self) -> Option<&'a HassSnapshot> {
        self.hass
    }

    /// Variables as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(self.vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }

    /// Evaluate a nested template against this same context
    pub fn render(&self, template: &str) -> Result<Value, TemplateError> {
        if self.depth >= MAX_RENDER_DEPTH {
            return Err(TemplateError::DepthExceeded(self.depth));
        }
        let nested = RenderContext {
            depth: self.depth + 1,
            ..self.clone()
        };
        self.engine.render(template, &nested)
    }

    /// Render a value with the fail-soft policy of [`render_template`]
    pub fn render_value(&self, raw: &Value) -> Value {
        render_template(self, raw)
    }
}

impl std::fmt::Debug for RenderContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("vars", &self.vars)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Widget-side inputs for a render context
#[derive(Debug, Clone, Default)]
pub struct ContextInputs<'v> {
    /// Current resolved value
    pub value: Option<&'v Value>,
    /// Decimal digits derived from the configured step
    pub precision: Option<usize>,
    pub unit: Option<&'v str>,
    /// Seconds between momentary start and end
    pub hold_secs: f64,
    pub pointer: PointerDeltas,
    /// Entry snapshot exposed as `config`
    pub config: Option<Value>,
    /// Rendered entity id, exposed as `config.entity`
    pub entity: Option<&'v str>,
    /// Rendered attribute path, exposed as `config.attribute`
    pub attribute: Option<&'v str>,
}

/// Build a render context from widget state
///
/// `overrides` are applied last and win over every built-in key.
pub fn build_context<'a>(
    engine: &'a dyn TemplateEngine,
    hass: Option<&'a HassSnapshot>,
    inputs: ContextInputs<'_>,
    overrides: Option<Map<String, Value>>,
) -> RenderContext<'a> {
    let mut ctx = RenderContext::new(engine, hass);

    let value = match (inputs.value, inputs.precision) {
        (Some(v @ (Value::Number(_) | Value::String(_))), Some(precision)) => {
            match crate::resolver::number_of(v) {
                Some(n) => Value::String(format_fixed(n, precision)),
                None => v.clone(),
            }
        }
        (Some(v), Some(_)) => v.clone(),
        (Some(v), None) => v.clone(),
        (None, _) => Value::Null,
    };

    ctx.insert("value", value);
    ctx.insert("hold_secs", Value::from(inputs.hold_secs));
    ctx.insert(
        "unit",
        inputs.unit.map_or(Value::Null, |u| Value::String(u.to_string())),
    );
    let p = inputs.pointer;
    ctx.insert("initialX", Value::from(p.initial_x));
    ctx.insert("initialY", Value::from(p.initial_y));
    ctx.insert("currentX", Value::from(p.current_x));
    ctx.insert("currentY", Value::from(p.current_y));
    ctx.insert("deltaX", Value::from(p.delta_x()));
    ctx.insert("deltaY", Value::from(p.delta_y()));

    let mut config = match inputs.config {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let as_value = |s: Option<&str>| s.map_or(Value::Null, |s| Value::String(s.to_string()));
    config.insert("entity".into(), as_value(inputs.entity));
    config.insert("attribute".into(), as_value(inputs.attribute));
    ctx.insert("config", Value::Object(config));

    if let Some(overrides) = overrides {
        ctx.extend(overrides);
    }
    ctx
}

/// Render one configuration value
///
/// Only strings are templates; other values pass through. Evaluator errors
/// are logged and produce `""`. If the result equals the input, the input
/// is returned untouched, so a string with no template syntax always comes
/// back as itself.
pub fn render_template(ctx: &RenderContext<'_>, raw: &Value) -> Value {
    let Value::String(template) = raw else {
        return raw.clone();
    };

    match ctx.render(template) {
        Ok(rendered) if rendered != *raw => rendered,
        Ok(_) => raw.clone(),
        Err(err) => {
            tracing::warn!(%err, template = template.as_str(), "template render failed");
            Value::String(String::new())
        }
    }
}

/// Render a string template to a display string
pub fn render_string(ctx: &RenderContext<'_>, template: &str) -> String {
    display(&render_template(ctx, &Value::String(template.to_string())))
}

/// Render every string leaf of a value tree
///
/// Leaves under a key named `data` or `target` that render to a string are
/// parsed as an embedded YAML document (JSON included), so a whole
/// service-call payload can be produced by one template. Documents that are
/// not a mapping stay strings.
pub fn deep_render(ctx: &RenderContext<'_>, value: &Value) -> Value {
    deep_render_at(ctx, value, None)
}

fn deep_render_at(ctx: &RenderContext<'_>, value: &Value, key: Option<&str>) -> Value {
    match value {
        Value::String(_) => {
            let rendered = render_template(ctx, value);
            match (&rendered, key) {
                (Value::String(text), Some("data" | "target")) => parse_embedded(text).unwrap_or(rendered),
                _ => rendered,
            }
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| deep_render_at(ctx, item, key))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), deep_render_at(ctx, v, Some(k))))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn parse_embedded(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(Value::Object(Map::new()));
    }
    match serde_yaml::from_str::<Value>(trimmed) {
        Ok(value @ Value::Object(_)) => Some(value),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(%err, "embedded payload is not a mapping; keeping string");
            None
        }
    }
}

/// Decimal digits of a step (`0.25` → 2, `10` → 0)
pub fn precision_of(step: f64) -> usize {
    let text = step.to_string();
    text.split_once('.').map_or(0, |(_, frac)| frac.len())
}

/// Format with exactly `precision` decimal digits
pub fn format_fixed(value: f64, precision: usize) -> String {
    format!("{value:.precision$}")
}

/// Human-readable rendering of a template result
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".into(),
        Value::Bool(false) => "False".into(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Truthiness as templates see it
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            !(s.is_empty() || s == "false" || s == "0" || s == "none" || s == "off" || s == "no")
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::SimpleTemplates;
    use serde_json::json;

    /// Engine that always fails, for the fail-soft paths
    struct Broken;

    impl TemplateEngine for Broken {
        fn render(&self, _: &str, _: &RenderContext<'_>) -> Result<Value, TemplateError> {
            Err(TemplateError::Syntax("boom".into()))
        }
    }

    #[test]
    fn test_plain_strings_are_idempotent() {
        let engine = SimpleTemplates::new();
        let ctx = build_context(&engine, None, ContextInputs::default(), None);
        for s in ["", "hello", "50 %", "{ not a template }", "a } b { c"] {
            assert_eq!(render_template(&ctx, &json!(s)), json!(s));
        }
    }

    #[test]
    fn test_non_strings_pass_through() {
        let ctx = build_context(&Broken, None, ContextInputs::default(), None);
        assert_eq!(render_template(&ctx, &json!(5)), json!(5));
        assert_eq!(render_template(&ctx, &json!(true)), json!(true));
    }

    #[test]
    fn test_errors_render_empty() {
        let ctx = build_context(&Broken, None, ContextInputs::default(), None);
        assert_eq!(render_template(&ctx, &json!("{{ value }}")), json!(""));
    }

    #[test]
    fn test_context_contents() {
        let engine = SimpleTemplates::new();
        let value = json!(42);
        let mut pointer = PointerDeltas::start(10.0, 10.0);
        pointer.track(30.0, 5.0);
        let ctx = build_context(
            &engine,
            None,
            ContextInputs {
                value: Some(&value),
                unit: Some("%"),
                hold_secs: 1.5,
                pointer,
                config: Some(json!({ "type": "slider" })),
                entity: Some("light.x"),
                attribute: Some("brightness"),
                ..Default::default()
            },
            None,
        );

        assert_eq!(ctx.get("value"), Some(&json!(42)));
        assert_eq!(ctx.get("unit"), Some(&json!("%")));
        assert_eq!(ctx.get("hold_secs"), Some(&json!(1.5)));
        assert_eq!(ctx.get("deltaX"), Some(&json!(20.0)));
        assert_eq!(ctx.get("deltaY"), Some(&json!(-5.0)));
        let config = ctx.get("config").unwrap();
        assert_eq!(config["type"], json!("slider"));
        assert_eq!(config["entity"], json!("light.x"));
        assert_eq!(config["attribute"], json!("brightness"));
    }

    #[test]
    fn test_overrides_shadow_builtins() {
        let engine = SimpleTemplates::new();
        let value = json!(1);
        let mut overrides = Map::new();
        overrides.insert("value".into(), json!("overridden"));
        overrides.insert("extra".into(), json!(true));
        let ctx = build_context(
            &engine,
            None,
            ContextInputs {
                value: Some(&value),
                ..Default::default()
            },
            Some(overrides),
        );
        assert_eq!(ctx.get("value"), Some(&json!("overridden")));
        assert_eq!(ctx.get("extra"), Some(&json!(true)));
    }

    #[test]
    fn test_precision_formatting() {
        let engine = SimpleTemplates::new();
        let value = json!(3.14159);
        let ctx = build_context(
            &engine,
            None,
            ContextInputs {
                value: Some(&value),
                precision: Some(precision_of(0.01)),
                ..Default::default()
            },
            None,
        );
        let rendered = render_string(&ctx, "{{ value }}");
        assert_eq!(rendered, "3.14");
        let parsed: f64 = rendered.parse().unwrap();
        assert!((parsed - 3.14159).abs() < 0.01);
    }

    #[test]
    fn test_precision_formats_numeric_strings() {
        let engine = SimpleTemplates::new();
        let value = json!("3");
        let ctx = build_context(
            &engine,
            None,
            ContextInputs {
                value: Some(&value),
                precision: Some(1),
                ..Default::default()
            },
            None,
        );
        assert_eq!(render_string(&ctx, "{{ value }}"), "3.0");

        let text = json!("auto");
        let ctx = build_context(
            &engine,
            None,
            ContextInputs {
                value: Some(&text),
                precision: Some(1),
                ..Default::default()
            },
            None,
        );
        assert_eq!(render_string(&ctx, "{{ value }}"), "auto");
    }

    #[test]
    fn test_precision_of_steps() {
        assert_eq!(precision_of(1.0), 0);
        assert_eq!(precision_of(10.0), 0);
        assert_eq!(precision_of(0.5), 1);
        assert_eq!(precision_of(0.25), 2);
        assert_eq!(precision_of(0.001), 3);
    }

    #[test]
    fn test_fixed_format_digits() {
        for p in 0..5 {
            let text = format_fixed(12.345678, p);
            let digits = text.split_once('.').map_or(0, |(_, f)| f.len());
            assert_eq!(digits, p);
            let parsed: f64 = text.parse().unwrap();
            assert!((parsed - 12.345678).abs() <= 10f64.powi(-(p as i32)));
        }
    }

    #[test]
    fn test_deep_render_parses_payloads() {
        let engine = SimpleTemplates::new();
        let value = json!("light.kitchen");
        let ctx = build_context(
            &engine,
            None,
            ContextInputs {
                value: Some(&value),
                ..Default::default()
            },
            None,
        );
        let action = json!({
            "action": "perform-action",
            "perform_action": "light.turn_on",
            "data": "{\"brightness_pct\": 40}",
            "target": { "entity_id": "{{ value }}" },
            "nested": ["{{ value }}", 3]
        });
        let rendered = deep_render(&ctx, &action);
        assert_eq!(rendered["data"], json!({ "brightness_pct": 40 }));
        assert_eq!(rendered["target"]["entity_id"], json!("light.kitchen"));
        assert_eq!(rendered["nested"], json!(["light.kitchen", 3]));
        assert_eq!(rendered["perform_action"], json!("light.turn_on"));
    }

    #[test]
    fn test_deep_render_parses_yaml_payloads() {
        let engine = SimpleTemplates::new();
        let ctx = build_context(&engine, None, ContextInputs::default(), None);
        let rendered = deep_render(
            &ctx,
            &json!({
                "data": "brightness_pct: {{ 40 }}\ntransition: 2",
                "target": "entity_id: [light.a, light.b]"
            }),
        );
        assert_eq!(rendered["data"], json!({ "brightness_pct": 40, "transition": 2 }));
        assert_eq!(rendered["target"], json!({ "entity_id": ["light.a", "light.b"] }));
    }

    #[test]
    fn test_deep_render_keeps_scalar_payloads() {
        let engine = SimpleTemplates::new();
        let ctx = build_context(&engine, None, ContextInputs::default(), None);
        let rendered = deep_render(&ctx, &json!({ "data": "just text", "other": "a: 1" }));
        assert_eq!(rendered["data"], json!("just text"));
        assert_eq!(rendered["other"], json!("a: 1"));
    }

    #[test]
    fn test_truthiness() {
        assert!(is_truthy(&json!("on")));
        assert!(is_truthy(&json!(1)));
        assert!(!is_truthy(&json!("false")));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&Value::Null));
    }
}
