//! Built-in template evaluator
//!
//! A small expression language covering what entry configurations use day
//! to day:
//!
//! - `{{ path }}` with dotted and indexed access (`config.style.color`,
//!   `attrs[0]`, `map['key']`)
//! - literals: `'text'`, `"text"`, `42`, `1.5`, `true`, `false`, `none`
//! - `states('id')`, `state_attr('id', 'attr')`, `is_state('id', 'on')`,
//!   `render('...')`
//! - filters: `default(x)`, `int`, `float`, `round(n)`, `lower`, `upper`
//!
//! A template that is exactly one `{{ }}` block renders to the typed value;
//! anything else is string interpolation. Statement blocks (`{% %}`) are
//! not supported.

use serde_json::{Number, Value};

use crate::error::TemplateError;
use crate::template::{display, RenderContext, TemplateEngine};

/// The built-in evaluator
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTemplates;

impl SimpleTemplates {
    pub fn new() -> Self {
        Self
    }
}

impl TemplateEngine for SimpleTemplates {
    fn render(&self, template: &str, ctx: &RenderContext<'_>) -> Result<Value, TemplateError> {
        if template.contains("{%") {
            return Err(TemplateError::Unsupported("statement blocks".into()));
        }

        if is_single_block(template) {
            let t = template.trim();
            return evaluate(&t[2..t.len() - 2], ctx);
        }

        let pieces = split_blocks(template)?;
        if pieces.iter().all(|p| matches!(p, Piece::Text(_))) {
            return Ok(Value::String(template.to_string()));
        }

        let mut out = String::with_capacity(template.len());
        for piece in &pieces {
            match piece {
                Piece::Text(text) => out.push_str(text),
                Piece::Expr(expr) => out.push_str(&display(&evaluate(expr, ctx)?)),
            }
        }
        Ok(Value::String(out))
    }
}

// ============================================================================
// Block splitting
// ============================================================================

#[derive(Debug, PartialEq)]
enum Piece<'t> {
    Text(&'t str),
    Expr(&'t str),
}

fn is_single_block(template: &str) -> bool {
    let t = template.trim();
    t.starts_with("{{") && t.ends_with("}}") && find_close(&t[2..]) == Some(t.len() - 4)
}

fn split_blocks(template: &str) -> Result<Vec<Piece<'_>>, TemplateError> {
    let mut pieces = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find("{{") {
        if open > 0 {
            pieces.push(Piece::Text(&rest[..open]));
        }
        let inner = &rest[open + 2..];
        let close = find_close(inner)
            .ok_or_else(|| TemplateError::Syntax("unterminated `{{` block".into()))?;
        pieces.push(Piece::Expr(&inner[..close]));
        rest = &inner[close + 2..];
    }
    if !rest.is_empty() {
        pieces.push(Piece::Text(rest));
    }
    Ok(pieces)
}

/// Offset of the `}}` closing a block, skipping quoted text
fn find_close(inner: &str) -> Option<usize> {
    let bytes = inner.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'}' && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

// ============================================================================
// Expressions
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Path(Vec<Access>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Access {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq)]
struct Filter {
    name: String,
    args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
struct Pipeline {
    head: Expr,
    filters: Vec<Filter>,
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TemplateError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(&format!("expected `{expected}`")))
        }
    }

    fn error(&self, what: &str) -> TemplateError {
        TemplateError::Syntax(format!("{what} at offset {} in `{}`", self.pos, self.src.trim()))
    }

    fn pipeline(&mut self) -> Result<Pipeline, TemplateError> {
        let head = self.primary()?;
        let mut filters = Vec::new();
        while self.eat('|') {
            self.skip_ws();
            let name = self.ident().ok_or_else(|| self.error("expected filter name"))?;
            let args = if self.eat('(') { self.args()? } else { Vec::new() };
            filters.push(Filter { name, args });
        }
        self.skip_ws();
        if self.pos != self.src.len() {
            return Err(self.error("unexpected input"));
        }
        Ok(Pipeline { head, filters })
    }

    /// Arguments after an opening parenthesis, through the closing one
    fn args(&mut self) -> Result<Vec<Expr>, TemplateError> {
        let mut args = Vec::new();
        if self.eat(')') {
            return Ok(args);
        }
        loop {
            args.push(self.primary()?);
            if self.eat(')') {
                return Ok(args);
            }
            self.expect(',')?;
        }
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        (self.pos > start).then(|| self.src[start..self.pos].to_string())
    }

    fn primary(&mut self) -> Result<Expr, TemplateError> {
        self.skip_ws();
        match self.peek() {
            Some(q @ ('\'' | '"')) => self.string(q).map(|s| Expr::Literal(Value::String(s))),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number().map(Expr::Literal),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let name = self.ident().ok_or_else(|| self.error("expected name"))?;
                match name.as_str() {
                    "true" | "True" => return Ok(Expr::Literal(Value::Bool(true))),
                    "false" | "False" => return Ok(Expr::Literal(Value::Bool(false))),
                    "none" | "None" | "null" => return Ok(Expr::Literal(Value::Null)),
                    _ => {}
                }
                if self.eat('(') {
                    let args = self.args()?;
                    return Ok(Expr::Call(name, args));
                }
                let mut path = vec![Access::Key(name)];
                loop {
                    if self.peek() == Some('.') {
                        self.bump();
                        let key = self.ident().ok_or_else(|| self.error("expected attribute"))?;
                        path.push(Access::Key(key));
                    } else if self.peek() == Some('[') {
                        self.bump();
                        let access = match self.primary()? {
                            Expr::Literal(Value::String(key)) => Access::Key(key),
                            Expr::Literal(Value::Number(n)) => {
                                let index = n
                                    .as_u64()
                                    .ok_or_else(|| self.error("index must be a non-negative integer"))?;
                                Access::Index(index as usize)
                            }
                            _ => return Err(self.error("subscript must be a literal")),
                        };
                        self.expect(']')?;
                        path.push(access);
                    } else {
                        return Ok(Expr::Path(path));
                    }
                }
            }
            _ => Err(self.error("expected expression")),
        }
    }

    fn string(&mut self, quote: char) -> Result<String, TemplateError> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn number(&mut self) -> Result<Value, TemplateError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        while self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::from(n));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| self.error("malformed number"))
    }
}

// ============================================================================
// Evaluation
// ============================================================================

fn evaluate(source: &str, ctx: &RenderContext<'_>) -> Result<Value, TemplateError> {
    let pipeline = Parser::new(source).pipeline()?;
    let mut value = eval_expr(&pipeline.head, ctx)?;
    for filter in &pipeline.filters {
        value = apply_filter(filter, value, ctx)?;
    }
    Ok(value)
}

fn eval_expr(expr: &Expr, ctx: &RenderContext<'_>) -> Result<Value, TemplateError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(path) => Ok(lookup(path, ctx)),
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|a| eval_expr(a, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, &args, ctx)
        }
    }
}

fn lookup(path: &[Access], ctx: &RenderContext<'_>) -> Value {
    let mut iter = path.iter();
    let Some(Access::Key(root)) = iter.next() else {
        return Value::Null;
    };
    let mut current = match ctx.get(root) {
        Some(v) => v,
        None => return Value::Null,
    };
    for access in iter {
        let next = match access {
            Access::Key(key) => current.get(key.as_str()),
            Access::Index(i) => current.get(*i),
        };
        match next {
            Some(v) => current = v,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn arg_str<'v>(name: &str, args: &'v [Value], i: usize) -> Result<&'v str, TemplateError> {
    args.get(i)
        .and_then(Value::as_str)
        .ok_or_else(|| TemplateError::Syntax(format!("`{name}` expects a string argument {}", i + 1)))
}

fn call(name: &str, args: &[Value], ctx: &RenderContext<'_>) -> Result<Value, TemplateError> {
    match name {
        "states" => {
            let id = arg_str(name, args, 0)?;
            Ok(Value::String(
                ctx.hass()
                    .and_then(|h| h.get(id))
                    .map_or_else(|| "unknown".to_string(), |e| e.state.clone()),
            ))
        }
        "state_attr" => {
            let id = arg_str(name, args, 0)?;
            let attr = arg_str(name, args, 1)?;
            Ok(ctx
                .hass()
                .and_then(|h| h.get(id))
                .and_then(|e| e.attr(attr))
                .cloned()
                .unwrap_or(Value::Null))
        }
        "is_state" => {
            let id = arg_str(name, args, 0)?;
            let expected = arg_str(name, args, 1)?;
            Ok(Value::Bool(
                ctx.hass()
                    .and_then(|h| h.get(id))
                    .is_some_and(|e| e.state == expected),
            ))
        }
        "render" => {
            let template = arg_str(name, args, 0)?;
            ctx.render(template)
        }
        other => Err(TemplateError::Unsupported(format!("function `{other}`"))),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn float_value(f: f64) -> Value {
    Number::from_f64(f).map_or(Value::Null, Value::Number)
}

fn apply_filter(
    filter: &Filter,
    value: Value,
    ctx: &RenderContext<'_>,
) -> Result<Value, TemplateError> {
    let arg = |i: usize| filter.args.get(i).map(|a| eval_expr(a, ctx)).transpose();
    match filter.name.as_str() {
        "default" => {
            let fallback = arg(0)?.unwrap_or(Value::String(String::new()));
            Ok(if value.is_null() { fallback } else { value })
        }
        "int" => Ok(Value::from(as_number(&value).map_or(0, |n| n.trunc() as i64))),
        "float" => Ok(float_value(as_number(&value).unwrap_or(0.0))),
        "round" => {
            let digits = arg(0)?.as_ref().and_then(Value::as_i64).unwrap_or(0);
            let Some(n) = as_number(&value) else {
                return Ok(value);
            };
            let factor = 10f64.powi(digits as i32);
            Ok(float_value((n * factor).round() / factor))
        }
        "lower" => Ok(Value::String(display(&value).to_lowercase())),
        "upper" => Ok(Value::String(display(&value).to_uppercase())),
        other => Err(TemplateError::Unsupported(format!("filter `{other}`"))),
    }
}
