//! Explicit argument schemas for registered tools.
//!
//! Models send tool arguments as whatever JSON they feel like: an object, a
//! bare string, sometimes nothing. [`ToolSpec::normalize`] turns any of those
//! into a [`ToolArgs`] mapping holding exactly the declared params, with
//! defaults filled in. The mapping is then checked against the JSON Schema
//! generated from the same spec.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use jsonschema::{Draft, Validator};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    List,
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::List => "array",
        }
    }

    fn empty(self) -> Value {
        match self {
            ParamKind::String => Value::String(String::new()),
            ParamKind::List => Value::Array(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
    pub description: String,
}

impl ParamSpec {
    pub fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::String,
            default: None,
            description: description.to_string(),
        }
    }

    pub fn list(name: &str, description: &str) -> Self {
        Self {
            kind: ParamKind::List,
            ..Self::string(name, description)
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    fn fallback(&self) -> Value {
        self.default.clone().unwrap_or_else(|| self.kind.empty())
    }

    /// Coerce loosely-typed input toward this param's kind.
    ///
    /// Scalars become strings for string params and single values are wrapped
    /// for list params. Objects and arrays given to a string param are left
    /// alone so schema validation rejects them.
    fn coerce(&self, value: &Value) -> Value {
        match (self.kind, value) {
            (_, Value::Null) => self.fallback(),
            (ParamKind::String, Value::Bool(b)) => Value::String(b.to_string()),
            (ParamKind::String, Value::Number(n)) => Value::String(n.to_string()),
            (ParamKind::List, Value::Array(_)) => value.clone(),
            (ParamKind::List, other) => Value::Array(vec![other.clone()]),
            _ => value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Declared params; the first one receives bare (non-object) arguments.
    pub params: Vec<ParamSpec>,
}

/// Normalized arguments: every declared param present, nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    /// String param value; empty when absent or not a string.
    pub fn str(&self, name: &str) -> &str {
        self.0.get(name).and_then(Value::as_str).unwrap_or("")
    }

    /// List param value; empty when absent or not a list.
    pub fn list(&self, name: &str) -> &[Value] {
        self.0
            .get(name)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, params: Vec<ParamSpec>) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            params,
        }
    }

    /// Schema-directed extraction of declared params from raw model input.
    pub fn normalize(&self, raw: &Value) -> ToolArgs {
        let mut out = Map::new();
        match raw {
            Value::Object(given) => {
                for param in &self.params {
                    let value = given
                        .get(&param.name)
                        .map(|v| param.coerce(v))
                        .unwrap_or_else(|| param.fallback());
                    out.insert(param.name.clone(), value);
                }
            }
            other => {
                for (idx, param) in self.params.iter().enumerate() {
                    let value = match (idx, other) {
                        (0, Value::String(text)) => Value::String(text.clone()),
                        (0, Value::Null) => param.fallback(),
                        (0, value) => param.coerce(value),
                        _ => param.fallback(),
                    };
                    out.insert(param.name.clone(), value);
                }
            }
        }
        ToolArgs(out)
    }

    /// JSON Schema (draft 2020-12) for the normalized mapping.
    pub fn json_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|param| {
                (
                    param.name.clone(),
                    json!({ "type": param.kind.json_type(), "description": param.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self.params.iter().map(|p| p.name.as_str()).collect();
        json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    pub fn compile_validator(&self) -> Result<Validator> {
        jsonschema::options()
            .with_draft(Draft::Draft202012)
            .build(&self.json_schema())
            .with_context(|| format!("compile argument schema for {}", self.name))
    }

    /// One-line arg summary for the system prompt, e.g.
    /// `{"procedure": string, "city": string = "Bangalore"}`.
    pub fn args_summary(&self) -> String {
        let mut out = String::from("{");
        for (idx, param) in self.params.iter().enumerate() {
            if idx > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "\"{}\": {}", param.name, param.kind.json_type());
            if let Some(default) = &param.default {
                let _ = write!(out, " = {default}");
            }
        }
        out.push('}');
        out
    }
}

/// Validate normalized args, collecting every violation into one error.
pub fn check_args(validator: &Validator, spec: &ToolSpec, args: &ToolArgs) -> Result<()> {
    let instance = args.as_value();
    let messages: Vec<String> = validator
        .iter_errors(&instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!(
            "invalid arguments for {}:\n- {}",
            spec.name,
            messages.join("\n- ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn price_spec() -> ToolSpec {
        ToolSpec::new(
            "price_compare",
            "Compare prices.",
            vec![
                ParamSpec::string("procedure", "Procedure name."),
                ParamSpec::string("city", "City.").with_default(json!("Bangalore")),
            ],
        )
    }

    #[test]
    fn object_args_fill_defaults_and_drop_unknown_keys() {
        let args = price_spec().normalize(&json!({"procedure": "appendectomy", "extra": 1}));
        assert_eq!(
            args.as_value(),
            json!({"procedure": "appendectomy", "city": "Bangalore"})
        );
    }

    #[test]
    fn bare_string_binds_primary_param() {
        let args = price_spec().normalize(&json!("cataract"));
        assert_eq!(args.str("procedure"), "cataract");
        assert_eq!(args.str("city"), "Bangalore");
    }

    #[test]
    fn null_args_use_defaults() {
        let args = price_spec().normalize(&Value::Null);
        assert_eq!(args.str("procedure"), "");
        assert_eq!(args.str("city"), "Bangalore");
    }

    #[test]
    fn scalars_are_coerced() {
        let spec = ToolSpec::new(
            "cost_negotiator",
            "Script.",
            vec![
                ParamSpec::string("procedure", "Procedure."),
                ParamSpec::list("quotes", "Quotes."),
            ],
        );
        let args = spec.normalize(&json!({"procedure": 42, "quotes": {"price": 1}}));
        assert_eq!(args.str("procedure"), "42");
        assert_eq!(args.list("quotes"), &[json!({"price": 1})]);
    }

    #[test]
    fn validator_rejects_object_for_string_param() {
        let spec = price_spec();
        let validator = spec.compile_validator().expect("compile");
        let ok = spec.normalize(&json!({"procedure": "x"}));
        assert!(check_args(&validator, &spec, &ok).is_ok());

        let bad = spec.normalize(&json!({"procedure": {"name": "x"}}));
        let err = check_args(&validator, &spec, &bad).unwrap_err();
        assert!(err.to_string().contains("invalid arguments for price_compare"));
    }

    #[test]
    fn summary_shows_types_and_defaults() {
        assert_eq!(
            price_spec().args_summary(),
            r#"{"procedure": string, "city": string = "Bangalore"}"#
        );
    }
}
