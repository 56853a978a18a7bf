//! Tool registry and the built-in tools.
//!
//! A tool is a [`ToolSpec`] (name, description, declared params) plus a
//! [`Capability`] that does the work. The registry owns the compiled argument
//! validators and turns every call into a [`ToolResult`]; nothing a tool does
//! can abort the agent loop.

pub mod discharge;
pub mod negotiator;
pub mod price_compare;
pub mod schema;
pub mod translate;

use std::collections::BTreeMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::{Result, bail};
use jsonschema::Validator;
use serde_json::{Value, json};
use tracing::{debug, instrument, warn};

use crate::io::config::ToolsConfig;
use crate::io::facade::Responder;
use crate::io::prompt::ToolListing;

pub use schema::{ParamKind, ParamSpec, ToolArgs, ToolSpec};

/// The work behind a tool.
pub trait Capability {
    fn call(&self, args: &ToolArgs) -> Result<Value>;
}

impl<F> Capability for F
where
    F: Fn(&ToolArgs) -> Result<Value>,
{
    fn call(&self, args: &ToolArgs) -> Result<Value> {
        self(args)
    }
}

/// Outcome of one tool call as fed back to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Success(Value),
    Failure(String),
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ToolResult::Success(_))
    }

    /// The JSON object placed into the next prompt. Failures are wrapped as
    /// `{"error": "..."}`.
    pub fn to_value(&self) -> Value {
        match self {
            ToolResult::Success(value) => value.clone(),
            ToolResult::Failure(message) => json!({ "error": message }),
        }
    }

    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_else(|_| "{}".to_string())
    }
}

pub struct Tool {
    spec: ToolSpec,
    validator: Validator,
    capability: Box<dyn Capability>,
}

impl Tool {
    pub fn new(spec: ToolSpec, capability: Box<dyn Capability>) -> Result<Self> {
        let validator = spec.compile_validator()?;
        Ok(Self {
            spec,
            validator,
            capability,
        })
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Normalize, validate and run. Errors and panics become failures.
    #[instrument(skip_all, fields(tool = %self.spec.name))]
    pub fn invoke(&self, raw_args: &Value) -> ToolResult {
        let args = self.spec.normalize(raw_args);
        if let Err(err) = schema::check_args(&self.validator, &self.spec, &args) {
            warn!(err = %err, "rejected tool arguments");
            return ToolResult::Failure(format!("{err:#}"));
        }
        debug!(args = %args.as_value(), "invoking tool");
        match catch_unwind(AssertUnwindSafe(|| self.capability.call(&args))) {
            Ok(Ok(value)) => ToolResult::Success(value),
            Ok(Err(err)) => {
                warn!(err = %format!("{err:#}"), "tool failed");
                ToolResult::Failure(format!("{err:#}"))
            }
            Err(_) => {
                warn!("tool panicked");
                ToolResult::Failure(format!("tool {} crashed", self.spec.name))
            }
        }
    }
}

/// Name-keyed set of tools. Populated once at startup, read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec, capability: Box<dyn Capability>) -> Result<()> {
        let name = spec.name.trim().to_string();
        if name.is_empty() {
            bail!("tool names must be non-empty");
        }
        if self.tools.contains_key(&name) {
            bail!("tool '{name}' is already registered");
        }
        self.tools.insert(name, Tool::new(spec, capability)?);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn listings(&self) -> Vec<ToolListing> {
        self.tools
            .values()
            .map(|tool| ToolListing {
                name: tool.spec.name.clone(),
                description: tool.spec.description.clone(),
                args: tool.spec.args_summary(),
            })
            .collect()
    }

    /// `None` when `name` is not registered.
    pub fn dispatch(&self, name: &str, raw_args: &Value) -> Option<ToolResult> {
        self.get(name).map(|tool| tool.invoke(raw_args))
    }
}

/// Registry with every built-in tool wired to `responder` and `cfg`.
pub fn default_registry<R>(cfg: &ToolsConfig, responder: R) -> Result<ToolRegistry>
where
    R: Responder + Clone + 'static,
{
    let mut registry = ToolRegistry::new();
    registry.register(
        price_compare::spec(&cfg.default_city),
        Box::new(price_compare::PriceCompare::new(&cfg.hospitals_path)),
    )?;
    registry.register(
        negotiator::spec(),
        Box::new(negotiator::CostNegotiator::new(responder.clone())),
    )?;
    registry.register(discharge::spec(), Box::new(discharge::DischargeOrchestrator))?;
    registry.register(
        translate::spec(),
        Box::new(translate::ReportTranslator::new(responder)),
    )?;
    Ok(registry)
}
