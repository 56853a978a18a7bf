//! `cost_negotiator`: a short phone script for asking a hospital for a
//! binding all-inclusive quote.

use anyhow::Result;
use serde_json::{Value, json};
use tracing::info;

use crate::io::facade::{Responder, is_degraded};
use crate::tools::{Capability, ParamSpec, ToolArgs, ToolSpec};

pub const NAME: &str = "cost_negotiator";

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        NAME,
        "Draft a negotiation script and questions for a procedure given hospital quotes.",
        vec![
            ParamSpec::string("procedure", "Procedure being negotiated."),
            ParamSpec::list("quotes", "Quotes from price_compare, cheapest first."),
        ],
    )
}

fn script_prompt(procedure: &str, quotes: &[Value]) -> String {
    let quotes = serde_json::to_string(quotes).unwrap_or_else(|_| "[]".to_string());
    format!(
        "You are a negotiation assistant. Given these hospital quotes, create 3 concise lines a \
         patient can say on call to request an all-inclusive binding quote, and 2 questions to \
         confirm no hidden charges.\n\n\
         Procedure: {procedure}\nQuotes: {quotes}\n\n\
         Return:\nScript:\n- line1\n- line2\n- line3\n\nQuestions:\n- q1\n- q2"
    )
}

fn lowest_price(quotes: &[Value]) -> Option<u64> {
    quotes
        .iter()
        .filter_map(|q| q.get("expected_price").and_then(Value::as_u64))
        .min()
}

/// Script used when the model is unavailable.
pub fn template_script(procedure: &str, quotes: &[Value]) -> String {
    let competing = lowest_price(quotes)
        .map(|p| format!("₹{p}"))
        .unwrap_or_else(|| "₹...".to_string());
    format!(
        "Hello, I need an all-inclusive, fixed-price quote for {procedure}. \
         Can you confirm the price includes surgeon, OT, implants, stay, and medicines?\n\
         If you can match the lowest competing quote ({competing}), I will book with you.\n\n\
         Questions:\n- Is this an all-inclusive price?\n\
         - Are there any additional consumable or surgeon fees not listed?"
    )
}

pub struct CostNegotiator<R> {
    responder: R,
}

impl<R: Responder> CostNegotiator<R> {
    pub fn new(responder: R) -> Self {
        Self { responder }
    }
}

impl<R: Responder> Capability for CostNegotiator<R> {
    fn call(&self, args: &ToolArgs) -> Result<Value> {
        let procedure = args.str("procedure");
        let quotes = args.list("quotes");
        let reply = self.responder.respond(&script_prompt(procedure, quotes));
        if is_degraded(&reply) || reply.trim().is_empty() {
            info!("model unavailable, using template negotiation script");
            return Ok(json!({
                "status": "ok",
                "source": "template",
                "script": template_script(procedure, quotes),
            }));
        }
        Ok(json!({ "status": "ok", "source": "model", "script": reply }))
    }
}
