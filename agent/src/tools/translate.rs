//! `translate_report`: plain-language summary of a medical report.
//!
//! The model is asked for labelled sections (Summary, Explanation, Next Steps,
//! Urgency). Replies arrive whitespace-collapsed, so sections are recovered
//! by label rather than by line. Without a model a keyword scan produces a
//! minimal summary instead.

use std::sync::LazyLock;

use anyhow::{Result, bail};
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::info;

use crate::io::facade::{Responder, is_degraded};
use crate::tools::{Capability, ParamSpec, ToolArgs, ToolSpec};

pub const NAME: &str = "translate_report";

const FINDING_KEYWORDS: &[&str] = &[
    "lesion",
    "fracture",
    "opacity",
    "nodule",
    "mass",
    "appendix",
    "appendicitis",
    "effusion",
    "tear",
    "fat stranding",
];

static SUMMARY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)Summary:\s*-?\s*(.*?)\s*Explanation:").expect("static regex")
});
static EXPLANATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)Explanation:\s*(.*?)\s*Next Steps:").expect("static regex"));
static NEXT_STEPS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)Next Steps:\s*(.*?)\s*Urgency:").expect("static regex"));
static URGENCY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Urgency:\s*(URGENT|ROUTINE)").expect("static regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)-+\s+").expect("static regex"));

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        NAME,
        "Translate a medical report into patient-friendly language with next steps.",
        vec![ParamSpec::string("report_text", "Full text of the report.")],
    )
}

fn translation_prompt(report: &str) -> String {
    format!(
        "You are a medical translator assistant. Translate the following medical report into \
         simple, patient-friendly English. Output EXACTLY these labeled sections (no extra text):\n\n\
         Summary:\n- <1-2 sentence plain summary>\n\n\
         Explanation:\n- <bullet points of key findings>\n\n\
         Next Steps:\n- <2-3 actionable suggestions (e.g., see specialist, get tests, emergency)>\n\n\
         Urgency: <URGENT or ROUTINE>\n\n\
         Report:\n{report}\n"
    )
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Sections {
    pub summary: String,
    pub explanation: Vec<String>,
    pub next_steps: Vec<String>,
    pub urgency: String,
}

fn bullets(block: &str) -> Vec<String> {
    BULLET_RE
        .split(block)
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Recover labelled sections; missing ones stay empty, urgency defaults to ROUTINE.
pub fn parse_sections(text: &str) -> Sections {
    Sections {
        summary: capture(&SUMMARY_RE, text).unwrap_or_default(),
        explanation: capture(&EXPLANATION_RE, text)
            .map(|b| bullets(&b))
            .unwrap_or_default(),
        next_steps: capture(&NEXT_STEPS_RE, text)
            .map(|b| bullets(&b))
            .unwrap_or_default(),
        urgency: capture(&URGENCY_RE, text)
            .map(|u| u.to_uppercase())
            .unwrap_or_else(|| "ROUTINE".to_string()),
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Keyword scan used when the model is unavailable.
pub fn fallback_summary(report: &str) -> String {
    let findings: Vec<&str> = report
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let lower = line.to_lowercase();
            FINDING_KEYWORDS.iter().any(|k| lower.contains(k))
        })
        .collect();
    let summary = if findings.is_empty() {
        "No clear findings.".to_string()
    } else {
        findings.iter().take(2).copied().collect::<Vec<_>>().join(", ")
    };
    let explanation: Vec<&str> = findings.iter().take(3).copied().collect();
    format!(
        "Summary:\n- Possible findings: {summary}\n\nExplanation:\n- {}\n\n\
         Next Steps:\n- Follow up with your doctor.\n\nUrgency: ROUTINE",
        explanation.join("\n- ")
    )
}

pub struct ReportTranslator<R> {
    responder: R,
}

impl<R: Responder> ReportTranslator<R> {
    pub fn new(responder: R) -> Self {
        Self { responder }
    }
}

impl<R: Responder> Capability for ReportTranslator<R> {
    fn call(&self, args: &ToolArgs) -> Result<Value> {
        let report = args.str("report_text").trim();
        if report.is_empty() {
            bail!("report_text is empty");
        }
        let reply = self.responder.respond(&translation_prompt(report));
        if is_degraded(&reply) || reply.trim().is_empty() {
            info!("model unavailable, using keyword summary");
            let text = fallback_summary(report);
            return Ok(json!({
                "status": "ok",
                "source": "fallback",
                "human_text": text,
                "structured": parse_sections(&text),
            }));
        }
        Ok(json!({
            "status": "ok",
            "source": "model",
            "structured": parse_sections(&reply),
            "human_text": reply,
        }))
    }
}
