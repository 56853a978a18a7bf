//! `discharge_orchestrator`: fixed discharge paperwork guidance.

use anyhow::Result;
use serde_json::{Value, json};

use crate::tools::{Capability, ParamSpec, ToolArgs, ToolSpec};

pub const NAME: &str = "discharge_orchestrator";

const CHECKLIST: &[&str] = &[
    "Collect final bill and discharge summary signed by treating physician.",
    "Obtain pharmacy receipt and itemized list of medicines dispensed.",
    "Get OT notes and implant documentation (if any).",
    "Collect diagnostics and radiology reports on a CD/USB or PDF.",
    "Request a stamped, itemized invoice for insurance claims.",
    "Obtain doctor's contact details and follow-up instructions.",
];

const REQUIRED_DOCUMENTS: &[&str] = &[
    "Final bill",
    "Discharge summary",
    "Pharmacy receipts",
    "Investigations (reports)",
    "ID proof",
    "Insurance card (if applicable)",
];

pub fn spec() -> ToolSpec {
    ToolSpec::new(
        NAME,
        "Discharge checklist, required documents and an insurance claim email.",
        vec![
            ParamSpec::string("bill_text", "Final bill text, if available."),
            ParamSpec::string("hospital", "Hospital name for the claim email."),
        ],
    )
}

fn claim_email(hospital: &str) -> String {
    let hospital = if hospital.trim().is_empty() {
        "the hospital"
    } else {
        hospital.trim()
    };
    format!(
        "To: insurance@provider\nSubject: Claim submission for patient - {hospital}\n\n\
         Dear Claims Team,\n\nPlease find attached the final bill and supporting documents for \
         claim processing. Kindly confirm the documents required and the expected timeline.\n\n\
         Regards,\nPatient"
    )
}

pub struct DischargeOrchestrator;

impl Capability for DischargeOrchestrator {
    fn call(&self, args: &ToolArgs) -> Result<Value> {
        Ok(json!({
            "status": "ok",
            "checklist": CHECKLIST,
            "required_documents": REQUIRED_DOCUMENTS,
            "claim_email": claim_email(args.str("hospital")),
        }))
    }
}
