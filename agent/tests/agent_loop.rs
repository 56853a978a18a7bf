//! Agent loop behavior against scripted model replies and the real
//! built-in tools.

use std::fs;

use serde_json::{Value, json};

use toolagent::agent::{Agent, run_agent_prompt};
use toolagent::core::action::{Action, parse_action};
use toolagent::core::session::{EXHAUSTED_MESSAGE, Speaker, Termination};
use toolagent::io::config::ToolsConfig;
use toolagent::test_support::ScriptedResponder;
use toolagent::tools::{ParamSpec, ToolArgs, ToolRegistry, ToolSpec, default_registry};

const HOSPITALS: &str = r#"[
  {"id": "h1", "name": "City Care", "city": "Bangalore",
   "procedures": {"appendectomy": {"expected_price": 90000, "breakdown": {"ot": 30000}}}},
  {"id": "h2", "name": "Lake View", "city": "Bangalore",
   "procedures": {"appendectomy": {"expected_price": 65000, "breakdown": {"stay": 15000}}}}
]"#;

const CALL_PRICE_COMPARE: &str = r#"{"action":"call_tool","tool":"price_compare","args":{"procedure":"appendectomy","city":"Bangalore"}}"#;

fn builtin_registry(temp: &tempfile::TempDir, responder: &ScriptedResponder) -> ToolRegistry {
    let hospitals = temp.path().join("hospitals.json");
    fs::write(&hospitals, HOSPITALS).expect("write hospitals");
    let cfg = ToolsConfig {
        hospitals_path: hospitals,
        default_city: "Bangalore".to_string(),
    };
    default_registry(&cfg, responder.clone()).expect("registry")
}

#[test]
fn price_lookup_then_done_takes_two_model_calls() {
    let temp = tempfile::tempdir().expect("tempdir");
    let responder = ScriptedResponder::new([
        CALL_PRICE_COMPARE,
        r#"{"action":"done","result":"Lowest quote found."}"#,
    ]);
    let registry = builtin_registry(&temp, &responder);

    let outcome = Agent::new(&responder, &registry, 8000)
        .run("Where is an appendectomy cheapest in Bangalore?", 6)
        .expect("run");

    assert_eq!(outcome.answer, "Lowest quote found.");
    assert_eq!(outcome.termination, Termination::Done);
    assert_eq!(responder.calls(), 2);
    assert_eq!(outcome.steps, 2);

    let second = &responder.prompts()[1];
    assert!(second.contains("Tool result from price_compare:"));
    assert!(second.contains("Lake View (Bangalore) - ₹65000."));
    let speakers: Vec<Speaker> = outcome.transcript.iter().map(|t| t.speaker).collect();
    assert_eq!(
        speakers,
        vec![
            Speaker::User,
            Speaker::Model,
            Speaker::Runner,
            Speaker::Model
        ]
    );
}

#[test]
fn prose_only_replies_exhaust_the_budget() {
    let temp = tempfile::tempdir().expect("tempdir");
    let responder = ScriptedResponder::new(["I think you should ask the hospital directly."]);
    let registry = builtin_registry(&temp, &responder);

    let outcome = Agent::new(&responder, &registry, 8000)
        .run("compare prices", 6)
        .expect("run");

    assert_eq!(outcome.answer, EXHAUSTED_MESSAGE);
    assert_eq!(outcome.termination, Termination::Exhausted);
    assert_eq!(responder.calls(), 6);
    assert!(
        responder.prompts()[1]
            .contains("You must reply with the action JSON only.")
    );
}

#[test]
fn budget_of_one_runs_the_tool_then_exhausts() {
    let temp = tempfile::tempdir().expect("tempdir");
    let responder = ScriptedResponder::new([CALL_PRICE_COMPARE]);
    let registry = builtin_registry(&temp, &responder);

    let outcome = Agent::new(&responder, &registry, 8000)
        .run("compare prices", 1)
        .expect("run");

    assert_eq!(outcome.answer, EXHAUSTED_MESSAGE);
    assert_eq!(responder.calls(), 1);
    let last = outcome.transcript.last().expect("turn");
    assert_eq!(last.speaker, Speaker::Runner);
    assert!(last.text.contains("\"status\": \"ok\""));
}

#[test]
fn unknown_tool_lists_available_tools() {
    let temp = tempfile::tempdir().expect("tempdir");
    let responder = ScriptedResponder::new([
        r#"{"action":"call_tool","tool":"book_flight","args":{}}"#,
        r#"{"action":"done","result":"ok"}"#,
    ]);
    let registry = builtin_registry(&temp, &responder);

    let outcome = Agent::new(&responder, &registry, 8000)
        .run("book me a flight", 4)
        .expect("run");

    assert_eq!(outcome.answer, "ok");
    let second = &responder.prompts()[1];
    assert!(second.contains(r#"{"error":"Unknown tool: book_flight"}"#));
    assert!(second.contains(
        "Available tools: cost_negotiator, discharge_orchestrator, price_compare, translate_report."
    ));
}

#[test]
fn tool_failures_are_fed_back_not_raised() {
    let temp = tempfile::tempdir().expect("tempdir");
    let responder = ScriptedResponder::new([
        r#"{"action":"call_tool","tool":"translate_report","args":{"report_text":""}}"#,
        r#"{"action":"done","result":"could not translate"}"#,
    ]);
    let registry = builtin_registry(&temp, &responder);

    let outcome = Agent::new(&responder, &registry, 8000)
        .run("explain my report", 4)
        .expect("run");

    assert_eq!(outcome.answer, "could not translate");
    assert!(responder.prompts()[1].contains(r#""error": "report_text is empty""#));
}

#[test]
fn tool_result_round_trips_through_done() {
    let mut registry = ToolRegistry::new();
    registry
        .register(
            ToolSpec::new(
                "lookup",
                "Lookup.",
                vec![ParamSpec::string("key", "Key.")],
            ),
            Box::new(|args: &ToolArgs| -> anyhow::Result<Value> {
                Ok(json!({"key": args.str("key"), "value": "₹ 65,000 \"all-in\""}))
            }),
        )
        .expect("register");

    let marker = "Tool result from lookup:\n";
    let responder = |prompt: &str| -> String {
        match prompt.rfind(marker) {
            None => r#"{"action":"call_tool","tool":"lookup","args":"k1"}"#.to_string(),
            Some(start) => {
                let rest = &prompt[start + marker.len()..];
                let end = rest.find("\n\nContinue").expect("continue marker");
                json!({"action": "done", "result": &rest[..end]}).to_string()
            }
        }
    };

    let outcome = Agent::new(&responder, &registry, 8000)
        .run("look it up", 3)
        .expect("run");

    let expected = registry
        .dispatch("lookup", &json!("k1"))
        .expect("known tool")
        .to_prompt_json();
    assert_eq!(outcome.answer, expected);
}

#[test]
fn parsing_the_same_reply_twice_is_identical() {
    let reply = format!("Let me check. {CALL_PRICE_COMPARE} Thanks.");
    let first = parse_action(&reply).expect("parse");
    let second = parse_action(&reply).expect("parse");
    assert_eq!(first, second);
    assert_eq!(
        first,
        Action::CallTool {
            tool: "price_compare".to_string(),
            args: json!({"procedure": "appendectomy", "city": "Bangalore"}),
        }
    );
}

#[cfg(unix)]
#[test]
fn prompt_entry_point_defaults_to_the_configured_budget() {
    let temp = tempfile::tempdir().expect("tempdir");
    let calls = temp.path().join("calls");
    let script = toolagent::test_support::write_fake_model(
        temp.path(),
        &format!(
            "echo step >> '{}'; cat >/dev/null; echo 'still thinking'",
            calls.display()
        ),
    );
    let mut cfg = toolagent::test_support::fake_config(&script, 5);
    cfg.agent.max_steps = 3;

    assert_eq!(run_agent_prompt(&cfg, "compare prices", None), EXHAUSTED_MESSAGE);
    let steps = fs::read_to_string(&calls).expect("calls log");
    assert_eq!(steps.lines().count(), 3);
}
