//! Invocation strategy definitions.
//!
//! A strategy is pure configuration: which arguments to pass to the model
//! executable, how to encode the prompt on stdin, and how to read stdout.
//! The ordered list is a fixed priority (streaming first, primitive last).

use serde::{Deserialize, Serialize};
use serde_json::json;

/// Placeholder substituted with the model identifier in command templates.
pub const MODEL_PLACEHOLDER: &str = "{model}";

/// How the prompt is written to the child's stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEncoding {
    /// One JSON line holding a chat message list.
    Messages,
    /// The prompt text as-is.
    Raw,
}

/// How the child's stdout is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputEncoding {
    /// Line-delimited JSON chunks, read incrementally.
    JsonLines,
    /// The whole stdout blob after the child exits.
    Blob,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvocationStrategy {
    pub name: String,
    /// Arguments passed after the executable; may contain `{model}`.
    pub args: Vec<String>,
    pub input: InputEncoding,
    pub output: OutputEncoding,
}

impl InvocationStrategy {
    fn new(name: &str, args: &[&str], input: InputEncoding, output: OutputEncoding) -> Self {
        Self {
            name: name.to_string(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
            input,
            output,
        }
    }

    /// Arguments with the model placeholder substituted.
    pub fn render_args(&self, model: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(MODEL_PLACEHOLDER, model))
            .collect()
    }

    /// Stdin payload for `prompt`, newline terminated.
    pub fn encode_input(&self, prompt: &str) -> String {
        match self.input {
            InputEncoding::Messages => {
                let payload = json!({
                    "messages": [{ "role": "user", "content": prompt }]
                });
                format!("{payload}\n")
            }
            InputEncoding::Raw => format!("{prompt}\n"),
        }
    }
}

/// Default strategy chain for the `ollama` CLI.
pub fn default_strategies() -> Vec<InvocationStrategy> {
    vec![
        InvocationStrategy::new(
            "stream_json_chat",
            &["chat", "-m", MODEL_PLACEHOLDER, "--format", "json"],
            InputEncoding::Messages,
            OutputEncoding::JsonLines,
        ),
        InvocationStrategy::new(
            "no_stream_chat",
            &["chat", "-m", MODEL_PLACEHOLDER, "--no-stream"],
            InputEncoding::Messages,
            OutputEncoding::Blob,
        ),
        InvocationStrategy::new(
            "run",
            &["run", MODEL_PLACEHOLDER],
            InputEncoding::Raw,
            OutputEncoding::Blob,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn default_chain_is_streaming_first() {
        let names: Vec<String> = default_strategies().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["stream_json_chat", "no_stream_chat", "run"]);
    }

    #[test]
    fn render_args_substitutes_model() {
        let run = &default_strategies()[2];
        assert_eq!(run.render_args("llama3"), vec!["run", "llama3"]);
    }

    #[test]
    fn messages_encoding_is_one_json_line() {
        let chat = &default_strategies()[0];
        let encoded = chat.encode_input("line one\nline two");
        assert!(encoded.ends_with('\n'));
        assert_eq!(encoded.matches('\n').count(), 1);
        let value: Value = serde_json::from_str(encoded.trim_end()).expect("json");
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"], "line one\nline two");
    }

    #[test]
    fn raw_encoding_passes_prompt_through() {
        let run = &default_strategies()[2];
        assert_eq!(run.encode_input("hello"), "hello\n");
    }
}
