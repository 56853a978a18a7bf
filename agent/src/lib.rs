//! Local-model tool agent.
//!
//! Drives a locally installed model CLI (`ollama`) through an ordered chain of
//! invocation strategies and runs a bounded tool-calling loop on top of it.
//!
//! - **[`core`]**: Pure logic (action parsing, stream decoding, session state).
//!   No I/O.
//! - **[`io`]**: Child processes, executable discovery, config and prompts.
//! - **[`tools`]**: Tool registry with explicit argument schemas and the
//!   built-in tools.
//!
//! [`agent`] ties the façade and the registry together into the loop.

pub mod agent;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
