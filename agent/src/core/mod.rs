//! Deterministic, pure logic shared by the invocation layer and the agent loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data and return deterministic outputs suitable for tests.

pub mod action;
pub mod budget;
pub mod session;
pub mod strategy;
pub mod stream;
pub mod text;
pub mod types;
