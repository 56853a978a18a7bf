//! Side-effecting code: configuration, child processes and model invocation.

pub mod config;
pub mod coordinator;
pub mod facade;
pub mod locate;
pub mod process;
pub mod prompt;
pub mod strategy;
