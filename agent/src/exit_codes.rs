//! Stable exit codes for `toolagent` commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid config, arguments or other errors.
pub const INVALID: i32 = 1;
/// `toolagent run` spent its step budget without a final answer.
pub const EXHAUSTED: i32 = 2;
/// `toolagent ask` got a diagnostic instead of a model reply.
pub const DEGRADED: i32 = 3;
