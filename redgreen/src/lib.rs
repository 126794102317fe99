//! Test-driven code generation driven by a language model.
//!
//! A task (prompt plus target filename) runs through Stub → Red → Green:
//! the model writes signatures, then a failing test, then the
//! implementation. Every generated artifact passes through a bounded
//! run-and-fix loop in a sandboxed interpreter before it is persisted.
//!
//! - **[`core`]**: Pure logic (code extraction, signature parsing, phase
//!   transitions, cost accounting). No I/O.
//! - **[`io`]**: Model backend, sandbox, external checks, prompts and files.
//!   Each side effect sits behind a trait so tests can script it.
//!
//! [`pipeline::run_task`] wires the [`agents`] together for one task.

pub mod agents;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod repair;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
