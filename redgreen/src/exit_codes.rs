//! Stable exit codes for the `redgreen` and `eval` binaries.

/// Command succeeded; for `run`, the generated tests pass.
pub const OK: i32 = 0;
/// Invalid config, task or environment, or any other error.
pub const INVALID: i32 = 1;
/// The pipeline finished but the final test run failed.
pub const TESTS_FAILED: i32 = 2;
