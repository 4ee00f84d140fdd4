//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
/// At least one case failed or errored.
pub const CASES_FAILED: i32 = 1;
/// Suite could not be loaded, or the run itself failed.
pub const CONFIG_ERROR: i32 = 2;
