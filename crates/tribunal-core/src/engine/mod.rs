mod executor;
mod runner;

pub use executor::CaseExecutor;
pub use runner::{RunPhase, Runner};
