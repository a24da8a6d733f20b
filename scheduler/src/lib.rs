//! The live scheduler: one job per running strategy instance.

pub mod executor;
pub mod schedule;
pub mod scheduler;

pub use executor::Executor;
pub use scheduler::Scheduler;
