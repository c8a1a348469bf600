pub mod decision_log;
pub mod delay_injector;
pub mod engine;
pub mod schedule;

pub use engine::{Engine, EngineConfig};
