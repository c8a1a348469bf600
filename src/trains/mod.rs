// trains/mod.rs
pub mod plan;
pub mod train;

pub use plan::{Plan, PlanAction};
pub use train::{Train, TrainId, TrainStatus};
