// control_system/mod.rs
pub mod advisor;
pub mod conflict_detector;
pub mod maneuver_planner;
