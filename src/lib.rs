pub mod control_system;
pub mod corridor;
pub mod error;
pub mod global_variables;
pub mod monitoring;
pub mod operator_console;
pub mod shared_data;
pub mod simulation_engine;
pub mod trains;
