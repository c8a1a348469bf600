pub mod corridor_monitor;
pub mod state_publisher;
