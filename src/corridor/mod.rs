// corridor/mod.rs
pub mod route;
pub mod stations;

pub use route::{Corridor, PassingLoop, Station};
