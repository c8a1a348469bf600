use crate::corridor::route::{PassingLoop, Station};

pub const ROUTE_LENGTH_KM: f64 = 192.0;

pub fn create_stations() -> Vec<Station> {
    vec![
        Station::new("MUMBAI CST", 0.0),
        Station::new("THANE", 41.9),
        Station::new("KALYAN", 85.5),
        Station::new("KARJAT", 118.7),
        Station::new("LONAVALA", 150.1),
        Station::new("PUNE", ROUTE_LENGTH_KM),
    ]
}

// Every intermediate station has a loop; the termini do not.
pub fn create_loops() -> Vec<PassingLoop> {
    vec![
        PassingLoop::new("Thane", 41.9),
        PassingLoop::new("Kalyan", 85.5),
        PassingLoop::new("Karjat", 118.7),
        PassingLoop::new("Lonavala", 150.1),
    ]
}
