use crate::corridor::stations::{create_loops, create_stations, ROUTE_LENGTH_KM};
use crate::error::CorridorError;
use serde::{Deserialize, Serialize};

/// A stopping point on the corridor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub position_km: f64,
}

impl Station {
    pub fn new(name: &str, position_km: f64) -> Self {
        Self {
            name: name.to_string(),
            position_km,
        }
    }
}

/// A passing line at a station where a train can wait while another overtakes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassingLoop {
    pub name: String,
    pub position_km: f64,
}

impl PassingLoop {
    pub fn new(name: &str, position_km: f64) -> Self {
        Self {
            name: name.to_string(),
            position_km,
        }
    }
}

/// Static one-dimensional route geometry shared by every train.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corridor {
    length_km: f64,
    stations: Vec<Station>,
    /// Sorted by ascending position.
    loops: Vec<PassingLoop>,
}

impl Corridor {
    /// Builds a corridor, checking that stations strictly increase along the route
    /// and that every loop sits at a station.
    pub fn new(
        length_km: f64,
        stations: Vec<Station>,
        mut loops: Vec<PassingLoop>,
    ) -> Result<Self, CorridorError> {
        if !(length_km > 0.0) {
            return Err(CorridorError::NonPositiveLength(length_km));
        }

        let mut previous: Option<f64> = None;
        for station in &stations {
            if !(0.0..=length_km).contains(&station.position_km) {
                return Err(CorridorError::StationOutOfRange {
                    name: station.name.clone(),
                    position_km: station.position_km,
                });
            }
            if let Some(prev) = previous {
                if station.position_km <= prev {
                    return Err(CorridorError::StationsNotIncreasing {
                        name: station.name.clone(),
                    });
                }
            }
            previous = Some(station.position_km);
        }

        for passing_loop in &loops {
            let at_station = stations
                .iter()
                .any(|s| s.position_km == passing_loop.position_km);
            if !at_station {
                return Err(CorridorError::LoopWithoutStation {
                    name: passing_loop.name.clone(),
                    position_km: passing_loop.position_km,
                });
            }
        }
        loops.sort_by(|a, b| a.position_km.total_cmp(&b.position_km));

        Ok(Self {
            length_km,
            stations,
            loops,
        })
    }

    /// The Mumbai CST to Pune line.
    pub fn mumbai_pune() -> Self {
        Self {
            length_km: ROUTE_LENGTH_KM,
            stations: create_stations(),
            loops: create_loops(),
        }
    }

    pub fn length_km(&self) -> f64 {
        self.length_km
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn loops(&self) -> &[PassingLoop] {
        &self.loops
    }

    /// Nearest loop strictly ahead of `position_km`.
    pub fn next_loop_ahead(&self, position_km: f64) -> Option<&PassingLoop> {
        self.loops.iter().find(|l| l.position_km > position_km)
    }

    /// Stations strictly ahead of `position_km`, in route order.
    pub fn stations_ahead(&self, position_km: f64) -> impl Iterator<Item = &Station> {
        self.stations
            .iter()
            .filter(move |s| s.position_km > position_km)
    }
}

impl Default for Corridor {
    fn default() -> Self {
        Self::mumbai_pune()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_loop_ahead_is_strict() {
        let corridor = Corridor::mumbai_pune();

        let thane = corridor.next_loop_ahead(0.0).unwrap();
        assert_eq!(thane.name, "Thane");

        // Standing exactly on a loop looks past it.
        let kalyan = corridor.next_loop_ahead(41.9).unwrap();
        assert_eq!(kalyan.name, "Kalyan");
        assert_eq!(kalyan.position_km, 85.5);

        assert!(corridor.next_loop_ahead(150.1).is_none());
        assert!(corridor.next_loop_ahead(191.0).is_none());
    }

    #[test]
    fn test_loops_sorted_regardless_of_input_order() {
        let corridor = Corridor::new(
            100.0,
            vec![
                Station::new("A", 0.0),
                Station::new("B", 30.0),
                Station::new("C", 60.0),
                Station::new("D", 100.0),
            ],
            vec![PassingLoop::new("C", 60.0), PassingLoop::new("B", 30.0)],
        )
        .unwrap();

        assert_eq!(corridor.next_loop_ahead(10.0).unwrap().name, "B");
        assert_eq!(corridor.next_loop_ahead(30.0).unwrap().name, "C");
    }

    #[test]
    fn test_rejects_bad_geometry() {
        let unordered = Corridor::new(
            50.0,
            vec![Station::new("A", 10.0), Station::new("B", 10.0)],
            vec![],
        );
        assert_eq!(
            unordered,
            Err(CorridorError::StationsNotIncreasing {
                name: "B".to_string()
            })
        );

        let stray_loop = Corridor::new(
            50.0,
            vec![Station::new("A", 0.0), Station::new("B", 50.0)],
            vec![PassingLoop::new("Nowhere", 25.0)],
        );
        assert!(matches!(
            stray_loop,
            Err(CorridorError::LoopWithoutStation { .. })
        ));

        assert!(Corridor::new(0.0, vec![], vec![]).is_err());
        assert!(Corridor::new(50.0, vec![Station::new("Far", 60.0)], vec![]).is_err());
    }

    #[test]
    fn test_stations_ahead() {
        let corridor = Corridor::mumbai_pune();
        let names: Vec<_> = corridor
            .stations_ahead(100.0)
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["KARJAT", "LONAVALA", "PUNE"]);
    }
}
