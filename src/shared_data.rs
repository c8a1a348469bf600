// src/shared_data.rs

use crate::trains::{Plan, Train, TrainId, TrainStatus};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// One row of the departure feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: TrainId,
    pub name: String,
    pub class: String,
    pub priority: i32,
    pub speed_kmh: f64,
    pub departure_time_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpcomingStation {
    pub name: String,
    pub distance_km: f64,
    /// `None` while the train is stopped.
    pub eta_seconds: Option<u64>,
}

/// Presentation view of a single train.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainView {
    pub id: TrainId,
    pub name: String,
    pub class: String,
    pub priority: i32,
    pub speed_kmh: f64,
    pub position_km: f64,
    pub status: TrainStatus,
    pub maneuver_target_km: Option<f64>,
    pub blocked_by: Option<TrainId>,
    pub pending_plan: Option<Plan>,
    pub upcoming_stations: Vec<UpcomingStation>,
    pub next_station: Option<String>,
    pub eta_next_station: Option<u64>,
}

/// Complete state of the corridor at one instant, trains ordered by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub simulation_time: String,
    pub simulation_seconds: u64,
    pub trains: Vec<TrainView>,
}

/// Audit entry of the decision log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub timestamp: u64,
    pub simulation_seconds: u64,
    pub text: String,
}

/// What the advisor is told about each train.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainSummary {
    pub id: TrainId,
    pub name: String,
    pub priority: i32,
    pub position_km: f64,
    pub speed_kmh: f64,
}

impl From<&Train> for TrainSummary {
    fn from(train: &Train) -> Self {
        Self {
            id: train.id.clone(),
            name: train.name.clone(),
            priority: train.priority,
            position_km: train.position_km,
            speed_kmh: train.speed_kmh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorRequest {
    /// The faster train catching up from behind.
    pub pursuer: TrainSummary,
    /// The slower train ahead.
    pub blocker: TrainSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdvisorResponse {
    pub train_id_to_wait: TrainId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Reject,
}

/// Ordering of decision history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    OldestFirst,
    NewestFirst,
}

pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Formats simulated seconds as `HH:MM:SS`.
pub fn format_clock(seconds: u64) -> String {
    let (mins, secs) = (seconds / 60, seconds % 60);
    let (hours, mins) = (mins / 60, mins % 60);
    format!("{:02}:{:02}:{:02}", hours, mins, secs)
}
