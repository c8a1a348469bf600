use crate::corridor::Corridor;
use crate::shared_data::{TrainView, UpcomingStation};
use crate::trains::plan::{Plan, PlanAction};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Stable key of a train across schedule, engine and wire formats.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainId(pub String);

impl TrainId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrainId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrainId {
    fn from(id: &str) -> Self {
        TrainId(id.to_string())
    }
}

impl From<String> for TrainId {
    fn from(id: String) -> Self {
        TrainId(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainStatus {
    OnSchedule,
    AdaptiveCruise,
    AwaitingDecision,
    EnRouteToLoop,
    HaltedInLoop,
    Halted,
    Arrived,
}

impl fmt::Display for TrainStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self {
            TrainStatus::OnSchedule => "ON_SCHEDULE",
            TrainStatus::AdaptiveCruise => "ADAPTIVE_CRUISE",
            TrainStatus::AwaitingDecision => "AWAITING_DECISION",
            TrainStatus::EnRouteToLoop => "EN_ROUTE_TO_LOOP",
            TrainStatus::HaltedInLoop => "HALTED_IN_LOOP",
            TrainStatus::Halted => "HALTED",
            TrainStatus::Arrived => "ARRIVED",
        };
        f.write_str(label)
    }
}

/// Something noteworthy that happened while a train moved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveOutcome {
    Moved,
    ReachedLoop(f64),
    Arrived,
    Stationary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Train {
    pub id: TrainId,
    pub name: String,
    pub class: String,
    pub priority: i32,
    /// Current speed in km/h.
    pub speed_kmh: f64,
    /// Nominal speed, restored whenever the train resumes.
    pub base_speed_kmh: f64,
    pub position_km: f64,
    pub status: TrainStatus,
    pub blocked_by: Option<TrainId>,
    pub maneuver_target_km: Option<f64>,
    pub adaptive_duration: Duration,
    pub pending_plan: Option<Plan>,
}

impl Train {
    /// A train at the start of the corridor, running at its nominal speed.
    pub fn new(id: TrainId, name: &str, class: &str, priority: i32, speed_kmh: f64) -> Self {
        Self {
            id,
            name: name.to_string(),
            class: class.to_string(),
            priority,
            speed_kmh,
            base_speed_kmh: speed_kmh,
            position_km: 0.0,
            status: TrainStatus::OnSchedule,
            blocked_by: None,
            maneuver_target_km: None,
            adaptive_duration: Duration::ZERO,
            pending_plan: None,
        }
    }

    pub fn at_position(mut self, position_km: f64) -> Self {
        self.position_km = position_km;
        self
    }

    /// Trains the conflict detector looks at.
    pub fn is_running_freely(&self) -> bool {
        matches!(
            self.status,
            TrainStatus::OnSchedule | TrainStatus::AdaptiveCruise
        )
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.status, TrainStatus::Halted | TrainStatus::HaltedInLoop)
    }

    pub fn is_stationary(&self) -> bool {
        self.is_halted() || self.status == TrainStatus::Arrived
    }

    /// Advances the train by one tick. The loop clamp wins over the arrival clamp.
    pub fn advance(&mut self, delta_hours: f64, route_length_km: f64) -> MoveOutcome {
        if self.is_stationary() {
            return MoveOutcome::Stationary;
        }
        let potential = self.position_km + self.speed_kmh * delta_hours;

        if self.status == TrainStatus::EnRouteToLoop {
            if let Some(target) = self.maneuver_target_km {
                if potential >= target {
                    self.position_km = target;
                    self.speed_kmh = 0.0;
                    self.status = TrainStatus::HaltedInLoop;
                    self.maneuver_target_km = None;
                    return MoveOutcome::ReachedLoop(target);
                }
            }
        }

        if potential >= route_length_km {
            self.position_km = route_length_km;
            self.speed_kmh = 0.0;
            self.status = TrainStatus::Arrived;
            self.maneuver_target_km = None;
            self.blocked_by = None;
            self.pending_plan = None;
            MoveOutcome::Arrived
        } else {
            self.position_km = potential;
            MoveOutcome::Moved
        }
    }

    /// Accumulates or resets the time spent in adaptive cruise.
    pub fn track_adaptive(&mut self, elapsed: Duration) {
        if self.status == TrainStatus::AdaptiveCruise {
            self.adaptive_duration += elapsed;
        } else {
            self.adaptive_duration = Duration::ZERO;
        }
    }

    /// Matches the speed of the train ahead. Returns true on entering the state.
    pub fn enter_adaptive_cruise(&mut self, ahead_speed_kmh: f64) -> bool {
        let entered = self.status != TrainStatus::AdaptiveCruise;
        self.status = TrainStatus::AdaptiveCruise;
        self.speed_kmh = ahead_speed_kmh;
        entered
    }

    pub fn leave_adaptive_cruise(&mut self) {
        self.status = TrainStatus::OnSchedule;
        self.speed_kmh = self.base_speed_kmh;
    }

    /// Attaches a plan. Status and plan always change together.
    pub fn await_decision(&mut self, plan: Plan) {
        self.blocked_by = Some(plan.caused_by.clone());
        self.status = TrainStatus::AwaitingDecision;
        self.pending_plan = Some(plan);
    }

    /// Executes the pending plan, returning what was executed.
    ///
    /// The train keeps running while the plan waits, so a loop it has already
    /// reached or passed turns the plan into a halt where it stands.
    pub fn accept_plan(&mut self) -> Option<Plan> {
        let mut plan = self.pending_plan.take()?;
        let loop_passed = plan
            .location_km
            .map_or(true, |km| km <= self.position_km);
        if plan.action == PlanAction::RouteToLoop && loop_passed {
            plan = Plan::halt(plan.train_id, plan.caused_by, "Loop already passed");
        }
        self.blocked_by = Some(plan.caused_by.clone());
        match plan.action {
            PlanAction::RouteToLoop => {
                self.status = TrainStatus::EnRouteToLoop;
                self.maneuver_target_km = plan.location_km;
            }
            PlanAction::Halt => {
                self.status = TrainStatus::Halted;
                self.speed_kmh = 0.0;
            }
        }
        Some(plan)
    }

    /// Drops the pending plan and returns the train to normal running.
    pub fn reject_plan(&mut self) -> Option<Plan> {
        let plan = self.pending_plan.take()?;
        self.resume();
        Some(plan)
    }

    pub fn resume(&mut self) {
        self.status = TrainStatus::OnSchedule;
        self.speed_kmh = self.base_speed_kmh;
        self.blocked_by = None;
        self.maneuver_target_km = None;
        self.adaptive_duration = Duration::ZERO;
    }

    /// Hours to cover `distance_km` at the current speed.
    pub fn hours_to_cover(&self, distance_km: f64) -> f64 {
        if self.speed_kmh > 0.0 {
            distance_km / self.speed_kmh
        } else {
            f64::INFINITY
        }
    }

    pub fn upcoming_stations(&self, corridor: &Corridor) -> Vec<UpcomingStation> {
        corridor
            .stations_ahead(self.position_km)
            .map(|station| {
                let distance = station.position_km - self.position_km;
                let eta_seconds = if self.speed_kmh > 0.0 {
                    Some((distance / self.speed_kmh * 3600.0) as u64)
                } else {
                    None
                };
                UpcomingStation {
                    name: station.name.clone(),
                    distance_km: round_to(distance, 1),
                    eta_seconds,
                }
            })
            .collect()
    }

    pub fn view(&self, corridor: &Corridor) -> TrainView {
        let upcoming_stations = self.upcoming_stations(corridor);
        let next_station = upcoming_stations.first().map(|s| s.name.clone());
        let eta_next_station = upcoming_stations.first().and_then(|s| s.eta_seconds);
        TrainView {
            id: self.id.clone(),
            name: self.name.clone(),
            class: self.class.clone(),
            priority: self.priority,
            speed_kmh: self.speed_kmh,
            position_km: round_to(self.position_km, 2),
            status: self.status,
            maneuver_target_km: self.maneuver_target_km,
            blocked_by: self.blocked_by.clone(),
            pending_plan: self.pending_plan.clone(),
            upcoming_stations,
            next_station,
            eta_next_station,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
