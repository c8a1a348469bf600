use crate::trains::train::TrainId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanAction {
    /// Run on to the loop at `location_km` and wait there.
    RouteToLoop,
    /// Stop in place on the main line.
    Halt,
}

/// A proposed maneuver awaiting acceptance or rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub action: PlanAction,
    /// The train that has to yield.
    pub train_id: TrainId,
    pub location_km: Option<f64>,
    pub loop_name: Option<String>,
    /// The pursuing train this plan makes way for.
    pub caused_by: TrainId,
    pub reason: String,
}

impl Plan {
    pub fn route_to_loop(
        train_id: TrainId,
        loop_name: &str,
        location_km: f64,
        caused_by: TrainId,
    ) -> Self {
        Self {
            action: PlanAction::RouteToLoop,
            train_id,
            location_km: Some(location_km),
            loop_name: Some(loop_name.to_string()),
            caused_by,
            reason: format!("Loop at {} reachable before being overtaken", loop_name),
        }
    }

    pub fn halt(train_id: TrainId, caused_by: TrainId, reason: &str) -> Self {
        Self {
            action: PlanAction::Halt,
            train_id,
            location_km: None,
            loop_name: None,
            caused_by,
            reason: reason.to_string(),
        }
    }

    /// One-line description used in the decision log.
    pub fn describe(&self) -> String {
        match self.action {
            PlanAction::RouteToLoop => format!(
                "route {} to loop {} at {:.1} km for {}",
                self.train_id,
                self.loop_name.as_deref().unwrap_or("?"),
                self.location_km.unwrap_or_default(),
                self.caused_by
            ),
            PlanAction::Halt => format!(
                "halt {} in place for {} ({})",
                self.train_id, self.caused_by, self.reason
            ),
        }
    }
}
