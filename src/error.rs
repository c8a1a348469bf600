use crate::trains::TrainId;
use thiserror::Error;

/// Errors returned by the engine's external entry points.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("train {0} not found")]
    TrainNotFound(TrainId),

    #[error("train {0} has no pending plan")]
    PlanNotFound(TrainId),

    #[error("train {0} is already being tracked")]
    DuplicateTrain(TrainId),

    #[error("train {0} has already arrived")]
    TrainArrived(TrainId),

    #[error("train {0} is not being held for another train")]
    NotHeld(TrainId),

    #[error("no simulation is running")]
    NotRunning,

    #[error("invalid train {id}: {reason}")]
    InvalidTrain { id: TrainId, reason: String },

    #[error("schedule feed error: {0}")]
    Schedule(String),
}

impl EngineError {
    /// True for the not-found family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TrainNotFound(_) | Self::PlanNotFound(_))
    }
}

/// Failures of the external advisory capability.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("advisor unavailable: {0}")]
    Unavailable(String),

    #[error("advisor timed out after {0}ms")]
    Timeout(u64),
}

/// Rejected corridor geometry.
#[derive(Debug, Error, PartialEq)]
pub enum CorridorError {
    #[error("corridor length must be positive, got {0}")]
    NonPositiveLength(f64),

    #[error("station {name} at {position_km} km lies outside the corridor")]
    StationOutOfRange { name: String, position_km: f64 },

    #[error("station {name} is not strictly after the previous station")]
    StationsNotIncreasing { name: String },

    #[error("loop {name} at {position_km} km does not coincide with a station")]
    LoopWithoutStation { name: String, position_km: f64 },
}

/// Failures talking to the message broker.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("broker error: {0}")]
    Amqp(#[from] amiquip::Error),

    #[error("payload encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("broker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
