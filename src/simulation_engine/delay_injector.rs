use crate::control_system::conflict_detector::ConflictKey;
use crate::corridor::Corridor;
use crate::error::EngineError;
use crate::shared_data::format_clock;
use crate::simulation_engine::engine::{Engine, EngineState};
use crate::trains::{TrainId, TrainStatus};
use std::time::Duration;
use tokio::task::JoinHandle;

impl Engine {
    /// Takes a train out of service for `duration` of wall-clock time.
    ///
    /// A running train is sent into the next loop ahead if there is one and
    /// otherwise stops where it is. A train that is already stopped stays put.
    /// A timer task puts it back to normal running afterwards; the returned
    /// handle completes once that has happened.
    pub fn inject_delay(
        &self,
        id: &TrainId,
        duration: Duration,
    ) -> Result<JoinHandle<()>, EngineError> {
        {
            let mut state = self.lock();
            if state.ticks == 0 {
                return Err(EngineError::NotRunning);
            }
            begin_delay(&mut state, self.corridor(), id, duration)?;
        }

        let engine = self.clone();
        let id = id.clone();
        Ok(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            engine.end_delay(&id);
        }))
    }

    fn end_delay(&self, id: &TrainId) {
        let mut state = self.lock();
        let Some(train) = state.trains.get_mut(id) else {
            return;
        };
        // Only a train still held by this delay is released. A train that was
        // planned around in the meantime carries a blocker and is left alone.
        let delayed = train.blocked_by.is_none()
            && (train.is_halted() || train.status == TrainStatus::EnRouteToLoop);
        if !delayed {
            return;
        }
        train.resume();
        let name = train.name.clone();
        let clock = format_clock(state.simulation_seconds());
        log::info!("[Time {}] Delay over: {} back in service", clock, name);
        state.record(format!("Delay over: {} resumed at base speed", name));
    }
}

fn begin_delay(
    state: &mut EngineState,
    corridor: &Corridor,
    id: &TrainId,
    duration: Duration,
) -> Result<(), EngineError> {
    let train = state
        .trains
        .get_mut(id)
        .ok_or_else(|| EngineError::TrainNotFound(id.clone()))?;
    if train.status == TrainStatus::Arrived {
        return Err(EngineError::TrainArrived(id.clone()));
    }

    let mut released = Vec::new();
    if let Some(plan) = train.pending_plan.take() {
        released.push(ConflictKey::new(plan.caused_by, id.clone()));
    }
    if let Some(blocker) = train.blocked_by.take() {
        released.push(ConflictKey::new(blocker, id.clone()));
    }
    train.adaptive_duration = Duration::ZERO;

    let action = if train.is_halted() {
        train.speed_kmh = 0.0;
        format!("held in place at {:.2} km", train.position_km)
    } else if let Some(passing_loop) = corridor.next_loop_ahead(train.position_km) {
        train.status = TrainStatus::EnRouteToLoop;
        train.speed_kmh = train.base_speed_kmh;
        train.maneuver_target_km = Some(passing_loop.position_km);
        format!("routed to loop {} at {} km", passing_loop.name, passing_loop.position_km)
    } else {
        train.status = TrainStatus::Halted;
        train.speed_kmh = 0.0;
        train.maneuver_target_km = None;
        format!("halted at {:.2} km", train.position_km)
    };
    let name = train.name.clone();

    for key in &released {
        state.conflicts.remove(key);
    }
    let clock = format_clock(state.simulation_seconds());
    log::info!(
        "[Time {}] DELAY: {} {} for {}s",
        clock,
        name,
        action,
        duration.as_secs()
    );
    state.record(format!(
        "Delay injected: {} {} for {}s",
        name,
        action,
        duration.as_secs()
    ));
    Ok(())
}
