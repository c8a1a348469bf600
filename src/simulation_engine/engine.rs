// engine.rs
use crate::control_system::advisor::{advise_within, default_explanation, Advisor};
use crate::control_system::conflict_detector::{
    detect_conflicts, sweep_resolved, ConflictKey, Escalation,
};
use crate::control_system::maneuver_planner::{choose_yielding, plan_maneuver};
use crate::corridor::Corridor;
use crate::error::{AdvisorError, EngineError};
use crate::global_variables::{
    DEFAULT_ADVISOR_TIMEOUT_SECS, DEFAULT_TICK_INTERVAL_MS, DEFAULT_TIME_SCALE,
};
use crate::shared_data::{
    format_clock, AdvisorResponse, Decision, DecisionRecord, Order, ScheduleEntry, StateSnapshot,
    TrainSummary,
};
use crate::simulation_engine::decision_log::DecisionLog;
use crate::simulation_engine::schedule::ScheduleSource;
use crate::trains::train::MoveOutcome;
use crate::trains::{Plan, Train, TrainId};

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock time between ticks.
    pub tick_interval: Duration,
    /// Simulated seconds per wall-clock second.
    pub time_scale: u32,
    /// Upper bound on a single advisory call.
    pub advisor_timeout: Duration,
    /// Execute proposed plans immediately instead of waiting for an operator.
    pub auto_accept: bool,
}

impl EngineConfig {
    /// Simulated time covered by one tick.
    pub fn sim_step(&self) -> Duration {
        self.tick_interval * self.time_scale
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            time_scale: DEFAULT_TIME_SCALE,
            advisor_timeout: Duration::from_secs(DEFAULT_ADVISOR_TIMEOUT_SECS),
            auto_accept: false,
        }
    }
}

/// Everything guarded by the engine lock.
#[derive(Debug, Default)]
pub struct EngineState {
    pub(crate) clock: Duration,
    pub(crate) ticks: u64,
    pub(crate) trains: BTreeMap<TrainId, Train>,
    pub(crate) conflicts: HashSet<ConflictKey>,
    pub(crate) schedule: Vec<ScheduleEntry>,
    pub(crate) log: DecisionLog,
    rejected_entries: HashSet<TrainId>,
}

impl EngineState {
    pub fn simulation_seconds(&self) -> u64 {
        self.clock.as_secs()
    }

    pub(crate) fn record(&mut self, text: impl Into<String>) {
        let now = self.simulation_seconds();
        self.log.record(now, text);
    }

    fn spawn_due_trains(&mut self, route_length_km: f64) {
        let now = self.simulation_seconds();
        let due: Vec<ScheduleEntry> = self
            .schedule
            .iter()
            .filter(|e| now >= e.departure_time_seconds && !self.trains.contains_key(&e.id))
            .cloned()
            .collect();

        for entry in due {
            let train = Train::new(
                entry.id.clone(),
                &entry.name,
                &entry.class,
                entry.priority,
                entry.speed_kmh,
            );
            if let Err(e) = validate_train(&train, route_length_km) {
                if self.rejected_entries.insert(entry.id.clone()) {
                    log::warn!("Skipping schedule entry: {}", e);
                }
                continue;
            }
            log::info!(
                "[Time {}] SPAWNED: Train {}",
                format_clock(now),
                train.name
            );
            self.trains.insert(train.id.clone(), train);
        }
    }

    fn move_trains(&mut self, delta_hours: f64, route_length_km: f64) {
        let mut arrived = Vec::new();
        for train in self.trains.values_mut() {
            match train.advance(delta_hours, route_length_km) {
                MoveOutcome::ReachedLoop(km) => {
                    log::info!("{} has reached the loop at {} km and is halting", train.name, km);
                }
                MoveOutcome::Arrived => arrived.push((train.id.clone(), train.name.clone())),
                MoveOutcome::Moved | MoveOutcome::Stationary => {}
            }
        }
        for (id, name) in arrived {
            self.conflicts.retain(|key| !key.involves(&id));
            let clock = format_clock(self.simulation_seconds());
            log::info!("[Time {}] ARRIVED: Train {}", clock, name);
            self.record(format!("{} arrived at the end of the corridor", name));
        }
    }

    /// Turns an advisor answer into a plan on the yielding train.
    ///
    /// Returns `None` and releases the conflict when the situation changed while
    /// the advisor was thinking.
    pub(crate) fn apply_advice(
        &mut self,
        corridor: &Corridor,
        key: &ConflictKey,
        response: &AdvisorResponse,
        auto_accept: bool,
    ) -> Option<Plan> {
        let choice = choose_yielding(key, response);
        let plan = match (self.trains.get(&choice.train_id), self.trains.get(&key.pursuer)) {
            (Some(yielding), Some(pursuer)) if yielding.is_running_freely() => {
                plan_maneuver(corridor, yielding, pursuer)
            }
            _ => {
                log::info!("Conflict {} changed while awaiting advice; dropping it", key);
                self.conflicts.remove(key);
                return None;
            }
        };

        if choice.overridden {
            self.record(format!(
                "Advisor asked {} to wait; overriding, {} yields",
                response.train_id_to_wait, choice.train_id
            ));
        }
        self.record(format!("Proposed plan: {}", plan.describe()));

        let train = self.trains.get_mut(&choice.train_id)?;
        train.await_decision(plan.clone());
        if auto_accept {
            train.accept_plan();
            let name = train.name.clone();
            self.record(format!("Plan for {} accepted automatically", name));
        }
        Some(plan)
    }

    pub(crate) fn fail_consultation(&mut self, key: &ConflictKey, error: &AdvisorError) {
        log::warn!("Advisor failed for conflict {}: {}", key, error);
        self.conflicts.remove(key);
        self.record(format!("Advisor unavailable for {} ({}); will retry", key, error));
    }

    pub(crate) fn decide(&mut self, id: &TrainId, decision: Decision) -> Result<Plan, EngineError> {
        let train = self
            .trains
            .get_mut(id)
            .ok_or_else(|| EngineError::TrainNotFound(id.clone()))?;
        let name = train.name.clone();

        let plan = match decision {
            Decision::Accept => train.accept_plan(),
            Decision::Reject => train.reject_plan(),
        }
        .ok_or_else(|| EngineError::PlanNotFound(id.clone()))?;

        match decision {
            Decision::Accept => {
                self.record(format!("Controller ACCEPTED plan for {}: {}", name, plan.describe()));
            }
            Decision::Reject => {
                self.conflicts
                    .remove(&ConflictKey::new(plan.caused_by.clone(), id.clone()));
                self.record(format!("Controller REJECTED plan for {}", name));
            }
        }
        Ok(plan)
    }

    fn snapshot(&self, corridor: &Corridor) -> StateSnapshot {
        StateSnapshot {
            simulation_time: format_clock(self.simulation_seconds()),
            simulation_seconds: self.simulation_seconds(),
            trains: self.trains.values().map(|t| t.view(corridor)).collect(),
        }
    }

    pub fn state_string(&self) -> String {
        let mut out = format!(
            "--- Simulation Time: {} ---",
            format_clock(self.simulation_seconds())
        );
        if self.trains.is_empty() {
            out.push_str("\nNo trains currently on the track.");
        }
        for train in self.trains.values() {
            out.push_str(&format!(
                "\n  > {} ({}): Pos={:.2} km, Status={}",
                train.name, train.id, train.position_km, train.status
            ));
        }
        out
    }
}

fn validate_train(train: &Train, route_length_km: f64) -> Result<(), EngineError> {
    let invalid = |reason: &str| EngineError::InvalidTrain {
        id: train.id.clone(),
        reason: reason.to_string(),
    };
    if !train.speed_kmh.is_finite() || train.speed_kmh < 0.0 {
        return Err(invalid("speed must be a non-negative number"));
    }
    if !(0.0..=route_length_km).contains(&train.position_km) {
        return Err(invalid("position lies outside the corridor"));
    }
    Ok(())
}

/// The simulation/control engine. Cheap to clone; all clones share one state.
#[derive(Clone)]
pub struct Engine {
    state: Arc<Mutex<EngineState>>,
    corridor: Arc<Corridor>,
    schedule: Arc<dyn ScheduleSource>,
    advisor: Arc<dyn Advisor>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        corridor: Corridor,
        schedule: Arc<dyn ScheduleSource>,
        advisor: Arc<dyn Advisor>,
        config: EngineConfig,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(EngineState::default())),
            corridor: Arc::new(corridor),
            schedule,
            advisor,
            config,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn corridor(&self) -> &Corridor {
        &self.corridor
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs one tick of the movement and conflict model under the lock and
    /// returns the conflicts that need the advisor. Nothing is dispatched.
    pub fn advance(&self) -> Vec<Escalation> {
        self.advance_with(self.schedule.load())
    }

    fn advance_with(&self, loaded: Result<Vec<ScheduleEntry>, EngineError>) -> Vec<Escalation> {
        let route_length = self.corridor.length_km();
        let step = self.config.sim_step();

        let mut guard = self.lock();
        let state = &mut *guard;
        match loaded {
            Ok(entries) => state.schedule = entries,
            Err(e) => log::warn!("Keeping previous schedule: {}", e),
        }

        state.clock += step;
        state.ticks += 1;
        state.spawn_due_trains(route_length);
        state.move_trains(step.as_secs_f64() / 3600.0, route_length);
        for train in state.trains.values_mut() {
            train.track_adaptive(step);
        }

        for (resumed, blocker) in sweep_resolved(&mut state.trains, &mut state.conflicts) {
            state.record(format!("Conflict resolved: {} restarted after {} cleared", resumed, blocker));
        }
        let escalations = detect_conflicts(&mut state.trains, &mut state.conflicts);

        log::debug!("{}", state.state_string());
        escalations
    }

    /// One full tick: advance, then consult the advisor for each new conflict
    /// on its own task.
    pub fn tick(&self) -> Vec<JoinHandle<()>> {
        let escalations = self.advance();
        self.dispatch(escalations)
    }

    pub fn dispatch(&self, escalations: Vec<Escalation>) -> Vec<JoinHandle<()>> {
        escalations
            .into_iter()
            .map(|escalation| {
                let engine = self.clone();
                tokio::spawn(async move { engine.consult(escalation).await })
            })
            .collect()
    }

    /// Ticks forever at the configured cadence. The schedule feed is read on
    /// the blocking pool.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        log::info!(
            "Simulation started: {} simulated seconds per tick",
            self.config.sim_step().as_secs_f64()
        );
        loop {
            interval.tick().await;
            let source = Arc::clone(&self.schedule);
            let loaded = tokio::task::spawn_blocking(move || source.load())
                .await
                .unwrap_or_else(|e| Err(EngineError::Schedule(e.to_string())));
            let escalations = self.advance_with(loaded);
            self.dispatch(escalations);
        }
    }

    /// Asks the advisor about one conflict. The lock is only taken once the
    /// answer is in.
    async fn consult(self, escalation: Escalation) {
        log::info!("Critical conflict {}: asking advisor", escalation.key);
        let outcome = advise_within(
            self.advisor.as_ref(),
            &escalation.request,
            self.config.advisor_timeout,
        )
        .await;

        let mut state = self.lock();
        match outcome {
            Ok(response) => {
                state.apply_advice(
                    &self.corridor,
                    &escalation.key,
                    &response,
                    self.config.auto_accept,
                );
            }
            Err(e) => state.fail_consultation(&escalation.key, &e),
        }
    }

    /// Operator accept/reject of a pending plan.
    pub fn decide(&self, id: &TrainId, decision: Decision) -> Result<Plan, EngineError> {
        self.lock().decide(id, decision)
    }

    /// Places a train directly on the corridor, bypassing the schedule.
    pub fn seed_train(&self, train: Train) -> Result<(), EngineError> {
        validate_train(&train, self.corridor.length_km())?;
        let mut state = self.lock();
        if state.trains.contains_key(&train.id) {
            return Err(EngineError::DuplicateTrain(train.id));
        }
        log::info!("Seeded train {} at {:.2} km", train.name, train.position_km);
        state.trains.insert(train.id.clone(), train);
        Ok(())
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.lock().snapshot(&self.corridor)
    }

    pub fn state_string(&self) -> String {
        self.lock().state_string()
    }

    pub fn train(&self, id: &TrainId) -> Option<Train> {
        self.lock().trains.get(id).cloned()
    }

    pub fn pending_plans(&self) -> Vec<Plan> {
        self.lock()
            .trains
            .values()
            .filter_map(|t| t.pending_plan.clone())
            .collect()
    }

    /// Open conflict records, sorted.
    pub fn open_conflicts(&self) -> Vec<ConflictKey> {
        let mut keys: Vec<_> = self.lock().conflicts.iter().cloned().collect();
        keys.sort();
        keys
    }

    pub fn simulation_seconds(&self) -> u64 {
        self.lock().simulation_seconds()
    }

    pub fn decision_history(&self, order: Order) -> Vec<DecisionRecord> {
        self.lock().log.history(order)
    }

    pub fn decisions_since(&self, seen: usize) -> Vec<DecisionRecord> {
        self.lock().log.since(seen)
    }

    /// Explains why a held train is waiting, falling back to a fixed sentence
    /// when the advisor cannot answer.
    pub async fn explain(&self, id: &TrainId) -> Result<String, EngineError> {
        let (yielding, pursuer) = {
            let state = self.lock();
            let train = state
                .trains
                .get(id)
                .ok_or_else(|| EngineError::TrainNotFound(id.clone()))?;
            let pursuer_id = train
                .blocked_by
                .clone()
                .or_else(|| train.pending_plan.as_ref().map(|p| p.caused_by.clone()))
                .ok_or_else(|| EngineError::NotHeld(id.clone()))?;
            let pursuer = state
                .trains
                .get(&pursuer_id)
                .ok_or(EngineError::TrainNotFound(pursuer_id))?;
            (TrainSummary::from(train), TrainSummary::from(pursuer))
        };

        let answer = tokio::time::timeout(
            self.config.advisor_timeout,
            self.advisor.explain(&yielding, &pursuer),
        )
        .await;
        Ok(match answer {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                log::warn!("Advisor could not explain: {}", e);
                default_explanation(&yielding, &pursuer)
            }
            Err(_) => {
                log::warn!("Advisor explanation timed out");
                default_explanation(&yielding, &pursuer)
            }
        })
    }
}
