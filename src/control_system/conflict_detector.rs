use crate::global_variables::{
    ADAPTIVE_ESCALATION_SECS, ADAPTIVE_GAP_KM, CLEARANCE_MARGIN_KM, CRITICAL_GAP_KM,
};
use crate::shared_data::{AdvisorRequest, TrainSummary};
use crate::trains::{Train, TrainId, TrainStatus};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::time::Duration;

/// Open conflict between a pursuing train and the train blocking it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictKey {
    pub pursuer: TrainId,
    pub blocker: TrainId,
}

impl ConflictKey {
    pub fn new(pursuer: TrainId, blocker: TrainId) -> Self {
        Self { pursuer, blocker }
    }

    pub fn involves(&self, id: &TrainId) -> bool {
        &self.pursuer == id || &self.blocker == id
    }
}

impl fmt::Display for ConflictKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.pursuer, self.blocker)
    }
}

/// Proximity classification of a converging pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Clear,
    Adaptive,
    Critical,
}

/// A newly opened conflict to be handed to the advisor, with the state of both
/// trains at the moment it was detected.
#[derive(Debug, Clone, PartialEq)]
pub struct Escalation {
    pub key: ConflictKey,
    pub request: AdvisorRequest,
}

/// Classifies the pair `(behind, ahead)`. Pairs that are not converging are clear.
pub fn classify(behind: &Train, ahead: &Train) -> Band {
    if behind.base_speed_kmh <= ahead.speed_kmh {
        return Band::Clear;
    }
    let gap = ahead.position_km - behind.position_km;
    if gap <= 0.0 {
        return Band::Clear;
    }

    let stuck_cruising = behind.status == TrainStatus::AdaptiveCruise
        && behind.adaptive_duration > Duration::from_secs(ADAPTIVE_ESCALATION_SECS);
    if gap <= CRITICAL_GAP_KM || stuck_cruising {
        Band::Critical
    } else if gap < ADAPTIVE_GAP_KM {
        Band::Adaptive
    } else {
        Band::Clear
    }
}

/// Scans every pair of freely running trains once.
///
/// Adaptive pairs clamp the pursuer to the speed ahead, critical pairs open a
/// conflict record (at most once per ordered pair) and produce an escalation.
/// Cruising trains that matched nothing this pass go back to their base speed.
pub fn detect_conflicts(
    trains: &mut BTreeMap<TrainId, Train>,
    open: &mut HashSet<ConflictKey>,
) -> Vec<Escalation> {
    let mut escalations = Vec::new();
    let candidates: Vec<TrainId> = trains
        .values()
        .filter(|t| t.is_running_freely())
        .map(|t| t.id.clone())
        .collect();
    let mut matched: HashSet<TrainId> = HashSet::new();

    for (i, first) in candidates.iter().enumerate() {
        for second in &candidates[i + 1..] {
            let (Some(a), Some(b)) = (trains.get(first), trains.get(second)) else {
                continue;
            };
            if !a.is_running_freely() || !b.is_running_freely() {
                continue;
            }
            let (ahead, behind) = if a.position_km > b.position_km {
                (a, b)
            } else {
                (b, a)
            };

            match classify(behind, ahead) {
                Band::Critical => {
                    let key = ConflictKey::new(behind.id.clone(), ahead.id.clone());
                    matched.insert(behind.id.clone());
                    if open.insert(key.clone()) {
                        log::info!(
                            "Critical conflict: {} is {:.2} km behind {}",
                            behind.name,
                            ahead.position_km - behind.position_km,
                            ahead.name
                        );
                        escalations.push(Escalation {
                            key,
                            request: AdvisorRequest {
                                pursuer: TrainSummary::from(behind),
                                blocker: TrainSummary::from(ahead),
                            },
                        });
                    }
                }
                Band::Adaptive => {
                    let ahead_speed = ahead.speed_kmh;
                    let behind_id = behind.id.clone();
                    if let Some(pursuer) = trains.get_mut(&behind_id) {
                        if pursuer.enter_adaptive_cruise(ahead_speed) {
                            log::info!("{} entering ADAPTIVE_CRUISE", pursuer.name);
                        }
                    }
                    matched.insert(behind_id);
                }
                Band::Clear => {}
            }
        }
    }

    for train in trains.values_mut() {
        if train.status == TrainStatus::AdaptiveCruise && !matched.contains(&train.id) {
            log::info!("{} disengaging adaptive cruise", train.name);
            train.leave_adaptive_cruise();
        }
    }

    escalations
}

/// Restarts held trains whose blocker has pulled clear, returning
/// `(restarted, blocker)` pairs. Runs before detection so a train cannot be
/// resolved and flagged again in the same tick.
pub fn sweep_resolved(
    trains: &mut BTreeMap<TrainId, Train>,
    open: &mut HashSet<ConflictKey>,
) -> Vec<(TrainId, TrainId)> {
    let held: Vec<(TrainId, TrainId)> = trains
        .values()
        .filter(|t| t.is_halted())
        .filter_map(|t| t.blocked_by.clone().map(|b| (t.id.clone(), b)))
        .collect();

    let mut resumed = Vec::new();
    for (held_id, blocker_id) in held {
        let cleared = match (trains.get(&held_id), trains.get(&blocker_id)) {
            (Some(held), Some(blocker)) => {
                blocker.position_km > held.position_km + CLEARANCE_MARGIN_KM
                    || blocker.status == TrainStatus::Arrived
            }
            (Some(_), None) => true,
            _ => false,
        };
        if !cleared {
            continue;
        }
        if let Some(held) = trains.get_mut(&held_id) {
            log::info!("Conflict resolved: restarting {}", held.name);
            held.resume();
        }
        open.remove(&ConflictKey::new(blocker_id.clone(), held_id.clone()));
        resumed.push((held_id, blocker_id));
    }
    resumed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fleet(trains: Vec<Train>) -> BTreeMap<TrainId, Train> {
        trains.into_iter().map(|t| (t.id.clone(), t)).collect()
    }

    fn express(position: f64) -> Train {
        Train::new("EXP".into(), "Express", "express", 10, 120.0).at_position(position)
    }

    fn goods(position: f64) -> Train {
        Train::new("GDS".into(), "Goods", "freight", 1, 70.0).at_position(position)
    }

    #[test]
    fn test_classify_bands() {
        assert_eq!(classify(&express(10.0), &goods(14.0)), Band::Critical);
        assert_eq!(classify(&express(10.0), &goods(15.0)), Band::Critical);
        assert_eq!(classify(&express(10.0), &goods(15.1)), Band::Adaptive);
        assert_eq!(classify(&express(10.0), &goods(25.0)), Band::Clear);
        // Slower pursuer never converges.
        assert_eq!(classify(&goods(10.0), &express(12.0)), Band::Clear);
        // Level trains are not a conflict.
        assert_eq!(classify(&express(10.0), &goods(10.0)), Band::Clear);
    }

    #[test]
    fn test_long_adaptive_cruise_escalates() {
        let mut behind = express(10.0);
        behind.enter_adaptive_cruise(70.0);
        behind.adaptive_duration = Duration::from_secs(300);
        assert_eq!(classify(&behind, &goods(20.0)), Band::Adaptive);

        behind.adaptive_duration = Duration::from_secs(301);
        assert_eq!(classify(&behind, &goods(20.0)), Band::Critical);
    }

    #[test]
    fn test_critical_pair_escalates_once() {
        let mut trains = fleet(vec![express(10.0), goods(14.0)]);
        let mut open = HashSet::new();

        let escalations = detect_conflicts(&mut trains, &mut open);
        assert_eq!(escalations.len(), 1);
        let escalation = &escalations[0];
        assert_eq!(escalation.key, ConflictKey::new("EXP".into(), "GDS".into()));
        assert_eq!(escalation.request.pursuer.priority, 10);
        assert_eq!(escalation.request.blocker.position_km, 14.0);
        assert!(open.contains(&escalation.key));

        let again = detect_conflicts(&mut trains, &mut open);
        assert!(again.is_empty());
        assert_eq!(open.len(), 1);
    }

    #[test]
    fn test_adaptive_band_clamps_and_releases() {
        let mut trains = fleet(vec![express(10.0), goods(20.0)]);
        let mut open = HashSet::new();

        assert!(detect_conflicts(&mut trains, &mut open).is_empty());
        let pursuer = &trains[&TrainId::from("EXP")];
        assert_eq!(pursuer.status, TrainStatus::AdaptiveCruise);
        assert_eq!(pursuer.speed_kmh, 70.0);

        // The goods train pulls away out of the band.
        trains.get_mut(&TrainId::from("GDS")).unwrap().position_km = 40.0;
        detect_conflicts(&mut trains, &mut open);
        let pursuer = &trains[&TrainId::from("EXP")];
        assert_eq!(pursuer.status, TrainStatus::OnSchedule);
        assert_eq!(pursuer.speed_kmh, 120.0);
    }

    #[test]
    fn test_held_trains_are_ignored() {
        let mut blocker = goods(14.0);
        blocker.status = TrainStatus::Halted;
        let mut trains = fleet(vec![express(10.0), blocker]);
        let mut open = HashSet::new();

        assert!(detect_conflicts(&mut trains, &mut open).is_empty());
        assert!(open.is_empty());
    }

    #[test]
    fn test_sweep_resumes_after_clearance() {
        let mut held = goods(50.0);
        held.status = TrainStatus::HaltedInLoop;
        held.speed_kmh = 0.0;
        held.blocked_by = Some("EXP".into());
        let mut trains = fleet(vec![express(55.0), held]);
        let mut open = HashSet::from([ConflictKey::new("EXP".into(), "GDS".into())]);

        // Exactly at the margin is not enough.
        assert!(sweep_resolved(&mut trains, &mut open).is_empty());
        assert_eq!(open.len(), 1);

        trains.get_mut(&TrainId::from("EXP")).unwrap().position_km = 55.1;
        let resumed = sweep_resolved(&mut trains, &mut open);
        assert_eq!(resumed, vec![(TrainId::from("GDS"), TrainId::from("EXP"))]);
        assert!(open.is_empty());

        let goods = &trains[&TrainId::from("GDS")];
        assert_eq!(goods.status, TrainStatus::OnSchedule);
        assert_eq!(goods.speed_kmh, 70.0);
        assert_eq!(goods.blocked_by, None);
    }

    #[test]
    fn test_sweep_resumes_when_blocker_arrived_or_untracked() {
        let mut held = goods(60.0);
        held.status = TrainStatus::Halted;
        held.speed_kmh = 0.0;
        held.blocked_by = Some("EXP".into());

        // The blocker finished the run without ever pulling 5 km clear.
        let mut blocker = express(62.0);
        blocker.status = TrainStatus::Arrived;
        let mut trains = fleet(vec![blocker, held.clone()]);
        let mut open = HashSet::from([ConflictKey::new("EXP".into(), "GDS".into())]);
        let resumed = sweep_resolved(&mut trains, &mut open);
        assert_eq!(resumed, vec![(TrainId::from("GDS"), TrainId::from("EXP"))]);
        assert_eq!(trains[&TrainId::from("GDS")].status, TrainStatus::OnSchedule);
        assert!(open.is_empty());

        // No record of the blocker at all.
        let mut trains = fleet(vec![held]);
        let mut open = HashSet::from([ConflictKey::new("EXP".into(), "GDS".into())]);
        assert_eq!(sweep_resolved(&mut trains, &mut open).len(), 1);
        assert_eq!(trains[&TrainId::from("GDS")].speed_kmh, 70.0);
        assert!(open.is_empty());
    }
}
