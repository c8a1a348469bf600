use crate::control_system::conflict_detector::ConflictKey;
use crate::corridor::Corridor;
use crate::shared_data::AdvisorResponse;
use crate::trains::{Plan, Train, TrainId};

/// Which train yields, and whether the advisor's answer had to be overridden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldChoice {
    pub train_id: TrainId,
    pub overridden: bool,
}

/// Only the blocker can be sent to a loop ahead of itself, so any other answer is
/// replaced by the blocker.
pub fn choose_yielding(key: &ConflictKey, response: &AdvisorResponse) -> YieldChoice {
    YieldChoice {
        train_id: key.blocker.clone(),
        overridden: response.train_id_to_wait != key.blocker,
    }
}

/// Hours `train` needs to reach `loop_km` at its current speed.
pub fn time_to_loop(train: &Train, loop_km: f64) -> f64 {
    train.hours_to_cover(loop_km - train.position_km)
}

/// Proposes the maneuver for `yielding` so that `pursuer` can pass.
///
/// A loop is only proposed when the yielding train gets there strictly before the
/// pursuer would; otherwise the overtake would happen on open track and the train
/// is halted where it stands.
pub fn plan_maneuver(corridor: &Corridor, yielding: &Train, pursuer: &Train) -> Plan {
    let Some(passing_loop) = corridor.next_loop_ahead(yielding.position_km) else {
        return Plan::halt(
            yielding.id.clone(),
            pursuer.id.clone(),
            "No loop lines ahead",
        );
    };

    let time_yielding = time_to_loop(yielding, passing_loop.position_km);
    let time_pursuer = time_to_loop(pursuer, passing_loop.position_km);
    log::debug!(
        "Loop {} at {} km: {} needs {:.3}h, {} needs {:.3}h",
        passing_loop.name,
        passing_loop.position_km,
        yielding.name,
        time_yielding,
        pursuer.name,
        time_pursuer
    );

    if time_yielding < time_pursuer {
        Plan::route_to_loop(
            yielding.id.clone(),
            &passing_loop.name,
            passing_loop.position_km,
            pursuer.id.clone(),
        )
    } else {
        Plan::halt(yielding.id.clone(), pursuer.id.clone(), "Maneuver unsafe")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corridor::{PassingLoop, Station};
    use crate::trains::PlanAction;

    fn corridor_with_far_loop() -> Corridor {
        Corridor::new(
            200.0,
            vec![
                Station::new("Origin", 0.0),
                Station::new("Siding", 90.0),
                Station::new("Terminus", 200.0),
            ],
            vec![PassingLoop::new("Siding", 90.0)],
        )
        .unwrap()
    }

    fn pursuer(position: f64) -> Train {
        Train::new("EXP".into(), "Express", "express", 10, 120.0).at_position(position)
    }

    fn blocker(position: f64) -> Train {
        Train::new("GDS".into(), "Goods", "freight", 1, 70.0).at_position(position)
    }

    #[test]
    fn test_far_loop_forces_halt() {
        // Blocker 4 km ahead with the only loop 80 km further on.
        let corridor = corridor_with_far_loop();
        let plan = plan_maneuver(&corridor, &blocker(10.0), &pursuer(6.0));

        assert_eq!(plan.action, PlanAction::Halt);
        assert_eq!(plan.train_id, TrainId::from("GDS"));
        assert_eq!(plan.caused_by, TrainId::from("EXP"));
        assert!(time_to_loop(&blocker(10.0), 90.0) >= time_to_loop(&pursuer(6.0), 90.0));
    }

    #[test]
    fn test_near_loop_routes_blocker() {
        let corridor = corridor_with_far_loop();
        let plan = plan_maneuver(&corridor, &blocker(88.0), &pursuer(84.0));

        assert_eq!(plan.action, PlanAction::RouteToLoop);
        assert_eq!(plan.location_km, Some(90.0));
        assert_eq!(plan.loop_name.as_deref(), Some("Siding"));
        assert!(time_to_loop(&blocker(88.0), 90.0) < time_to_loop(&pursuer(84.0), 90.0));
    }

    #[test]
    fn test_no_loop_ahead_halts() {
        let corridor = corridor_with_far_loop();
        let plan = plan_maneuver(&corridor, &blocker(120.0), &pursuer(116.0));
        assert_eq!(plan.action, PlanAction::Halt);
        assert_eq!(plan.reason, "No loop lines ahead");
    }

    #[test]
    fn test_stopped_blocker_never_routed() {
        let corridor = corridor_with_far_loop();
        let mut stopped = blocker(89.0);
        stopped.speed_kmh = 0.0;
        assert_eq!(time_to_loop(&stopped, 90.0), f64::INFINITY);

        let plan = plan_maneuver(&corridor, &stopped, &pursuer(85.0));
        assert_eq!(plan.action, PlanAction::Halt);
    }

    #[test]
    fn test_advisor_cannot_yield_the_pursuer() {
        let key = ConflictKey::new("EXP".into(), "GDS".into());

        let agreed = choose_yielding(
            &key,
            &AdvisorResponse {
                train_id_to_wait: "GDS".into(),
            },
        );
        assert_eq!(agreed.train_id, TrainId::from("GDS"));
        assert!(!agreed.overridden);

        for answer in ["EXP", "UNKNOWN", ""] {
            let choice = choose_yielding(
                &key,
                &AdvisorResponse {
                    train_id_to_wait: answer.into(),
                },
            );
            assert_eq!(choice.train_id, TrainId::from("GDS"));
            assert!(choice.overridden);
        }
    }
}
