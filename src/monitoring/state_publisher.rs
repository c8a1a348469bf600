use crate::error::BrokerError;
use crate::global_variables::{AMQP_URL, QUEUE_CORRIDOR_DECISIONS, QUEUE_CORRIDOR_STATE};
use crate::simulation_engine::Engine;
use amiquip::{Connection, Exchange, Publish, QueueDeclareOptions};
use std::time::Duration;

/// Serialises everything that changed since the last call: the full snapshot
/// for `corridor_state` and one message per new decision for
/// `corridor_decisions`. `seen` tracks how many decisions were already sent.
pub fn frame_update(
    engine: &Engine,
    seen: &mut usize,
) -> Result<Vec<(&'static str, Vec<u8>)>, serde_json::Error> {
    let mut frames = vec![(QUEUE_CORRIDOR_STATE, serde_json::to_vec(&engine.snapshot())?)];
    for record in engine.decisions_since(*seen) {
        frames.push((QUEUE_CORRIDOR_DECISIONS, serde_json::to_vec(&record)?));
        *seen += 1;
    }
    Ok(frames)
}

/// Publishes the corridor state every `period` until the broker fails.
pub async fn publish_state(engine: Engine, period: Duration) -> Result<(), BrokerError> {
    tokio::task::spawn_blocking(move || -> Result<(), BrokerError> {
        let mut connection = Connection::insecure_open(AMQP_URL)?;
        let channel = connection.open_channel(None)?;
        let exchange = Exchange::direct(&channel);
        channel.queue_declare(QUEUE_CORRIDOR_STATE, QueueDeclareOptions::default())?;
        channel.queue_declare(QUEUE_CORRIDOR_DECISIONS, QueueDeclareOptions::default())?;
        log::info!("Publishing corridor state to '{}'", QUEUE_CORRIDOR_STATE);

        let mut seen = 0;
        loop {
            for (queue, payload) in frame_update(&engine, &mut seen)? {
                exchange.publish(Publish::new(&payload, queue))?;
            }
            std::thread::sleep(period);
        }
    })
    .await?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_system::advisor::PriorityAdvisor;
    use crate::corridor::Corridor;
    use crate::shared_data::{DecisionRecord, StateSnapshot};
    use crate::simulation_engine::schedule::InMemorySchedule;
    use crate::simulation_engine::EngineConfig;
    use crate::trains::Train;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_frames_carry_only_new_decisions() {
        let engine = Engine::new(
            Corridor::mumbai_pune(),
            Arc::new(InMemorySchedule::default()),
            Arc::new(PriorityAdvisor),
            EngineConfig::default(),
        );
        engine
            .seed_train(Train::new("LOC".into(), "Local", "suburban", 2, 80.0).at_position(30.0))
            .unwrap();
        engine.advance();

        let mut seen = 0;
        let frames = frame_update(&engine, &mut seen).unwrap();
        assert_eq!(frames.len(), 1);
        let snapshot: StateSnapshot = serde_json::from_slice(&frames[0].1).unwrap();
        assert_eq!(snapshot.simulation_time, "00:01:00");
        assert_eq!(snapshot.trains.len(), 1);

        let _timer = engine
            .inject_delay(&"LOC".into(), Duration::from_secs(600))
            .unwrap();
        let frames = frame_update(&engine, &mut seen).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].0, QUEUE_CORRIDOR_DECISIONS);
        let record: DecisionRecord = serde_json::from_slice(&frames[1].1).unwrap();
        assert!(record.text.starts_with("Delay injected: Local"));
        assert_eq!(seen, 1);

        assert_eq!(frame_update(&engine, &mut seen).unwrap().len(), 1);
    }
}
