use crate::shared_data::{current_timestamp, DecisionRecord, Order};

/// Append-only audit trail of everything the controller decided.
#[derive(Debug, Clone, Default)]
pub struct DecisionLog {
    entries: Vec<DecisionRecord>,
}

impl DecisionLog {
    pub fn record(&mut self, simulation_seconds: u64, text: impl Into<String>) {
        let text = text.into();
        log::info!("[Decision] {}", text);
        self.entries.push(DecisionRecord {
            timestamp: current_timestamp(),
            simulation_seconds,
            text,
        });
    }

    pub fn history(&self, order: Order) -> Vec<DecisionRecord> {
        match order {
            Order::OldestFirst => self.entries.clone(),
            Order::NewestFirst => self.entries.iter().rev().cloned().collect(),
        }
    }

    /// Entries appended after the first `seen`, oldest first.
    pub fn since(&self, seen: usize) -> Vec<DecisionRecord> {
        self.entries.iter().skip(seen).cloned().collect()
    }
}
