use crate::error::AdvisorError;
use crate::shared_data::{AdvisorRequest, AdvisorResponse, TrainSummary};
use async_trait::async_trait;
use std::time::Duration;

/// External advisory capability consulted on critical conflicts.
///
/// Answers are treated as a heuristic only: the engine validates them and
/// substitutes its own choice whenever the answer cannot be executed safely.
#[async_trait]
pub trait Advisor: Send + Sync + 'static {
    /// Names the train that should wait.
    async fn advise(&self, request: &AdvisorRequest) -> Result<AdvisorResponse, AdvisorError>;

    /// One sentence explaining why `yielding` was held for `pursuer`.
    async fn explain(
        &self,
        yielding: &TrainSummary,
        pursuer: &TrainSummary,
    ) -> Result<String, AdvisorError> {
        Ok(default_explanation(yielding, pursuer))
    }
}

pub fn default_explanation(yielding: &TrainSummary, pursuer: &TrainSummary) -> String {
    format!(
        "{} (priority {}) was held so that the faster {} (priority {}) could pass without overtaking on open track.",
        yielding.name, yielding.priority, pursuer.name, pursuer.priority
    )
}

/// Calls the advisor, turning an overrun of `limit` into `AdvisorError::Timeout`.
pub async fn advise_within(
    advisor: &dyn Advisor,
    request: &AdvisorRequest,
    limit: Duration,
) -> Result<AdvisorResponse, AdvisorError> {
    match tokio::time::timeout(limit, advisor.advise(request)).await {
        Ok(result) => result,
        Err(_) => Err(AdvisorError::Timeout(limit.as_millis() as u64)),
    }
}

/// Local rule-of-thumb advisor: the lower-priority train waits, and on equal
/// priority the train ahead waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriorityAdvisor;

#[async_trait]
impl Advisor for PriorityAdvisor {
    async fn advise(&self, request: &AdvisorRequest) -> Result<AdvisorResponse, AdvisorError> {
        let waiting = if request.pursuer.priority < request.blocker.priority {
            &request.pursuer
        } else {
            &request.blocker
        };
        Ok(AdvisorResponse {
            train_id_to_wait: waiting.id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, priority: i32, position_km: f64) -> TrainSummary {
        TrainSummary {
            id: id.into(),
            name: id.to_string(),
            priority,
            position_km,
            speed_kmh: 100.0,
        }
    }

    struct StalledAdvisor;

    #[async_trait]
    impl Advisor for StalledAdvisor {
        async fn advise(&self, _: &AdvisorRequest) -> Result<AdvisorResponse, AdvisorError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(AdvisorError::Unavailable("never answers".to_string()))
        }
    }

    #[tokio::test]
    async fn test_priority_advisor_picks_lower_priority() {
        let request = AdvisorRequest {
            pursuer: summary("EXP", 10, 4.0),
            blocker: summary("GDS", 1, 8.0),
        };
        let response = PriorityAdvisor.advise(&request).await.unwrap();
        assert_eq!(response.train_id_to_wait.as_str(), "GDS");

        let inverted = AdvisorRequest {
            pursuer: summary("GDS", 1, 4.0),
            blocker: summary("EXP", 10, 8.0),
        };
        let response = PriorityAdvisor.advise(&inverted).await.unwrap();
        assert_eq!(response.train_id_to_wait.as_str(), "GDS");

        let tied = AdvisorRequest {
            pursuer: summary("A", 5, 4.0),
            blocker: summary("B", 5, 8.0),
        };
        let response = PriorityAdvisor.advise(&tied).await.unwrap();
        assert_eq!(response.train_id_to_wait.as_str(), "B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_advise_within_times_out() {
        let request = AdvisorRequest {
            pursuer: summary("EXP", 10, 4.0),
            blocker: summary("GDS", 1, 8.0),
        };
        let result = advise_within(&StalledAdvisor, &request, Duration::from_secs(30)).await;
        assert!(matches!(result, Err(AdvisorError::Timeout(30_000))));
    }

    #[tokio::test]
    async fn test_default_explanation_names_both_trains() {
        let text = PriorityAdvisor
            .explain(&summary("Goods", 1, 10.0), &summary("Express", 10, 6.0))
            .await
            .unwrap();
        assert!(text.starts_with("Goods (priority 1) was held"));
        assert!(text.contains("Express (priority 10)"));
    }
}
