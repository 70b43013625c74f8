use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use tracing::trace;

use crate::{error::EngineError, model::AnalysisRequest};

/// Handle a worker uses to acknowledge a fetched request.
pub type Receipt = u64;

#[async_trait]
pub trait AnalysisQueue: Send + Sync + 'static {
    async fn fetch_next(&self) -> Result<Option<(AnalysisRequest, Receipt)>, EngineError>;
    async fn mark_processed(&self, receipt: Receipt) -> Result<(), EngineError>;
    /// Returns a fetched but unacknowledged request to the waiting list.
    async fn release(&self, receipt: Receipt) -> Result<(), EngineError>;
    async fn enqueue(&self, requests: Vec<AnalysisRequest>) -> Result<(), EngineError>;
    /// Requests waiting plus requests fetched but not yet acknowledged.
    async fn outstanding(&self) -> Result<usize, EngineError>;
}

#[derive(Default)]
struct QueueState {
    waiting: VecDeque<(AnalysisRequest, Receipt)>,
    in_flight: HashMap<Receipt, AnalysisRequest>,
    next_receipt: Receipt,
}

#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnalysisQueue for InMemoryQueue {
    async fn fetch_next(&self) -> Result<Option<(AnalysisRequest, Receipt)>, EngineError> {
        let mut state = self.state.lock().await;
        let Some((request, receipt)) = state.waiting.pop_front() else {
            return Ok(None);
        };
        state.in_flight.insert(receipt, request.clone());
        trace!(request_id = %request.request_id, receipt, "Request fetched");
        Ok(Some((request, receipt)))
    }

    async fn mark_processed(&self, receipt: Receipt) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        state
            .in_flight
            .remove(&receipt)
            .map(|_| ())
            .ok_or_else(|| EngineError::Queue(format!("unknown receipt {receipt}")))
    }

    async fn release(&self, receipt: Receipt) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        let request = state
            .in_flight
            .remove(&receipt)
            .ok_or_else(|| EngineError::Queue(format!("unknown receipt {receipt}")))?;
        trace!(request_id = %request.request_id, receipt, "Request released");
        state.waiting.push_back((request, receipt));
        Ok(())
    }

    async fn enqueue(&self, requests: Vec<AnalysisRequest>) -> Result<(), EngineError> {
        let mut state = self.state.lock().await;
        for request in requests {
            let receipt = state.next_receipt;
            state.next_receipt += 1;
            state.waiting.push_back((request, receipt));
        }
        Ok(())
    }

    async fn outstanding(&self) -> Result<usize, EngineError> {
        let state = self.state.lock().await;
        Ok(state.waiting.len() + state.in_flight.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::request;

    #[tokio::test]
    async fn test_fifo_order_and_acknowledgement() {
        let queue = InMemoryQueue::new();
        queue
            .enqueue(vec![request("first", "4711-3/02"), request("second", "6201-5/01")])
            .await
            .unwrap();

        let (first, receipt) = queue.fetch_next().await.unwrap().unwrap();
        assert_eq!(first.request_id, "first");
        assert_eq!(queue.outstanding().await.unwrap(), 2);

        queue.mark_processed(receipt).await.unwrap();
        assert_eq!(queue.outstanding().await.unwrap(), 1);

        let (second, _) = queue.fetch_next().await.unwrap().unwrap();
        assert_eq!(second.request_id, "second");
        assert!(queue.fetch_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_double_acknowledgement_is_an_error() {
        let queue = InMemoryQueue::new();
        queue.enqueue(vec![request("only", "4711-3/02")]).await.unwrap();
        let (_, receipt) = queue.fetch_next().await.unwrap().unwrap();
        queue.mark_processed(receipt).await.unwrap();
        assert!(matches!(
            queue.mark_processed(receipt).await,
            Err(EngineError::Queue(_))
        ));
    }

    #[tokio::test]
    async fn test_released_request_is_delivered_again() {
        let queue = InMemoryQueue::new();
        queue
            .enqueue(vec![request("flaky", "4711-3/02"), request("next", "6201-5/01")])
            .await
            .unwrap();
        let (_, receipt) = queue.fetch_next().await.unwrap().unwrap();
        queue.release(receipt).await.unwrap();
        assert_eq!(queue.outstanding().await.unwrap(), 2);

        let (next, _) = queue.fetch_next().await.unwrap().unwrap();
        assert_eq!(next.request_id, "next");
        let (again, again_receipt) = queue.fetch_next().await.unwrap().unwrap();
        assert_eq!(again.request_id, "flaky");
        assert_eq!(again_receipt, receipt);
        queue.mark_processed(again_receipt).await.unwrap();
        assert!(matches!(queue.release(again_receipt).await, Err(EngineError::Queue(_))));
    }
}
