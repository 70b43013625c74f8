use async_trait::async_trait;
use mockall::mock;
use risk_engine::{
    error::EngineError,
    model::AnalysisRequest,
    processor::{AnalysisOutcome, ResultSink},
    queue::{AnalysisQueue, Receipt},
};

mock! {
    pub Queue {}

    #[async_trait]
    impl AnalysisQueue for Queue {
        async fn fetch_next(&self) -> Result<Option<(AnalysisRequest, Receipt)>, EngineError>;
        async fn mark_processed(&self, receipt: Receipt) -> Result<(), EngineError>;
        async fn release(&self, receipt: Receipt) -> Result<(), EngineError>;
        async fn enqueue(&self, requests: Vec<AnalysisRequest>) -> Result<(), EngineError>;
        async fn outstanding(&self) -> Result<usize, EngineError>;
    }
}

mock! {
    pub Sink {}

    #[async_trait]
    impl ResultSink for Sink {
        async fn emit(&self, outcome: &AnalysisOutcome) -> Result<(), EngineError>;
        async fn flush(&self) -> Result<(), EngineError>;
    }
}

/// Queue that hands out `request` once under `receipt`, then reports empty.
pub fn single_request_queue(request: AnalysisRequest, receipt: Receipt) -> MockQueue {
    let mut queue = MockQueue::new();
    let mut pending = Some((request, receipt));
    queue
        .expect_fetch_next()
        .returning(move || Ok(pending.take()));
    queue
}
