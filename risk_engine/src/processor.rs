use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, histogram};
use serde::Serialize;
use std::{sync::Arc, time::Duration, time::Instant};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
    task::JoinHandle,
    time::sleep,
};
use tracing::{debug, error, info, trace, warn};

use crate::{
    analyzer::RiskAnalyzer,
    error::EngineError,
    model::{RiskResult, RiskTier},
    queue::AnalysisQueue,
};

pub const ANALYSES_TOTAL: &str = "address_risk_analyses_total";
pub const FAILURES_TOTAL: &str = "address_risk_failures_total";
pub const ANALYSIS_SECONDS: &str = "address_risk_analysis_seconds";

/// A worker gives up after this many plumbing errors in a row.
const MAX_CONSECUTIVE_ERRORS: u32 = 3;

/// What the processor reports for each request it took off the queue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Scored {
        request_id: String,
        #[serde(flatten)]
        result: RiskResult,
    },
    Rejected {
        request_id: String,
        error: String,
    },
}

impl AnalysisOutcome {
    pub fn request_id(&self) -> &str {
        match self {
            Self::Scored { request_id, .. } | Self::Rejected { request_id, .. } => request_id,
        }
    }

    pub fn result(&self) -> Option<&RiskResult> {
        match self {
            Self::Scored { result, .. } => Some(result),
            Self::Rejected { .. } => None,
        }
    }
}

#[async_trait]
pub trait ResultSink: Send + Sync + 'static {
    async fn emit(&self, outcome: &AnalysisOutcome) -> Result<(), EngineError>;

    async fn flush(&self) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Writes one JSON document per outcome, newline separated.
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> ResultSink for JsonLinesSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn emit(&self, outcome: &AnalysisOutcome) -> Result<(), EngineError> {
        let mut line = serde_json::to_vec(outcome).map_err(|e| EngineError::Sink(e.to_string()))?;
        line.push(b'\n');
        let mut writer = self.writer.lock().await;
        writer
            .write_all(&line)
            .await
            .map_err(|e| EngineError::Sink(e.to_string()))
    }

    async fn flush(&self) -> Result<(), EngineError> {
        let mut writer = self.writer.lock().await;
        writer.flush().await.map_err(|e| EngineError::Sink(e.to_string()))
    }
}

/// Per-tier tally of what a run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessingSummary {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub rejected: usize,
}

impl ProcessingSummary {
    pub fn record(&mut self, outcome: &AnalysisOutcome) {
        match outcome.result().map(RiskResult::risk_tier) {
            Some(RiskTier::High) => self.high += 1,
            Some(RiskTier::Medium) => self.medium += 1,
            Some(RiskTier::Low) => self.low += 1,
            None => self.rejected += 1,
        }
    }

    pub fn merge(&mut self, other: ProcessingSummary) {
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
        self.rejected += other.rejected;
    }

    pub fn scored(&self) -> usize {
        self.high + self.medium + self.low
    }

    pub fn total(&self) -> usize {
        self.scored() + self.rejected
    }
}

pub struct Processor {
    analyzer: Arc<RiskAnalyzer>,
    queue: Arc<dyn AnalysisQueue>,
    sink: Arc<dyn ResultSink>,
}

impl Processor {
    pub fn new(
        analyzer: Arc<RiskAnalyzer>,
        queue: Arc<dyn AnalysisQueue>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        info!("Initializing new Processor");
        Self { analyzer, queue, sink }
    }

    /// Takes one request off the queue, reports its outcome and acknowledges it.
    /// A rejected request is still an `Ok` outcome; only queue and sink
    /// failures surface as errors. When the sink fails the request goes back
    /// on the queue.
    pub async fn process(&self) -> Result<Option<AnalysisOutcome>, EngineError> {
        trace!("Starting processing cycle");

        let Some((request, receipt)) = self.queue.fetch_next().await? else {
            trace!("No requests in queue");
            return Ok(None);
        };

        let started = Instant::now();
        let outcome = match self.analyzer.analyze_request(&request) {
            Ok(result) => {
                let tier: &'static str = result.risk_tier().into();
                counter!(ANALYSES_TOTAL, "tier" => tier).increment(1);
                AnalysisOutcome::Scored {
                    request_id: request.request_id,
                    result,
                }
            }
            Err(e) => {
                warn!(request_id = %request.request_id, error = %e, "Request rejected");
                counter!(FAILURES_TOTAL).increment(1);
                AnalysisOutcome::Rejected {
                    request_id: request.request_id,
                    error: e.to_string(),
                }
            }
        };
        histogram!(ANALYSIS_SECONDS).record(started.elapsed().as_secs_f64());

        if let Err(e) = self.sink.emit(&outcome).await {
            warn!(request_id = outcome.request_id(), receipt, error = %e, "Output failed, releasing request");
            self.queue.release(receipt).await?;
            return Err(EngineError::Sink(format!(
                "request '{}' released for redelivery: {e}",
                outcome.request_id()
            )));
        }
        self.queue.mark_processed(receipt).await?;
        debug!(request_id = outcome.request_id(), receipt, "Request acknowledged");

        Ok(Some(outcome))
    }

    /// Processes until the queue is empty.
    pub async fn drain(&self, worker: u32, sleep_ms: u64) -> Result<ProcessingSummary, EngineError> {
        let mut summary = ProcessingSummary::default();
        let mut consecutive_errors = 0;
        loop {
            match self.process().await {
                Ok(Some(outcome)) => {
                    consecutive_errors = 0;
                    summary.record(&outcome);
                }
                Ok(None) => {
                    debug!(worker, "Queue drained, worker stopping");
                    return Ok(summary);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    error!(worker, error = %e, consecutive_errors, "Error processing request");
                    if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                        return Err(EngineError::Worker(format!(
                            "worker {worker} stopped after {consecutive_errors} consecutive errors: {e}"
                        )));
                    }
                    sleep(Duration::from_millis(sleep_ms)).await;
                }
            }
        }
    }
}

pub fn start_processing_workers(
    processor: Arc<Processor>,
    threads: u32,
    sleep_ms: u64,
) -> Vec<JoinHandle<Result<ProcessingSummary, EngineError>>> {
    (0..threads)
        .map(|worker| {
            let processor = Arc::clone(&processor);
            tokio::spawn(async move {
                info!(worker, "Starting processor worker");
                processor.drain(worker, sleep_ms).await
            })
        })
        .collect()
}

/// Runs `threads` workers until the queue is drained, then flushes the sink.
/// Every worker is awaited even when one fails; the first failure is returned.
pub async fn run_to_completion(
    processor: Arc<Processor>,
    threads: u32,
    sleep_ms: u64,
) -> Result<ProcessingSummary, EngineError> {
    let sink = Arc::clone(&processor.sink);
    let handles = start_processing_workers(processor, threads, sleep_ms);

    let mut summary = ProcessingSummary::default();
    let mut first_error = None;
    for joined in join_all(handles).await {
        match joined {
            Ok(Ok(worker_summary)) => summary.merge(worker_summary),
            Ok(Err(e)) => {
                first_error.get_or_insert(e);
            }
            Err(e) => {
                first_error.get_or_insert(EngineError::Worker(e.to_string()));
            }
        }
    }

    sink.flush().await?;
    if let Some(e) = first_error {
        return Err(e);
    }
    info!(
        scored = summary.scored(),
        rejected = summary.rejected,
        high = summary.high,
        "Processing finished"
    );
    Ok(summary)
}
