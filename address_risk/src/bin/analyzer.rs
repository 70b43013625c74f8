use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWrite, BufReader},
};
use tracing::{info, warn};

use address_risk::{engine_setup::build_analyzer, request_io::parse_record, signals::SignalDeriver};
use risk_engine::{
    executable_utils::{initialize_executable, install_metrics_exporter},
    processor::{run_to_completion, AnalysisOutcome, JsonLinesSink, Processor, ResultSink},
    queue::{AnalysisQueue, InMemoryQueue},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (args, config) = initialize_executable().map_err(|e| anyhow::anyhow!(e))?;

    if let Some(address) = &config.processor.metrics_address {
        install_metrics_exporter(address).map_err(|e| anyhow::anyhow!(e))?;
    }

    let analyzer = Arc::new(build_analyzer(&config.engine).context("invalid engine configuration")?);
    let deriver = SignalDeriver::new(config.engine.min_domain_age_days);

    let output: Box<dyn AsyncWrite + Unpin + Send> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .await
                .with_context(|| format!("cannot create output file {path}"))?,
        ),
        None => Box::new(tokio::io::stdout()),
    };
    let sink = Arc::new(JsonLinesSink::new(output));
    let queue = Arc::new(InMemoryQueue::new());

    let input = File::open(&args.input)
        .await
        .with_context(|| format!("cannot open input file {}", args.input))?;
    let mut lines = BufReader::new(input).lines();
    let evaluated_at = Utc::now();
    let mut requests = Vec::new();
    let mut line_number = 0;
    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        if line.trim().is_empty() {
            continue;
        }
        match parse_record(line_number, &line) {
            Ok(record) => requests.push(record.into_request(&deriver, evaluated_at)),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable request");
                sink.emit(&AnalysisOutcome::Rejected {
                    request_id: format!("line-{line_number}"),
                    error: e.to_string(),
                })
                .await?;
            }
        }
    }
    info!(requests = requests.len(), input = %args.input, "Requests loaded");
    queue.enqueue(requests).await?;

    let processor = Arc::new(Processor::new(analyzer, queue, sink));
    let summary = run_to_completion(
        processor,
        config.processor.threads,
        config.processor.sleep_ms,
    )
    .await?;

    info!(
        high = summary.high,
        medium = summary.medium,
        low = summary.low,
        rejected = summary.rejected,
        "Analysis run complete"
    );
    Ok(())
}
