use std::time::Instant;

use anyhow::Context;
use tokio::fs::File;
use tokio::io::BufWriter;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_origins::{source, Cli, LivenessChecker, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the progress lines
    let default_filter = if cli.verbose {
        "live_origins=debug"
    } else {
        "live_origins=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = cli.into_config().context("invalid arguments")?;

    let output = File::create(&config.output)
        .await
        .with_context(|| format!("failed to create the output file {}", config.output.display()))?;
    let input = source::open(&config.input)
        .await
        .with_context(|| format!("failed to open the file {}", config.input.display()))?;

    let checker = LivenessChecker::new(config.timeout).context("failed to build http client")?;

    info!(
        input = %config.input.display(),
        output = %config.output.display(),
        workers_per_stage = config.workers_per_stage.get(),
        timeout_ms = config.timeout.as_millis() as u64,
        "checking domains"
    );

    let pipeline = Pipeline::new(checker, config.workers_per_stage);
    let (_, summary) = pipeline.run(input, BufWriter::new(output)).await;

    info!(
        hostnames = summary.hostnames,
        live = summary.output.written,
        "domain check completed"
    );
    println!("Execution took {:?}", start.elapsed());
    Ok(())
}
