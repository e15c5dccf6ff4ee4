//! Two-stage probing pipeline.
//!
//! ```text
//! feed ──▶ [https workers] ──host──▶ [http workers]
//!                │                         │
//!                └──────── url ──▶ aggregator ◀┘
//! ```
//!
//! Stage inputs are bounded channels whose receiver is shared by the stage's
//! workers. Each closure happens only once every producer into that stage is
//! done: the feeder closes the https input, joining the https workers closes
//! the http input, joining the http workers closes the output channel.

use std::num::NonZeroUsize;
use std::sync::Arc;

use futures::future::join_all;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::checker::{Probe, Scheme};
use crate::output::{Aggregator, OutputSummary};
use crate::source;

// Smallest capacity tokio allows; keeps handoffs close to synchronous.
const STAGE_CAPACITY: usize = 1;

type SharedReceiver = Arc<Mutex<mpsc::Receiver<String>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Streaming,
    DrainingHttps,
    DrainingHttp,
    Flushing,
    Done,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    pub probed: usize,
    pub live: usize,
}

impl StageStats {
    fn merge(&mut self, other: StageStats) {
        self.probed += other.probed;
        self.live += other.live;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub hostnames: usize,
    pub https: StageStats,
    pub http: StageStats,
    pub output: OutputSummary,
}

/// Runs hostnames through the https and http probe stages.
pub struct Pipeline<P> {
    probe: Arc<P>,
    workers_per_stage: NonZeroUsize,
}

impl<P> Pipeline<P>
where
    P: Probe + 'static,
{
    pub fn new(probe: P, workers_per_stage: NonZeroUsize) -> Self {
        Self {
            probe: Arc::new(probe),
            workers_per_stage,
        }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Probes every line of `hostnames` and writes live URLs to `sink`.
    ///
    /// Always runs to the end of the input. Returns the sink once it has been
    /// flushed.
    pub async fn run<R, W>(&self, hostnames: R, sink: W) -> (W, RunSummary)
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let mut state = PipelineState::Idle;
        let (https_tx, https_rx) = mpsc::channel(STAGE_CAPACITY);
        let (http_tx, http_rx) = mpsc::channel(STAGE_CAPACITY);
        let (output_tx, output_rx) = mpsc::channel(STAGE_CAPACITY);

        let aggregator = tokio::spawn(Aggregator::new(sink, output_rx).run());
        let https_workers =
            self.spawn_stage(Scheme::Https, https_rx, &output_tx, Some(&http_tx));
        let http_workers = self.spawn_stage(Scheme::Http, http_rx, &output_tx, None);

        advance(&mut state, PipelineState::Streaming);
        let hostnames = source::feed(hostnames, https_tx).await;
        info!(hostnames, "all hostnames queued");

        advance(&mut state, PipelineState::DrainingHttps);
        let https = join_stage(Scheme::Https, https_workers).await;
        drop(http_tx);

        advance(&mut state, PipelineState::DrainingHttp);
        let http = join_stage(Scheme::Http, http_workers).await;
        drop(output_tx);

        advance(&mut state, PipelineState::Flushing);
        let (sink, output) = match aggregator.await {
            Ok(done) => done,
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        };

        advance(&mut state, PipelineState::Done);
        let summary = RunSummary {
            hostnames,
            https,
            http,
            output,
        };
        info!(
            hostnames,
            https_live = https.live,
            http_live = http.live,
            written = output.written,
            write_failures = output.write_failures,
            "pipeline finished"
        );

        (sink, summary)
    }

    fn spawn_stage(
        &self,
        scheme: Scheme,
        input: mpsc::Receiver<String>,
        output: &mpsc::Sender<String>,
        forward: Option<&mpsc::Sender<String>>,
    ) -> Vec<JoinHandle<StageStats>> {
        let input: SharedReceiver = Arc::new(Mutex::new(input));

        (0..self.workers_per_stage.get())
            .map(|worker| {
                tokio::spawn(probe_worker(
                    Arc::clone(&self.probe),
                    scheme,
                    worker,
                    Arc::clone(&input),
                    output.clone(),
                    forward.cloned(),
                ))
            })
            .collect()
    }
}

fn advance(state: &mut PipelineState, next: PipelineState) {
    debug!(from = ?state, to = ?next, "pipeline state");
    *state = next;
}

async fn probe_worker<P>(
    probe: Arc<P>,
    scheme: Scheme,
    worker: usize,
    input: SharedReceiver,
    output: mpsc::Sender<String>,
    forward: Option<mpsc::Sender<String>>,
) -> StageStats
where
    P: Probe,
{
    let mut stats = StageStats::default();

    loop {
        let host = {
            let mut rx = input.lock().await;
            rx.recv().await
        };
        let Some(host) = host else { break };

        let url = scheme.url_for(&host);
        stats.probed += 1;
        if probe.probe(&url).await.is_live() {
            stats.live += 1;
            if output.send(url).await.is_err() {
                warn!(stage = %scheme, worker, %host, "output closed, dropping result");
            }
        }

        if let Some(next) = &forward {
            if next.send(host).await.is_err() {
                warn!(stage = %scheme, worker, "next stage closed, host not forwarded");
            }
        }
    }

    debug!(
        stage = %scheme,
        worker,
        probed = stats.probed,
        live = stats.live,
        "worker finished"
    );
    stats
}

async fn join_stage(scheme: Scheme, workers: Vec<JoinHandle<StageStats>>) -> StageStats {
    let mut total = StageStats::default();

    for result in join_all(workers).await {
        match result {
            Ok(stats) => total.merge(stats),
            Err(error) => error!(stage = %scheme, %error, "probe worker failed"),
        }
    }

    info!(stage = %scheme, probed = total.probed, live = total.live, "stage drained");
    total
}
