//! Result aggregation.
//!
//! A single task owns the result sink and the progress stream, so no lock is
//! needed around either. Both probe stages send validated URLs to it over one
//! channel.

use tokio::io::{self, AsyncWrite, AsyncWriteExt, Stdout};
use tokio::sync::mpsc;
use tracing::{debug, error};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OutputSummary {
    pub written: usize,
    pub write_failures: usize,
}

pub struct Aggregator<W, P = Stdout> {
    sink: W,
    progress: P,
    rx: mpsc::Receiver<String>,
}

impl<W> Aggregator<W, Stdout> {
    /// Echoes progress on stdout.
    pub fn new(sink: W, rx: mpsc::Receiver<String>) -> Self {
        Self {
            sink,
            progress: io::stdout(),
            rx,
        }
    }
}

impl<W, P> Aggregator<W, P>
where
    W: AsyncWrite + Unpin,
    P: AsyncWrite + Unpin,
{
    pub fn with_progress<Q>(self, progress: Q) -> Aggregator<W, Q> {
        Aggregator {
            sink: self.sink,
            progress,
            rx: self.rx,
        }
    }

    /// Drains validated URLs until every sender is gone, then flushes once.
    ///
    /// Each URL goes to the sink as one line and is echoed on the progress
    /// stream. Write failures are logged and counted; draining carries on.
    pub async fn run(mut self) -> (W, OutputSummary) {
        let mut summary = OutputSummary::default();

        while let Some(url) = self.rx.recv().await {
            let line = format!("{url}\n");
            match self.sink.write_all(line.as_bytes()).await {
                Ok(()) => summary.written += 1,
                Err(error) => {
                    error!(%url, %error, "failed to write to output file");
                    summary.write_failures += 1;
                }
            }
            if let Err(error) = self.progress.write_all(line.as_bytes()).await {
                debug!(%url, %error, "failed to echo progress");
            }
        }

        if let Err(error) = self.sink.flush().await {
            error!(%error, "failed to flush output file");
            summary.write_failures += 1;
        }
        let _ = self.progress.flush().await;

        (self.sink, summary)
    }
}
