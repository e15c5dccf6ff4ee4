//! Hostname input.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

pub async fn open(path: &Path) -> io::Result<BufReader<File>> {
    let file = File::open(path).await?;
    Ok(BufReader::new(file))
}

/// Sends every line of `reader`, lower-cased, into `tx` and returns how many
/// were sent. The stage input closes when `tx` is dropped on return.
///
/// Lines are not filtered: an empty line is sent as an empty hostname and
/// invalid UTF-8 is replaced rather than skipped. Only an I/O error ends the
/// input early.
pub async fn feed<R>(mut reader: R, tx: mpsc::Sender<String>) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut sent = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                if tx.send(hostname(&buf)).await.is_err() {
                    warn!(sent, "https stage stopped accepting hostnames");
                    break;
                }
                sent += 1;
            }
            Err(error) => {
                warn!(%error, sent, "stopped reading hostnames");
                break;
            }
        }
    }

    sent
}

// Strips the line terminator (`\n` or `\r\n`) and lower-cases.
fn hostname(raw: &[u8]) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).to_lowercase()
}
