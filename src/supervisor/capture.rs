//! Capture of the child's stdout/stderr into the output log.
//!
//! Both pipes are drained by one background task that owns the sink, so
//! lines never interleave mid-way and the file handle has a single owner.

use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;

/// Open the sink, truncating it first unless `append` is set.
///
/// The file is always written in append mode so clearing it from outside
/// (log clear) does not leave a hole at the old offset.
pub(crate) async fn open_sink(path: &Path, append: bool) -> io::Result<File> {
    if !append {
        tokio::fs::write(path, b"").await?;
    }
    OpenOptions::new().create(true).append(true).open(path).await
}

/// Handle on the task draining the child's pipes.
#[derive(Debug)]
pub(crate) struct OutputCapture {
    task: JoinHandle<()>,
}

impl OutputCapture {
    pub(crate) fn start(
        pid: u32,
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
        sink: File,
    ) -> Self {
        let task = tokio::spawn(pump(
            pid,
            stdout.map(BufReader::new),
            stderr.map(BufReader::new),
            sink,
        ));
        Self { task }
    }

    /// Wait for the pipes to hit EOF. A grandchild can keep them open after
    /// the proxy exits, so the drain is bounded and then aborted, which
    /// closes the pipes and the sink.
    pub(crate) async fn finish(self, drain: Duration) {
        let mut task = self.task;
        if tokio::time::timeout(drain, &mut task).await.is_err() {
            tracing::warn!(
                drain_ms = drain.as_millis() as u64,
                "Output pipes still open after process exit, closing capture"
            );
            task.abort();
            let _ = task.await;
        }
    }
}

async fn next_line<R>(reader: &mut Option<R>, buf: &mut Vec<u8>) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    match reader {
        Some(r) => r.read_until(b'\n', buf).await,
        None => std::future::pending().await,
    }
}

async fn pump(
    pid: u32,
    mut stdout: Option<BufReader<ChildStdout>>,
    mut stderr: Option<BufReader<ChildStderr>>,
    mut sink: File,
) {
    let mut out_buf = Vec::with_capacity(1024);
    let mut err_buf = Vec::with_capacity(1024);
    let mut sink_ok = true;

    while stdout.is_some() || stderr.is_some() {
        let (read, buf, from_stdout) = tokio::select! {
            read = next_line(&mut stdout, &mut out_buf) => (read, &mut out_buf, true),
            read = next_line(&mut stderr, &mut err_buf) => (read, &mut err_buf, false),
        };

        match read {
            Ok(0) | Err(_) => {
                if !buf.is_empty() && sink_ok {
                    sink_ok = write_chunk(&mut sink, buf).await;
                }
                if from_stdout {
                    stdout = None;
                } else {
                    stderr = None;
                }
            }
            Ok(_) => {
                if sink_ok {
                    sink_ok = write_chunk(&mut sink, buf).await;
                }
                buf.clear();
            }
        }
    }

    let _ = sink.flush().await;
    tracing::debug!(pid, "Output capture finished");
}

async fn write_chunk(sink: &mut File, buf: &mut Vec<u8>) -> bool {
    let result = async {
        sink.write_all(buf.as_slice()).await?;
        sink.flush().await
    }
    .await;
    buf.clear();
    match result {
        Ok(()) => true,
        Err(e) => {
            // Keep draining the pipes so the child never blocks on a full pipe.
            tracing::error!(error = %e, "Failed to write process output, discarding further output");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sink_truncates_unless_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.log");
        std::fs::write(&path, "old run\n").unwrap();

        let mut sink = open_sink(&path, true).await.unwrap();
        sink.write_all(b"new run\n").await.unwrap();
        sink.flush().await.unwrap();
        drop(sink);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old run\nnew run\n");

        let sink = open_sink(&path, false).await.unwrap();
        drop(sink);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
