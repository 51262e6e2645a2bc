//! Child process execution with both output streams drained to EOF.

use std::collections::VecDeque;
use std::io;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, trace};

const TAIL_LINES: usize = 20;

/// Lines observed on one output stream.
#[derive(Debug, Default)]
pub(crate) struct StreamSummary {
    pub(crate) lines: u64,
    pub(crate) frames: u64,
    tail: VecDeque<String>,
}

impl StreamSummary {
    fn record(&mut self, line: &str) {
        self.lines += 1;
        if line.trim().is_empty() {
            return;
        }
        if self.tail.len() == TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }

    pub(crate) fn tail(&self) -> String {
        self.tail.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

/// Result of a process that ran to exit.
#[derive(Debug)]
pub(crate) struct Completed {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: StreamSummary,
    pub(crate) stderr: StreamSummary,
    pub(crate) elapsed: Duration,
}

impl Completed {
    /// Diagnostics to report on failure: stderr tail, or stdout tail when stderr was silent.
    pub(crate) fn diagnostics(&self) -> String {
        let stderr = self.stderr.tail();
        if stderr.is_empty() {
            self.stdout.tail()
        } else {
            stderr
        }
    }

    pub(crate) fn frames(&self) -> u64 {
        self.stdout.frames + self.stderr.frames
    }
}

/// Spawn `command`, drain stdout and stderr line by line, then wait for exit.
///
/// Returns only once both streams reached EOF and the process has exited.
pub(crate) async fn run_drained(
    mut command: Command,
    tool: &'static str,
    frame_pattern: Option<&Regex>,
) -> io::Result<Completed> {
    let started = Instant::now();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| io::Error::other("stdout was not captured"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| io::Error::other("stderr was not captured"))?;

    let (stdout, stderr) = tokio::join!(
        drain(stdout, tool, "stdout", frame_pattern),
        drain(stderr, tool, "stderr", frame_pattern)
    );
    let status = child.wait().await?;

    Ok(Completed {
        status,
        stdout: stdout?,
        stderr: stderr?,
        elapsed: started.elapsed(),
    })
}

async fn drain<R>(
    reader: R,
    tool: &'static str,
    stream: &'static str,
    frame_pattern: Option<&Regex>,
) -> io::Result<StreamSummary>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buffer = Vec::new();
    let mut summary = StreamSummary::default();
    loop {
        buffer.clear();
        if reader.read_until(b'\n', &mut buffer).await? == 0 {
            break;
        }
        let raw = String::from_utf8_lossy(&buffer);
        let line = raw.trim_end_matches(['\r', '\n']);
        if frame_pattern.is_some_and(|pattern| pattern.is_match(line)) {
            summary.frames += 1;
            debug!(tool, stream, line, "frame processed");
        } else {
            trace!(tool, stream, line, "tool output");
        }
        summary.record(line);
    }
    Ok(summary)
}
