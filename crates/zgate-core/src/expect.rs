//! Pattern matching over a live interpreter output stream.
//!
//! Output arrives as byte chunks on a channel fed by the PTY reader thread.
//! [`OutputStream::expect`] scans the unconsumed part of the buffer for the
//! earliest match among a list of alternatives, waiting for more output until
//! a deadline measured from the start of the call.

use regex::bytes::Regex;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};
use tracing::trace;

/// A successful match. The buffer cursor has moved past `matched`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Which alternative matched (position in the pattern list).
    pub index: usize,
    /// Text between the previous cursor position and the match.
    pub before: String,
    /// The matched text itself.
    pub matched: String,
}

/// Outcome of waiting for a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expect {
    Matched(Match),
    /// Nothing matched before the deadline. Carries (and consumes) everything read.
    Timeout { before: String },
    /// The process closed its output first. Carries (and consumes) everything read.
    Eof { before: String },
}

impl Expect {
    /// Text preceding the match, or all unconsumed text when nothing matched.
    pub fn before(&self) -> &str {
        match self {
            Expect::Matched(m) => &m.before,
            Expect::Timeout { before } | Expect::Eof { before } => before,
        }
    }

    pub fn into_before(self) -> String {
        match self {
            Expect::Matched(m) => m.before,
            Expect::Timeout { before } | Expect::Eof { before } => before,
        }
    }
}

/// Buffered reader over the chunks produced by an interpreter.
#[derive(Debug)]
pub struct OutputStream {
    chunks: Receiver<Vec<u8>>,
    buffer: Vec<u8>,
    closed: bool,
}

impl OutputStream {
    pub fn new(chunks: Receiver<Vec<u8>>) -> Self {
        Self {
            chunks,
            buffer: Vec::new(),
            closed: false,
        }
    }

    /// Wait up to `timeout` for the earliest match of any of `patterns`.
    ///
    /// When two alternatives match at the same offset the one listed first wins.
    pub fn expect(&mut self, patterns: &[&Regex], timeout: Duration) -> Expect {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(found) = self.take_match(patterns) {
                return Expect::Matched(found);
            }

            if self.closed {
                return Expect::Eof {
                    before: self.drain(),
                };
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Expect::Timeout {
                    before: self.drain(),
                };
            }

            match self.chunks.recv_timeout(remaining) {
                Ok(chunk) => {
                    self.buffer.extend_from_slice(&chunk);
                    self.pull_queued();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.closed = true,
            }
        }
    }

    #[cfg(test)]
    fn is_closed(&self) -> bool {
        self.closed
    }

    /// Append whatever is already queued without blocking.
    fn pull_queued(&mut self) {
        loop {
            match self.chunks.try_recv() {
                Ok(chunk) => self.buffer.extend_from_slice(&chunk),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
    }

    fn take_match(&mut self, patterns: &[&Regex]) -> Option<Match> {
        let (index, start, end) = patterns
            .iter()
            .enumerate()
            .filter_map(|(index, re)| re.find(&self.buffer).map(|m| (index, m.start(), m.end())))
            .min_by_key(|&(index, start, _)| (start, index))?;

        let before = String::from_utf8_lossy(&self.buffer[..start]).into_owned();
        let matched = String::from_utf8_lossy(&self.buffer[start..end]).into_owned();
        self.buffer.drain(..end);

        trace!(target: "zgate::expect", "Matched alternative {} ({:?}) after {} bytes", index, matched, before.len());
        Some(Match {
            index,
            before,
            matched,
        })
    }

    fn drain(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        text
    }
}
