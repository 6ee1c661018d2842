//! The interpreter conversation: banner, restore, save and command steps.
//!
//! Each step is a fixed exchange of input lines and named output markers.
//! Markers the conversation cannot continue without (banner, filename prompt)
//! fail the session when they don't show up; the ready prompt only bounds
//! how long we keep collecting output.

use crate::expect::{Expect, Match};
use crate::process::InterpreterProcess;
use crate::{Result, ZgateError};
use once_cell::sync::Lazy;
use regex::bytes::Regex;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;
use zgate_types::Opening;

/// Title/serial line printed when a story file starts.
static BANNER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Serial [nN]umber [0-9]+").expect("Invalid banner regex"));

/// End of "Please enter a filename [...]: ".
static FILENAME_PROMPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":").expect("Invalid filename prompt regex"));

/// End of "Overwrite existing file? ".
static OVERWRITE_QUESTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\?").expect("Invalid overwrite question regex"));

/// Command prompt.
static READY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r">").expect("Invalid ready regex"));

/// Named cues in the interpreter's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Banner,
    FilenamePrompt,
    OverwriteQuestion,
    Ready,
}

impl Marker {
    pub fn regex(self) -> &'static Regex {
        match self {
            Marker::Banner => &*BANNER_RE,
            Marker::FilenamePrompt => &*FILENAME_PROMPT_RE,
            Marker::OverwriteQuestion => &*OVERWRITE_QUESTION_RE,
            Marker::Ready => &*READY_RE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Marker::Banner => "serial-number banner",
            Marker::FilenamePrompt => "filename prompt",
            Marker::OverwriteQuestion => "overwrite question",
            Marker::Ready => "command prompt",
        }
    }
}

/// How long to wait for each marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolTimeouts {
    pub banner: Duration,
    pub filename_prompt: Duration,
    pub overwrite_question: Duration,
    /// Short: the prompt is only a best-effort end of output.
    pub ready: Duration,
}

impl Default for ProtocolTimeouts {
    fn default() -> Self {
        Self {
            banner: Duration::from_secs(30),
            filename_prompt: Duration::from_secs(30),
            overwrite_question: Duration::from_secs(5),
            ready: Duration::from_millis(200),
        }
    }
}

/// Lifecycle of one interpreter session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Spawned,
    BannerRead,
    Idle,
    Saving,
    Restoring,
    Executing,
    Terminated,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Spawned => "spawned",
            Phase::BannerRead => "banner_read",
            Phase::Idle => "idle",
            Phase::Saving => "saving",
            Phase::Restoring => "restoring",
            Phase::Executing => "executing",
            Phase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Drives one [`InterpreterProcess`] through the interpreter's prompt grammar.
///
/// Dropping the protocol drops the process, which kills it.
#[derive(Debug)]
pub struct SessionProtocol {
    process: InterpreterProcess,
    phase: Phase,
    timeouts: ProtocolTimeouts,
}

impl SessionProtocol {
    pub fn new(process: InterpreterProcess, timeouts: ProtocolTimeouts) -> Self {
        Self {
            process,
            phase: Phase::Spawned,
            timeouts,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session_id(&self) -> Uuid {
        self.process.id()
    }

    /// Consume the title banner and the opening room description.
    pub fn read_opening(&mut self) -> Result<Opening> {
        self.expect_phase(Phase::Spawned)?;

        let banner = self.require(Marker::Banner, self.timeouts.banner)?;
        let title_info = format!("{}{}", banner.before, banner.matched);
        self.phase = Phase::BannerRead;

        // The very first prompt can come without a trailing marker.
        let first_line = self.settle();
        self.phase = Phase::Idle;

        debug!(target: "zgate::protocol", "Session {} opened: {:?}", self.session_id(), title_info.trim());
        Ok(Opening {
            title_info,
            first_line,
        })
    }

    /// Load `snapshot` into the running game.
    ///
    /// A missing file is only reported in the returned narrative text.
    pub fn restore(&mut self, snapshot: &Path) -> Result<String> {
        self.begin(Phase::Restoring)?;

        self.process.send_line("restore")?;
        self.require(Marker::FilenamePrompt, self.timeouts.filename_prompt)?;
        self.process.send_line(&snapshot.to_string_lossy())?;
        let reply = self.settle();

        self.phase = Phase::Idle;
        info!(target: "zgate::protocol", "Session {} restored {:?}", self.session_id(), snapshot);
        Ok(reply)
    }

    /// Write the current game to `snapshot`.
    ///
    /// The interpreter asks before overwriting an existing file, and that
    /// question can't be told apart from game text reliably, so the caller
    /// says whether the file already exists and we answer it blind.
    pub fn save(&mut self, snapshot: &Path, exists: bool) -> Result<String> {
        self.begin(Phase::Saving)?;

        self.process.send_line("save")?;
        self.require(Marker::FilenamePrompt, self.timeouts.filename_prompt)?;
        self.process.send_line(&snapshot.to_string_lossy())?;

        if exists {
            match self.process.expect(
                &[Marker::OverwriteQuestion.regex()],
                self.timeouts.overwrite_question,
            ) {
                Expect::Matched(_) => {}
                Expect::Timeout { before } => {
                    warn!(
                        target: "zgate::protocol",
                        "Session {}: no overwrite question for {:?}, answering anyway (got {:?})",
                        self.session_id(), snapshot, before
                    );
                }
                Expect::Eof { .. } => {
                    return Err(ZgateError::UnexpectedEof {
                        marker: Marker::OverwriteQuestion.name(),
                    });
                }
            }
            self.process.send_line("yes")?;
        }

        let reply = self.settle();
        if !exists && Marker::OverwriteQuestion.regex().is_match(reply.as_bytes()) {
            // The interpreter is parked on a question nobody will answer; nothing was written.
            warn!(
                target: "zgate::protocol",
                "Session {}: unexpected overwrite question for {:?}: {:?}",
                self.session_id(), snapshot, reply
            );
            return Err(ZgateError::UnexpectedOverwrite(snapshot.to_path_buf()));
        }
        self.phase = Phase::Idle;
        info!(target: "zgate::protocol", "Session {} saved {:?}", self.session_id(), snapshot);
        Ok(reply)
    }

    /// Send one game command and collect its output.
    pub fn execute(&mut self, action: &str) -> Result<String> {
        self.begin(Phase::Executing)?;

        // One request is one line; embedded newlines would smuggle in extra commands.
        let line: String = action
            .chars()
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        self.process.send_line(&line)?;
        let output = self.settle();

        self.phase = Phase::Idle;
        debug!(target: "zgate::protocol", "Session {} ran {:?}", self.session_id(), line);
        Ok(output)
    }

    /// Kill the interpreter. Allowed from any phase.
    pub fn terminate(&mut self) {
        self.process.terminate();
        self.phase = Phase::Terminated;
    }

    fn begin(&mut self, next: Phase) -> Result<()> {
        self.expect_phase(Phase::Idle)?;
        self.phase = next;
        Ok(())
    }

    fn expect_phase(&self, expected: Phase) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(ZgateError::InvalidSessionState {
                expected: expected.to_string(),
                actual: self.phase.to_string(),
            })
        }
    }

    /// Wait for a marker the conversation cannot continue without.
    fn require(&mut self, marker: Marker, timeout: Duration) -> Result<Match> {
        match self.process.expect(&[marker.regex()], timeout) {
            Expect::Matched(found) => Ok(found),
            Expect::Timeout { before } => {
                warn!(
                    target: "zgate::protocol",
                    "Session {} timed out waiting for {} after {:?}: {:?}",
                    self.session_id(), marker.name(), timeout, before
                );
                Err(ZgateError::ProtocolTimeout {
                    marker: marker.name(),
                    timeout,
                })
            }
            Expect::Eof { before } => {
                warn!(
                    target: "zgate::protocol",
                    "Session {} ended while waiting for {}: {:?}",
                    self.session_id(), marker.name(), before
                );
                Err(ZgateError::UnexpectedEof {
                    marker: marker.name(),
                })
            }
        }
    }

    /// Collect output up to the ready prompt, or whatever arrived in time.
    fn settle(&mut self) -> String {
        let outcome = self.process.expect(&[Marker::Ready.regex()], self.timeouts.ready);
        match &outcome {
            Expect::Matched(_) => {}
            Expect::Timeout { .. } => {
                debug!(target: "zgate::protocol", "Session {}: no prompt within {:?}", self.session_id(), self.timeouts.ready);
            }
            Expect::Eof { .. } => {
                warn!(target: "zgate::protocol", "Session {}: interpreter exited", self.session_id());
            }
        }
        outcome.into_before()
    }
}
