//! Interpreter processes attached to a pseudo-terminal.

use crate::expect::{Expect, OutputStream};
use crate::{Result, ZgateError};
use portable_pty::{
    native_pty_system, Child as PtyChild, ChildKiller, CommandBuilder, MasterPty, PtySize,
};
use regex::bytes::Regex;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Line terminator written after every input line.
const LINE_TERMINATOR: &[u8] = b"\n";

/// Program, arguments and working directory for one interpreter launch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// One running interpreter and its PTY.
///
/// The process is killed when the handle is dropped, so every successful
/// [`InterpreterProcess::spawn`] is paired with exactly one termination.
pub struct InterpreterProcess {
    id: Uuid,
    child: Box<dyn PtyChild + Send + Sync>,
    writer: Option<Box<dyn Write + Send>>,
    master: Option<Box<dyn MasterPty + Send>>,
    reader: Option<JoinHandle<()>>,
    output: OutputStream,
    terminated: bool,
}

impl InterpreterProcess {
    /// Launch `command` on a fresh PTY.
    pub fn spawn(command: &CommandLine) -> Result<Self> {
        let id = Uuid::new_v4();
        info!(
            target: "zgate::process",
            "Spawning interpreter {:?} {:?} for session {}",
            command.program, command.args, id
        );

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: 24,
                cols: 80,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| ZgateError::PtyError(e.to_string()))?;

        let mut cmd = CommandBuilder::new(&command.program);
        cmd.args(&command.args);
        cmd.env("TERM", "dumb");
        if let Some(cwd) = &command.cwd {
            cmd.cwd(cwd);
        }

        let mut child = pair.slave.spawn_command(cmd).map_err(|e| {
            warn!(target: "zgate::process", "Failed to spawn {:?}: {}", command.program, e);
            ZgateError::ProcessSpawnFailed(format!("{}: {}", command.program.display(), e))
        })?;
        // Only the child may hold the slave side, so the reader sees EOF when it dies.
        drop(pair.slave);

        let streams = pair
            .master
            .try_clone_reader()
            .and_then(|reader| pair.master.take_writer().map(|writer| (reader, writer)));
        let (mut reader, writer) = match streams {
            Ok(streams) => streams,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ZgateError::PtyError(e.to_string()));
            }
        };

        let (tx, rx) = mpsc::channel::<Vec<u8>>();

        // PTY reads are blocking, so they get their own thread.
        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            let mut total_bytes = 0usize;
            debug!(target: "zgate::process", "PTY reader thread started for session {}", id);

            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!(target: "zgate::process", "PTY reader got EOF for session {}", id);
                        break;
                    }
                    Ok(n) => {
                        total_bytes += n;
                        trace!(
                            target: "zgate::process",
                            "PTY output ({} bytes, total {}): {}",
                            n,
                            total_bytes,
                            String::from_utf8_lossy(&buf[..n]).chars().take(200).collect::<String>()
                        );
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        // EIO once the child side of the PTY is gone.
                        debug!(target: "zgate::process", "PTY read ended for session {}: {}", id, e);
                        break;
                    }
                }
            }

            debug!(target: "zgate::process", "PTY reader thread exiting for session {}", id);
        });

        Ok(Self {
            id,
            child,
            writer: Some(writer),
            master: Some(pair.master),
            reader: Some(handle),
            output: OutputStream::new(rx),
            terminated: false,
        })
    }

    /// Session id used in log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.process_id()
    }

    /// Write `text` followed by a line terminator.
    pub fn send_line(&mut self, text: &str) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            ZgateError::PtyError(format!("session {} is already terminated", self.id))
        })?;

        debug!(target: "zgate::process", "Session {} <- {:?}", self.id, text);
        writer.write_all(text.as_bytes())?;
        writer.write_all(LINE_TERMINATOR)?;
        writer.flush()?;
        Ok(())
    }

    /// Wait for the earliest of `patterns` in the interpreter's output.
    pub fn expect(&mut self, patterns: &[&Regex], timeout: Duration) -> Expect {
        self.output.expect(patterns, timeout)
    }

    #[cfg(test)]
    fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Kill the interpreter and release the PTY. Safe to call repeatedly and
    /// after the process has already exited.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;

        match self.child.try_wait() {
            Ok(Some(status)) => {
                debug!(target: "zgate::process", "Session {} interpreter already exited: {:?}", self.id, status);
            }
            _ => {
                // Kill the whole process group; the child leads its own session.
                #[cfg(unix)]
                if let Some(pid) = self.child.process_id() {
                    unsafe {
                        libc::kill(-(pid as i32), libc::SIGKILL);
                    }
                }
                if let Err(e) = self.child.kill() {
                    trace!(target: "zgate::process", "Kill for session {} reported: {}", self.id, e);
                }
                if let Err(e) = self.child.wait() {
                    warn!(target: "zgate::process", "Failed to reap interpreter for session {}: {}", self.id, e);
                }
            }
        }

        // Closing our side of the PTY unblocks the reader thread.
        drop(self.writer.take());
        drop(self.master.take());

        if let Some(handle) = self.reader.take() {
            if let Err(e) = handle.join() {
                warn!(target: "zgate::process", "Reader thread panicked for session {}: {:?}", self.id, e);
            }
        }

        info!(target: "zgate::process", "Session {} terminated", self.id);
    }
}

impl Drop for InterpreterProcess {
    fn drop(&mut self) {
        self.terminate();
    }
}

impl std::fmt::Debug for InterpreterProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterpreterProcess")
            .field("id", &self.id)
            .field("pid", &self.pid())
            .field("terminated", &self.terminated)
            .finish()
    }
}
