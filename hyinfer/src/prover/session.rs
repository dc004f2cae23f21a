//! Simplify process session.
//!
//! Commands are written to the standard input of the prover, one formula per
//! line. Answers are read from its standard output by a reader thread and
//! handed over through a channel so that every read can time out.

use std::{
    io::{self, BufRead, BufReader, Write},
    process::{Child, ChildStdin, Command, Stdio},
    thread,
    time::{Duration, Instant},
};

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use log::{debug, trace};

use crate::prover::{
    ProverCommand, ProverError, ProverLauncher, ProverResponse, ProverResult, ProverTransport,
};

/// Prompt printed by the prover before it reads its first command.
const PROMPT: &str = ">\t";

pub struct SimplifySession {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<io::Result<String>>,
    timeout: Duration,
}

impl SimplifySession {
    pub fn start(command: &str, args: &[String], timeout: Duration) -> ProverResult<Self> {
        let mut child = Command::new(command)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    ProverError::Unavailable(format!("{command}: {e}"))
                }
                _ => ProverError::Io(e),
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProverError::Unavailable("failed to capture prover stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProverError::Unavailable("failed to capture prover stdout".into()))?;

        let (tx, rx) = channel::unbounded();
        thread::Builder::new()
            .name("hyinfer-prover-reader".into())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })?;

        let mut session = Self {
            child,
            stdin,
            lines: rx,
            timeout,
        };
        session.send("(PROMPT_OFF)")?;
        debug!("Started prover `{}`", command);
        Ok(session)
    }

    fn send(&mut self, formula: &str) -> ProverResult<()> {
        trace!("prover <- {}", formula);
        writeln!(self.stdin, "{formula}")?;
        self.stdin.flush()?;
        Ok(())
    }

    /// Read answers until one of them states the validity of the last query.
    fn read_verdict(&mut self) -> ProverResult<ProverResponse> {
        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = match self.lines.recv_timeout(remaining) {
                Ok(line) => line?,
                Err(RecvTimeoutError::Timeout) => return Err(ProverError::Timeout(self.timeout)),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ProverError::Protocol("prover exited".into()));
                }
            };

            let line = line.trim_start_matches(PROMPT).trim();
            trace!("prover -> {}", line);
            if line.ends_with("Invalid.") {
                return Ok(ProverResponse::Invalid);
            }
            if line.ends_with("Valid.") {
                return Ok(ProverResponse::Valid);
            }
            if line.starts_with("Bad input") {
                return Err(ProverError::Protocol(line.to_string()));
            }
        }
    }
}

impl ProverTransport for SimplifySession {
    fn request(&mut self, command: &ProverCommand) -> ProverResult<ProverResponse> {
        match command {
            ProverCommand::Assume(formula) => {
                self.send(&format!("(BG_PUSH {formula})"))?;
                Ok(ProverResponse::Ack)
            }
            ProverCommand::UndoAssume => {
                self.send("(BG_POP)")?;
                Ok(ProverResponse::Ack)
            }
            ProverCommand::Check(formula) => {
                self.send(formula)?;
                self.read_verdict()
            }
        }
    }
}

impl Drop for SimplifySession {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Launches [`SimplifySession`]s of a fixed executable.
#[derive(Debug, Clone)]
pub struct SimplifyLauncher {
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl ProverLauncher for SimplifyLauncher {
    fn launch(&self) -> ProverResult<Box<dyn ProverTransport>> {
        Ok(Box::new(SimplifySession::start(
            &self.command,
            &self.args,
            self.timeout,
        )?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_executable_is_unavailable() {
        let launcher = SimplifyLauncher {
            command: "hyinfer-no-such-prover".into(),
            args: vec![],
            timeout: Duration::from_millis(100),
        };
        assert!(matches!(launcher.launch(), Err(ProverError::Unavailable(_))));
    }
}
