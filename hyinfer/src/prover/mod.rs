//! Redundancy elimination through an external prover.
//!
//! The prover runs as a separate process speaking the Simplify protocol over
//! its standard streams. Every failure of that process is contained in the
//! [`bridge`]: a failed redundancy pass leaves the invariants untouched.
//!
//! ## Core concepts
//! * [`ProverTransport`] – One live prover conversation. Implemented by
//!   [`session::SimplifySession`] and by in-memory scripts in tests.
//! * [`ProverLauncher`] – Starts new conversations on demand.
//! * [`bridge::ProverBridge`] – Start/restart state machine around a
//!   launcher.
//! * [`redundancy`] – The redundancy pass proper.

pub mod bridge;
pub mod redundancy;
pub mod session;

use std::{io, time::Duration};

use thiserror::Error;

/// Request sent to the prover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProverCommand {
    /// Push a formula onto the background.
    Assume(String),
    /// Ask whether a formula is valid under the current background.
    Check(String),
    /// Pop the most recent assumption.
    UndoAssume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProverResponse {
    /// The command needs no answer.
    Ack,
    Valid,
    Invalid,
}

#[derive(Debug, Error)]
pub enum ProverError {
    #[error("Prover unavailable: {0}")]
    Unavailable(String),
    #[error("Prover did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Unexpected prover output: {0}")]
    Protocol(String),
    #[error("Prover I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type ProverResult<T> = Result<T, ProverError>;

/// A live conversation with a prover.
pub trait ProverTransport: Send {
    fn request(&mut self, command: &ProverCommand) -> ProverResult<ProverResponse>;
}

/// Factory of prover conversations.
pub trait ProverLauncher: Send {
    fn launch(&self) -> ProverResult<Box<dyn ProverTransport>>;
}

impl<F> ProverLauncher for F
where
    F: Fn() -> ProverResult<Box<dyn ProverTransport>> + Send,
{
    fn launch(&self) -> ProverResult<Box<dyn ProverTransport>> {
        self()
    }
}
