//! Prover lifecycle.
//!
//! The bridge starts a session lazily, asserts the axiom preamble, and
//! restarts the session after a failure until its start budget is spent.
//! Once spent, the bridge stays [`BridgeState::Failed`] and every request
//! is refused.

use std::fmt;

use log::{debug, warn};
use strum::{Display, EnumIs};

use crate::{
    magic::PROVER_BACKGROUND_AXIOMS,
    prover::{
        ProverCommand, ProverError, ProverLauncher, ProverResponse, ProverResult, ProverTransport,
        session::SimplifyLauncher,
    },
    utils::conf::ProverConfig,
};

/// Lifecycle of the bridge.
///
/// A session that times out or answers garbage is discarded and the bridge
/// falls back to `Unstarted`, from where the next request may start a fresh
/// session. `Failed` is terminal: the start budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIs, Display)]
pub enum BridgeState {
    Unstarted,
    Ready,
    Failed,
}

/// Conjunction of the embedded axioms, skipping blank and `;` comment lines.
pub fn axiom_preamble() -> String {
    let axioms: Vec<&str> = PROVER_BACKGROUND_AXIOMS
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with(';'))
        .collect();
    format!("(AND {})", axioms.join(" "))
}

pub struct ProverBridge {
    launcher: Option<Box<dyn ProverLauncher>>,
    transport: Option<Box<dyn ProverTransport>>,
    state: BridgeState,
    starts: u32,
    max_starts: u32,
}

impl fmt::Debug for ProverBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProverBridge")
            .field("enabled", &self.launcher.is_some())
            .field("state", &self.state)
            .field("starts", &self.starts)
            .field("max_starts", &self.max_starts)
            .finish()
    }
}

impl ProverBridge {
    pub fn new(launcher: Box<dyn ProverLauncher>, max_starts: u32) -> Self {
        Self {
            launcher: Some(launcher),
            transport: None,
            state: BridgeState::Unstarted,
            starts: 0,
            max_starts,
        }
    }

    /// Bridge that never starts a prover.
    pub fn disabled() -> Self {
        Self {
            launcher: None,
            transport: None,
            state: BridgeState::Failed,
            starts: 0,
            max_starts: 0,
        }
    }

    pub fn from_config(config: &ProverConfig) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        Self::new(
            Box::new(SimplifyLauncher {
                command: config.command.clone(),
                args: config.args.clone(),
                timeout: config.timeout(),
            }),
            config.max_start_attempts,
        )
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Sessions launched so far, successful or not.
    pub fn starts(&self) -> u32 {
        self.starts
    }

    /// Start a session if none is running. Returns whether one is ready.
    pub fn ensure_started(&mut self) -> bool {
        if self.state.is_ready() {
            return true;
        }
        let Some(launcher) = &self.launcher else {
            return false;
        };

        while self.starts < self.max_starts {
            self.starts += 1;
            match launcher.launch().and_then(Self::initialize) {
                Ok(transport) => {
                    debug!("Prover ready after {} start(s)", self.starts);
                    self.transport = Some(transport);
                    self.state = BridgeState::Ready;
                    return true;
                }
                Err(e) => warn!("Could not start prover (attempt {}): {}", self.starts, e),
            }
        }

        debug!("Prover start budget of {} exhausted", self.max_starts);
        self.state = BridgeState::Failed;
        false
    }

    fn initialize(mut transport: Box<dyn ProverTransport>) -> ProverResult<Box<dyn ProverTransport>> {
        transport.request(&ProverCommand::Assume(axiom_preamble()))?;
        match transport.request(&ProverCommand::Check("(EQ 1 1)".into()))? {
            ProverResponse::Valid => Ok(transport),
            other => Err(ProverError::Protocol(format!(
                "sanity check answered {:?}",
                other
            ))),
        }
    }

    /// Send `command` to the running session. A failed request discards the
    /// session.
    pub fn request(&mut self, command: &ProverCommand) -> ProverResult<ProverResponse> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(ProverError::Unavailable(format!("bridge is {}", self.state)));
        };
        let result = transport.request(command);
        if let Err(e) = &result {
            debug!("Prover request failed: {}", e);
            self.shutdown();
        }
        result
    }

    /// Discard the current session and start a new one.
    pub fn restart(&mut self) -> bool {
        self.shutdown();
        self.ensure_started()
    }

    pub fn shutdown(&mut self) {
        self.transport = None;
        if self.state.is_ready() {
            self.state = BridgeState::Unstarted;
        }
    }
}
