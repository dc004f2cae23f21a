use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    magic::{
        DEFAULT_MAX_DERIVATION_DEPTH, DEFAULT_PROVER_ARGS, DEFAULT_PROVER_COMMAND,
        DEFAULT_PROVER_START_ATTEMPTS, DEFAULT_PROVER_TIMEOUT_MS, ENV_INFER_CONFIG_PATH,
    },
    utils::error::{InferError, InferResult},
};

/// Settings of the redundancy prover (`[prover]` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    /// When `false`, redundancy marking is skipped entirely.
    pub enabled: bool,
    pub command: String,
    pub args: Vec<String>,
    /// Per-query timeout in milliseconds.
    pub timeout_ms: u64,
    pub max_start_attempts: u32,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: DEFAULT_PROVER_COMMAND.to_string(),
            args: DEFAULT_PROVER_ARGS.iter().map(|s| s.to_string()).collect(),
            timeout_ms: DEFAULT_PROVER_TIMEOUT_MS,
            max_start_attempts: DEFAULT_PROVER_START_ATTEMPTS,
        }
    }
}

impl ProverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Engine-wide switches.
///
/// Every key is optional in the TOML representation; missing keys take the
/// values of [`InferenceConfig::default`].
///
/// ```toml
/// pairwise_implications = false
/// disable_ternary_invariants = false
/// var_omit_pattern = "^this\\."
/// max_derivation_depth = 2
/// disabled_invariants = ["Linear"]
/// disabled_derivations = ["join"]
///
/// [prover]
/// command = "Simplify"
/// args = ["-nosc"]
/// timeout_ms = 10000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Pair every adjacent conditional child instead of only the first two.
    pub pairwise_implications: bool,
    pub disable_ternary_invariants: bool,
    /// Also record invariants that hold identically on both sides of a split.
    pub add_nonimplications: bool,
    /// Derived variables whose name matches this pattern are not created.
    pub var_omit_pattern: Option<String>,
    pub max_derivation_depth: usize,
    pub disabled_invariants: Vec<String>,
    pub disabled_derivations: Vec<String>,
    pub prover: ProverConfig,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            pairwise_implications: false,
            disable_ternary_invariants: false,
            add_nonimplications: false,
            var_omit_pattern: None,
            max_derivation_depth: DEFAULT_MAX_DERIVATION_DEPTH,
            disabled_invariants: Vec::new(),
            disabled_derivations: Vec::new(),
            prover: ProverConfig::default(),
        }
    }
}

impl InferenceConfig {
    /// Get the default path to the inference configuration file.
    pub fn default_path() -> PathBuf {
        if let Ok(config_path) = std::env::var(ENV_INFER_CONFIG_PATH) {
            return config_path.into();
        }

        let mut path = PathBuf::new();

        #[cfg(target_os = "windows")]
        {
            if let Ok(appdata) = std::env::var("APPDATA") {
                path.push(appdata);
            }
        }
        #[cfg(not(target_os = "windows"))]
        {
            if let Ok(xdg_config_home) = std::env::var("XDG_CONFIG_HOME") {
                path.push(xdg_config_home);
            } else if let Ok(home) = std::env::var("HOME") {
                path.push(home);
                path.push(".config");
            }
        }

        path.push("hyperion");
        path.push("infer.toml");
        path
    }

    /// Parse a configuration from TOML text. `origin` only serves error reporting.
    pub fn from_toml_str(toml_str: &str, origin: &str) -> InferResult<Self> {
        toml::from_str(toml_str).map_err(|e| InferError::ConfigParseError {
            source: e,
            file: origin.to_string(),
        })
    }

    /// Load the configuration from a TOML file.
    pub fn load_from_toml(path: &Path) -> InferResult<Self> {
        let toml_str = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => InferError::ConfigNotFound(path.to_path_buf()),
            _ => InferError::IoError(e),
        })?;

        Self::from_toml_str(&toml_str, &path.display().to_string())
    }

    /// Load the configuration from [`InferenceConfig::default_path`], falling back
    /// to the defaults when no file exists there.
    pub fn load_or_default() -> InferResult<Self> {
        match Self::load_from_toml(&Self::default_path()) {
            Err(InferError::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    /// Compile [`InferenceConfig::var_omit_pattern`].
    pub fn compile_omit_pattern(&self) -> InferResult<Option<Regex>> {
        self.var_omit_pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| InferError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source: e,
                })
            })
            .transpose()
    }
}
