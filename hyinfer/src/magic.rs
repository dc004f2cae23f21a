/// Name of the environment variable containing the path to the inference configuration file.
/// If not set, defaults to
///  (1) on Linux and macOS: `$XDG_CONFIG_HOME/hyperion/infer.toml` or `$HOME/.config/hyperion/infer.toml`
///  (2) on Windows: `%APPDATA%\hyperion\infer.toml`
pub const ENV_INFER_CONFIG_PATH: &str = "HY_INFER_CONFIG_PATH";

/// Default executable used to start the redundancy prover.
pub const DEFAULT_PROVER_COMMAND: &str = "Simplify";

/// Default arguments passed to the prover (suppress counterexample output).
pub const DEFAULT_PROVER_ARGS: &[&str] = &["-nosc"];

/// Per-query prover timeout, in milliseconds.
pub const DEFAULT_PROVER_TIMEOUT_MS: u64 = 10_000;

/// How many times a prover session may be (re)started during the lifetime of a bridge.
pub const DEFAULT_PROVER_START_ATTEMPTS: u32 = 5;

/// Derived variables whose depth reaches this value are not used as derivation bases.
pub const DEFAULT_MAX_DERIVATION_DEPTH: usize = 2;

/// Maximum number of distinct values tracked by the `one of` invariant families.
pub const MAX_ONE_OF_ELEMENTS: usize = 3;

/// Number of samples an invariant must see before it may be reported.
pub const MIN_JUSTIFY_SAMPLES: u64 = 3;

/// Number of samples that must hit a bound before the bound may be reported.
pub const REQUIRED_SAMPLES_AT_BOUND: u64 = 3;

/// Axioms asserted once per prover session before any background is pushed.
pub const PROVER_BACKGROUND_AXIOMS: &str = include_str!("prover/background.sx");
