//! Dynamic invariant inference and slicing engine.
//!
//! Program points receive samples of their variables. For every small tuple
//! of variables (a slice) the engine keeps the candidate invariants that no
//! sample has falsified yet, derives further variables from the observed
//! ones, splits points into conditional children to build implications, and
//! asks an external prover which of the surviving invariants are redundant.
//!
//! Most consumers drive the engine through [`context::InferenceContext`]:
//!
//! * [`context::InferenceContext::add_ppt`] registers a [`ppt::ProgramPoint`],
//! * [`context::InferenceContext::observe`] feeds samples,
//! * [`context::InferenceContext::add_implications`] and
//!   [`context::InferenceContext::mark_implied`] post-process the results.

pub mod context;
pub mod derive;
pub mod implication;
pub mod inv;
pub mod magic;
pub mod ppt;
pub mod prover;
pub mod sample;
pub mod slice;
pub mod split;
pub mod utils;
pub mod var;

pub use context::InferenceContext;
pub use ppt::{PptId, ProgramPoint};
pub use sample::{ModState, Sample, Value};
pub use utils::{
    conf::InferenceConfig,
    error::{InferError, InferResult},
};
pub use var::{RepType, VarIndex, VarInfo};
