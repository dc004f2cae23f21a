use std::path::PathBuf;

use thiserror::Error;

use crate::var::VarIndex;

#[derive(Debug, Error)]
pub enum InferError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration file '{file}': {source}")]
    ConfigParseError {
        source: toml::de::Error,
        file: String,
    },

    #[error("Invalid variable omission pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Program point '{ppt}' expects samples of {expected} values, got {found}")]
    ArityMismatch {
        ppt: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "Views of '{ppt}' must be instantiated up to the end of the catalog ({catalog_len}), requested [{min}, {limit})"
    )]
    PartialInstantiation {
        ppt: String,
        min: usize,
        limit: usize,
        catalog_len: usize,
    },

    #[error("Index range [{min}, {limit}) is outside of the catalog of '{ppt}' ({catalog_len} variables)")]
    InvalidRange {
        ppt: String,
        min: usize,
        limit: usize,
        catalog_len: usize,
    },

    #[error("Program point '{ppt}' already holds a slice over {vars:?}")]
    DuplicateSlice { ppt: String, vars: Vec<VarIndex> },

    #[error("Program point '{ppt}' holds no slice over {vars:?}")]
    SliceNotFound { ppt: String, vars: Vec<VarIndex> },

    #[error("Slices range over 1 to 3 distinct, ordered variables; got {vars:?} in '{ppt}'")]
    InvalidSliceVars { ppt: String, vars: Vec<VarIndex> },

    #[error(
        "Transform from '{from}' to '{to}' must map all {expected} source variables, it maps {found}"
    )]
    InvalidTransform {
        from: String,
        to: String,
        expected: usize,
        found: usize,
    },

    #[error("Transform from '{from}' to '{to}' targets variable {index}, but '{to}' has {target_len}")]
    TransformOutOfRange {
        from: String,
        to: String,
        index: usize,
        target_len: usize,
    },

    #[error("Program point '{0}' cannot flow into itself")]
    SelfFlow(String),

    #[error("Program point '{0}' not found")]
    UnknownPpt(String),

    #[error("Program point '{0}' is already registered")]
    DuplicatePpt(String),

    #[error("Variables cannot be added to '{ppt}' once its views are instantiated")]
    CatalogFrozen { ppt: String },

    #[error("Variables cannot be added to '{ppt}' while it is the source of flow edges")]
    FlowSourceFrozen { ppt: String },

    #[error("Variable '{name}' is a static constant and cannot be appended to '{ppt}'")]
    StaticConstantAppend { ppt: String, name: String },

    #[error("Invariant kind '{0}' is already registered")]
    DuplicateInvariantKind(String),

    #[error("Derivation rule '{0}' is already registered")]
    DuplicateDerivationRule(String),

    #[error("Program point '{0}' has no derivation for some of its derived variables")]
    MissingDerivation(String),

    #[error("No configuration file found at '{}'", .0.display())]
    ConfigNotFound(PathBuf),
}

pub type InferResult<T> = Result<T, InferError>;
