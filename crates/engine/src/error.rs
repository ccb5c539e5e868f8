//! Engine errors
//!
//! Every failure that can surface while loading or running a script.
//! Variants raised from a script line carry its location; the check
//! phase exists so most of these appear before any work is done.

use std::path::PathBuf;

use thiserror::Error;

use gridflow_calc::{CalcError, ValueRange};
use gridflow_foundation::{ScriptLocation, ValueError};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{location}: unknown type '{name}'")]
    UnknownType {
        name: String,
        location: ScriptLocation,
    },

    #[error("{location}: duplicate name '{name}'")]
    DuplicateName {
        name: String,
        location: ScriptLocation,
    },

    #[error("{location}: unresolved reference '${name}'")]
    UnresolvedReference {
        name: String,
        location: ScriptLocation,
    },

    #[error("{location}: circular reference while expanding '${name}'")]
    CircularReference {
        name: String,
        location: ScriptLocation,
    },

    #[error("{location}: '{callee}' declares {declared} argument(s), call supplies {supplied}")]
    InvalidNumberOfArgumentsInCall {
        callee: String,
        declared: usize,
        supplied: usize,
        location: ScriptLocation,
    },

    #[error("{location}: {source}")]
    TypeParseFailure {
        source: ValueError,
        location: ScriptLocation,
    },

    #[error("{location}: {name} = {value} violates range {range}")]
    RangeViolation {
        name: String,
        value: f64,
        range: ValueRange,
        location: ScriptLocation,
    },

    #[error("{location}: required {kind} not found: {}", .path.display())]
    MissingResource {
        kind: &'static str,
        path: PathBuf,
        location: ScriptLocation,
    },

    #[error("{location}: cannot provide output directory {}: {reason}", .path.display())]
    MissingOutputDirectory {
        path: PathBuf,
        reason: String,
        location: ScriptLocation,
    },

    #[error("{location}: unknown {kind} '{name}'")]
    UnknownCallable {
        kind: &'static str,
        name: String,
        location: ScriptLocation,
    },

    #[error("{location}: {message}")]
    MalformedScript {
        message: String,
        location: ScriptLocation,
    },

    #[error("{location}: call depth {depth} exceeded invoking '{callee}'")]
    CallDepthExceeded {
        callee: String,
        depth: usize,
        location: ScriptLocation,
    },

    #[error("{location}: calculation '{name}' failed: {source}")]
    CalculationFailed {
        name: String,
        source: CalcError,
        location: ScriptLocation,
    },

    #[error("phase mismatch at call {position}: check ran {check}, execute ran {execute}")]
    PhaseDivergence {
        position: usize,
        check: String,
        execute: String,
    },
}

impl Error {
    /// Location the error points at, if it came from a script line
    pub fn location(&self) -> Option<&ScriptLocation> {
        match self {
            Error::UnknownType { location, .. }
            | Error::DuplicateName { location, .. }
            | Error::UnresolvedReference { location, .. }
            | Error::CircularReference { location, .. }
            | Error::InvalidNumberOfArgumentsInCall { location, .. }
            | Error::TypeParseFailure { location, .. }
            | Error::RangeViolation { location, .. }
            | Error::MissingResource { location, .. }
            | Error::MissingOutputDirectory { location, .. }
            | Error::UnknownCallable { location, .. }
            | Error::MalformedScript { location, .. }
            | Error::CallDepthExceeded { location, .. }
            | Error::CalculationFailed { location, .. } => Some(location),
            Error::PhaseDivergence { .. } => None,
        }
    }
}
