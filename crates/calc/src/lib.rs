//! Calculation Registry.
//!
//! Provides distributed registration for calculation units callable from
//! pipeline scripts. Calculations are the computational leaves of a run:
//! resampling a raster, building a pressure map, touching an output file.
//!
//! # Architecture
//!
//! The registry uses [`linkme::distributed_slice`] for compile-time
//! registration:
//!
//! 1. A calculation declares a [`CalcDescriptor`] in [`CALCULATIONS`]
//! 2. At link time, all declarations are collected into the slice
//! 3. At runtime, [`CalcRegistry::with_builtins`] indexes them by name
//!    for validation and dispatch
//!
//! This allows calculations to live anywhere in the codebase (including
//! downstream crates) while remaining discoverable before a script runs.
//! Embedders can additionally register boxed [`Calculation`] values at
//! runtime, which is how test doubles are injected.
//!
//! # Signatures
//!
//! Every calculation publishes an explicit [`ArgSpec`] list. The engine
//! reads it to validate argument count, parse literals into values,
//! apply numeric ranges and decide which arguments are inputs that must
//! already exist versus outputs the calculation will materialize.

// Slice registration expands to link-section statics, which the
// unsafe_code lint rejects.
#![allow(unsafe_code)]

pub use linkme;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use linkme::distributed_slice;
use thiserror::Error;
use tracing::warn;

use gridflow_foundation::{
    ArgumentCursor, CursorError, Direction, StorageProbe, TypeKind, Value,
};

pub mod builtins;

/// Raised by a calculation body or by registry maintenance
#[derive(Debug, Error)]
pub enum CalcError {
    #[error("{0}")]
    Failed(String),
    #[error(transparent)]
    Arguments(#[from] CursorError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("calculation '{0}' is already registered")]
    Duplicate(String),
}

/// Inclusive numeric bounds on a declared argument
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        ValueRange { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// One declared argument of a calculation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArgSpec {
    pub name: &'static str,
    pub kind: TypeKind,
    pub direction: Direction,
    pub range: Option<ValueRange>,
}

impl ArgSpec {
    pub const fn input(name: &'static str, kind: TypeKind) -> Self {
        ArgSpec {
            name,
            kind,
            direction: Direction::In,
            range: None,
        }
    }

    pub const fn output(name: &'static str, kind: TypeKind) -> Self {
        ArgSpec {
            name,
            kind,
            direction: Direction::Out,
            range: None,
        }
    }

    pub const fn ranged(name: &'static str, kind: TypeKind, min: f64, max: f64) -> Self {
        ArgSpec {
            name,
            kind,
            direction: Direction::In,
            range: Some(ValueRange::new(min, max)),
        }
    }
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.direction, self.kind, self.name)
    }
}

/// Context handed to a running calculation
///
/// Carries the bound argument values and the storage probe. The probe is
/// the only storage surface a calculation shares with the engine; payload
/// I/O beyond it is the calculation's own business.
pub struct CalcContext<'a> {
    args: &'a [Value],
    probe: &'a dyn StorageProbe,
}

impl<'a> CalcContext<'a> {
    pub fn new(args: &'a [Value], probe: &'a dyn StorageProbe) -> Self {
        CalcContext { args, probe }
    }

    pub fn args(&self) -> &'a [Value] {
        self.args
    }

    /// Typed cursor over the bound arguments
    pub fn cursor(&self) -> ArgumentCursor<'a> {
        ArgumentCursor::new(self.args)
    }

    pub fn probe(&self) -> &'a dyn StorageProbe {
        self.probe
    }
}

/// A callable calculation unit
pub trait Calculation: Send + Sync {
    /// Script-visible name
    fn name(&self) -> &str;

    /// One-line description for listings
    fn summary(&self) -> &str;

    /// Declared arguments, in call order
    fn signature(&self) -> &[ArgSpec];

    /// Perform the work. Only called during the execute phase, with
    /// arguments already validated against the signature.
    fn run(&self, ctx: &mut CalcContext<'_>) -> Result<(), CalcError>;
}

/// Body signature for statically registered calculations
pub type CalcFn = fn(&mut CalcContext<'_>) -> Result<(), CalcError>;

/// Descriptor for a statically registered calculation
#[derive(Clone, Copy)]
pub struct CalcDescriptor {
    pub name: &'static str,
    pub summary: &'static str,
    pub signature: &'static [ArgSpec],
    pub run: CalcFn,
}

impl Calculation for CalcDescriptor {
    fn name(&self) -> &str {
        self.name
    }

    fn summary(&self) -> &str {
        self.summary
    }

    fn signature(&self) -> &[ArgSpec] {
        self.signature
    }

    fn run(&self, ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
        (self.run)(ctx)
    }
}

/// Distributed slice collecting all static calculation registrations.
#[distributed_slice]
pub static CALCULATIONS: [CalcDescriptor];

/// Name-indexed collection of calculations available to a script
#[derive(Default, Clone)]
pub struct CalcRegistry {
    calcs: IndexMap<String, Arc<dyn Calculation>>,
}

impl CalcRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with every statically declared calculation
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for descriptor in CALCULATIONS.iter() {
            if let Err(err) = registry.register(Arc::new(*descriptor)) {
                warn!(calculation = descriptor.name, %err, "skipping static registration");
            }
        }
        registry
    }

    /// Register a calculation; names are exclusive.
    pub fn register(&mut self, calc: Arc<dyn Calculation>) -> Result<(), CalcError> {
        let name = calc.name().to_string();
        if self.calcs.contains_key(&name) {
            return Err(CalcError::Duplicate(name));
        }
        self.calcs.insert(name, calc);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Calculation>> {
        self.calcs.get(name)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.calcs.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Calculation>> {
        self.calcs.values()
    }

    pub fn len(&self) -> usize {
        self.calcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calcs.is_empty()
    }
}
