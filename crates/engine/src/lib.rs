//! GridFlow engine
//!
//! Loads pipeline scripts and runs them through the two-phase
//! protocol: a check pass that validates every command without doing
//! work, then an execute pass that performs it. Scripts are flat
//! keyword lines; the interesting machinery is the scoped variable
//! environment, the `$Name` reference resolver and the typed argument
//! binding shared by runnable and calculation calls.

pub mod command;
pub mod constants;
pub mod engine;
pub mod error;
pub mod resolver;
pub mod runnable;
pub mod script;
pub mod types;
pub mod variables;

pub use engine::{CalcInvocation, Engine, EngineOptions, LaunchReport, PhaseReport};
pub use error::{Error, Result};
pub use script::Script;
