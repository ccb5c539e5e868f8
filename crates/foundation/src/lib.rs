//! GridFlow Foundation
//!
//! Shared vocabulary for the pipeline engine: value kinds, script line
//! records, storage probes and the argument cursor used by calculations.

pub mod cursor;
pub mod line;
pub mod probe;
pub mod types;

pub use cursor::{ArgumentCursor, CursorError};
pub use line::{ScriptLine, ScriptLocation, script_lines};
pub use probe::{FsProbe, MemoryProbe, StorageProbe};
pub use types::*;
