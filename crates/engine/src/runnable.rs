//! Runnable definitions
//!
//! Runs, scenarios and modules are the same machine underneath: a name,
//! a parameter list and a command body. The kind decides the dispatch
//! keyword and whether an invocation gets its own scope frame.

use std::fmt;

use gridflow_foundation::{Direction, ScriptLocation, TypeKind};

use crate::command::Command;
use crate::error::{Error, Result};
use crate::resolver::{is_ident, split_arguments};
use crate::types::TypeRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnableKind {
    /// Top-level entry; its body owns the global scope
    Run,
    /// Parameterized composition unit
    Scenario,
    /// Parameterized leaf-composition unit
    Module,
}

impl RunnableKind {
    pub const fn noun(&self) -> &'static str {
        match self {
            RunnableKind::Run => "run",
            RunnableKind::Scenario => "scenario",
            RunnableKind::Module => "module",
        }
    }

    pub const fn begin_keyword(&self) -> &'static str {
        match self {
            RunnableKind::Run => "BEGIN_RUN",
            RunnableKind::Scenario => "BEGIN_SCENARIO",
            RunnableKind::Module => "BEGIN_MODULE",
        }
    }

    pub const fn end_keyword(&self) -> &'static str {
        match self {
            RunnableKind::Run => "END_RUN",
            RunnableKind::Scenario => "END_SCENARIO",
            RunnableKind::Module => "END_MODULE",
        }
    }

    pub const fn invoke_keyword(&self) -> &'static str {
        match self {
            RunnableKind::Run => "RUN",
            RunnableKind::Scenario => "RUN_SCENARIO",
            RunnableKind::Module => "RUN_MODULE",
        }
    }
}

impl fmt::Display for RunnableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.noun())
    }
}

/// One declared parameter
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: TypeKind,
    pub direction: Direction,
}

/// A named, callable block of commands
#[derive(Debug, Clone)]
pub struct Runnable {
    pub kind: RunnableKind,
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub body: Vec<Command>,
    pub declared_at: ScriptLocation,
}

/// Parse a signature: comma-separated `[IN|OUT] TYPE Name`, IN implied.
pub(crate) fn parse_signature(
    text: &str,
    types: &TypeRegistry,
    location: &ScriptLocation,
) -> Result<Vec<ParamSpec>> {
    let mut params: Vec<ParamSpec> = Vec::new();
    for part in split_arguments(text, location)? {
        let tokens: Vec<&str> = part.split_whitespace().collect();
        let (direction, type_name, name) = match tokens[..] {
            [type_name, name] => (Direction::In, type_name, name),
            [direction, type_name, name] => {
                let direction = Direction::from_keyword(direction).ok_or_else(|| {
                    Error::MalformedScript {
                        message: format!("expected IN or OUT, found '{direction}'"),
                        location: location.clone(),
                    }
                })?;
                (direction, type_name, name)
            }
            _ => {
                return Err(Error::MalformedScript {
                    message: format!("expected '[IN|OUT] TYPE Name', found '{part}'"),
                    location: location.clone(),
                });
            }
        };
        let kind = types.get(type_name, location)?;
        if !is_ident(name) {
            return Err(Error::MalformedScript {
                message: format!("invalid parameter name '{name}'"),
                location: location.clone(),
            });
        }
        if params.iter().any(|param| param.name == name) {
            return Err(Error::DuplicateName {
                name: name.to_string(),
                location: location.clone(),
            });
        }
        params.push(ParamSpec {
            name: name.to_string(),
            kind,
            direction,
        });
    }
    Ok(params)
}
