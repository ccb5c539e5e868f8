//! Script commands
//!
//! A body line is classified exactly once, when the script loads. The
//! engine then dispatches on the tag instead of re-inspecting text at
//! every execution, which matters once lists fan a command out.

use gridflow_foundation::{ScriptLine, ScriptLocation, TypeKind};

use crate::error::{Error, Result};
use crate::resolver::is_ident;
use crate::runnable::RunnableKind;
use crate::types::TypeRegistry;

/// One executable command with its script location
#[derive(Debug, Clone)]
pub struct Command {
    pub kind: CommandKind,
    pub location: ScriptLocation,
}

/// What a body line means
#[derive(Debug, Clone)]
pub enum CommandKind {
    /// `Name = text` or `TYPE Name = text`
    Assign {
        name: String,
        declared: Option<TypeKind>,
        text: String,
    },
    /// `DO_LIST $Name` wrapping exactly one command
    ListRun { target: String, body: Box<Command> },
    /// `RUN`, `RUN_SCENARIO` or `RUN_MODULE`
    Invoke {
        kind: RunnableKind,
        callee: String,
        args: String,
    },
    /// `RUN_CALCULATION`
    CalcCall { name: String, args: String },
    /// `PRINT text`
    Print { message: String },
}

impl CommandKind {
    /// Short verb for trace logging
    pub fn verb(&self) -> &'static str {
        match self {
            CommandKind::Assign { .. } => "assign",
            CommandKind::ListRun { .. } => "list",
            CommandKind::Invoke { .. } => "invoke",
            CommandKind::CalcCall { .. } => "calculation",
            CommandKind::Print { .. } => "print",
        }
    }
}

impl Command {
    /// Classify one non-structural line.
    pub(crate) fn classify(line: &ScriptLine, types: &TypeRegistry) -> Result<Command> {
        let text = line.text.as_str();
        let location = line.location.clone();

        if let Some(rest) = keyword(text, "PRINT") {
            return Ok(Command {
                kind: CommandKind::Print {
                    message: rest.to_string(),
                },
                location,
            });
        }
        if let Some(rest) = keyword(text, "RUN_CALCULATION") {
            let (name, args) = parse_call(rest, &location)?;
            return Ok(Command {
                kind: CommandKind::CalcCall { name, args },
                location,
            });
        }
        for kind in [RunnableKind::Run, RunnableKind::Scenario, RunnableKind::Module] {
            if let Some(rest) = keyword(text, kind.invoke_keyword()) {
                let (callee, args) = parse_call(rest, &location)?;
                return Ok(Command {
                    kind: CommandKind::Invoke { kind, callee, args },
                    location,
                });
            }
        }
        classify_assignment(text, types, location)
    }
}

fn classify_assignment(
    text: &str,
    types: &TypeRegistry,
    location: ScriptLocation,
) -> Result<Command> {
    let Some((lhs, rhs)) = text.split_once('=') else {
        let first = text.split_whitespace().next().unwrap_or(text);
        return Err(Error::MalformedScript {
            message: format!("unrecognized command '{first}'"),
            location,
        });
    };
    let rhs = rhs.trim();
    let tokens: Vec<&str> = lhs.split_whitespace().collect();
    match tokens[..] {
        [name] => {
            require_ident(name, &location)?;
            Ok(Command {
                kind: CommandKind::Assign {
                    name: name.to_string(),
                    declared: None,
                    text: rhs.to_string(),
                },
                location,
            })
        }
        [type_name, name] => {
            let declared = types.get(type_name, &location)?;
            require_ident(name, &location)?;
            Ok(Command {
                kind: CommandKind::Assign {
                    name: name.to_string(),
                    declared: Some(declared),
                    text: rhs.to_string(),
                },
                location,
            })
        }
        _ => Err(Error::MalformedScript {
            message: "expected 'Name = value' or 'TYPE Name = value'".into(),
            location,
        }),
    }
}

/// `rest` after a keyword match, or `None` if `text` does not start
/// with `word` as a full token.
pub(crate) fn keyword<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(word)?;
    if rest.is_empty() {
        Some("")
    } else if rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

/// Parse `Name(args)` into its parts.
pub(crate) fn parse_call(rest: &str, location: &ScriptLocation) -> Result<(String, String)> {
    let rest = rest.trim();
    let Some(open) = rest.find('(') else {
        return Err(Error::MalformedScript {
            message: "call requires parentheses".into(),
            location: location.clone(),
        });
    };
    let name = rest[..open].trim();
    require_ident(name, location)?;
    if !rest.ends_with(')') {
        return Err(Error::MalformedScript {
            message: "call requires a closing parenthesis".into(),
            location: location.clone(),
        });
    }
    let args = &rest[open + 1..rest.len() - 1];
    Ok((name.to_string(), args.to_string()))
}

fn require_ident(name: &str, location: &ScriptLocation) -> Result<()> {
    if !is_ident(name) {
        return Err(Error::MalformedScript {
            message: format!("invalid name '{name}'"),
            location: location.clone(),
        });
    }
    Ok(())
}
