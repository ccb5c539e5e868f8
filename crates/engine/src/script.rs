//! Script container and block builder
//!
//! A script is a flat sequence of BEGIN..END definitions. The builder
//! walks the line records once, classifies every body line and wires
//! DO_LIST constructs around their single command. Invocation targets
//! bind late: a body may call a module defined further down, so names
//! are verified only after the whole script is assembled.

use indexmap::IndexMap;
use tracing::debug;

use gridflow_foundation::{ScriptLine, ScriptLocation, script_lines};

use crate::command::{Command, CommandKind, keyword, parse_call};
use crate::error::{Error, Result};
use crate::resolver::{bare_reference, is_ident};
use crate::runnable::{ParamSpec, Runnable, RunnableKind, parse_signature};
use crate::types::TypeRegistry;

/// All definitions of one loaded script
#[derive(Debug)]
pub struct Script {
    source: String,
    runs: IndexMap<String, Runnable>,
    scenarios: IndexMap<String, Runnable>,
    modules: IndexMap<String, Runnable>,
}

impl Script {
    /// Load a script from raw text.
    pub fn parse(source: &str, text: &str, types: &TypeRegistry) -> Result<Script> {
        Self::from_lines(source, script_lines(source, text), types)
    }

    /// Load a script from pre-split line records.
    pub fn from_lines(
        source: &str,
        lines: Vec<ScriptLine>,
        types: &TypeRegistry,
    ) -> Result<Script> {
        let script = Builder::new(source, types).build(&lines)?;
        script.verify_invocations()?;
        debug!(
            source,
            runs = script.runs.len(),
            scenarios = script.scenarios.len(),
            modules = script.modules.len(),
            "script loaded"
        );
        Ok(script)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn run(&self, name: &str) -> Option<&Runnable> {
        self.runs.get(name)
    }

    pub fn scenario(&self, name: &str) -> Option<&Runnable> {
        self.scenarios.get(name)
    }

    pub fn module(&self, name: &str) -> Option<&Runnable> {
        self.modules.get(name)
    }

    pub fn runnable(&self, kind: RunnableKind, name: &str) -> Option<&Runnable> {
        match kind {
            RunnableKind::Run => self.run(name),
            RunnableKind::Scenario => self.scenario(name),
            RunnableKind::Module => self.module(name),
        }
    }

    /// First declared run
    pub fn default_run(&self) -> Option<&Runnable> {
        self.runs.values().next()
    }

    pub fn runs(&self) -> impl Iterator<Item = &Runnable> {
        self.runs.values()
    }

    pub fn scenarios(&self) -> impl Iterator<Item = &Runnable> {
        self.scenarios.values()
    }

    pub fn modules(&self) -> impl Iterator<Item = &Runnable> {
        self.modules.values()
    }

    /// Visit every command of every body, descending into lists.
    pub fn for_each_command(&self, visit: &mut impl FnMut(&Command)) {
        for runnable in self
            .runs
            .values()
            .chain(self.scenarios.values())
            .chain(self.modules.values())
        {
            visit_commands(&runnable.body, visit);
        }
    }

    fn verify_invocations(&self) -> Result<()> {
        let mut found = None;
        self.for_each_command(&mut |command| {
            if found.is_some() {
                return;
            }
            if let CommandKind::Invoke { kind, callee, .. } = &command.kind
                && self.runnable(*kind, callee).is_none()
            {
                found = Some(Error::UnknownCallable {
                    kind: kind.noun(),
                    name: callee.clone(),
                    location: command.location.clone(),
                });
            }
        });
        match found {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn visit_commands(commands: &[Command], visit: &mut impl FnMut(&Command)) {
    for command in commands {
        visit(command);
        if let CommandKind::ListRun { body, .. } = &command.kind {
            visit_commands(std::slice::from_ref(body), visit);
        }
    }
}

struct Builder<'a> {
    source: String,
    types: &'a TypeRegistry,
    runs: IndexMap<String, Runnable>,
    scenarios: IndexMap<String, Runnable>,
    modules: IndexMap<String, Runnable>,
}

impl<'a> Builder<'a> {
    fn new(source: &str, types: &'a TypeRegistry) -> Self {
        Builder {
            source: source.to_string(),
            types,
            runs: IndexMap::new(),
            scenarios: IndexMap::new(),
            modules: IndexMap::new(),
        }
    }

    fn build(mut self, lines: &[ScriptLine]) -> Result<Script> {
        let mut pos = 0;
        while pos < lines.len() {
            let line = &lines[pos];
            let Some(kind) = begin_kind(&line.text) else {
                return Err(Error::MalformedScript {
                    message: format!("expected a BEGIN block, found '{}'", line.text),
                    location: line.location.clone(),
                });
            };
            pos = self.definition(kind, lines, pos)?;
        }
        Ok(Script {
            source: self.source,
            runs: self.runs,
            scenarios: self.scenarios,
            modules: self.modules,
        })
    }

    /// Parse one definition starting at its BEGIN line; returns the
    /// index after the matching END line.
    fn definition(&mut self, kind: RunnableKind, lines: &[ScriptLine], start: usize) -> Result<usize> {
        let header = &lines[start];
        let rest = keyword(&header.text, kind.begin_keyword()).unwrap_or_default();
        let (name, params) = self.header(kind, rest, &header.location)?;
        if self.runnable_declared(kind, &name) {
            return Err(Error::DuplicateName {
                name,
                location: header.location.clone(),
            });
        }

        let mut body = Vec::new();
        let mut pos = start + 1;
        while pos < lines.len() {
            let line = &lines[pos];
            if is_exact(&line.text, kind.end_keyword()) {
                self.insert(Runnable {
                    kind,
                    name,
                    params,
                    body,
                    declared_at: header.location.clone(),
                });
                return Ok(pos + 1);
            }
            if begin_kind(&line.text).is_some() {
                return Err(Error::MalformedScript {
                    message: "definitions do not nest".into(),
                    location: line.location.clone(),
                });
            }
            let (command, next) = self.body_command(kind, lines, pos)?;
            body.push(command);
            pos = next;
        }
        Err(Error::MalformedScript {
            message: format!("{} without {}", kind.begin_keyword(), kind.end_keyword()),
            location: header.location.clone(),
        })
    }

    fn header(
        &self,
        kind: RunnableKind,
        rest: &str,
        location: &ScriptLocation,
    ) -> Result<(String, Vec<ParamSpec>)> {
        match kind {
            // Runs take no parameters; a bare BEGIN_RUN is named Main.
            RunnableKind::Run => {
                let name = rest.trim();
                if name.is_empty() {
                    Ok(("Main".to_string(), Vec::new()))
                } else if is_ident(name) {
                    Ok((name.to_string(), Vec::new()))
                } else {
                    Err(Error::MalformedScript {
                        message: format!("invalid run name '{name}'"),
                        location: location.clone(),
                    })
                }
            }
            RunnableKind::Scenario | RunnableKind::Module => {
                let (name, args) = parse_call(rest, location)?;
                let params = parse_signature(&args, self.types, location)?;
                Ok((name, params))
            }
        }
    }

    /// One body command at `pos`: a DO_LIST construct or a single line.
    fn body_command(
        &self,
        def_kind: RunnableKind,
        lines: &[ScriptLine],
        pos: usize,
    ) -> Result<(Command, usize)> {
        let line = &lines[pos];
        if let Some(rest) = keyword(&line.text, "DO_LIST") {
            return self.list_command(def_kind, rest, lines, pos);
        }
        if keyword(&line.text, "END_LIST").is_some() {
            return Err(Error::MalformedScript {
                message: "END_LIST without DO_LIST".into(),
                location: line.location.clone(),
            });
        }
        for kind in [RunnableKind::Run, RunnableKind::Scenario, RunnableKind::Module] {
            if keyword(&line.text, kind.end_keyword()).is_some() {
                return Err(Error::MalformedScript {
                    message: format!("unexpected {}", kind.end_keyword()),
                    location: line.location.clone(),
                });
            }
        }
        let command = Command::classify(line, self.types)?;
        if let CommandKind::Invoke {
            kind: RunnableKind::Run,
            ..
        } = &command.kind
            && def_kind != RunnableKind::Run
        {
            return Err(Error::MalformedScript {
                message: "RUN is only valid inside a run block".into(),
                location: line.location.clone(),
            });
        }
        Ok((command, pos + 1))
    }

    fn list_command(
        &self,
        def_kind: RunnableKind,
        rest: &str,
        lines: &[ScriptLine],
        start: usize,
    ) -> Result<(Command, usize)> {
        let location = lines[start].location.clone();
        let Some(target) = bare_reference(rest) else {
            return Err(Error::MalformedScript {
                message: "DO_LIST expects a single '$Name' target".into(),
                location,
            });
        };
        let Some(inner) = lines.get(start + 1) else {
            return Err(Error::MalformedScript {
                message: "DO_LIST without END_LIST".into(),
                location,
            });
        };
        if is_exact(&inner.text, "END_LIST") {
            return Err(Error::MalformedScript {
                message: "DO_LIST wraps exactly one command".into(),
                location: inner.location.clone(),
            });
        }
        let (body, next) = self.body_command(def_kind, lines, start + 1)?;
        let Some(end) = lines.get(next) else {
            return Err(Error::MalformedScript {
                message: "DO_LIST without END_LIST".into(),
                location,
            });
        };
        if !is_exact(&end.text, "END_LIST") {
            return Err(Error::MalformedScript {
                message: "DO_LIST wraps exactly one command".into(),
                location: end.location.clone(),
            });
        }
        let command = Command {
            kind: CommandKind::ListRun {
                target: target.to_string(),
                body: Box::new(body),
            },
            location,
        };
        Ok((command, next + 1))
    }

    fn runnable_declared(&self, kind: RunnableKind, name: &str) -> bool {
        match kind {
            RunnableKind::Run => self.runs.contains_key(name),
            RunnableKind::Scenario => self.scenarios.contains_key(name),
            RunnableKind::Module => self.modules.contains_key(name),
        }
    }

    fn insert(&mut self, runnable: Runnable) {
        let slot = match runnable.kind {
            RunnableKind::Run => &mut self.runs,
            RunnableKind::Scenario => &mut self.scenarios,
            RunnableKind::Module => &mut self.modules,
        };
        slot.insert(runnable.name.clone(), runnable);
    }
}

fn begin_kind(text: &str) -> Option<RunnableKind> {
    [RunnableKind::Run, RunnableKind::Scenario, RunnableKind::Module]
        .into_iter()
        .find(|kind| keyword(text, kind.begin_keyword()).is_some())
}

fn is_exact(text: &str, word: &str) -> bool {
    matches!(keyword(text, word), Some(rest) if rest.is_empty())
}
