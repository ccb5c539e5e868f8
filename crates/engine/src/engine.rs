//! Execution engine
//!
//! Drives a script's entry run through the two-phase protocol. The
//! check phase dispatches the whole command tree without performing
//! work: calculations validate their arguments, storage is only
//! probed, and outputs are marked as virtually created so downstream
//! inputs validate. The execute phase dispatches the same tree and
//! does the work. A launch runs both and refuses to pass when the
//! phases disagree about which calculations ran.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, instrument, trace};

use gridflow_calc::{CalcContext, CalcRegistry, ValueRange};
use gridflow_foundation::{Direction, Phase, ScriptLocation, StorageProbe, TypeKind, Value};

use crate::command::{Command, CommandKind};
use crate::constants::ConstantRegistry;
use crate::error::{Error, Result};
use crate::resolver;
use crate::runnable::{ParamSpec, Runnable, RunnableKind};
use crate::script::Script;
use crate::types::{self, ValidationCtx};
use crate::variables::Environment;

/// Engine knobs, all script-independent
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Create missing parent directories for outputs during execute
    pub create_output_dirs: bool,
    /// Invocation nesting limit
    pub max_call_depth: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            create_output_dirs: true,
            max_call_depth: 64,
        }
    }
}

/// One calculation dispatch, as seen by a phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalcInvocation {
    pub name: String,
    pub args: usize,
}

impl fmt::Display for CalcInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.args)
    }
}

/// What one phase did
#[derive(Debug, Clone)]
pub struct PhaseReport {
    pub phase: Phase,
    pub commands: u64,
    pub list_iterations: u64,
    pub calc_trace: Vec<CalcInvocation>,
}

impl PhaseReport {
    fn new(phase: Phase) -> Self {
        PhaseReport {
            phase,
            commands: 0,
            list_iterations: 0,
            calc_trace: Vec::new(),
        }
    }
}

/// Both phase reports of a successful launch
#[derive(Debug, Clone)]
pub struct LaunchReport {
    pub check: PhaseReport,
    pub execute: PhaseReport,
}

/// A loaded script plus everything needed to run it
pub struct Engine {
    script: Script,
    constants: Arc<ConstantRegistry>,
    calcs: CalcRegistry,
    probe: Arc<dyn StorageProbe>,
    options: EngineOptions,
    defines: Vec<(String, String)>,
    entry: Option<String>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("source", &self.script.source())
            .field("calculations", &self.calcs.len())
            .field("options", &self.options)
            .field("entry", &self.entry)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Build an engine over a loaded script. Every calculation the
    /// script names must already be registered.
    pub fn new(script: Script, calcs: CalcRegistry, probe: Arc<dyn StorageProbe>) -> Result<Engine> {
        let engine = Engine {
            script,
            constants: Arc::new(ConstantRegistry::with_defaults()),
            calcs,
            probe,
            options: EngineOptions::default(),
            defines: Vec::new(),
            entry: None,
        };
        engine.verify_calc_bindings()?;
        info!(
            source = engine.script.source(),
            calculations = engine.calcs.len(),
            "engine ready"
        );
        Ok(engine)
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the stock constants.
    pub fn with_constants(mut self, constants: ConstantRegistry) -> Self {
        self.constants = Arc::new(constants);
        self
    }

    /// Select the run to launch; defaults to the first declared run.
    pub fn with_entry(mut self, name: impl Into<String>) -> Self {
        self.entry = Some(name.into());
        self
    }

    /// Seed a global string variable before either phase starts.
    pub fn define(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defines.push((name.into(), value.into()));
        self
    }

    /// Dry-run the entry: full dispatch, no work performed.
    pub fn check(&self) -> Result<PhaseReport> {
        self.run_phase(Phase::Check)
    }

    /// Perform the entry's work without a preceding check.
    pub fn execute(&self) -> Result<PhaseReport> {
        self.run_phase(Phase::Execute)
    }

    /// Check, then execute, then compare the calculation traces.
    pub fn launch(&self) -> Result<LaunchReport> {
        let check = self.check()?;
        let execute = self.execute()?;
        verify_parity(&check, &execute)?;
        info!(
            commands = execute.commands,
            calculations = execute.calc_trace.len(),
            "launch complete"
        );
        Ok(LaunchReport { check, execute })
    }

    #[instrument(skip_all, fields(phase = %phase))]
    fn run_phase(&self, phase: Phase) -> Result<PhaseReport> {
        let run = self.entry_run()?;
        let mut env = Environment::new(self.constants.clone());
        let define_location = ScriptLocation::internal("command line");
        for (name, value) in &self.defines {
            env.assign(name, value, &define_location)?;
        }
        let mut report = PhaseReport::new(phase);
        info!(run = run.name, "phase started");
        self.run_body(&run.body, &mut env, phase, &mut report, 1)?;
        info!(
            commands = report.commands,
            calculations = report.calc_trace.len(),
            "phase finished"
        );
        Ok(report)
    }

    fn entry_run(&self) -> Result<&Runnable> {
        match &self.entry {
            Some(name) => self.script.run(name).ok_or_else(|| Error::UnknownCallable {
                kind: "run",
                name: name.clone(),
                location: ScriptLocation::internal(self.script.source()),
            }),
            None => self.script.default_run().ok_or_else(|| Error::MalformedScript {
                message: "script defines no run block".into(),
                location: ScriptLocation::internal(self.script.source()),
            }),
        }
    }

    fn verify_calc_bindings(&self) -> Result<()> {
        let mut found = None;
        self.script.for_each_command(&mut |command| {
            if found.is_some() {
                return;
            }
            if let CommandKind::CalcCall { name, .. } = &command.kind
                && !self.calcs.is_known(name)
            {
                found = Some(Error::UnknownCallable {
                    kind: "calculation",
                    name: name.clone(),
                    location: command.location.clone(),
                });
            }
        });
        match found {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn run_body(
        &self,
        body: &[Command],
        env: &mut Environment,
        phase: Phase,
        report: &mut PhaseReport,
        depth: usize,
    ) -> Result<()> {
        for command in body {
            self.dispatch(command, env, phase, report, depth)?;
        }
        Ok(())
    }

    fn dispatch(
        &self,
        command: &Command,
        env: &mut Environment,
        phase: Phase,
        report: &mut PhaseReport,
        depth: usize,
    ) -> Result<()> {
        report.commands += 1;
        trace!(verb = command.kind.verb(), location = %command.location, "dispatch");
        match &command.kind {
            CommandKind::Assign { name, declared, text } => {
                self.exec_assign(name, *declared, text, &command.location, env)
            }
            CommandKind::ListRun { target, body } => {
                self.exec_list(target, body, &command.location, env, phase, report, depth)
            }
            CommandKind::Invoke { kind, callee, args } => {
                self.exec_invoke(*kind, callee, args, &command.location, env, phase, report, depth)
            }
            CommandKind::CalcCall { name, args } => {
                self.exec_calc(name, args, &command.location, env, phase, report)
            }
            CommandKind::Print { message } => {
                self.exec_print(message, &command.location, env, phase)
            }
        }
    }

    fn exec_assign(
        &self,
        name: &str,
        declared: Option<TypeKind>,
        text: &str,
        location: &ScriptLocation,
        env: &mut Environment,
    ) -> Result<()> {
        match declared {
            Some(kind) => {
                // Reference-free literals parse eagerly so a bad
                // declaration fails at its own line. Referencing text
                // stays lazy; it may name outputs that appear later.
                if kind != TypeKind::Str && !resolver::has_reference(text) {
                    kind.parse_literal(text).map_err(|source| Error::TypeParseFailure {
                        source,
                        location: location.clone(),
                    })?;
                }
                env.declare(name, kind, text, location)
            }
            None => env.assign(name, text, location),
        }
    }

    fn exec_print(
        &self,
        message: &str,
        location: &ScriptLocation,
        env: &Environment,
        phase: Phase,
    ) -> Result<()> {
        let resolved = resolver::resolve_text(message, env, location)?;
        match phase {
            Phase::Check => debug!(target: "pipeline", "{resolved}"),
            Phase::Execute => info!(target: "pipeline", "{resolved}"),
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_list(
        &self,
        target: &str,
        body: &Command,
        location: &ScriptLocation,
        env: &mut Environment,
        phase: Phase,
        report: &mut PhaseReport,
        depth: usize,
    ) -> Result<()> {
        let original = match env.find_var(target) {
            Some(var) => var.raw().to_string(),
            None if env.is_constant(target) => {
                return Err(Error::MalformedScript {
                    message: format!("DO_LIST target '${target}' names a constant"),
                    location: location.clone(),
                });
            }
            None => {
                return Err(Error::UnresolvedReference {
                    name: target.to_string(),
                    location: location.clone(),
                });
            }
        };
        let expanded = resolver::resolve_text(&original, env, location)?;
        let elements = resolver::split_list(&expanded);
        debug!(list = target, elements = elements.len(), "list expansion");
        for element in &elements {
            env.set_raw(target, element, location)?;
            report.list_iterations += 1;
            self.dispatch(body, env, phase, report, depth)?;
        }
        env.set_raw(target, &original, location)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    #[instrument(skip_all, fields(callee = %callee, kind = %kind))]
    fn exec_invoke(
        &self,
        kind: RunnableKind,
        callee: &str,
        args: &str,
        location: &ScriptLocation,
        env: &mut Environment,
        phase: Phase,
        report: &mut PhaseReport,
        depth: usize,
    ) -> Result<()> {
        let runnable = self.script.runnable(kind, callee).ok_or_else(|| Error::UnknownCallable {
            kind: kind.noun(),
            name: callee.to_string(),
            location: location.clone(),
        })?;
        let actuals = resolver::split_arguments(args, location)?;
        // The arity check comes first; a mismatched call must fail
        // before any reference is resolved.
        if actuals.len() != runnable.params.len() {
            return Err(Error::InvalidNumberOfArgumentsInCall {
                callee: callee.to_string(),
                declared: runnable.params.len(),
                supplied: actuals.len(),
                location: location.clone(),
            });
        }
        if depth >= self.options.max_call_depth {
            return Err(Error::CallDepthExceeded {
                callee: callee.to_string(),
                depth,
                location: location.clone(),
            });
        }
        debug!(args = actuals.len(), "invoke");

        // A run body owns the global scope: no frame, no parameters.
        if kind == RunnableKind::Run {
            return self.run_body(&runnable.body, env, phase, report, depth + 1);
        }

        let mut bindings = Vec::with_capacity(runnable.params.len());
        for (param, actual) in runnable.params.iter().zip(&actuals) {
            let bound = self.bind_value(&ArgSlot::from(param), actual, env, phase, location)?;
            bindings.push((param, bound));
        }

        let label = format!("{}#{}", runnable.name, env.next_invocation());
        env.push_frame(label);
        for (param, bound) in &bindings {
            env.declare_argument(&param.name, param.kind, &bound.resolved, param.direction, location)?;
        }
        self.run_body(&runnable.body, env, phase, report, depth + 1)?;

        // OUT values resolve in the callee scope while its frame is
        // still on the stack; the text handed back to the caller must
        // not mention variables that die with the frame.
        let mut outputs = Vec::new();
        for (param, bound) in &bindings {
            if param.direction.is_input() {
                continue;
            }
            if let Some(source) = &bound.source
                && let Some(private) = env.find_var(&param.name)
            {
                let value = resolver::resolve_text(private.raw(), env, location)?;
                outputs.push((source.clone(), value));
            }
        }
        env.pop_frame();
        for (source, value) in &outputs {
            env.set_raw(source, value, location)?;
        }
        // Mark every reference actual as virtually created so the rest
        // of the check phase sees the outputs.
        if phase.is_check() {
            for (_, bound) in &bindings {
                if let Some(source) = &bound.source {
                    env.mark_simulate_created(source);
                }
            }
        }
        Ok(())
    }

    fn exec_calc(
        &self,
        name: &str,
        args: &str,
        location: &ScriptLocation,
        env: &mut Environment,
        phase: Phase,
        report: &mut PhaseReport,
    ) -> Result<()> {
        let calc = self.calcs.get(name).ok_or_else(|| Error::UnknownCallable {
            kind: "calculation",
            name: name.to_string(),
            location: location.clone(),
        })?;
        let signature = calc.signature();
        let actuals = resolver::split_arguments(args, location)?;
        if actuals.len() != signature.len() {
            return Err(Error::InvalidNumberOfArgumentsInCall {
                callee: name.to_string(),
                declared: signature.len(),
                supplied: actuals.len(),
                location: location.clone(),
            });
        }

        let mut values = Vec::with_capacity(signature.len());
        let mut sources = Vec::with_capacity(signature.len());
        for (spec, actual) in signature.iter().zip(&actuals) {
            let bound = self.bind_value(&ArgSlot::from(spec), actual, env, phase, location)?;
            values.push(bound.value);
            sources.push(bound.source);
        }
        report.calc_trace.push(CalcInvocation {
            name: name.to_string(),
            args: values.len(),
        });

        match phase {
            Phase::Check => {
                debug!(calculation = name, args = values.len(), "arguments validated");
            }
            Phase::Execute => {
                info!(calculation = name, args = values.len(), "calculation");
                let mut ctx = CalcContext::new(&values, self.probe.as_ref());
                calc.run(&mut ctx).map_err(|source| Error::CalculationFailed {
                    name: name.to_string(),
                    source,
                    location: location.clone(),
                })?;
            }
        }

        if phase.is_check() {
            for source in sources.iter().flatten() {
                env.mark_simulate_created(source);
            }
        }
        Ok(())
    }

    /// Resolve one actual argument and validate it against its slot.
    ///
    /// The source variable of a bare `$Name` actual donates its
    /// simulation flag and, when kinds match, its cached parse.
    fn bind_value(
        &self,
        slot: &ArgSlot<'_>,
        actual: &str,
        env: &mut Environment,
        phase: Phase,
        location: &ScriptLocation,
    ) -> Result<BoundValue> {
        let source = resolver::bare_reference(actual).map(str::to_string);
        if slot.direction == Direction::Out
            && let Some(name) = &source
            && env.is_constant(name)
        {
            return Err(Error::MalformedScript {
                message: format!("output argument '${name}' names a constant"),
                location: location.clone(),
            });
        }
        let resolved = resolver::resolve_text(actual, env, location)?;
        let simulate = source
            .as_deref()
            .and_then(|name| env.find(name))
            .map(|binding| binding.simulate_created())
            .unwrap_or(false);
        let ctx = ValidationCtx {
            phase,
            direction: slot.direction,
            simulate_created: simulate,
            create_output_dirs: self.options.create_output_dirs,
            probe: self.probe.as_ref(),
            location,
        };

        if let Some(name) = source.as_deref()
            && env.find_var(name).is_some_and(|var| var.kind() == slot.kind)
            && let Some(value) = env.cached_value(name).cloned()
        {
            types::validate_value(slot.kind, slot.name, &value, slot.range, &ctx)?;
            return Ok(BoundValue { source, resolved, value });
        }

        let value = types::validate_literal(slot.kind, slot.name, &resolved, slot.range, &ctx)?;
        let cacheable = source
            .as_deref()
            .is_some_and(|name| env.find_var(name).is_some_and(|var| var.kind() == slot.kind));
        if cacheable && let Some(name) = source.as_deref() {
            env.cache_value(name, value.clone());
        }
        Ok(BoundValue { source, resolved, value })
    }
}

/// One declared argument slot, unified over runnable and calculation
/// signatures
struct ArgSlot<'a> {
    name: &'a str,
    kind: TypeKind,
    direction: Direction,
    range: Option<&'a ValueRange>,
}

impl<'a> From<&'a ParamSpec> for ArgSlot<'a> {
    fn from(param: &'a ParamSpec) -> Self {
        ArgSlot {
            name: &param.name,
            kind: param.kind,
            direction: param.direction,
            range: None,
        }
    }
}

impl<'a> From<&'a gridflow_calc::ArgSpec> for ArgSlot<'a> {
    fn from(spec: &'a gridflow_calc::ArgSpec) -> Self {
        ArgSlot {
            name: spec.name,
            kind: spec.kind,
            direction: spec.direction,
            range: spec.range.as_ref(),
        }
    }
}

/// What binding one actual produced
struct BoundValue {
    source: Option<String>,
    resolved: String,
    value: Value,
}

fn verify_parity(check: &PhaseReport, execute: &PhaseReport) -> Result<()> {
    let len = check.calc_trace.len().max(execute.calc_trace.len());
    for position in 0..len {
        let checked = check.calc_trace.get(position);
        let executed = execute.calc_trace.get(position);
        if checked != executed {
            return Err(Error::PhaseDivergence {
                position,
                check: checked.map_or_else(|| "none".to_string(), CalcInvocation::to_string),
                execute: executed.map_or_else(|| "none".to_string(), CalcInvocation::to_string),
            });
        }
    }
    Ok(())
}
