//! Variables and scope frames
//!
//! A variable stores raw text; parsing into a typed value is deferred
//! until something consumes it. That laziness is load-bearing: a raw
//! value may reference outputs that only exist once an earlier command
//! has (virtually) run.
//!
//! Scopes are a frame stack. Lookup sees the innermost frame, then the
//! global frame, then the constants; intermediate caller frames stay
//! invisible, which is what keeps invocations isolated.

use std::sync::Arc;

use indexmap::IndexMap;

use gridflow_foundation::{Direction, ScriptLocation, TypeKind, Value};

use crate::constants::{Constant, ConstantRegistry};
use crate::error::{Error, Result};

/// Label of the root frame
pub const GLOBAL_SCOPE: &str = "Global";

/// Parse state of a variable's raw text
#[derive(Debug, Clone, PartialEq)]
pub enum ValueState {
    /// Only the raw text is known
    Unparsed,
    /// Parsed value, valid while the environment generation matches
    Parsed { value: Value, generation: u64 },
}

/// A named, typed slot holding raw text and an optional parsed value
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    scope: String,
    kind: TypeKind,
    raw: String,
    state: ValueState,
    direction: Option<Direction>,
    simulate_created: bool,
    declared_at: ScriptLocation,
}

impl Variable {
    fn new(
        name: &str,
        scope: String,
        kind: TypeKind,
        raw: &str,
        direction: Option<Direction>,
        declared_at: ScriptLocation,
    ) -> Self {
        Variable {
            name: name.to_string(),
            scope,
            kind,
            raw: raw.to_string(),
            state: ValueState::Unparsed,
            direction,
            simulate_created: false,
            declared_at,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// `Scope.Name`, for diagnostics
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.scope, self.name)
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Direction when this variable is a bound argument
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn is_argument(&self) -> bool {
        self.direction.is_some()
    }

    pub fn declared_at(&self) -> &ScriptLocation {
        &self.declared_at
    }

    /// The check phase decided this variable's resource will exist.
    pub fn simulate_created(&self) -> bool {
        self.simulate_created
    }

    pub fn mark_simulate_created(&mut self) {
        self.simulate_created = true;
    }

    /// Overwrite the raw text, dropping any parsed value.
    pub fn set_raw(&mut self, raw: &str) {
        self.raw = raw.to_string();
        self.state = ValueState::Unparsed;
    }

    /// Parsed value if still valid for `generation`
    pub fn cached(&self, generation: u64) -> Option<&Value> {
        match &self.state {
            ValueState::Parsed { value, generation: stamped } if *stamped == generation => {
                Some(value)
            }
            _ => None,
        }
    }

    pub fn cache(&mut self, value: Value, generation: u64) {
        self.state = ValueState::Parsed { value, generation };
    }
}

/// One scope's variables, in declaration order
#[derive(Debug, Clone)]
pub struct Frame {
    label: String,
    vars: IndexMap<String, Variable>,
}

impl Frame {
    fn new(label: impl Into<String>) -> Self {
        Frame {
            label: label.into(),
            vars: IndexMap::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.vars.get(name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.vars.get_mut(name)
    }

    fn insert(&mut self, variable: Variable) {
        self.vars.insert(variable.name.clone(), variable);
    }
}

/// What a `$Name` lookup found
#[derive(Debug)]
pub enum Binding<'a> {
    Variable(&'a Variable),
    Constant(&'a Constant),
}

impl<'a> Binding<'a> {
    /// Text substituted for the reference
    pub fn raw(&self) -> &'a str {
        match self {
            Binding::Variable(var) => var.raw(),
            Binding::Constant(constant) => constant.raw(),
        }
    }

    pub fn simulate_created(&self) -> bool {
        match self {
            Binding::Variable(var) => var.simulate_created(),
            Binding::Constant(_) => false,
        }
    }
}

/// Scope stack plus the constants it falls back to
pub struct Environment {
    frames: Vec<Frame>,
    constants: Arc<ConstantRegistry>,
    generation: u64,
    invocations: u64,
}

impl Environment {
    pub fn new(constants: Arc<ConstantRegistry>) -> Self {
        Environment {
            frames: vec![Frame::new(GLOBAL_SCOPE)],
            constants,
            generation: 0,
            invocations: 0,
        }
    }

    /// Label of the innermost scope
    pub fn scope_label(&self) -> &str {
        self.top().label()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Monotonic counter bumped on every variable write
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Next invocation ordinal, for unique frame labels
    pub fn next_invocation(&mut self) -> u64 {
        self.invocations += 1;
        self.invocations
    }

    pub fn push_frame(&mut self, label: impl Into<String>) {
        self.frames.push(Frame::new(label));
    }

    pub fn pop_frame(&mut self) -> Frame {
        debug_assert!(self.frames.len() > 1, "global frame is never popped");
        if self.frames.len() > 1 {
            self.frames.pop().unwrap_or_else(|| Frame::new(GLOBAL_SCOPE))
        } else {
            Frame::new(GLOBAL_SCOPE)
        }
    }

    /// Resolve a name: innermost frame, then global frame, then constants.
    pub fn find(&self, name: &str) -> Option<Binding<'_>> {
        if let Some(var) = self.find_var(name) {
            return Some(Binding::Variable(var));
        }
        self.constants.get(name).map(Binding::Constant)
    }

    /// Like [`Environment::find`] but variables only
    pub fn find_var(&self, name: &str) -> Option<&Variable> {
        if let Some(var) = self.top().get(name) {
            return Some(var);
        }
        if self.frames.len() > 1 {
            return self.frames[0].get(name);
        }
        None
    }

    pub fn is_constant(&self, name: &str) -> bool {
        self.constants.contains(name)
    }

    /// Untyped assignment: update the visible variable of this name, or
    /// declare a new string variable in the innermost scope.
    pub fn assign(&mut self, name: &str, raw: &str, location: &ScriptLocation) -> Result<()> {
        self.guard_constant(name, location)?;
        self.generation += 1;
        if let Some(var) = self.find_var_mut(name) {
            var.set_raw(raw);
            return Ok(());
        }
        let scope = self.scope_label().to_string();
        self.top_mut().insert(Variable::new(
            name,
            scope,
            TypeKind::Str,
            raw,
            None,
            location.clone(),
        ));
        Ok(())
    }

    /// Typed declaration in the innermost scope. Shadowing an outer
    /// name is allowed; redeclaring within the same scope is not.
    pub fn declare(
        &mut self,
        name: &str,
        kind: TypeKind,
        raw: &str,
        location: &ScriptLocation,
    ) -> Result<()> {
        self.guard_constant(name, location)?;
        if self.top().get(name).is_some() {
            return Err(Error::DuplicateName {
                name: name.to_string(),
                location: location.clone(),
            });
        }
        self.generation += 1;
        let scope = self.scope_label().to_string();
        self.top_mut()
            .insert(Variable::new(name, scope, kind, raw, None, location.clone()));
        Ok(())
    }

    /// Declare a bound argument in the innermost scope.
    pub fn declare_argument(
        &mut self,
        name: &str,
        kind: TypeKind,
        raw: &str,
        direction: Direction,
        location: &ScriptLocation,
    ) -> Result<()> {
        self.guard_constant(name, location)?;
        if self.top().get(name).is_some() {
            return Err(Error::DuplicateName {
                name: name.to_string(),
                location: location.clone(),
            });
        }
        self.generation += 1;
        let scope = self.scope_label().to_string();
        self.top_mut().insert(Variable::new(
            name,
            scope,
            kind,
            raw,
            Some(direction),
            location.clone(),
        ));
        Ok(())
    }

    /// Overwrite an existing visible variable's raw text.
    pub fn set_raw(&mut self, name: &str, raw: &str, location: &ScriptLocation) -> Result<()> {
        self.generation += 1;
        match self.find_var_mut(name) {
            Some(var) => {
                var.set_raw(raw);
                Ok(())
            }
            None => Err(Error::UnresolvedReference {
                name: name.to_string(),
                location: location.clone(),
            }),
        }
    }

    /// Flag a visible variable as virtually created; missing names are
    /// ignored because literal actuals have no source variable.
    pub fn mark_simulate_created(&mut self, name: &str) {
        if let Some(var) = self.find_var_mut(name) {
            var.mark_simulate_created();
        }
    }

    /// Cached parsed value of a visible variable, current generation only
    pub fn cached_value(&self, name: &str) -> Option<&Value> {
        let generation = self.generation;
        self.find_var(name).and_then(|var| var.cached(generation))
    }

    pub fn cache_value(&mut self, name: &str, value: Value) {
        let generation = self.generation;
        if let Some(var) = self.find_var_mut(name) {
            var.cache(value, generation);
        }
    }

    fn guard_constant(&self, name: &str, location: &ScriptLocation) -> Result<()> {
        if self.is_constant(name) {
            return Err(Error::DuplicateName {
                name: name.to_string(),
                location: location.clone(),
            });
        }
        Ok(())
    }

    fn top(&self) -> &Frame {
        // frames always holds at least the global frame
        &self.frames[self.frames.len() - 1]
    }

    fn top_mut(&mut self) -> &mut Frame {
        let top = self.frames.len() - 1;
        &mut self.frames[top]
    }

    fn find_var_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let top = self.frames.len() - 1;
        if self.frames[top].get(name).is_some() {
            return self.frames[top].get_mut(name);
        }
        if top > 0 && self.frames[0].get(name).is_some() {
            return self.frames[0].get_mut(name);
        }
        None
    }
}
