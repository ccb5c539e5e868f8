//! Integration test harness for GridFlow.
//!
//! This crate provides utilities for end-to-end testing of the full
//! pipeline: Load script → Check → Execute → Verify.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use gridflow_calc::{ArgSpec, CalcContext, CalcError, CalcRegistry, Calculation};
use gridflow_engine::types::TypeRegistry;
use gridflow_engine::{Engine, EngineOptions, Error, LaunchReport, PhaseReport, Script};
use gridflow_foundation::{MemoryProbe, Value};

/// Test harness for running pipelines from script source against an
/// in-memory storage probe.
pub struct TestHarness {
    engine: Engine,
    probe: Arc<MemoryProbe>,
}

impl TestHarness {
    /// Create a harness over the built-in calculations.
    ///
    /// # Panics
    ///
    /// Panics if the script fails to load or the engine rejects it.
    pub fn from_source(source: &str) -> Self {
        Self::with_calcs(source, CalcRegistry::with_builtins())
    }

    /// Create a harness with a caller-assembled calculation registry.
    ///
    /// # Panics
    ///
    /// Panics if the script fails to load or the engine rejects it.
    pub fn with_calcs(source: &str, calcs: CalcRegistry) -> Self {
        let types = TypeRegistry::with_builtins();
        let script = Script::parse("test.gfs", source, &types).expect("script load failed");
        let probe = Arc::new(MemoryProbe::new());
        let engine = Engine::new(script, calcs, probe.clone()).expect("engine construction failed");
        Self { engine, probe }
    }

    /// Select the run block to launch.
    pub fn with_entry(mut self, name: &str) -> Self {
        self.engine = self.engine.with_entry(name);
        self
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.engine = self.engine.with_options(options);
        self
    }

    /// Seed a global variable before either phase starts.
    pub fn define(mut self, name: &str, value: &str) -> Self {
        self.engine = self.engine.define(name, value);
        self
    }

    /// Register a path as an existing file, ancestors included.
    pub fn add_file(&self, path: &str) {
        self.probe.add_file(path);
    }

    /// Register a path as an existing directory, ancestors included.
    pub fn add_directory(&self, path: &str) {
        self.probe.add_directory(path);
    }

    pub fn check(&self) -> Result<PhaseReport, Error> {
        self.engine.check()
    }

    pub fn execute(&self) -> Result<PhaseReport, Error> {
        self.engine.execute()
    }

    pub fn launch(&self) -> Result<LaunchReport, Error> {
        self.engine.launch()
    }

    /// Directories the engine created through the probe.
    pub fn created_directories(&self) -> Vec<PathBuf> {
        self.probe.creations()
    }
}

/// Shared log of every execution a [`RecordingCalc`] performed.
pub type CallLog = Arc<Mutex<Vec<Vec<Value>>>>;

/// Calculation double that records its bound argument values on every
/// run and otherwise does nothing.
pub struct RecordingCalc {
    name: &'static str,
    signature: Vec<ArgSpec>,
    calls: CallLog,
}

impl RecordingCalc {
    pub fn new(name: &'static str, signature: Vec<ArgSpec>) -> (Arc<Self>, CallLog) {
        let calls = CallLog::default();
        let calc = Arc::new(RecordingCalc {
            name,
            signature,
            calls: calls.clone(),
        });
        (calc, calls)
    }
}

impl Calculation for RecordingCalc {
    fn name(&self) -> &str {
        self.name
    }

    fn summary(&self) -> &str {
        "records every execution"
    }

    fn signature(&self) -> &[ArgSpec] {
        &self.signature
    }

    fn run(&self, ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(ctx.args().to_vec());
        Ok(())
    }
}

/// Calculation double that validates fine but refuses to execute.
pub struct FailingCalc {
    name: &'static str,
}

impl FailingCalc {
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(FailingCalc { name })
    }
}

impl Calculation for FailingCalc {
    fn name(&self) -> &str {
        self.name
    }

    fn summary(&self) -> &str {
        "fails on execution"
    }

    fn signature(&self) -> &[ArgSpec] {
        &[]
    }

    fn run(&self, _ctx: &mut CalcContext<'_>) -> Result<(), CalcError> {
        Err(CalcError::Failed("refused".into()))
    }
}
