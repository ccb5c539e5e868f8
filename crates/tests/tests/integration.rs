//! Integration tests for end-to-end GridFlow execution.
//!
//! These tests verify the full pipeline:
//! Load script → Check → Execute → Verify

use std::sync::Arc;

use gridflow_calc::{ArgSpec, CalcRegistry};
use gridflow_engine::types::TypeRegistry;
use gridflow_engine::{Engine, Error, Script};
use gridflow_foundation::{Extent, FsProbe, TypeKind, Value};
use gridflow_tests::{CallLog, FailingCalc, RecordingCalc, TestHarness};

/// Harness with one recording calculation on top of the builtins.
fn recording_harness(
    source: &str,
    name: &'static str,
    signature: Vec<ArgSpec>,
) -> (TestHarness, CallLog) {
    let (calc, calls) = RecordingCalc::new(name, signature);
    let mut calcs = CalcRegistry::with_builtins();
    calcs.register(calc).expect("register calculation");
    (TestHarness::with_calcs(source, calcs), calls)
}

/// Test that a launch checks the whole pipeline first and only then
/// performs the work.
///
/// The recording calculation must have executed exactly once per call
/// even though both phases dispatched it, and both phases must agree
/// on the calculation trace.
#[test]
fn test_launch_checks_before_executing() {
    let source = r"
        BEGIN_RUN
            FLOAT Rate = 0.25
            RUN_CALCULATION Deposit($Rate)
            RUN_CALCULATION Deposit(0.75)
        END_RUN
    ";
    let (harness, calls) =
        recording_harness(source, "Deposit", vec![ArgSpec::input("Rate", TypeKind::Float)]);

    let report = harness.launch().expect("launch failed");
    assert_eq!(report.check.calc_trace, report.execute.calc_trace);
    assert_eq!(report.execute.calc_trace.len(), 2);

    let calls = calls.lock().expect("log");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], vec![Value::Float(0.25)]);
    assert_eq!(calls[1], vec![Value::Float(0.75)]);
}

/// Test that a check failure anywhere stops the launch before any
/// calculation executes.
#[test]
fn test_check_failure_prevents_all_work() {
    let source = r"
        BEGIN_RUN
            RUN_CALCULATION Deposit(0.5)
            RUN_CALCULATION Deposit(0.5, 0.5)
        END_RUN
    ";
    let (harness, calls) =
        recording_harness(source, "Deposit", vec![ArgSpec::input("Rate", TypeKind::Float)]);

    let err = harness.launch().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidNumberOfArgumentsInCall { declared: 1, supplied: 2, .. }
    ));
    // The first call validated fine during check, but nothing ran.
    assert!(calls.lock().expect("log").is_empty());
    assert!(harness.created_directories().is_empty());
}

/// Test that an arity mismatch is reported even when the supplied
/// arguments could never resolve.
#[test]
fn test_arity_checked_before_references_resolve() {
    let source = r"
        BEGIN_RUN
            RUN_CALCULATION Deposit($Missing, $AlsoMissing)
        END_RUN
    ";
    let (harness, _calls) =
        recording_harness(source, "Deposit", vec![ArgSpec::input("Rate", TypeKind::Float)]);

    let err = harness.check().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidNumberOfArgumentsInCall { declared: 1, supplied: 2, .. }
    ));
}

/// Test that scenario parameters shadow globals of the same name and
/// vanish when the scenario returns.
#[test]
fn test_scenario_parameters_shadow_globals() {
    let source = r"
        BEGIN_RUN
            Year = 2000
            RUN_SCENARIO Snapshot(2026)
            RUN_CALCULATION Probe($Year)
        END_RUN
        BEGIN_SCENARIO Snapshot(INTEGER Year)
            RUN_CALCULATION Probe($Year)
        END_SCENARIO
    ";
    let (harness, calls) =
        recording_harness(source, "Probe", vec![ArgSpec::input("Value", TypeKind::Integer)]);

    harness.launch().expect("launch failed");
    let calls = calls.lock().expect("log");
    // Inside the scenario the parameter wins; outside the global is back.
    assert_eq!(calls[0], vec![Value::Integer(2026)]);
    assert_eq!(calls[1], vec![Value::Integer(2000)]);
}

/// Test that DO_LIST runs its command once per element and restores
/// the loop variable afterwards.
#[test]
fn test_list_fans_out_per_element() {
    let source = r"
        BEGIN_RUN
            Years = 2000|2010|2020
            DO_LIST $Years
                RUN_CALCULATION Probe($Years)
            END_LIST
            RUN_CALCULATION Probe($Years)
        END_RUN
    ";
    let (harness, calls) =
        recording_harness(source, "Probe", vec![ArgSpec::input("Value", TypeKind::Str)]);

    let report = harness.launch().expect("launch failed");
    assert_eq!(report.execute.list_iterations, 3);

    let calls = calls.lock().expect("log");
    assert_eq!(calls.len(), 4);
    assert_eq!(calls[0], vec![Value::Str("2000".into())]);
    assert_eq!(calls[1], vec![Value::Str("2010".into())]);
    assert_eq!(calls[2], vec![Value::Str("2020".into())]);
    // After the loop the variable holds its original list text again.
    assert_eq!(calls[3], vec![Value::Str("2000|2010|2020".into())]);
}

/// Test that a list over an empty text runs zero iterations.
#[test]
fn test_empty_list_runs_nothing() {
    let source = r"
        BEGIN_RUN
            Years =
            DO_LIST $Years
                RUN_CALCULATION Probe($Years)
            END_LIST
        END_RUN
    ";
    let (harness, calls) =
        recording_harness(source, "Probe", vec![ArgSpec::input("Value", TypeKind::Str)]);

    let report = harness.launch().expect("launch failed");
    assert_eq!(report.execute.list_iterations, 0);
    assert!(calls.lock().expect("log").is_empty());
}

/// Test that an output promised by an earlier calculation satisfies a
/// later input during check, without touching storage.
#[test]
fn test_check_accepts_outputs_promised_upstream() {
    let source = r"
        BEGIN_RUN
            Work = /work
            Result = $Work/out.tif
            RUN_CALCULATION Produce($Result)
            RUN_CALCULATION Consume($Result)
        END_RUN
    ";
    let (produce, _produce_calls) =
        RecordingCalc::new("Produce", vec![ArgSpec::output("Target", TypeKind::Raster)]);
    let (consume, _consume_calls) =
        RecordingCalc::new("Consume", vec![ArgSpec::input("Source", TypeKind::Raster)]);
    let mut calcs = CalcRegistry::with_builtins();
    calcs.register(produce).expect("register");
    calcs.register(consume).expect("register");
    let harness = TestHarness::with_calcs(source, calcs);
    harness.add_directory("/work");

    let report = harness.check().expect("check failed");
    assert_eq!(report.calc_trace.len(), 2);
    assert!(harness.created_directories().is_empty());
}

/// Test that the execute phase still demands the real file even though
/// check accepted the promise.
#[test]
fn test_execute_demands_promised_outputs_exist() {
    let source = r"
        BEGIN_RUN
            Result = /work/out.tif
            RUN_CALCULATION Produce($Result)
            RUN_CALCULATION Consume($Result)
        END_RUN
    ";
    let (produce, _produce_calls) =
        RecordingCalc::new("Produce", vec![ArgSpec::output("Target", TypeKind::Raster)]);
    let (consume, _consume_calls) =
        RecordingCalc::new("Consume", vec![ArgSpec::input("Source", TypeKind::Raster)]);
    let mut calcs = CalcRegistry::with_builtins();
    calcs.register(produce).expect("register");
    calcs.register(consume).expect("register");
    let harness = TestHarness::with_calcs(source, calcs);
    harness.add_directory("/work");

    // Produce records the call but writes nothing, so Consume starves.
    let err = harness.launch().unwrap_err();
    assert!(matches!(err, Error::MissingResource { kind: "RASTER", .. }));
}

/// Test that a missing input fails the check outright.
#[test]
fn test_missing_input_fails_check() {
    let source = r"
        BEGIN_RUN
            RUN_CALCULATION Consume(/work/nowhere.tif)
        END_RUN
    ";
    let (consume, _calls) =
        RecordingCalc::new("Consume", vec![ArgSpec::input("Source", TypeKind::Raster)]);
    let mut calcs = CalcRegistry::with_builtins();
    calcs.register(consume).expect("register");
    let harness = TestHarness::with_calcs(source, calcs);

    let err = harness.check().unwrap_err();
    assert!(matches!(err, Error::MissingResource { kind: "RASTER", .. }));
}

/// Test that module scopes isolate private variables from the caller
/// and from later invocations.
#[test]
fn test_module_scope_is_invisible_to_caller() {
    let source = r"
        BEGIN_RUN
            RUN_MODULE Step(1)
            PRINT $Temp
        END_RUN
        BEGIN_MODULE Step(INTEGER N)
            Temp = value_$N
        END_MODULE
    ";
    let harness = TestHarness::from_source(source);
    let err = harness.check().unwrap_err();
    assert!(matches!(
        err,
        Error::UnresolvedReference { name, .. } if name == "Temp"
    ));
}

/// Test that repeated invocations each get a fresh scope.
#[test]
fn test_each_invocation_gets_fresh_scope() {
    let source = r"
        BEGIN_RUN
            RUN_MODULE Step(1)
            RUN_MODULE Step(2)
        END_RUN
        BEGIN_MODULE Step(INTEGER N)
            Temp = value_$N
            RUN_CALCULATION Probe($Temp)
        END_MODULE
    ";
    let (harness, calls) =
        recording_harness(source, "Probe", vec![ArgSpec::input("Value", TypeKind::Str)]);

    harness.launch().expect("launch failed");
    let calls = calls.lock().expect("log");
    assert_eq!(calls[0], vec![Value::Str("value_1".into())]);
    assert_eq!(calls[1], vec![Value::Str("value_2".into())]);
}

/// Test that an OUT parameter writes its final text back into the
/// caller's variable.
#[test]
fn test_out_parameter_copies_back() {
    let source = r"
        BEGIN_RUN
            Result = initial
            RUN_MODULE Produce($Result)
            RUN_CALCULATION Probe($Result)
        END_RUN
        BEGIN_MODULE Produce(OUT STRING Target)
            Target = computed
        END_MODULE
    ";
    let (harness, calls) =
        recording_harness(source, "Probe", vec![ArgSpec::input("Value", TypeKind::Str)]);

    harness.launch().expect("launch failed");
    let calls = calls.lock().expect("log");
    assert_eq!(calls[0], vec![Value::Str("computed".into())]);
}

/// Test that an OUT value computed from a module-private variable is
/// resolved before the module's scope is destroyed.
#[test]
fn test_out_value_resolves_before_scope_closes() {
    let source = r"
        BEGIN_RUN
            Result = initial
            RUN_MODULE Produce($Result)
            RUN_CALCULATION Probe($Result)
        END_RUN
        BEGIN_MODULE Produce(OUT STRING Target)
            Stem = computed
            Target = $Stem/out.txt
        END_MODULE
    ";
    let (harness, calls) =
        recording_harness(source, "Probe", vec![ArgSpec::input("Value", TypeKind::Str)]);

    // $Stem is gone by the time the caller consumes $Result; the
    // copied-back value has to stand on its own.
    harness.launch().expect("launch failed");
    let calls = calls.lock().expect("log");
    assert_eq!(calls[0], vec![Value::Str("computed/out.txt".into())]);
}

/// Test that the copied-back value keeps the module's binding even
/// when the caller owns a variable of the same name.
#[test]
fn test_out_value_ignores_caller_variable_of_same_name() {
    let source = r"
        BEGIN_RUN
            Stem = /caller
            Result = initial
            RUN_MODULE Produce($Result)
            RUN_CALCULATION Probe($Result)
        END_RUN
        BEGIN_MODULE Produce(OUT STRING Target)
            STRING Stem = computed
            Target = $Stem/out.txt
        END_MODULE
    ";
    let (harness, calls) =
        recording_harness(source, "Probe", vec![ArgSpec::input("Value", TypeKind::Str)]);

    harness.launch().expect("launch failed");
    let calls = calls.lock().expect("log");
    assert_eq!(calls[0], vec![Value::Str("computed/out.txt".into())]);
}

/// Test that a module's OUT argument marks the caller's variable as
/// promised, satisfying a later input check without any storage.
#[test]
fn test_module_out_marks_output_as_promised() {
    let source = r"
        BEGIN_RUN
            Result = /work/built.tif
            RUN_MODULE Build($Result)
            RUN_CALCULATION Consume($Result)
        END_RUN
        BEGIN_MODULE Build(OUT RASTER Target)
            PRINT building $Target
        END_MODULE
    ";
    let (consume, _calls) =
        RecordingCalc::new("Consume", vec![ArgSpec::input("Source", TypeKind::Raster)]);
    let mut calcs = CalcRegistry::with_builtins();
    calcs.register(consume).expect("register");
    let harness = TestHarness::with_calcs(source, calcs);
    harness.add_directory("/work");

    let report = harness.check().expect("check failed");
    assert_eq!(report.calc_trace.len(), 1);
    assert!(harness.created_directories().is_empty());
}

/// Test that references chain through intermediate variables across
/// callable boundaries.
#[test]
fn test_references_chain_through_scopes() {
    let source = r"
        BEGIN_RUN
            Root = /data
            RUN_SCENARIO Baseline(2030, $Root)
        END_RUN
        BEGIN_SCENARIO Baseline(INTEGER Year, STRING Work)
            Out = $Work/msa_$Year.tif
            RUN_MODULE Record($Out)
        END_SCENARIO
        BEGIN_MODULE Record(STRING Item)
            RUN_CALCULATION Probe($Item)
        END_MODULE
    ";
    let (harness, calls) =
        recording_harness(source, "Probe", vec![ArgSpec::input("Value", TypeKind::Str)]);

    harness.launch().expect("launch failed");
    let calls = calls.lock().expect("log");
    assert_eq!(calls[0], vec![Value::Str("/data/msa_2030.tif".into())]);
}

/// Test that a constant reference binds as a single argument even
/// though its text contains commas.
#[test]
fn test_constant_extent_binds_as_one_argument() {
    let source = r"
        BEGIN_RUN
            RUN_CALCULATION Window($EXTENT_WORLD)
        END_RUN
    ";
    let (harness, calls) =
        recording_harness(source, "Window", vec![ArgSpec::input("Area", TypeKind::Extent)]);

    harness.launch().expect("launch failed");
    let calls = calls.lock().expect("log");
    assert_eq!(calls[0], vec![Value::Extent(Extent::WORLD)]);
}

/// Test that constants cannot be assigned over.
#[test]
fn test_constants_are_write_protected() {
    let source = r"
        BEGIN_RUN
            EXTENT_WORLD = 1,2,3,4
        END_RUN
    ";
    let harness = TestHarness::from_source(source);
    let err = harness.check().unwrap_err();
    assert!(matches!(
        err,
        Error::DuplicateName { name, .. } if name == "EXTENT_WORLD"
    ));
}

/// Test that a declared range rejects out-of-range values by name.
#[test]
fn test_range_violation_reported() {
    let source = r"
        BEGIN_RUN
            RUN_CALCULATION Deposit(1.5)
        END_RUN
    ";
    let (harness, _calls) = recording_harness(
        source,
        "Deposit",
        vec![ArgSpec::ranged("Fraction", TypeKind::Float, 0.0, 1.0)],
    );

    let err = harness.check().unwrap_err();
    assert!(matches!(
        err,
        Error::RangeViolation { name, value, .. } if name == "Fraction" && value == 1.5
    ));
}

/// Test that a bad typed declaration fails at its own line during
/// check.
#[test]
fn test_bad_literal_fails_where_declared() {
    let source = r"
        BEGIN_RUN
            INTEGER Year = twenty
        END_RUN
    ";
    let harness = TestHarness::from_source(source);
    let err = harness.check().unwrap_err();
    assert!(matches!(err, Error::TypeParseFailure { .. }));
    assert_eq!(err.location().expect("location").line, 3);
}

/// Test that a calculation failure during execute names the
/// calculation and its line.
#[test]
fn test_calculation_failure_surfaces() {
    let source = r"
        BEGIN_RUN
            RUN_CALCULATION Broken()
        END_RUN
    ";
    let mut calcs = CalcRegistry::with_builtins();
    calcs.register(FailingCalc::new("Broken")).expect("register");
    let harness = TestHarness::with_calcs(source, calcs);

    // The empty signature validates; only the execute phase can fail.
    harness.check().expect("check failed");
    let err = harness.launch().unwrap_err();
    assert!(matches!(
        err,
        Error::CalculationFailed { name, .. } if name == "Broken"
    ));
}

/// Test that run invocations accept no arguments.
#[test]
fn test_run_invocation_takes_no_arguments() {
    let source = r"
        BEGIN_RUN Main
            RUN Extra(oops)
        END_RUN
        BEGIN_RUN Extra
            PRINT extra
        END_RUN
    ";
    let harness = TestHarness::from_source(source);
    let err = harness.check().unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidNumberOfArgumentsInCall { declared: 0, supplied: 1, .. }
    ));
}

/// Test that empty slots in a raster list are skipped while filled
/// slots are validated.
#[test]
fn test_raster_list_validates_filled_slots_only() {
    let source = r"
        BEGIN_RUN
            RUN_CALCULATION Merge(/maps/a.tif||/maps/c.tif)
        END_RUN
    ";
    let (merge, _calls) =
        RecordingCalc::new("Merge", vec![ArgSpec::input("Layers", TypeKind::RasterList)]);
    let mut calcs = CalcRegistry::with_builtins();
    calcs.register(merge).expect("register");
    let harness = TestHarness::with_calcs(source, calcs);
    harness.add_file("/maps/a.tif");

    // c.tif is missing; the empty middle slot is not the problem.
    let err = harness.check().unwrap_err();
    assert!(matches!(
        err,
        Error::MissingResource { kind: "RASTERLIST", ref path, .. }
            if path.ends_with("c.tif")
    ));

    harness.add_file("/maps/c.tif");
    harness.check().expect("check failed");
}

/// Test a pipeline against the real filesystem: the output directory
/// is created on demand and the file lands on disk.
#[test]
fn test_touch_file_pipeline_on_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let target = dir.path().join("out").join("touched.txt");
    let source = format!(
        r"
        BEGIN_RUN
            FILE Target = {}
            RUN_CALCULATION TouchFile($Target)
        END_RUN
        ",
        target.display()
    );

    let types = TypeRegistry::with_builtins();
    let script = Script::parse("fs.gfs", &source, &types).expect("script load failed");
    let engine = Engine::new(script, CalcRegistry::with_builtins(), Arc::new(FsProbe))
        .expect("engine construction failed");

    engine.launch().expect("launch failed");
    assert!(target.is_file());
}
