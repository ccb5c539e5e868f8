//! GridFlow Run - launches a pipeline script
//!
//! This binary loads a script, checks the whole pipeline without doing
//! any work, and only then executes it. A check failure leaves storage
//! untouched.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gridflow_calc::CalcRegistry;
use gridflow_engine::constants::ConstantRegistry;
use gridflow_engine::types::TypeRegistry;
use gridflow_engine::{Engine, EngineOptions, Script};
use gridflow_foundation::FsProbe;

#[derive(Parser, Debug)]
#[command(name = "gridflow")]
#[command(about = "Check and execute a GridFlow pipeline script")]
struct Cli {
    /// Path to a pipeline script
    script: Option<PathBuf>,

    /// Run block to launch (defaults to the first run in the script)
    #[arg(long)]
    run: Option<String>,

    /// Validate the whole pipeline without executing it
    #[arg(long)]
    check_only: bool,

    /// Do not create missing output directories
    #[arg(long)]
    no_create_dirs: bool,

    /// Seed a global variable before the run, repeatable
    #[arg(long = "define", value_name = "NAME=VALUE")]
    defines: Vec<String>,

    /// List registered calculations and exit
    #[arg(long)]
    list_calculations: bool,

    /// List built-in constants and exit
    #[arg(long)]
    list_constants: bool,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gridflow=info,pipeline=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.list_calculations {
        for calc in CalcRegistry::with_builtins().iter() {
            println!("{}", calc.name());
            println!("    {}", calc.summary());
            for spec in calc.signature() {
                println!("    {spec}");
            }
        }
        return;
    }

    if cli.list_constants {
        for constant in ConstantRegistry::with_defaults().iter() {
            println!(
                "{} {} = {}",
                constant.kind().keyword(),
                constant.name(),
                constant.raw()
            );
            println!("    {}", constant.description());
        }
        return;
    }

    let Some(path) = cli.script else {
        eprintln!("Usage: gridflow <script> [--run NAME] [--check-only]");
        process::exit(2);
    };

    info!("Loading pipeline from: {}", path.display());

    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            process::exit(1);
        }
    };
    let source = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("script");

    let types = TypeRegistry::with_builtins();
    let script = match Script::parse(source, &text, &types) {
        Ok(script) => script,
        Err(e) => {
            error!("Failed to load script: {}", e);
            process::exit(1);
        }
    };

    let engine = match Engine::new(script, CalcRegistry::with_builtins(), Arc::new(FsProbe)) {
        Ok(engine) => engine,
        Err(e) => {
            error!("Failed to build engine: {}", e);
            process::exit(1);
        }
    };

    let options = EngineOptions {
        create_output_dirs: !cli.no_create_dirs,
        ..EngineOptions::default()
    };
    let mut engine = engine.with_options(options);
    if let Some(name) = cli.run {
        engine = engine.with_entry(name);
    }
    for define in &cli.defines {
        let Some((name, value)) = define.split_once('=') else {
            eprintln!("--define expects NAME=VALUE, got '{define}'");
            process::exit(2);
        };
        engine = engine.define(name.trim(), value.trim());
    }

    if cli.check_only {
        match engine.check() {
            Ok(report) => {
                info!(
                    commands = report.commands,
                    calculations = report.calc_trace.len(),
                    "check passed"
                );
            }
            Err(e) => {
                error!("Check failed: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    match engine.launch() {
        Ok(report) => {
            info!(
                commands = report.execute.commands,
                calculations = report.execute.calc_trace.len(),
                lists = report.execute.list_iterations,
                "pipeline complete"
            );
        }
        Err(e) => {
            error!("Launch failed: {}", e);
            process::exit(1);
        }
    }
}
