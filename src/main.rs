//! Tubesim - Transient Circuit Simulator
//!
//! Runs a circuit over raw mono audio.
//!
//! # Usage
//!
//! ```bash
//! ffmpeg -i input.wav -f f32le -ac 1 -ar 48000 - | tubesim circuit.tsim --param drive=0.8 | ffmpeg -f f32le -ac 1 -ar 48000 -i - output.wav
//! ```

use std::path::PathBuf;

use clap::Parser;
use log::{info, LevelFilter};
use tubesim_core::{
    audio::process_audio,
    circuit::{validate_circuit, Circuit},
    dsl,
    error::Result,
    solver::{DEFAULT_ITERATIONS, DEFAULT_OVERSAMPLE},
    Simulation, SimulatorConfig, DEFAULT_SAMPLE_RATE,
};

/// Transient circuit simulator for audio
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the circuit description file
    #[arg(value_name = "CIRCUIT_FILE")]
    circuit_file: PathBuf,

    /// Sample rate in Hz
    #[arg(short, long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: f64,

    /// Internal steps per output sample
    #[arg(short, long, default_value_t = DEFAULT_OVERSAMPLE)]
    oversample: usize,

    /// Newton iteration budget per internal step
    #[arg(short, long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,

    /// Parameter override, as name=value (repeatable)
    #[arg(short, long = "param", value_name = "NAME=VALUE", value_parser = parse_param)]
    params: Vec<(String, f64)>,

    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_param(text: &str) -> std::result::Result<(String, f64), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", text))?;
    let value = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid value for '{}': {}", name, value))?;
    Ok((name.trim().to_string(), value))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    // Parse the circuit file
    let ast = dsl::parse_file(&args.circuit_file)?;

    // Build the circuit
    let circuit = Circuit::from_ast(ast)?;

    // Validate
    validate_circuit(&circuit)?;

    // Create simulation
    let config = SimulatorConfig::new()
        .with_sample_rate(args.sample_rate)
        .with_oversample(args.oversample)
        .with_iterations(args.iterations);
    let mut simulation = Simulation::from_circuit(&circuit, config)?;
    for (name, value) in &args.params {
        simulation.set_parameter(name, *value)?;
    }
    info!("processing {}", args.circuit_file.display());

    // Process audio
    process_audio(&mut simulation)?;

    Ok(())
}
