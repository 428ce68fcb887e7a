//! Properties of the transient pipeline, end to end.

use std::sync::Arc;

use approx::{assert_abs_diff_eq, assert_relative_eq};
use tubesim_core::solver::SimulationState;
use tubesim_core::{Circuit, Simulation, SimulatorConfig, TubesimError};

const RC: &str = "
.input in
.output out
R1 in out 1k
C1 out 0 1u
";

const CLIPPER: &str = "
.input in
.output out
R1 in out 1k
D1 out 0
D2 0 out
";

fn simulation(text: &str, oversample: usize) -> Simulation {
    let circuit = Circuit::from_dsl(text).unwrap();
    let config = SimulatorConfig::new().with_oversample(oversample);
    Simulation::from_circuit(&circuit, config).unwrap()
}

fn sine(n: usize, freq: f64, amplitude: f64) -> Vec<f64> {
    (0..n)
        .map(|k| amplitude * (2.0 * std::f64::consts::PI * freq * k as f64 / 48_000.0).sin())
        .collect()
}

fn process(sim: &mut Simulation, input: &[f64]) -> Vec<f64> {
    let mut output = vec![0.0; input.len()];
    sim.process(input, &mut output).unwrap();
    output
}

#[test]
fn rc_step_settles_within_five_time_constants() {
    // tau = 1 ms = 48 samples
    for oversample in [1, 2, 4, 8] {
        let mut sim = simulation(RC, oversample);
        let out = process(&mut sim, &vec![1.0; 240]);
        let last = out[239];
        assert!(
            (last - 1.0).abs() < 0.01,
            "oversample {}: {} not within 1% of 1.0",
            oversample,
            last
        );
        assert!(out.windows(2).all(|w| w[1] >= w[0]));
    }
}

#[test]
fn rc_step_tracks_the_exponential() {
    let mut sim = simulation(RC, 8);
    let out = process(&mut sim, &vec![1.0; 96]);
    // out[k] is at t = (k + 1) / fs; the first sample ramps the input, which
    // delays the step by half a sample.
    for k in [23, 47, 95] {
        let t = (k as f64 + 0.5) / 48.0;
        assert_abs_diff_eq!(out[k], 1.0 - (-t).exp(), epsilon = 2e-3);
    }
}

#[test]
fn runs_are_deterministic() {
    let input = sine(480, 440.0, 2.0);
    let mut a = simulation(CLIPPER, 4);
    let mut b = simulation(CLIPPER, 4);
    let first = process(&mut a, &input);
    assert_eq!(first, process(&mut b, &input));

    a.reset();
    assert_eq!(a.state(), SimulationState::Fresh);
    assert_eq!(first, process(&mut a, &input));
}

#[test]
fn linear_circuits_ignore_the_iteration_budget() {
    let input = sine(256, 1000.0, 1.0);
    let mut one = simulation(RC, 2);
    let mut eight = simulation(RC, 2);
    let mut a = vec![0.0; input.len()];
    let mut b = vec![0.0; input.len()];
    one.run_mono("Vin", &input, "V[out]", &mut a, 1).unwrap();
    eight.run_mono("Vin", &input, "V[out]", &mut b, 8).unwrap();
    assert_eq!(a, b);
}

#[test]
fn oversampling_converges() {
    let circuit = "
.input in
.output out
R1 in out 1k
C1 out 0 100n
";
    let input = sine(480, 2000.0, 1.0);
    let reference = process(&mut simulation(circuit, 64), &input);
    let error = |oversample| {
        let out = process(&mut simulation(circuit, oversample), &input);
        out.iter()
            .zip(&reference)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    };
    let (e1, e4, e16) = (error(1), error(4), error(16));
    assert!(e4 < e1, "{} !< {}", e4, e1);
    assert!(e16 < e4, "{} !< {}", e16, e4);
}

#[test]
fn divergence_is_reported_and_sticky() {
    let circuit = "
.input in
.output out
.param r 1000
R1 in out {r}
C1 out 0 1u
";
    let mut sim = simulation(circuit, 8);
    sim.set_parameter("r", -100.0).unwrap();

    let input = vec![1.0; 20_000];
    let mut output = vec![0.0; input.len()];
    match sim.process(&input, &mut output) {
        Err(TubesimError::Diverged { time, output }) => {
            assert!(time.is_finite() && time > 0.0);
            assert_eq!(output, "V[out]");
        }
        other => panic!("expected divergence, got {:?}", other),
    }
    assert_eq!(sim.state(), SimulationState::Diverged);
    assert_eq!(sim.at(), 0);

    let mut short = vec![0.0; 4];
    assert!(matches!(
        sim.process(&[1.0; 4], &mut short),
        Err(TubesimError::AlreadyDiverged)
    ));

    // Parameters survive the reset.
    sim.reset();
    assert_eq!(sim.parameter("r"), Some(-100.0));
    sim.reset_parameters();
    assert_eq!(sim.parameter("r"), Some(1000.0));
    sim.process(&[1.0; 4], &mut short).unwrap();
    assert!(short.iter().all(|v| v.is_finite()));
}

#[test]
fn clock_and_rates() {
    let mut sim = simulation(RC, 4);
    assert_relative_eq!(sim.sample_rate(), 48_000.0);
    assert_relative_eq!(sim.timestep(), 1.0 / 48_000.0);
    assert_eq!(sim.oversample(), 4);
    assert_relative_eq!(sim.solution().sample_rate(), 192_000.0);

    process(&mut sim, &vec![0.0; 480]);
    assert_eq!(sim.at(), 480);
    assert_relative_eq!(sim.time(), 0.01, epsilon = 1e-12);
    assert_eq!(sim.state(), SimulationState::Running);
}

#[test]
fn parameters_persist_between_runs() {
    let circuit = "
.input in
.output out
.param vol 0.5
POT1 in out 0 10k {vol}
";
    let mut sim = simulation(circuit, 1);
    let mut out = vec![0.0; 4];
    sim.run(4, &[("Vin", &[1.0; 4][..])], &mut [("V[out]", out.as_mut_slice())], &[], 8)
        .unwrap();
    assert_relative_eq!(out[3], 0.5, epsilon = 1e-9);

    sim.run(
        4,
        &[("Vin", &[1.0; 4][..])],
        &mut [("V[out]", out.as_mut_slice())],
        &[("vol", 0.25)],
        8,
    )
    .unwrap();
    assert_relative_eq!(out[3], 0.75, epsilon = 1e-9);

    sim.run(4, &[("Vin", &[1.0; 4][..])], &mut [("V[out]", out.as_mut_slice())], &[], 8)
        .unwrap();
    assert_relative_eq!(out[3], 0.75, epsilon = 1e-9);
    assert_eq!(sim.parameter("vol"), Some(0.25));
}

#[test]
fn rejected_bindings_leave_parameters_alone() {
    let circuit = "
.input in
.output out
.param vol 0.5
POT1 in out 0 10k {vol}
";
    let mut sim = simulation(circuit, 1);
    let mut out = vec![0.0; 4];
    assert!(matches!(
        sim.run(
            4,
            &[("Vin", &[1.0; 4][..])],
            &mut [("V[out]", out.as_mut_slice())],
            &[("vol", 0.25), ("missing", 1.0)],
            8,
        ),
        Err(TubesimError::UnknownParameter { .. })
    ));
    assert_eq!(sim.parameter("vol"), Some(0.5));
    assert_eq!(sim.at(), 0);

    sim.run(4, &[("Vin", &[1.0; 4][..])], &mut [("V[out]", out.as_mut_slice())], &[], 8)
        .unwrap();
    assert_relative_eq!(out[3], 0.5, epsilon = 1e-9);
}

#[test]
fn caller_errors() {
    let mut sim = simulation(RC, 1);
    let mut out = vec![0.0; 4];

    assert!(matches!(
        sim.run(4, &[("Vin", &[0.0; 3][..])], &mut [("V[out]", out.as_mut_slice())], &[], 8),
        Err(TubesimError::BufferLengthMismatch { expected: 4, found: 3, .. })
    ));
    assert!(matches!(
        sim.run(4, &[("guitar", &[0.0; 4][..])], &mut [("V[out]", out.as_mut_slice())], &[], 8),
        Err(TubesimError::UnknownBuffer { .. })
    ));
    assert!(matches!(
        sim.run(4, &[], &mut [("V[nowhere]", out.as_mut_slice())], &[], 8),
        Err(TubesimError::UnknownBuffer { .. })
    ));
    assert!(matches!(
        sim.run(4, &[], &mut [("V[out]", out.as_mut_slice())], &[("missing", 1.0)], 8),
        Err(TubesimError::UnknownParameter { .. })
    ));
    assert!(matches!(
        sim.run(4, &[], &mut [("V[out]", out.as_mut_slice())], &[], 0),
        Err(TubesimError::InvalidIterationBudget)
    ));
    assert_eq!(sim.at(), 0);

    let circuit = Circuit::from_dsl(RC).unwrap();
    assert!(matches!(
        Simulation::from_circuit(&circuit, SimulatorConfig::new().with_iterations(0)),
        Err(TubesimError::InvalidIterationBudget)
    ));
}

#[test]
fn unbound_inputs_are_zero() {
    let mut sim = simulation(RC, 1);
    let mut out = vec![1.0; 8];
    sim.run(8, &[], &mut [("V[out]", out.as_mut_slice())], &[], 8).unwrap();
    assert!(out.iter().all(|&v| v == 0.0));
}

#[test]
fn solutions_are_shared_between_simulations() {
    let mut first = simulation(CLIPPER, 2);
    let config = SimulatorConfig::new().with_oversample(2);
    let mut second = Simulation::new(Arc::clone(first.solution()), &config).unwrap();

    let input = sine(128, 440.0, 1.0);
    let mut a = vec![0.0; input.len()];
    let mut b = vec![0.0; input.len()];
    first.run_mono("Vin", &input, "V[out]", &mut a, 8).unwrap();
    second.run_mono("Vin", &input, "V[out]", &mut b, 8).unwrap();
    assert_eq!(a, b);
    assert_eq!(Arc::strong_count(first.solution()), 2);
}
