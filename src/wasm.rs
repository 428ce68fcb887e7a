//! WASM bindings for Tubesim Core.
//!
//! This module provides JavaScript-friendly bindings for use in web browsers
//! with Web Audio API's AudioWorklet.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmCircuitSim } from 'tubesim_core';
//!
//! await init();
//!
//! const circuitDsl = `
//!   .input in
//!   .output out
//!   .param tone 0.5
//!   R1 in out {1000 + 9000 * tone}
//!   C1 out 0 10n
//! `;
//!
//! const sim = new WasmCircuitSim(circuitDsl, 48000);
//! sim.set_parameter("tone", 0.8);
//!
//! // In AudioWorkletProcessor.process():
//! const input = inputBuffer.getChannelData(0);
//! const output = outputBuffer.getChannelData(0);
//! sim.process_block(input, output);
//! ```

use wasm_bindgen::prelude::*;

use crate::audio::BlockBuffers;
use crate::circuit::Circuit;
use crate::solver::{Simulation, SimulatorConfig, DEFAULT_ITERATIONS, DEFAULT_OVERSAMPLE};

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

/// WASM-compatible circuit simulator.
///
/// Wraps a [`Simulation`] and provides a JavaScript-friendly API for
/// processing audio blocks in a Web Audio AudioWorklet.
#[wasm_bindgen]
pub struct WasmCircuitSim {
    simulation: Simulation,
    buffers: BlockBuffers,
}

#[wasm_bindgen]
impl WasmCircuitSim {
    /// Create a new simulator from a circuit DSL string.
    ///
    /// # Example
    /// ```javascript
    /// const sim = new WasmCircuitSim(circuitDsl, 48000);
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(circuit_dsl: &str, sample_rate: f64) -> Result<WasmCircuitSim, JsValue> {
        Self::with_config(circuit_dsl, sample_rate, DEFAULT_OVERSAMPLE, DEFAULT_ITERATIONS)
    }

    /// Create a new simulator with a custom oversampling factor and Newton
    /// iteration budget.
    #[wasm_bindgen]
    pub fn with_config(
        circuit_dsl: &str,
        sample_rate: f64,
        oversample: usize,
        iterations: usize,
    ) -> Result<WasmCircuitSim, JsValue> {
        let circuit = Circuit::from_dsl(circuit_dsl).map_err(js_error)?;
        let config = SimulatorConfig::new()
            .with_sample_rate(sample_rate)
            .with_oversample(oversample)
            .with_iterations(iterations);
        let simulation = Simulation::from_circuit(&circuit, config).map_err(js_error)?;

        Ok(WasmCircuitSim {
            simulation,
            buffers: BlockBuffers::default(),
        })
    }

    /// Process a block of audio samples.
    ///
    /// Designed to be called from an AudioWorkletProcessor's `process()`
    /// method. Throws once the simulation diverges; call `reset()` to
    /// recover.
    #[wasm_bindgen]
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) -> Result<(), JsValue> {
        self.buffers
            .run(&mut self.simulation, input, output)
            .map_err(js_error)
    }

    /// Set a `.param` value; it holds until changed again.
    #[wasm_bindgen]
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<(), JsValue> {
        self.simulation.set_parameter(name, value).map_err(js_error)
    }

    /// Clear the circuit state and restart at time zero.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.simulation.reset();
    }

    /// Get the sample rate this simulator was configured with.
    #[wasm_bindgen(getter)]
    pub fn sample_rate(&self) -> f64 {
        self.simulation.sample_rate()
    }

    /// Get the latest voltage at a named node, or `undefined` if the node
    /// doesn't exist.
    #[wasm_bindgen]
    pub fn node_voltage(&self, node_name: &str) -> Option<f64> {
        self.simulation.value(&format!("V[{}]", node_name))
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Get the default sample rate.
#[wasm_bindgen]
pub fn default_sample_rate() -> f64 {
    crate::DEFAULT_SAMPLE_RATE
}
