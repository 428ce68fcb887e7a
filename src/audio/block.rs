//! `f32` block processing.

use crate::error::Result;
use crate::solver::Simulation;

/// Staging buffers that run `f32` audio blocks through a [`Simulation`].
#[derive(Debug, Default)]
pub struct BlockBuffers {
    input: Vec<f64>,
    output: Vec<f64>,
}

impl BlockBuffers {
    /// Run one block. Only the first `min(input.len(), output.len())`
    /// samples are processed.
    pub fn run(&mut self, simulation: &mut Simulation, input: &[f32], output: &mut [f32]) -> Result<()> {
        let n = input.len().min(output.len());
        self.input.clear();
        self.input.extend(input[..n].iter().map(|&x| f64::from(x)));
        self.output.clear();
        self.output.resize(n, 0.0);

        simulation.process(&self.input, &mut self.output)?;

        for (out, &y) in output[..n].iter_mut().zip(&self.output) {
            *out = y as f32;
        }
        Ok(())
    }
}
