//! Raw PCM audio on stdin and stdout.

use std::io::{self, Read, Write};

use log::debug;

use super::BlockBuffers;
use crate::error::{Result, TubesimError};
use crate::solver::Simulation;

/// Buffer size for audio processing (in samples).
pub const BUFFER_SIZE: usize = 256;

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Little-endian `f32` reader.
pub struct AudioInput<R> {
    reader: R,
    buffer: Vec<u8>,
    /// Bytes of an incomplete sample carried over from the last read.
    pending: usize,
}

impl AudioInput<io::Stdin> {
    /// Create a reader on stdin.
    pub fn new() -> Self {
        Self::from_reader(io::stdin())
    }
}

impl Default for AudioInput<io::Stdin> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read> AudioInput<R> {
    pub fn from_reader(reader: R) -> Self {
        Self {
            reader,
            buffer: vec![0u8; BUFFER_SIZE * SAMPLE_BYTES],
            pending: 0,
        }
    }

    /// Read a block of samples.
    /// Returns the number of samples read, or 0 on EOF.
    pub fn read_block(&mut self, samples: &mut [f32]) -> Result<usize> {
        let wanted = samples.len() * SAMPLE_BYTES;
        if self.buffer.len() < wanted {
            self.buffer.resize(wanted, 0);
        }

        // Read until at least one whole sample is available
        let mut filled = self.pending;
        while filled < SAMPLE_BYTES {
            let n = self
                .reader
                .read(&mut self.buffer[filled..wanted])
                .map_err(|e| TubesimError::AudioInputError {
                    message: e.to_string(),
                })?;
            if n == 0 {
                if filled > 0 {
                    debug!("dropping {} trailing bytes", filled);
                }
                return Ok(0);
            }
            filled += n;
        }

        let whole = filled / SAMPLE_BYTES;
        for (sample, bytes) in samples
            .iter_mut()
            .zip(self.buffer[..whole * SAMPLE_BYTES].chunks_exact(SAMPLE_BYTES))
        {
            *sample = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        }

        self.pending = filled - whole * SAMPLE_BYTES;
        self.buffer
            .copy_within(whole * SAMPLE_BYTES..filled, 0);
        Ok(whole)
    }
}

/// Little-endian `f32` writer.
pub struct AudioOutput<W> {
    writer: W,
    buffer: Vec<u8>,
}

impl AudioOutput<io::Stdout> {
    /// Create a writer on stdout.
    pub fn new() -> Self {
        Self::from_writer(io::stdout())
    }
}

impl Default for AudioOutput<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> AudioOutput<W> {
    pub fn from_writer(writer: W) -> Self {
        Self {
            writer,
            buffer: Vec::with_capacity(BUFFER_SIZE * SAMPLE_BYTES),
        }
    }

    /// Write a block of samples.
    pub fn write_block(&mut self, samples: &[f32]) -> Result<()> {
        self.buffer.clear();
        self.buffer
            .extend(samples.iter().flat_map(|s| s.to_le_bytes()));
        self.writer
            .write_all(&self.buffer)
            .map_err(|e| TubesimError::AudioOutputError {
                message: e.to_string(),
            })
    }

    /// Flush the output stream.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| TubesimError::AudioOutputError {
                message: e.to_string(),
            })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Stream audio from `input` through the simulation into `output` until EOF.
pub fn process_stream<R: Read, W: Write>(
    simulation: &mut Simulation,
    input: &mut AudioInput<R>,
    output: &mut AudioOutput<W>,
) -> Result<usize> {
    let mut in_samples = vec![0.0f32; BUFFER_SIZE];
    let mut out_samples = vec![0.0f32; BUFFER_SIZE];
    let mut buffers = BlockBuffers::default();
    let mut total = 0usize;

    loop {
        let samples_read = input.read_block(&mut in_samples)?;

        if samples_read == 0 {
            break;
        }

        buffers.run(
            simulation,
            &in_samples[..samples_read],
            &mut out_samples[..samples_read],
        )?;
        output.write_block(&out_samples[..samples_read])?;
        total += samples_read;
    }

    output.flush()?;
    debug!("processed {} samples", total);
    Ok(total)
}

/// Process audio from stdin to stdout using the given simulation.
pub fn process_audio(simulation: &mut Simulation) -> Result<()> {
    process_stream(simulation, &mut AudioInput::new(), &mut AudioOutput::new())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Circuit, SimulatorConfig};

    /// Hands out at most `chunk` bytes per read.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    fn bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_partial_reads_keep_sample_alignment() {
        let data = bytes(&[1.0, -2.0, 0.5]);
        let mut input = AudioInput::from_reader(Trickle { data: &data, chunk: 3 });
        let mut samples = [0.0f32; 4];
        let mut seen = Vec::new();
        loop {
            let n = input.read_block(&mut samples).unwrap();
            if n == 0 {
                break;
            }
            seen.extend_from_slice(&samples[..n]);
        }
        assert_eq!(seen, vec![1.0, -2.0, 0.5]);
    }

    #[test]
    fn test_process_stream_halves_through_divider() {
        let circuit = Circuit::from_dsl(".input in\n.output out\nR1 in out 1k\nR2 out 0 1k").unwrap();
        let mut sim = Simulation::from_circuit(&circuit, SimulatorConfig::new().with_oversample(1)).unwrap();
        let data = bytes(&[0.5; 300]);
        let mut input = AudioInput::from_reader(Trickle { data: &data, chunk: 1000 });
        let mut output = AudioOutput::from_writer(Vec::new());
        let total = process_stream(&mut sim, &mut input, &mut output).unwrap();
        assert_eq!(total, 300);

        let written = output.into_inner();
        assert_eq!(written.len(), 300 * SAMPLE_BYTES);
        for chunk in written.chunks_exact(SAMPLE_BYTES) {
            let y = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            assert!((y - 0.25).abs() < 1e-6);
        }
    }
}
