//! Audio I/O for the CLI and WASM frontends.
//!
//! [`BlockBuffers`] runs `f32` sample blocks through a simulation. With the
//! `cli` feature, [`process_audio`] streams raw little-endian `f32` PCM from
//! stdin to stdout.

mod block;
#[cfg(feature = "cli")]
mod stdio;

pub use block::BlockBuffers;
#[cfg(feature = "cli")]
pub use stdio::{process_audio, process_stream, AudioInput, AudioOutput, BUFFER_SIZE};
