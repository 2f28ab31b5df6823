//! Audio device seams
//!
//! The receiving side reads float PCM blocks from an [`AudioInputDevice`];
//! the transmitting side writes rendered tones to an [`AudioOutputDevice`].
//! Platform backends live outside this crate. In-memory implementations are
//! provided for offline decoding and tests.

use crate::error::{Result, ToneLinkError};
use crate::symbol::Tone;

/// Source of mono float PCM samples
pub trait AudioInputDevice: Send {
    fn sample_rate(&self) -> u32;

    /// Block size the device prefers to deliver, in samples
    fn block_size(&self) -> usize;

    /// Acquire the device. Must be called before `read`.
    fn open(&mut self) -> Result<()>;

    /// Fill `buffer` with the next samples, returning how many were written.
    /// `Ok(0)` means the source is exhausted.
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize>;

    /// Release the device. Safe to call more than once.
    fn release(&mut self);
}

/// Sink for mono float PCM samples
pub trait AudioOutputDevice {
    fn sample_rate(&self) -> u32;

    fn open(&mut self) -> Result<()>;

    /// Queue samples for playback
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    fn release(&mut self);
}

/// Receives capture session events in order of detection
///
/// For every analysis tick `on_tone_detected` fires first, then the boundary
/// callbacks for the flags raised by that tick.
pub trait SessionListener {
    fn on_tone_detected(&mut self, _tone: Tone) {}

    fn on_start_of_transmission(&mut self) {}

    fn on_end_of_transmission(&mut self) {}
}

/// Recorded samples served block by block
///
/// The final partial block is zero padded so every read fills the caller's
/// buffer completely.
#[derive(Debug, Clone)]
pub struct SliceInput {
    samples: Vec<f32>,
    sample_rate: u32,
    block_size: usize,
    position: usize,
    open: bool,
}

impl SliceInput {
    pub fn new(samples: Vec<f32>, sample_rate: u32, block_size: usize) -> Self {
        Self {
            samples,
            sample_rate,
            block_size,
            position: 0,
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl AudioInputDevice for SliceInput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn open(&mut self) -> Result<()> {
        if self.open {
            return Err(ToneLinkError::Device("input already open".into()));
        }
        self.open = true;
        self.position = 0;
        Ok(())
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
        if !self.open {
            return Err(ToneLinkError::Device("read from a closed input".into()));
        }
        if self.remaining() == 0 {
            return Ok(0);
        }

        let count = self.remaining().min(buffer.len());
        buffer[..count].copy_from_slice(&self.samples[self.position..self.position + count]);
        buffer[count..].fill(0.0);
        self.position += count;
        Ok(buffer.len())
    }

    fn release(&mut self) {
        self.open = false;
    }
}

/// Collects everything written to it
#[derive(Debug, Clone, Default)]
pub struct MemoryOutput {
    samples: Vec<f32>,
    sample_rate: u32,
    open: bool,
}

impl MemoryOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate,
            open: false,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}

impl AudioOutputDevice for MemoryOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        if !self.open {
            return Err(ToneLinkError::Device("write to a closed output".into()));
        }
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn release(&mut self) {
        self.open = false;
    }
}
