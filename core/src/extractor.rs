//! Spectral tone extraction
//!
//! Turns raw PCM blocks into one tone estimate per half block:
//! - each half is analyzed independently, doubling the tick rate
//! - a few overlapping Hann-tapered windows per half go through an FFT
//! - the dominant bin of each window becomes a frequency, peaks at or below
//!   the noise floor are dropped
//! - the surviving peaks are averaged into the tick's tone

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::symbol::Tone;

pub struct ToneExtractor {
    config: ExtractorConfig,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl ToneExtractor {
    pub fn new(config: &ExtractorConfig) -> Result<Self> {
        config.validate()?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.window_size);

        Ok(Self {
            window: hann_window(config.window_size),
            buffer: vec![Complex::new(0.0, 0.0); config.window_size],
            magnitudes: vec![0.0; config.window_size / 2],
            config: config.clone(),
            fft,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Capture block size for a device suggesting `device_block` samples
    pub fn block_size(&self, device_block: usize) -> usize {
        device_block.max(self.config.min_buffer_size)
    }

    /// Frequency resolution of one FFT bin in Hz
    pub fn bin_width(&self) -> f32 {
        self.config.sample_rate as f32 / self.config.window_size as f32
    }

    /// Analyze one capture block, returning a tone for each of its halves
    pub fn process(&mut self, block: &[f32]) -> Vec<Tone> {
        if block.is_empty() {
            return Vec::new();
        }
        let (first, second) = block.split_at(block.len() / 2);
        vec![self.analyze_half(first), self.analyze_half(second)]
    }

    /// Average dominant frequency over the windows of one half block
    ///
    /// Returns `Tone::Unknown` when no window produced a peak above the noise
    /// floor, or when the half is too short to hold a single window.
    pub fn analyze_half(&mut self, samples: &[f32]) -> Tone {
        let window_size = self.config.window_size;
        if samples.len() < window_size {
            log::debug!(
                "Half block of {} samples is shorter than the {} sample window",
                samples.len(),
                window_size
            );
            return Tone::Unknown;
        }

        let windows = self.config.windows_per_tick;
        let stride = (samples.len() - window_size) / (windows + 1);

        let mut sum = 0.0;
        let mut retained = 0usize;
        for i in 0..windows {
            let offset = i * stride;
            let peak = self.dominant_frequency(&samples[offset..offset + window_size]);
            if peak > self.config.noise_floor_hz {
                sum += peak;
                retained += 1;
            }
        }

        if retained == 0 {
            log::trace!("No peak above {} Hz in this tick", self.config.noise_floor_hz);
            return Tone::Unknown;
        }

        let tone = Tone::Hz(sum / retained as f32);
        log::trace!("Tick tone {} from {}/{} windows", tone, retained, windows);
        tone
    }

    /// Frequency of the strongest bin below Nyquist, DC excluded
    fn dominant_frequency(&mut self, samples: &[f32]) -> f32 {
        for ((slot, &sample), &weight) in self
            .buffer
            .iter_mut()
            .zip(samples.iter())
            .zip(self.window.iter())
        {
            *slot = Complex::new(sample * weight, 0.0);
        }

        self.fft.process(&mut self.buffer);

        for (magnitude, bin) in self.magnitudes.iter_mut().zip(self.buffer.iter()) {
            *magnitude = bin.norm();
        }
        // DC is large and never carries a tone
        self.magnitudes[0] = 0.0;

        let mut peak_index = 0;
        let mut peak_value = self.magnitudes[0];
        for (i, &magnitude) in self.magnitudes.iter().enumerate().skip(1) {
            if magnitude > peak_value {
                peak_value = magnitude;
                peak_index = i;
            }
        }

        peak_index as f32 * self.bin_width()
    }
}

/// Hann taper: 0.5 * (1 - cos(2*pi*i / (size - 1)))
pub fn hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    let denominator = (size - 1) as f32;
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / denominator).cos()))
        .collect()
}
