//! Link configuration
//!
//! Every component is built from an immutable section of [`LinkConfig`].
//! Sections validate themselves; construction of a component fails with
//! [`ToneLinkError::InvalidConfig`] when its section is inconsistent.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ToneLinkError};
use crate::{
    DEFAULT_AMPLITUDE, DEFAULT_BASE_CODE, DEFAULT_CAPTURE_SAMPLE_RATE, DEFAULT_END_FREQUENCY,
    DEFAULT_END_THRESHOLD, DEFAULT_MIN_BUFFER_SIZE, DEFAULT_NOISE_FLOOR_HZ,
    DEFAULT_NUM_FREQUENCIES, DEFAULT_PLAYBACK_SAMPLE_RATE, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SPACING, DEFAULT_START_FREQUENCY, DEFAULT_START_THRESHOLD, DEFAULT_TONE_DURATION_SECS,
    DEFAULT_WINDOWS_PER_TICK, DEFAULT_WINDOW_SIZE, RESERVED_INDICES,
};

/// Frequency grid layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Frequency of index 0 (the left bound) in Hz
    pub start_frequency: f32,
    /// Upper limit of the progression in Hz; the last index must not exceed it
    pub end_frequency: f32,
    /// Distance between adjacent grid entries in Hz
    pub spacing: f32,
    /// Character code mapped to grid index 1
    pub base_code: u32,
    /// Total number of grid entries, bounds and control symbols included
    pub num_frequencies: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            start_frequency: DEFAULT_START_FREQUENCY,
            end_frequency: DEFAULT_END_FREQUENCY,
            spacing: DEFAULT_SPACING,
            base_code: DEFAULT_BASE_CODE,
            num_frequencies: DEFAULT_NUM_FREQUENCIES,
        }
    }
}

impl GridConfig {
    /// Number of characters the grid can carry
    pub fn alphabet_len(&self) -> usize {
        self.num_frequencies.saturating_sub(RESERVED_INDICES)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.spacing > 0.0) {
            return Err(ToneLinkError::InvalidConfig(format!(
                "grid spacing must be positive, got {}",
                self.spacing
            )));
        }
        if self.num_frequencies <= RESERVED_INDICES {
            return Err(ToneLinkError::InvalidConfig(format!(
                "grid needs more than {} entries, got {}",
                RESERVED_INDICES, self.num_frequencies
            )));
        }
        let last = self.start_frequency + (self.num_frequencies - 1) as f32 * self.spacing;
        if last > self.end_frequency {
            return Err(ToneLinkError::InvalidConfig(format!(
                "{} entries spaced {} Hz from {} Hz overrun the end frequency {} Hz",
                self.num_frequencies, self.spacing, self.start_frequency, self.end_frequency
            )));
        }
        let last_code = self.base_code as u64 + self.alphabet_len() as u64 - 1;
        if char::from_u32(self.base_code).is_none() || last_code > char::MAX as u64 {
            return Err(ToneLinkError::InvalidConfig(format!(
                "alphabet starting at code {} is not representable",
                self.base_code
            )));
        }
        Ok(())
    }
}

/// Spectral tone extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Floor for the capture block size; each block yields two ticks
    pub min_buffer_size: usize,
    /// FFT window length in samples
    pub window_size: usize,
    /// Number of overlapping windows averaged into one tick
    pub windows_per_tick: usize,
    /// Peaks at or below this frequency are treated as ambient noise
    pub noise_floor_hz: f32,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_CAPTURE_SAMPLE_RATE,
            min_buffer_size: DEFAULT_MIN_BUFFER_SIZE,
            window_size: DEFAULT_WINDOW_SIZE,
            windows_per_tick: DEFAULT_WINDOWS_PER_TICK,
            noise_floor_hz: DEFAULT_NOISE_FLOOR_HZ,
        }
    }
}

impl ExtractorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ToneLinkError::InvalidConfig(
                "capture sample rate must be positive".into(),
            ));
        }
        if self.window_size < 2 {
            return Err(ToneLinkError::InvalidConfig(format!(
                "window size must be at least 2, got {}",
                self.window_size
            )));
        }
        if self.windows_per_tick == 0 {
            return Err(ToneLinkError::InvalidConfig(
                "at least one window per tick is required".into(),
            ));
        }
        if self.min_buffer_size / 2 < self.window_size {
            return Err(ToneLinkError::InvalidConfig(format!(
                "half of the minimum buffer ({}) is shorter than the window ({})",
                self.min_buffer_size / 2,
                self.window_size
            )));
        }
        if !(self.noise_floor_hz >= 0.0) {
            return Err(ToneLinkError::InvalidConfig(format!(
                "noise floor must be non-negative, got {}",
                self.noise_floor_hz
            )));
        }
        Ok(())
    }
}

/// Start/end-of-transmission majority vote parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundaryConfig {
    /// Number of most recent symbols kept in the vote window
    pub capacity: usize,
    /// Start symbols required in the window to signal start of transmission
    pub start_threshold: usize,
    /// End symbols required in the window to signal end of transmission
    pub end_threshold: usize,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_QUEUE_CAPACITY,
            start_threshold: DEFAULT_START_THRESHOLD,
            end_threshold: DEFAULT_END_THRESHOLD,
        }
    }
}

impl BoundaryConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, threshold) in [
            ("start", self.start_threshold),
            ("end", self.end_threshold),
        ] {
            if threshold == 0 || threshold > self.capacity {
                return Err(ToneLinkError::InvalidConfig(format!(
                    "{} threshold {} must lie in 1..={}",
                    name, threshold, self.capacity
                )));
            }
        }
        // Both flags holding at once would need more symbols than the window keeps.
        if self.start_threshold + self.end_threshold <= self.capacity {
            return Err(ToneLinkError::InvalidConfig(format!(
                "thresholds {} + {} must exceed the window capacity {}",
                self.start_threshold, self.end_threshold, self.capacity
            )));
        }
        Ok(())
    }
}

/// Tone rendering parameters for the transmitting side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// How long each tone is held, in seconds
    pub tone_duration_secs: f32,
    /// Peak amplitude in (0, 1]
    pub amplitude: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_PLAYBACK_SAMPLE_RATE,
            tone_duration_secs: DEFAULT_TONE_DURATION_SECS,
            amplitude: DEFAULT_AMPLITUDE,
        }
    }
}

impl PlaybackConfig {
    /// Samples per rendered tone
    pub fn samples_per_tone(&self) -> usize {
        (self.tone_duration_secs * self.sample_rate as f32).round() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(ToneLinkError::InvalidConfig(
                "playback sample rate must be positive".into(),
            ));
        }
        if !(self.tone_duration_secs > 0.0) || self.samples_per_tone() == 0 {
            return Err(ToneLinkError::InvalidConfig(format!(
                "tone duration {} s yields no samples",
                self.tone_duration_secs
            )));
        }
        if !(self.amplitude > 0.0 && self.amplitude <= 1.0) {
            return Err(ToneLinkError::InvalidConfig(format!(
                "amplitude must lie in (0, 1], got {}",
                self.amplitude
            )));
        }
        Ok(())
    }
}

/// Complete configuration shared by both ends of the link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub grid: GridConfig,
    pub extractor: ExtractorConfig,
    pub boundary: BoundaryConfig,
    pub playback: PlaybackConfig,
}

impl LinkConfig {
    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.extractor.validate()?;
        self.boundary.validate()?;
        self.playback.validate()?;

        let highest = self.grid.start_frequency
            + (self.grid.num_frequencies - 1) as f32 * self.grid.spacing;
        let nyquist = self.extractor.sample_rate as f32 / 2.0;
        if highest >= nyquist {
            return Err(ToneLinkError::InvalidConfig(format!(
                "highest grid tone {} Hz is not below the capture Nyquist frequency {} Hz",
                highest, nyquist
            )));
        }
        Ok(())
    }
}
