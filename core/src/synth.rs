use std::f32::consts::PI;

use crate::config::PlaybackConfig;
use crate::error::Result;

/// Renders tone sequences as PCM sine bursts
///
/// Each tone is held for the configured duration at a constant amplitude;
/// phase restarts at zero on every tone.
pub struct ToneSynthesizer {
    config: PlaybackConfig,
}

impl ToneSynthesizer {
    pub fn new(config: &PlaybackConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn samples_per_tone(&self) -> usize {
        self.config.samples_per_tone()
    }

    /// One tone held for the configured duration
    pub fn render_tone(&self, frequency: f32) -> Vec<f32> {
        let sample_rate = self.config.sample_rate as f32;
        let amplitude = self.config.amplitude;
        (0..self.samples_per_tone())
            .map(|n| amplitude * (2.0 * PI * frequency * n as f32 / sample_rate).sin())
            .collect()
    }

    /// A whole tone sequence, back to back
    pub fn render(&self, tones: &[f32]) -> Vec<f32> {
        let mut samples = Vec::with_capacity(tones.len() * self.samples_per_tone());
        for &tone in tones {
            samples.extend(self.render_tone(tone));
        }
        samples
    }

    /// Total playback time of a tone sequence in seconds
    pub fn duration_secs(&self, tone_count: usize) -> f32 {
        (tone_count * self.samples_per_tone()) as f32 / self.config.sample_rate as f32
    }
}

impl Default for ToneSynthesizer {
    fn default() -> Self {
        Self::new(&PlaybackConfig::default()).unwrap()
    }
}

/// Convert float samples to 16-bit PCM, clamping to [-1.0, 1.0]
pub fn to_pcm16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Convert 16-bit PCM to float samples in [-1.0, 1.0)
pub fn from_pcm16(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthesizer() -> ToneSynthesizer {
        ToneSynthesizer::new(&PlaybackConfig {
            sample_rate: 40000,
            tone_duration_secs: 0.1,
            amplitude: 0.8,
        })
        .unwrap()
    }

    #[test]
    fn test_render_tone_length() {
        let synth = synthesizer();
        assert_eq!(synth.render_tone(1000.0).len(), 4000);
    }

    #[test]
    fn test_render_sequence_length() {
        let synth = synthesizer();
        let samples = synth.render(&[700.0, 815.0, 930.0]);
        assert_eq!(samples.len(), 3 * 4000);
        assert!((synth.duration_secs(3) - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_amplitude_respected() {
        let synth = synthesizer();
        let samples = synth.render_tone(1000.0);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
        assert!(peak <= 0.8 + 1e-6);
        assert!(peak > 0.79);
    }

    #[test]
    fn test_tone_starts_at_zero_phase() {
        let synth = synthesizer();
        assert_eq!(synth.render_tone(2000.0)[0], 0.0);
    }

    #[test]
    fn test_zero_crossings_match_frequency() {
        let synth = synthesizer();
        let samples = synth.render_tone(1000.0);
        let crossings = samples
            .windows(2)
            .filter(|pair| pair[0] < 0.0 && pair[1] >= 0.0)
            .count();
        // 1000 Hz for 0.1 s
        assert!((99..=101).contains(&crossings), "got {} crossings", crossings);
    }

    #[test]
    fn test_pcm16_conversion() {
        assert_eq!(to_pcm16(&[0.0, 1.0, -1.0, 2.0, -2.0]), vec![0, 32767, -32767, 32767, -32767]);
        let back = from_pcm16(&[0, 16384, -32768]);
        assert_eq!(back, vec![0.0, 0.5, -1.0]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = PlaybackConfig {
            tone_duration_secs: 0.0,
            ..PlaybackConfig::default()
        };
        assert!(ToneSynthesizer::new(&config).is_err());
    }
}
