use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use thiserror::Error;
use tonelink_core::synth::{from_pcm16, to_pcm16};
use tonelink_core::ToneLinkError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    #[error("Config file error: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Link(#[from] ToneLinkError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mono samples of a WAV file and its sample rate
///
/// Multi-channel files are downmixed by averaging the channels of each frame.
pub fn read_wav(path: &Path) -> Result<(Vec<f32>, u32), CliError> {
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    tracing::debug!(
        "Read WAV: {} Hz, {} channels, {} bits",
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample
    );

    let interleaved = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => {
            let samples = reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?;
            from_pcm16(&samples)
        }
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (format, bits) => {
            return Err(CliError::UnsupportedFormat(format!(
                "{:?} samples at {} bits",
                format, bits
            )))
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok((samples, spec.sample_rate))
}

/// Write mono samples as 16-bit PCM
pub fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), CliError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::new(BufWriter::new(File::create(path)?), spec)?;
    for sample in to_pcm16(samples) {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}
