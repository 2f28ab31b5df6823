mod wav;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tonelink_core::{
    capture_loop, play_tones, AudioInputDevice, LinkConfig, MemoryOutput, MessageCollector,
    SessionListener, SliceInput, StopSignal, Symbol, SymbolCodec, Tone, TonePipeline,
    ToneSynthesizer,
};
use tracing_subscriber::EnvFilter;

use crate::wav::{read_wav, write_wav, CliError};

#[derive(Parser)]
#[command(name = "tonelink")]
#[command(about = "Send short text messages as sequences of audible tones")]
struct Cli {
    /// JSON link configuration; missing fields keep their defaults
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG overrides.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode a message to a WAV file
    Encode {
        /// Letters and digits only
        #[arg(value_name = "MESSAGE")]
        message: String,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Seconds each tone is held
        #[arg(short, long)]
        tone_duration: Option<f32>,

        /// Output sample rate in Hz
        #[arg(short, long)]
        sample_rate: Option<u32>,

        /// Peak amplitude in (0, 1]
        #[arg(short, long)]
        amplitude: Option<f32>,

        /// Seconds of silence before the first tone
        #[arg(long, default_value = "0")]
        lead_silence: f32,
    },

    /// Decode messages from a WAV recording
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Keep decoding after the first message
        #[arg(long)]
        all: bool,

        /// Print every analysis tick with its classification
        #[arg(long)]
        show_tones: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the frequency grid
    Grid,

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Encode {
            message,
            output,
            tone_duration,
            sample_rate,
            amplitude,
            lead_silence,
        } => {
            let mut config = config;
            if let Some(duration) = tone_duration {
                config.playback.tone_duration_secs = duration;
            }
            if let Some(rate) = sample_rate {
                config.playback.sample_rate = rate;
            }
            if let Some(amplitude) = amplitude {
                config.playback.amplitude = amplitude;
            }
            encode_command(&config, &message, &output, lead_silence)?
        }
        Commands::Decode {
            input,
            all,
            show_tones,
            json,
        } => decode_command(config, &input, all, show_tones, json)?,
        Commands::Grid => grid_command(&config)?,
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<LinkConfig, CliError> {
    let config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)?;
            let config: LinkConfig = serde_json::from_str(&text)?;
            tracing::info!("Loaded configuration from {}", path.display());
            config
        }
        None => LinkConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn encode_command(
    config: &LinkConfig,
    message: &str,
    output_path: &Path,
    lead_silence: f32,
) -> Result<(), CliError> {
    SymbolCodec::validate_message(message)?;

    let codec = SymbolCodec::new(&config.grid)?;
    let tones = codec.encode_message(message)?;
    let synth = ToneSynthesizer::new(&config.playback)?;

    let silence = (lead_silence.max(0.0) * synth.sample_rate() as f32) as usize;
    let mut device = MemoryOutput::new(synth.sample_rate());
    play_tones(&mut device, &synth, &tones, &StopSignal::new())?;

    let mut samples = vec![0.0f32; silence];
    samples.extend(device.into_samples());
    write_wav(output_path, &samples, synth.sample_rate())?;

    println!(
        "Encoded {} characters into {} tones ({:.2} s)",
        message.len(),
        tones.len(),
        samples.len() as f32 / synth.sample_rate() as f32
    );
    println!("Wrote {}", output_path.display());
    Ok(())
}

#[derive(Serialize)]
struct DecodeReport {
    messages: Vec<String>,
    sample_rate: u32,
    duration_secs: f32,
    truncated: bool,
}

/// Forwards session events to the collector, optionally echoing each tick
struct DecodeListener<F: FnMut(String)> {
    collector: MessageCollector<F>,
    codec: SymbolCodec,
    show_tones: bool,
    tick: usize,
}

impl<F: FnMut(String)> SessionListener for DecodeListener<F> {
    fn on_tone_detected(&mut self, tone: Tone) {
        if self.show_tones {
            let symbol = self.codec.classify_tone(tone);
            println!("{:>5}  {:>10}  {}", self.tick, tone.to_string(), symbol);
        }
        self.tick += 1;
        self.collector.on_tone_detected(tone);
    }

    fn on_start_of_transmission(&mut self) {
        self.collector.on_start_of_transmission();
    }

    fn on_end_of_transmission(&mut self) {
        self.collector.on_end_of_transmission();
    }
}

fn decode_command(
    mut config: LinkConfig,
    input_path: &Path,
    all: bool,
    show_tones: bool,
    json: bool,
) -> Result<(), CliError> {
    let (samples, sample_rate) = read_wav(input_path)?;
    let duration_secs = samples.len() as f32 / sample_rate as f32;
    tracing::info!("Decoding {} samples ({:.2} s)", samples.len(), duration_secs);

    config.extractor.sample_rate = sample_rate;
    let mut pipeline = TonePipeline::new(&config)?;
    let codec = pipeline.codec().clone();

    let mut device = SliceInput::new(samples, sample_rate, config.extractor.min_buffer_size);
    device.open()?;

    let stop = StopSignal::new();
    let mut messages = Vec::new();
    let mut collector = MessageCollector::new(codec.clone(), |message| messages.push(message));
    if !all {
        collector = collector.stop_after_first(stop.clone());
    }
    let mut listener = DecodeListener {
        collector,
        codec,
        show_tones,
        tick: 0,
    };

    let result = capture_loop(&mut device, &mut pipeline, &mut listener, &stop);
    device.release();
    result?;

    let partial = listener.collector.flush();
    drop(listener);
    let truncated = partial.is_some();
    if let Some(message) = partial {
        tracing::warn!("Recording ended before the end of transmission");
        if !message.is_empty() {
            messages.push(message);
        }
    }

    if json {
        let report = DecodeReport {
            messages,
            sample_rate,
            duration_secs,
            truncated,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if messages.is_empty() {
        println!("No message detected");
    } else {
        for message in &messages {
            println!("Decoded: {}", message);
        }
    }
    Ok(())
}

fn grid_command(config: &LinkConfig) -> Result<(), CliError> {
    let codec = SymbolCodec::new(&config.grid)?;
    let grid = codec.grid();

    for (index, &frequency) in grid.frequencies().iter().enumerate() {
        let role = match codec.classify(frequency) {
            Symbol::Character(c, _) => c.to_string(),
            Symbol::Unknown(_) => "bound".to_string(),
            symbol => symbol.to_string().to_uppercase(),
        };
        println!("{:>3}  {:>8.1} Hz  {}", index, frequency, role);
    }
    Ok(())
}
