//! Acoustic text link
//!
//! Sends short alphanumeric messages between devices as a sequence of audible
//! tones, one tone per character, on an evenly spaced frequency grid. The
//! receiver estimates the dominant frequency twice per capture block, maps it
//! to the nearest grid entry and decodes the message between start and end
//! markers by majority vote.

pub mod boundary;
pub mod capture;
pub mod codec;
pub mod collector;
pub mod config;
pub mod device;
pub mod error;
pub mod extractor;
pub mod grid;
pub mod message;
pub mod symbol;
pub mod synth;

pub use boundary::{BoundaryFlags, TransmissionBoundaryDetector};
pub use capture::{capture_loop, play_tones, Sampler, StopSignal, TonePipeline};
pub use codec::SymbolCodec;
pub use collector::MessageCollector;
pub use config::{BoundaryConfig, ExtractorConfig, GridConfig, LinkConfig, PlaybackConfig};
pub use device::{AudioInputDevice, AudioOutputDevice, MemoryOutput, SessionListener, SliceInput};
pub use error::{Result, ToneLinkError};
pub use extractor::ToneExtractor;
pub use grid::FrequencyGrid;
pub use message::MessageDecoder;
pub use symbol::{Symbol, Tone};
pub use synth::ToneSynthesizer;

// Grid configuration
pub const DEFAULT_START_FREQUENCY: f32 = 700.0; // Hz, left bound
pub const DEFAULT_END_FREQUENCY: f32 = 14000.0; // Hz
pub const DEFAULT_SPACING: f32 = 115.0; // Hz
pub const DEFAULT_NUM_FREQUENCIES: usize = 80;
pub const DEFAULT_BASE_CODE: u32 = 48; // '0'

/// Grid entries that never carry a character: two bounds plus NEXT, START and END
pub const RESERVED_INDICES: usize = 5;

// Capture configuration
pub const DEFAULT_CAPTURE_SAMPLE_RATE: u32 = 40000;
pub const DEFAULT_MIN_BUFFER_SIZE: usize = 5120; // two ticks per block
pub const DEFAULT_WINDOW_SIZE: usize = 2048;
pub const DEFAULT_WINDOWS_PER_TICK: usize = 5;
pub const DEFAULT_NOISE_FLOOR_HZ: f32 = 650.0;

// Boundary vote configuration
pub const DEFAULT_QUEUE_CAPACITY: usize = 5;
pub const DEFAULT_START_THRESHOLD: usize = 3;
pub const DEFAULT_END_THRESHOLD: usize = 3;

// Playback configuration
pub const DEFAULT_PLAYBACK_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_TONE_DURATION_SECS: f32 = 1.0;
pub const DEFAULT_AMPLITUDE: f32 = 1.0;
