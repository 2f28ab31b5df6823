//! Capture and playback sessions
//!
//! A capture session reads blocks from an input device on a background
//! thread, turns each block into tones, classifies them and runs the
//! boundary vote, reporting everything to a [`SessionListener`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::boundary::TransmissionBoundaryDetector;
use crate::codec::SymbolCodec;
use crate::config::LinkConfig;
use crate::device::{AudioInputDevice, AudioOutputDevice, SessionListener};
use crate::error::{Result, ToneLinkError};
use crate::extractor::ToneExtractor;
use crate::synth::ToneSynthesizer;

/// Shared flag asking a running session to wind down
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Extraction, classification and boundary vote for one capture session
pub struct TonePipeline {
    extractor: ToneExtractor,
    codec: SymbolCodec,
    detector: TransmissionBoundaryDetector,
}

impl TonePipeline {
    pub fn new(config: &LinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: ToneExtractor::new(&config.extractor)?,
            codec: SymbolCodec::new(&config.grid)?,
            detector: TransmissionBoundaryDetector::new(&config.boundary)?,
        })
    }

    pub fn codec(&self) -> &SymbolCodec {
        &self.codec
    }

    pub fn sample_rate(&self) -> u32 {
        self.extractor.config().sample_rate
    }

    pub fn block_size(&self, device_block: usize) -> usize {
        self.extractor.block_size(device_block)
    }

    /// Analyze one block and report its ticks to `listener`
    pub fn process_block<L: SessionListener + ?Sized>(&mut self, block: &[f32], listener: &mut L) {
        for tone in self.extractor.process(block) {
            listener.on_tone_detected(tone);

            let symbol = self.codec.classify_tone(tone);
            let flags = self.detector.push(symbol);
            log::trace!("Tick {} -> {}", tone, symbol);

            if flags.start {
                listener.on_start_of_transmission();
            }
            if flags.end {
                listener.on_end_of_transmission();
            }
        }
    }

    /// Forget the vote window between sessions
    pub fn reset(&mut self) {
        self.detector.reset();
    }
}

/// Read and process blocks until stopped or the device runs dry
///
/// The device must already be open; it is left open on return.
pub fn capture_loop<D, L>(
    device: &mut D,
    pipeline: &mut TonePipeline,
    listener: &mut L,
    stop: &StopSignal,
) -> Result<()>
where
    D: AudioInputDevice + ?Sized,
    L: SessionListener + ?Sized,
{
    if device.sample_rate() != pipeline.sample_rate() {
        return Err(ToneLinkError::InvalidConfig(format!(
            "device captures at {} Hz but the extractor expects {} Hz",
            device.sample_rate(),
            pipeline.sample_rate()
        )));
    }

    let mut block = vec![0.0f32; pipeline.block_size(device.block_size())];
    let mut blocks = 0usize;
    while !stop.is_cancelled() {
        let read = device.read(&mut block)?;
        if read == 0 {
            log::debug!("Input exhausted after {} blocks", blocks);
            break;
        }
        pipeline.process_block(&block[..read], listener);
        blocks += 1;
    }
    Ok(())
}

struct Session {
    stop: StopSignal,
    handle: JoinHandle<Result<()>>,
}

/// Owns an input device and at most one background capture session on it
pub struct Sampler<D: AudioInputDevice + 'static> {
    device: Arc<Mutex<D>>,
    config: LinkConfig,
    session: Option<Session>,
}

impl<D: AudioInputDevice + 'static> Sampler<D> {
    pub fn new(device: D, config: LinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            device: Arc::new(Mutex::new(device)),
            config,
            session: None,
        })
    }

    pub fn is_running(&self) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| !session.handle.is_finished())
    }

    /// Open the device and start capturing on a background thread
    ///
    /// Fails with `SessionActive` while a previous session is still running.
    /// Returns the signal that stops this session.
    pub fn start<L>(&mut self, listener: L) -> Result<StopSignal>
    where
        L: SessionListener + Send + 'static,
    {
        let stop = StopSignal::new();
        self.start_with_stop(listener, stop.clone())?;
        Ok(stop)
    }

    /// Like [`Sampler::start`], stopping when `stop` is raised
    pub fn start_with_stop<L>(&mut self, mut listener: L, stop: StopSignal) -> Result<()>
    where
        L: SessionListener + Send + 'static,
    {
        if self.is_running() {
            return Err(ToneLinkError::SessionActive);
        }
        if let Some(finished) = self.session.take() {
            if let Err(e) = join(finished.handle) {
                log::warn!("Previous capture session ended with an error: {}", e);
            }
        }

        let mut pipeline = TonePipeline::new(&self.config)?;
        lock(&self.device).open()?;

        let thread_stop = stop.clone();
        let shared = Arc::clone(&self.device);
        let spawned = thread::Builder::new()
            .name("tonelink-capture".into())
            .spawn(move || {
                let mut device = ReleaseOnExit(lock(&shared));
                log::info!("Capture started at {} Hz", device.0.sample_rate());
                let result =
                    capture_loop(&mut *device.0, &mut pipeline, &mut listener, &thread_stop);
                log::info!("Capture stopped");
                result
            });

        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                lock(&self.device).release();
                return Err(e.into());
            }
        };

        self.session = Some(Session { stop, handle });
        Ok(())
    }

    /// Block until the current session ends on its own
    pub fn wait(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => join(session.handle),
            None => Ok(()),
        }
    }

    /// Stop the current session and release the device. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        let result = match self.session.take() {
            Some(session) => {
                session.stop.cancel();
                join(session.handle)
            }
            None => Ok(()),
        };
        lock(&self.device).release();
        result
    }
}

impl<D: AudioInputDevice + 'static> Drop for Sampler<D> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::warn!("Capture session ended with an error: {}", e);
        }
    }
}

/// A panicking listener poisons the lock; the device itself is still usable
fn lock<D>(device: &Mutex<D>) -> MutexGuard<'_, D> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Releases the device when the capture thread exits, unwinding included
struct ReleaseOnExit<'a, D: AudioInputDevice>(MutexGuard<'a, D>);

impl<D: AudioInputDevice> Drop for ReleaseOnExit<'_, D> {
    fn drop(&mut self) {
        self.0.release();
    }
}

fn join(handle: JoinHandle<Result<()>>) -> Result<()> {
    handle
        .join()
        .map_err(|_| ToneLinkError::Device("capture thread panicked".into()))?
}

/// Play a tone sequence, checking `stop` between tones
///
/// Returns how many tones were written. The device is released on every path.
pub fn play_tones<O>(
    device: &mut O,
    synth: &ToneSynthesizer,
    tones: &[f32],
    stop: &StopSignal,
) -> Result<usize>
where
    O: AudioOutputDevice + ?Sized,
{
    if device.sample_rate() != synth.sample_rate() {
        return Err(ToneLinkError::InvalidConfig(format!(
            "device plays at {} Hz but tones are rendered at {} Hz",
            device.sample_rate(),
            synth.sample_rate()
        )));
    }

    device.open()?;
    let result = write_tones(device, synth, tones, stop);
    device.release();

    if let Ok(played) = result {
        log::info!("Played {}/{} tones", played, tones.len());
    }
    result
}

fn write_tones<O>(
    device: &mut O,
    synth: &ToneSynthesizer,
    tones: &[f32],
    stop: &StopSignal,
) -> Result<usize>
where
    O: AudioOutputDevice + ?Sized,
{
    let mut played = 0;
    for &tone in tones {
        if stop.is_cancelled() {
            log::debug!("Playback cancelled after {} tones", played);
            break;
        }
        device.write(&synth.render_tone(tone))?;
        played += 1;
    }
    Ok(played)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaybackConfig;
    use crate::device::{MemoryOutput, SliceInput};
    use crate::symbol::Tone;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::mpsc;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl SessionListener for Recorder {
        fn on_tone_detected(&mut self, tone: Tone) {
            self.events.push(format!("tone:{}", tone.frequency().is_some()));
        }

        fn on_start_of_transmission(&mut self) {
            self.events.push("start".into());
        }

        fn on_end_of_transmission(&mut self) {
            self.events.push("end".into());
        }
    }

    /// A tone held for `blocks` capture blocks at 40 kHz
    fn held_tone(freq: f32, blocks: usize) -> Vec<f32> {
        let synth = ToneSynthesizer::new(&PlaybackConfig {
            sample_rate: 40000,
            tone_duration_secs: 0.128 * blocks as f32,
            amplitude: 0.5,
        })
        .unwrap();
        synth.render_tone(freq)
    }

    #[test]
    fn test_stop_signal_shared_between_clones() {
        let stop = StopSignal::new();
        let clone = stop.clone();
        assert!(!clone.is_cancelled());
        stop.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_tone_reported_before_boundary() {
        let mut pipeline = TonePipeline::new(&LinkConfig::default()).unwrap();
        let start = pipeline.codec().start_frequency();
        let mut recorder = Recorder::default();

        let samples = held_tone(start, 2);
        for block in samples.chunks(5120) {
            pipeline.process_block(block, &mut recorder);
        }

        // Third tick completes the vote
        assert_eq!(
            recorder.events,
            vec!["tone:true", "tone:true", "tone:true", "start", "tone:true", "start"]
        );
    }

    #[test]
    fn test_capture_loop_runs_to_exhaustion() {
        let mut pipeline = TonePipeline::new(&LinkConfig::default()).unwrap();
        let end = pipeline.codec().end_frequency();
        let mut input = SliceInput::new(held_tone(end, 3), 40000, 1024);
        input.open().unwrap();

        let mut recorder = Recorder::default();
        capture_loop(&mut input, &mut pipeline, &mut recorder, &StopSignal::new()).unwrap();

        let ticks = recorder.events.iter().filter(|e| e.starts_with("tone")).count();
        assert_eq!(ticks, 6);
        assert_eq!(recorder.events.iter().filter(|e| *e == "end").count(), 4);
    }

    #[test]
    fn test_capture_loop_honors_stop() {
        let mut pipeline = TonePipeline::new(&LinkConfig::default()).unwrap();
        let mut input = SliceInput::new(vec![0.0; 51200], 40000, 5120);
        input.open().unwrap();

        let stop = StopSignal::new();
        stop.cancel();
        let mut recorder = Recorder::default();
        capture_loop(&mut input, &mut pipeline, &mut recorder, &stop).unwrap();
        assert!(recorder.events.is_empty());
        assert_eq!(input.remaining(), 51200);
    }

    #[test]
    fn test_capture_loop_rejects_sample_rate_mismatch() {
        let mut pipeline = TonePipeline::new(&LinkConfig::default()).unwrap();
        let mut input = SliceInput::new(vec![0.0; 5120], 44100, 5120);
        input.open().unwrap();
        let result = capture_loop(&mut input, &mut pipeline, &mut Recorder::default(), &StopSignal::new());
        assert!(matches!(result, Err(ToneLinkError::InvalidConfig(_))));
    }

    struct ChannelListener(mpsc::Sender<&'static str>);

    impl SessionListener for ChannelListener {
        fn on_start_of_transmission(&mut self) {
            let _ = self.0.send("start");
        }
    }

    #[test]
    fn test_sampler_session_lifecycle() {
        let codec = SymbolCodec::default();
        let input = SliceInput::new(held_tone(codec.start_frequency(), 2), 40000, 5120);
        let mut sampler = Sampler::new(input, LinkConfig::default()).unwrap();

        let (tx, rx) = mpsc::channel();
        sampler.start(ChannelListener(tx)).unwrap();
        sampler.wait().unwrap();
        assert!(!sampler.is_running());
        assert_eq!(rx.try_iter().count(), 2);

        // Device released, so a new session may start
        let (tx, _rx) = mpsc::channel();
        sampler.start(ChannelListener(tx)).unwrap();
        sampler.close().unwrap();
        sampler.close().unwrap();
    }

    struct EndlessInput;

    impl AudioInputDevice for EndlessInput {
        fn sample_rate(&self) -> u32 {
            40000
        }

        fn block_size(&self) -> usize {
            5120
        }

        fn open(&mut self) -> Result<()> {
            Ok(())
        }

        fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
            std::thread::sleep(std::time::Duration::from_millis(1));
            buffer.fill(0.0);
            Ok(buffer.len())
        }

        fn release(&mut self) {}
    }

    #[test]
    fn test_second_session_rejected_while_running() {
        let mut sampler = Sampler::new(EndlessInput, LinkConfig::default()).unwrap();
        let stop = sampler.start(Recorder::default()).unwrap();
        assert!(matches!(
            sampler.start(Recorder::default()),
            Err(ToneLinkError::SessionActive)
        ));
        stop.cancel();
        sampler.wait().unwrap();
        assert!(!sampler.is_running());
    }

    /// Silent input counting releases, failing once `fail_after` reads are served
    struct FlakyInput {
        fail_after: usize,
        reads: usize,
        releases: Arc<AtomicUsize>,
    }

    impl FlakyInput {
        fn new(fail_after: usize) -> (Self, Arc<AtomicUsize>) {
            let releases = Arc::new(AtomicUsize::new(0));
            let input = Self {
                fail_after,
                reads: 0,
                releases: Arc::clone(&releases),
            };
            (input, releases)
        }
    }

    impl AudioInputDevice for FlakyInput {
        fn sample_rate(&self) -> u32 {
            40000
        }

        fn block_size(&self) -> usize {
            5120
        }

        fn open(&mut self) -> Result<()> {
            self.reads = 0;
            Ok(())
        }

        fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
            if self.reads >= self.fail_after {
                return Err(ToneLinkError::Device("unplugged".into()));
            }
            self.reads += 1;
            buffer.fill(0.0);
            Ok(buffer.len())
        }

        fn release(&mut self) {
            self.releases.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    struct PanicOnTone;

    impl SessionListener for PanicOnTone {
        fn on_tone_detected(&mut self, _tone: Tone) {
            panic!("listener failure");
        }
    }

    #[test]
    fn test_device_failure_ends_only_that_session() {
        let (input, releases) = FlakyInput::new(3);
        let mut sampler = Sampler::new(input, LinkConfig::default()).unwrap();

        sampler.start(Recorder::default()).unwrap();
        let result = sampler.wait();
        assert!(
            matches!(&result, Err(ToneLinkError::Device(msg)) if msg == "unplugged"),
            "got {:?}",
            result
        );
        assert_eq!(releases.load(AtomicOrdering::SeqCst), 1);

        sampler.start(Recorder::default()).unwrap();
        assert!(sampler.wait().is_err());
        assert_eq!(releases.load(AtomicOrdering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_listener_releases_device() {
        let (input, releases) = FlakyInput::new(usize::MAX);
        let mut sampler = Sampler::new(input, LinkConfig::default()).unwrap();

        sampler.start(PanicOnTone).unwrap();
        assert!(matches!(sampler.wait(), Err(ToneLinkError::Device(_))));
        assert_eq!(releases.load(AtomicOrdering::SeqCst), 1);

        // Sampler stays usable after the failed session
        sampler.close().unwrap();
        assert_eq!(releases.load(AtomicOrdering::SeqCst), 2);
        sampler.start(Recorder::default()).unwrap();
        sampler.close().unwrap();
        // Once by the capture thread, once more by close
        assert_eq!(releases.load(AtomicOrdering::SeqCst), 4);
    }

    #[test]
    fn test_play_tones_writes_and_releases() {
        let synth = ToneSynthesizer::new(&PlaybackConfig {
            sample_rate: 8000,
            tone_duration_secs: 0.01,
            amplitude: 1.0,
        })
        .unwrap();
        let mut output = MemoryOutput::new(8000);

        let played = play_tones(&mut output, &synth, &[1000.0, 2000.0], &StopSignal::new()).unwrap();
        assert_eq!(played, 2);
        assert_eq!(output.samples().len(), 160);
        assert!(!output.is_open());
    }

    #[test]
    fn test_play_tones_cancelled() {
        let synth = ToneSynthesizer::default();
        let mut output = MemoryOutput::new(44100);
        let stop = StopSignal::new();
        stop.cancel();

        assert_eq!(play_tones(&mut output, &synth, &[1000.0], &stop).unwrap(), 0);
        assert!(output.samples().is_empty());
        assert!(!output.is_open());
    }
}
