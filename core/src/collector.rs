use crate::capture::StopSignal;
use crate::codec::SymbolCodec;
use crate::device::SessionListener;
use crate::message::MessageDecoder;
use crate::symbol::{Symbol, Tone};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Collecting,
}

/// Gathers the symbols of one transmission and decodes them when it ends
///
/// The boundary flags are level-triggered, so repeated start flags while
/// collecting and end flags while idle are ignored. Each decoded message is
/// handed to `sink`.
pub struct MessageCollector<F: FnMut(String)> {
    codec: SymbolCodec,
    sink: F,
    state: State,
    symbols: Vec<Symbol>,
    stop_after_first: Option<StopSignal>,
}

impl<F: FnMut(String)> MessageCollector<F> {
    pub fn new(codec: SymbolCodec, sink: F) -> Self {
        Self {
            codec,
            sink,
            state: State::Idle,
            symbols: Vec::new(),
            stop_after_first: None,
        }
    }

    /// Raise `stop` once the first message has been delivered
    pub fn stop_after_first(mut self, stop: StopSignal) -> Self {
        self.stop_after_first = Some(stop);
        self
    }

    pub fn is_collecting(&self) -> bool {
        self.state == State::Collecting
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Drop any partial transmission without decoding it
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.symbols.clear();
    }

    /// Decode whatever was gathered when the input ends mid-transmission
    pub fn flush(&mut self) -> Option<String> {
        if self.state != State::Collecting {
            return None;
        }
        self.state = State::Idle;
        let message = MessageDecoder::decode(&self.symbols);
        self.symbols.clear();
        Some(message)
    }
}

impl<F: FnMut(String)> SessionListener for MessageCollector<F> {
    fn on_tone_detected(&mut self, tone: Tone) {
        if self.state == State::Collecting {
            self.symbols.push(self.codec.classify_tone(tone));
        }
    }

    fn on_start_of_transmission(&mut self) {
        if self.state == State::Idle {
            log::info!("Start of transmission");
            self.symbols.clear();
            self.state = State::Collecting;
        }
    }

    fn on_end_of_transmission(&mut self) {
        if self.state != State::Collecting {
            return;
        }
        log::info!("End of transmission after {} symbols", self.symbols.len());
        self.state = State::Idle;
        let message = MessageDecoder::decode(&self.symbols);
        self.symbols.clear();
        (self.sink)(message);

        if let Some(stop) = &self.stop_after_first {
            stop.cancel();
        }
    }
}
