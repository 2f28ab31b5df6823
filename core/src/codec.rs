use crate::config::GridConfig;
use crate::error::{Result, ToneLinkError};
use crate::grid::FrequencyGrid;
use crate::symbol::{Symbol, Tone};

/// Copies of START emitted ahead of the message
const START_REPEATS: usize = 2;

/// Copies of END emitted after the message. One more than START: END is the
/// highest tone on the grid and the easiest for cheap hardware to miss.
const END_REPEATS: usize = 3;

/// Maps characters to grid tones and measured frequencies back to symbols
///
/// Message framing:
/// 1. START twice, then one NEXT so every message opens with a delimiter
/// 2. For each character: its tone followed by NEXT
/// 3. END three times
#[derive(Debug, Clone)]
pub struct SymbolCodec {
    grid: FrequencyGrid,
}

impl SymbolCodec {
    pub fn new(config: &GridConfig) -> Result<Self> {
        Ok(Self {
            grid: FrequencyGrid::new(config)?,
        })
    }

    pub fn grid(&self) -> &FrequencyGrid {
        &self.grid
    }

    pub fn start_frequency(&self) -> f32 {
        self.grid.frequencies()[self.grid.start_index()]
    }

    pub fn end_frequency(&self) -> f32 {
        self.grid.frequencies()[self.grid.end_index()]
    }

    pub fn next_frequency(&self) -> f32 {
        self.grid.frequencies()[self.grid.next_index()]
    }

    /// Frequency carrying `c`
    ///
    /// Fails with `InvalidCharacter` outside the grid's alphabet rather than
    /// landing on a bound or control slot.
    pub fn encode(&self, c: char) -> Result<f32> {
        let code = c as u32;
        let base = self.grid.base_code();
        if code < base || (code - base) as usize >= self.grid.alphabet_len() {
            return Err(ToneLinkError::InvalidCharacter(c));
        }
        // +1 skips the left bound
        let index = (code - base) as usize + 1;
        Ok(self.grid.frequencies()[index])
    }

    /// Tone sequence for a whole message, framing included
    pub fn encode_message(&self, message: &str) -> Result<Vec<f32>> {
        let start = self.start_frequency();
        let next = self.next_frequency();
        let end = self.end_frequency();

        let mut tones = Vec::with_capacity(START_REPEATS + 1 + message.len() * 2 + END_REPEATS);
        tones.extend(std::iter::repeat(start).take(START_REPEATS));
        tones.push(next);
        for c in message.chars() {
            tones.push(self.encode(c)?);
            tones.push(next);
        }
        tones.extend(std::iter::repeat(end).take(END_REPEATS));

        log::debug!("Encoded {:?} into {} tones", message, tones.len());
        Ok(tones)
    }

    /// Classify a measured frequency against the nearest grid entry
    pub fn classify(&self, freq: f32) -> Symbol {
        let index = self.grid.nearest_index(freq);
        self.symbol_at(index, Tone::Hz(freq))
    }

    pub fn classify_tone(&self, tone: Tone) -> Symbol {
        match tone {
            Tone::Hz(freq) => self.classify(freq),
            Tone::Unknown => Symbol::Unknown(tone),
        }
    }

    pub fn classify_all(&self, frequencies: &[f32]) -> Vec<Symbol> {
        frequencies.iter().map(|&f| self.classify(f)).collect()
    }

    /// Reject anything the transmitting UI would refuse: only ASCII letters and digits
    pub fn validate_message(message: &str) -> Result<()> {
        match message.chars().find(|c| !c.is_ascii_alphanumeric()) {
            Some(c) => Err(ToneLinkError::InvalidCharacter(c)),
            None => Ok(()),
        }
    }

    fn symbol_at(&self, index: usize, tone: Tone) -> Symbol {
        if index == self.grid.left_bound_index() || index == self.grid.right_bound_index() {
            Symbol::Unknown(tone)
        } else if index == self.grid.start_index() {
            Symbol::Start(tone)
        } else if index == self.grid.end_index() {
            Symbol::End(tone)
        } else if index == self.grid.next_index() {
            Symbol::Next(tone)
        } else {
            let offset = (index - 1) as u32;
            match char::from_u32(self.grid.base_code() + offset) {
                Some(c) if (offset as usize) < self.grid.alphabet_len() => Symbol::Character(c, tone),
                _ => Symbol::Unknown(tone),
            }
        }
    }
}

impl Default for SymbolCodec {
    fn default() -> Self {
        Self::new(&GridConfig::default()).unwrap()
    }
}
