use std::fmt;

/// One frequency estimate produced per analysis tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tone {
    /// Averaged dominant frequency in Hz
    Hz(f32),
    /// No spectral peak survived the noise floor during the tick
    Unknown,
}

impl Tone {
    pub fn frequency(self) -> Option<f32> {
        match self {
            Tone::Hz(freq) => Some(freq),
            Tone::Unknown => None,
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tone::Hz(freq) => write!(f, "{:.1} Hz", freq),
            Tone::Unknown => f.write_str("unknown"),
        }
    }
}

/// A tone classified against the frequency grid
///
/// Every variant carries the tone it was classified from, for diagnostics only.
/// Equality ignores that tone: control symbols compare by variant alone and
/// characters additionally by their char. Denoising and majority voting depend
/// on exactly this relation.
#[derive(Debug, Clone, Copy)]
pub enum Symbol {
    Start(Tone),
    End(Tone),
    Next(Tone),
    Character(char, Tone),
    Unknown(Tone),
}

impl Symbol {
    pub fn tone(&self) -> Tone {
        match *self {
            Symbol::Start(tone)
            | Symbol::End(tone)
            | Symbol::Next(tone)
            | Symbol::Character(_, tone)
            | Symbol::Unknown(tone) => tone,
        }
    }

    pub fn character(&self) -> Option<char> {
        match *self {
            Symbol::Character(c, _) => Some(c),
            _ => None,
        }
    }

    pub fn is_start(&self) -> bool {
        matches!(self, Symbol::Start(_))
    }

    pub fn is_end(&self) -> bool {
        matches!(self, Symbol::End(_))
    }

    pub fn is_next(&self) -> bool {
        matches!(self, Symbol::Next(_))
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Symbol::Start(_), Symbol::Start(_))
            | (Symbol::End(_), Symbol::End(_))
            | (Symbol::Next(_), Symbol::Next(_))
            | (Symbol::Unknown(_), Symbol::Unknown(_)) => true,
            (Symbol::Character(a, _), Symbol::Character(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Symbol {}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Start(_) => f.write_str("Start"),
            Symbol::End(_) => f.write_str("End"),
            Symbol::Next(_) => f.write_str("Next"),
            Symbol::Character(c, _) => write!(f, "{}", c),
            Symbol::Unknown(_) => f.write_str("Unknown"),
        }
    }
}

/// Render a symbol sequence the way decode traces print it
pub(crate) fn describe(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
