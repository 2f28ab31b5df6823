use std::collections::VecDeque;

use crate::config::BoundaryConfig;
use crate::error::Result;
use crate::symbol::Symbol;

/// Result of evaluating the vote window after one symbol
///
/// Level-triggered: a flag stays raised on every tick its condition holds.
/// Callers wanting one event per boundary track the previous state themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoundaryFlags {
    pub start: bool,
    pub end: bool,
}

/// Sliding majority vote over the most recent classified symbols
///
/// Signals start of transmission once the window holds enough Start symbols
/// and end of transmission once it holds enough End symbols. The thresholds
/// are validated so both flags can never be raised by the same window.
#[derive(Debug, Clone)]
pub struct TransmissionBoundaryDetector {
    window: VecDeque<Symbol>,
    capacity: usize,
    start_threshold: usize,
    end_threshold: usize,
}

impl TransmissionBoundaryDetector {
    pub fn new(config: &BoundaryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            window: VecDeque::with_capacity(config.capacity + 1),
            capacity: config.capacity,
            start_threshold: config.start_threshold,
            end_threshold: config.end_threshold,
        })
    }

    /// Push a symbol, evicting the oldest beyond capacity, and evaluate the window
    pub fn push(&mut self, symbol: Symbol) -> BoundaryFlags {
        self.window.push_back(symbol);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.evaluate()
    }

    /// Count Start and End symbols in a single pass over the window
    pub fn evaluate(&self) -> BoundaryFlags {
        let (starts, ends) = self
            .window
            .iter()
            .fold((0usize, 0usize), |(starts, ends), symbol| match symbol {
                Symbol::Start(_) => (starts + 1, ends),
                Symbol::End(_) => (starts, ends + 1),
                _ => (starts, ends),
            });

        BoundaryFlags {
            start: starts >= self.start_threshold,
            end: ends >= self.end_threshold,
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

impl Default for TransmissionBoundaryDetector {
    fn default() -> Self {
        Self::new(&BoundaryConfig::default()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Tone;

    fn start() -> Symbol {
        Symbol::Start(Tone::Hz(9555.0))
    }

    fn end() -> Symbol {
        Symbol::End(Tone::Hz(9670.0))
    }

    fn ch(c: char) -> Symbol {
        Symbol::Character(c, Tone::Unknown)
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut detector = TransmissionBoundaryDetector::default();
        for _ in 0..12 {
            detector.push(ch('a'));
        }
        assert_eq!(detector.len(), 5);
    }

    #[test]
    fn test_start_signal_needs_threshold() {
        let mut detector = TransmissionBoundaryDetector::default();
        assert_eq!(detector.push(start()), BoundaryFlags::default());
        assert_eq!(detector.push(start()), BoundaryFlags::default());
        assert_eq!(
            detector.push(start()),
            BoundaryFlags {
                start: true,
                end: false
            }
        );
    }

    #[test]
    fn test_start_signal_is_level_triggered() {
        let mut detector = TransmissionBoundaryDetector::default();
        for _ in 0..3 {
            detector.push(start());
        }
        // Still three starts in the window
        assert!(detector.push(ch('x')).start);
        assert!(detector.push(ch('x')).start);
        // Oldest start evicted
        assert!(!detector.push(ch('x')).start);
    }

    #[test]
    fn test_scattered_starts_still_count() {
        let mut detector = TransmissionBoundaryDetector::default();
        detector.push(start());
        detector.push(ch('q'));
        detector.push(start());
        detector.push(Symbol::Unknown(Tone::Unknown));
        assert!(detector.push(start()).start);
    }

    #[test]
    fn test_end_only_window() {
        let mut detector = TransmissionBoundaryDetector::default();
        detector.push(start());
        detector.push(start());
        detector.push(end());
        detector.push(end());
        let flags = detector.push(end());
        assert!(flags.end);
        assert!(!flags.start);
    }

    #[test]
    fn test_start_only_window() {
        let mut detector = TransmissionBoundaryDetector::default();
        detector.push(end());
        detector.push(end());
        detector.push(start());
        detector.push(start());
        let flags = detector.push(start());
        assert!(flags.start);
        assert!(!flags.end);
    }

    #[test]
    fn test_flags_never_both_raised() {
        let mut detector = TransmissionBoundaryDetector::default();
        let pattern = [start(), end(), start(), end(), end(), start(), start(), end()];
        for symbol in pattern.iter().cycle().take(64) {
            let flags = detector.push(*symbol);
            assert!(!(flags.start && flags.end));
        }
    }

    #[test]
    fn test_reset_clears_window() {
        let mut detector = TransmissionBoundaryDetector::default();
        for _ in 0..3 {
            detector.push(end());
        }
        detector.reset();
        assert!(detector.is_empty());
        assert_eq!(detector.evaluate(), BoundaryFlags::default());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let config = BoundaryConfig {
            capacity: 5,
            start_threshold: 2,
            end_threshold: 3,
        };
        assert!(TransmissionBoundaryDetector::new(&config).is_err());
    }
}
