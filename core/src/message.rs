use crate::codec::SymbolCodec;
use crate::symbol::{describe, Symbol};

/// How far into the buffer the preamble search looks for the last Start
const PREAMBLE_SCAN: usize = 20;

/// How far from the end of the buffer the postamble search looks for the first End
const POSTAMBLE_SCAN: usize = 10;

/// Reconstructs a message from the symbols collected during one session
///
/// Steps:
/// 1. clip everything up to the last Start among the first symbols
/// 2. clip everything from the first End among the last symbols
/// 3. keep only Character and Next symbols
/// 4. drop symbols without an equal neighbor (a real tone spans several
///    ticks, transition blur and background noise do not)
/// 5. split on runs of Next
/// 6. take the most frequent character of each group, first seen on ties
///
/// Decoding never fails: missing markers, empty groups and pure noise degrade
/// to partial or empty output.
pub struct MessageDecoder;

impl MessageDecoder {
    pub fn decode(symbols: &[Symbol]) -> String {
        log::debug!("Raw symbols: {}", describe(symbols));

        let clipped = clip(symbols);
        log::debug!("Clipped symbols: {}", describe(clipped));

        let filtered: Vec<Symbol> = clipped
            .iter()
            .copied()
            .filter(|s| matches!(s, Symbol::Character(..) | Symbol::Next(_)))
            .collect();

        let denoised = drop_isolated(&filtered);
        log::debug!("Without isolated symbols: {}", describe(&denoised));

        let message: String = group_by_next(&denoised)
            .iter()
            .filter_map(|group| most_frequent_character(group))
            .collect();

        log::info!("Decoded message {:?} from {} symbols", message, symbols.len());
        message
    }

    /// Classify a recorded frequency sequence, then decode it
    pub fn decode_frequencies(codec: &SymbolCodec, frequencies: &[f32]) -> String {
        Self::decode(&codec.classify_all(frequencies))
    }
}

fn clip(symbols: &[Symbol]) -> &[Symbol] {
    let head = &symbols[..symbols.len().min(PREAMBLE_SCAN)];
    let start = head
        .iter()
        .rposition(Symbol::is_start)
        .map_or(0, |i| i + 1);

    let tail_from = symbols.len().saturating_sub(POSTAMBLE_SCAN).max(start);
    let end = symbols[tail_from..]
        .iter()
        .position(Symbol::is_end)
        .map_or(symbols.len(), |i| tail_from + i);

    &symbols[start..end]
}

fn drop_isolated(symbols: &[Symbol]) -> Vec<Symbol> {
    symbols
        .iter()
        .enumerate()
        .filter(|&(i, symbol)| {
            let same_as_before = i > 0 && symbols[i - 1] == *symbol;
            let same_as_after = i + 1 < symbols.len() && symbols[i + 1] == *symbol;
            same_as_before || same_as_after
        })
        .map(|(_, symbol)| *symbol)
        .collect()
}

fn group_by_next(symbols: &[Symbol]) -> Vec<Vec<char>> {
    symbols
        .split(Symbol::is_next)
        .map(|run| run.iter().filter_map(Symbol::character).collect::<Vec<_>>())
        .filter(|group| !group.is_empty())
        .collect()
}

fn most_frequent_character(group: &[char]) -> Option<char> {
    // (char, count) in first-seen order so ties resolve deterministically
    let mut counts: Vec<(char, usize)> = Vec::new();
    for &c in group {
        match counts.iter_mut().find(|(seen, _)| *seen == c) {
            Some((_, count)) => *count += 1,
            None => counts.push((c, 1)),
        }
    }
    log::debug!("Character votes: {:?}", counts);

    let mut best: Option<(char, usize)> = None;
    for (c, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((c, count));
        }
    }
    best.map(|(c, _)| c)
}
