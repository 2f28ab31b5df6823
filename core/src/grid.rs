use crate::config::GridConfig;
use crate::error::Result;

/// Ordered table of reference frequencies
///
/// Layout (N entries, strictly increasing):
/// - index 0 and N-1: out-of-band bounds, never transmitted
/// - index N-2: END, N-3: START, N-4: NEXT
/// - index 1..=N-5: one character each, ascending from the base code
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyGrid {
    frequencies: Vec<f32>,
    base_code: u32,
}

impl FrequencyGrid {
    pub fn new(config: &GridConfig) -> Result<Self> {
        config.validate()?;

        let frequencies = (0..config.num_frequencies)
            .map(|i| config.start_frequency + i as f32 * config.spacing)
            .collect();

        Ok(Self {
            frequencies,
            base_code: config.base_code,
        })
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    pub fn frequencies(&self) -> &[f32] {
        &self.frequencies
    }

    pub fn frequency(&self, index: usize) -> Option<f32> {
        self.frequencies.get(index).copied()
    }

    pub fn base_code(&self) -> u32 {
        self.base_code
    }

    /// Number of character slots between the left bound and NEXT
    pub fn alphabet_len(&self) -> usize {
        self.len() - crate::RESERVED_INDICES
    }

    pub fn left_bound_index(&self) -> usize {
        0
    }

    pub fn right_bound_index(&self) -> usize {
        self.len() - 1
    }

    pub fn end_index(&self) -> usize {
        self.len() - 2
    }

    pub fn start_index(&self) -> usize {
        self.len() - 3
    }

    pub fn next_index(&self) -> usize {
        self.len() - 4
    }

    /// Grid index closest to `freq`
    ///
    /// Binary search over the monotonic table comparing `mid` against
    /// `mid + 1`; on equal distance the higher index wins.
    pub fn nearest_index(&self, freq: f32) -> usize {
        let mut low = 0;
        let mut high = self.len() - 1;

        while low < high {
            let mid = (low + high) / 2;
            let d1 = (self.frequencies[mid] - freq).abs();
            let d2 = (self.frequencies[mid + 1] - freq).abs();
            if d2 <= d1 {
                low = mid + 1;
            } else {
                high = mid;
            }
        }

        high
    }
}
