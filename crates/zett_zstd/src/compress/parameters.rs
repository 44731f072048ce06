use zett_foundation::highest_bit;

use crate::{Error, MAX_WINDOW_LOG, MIN_WINDOW_LOG};

pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;
pub const MAX_COMPRESSION_LEVEL: i32 = 9;

/// The wired block-matching strategy. The format-side machinery
/// (sequence store, entropy coders) is strategy-agnostic; adding a slower
/// matcher means adding a variant here and dispatching in
/// [`Strategy::compress_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fast,
}

#[derive(Debug, Clone, Copy)]
pub struct CompressionParameters {
    pub window_log: u8,
    pub hash_log: u8,
    pub chain_log: u8,
    pub search_log: u8,
    /// Minimum bytes hashed by the short table, 4 to 8.
    pub search_length: u8,
    pub target_length: u32,
    pub strategy: Strategy,
}

/// Base rows per level before input-size adjustment:
/// (window_log, hash_log, chain_log, search_log, search_length, target_length)
const LEVELS: [(u8, u8, u8, u8, u8, u32); MAX_COMPRESSION_LEVEL as usize] = [
    (19, 15, 13, 1, 5, 0), // 1
    (20, 16, 14, 1, 5, 0), // 2
    (21, 17, 15, 1, 5, 0), // 3 (default)
    (21, 18, 16, 1, 5, 0), // 4
    (21, 18, 17, 2, 5, 0), // 5
    (21, 19, 17, 3, 5, 0), // 6
    (21, 19, 18, 3, 5, 0), // 7
    (21, 20, 18, 4, 5, 0), // 8
    (23, 20, 19, 4, 5, 0), // 9
];

impl CompressionParameters {
    pub fn compute(level: i32, input_size: usize) -> Result<Self, Error> {
        let level = match level {
            0 => DEFAULT_COMPRESSION_LEVEL,
            l if l < 0 => return Err(Error::UnsupportedLevel(l)),
            l => l.min(MAX_COMPRESSION_LEVEL),
        };

        let (window_log, hash_log, chain_log, search_log, search_length, target_length) =
            LEVELS[(level - 1) as usize];

        let params = Self {
            window_log: window_log.min(MAX_WINDOW_LOG),
            hash_log,
            chain_log,
            search_log,
            search_length,
            target_length,
            strategy: Strategy::Fast,
        };

        Ok(params.adjust_for_input(input_size))
    }

    /// Shrink the window (and the tables keyed off it) when the input is
    /// smaller than the level's defaults assume.
    fn adjust_for_input(mut self, input_size: usize) -> Self {
        if input_size == 0 {
            self.window_log = MIN_WINDOW_LOG;
            return self;
        }

        let needed_log = {
            let bits = highest_bit(input_size.max(2) as u32 - 1) as u8 + 1;
            bits.max(MIN_WINDOW_LOG)
        };
        self.window_log = self.window_log.min(needed_log);

        self.hash_log = self.hash_log.min(self.window_log + 1);
        self.chain_log = self.chain_log.min(self.window_log + 1);

        self
    }

    pub fn window_size(&self) -> usize {
        1 << self.window_log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_level() {
        let params = CompressionParameters::compute(0, 1 << 20).unwrap();
        assert_eq!(params.window_log, 20);
        assert_eq!(params.strategy, Strategy::Fast);
    }

    #[test]
    fn test_window_caps() {
        // never beyond the 8 MiB format ceiling we support
        let params = CompressionParameters::compute(9, 1 << 30).unwrap();
        assert!(params.window_log <= MAX_WINDOW_LOG);

        // tiny inputs shrink the window to the minimum
        let params = CompressionParameters::compute(3, 100).unwrap();
        assert_eq!(params.window_log, MIN_WINDOW_LOG);
        assert!(params.hash_log <= params.window_log + 1);
    }

    #[test]
    fn test_levels_above_max_clamp() {
        assert!(CompressionParameters::compute(22, 1024).is_ok());
        assert!(matches!(
            CompressionParameters::compute(-1, 1024),
            Err(Error::UnsupportedLevel(-1))
        ));
    }
}
