use zett_foundation::const_assert;
use zett_io::{BitReader, ReverseBitReader};

use crate::{Error, MAX_SYMBOLS, MIN_TABLE_LOG};

const ACCURACY_LOG_RANGE: std::ops::RangeInclusive<u8> = MIN_TABLE_LOG..=15;

#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
struct State(u16);

/// One of the interleaved decoding state machines sharing a table.
pub struct Decoder<'t, const N: usize> {
    state: State,
    table: &'t DecodingTable<N>,
}

impl<'t, const N: usize> Decoder<'t, N> {
    pub fn new(
        table: &'t DecodingTable<N>,
        src: &mut ReverseBitReader,
    ) -> Result<Self, Error> {
        let state = {
            let state = src.read(table.accuracy_log())?;
            State(state as u16)
        };

        Ok(Self { table, state })
    }

    /// Symbol designated by the current state, without advancing.
    #[inline(always)]
    pub fn peek(&self) -> u8 {
        debug_assert!((self.state.0 as usize) < self.table.table().len());
        self.table.entries[self.state.0 as usize].symbol
    }

    #[inline(always)]
    pub fn update(&mut self, src: &mut ReverseBitReader) -> Result<(), Error> {
        debug_assert!((self.state.0 as usize) < self.table.table().len());
        let entry = &self.table.entries[self.state.0 as usize];

        let bits = src.read(entry.n_bits)?;
        self.state = State(entry.baseline + bits as u16);
        Ok(())
    }

    #[inline(always)]
    pub fn decode(&mut self, src: &mut ReverseBitReader) -> Result<u8, Error> {
        let symbol = self.peek();
        self.update(src)?;
        Ok(symbol)
    }

    /// Bits the next update will consume.
    #[inline(always)]
    pub fn bits_required(&self) -> u8 {
        self.table[self.state].n_bits
    }
}

/// Normalized symbol probabilities summing to `1 << accuracy_log`, either
/// read from a compressed table description or taken from one of the
/// predefined distributions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedDistribution<const N: usize> {
    pub(crate) final_counts: [i16; MAX_SYMBOLS],
    pub(crate) symbol_state: [u16; MAX_SYMBOLS],
    pub(crate) symbol_count: usize,
    pub(crate) has_low_prob: bool,
    pub(crate) accuracy_log: u8,
}

impl<const N: usize> NormalizedDistribution<N> {
    pub fn read(src: &mut BitReader) -> Result<Self, Error> {
        assert!(N.is_power_of_two());

        let max_accuracy_log = N.trailing_zeros() as u8;
        let read = src.read(4)? as u8;
        let accuracy_log = MIN_TABLE_LOG + read;

        if accuracy_log > max_accuracy_log {
            return Err(Error::AccuracyLogMismatch(max_accuracy_log, accuracy_log));
        }

        let mut final_counts = [0i16; MAX_SYMBOLS];
        let mut symbol_state = [0u16; MAX_SYMBOLS];

        let mut symbol_idx = 0;
        let mut has_low_prob = false;

        let mut remaining: i32 = 1 << accuracy_log;
        while remaining > 0 {
            if symbol_idx >= MAX_SYMBOLS {
                return Err(Error::TooManySymbols);
            }

            let max_val = remaining + 1;
            let n_bits = (32 - max_val.leading_zeros()) as u8;

            src.ensure_bits(n_bits)?;
            let val = src.peek(n_bits) as i32;
            let mask = (1 << (n_bits - 1)) - 1;
            let threshold = (1 << n_bits) - max_val - 1;
            let small = val & mask;

            let val = if small < threshold {
                src.consume(n_bits - 1);
                small
            } else if val > mask {
                src.consume(n_bits);
                val - threshold
            } else {
                src.consume(n_bits);
                val
            };

            let prob = (val - 1) as i16;

            has_low_prob |= prob == -1;

            let state = if prob == -1 { 1 } else { prob };
            final_counts[symbol_idx] = prob;
            symbol_state[symbol_idx] = state as u16;
            symbol_idx += 1;

            remaining -= state as i32;

            if prob == 0 {
                loop {
                    let skip = src.read(2)? as usize;
                    symbol_idx += skip;
                    if symbol_idx > MAX_SYMBOLS {
                        return Err(Error::TooManySymbols);
                    }
                    if skip != 3 {
                        break;
                    }
                }
            }
        }

        if remaining != 0 {
            return Err(Error::SumMismatch(remaining));
        }

        Ok(NormalizedDistribution {
            final_counts,
            symbol_state,
            symbol_count: symbol_idx,
            has_low_prob,
            accuracy_log,
        })
    }

    pub fn from_predefined(counts: &[i16], accuracy_log: u8) -> Result<Self, Error> {
        if counts.len() > MAX_SYMBOLS {
            return Err(Error::TooManySymbols);
        }

        let mut final_counts = [0i16; MAX_SYMBOLS];
        let mut symbol_state = [0u16; MAX_SYMBOLS];
        let mut has_low_prob = false;

        for (idx, &count) in counts.iter().enumerate() {
            final_counts[idx] = count;
            if count == -1 {
                has_low_prob = true;
                symbol_state[idx] = 1;
            } else {
                symbol_state[idx] = count as u16;
            }
        }

        Ok(Self {
            final_counts,
            symbol_state,
            symbol_count: counts.len(),
            has_low_prob,
            accuracy_log,
        })
    }
}

#[derive(Clone, Copy)]
#[repr(align(4))]
pub struct Entry {
    baseline: u16,
    n_bits: u8,
    symbol: u8,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("baseline", &self.baseline)
            .field("num_bits", &self.n_bits)
            .field("symbol", &self.symbol)
            .finish()
    }
}

const_assert!(std::mem::size_of::<Entry>() == 4);
const_assert!(std::mem::align_of::<Entry>() == 4);

#[repr(align(64))]
#[derive(Debug)]
pub struct DecodingTable<const N: usize> {
    entries: [Entry; N],
    accuracy_log: u8,
}

const_assert!(std::mem::size_of::<DecodingTable<512>>() % 64 == 0);

impl<const N: usize> DecodingTable<N> {
    pub fn read(r: &mut BitReader, count: usize) -> Result<Self, Error> {
        let mut dist = NormalizedDistribution::<N>::read(r)?;
        if r.bytes_consumed() > count {
            return Err(Error::Corruption);
        }
        tracing::debug!(
            accuracy_log = dist.accuracy_log,
            symbols = dist.symbol_count,
            "read FSE table description"
        );

        Self::from_distribution(&mut dist)
    }

    /// Degenerate table that emits `symbol` forever without consuming bits.
    pub fn rle(symbol: u8) -> Self {
        let entries = [Entry {
            symbol,
            n_bits: 0,
            baseline: 0,
        }; N];
        Self {
            entries,
            accuracy_log: 0,
        }
    }

    pub fn from_distribution(
        dist: &mut NormalizedDistribution<N>,
    ) -> Result<Self, Error> {
        assert!(N.is_power_of_two());
        let accuracy_log = dist.accuracy_log;

        if !ACCURACY_LOG_RANGE.contains(&accuracy_log) {
            return Err(Error::InvalidAccuracyLog(accuracy_log));
        }

        let mut entries = [Entry {
            symbol: 0,
            n_bits: 0,
            baseline: 0,
        }; N];

        let table = &mut entries[..1usize << accuracy_log];

        if !dist.has_low_prob {
            Self::spread_symbols(dist, table)?;
        } else {
            Self::spread_symbols_low_prob(dist, table)?;
        }

        Self::finalize_table(table, &mut dist.symbol_state, accuracy_log)?;

        Ok(Self {
            entries,
            accuracy_log,
        })
    }

    fn spread_symbols(
        dist: &NormalizedDistribution<N>,
        table: &mut [Entry],
    ) -> Result<(), Error> {
        let n = table.len();
        let step = (n >> 1) + (n >> 3) + 3;
        let mask = n - 1;

        let mut pos = 0;

        for (sym, &count) in dist.final_counts[..dist.symbol_count].iter().enumerate() {
            if count <= 0 {
                continue;
            }

            let entry = Entry {
                symbol: sym as u8,
                n_bits: 0xFF,
                baseline: 0,
            };

            let mut remaining = count as usize;
            while remaining >= 4 {
                table[pos] = entry;
                table[(pos + step) & mask] = entry;
                table[(pos + step * 2) & mask] = entry;
                table[(pos + step * 3) & mask] = entry;

                pos = (pos + step * 4) & mask;
                remaining -= 4;
            }

            while remaining > 0 {
                table[pos] = entry;
                pos = (pos + step) & mask;
                remaining -= 1;
            }
        }

        if pos != 0 {
            return Err(Error::SpreadAlignment(pos));
        }

        Ok(())
    }

    #[cold]
    fn spread_symbols_low_prob(
        dist: &NormalizedDistribution<N>,
        table: &mut [Entry],
    ) -> Result<(), Error> {
        let n = table.len();
        let step = (n >> 1) + (n >> 3) + 3;
        let mask = n - 1;

        let mut high_threshold = n;

        for (sym, &count) in dist.final_counts[..dist.symbol_count].iter().enumerate() {
            if count == -1 {
                high_threshold -= 1;
                table[high_threshold] = Entry {
                    symbol: sym as u8,
                    n_bits: 0xFF,
                    baseline: 0,
                };
            }
        }

        let mut pos = 0;
        for (sym, &count) in dist.final_counts[..dist.symbol_count].iter().enumerate() {
            if count <= 0 {
                continue;
            }

            for _ in 0..count {
                table[pos] = Entry {
                    symbol: sym as u8,
                    n_bits: 0xFF,
                    baseline: 0,
                };

                pos = (pos + step) & mask;

                while pos >= high_threshold {
                    pos = (pos + step) & mask;
                }
            }
        }

        if pos != 0 {
            return Err(Error::SpreadAlignment(pos));
        }

        Ok(())
    }

    fn finalize_table(
        table: &mut [Entry],
        symbol_state: &mut [u16; MAX_SYMBOLS],
        accuracy_log: u8,
    ) -> Result<(), Error> {
        let n = table.len() as u16;
        for entry in table.iter_mut() {
            if entry.n_bits == 0 {
                return Err(Error::TableUnderfilled);
            }

            let sym_idx = entry.symbol as usize;

            let state = symbol_state[sym_idx];
            if state == 0 {
                return Err(Error::InvalidState);
            }

            symbol_state[sym_idx] += 1;

            let n_bits = (accuracy_log + state.leading_zeros() as u8) - 15;

            entry.n_bits = n_bits;
            entry.baseline = (state << n_bits).wrapping_sub(n);
        }

        Ok(())
    }

    const fn accuracy_log(&self) -> u8 {
        self.accuracy_log
    }

    #[inline(always)]
    pub fn table(&self) -> &[Entry] {
        &self.entries[..1usize << self.accuracy_log]
    }
}

impl<const N: usize> std::ops::Index<State> for DecodingTable<N> {
    type Output = Entry;

    #[inline(always)]
    fn index(&self, index: State) -> &Self::Output {
        debug_assert!((index.0 as usize) < self.table().len());
        &self.entries[index.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_rfc_appendix_a() {
        // RFC 8878 Appendix A: Literal Length Code
        // Accuracy Log = 6 (N=64)
        let counts: [i16; 36] = [
            4, 3, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 2, 1, 1, 1, 2, 2, 2, 2, 2, 2, 2, 2, 2, 3,
            2, 1, 1, 1, 1, 1, -1, -1, -1, -1,
        ];

        let mut dist = NormalizedDistribution::<64>::from_predefined(&counts, 6)
            .expect("predefined distribution is valid");

        let table = DecodingTable::<64>::from_distribution(&mut dist)
            .expect("Table construction failed");

        // State | Symbol | Number_Of_Bits | Base
        let expected = [
            (0, 0, 4, 0),
            (1, 0, 4, 16),
            (2, 1, 5, 32),
            (3, 3, 5, 0),
            (4, 4, 5, 0),
            (5, 6, 5, 0),
        ];

        for (state_idx, sym, nb, base) in expected {
            let entry = table.entries[state_idx];
            assert_eq!(entry.symbol, sym, "State {}: Symbol mismatch", state_idx);
            assert_eq!(entry.n_bits, nb, "State {}: Bits mismatch", state_idx);
            assert_eq!(entry.baseline, base, "State {}: Base mismatch", state_idx);
        }

        // Late states from Appendix A
        let entry_60 = table.entries[60];
        assert_eq!(entry_60.symbol, 35);
        assert_eq!(entry_60.n_bits, 6);
        assert_eq!(entry_60.baseline, 0);

        let entry_63 = table.entries[63];
        assert_eq!(entry_63.symbol, 32);
        assert_eq!(entry_63.n_bits, 6);
        assert_eq!(entry_63.baseline, 0);
    }

    #[test]
    fn test_rle_table() -> Result<(), Error> {
        let table = DecodingTable::<64>::rle(42);

        let data = [0x01];
        let mut r = ReverseBitReader::new(&data)?;
        let mut dec = Decoder::new(&table, &mut r)?;

        for _ in 0..10 {
            assert_eq!(dec.decode(&mut r)?, 42);
        }
        assert_eq!(r.bits_remaining(), 0);
        Ok(())
    }

    #[test]
    fn test_accuracy_log_beyond_table_is_rejected() {
        // accuracy-log field 4 => log 9, too large for a 64-entry table
        let data = [0b0000_0100, 0xFF, 0xFF];
        let mut r = BitReader::new(&data).unwrap();

        assert!(matches!(
            NormalizedDistribution::<64>::read(&mut r),
            Err(Error::AccuracyLogMismatch(6, 9))
        ));
    }

    #[test]
    fn test_truncated_header_is_rejected() {
        // accuracy log 6, counts cut off after the first byte
        let data = [0b0000_0001];
        let mut r = BitReader::new(&data).unwrap();

        assert!(matches!(
            NormalizedDistribution::<64>::read(&mut r),
            Err(Error::IO(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn test_fuzz_distribution_256(
            weights in proptest::collection::vec(1u32..1000, 2..200)
        ) {
            const N: usize = 256;

            let sum: u64 = weights.iter().map(|&x| x as u64).sum();

            let mut counts = [0i16; N];
            let mut current_sum = 0i32;

            for (i, &w) in weights.iter().enumerate() {
                let val = ((w as u64 * N as u64) / sum) as i16;
                counts[i] = val;
                current_sum += val as i32;
            }

            // force the counts to close over the table size exactly
            counts[0] += (N as i32 - current_sum) as i16;
            if counts[0] <= 0 {
                return Ok(());
            }

            let mut dist = NormalizedDistribution::<N>::from_predefined(
                &counts[..weights.len()],
                8,
            )?;

            let _ = DecodingTable::<N>::from_distribution(&mut dist)?;
        }
    }
}
