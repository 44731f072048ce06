use zett_foundation::{highest_bit, min_table_log};
use zett_io::BitWriter;

use crate::{Error, MAX_SYMBOLS, MAX_TABLE_LOG, MIN_TABLE_LOG};

/// Accuracy log that balances table cost against precision for the given
/// input size, clamped to what the format allows.
pub fn optimal_table_log(max_table_log: u8, input_size: usize, max_symbol: u8) -> u8 {
    assert!(input_size > 1, "single-symbol inputs use RLE descriptions");

    let mut result = max_table_log as i32;

    // accuracy beyond the input entropy is wasted
    result = result.min(highest_bit((input_size - 1) as u32) as i32 - 2);
    result = result.max(min_table_log(input_size, max_symbol) as i32);
    result = result.max(MIN_TABLE_LOG as i32);
    result = result.min(MAX_TABLE_LOG as i32);

    result as u8
}

const REST_TO_BEAT: [u64; 8] =
    [0, 473195, 504333, 520860, 550000, 700000, 750000, 830000];

/// Scale raw symbol counts down to probabilities summing to
/// `1 << table_log`. A count of -1 marks a symbol whose true probability is
/// below `1 / table_size` but which must still be representable.
pub fn normalize_counts(
    normalized: &mut [i16; MAX_SYMBOLS],
    table_log: u8,
    counts: &[u32; 256],
    total: usize,
    max_symbol: u8,
) -> Result<(), Error> {
    if !(MIN_TABLE_LOG..=MAX_TABLE_LOG).contains(&table_log) {
        return Err(Error::InvalidAccuracyLog(table_log));
    }

    let scale = 62 - table_log as u32;
    let step = (1u64 << 62) / total as u64;
    let v_step = 1u64 << (scale - 20);

    let mut still_to_distribute: i32 = 1 << table_log;

    let mut largest = 0usize;
    let mut largest_probability: i16 = 0;
    let low_threshold = (total >> table_log) as u32;

    for symbol in 0..=max_symbol as usize {
        let count = counts[symbol];

        if count == 0 {
            normalized[symbol] = 0;
            continue;
        }
        debug_assert!(
            (count as usize) < total,
            "a fully dominant symbol must be RLE-coded by the caller"
        );

        if count <= low_threshold {
            normalized[symbol] = -1;
            still_to_distribute -= 1;
        } else {
            let mut probability = ((count as u64 * step) >> scale) as i16;
            if probability < 8 {
                let rest_to_beat = v_step * REST_TO_BEAT[probability as usize];
                let delta = count as u64 * step - ((probability as u64) << scale);
                if delta > rest_to_beat {
                    probability += 1;
                }
            }

            if probability > largest_probability {
                largest_probability = probability;
                largest = symbol;
            }

            normalized[symbol] = probability;
            still_to_distribute -= probability as i32;
        }
    }

    if -still_to_distribute >= (normalized[largest] >> 1) as i32 {
        // the correction wipes out the dominant symbol; fall back to a
        // slower but robust distribution
        normalize_counts_fallback(normalized, table_log, counts, total, max_symbol)
    } else {
        normalized[largest] += still_to_distribute as i16;
        Ok(())
    }
}

const UNASSIGNED: i16 = -2;

#[cold]
fn normalize_counts_fallback(
    normalized: &mut [i16; MAX_SYMBOLS],
    table_log: u8,
    counts: &[u32; 256],
    total: usize,
    max_symbol: u8,
) -> Result<(), Error> {
    let mut total = total as u64;
    let mut distributed = 0u32;

    let low_threshold = (total >> table_log) as u32;
    let mut low_one = ((total * 3) >> (table_log + 1)) as u32;

    for symbol in 0..=max_symbol as usize {
        let count = counts[symbol];
        if count == 0 {
            normalized[symbol] = 0;
        } else if count <= low_threshold {
            normalized[symbol] = -1;
            distributed += 1;
            total -= count as u64;
        } else if count <= low_one {
            normalized[symbol] = 1;
            distributed += 1;
            total -= count as u64;
        } else {
            normalized[symbol] = UNASSIGNED;
        }
    }

    let table_size = 1u32 << table_log;
    let mut normalization_factor = table_size - distributed;

    if normalization_factor > 0 && (total / normalization_factor as u64) > low_one as u64
    {
        // risk of rounding the mid-range symbols to zero
        low_one = ((total * 3) / (normalization_factor as u64 * 2)) as u32;
        for symbol in 0..=max_symbol as usize {
            if normalized[symbol] == UNASSIGNED && counts[symbol] <= low_one {
                normalized[symbol] = 1;
                distributed += 1;
                total -= counts[symbol] as u64;
            }
        }
        normalization_factor = table_size - distributed;
    }

    if distributed as usize == max_symbol as usize + 1 {
        // all symbols are rare; hand every remaining slot to the largest
        let mut max_value = 0usize;
        let mut max_count = 0u32;
        for symbol in 0..=max_symbol as usize {
            if counts[symbol] > max_count {
                max_value = symbol;
                max_count = counts[symbol];
            }
        }
        normalized[max_value] += normalization_factor as i16;
        return Ok(());
    }

    if total == 0 {
        // spread the leftover slots round-robin over present symbols
        let mut symbol = 0usize;
        while normalization_factor > 0 {
            if normalized[symbol] > 0 {
                normalization_factor -= 1;
                normalized[symbol] += 1;
            }
            symbol = (symbol + 1) % (max_symbol as usize + 1);
        }
        return Ok(());
    }

    let v_step_log = 62 - table_log as u64;
    let mid = (1u64 << (v_step_log - 1)) - 1;
    let r_step = ((1u64 << v_step_log) * normalization_factor as u64 + mid) / total;
    let mut tmp_total = mid;

    for symbol in 0..=max_symbol as usize {
        if normalized[symbol] == UNASSIGNED {
            let end = tmp_total + counts[symbol] as u64 * r_step;
            let s_start = (tmp_total >> v_step_log) as u32;
            let s_end = (end >> v_step_log) as u32;
            let weight = s_end - s_start;

            if weight < 1 {
                return Err(Error::InvalidDistribution);
            }
            normalized[symbol] = weight as i16;
            tmp_total = end;
        }
    }

    Ok(())
}

/// Serialize normalized counts as the variable-bit-width table description
/// the decoder's [`crate::NormalizedDistribution::read`] consumes.
pub fn write_normalized_counts(
    dst: &mut [u8],
    normalized: &[i16; MAX_SYMBOLS],
    max_symbol: u8,
    table_log: u8,
) -> Result<usize, Error> {
    if !(MIN_TABLE_LOG..=MAX_TABLE_LOG).contains(&table_log) {
        return Err(Error::InvalidAccuracyLog(table_log));
    }

    let mut w = BitWriter::new(dst);

    let table_size = 1i32 << table_log;

    w.put((table_log - MIN_TABLE_LOG) as u64, 4);

    let mut remaining = table_size + 1; // +1 for the low-probability slack
    let mut threshold = table_size;
    let mut table_bit_count = table_log + 1;
    let mut symbol = 0usize;
    let mut previous_is_zero = false;

    while remaining > 1 {
        if previous_is_zero {
            let start = symbol;
            while symbol < MAX_SYMBOLS && normalized[symbol] == 0 {
                symbol += 1;
            }
            if symbol == MAX_SYMBOLS {
                return Err(Error::SumMismatch(remaining));
            }

            let mut zeros = symbol - start;
            while zeros >= 24 {
                w.put(0xFFFF, 16);
                w.flush()?;
                zeros -= 24;
            }
            while zeros >= 3 {
                w.put(0b11, 2);
                zeros -= 3;
            }
            w.put(zeros as u64, 2);
            w.flush()?;
        }

        if symbol > max_symbol as usize {
            return Err(Error::SumMismatch(remaining));
        }

        let count = normalized[symbol] as i32;
        symbol += 1;

        let max = (2 * threshold - 1) - remaining;
        remaining -= count.abs();

        // 0 encodes the below-1 probability, so everything shifts up by one
        let mut count = count + 1;
        if count >= threshold {
            count += max;
        }

        w.put(count as u64, table_bit_count - (count < max) as u8);
        w.flush()?;

        previous_is_zero = count == 1;

        if remaining < 1 {
            return Err(Error::SumMismatch(remaining));
        }
        while remaining < threshold {
            table_bit_count -= 1;
            threshold >>= 1;
        }
    }

    Ok(w.finish_padded()?)
}

/// FSE encoding table: per-symbol transformation deltas plus the shared
/// next-state table, mirrored from the layout of the decoding side.
pub struct CompressionTable {
    next_state: Box<[u16]>,
    delta_number_of_bits: Box<[i32]>,
    delta_find_state: Box<[i32]>,
    log2_size: u8,
}

impl CompressionTable {
    pub fn new(max_table_log: u8, max_symbol: u8) -> Self {
        assert!(max_table_log <= MAX_TABLE_LOG);
        Self {
            next_state: vec![0; 1 << max_table_log].into_boxed_slice(),
            delta_number_of_bits: vec![0; max_symbol as usize + 1].into_boxed_slice(),
            delta_find_state: vec![0; max_symbol as usize + 1].into_boxed_slice(),
            log2_size: 0,
        }
    }

    pub fn initialize(
        &mut self,
        normalized: &[i16; MAX_SYMBOLS],
        max_symbol: u8,
        table_log: u8,
    ) -> Result<(), Error> {
        let table_size = 1usize << table_log;
        assert!(table_size <= self.next_state.len());

        self.log2_size = table_log;

        let mut table = vec![0u8; table_size];
        let mut cumulative = [0i32; MAX_SYMBOLS + 2];
        let mut high_threshold = table_size - 1;

        for symbol in 0..=max_symbol as usize {
            if normalized[symbol] == -1 {
                cumulative[symbol + 1] = cumulative[symbol] + 1;
                table[high_threshold] = symbol as u8;
                high_threshold = high_threshold
                    .checked_sub(1)
                    .ok_or(Error::InvalidDistribution)?;
            } else {
                cumulative[symbol + 1] = cumulative[symbol] + normalized[symbol] as i32;
            }
        }
        cumulative[max_symbol as usize + 1] = table_size as i32 + 1;

        let position = Self::spread_symbols(
            normalized,
            max_symbol,
            table_size,
            high_threshold,
            &mut table,
        );
        if position != 0 {
            return Err(Error::SpreadAlignment(position));
        }

        for (idx, &symbol) in table.iter().enumerate() {
            let cumul = &mut cumulative[symbol as usize];
            self.next_state[*cumul as usize] = (table_size + idx) as u16;
            *cumul += 1;
        }

        let mut total = 0i32;
        for symbol in 0..=max_symbol as usize {
            match normalized[symbol] {
                0 => {
                    self.delta_number_of_bits[symbol] =
                        ((table_log as i32 + 1) << 16) - table_size as i32;
                }
                -1 | 1 => {
                    self.delta_number_of_bits[symbol] =
                        ((table_log as i32) << 16) - table_size as i32;
                    self.delta_find_state[symbol] = total - 1;
                    total += 1;
                }
                count => {
                    let count = count as i32;
                    let max_bits_out =
                        table_log as i32 - highest_bit(count as u32 - 1) as i32;
                    let min_state_plus = count << max_bits_out;
                    self.delta_number_of_bits[symbol] =
                        (max_bits_out << 16) - min_state_plus;
                    self.delta_find_state[symbol] = total - count;
                    total += count;
                }
            }
        }

        Ok(())
    }

    /// Degenerate single-symbol table matching [`crate::DecodingTable::rle`].
    pub fn initialize_rle(&mut self, symbol: u8) {
        self.log2_size = 0;
        self.next_state[0] = 0;
        self.delta_number_of_bits[symbol as usize] = 0;
        self.delta_find_state[symbol as usize] = 0;
    }

    fn spread_symbols(
        normalized: &[i16; MAX_SYMBOLS],
        max_symbol: u8,
        table_size: usize,
        high_threshold: usize,
        table: &mut [u8],
    ) -> usize {
        let step = (table_size >> 1) + (table_size >> 3) + 3;
        let mask = table_size - 1;

        let mut position = 0usize;
        for symbol in 0..=max_symbol as usize {
            for _ in 0..normalized[symbol].max(0) {
                table[position] = symbol as u8;
                position = (position + step) & mask;
                while position > high_threshold {
                    position = (position + step) & mask;
                }
            }
        }

        position
    }

    pub const fn log2_size(&self) -> u8 {
        self.log2_size
    }
}

/// One of the interleaved encoding state machines sharing a table. The
/// mirror image of [`crate::Decoder`]: symbols are fed in back to front and
/// the final state lands in front of the bits that reconstruct it.
pub struct Encoder<'t> {
    table: &'t CompressionTable,
    state: u32,
}

impl<'t> Encoder<'t> {
    /// Start a state machine on the symbol that will be decoded last.
    pub fn begin(table: &'t CompressionTable, symbol: u8) -> Self {
        let delta_nb = table.delta_number_of_bits[symbol as usize];
        let output_bits = ((delta_nb + (1 << 15)) >> 16) as u32;
        let base = (((output_bits as i32) << 16) - delta_nb) as u32 >> output_bits;

        let idx = base as i32 + table.delta_find_state[symbol as usize];
        let state = table.next_state[idx as usize] as u32;

        Self { table, state }
    }

    #[inline(always)]
    pub fn encode(&mut self, w: &mut BitWriter, symbol: u8) {
        let delta_nb = self.table.delta_number_of_bits[symbol as usize];
        let output_bits = ((self.state as i32 + delta_nb) >> 16) as u32;

        w.put(self.state as u64, output_bits as u8);

        let idx = (self.state >> output_bits) as i32
            + self.table.delta_find_state[symbol as usize];
        self.state = self.table.next_state[idx as usize] as u32;
    }

    /// Flush the final state; the decoder reads it as its initial state.
    pub fn finish(self, w: &mut BitWriter) {
        w.put(self.state as u64, self.table.log2_size);
    }
}

/// FSE-compress a byte stream with two interleaved states. Returns 0 when
/// the input is too small or the output would not fit, in which case the
/// caller falls back to a raw representation.
pub fn compress(
    dst: &mut [u8],
    src: &[u8],
    table: &CompressionTable,
) -> Result<usize, Error> {
    if src.len() <= 2 {
        return Ok(0);
    }

    let mut w = BitWriter::new(dst);
    let mut idx = src.len();

    // even indices ride state 1, odd indices state 2; the decoder drains
    // them in the same alternation
    let (mut state1, mut state2);
    if src.len() % 2 != 0 {
        idx -= 1;
        state1 = Encoder::begin(table, src[idx]);
        idx -= 1;
        state2 = Encoder::begin(table, src[idx]);
        idx -= 1;
        state1.encode(&mut w, src[idx]);
    } else {
        idx -= 1;
        state2 = Encoder::begin(table, src[idx]);
        idx -= 1;
        state1 = Encoder::begin(table, src[idx]);
    }

    match w.flush() {
        Ok(()) => {}
        Err(zett_io::Error::NotEnoughSpace { .. }) => return Ok(0),
        Err(e) => return Err(e.into()),
    }

    while idx >= 2 {
        idx -= 1;
        state2.encode(&mut w, src[idx]);
        idx -= 1;
        state1.encode(&mut w, src[idx]);

        match w.flush() {
            Ok(()) => {}
            Err(zett_io::Error::NotEnoughSpace { .. }) => return Ok(0),
            Err(e) => return Err(e.into()),
        }
    }
    debug_assert_eq!(idx, 0);

    state2.finish(&mut w);
    state1.finish(&mut w);

    match w.finish_with_mark() {
        Ok(written) => Ok(written),
        Err(zett_io::Error::NotEnoughSpace { .. }) => Ok(0),
        Err(e) => Err(e.into()),
    }
}
