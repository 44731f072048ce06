use super::parameters::CompressionParameters;
use super::store::SequenceStore;

const MIN_MATCH: usize = 3;
const SEARCH_STRENGTH: usize = 8;
/// Distance between a wire offset code and the raw distance: the three
/// repeat codes sit below, and the store adds its own +1.
const REP_MOVE: u32 = 2;

const PRIME_4: u32 = 2654435761;
const PRIME_5: u64 = 889523592379;
const PRIME_6: u64 = 227718039650203;
const PRIME_7: u64 = 58295818150454627;
const PRIME_8: u64 = 0xCF1B_BCDC_B7A5_6463;

/// The two most recent match distances, with a pending pair that only
/// becomes visible once the block is actually emitted as compressed. A
/// raw fallback discards the pending state, keeping the encoder's view in
/// lockstep with what the decoder will have replayed.
pub(crate) struct RepeatedOffsets {
    offset0: u32,
    offset1: u32,
    pending0: u32,
    pending1: u32,
}

impl RepeatedOffsets {
    pub fn new() -> Self {
        Self {
            offset0: 1,
            offset1: 4,
            pending0: 1,
            pending1: 4,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn offset0(&self) -> u32 {
        self.offset0
    }

    pub fn offset1(&self) -> u32 {
        self.offset1
    }

    pub fn save_pending(&mut self, offset0: u32, offset1: u32) {
        self.pending0 = offset0;
        self.pending1 = offset1;
    }

    pub fn commit(&mut self) {
        self.offset0 = self.pending0;
        self.offset1 = self.pending1;
    }
}

/// Hash tables of the double-fast matcher. Positions are absolute offsets
/// into the frame's input, so matches may reach back into earlier blocks;
/// `window_base` fences them to the declared window.
pub(crate) struct BlockCompressionState {
    long_hash_table: Vec<u32>,
    short_hash_table: Vec<u32>,
    window_base: usize,
    long_hash_bits: u8,
    short_hash_bits: u8,
}

impl BlockCompressionState {
    pub fn new() -> Self {
        Self {
            long_hash_table: Vec::new(),
            short_hash_table: Vec::new(),
            window_base: 0,
            long_hash_bits: 0,
            short_hash_bits: 0,
        }
    }

    pub fn reset(&mut self, params: &CompressionParameters) {
        self.long_hash_bits = params.hash_log;
        self.short_hash_bits = params.chain_log;

        self.long_hash_table.clear();
        self.long_hash_table.resize(1 << params.hash_log, 0);
        self.short_hash_table.clear();
        self.short_hash_table.resize(1 << params.chain_log, 0);

        self.window_base = 0;
    }

    pub fn enforce_max_distance(&mut self, input_limit: usize, max_distance: usize) {
        let lowest_valid = input_limit.saturating_sub(max_distance);
        if self.window_base < lowest_valid {
            self.window_base = lowest_valid;
        }
    }
}

#[inline(always)]
fn read4(src: &[u8], pos: usize) -> u32 {
    u32::from_le_bytes(
        src[pos..pos + 4]
            .try_into()
            .expect("slice length is guaranteed to be 4"),
    )
}

#[inline(always)]
fn read8(src: &[u8], pos: usize) -> u64 {
    u64::from_le_bytes(
        src[pos..pos + 8]
            .try_into()
            .expect("slice length is guaranteed to be 8"),
    )
}

#[inline(always)]
fn hash8(value: u64, bits: u8) -> usize {
    (value.wrapping_mul(PRIME_8) >> (64 - bits)) as usize
}

#[inline(always)]
fn hash_short(value: u64, bits: u8, length: usize) -> usize {
    match length {
        5 => ((value << 24).wrapping_mul(PRIME_5) >> (64 - bits)) as usize,
        6 => ((value << 16).wrapping_mul(PRIME_6) >> (64 - bits)) as usize,
        7 => ((value << 8).wrapping_mul(PRIME_7) >> (64 - bits)) as usize,
        8 => hash8(value, bits),
        _ => ((value as u32).wrapping_mul(PRIME_4) >> (32 - bits)) as usize,
    }
}

/// Matching bytes between `src[front..limit]` and the earlier run at
/// `back`.
#[inline(always)]
fn count_matching(src: &[u8], front: usize, limit: usize, back: usize) -> usize {
    let mut f = front;
    let mut b = back;

    while f + 8 <= limit {
        let diff = read8(src, f) ^ read8(src, b);
        if diff != 0 {
            return f - front + (diff.trailing_zeros() / 8) as usize;
        }
        f += 8;
        b += 8;
    }

    while f < limit && src[f] == src[b] {
        f += 1;
        b += 1;
    }

    f - front
}

/// Greedy double-fast match search over one block: an 8-byte hash table
/// for long matches, a `search_length`-byte table for short ones, with a
/// repeated-offset probe at every position and after every match.
/// Sequences land in `store`; the size of the literal tail is returned.
pub(crate) fn compress_block(
    src: &[u8],
    block_start: usize,
    block_size: usize,
    store: &mut SequenceStore,
    state: &mut BlockCompressionState,
    offsets: &mut RepeatedOffsets,
    params: &CompressionParameters,
) -> usize {
    let search_length = (params.search_length as usize).clamp(4, 8);
    let long_bits = state.long_hash_bits;
    let short_bits = state.short_hash_bits;
    let window_base = state.window_base;

    let input_end = block_start + block_size;
    let input_limit = input_end.saturating_sub(8);

    let mut input = block_start;
    let mut anchor = block_start;

    let mut offset1 = offsets.offset0() as usize;
    let mut offset2 = offsets.offset1() as usize;
    let mut saved_offset = 0usize;

    if input == window_base {
        // position 0 doubles as the empty hash slot
        input += 1;
    }
    let max_rep = input - window_base;
    if offset2 > max_rep {
        saved_offset = offset2;
        offset2 = 0;
    }
    if offset1 > max_rep {
        saved_offset = offset1;
        offset1 = 0;
    }

    while input < input_limit {
        let current = input;

        let short_hash = hash_short(read8(src, input), short_bits, search_length);
        let short_match = state.short_hash_table[short_hash] as usize;
        let long_hash = hash8(read8(src, input), long_bits);
        let long_match = state.long_hash_table[long_hash] as usize;

        state.long_hash_table[long_hash] = input as u32;
        state.short_hash_table[short_hash] = input as u32;

        let match_length;

        if offset1 > 0 && read4(src, input + 1 - offset1) == read4(src, input + 1) {
            // repeated-offset match one position ahead
            match_length =
                count_matching(src, input + 1 + 4, input_end, input + 1 + 4 - offset1)
                    + 4;
            input += 1;
            store.store_sequence(
                &src[anchor..input],
                0,
                (match_length - MIN_MATCH) as u32,
            );
        } else {
            let offset;

            if long_match > window_base && read8(src, long_match) == read8(src, input) {
                match_length =
                    count_matching(src, input + 8, input_end, long_match + 8) + 8;
                offset = input - long_match;

                let (new_input, extra) =
                    extend_backward(src, input, long_match, anchor, window_base);
                input = new_input;
                let match_length = match_length + extra;

                offset2 = offset1;
                offset1 = offset;
                store.store_sequence(
                    &src[anchor..input],
                    offset as u32 + REP_MOVE,
                    (match_length - MIN_MATCH) as u32,
                );
                input += match_length;
                anchor = input;
                probe_repeats(
                    src,
                    &mut input,
                    &mut anchor,
                    input_limit,
                    input_end,
                    current,
                    &mut offset1,
                    &mut offset2,
                    store,
                    state,
                    search_length,
                );
                continue;
            }

            if short_match > window_base && read4(src, short_match) == read4(src, input)
            {
                // a long match one position ahead beats the short match
                let next_hash = hash8(read8(src, input + 1), long_bits);
                let next_match = state.long_hash_table[next_hash] as usize;
                state.long_hash_table[next_hash] = (input + 1) as u32;

                let matched;
                if next_match > window_base
                    && read8(src, next_match) == read8(src, input + 1)
                {
                    matched = next_match;
                    input += 1;
                    match_length =
                        count_matching(src, input + 8, input_end, matched + 8) + 8;
                } else {
                    matched = short_match;
                    match_length =
                        count_matching(src, input + 4, input_end, matched + 4) + 4;
                }
                offset = input - matched;

                let (new_input, extra) =
                    extend_backward(src, input, matched, anchor, window_base);
                input = new_input;
                let match_length = match_length + extra;

                offset2 = offset1;
                offset1 = offset;
                store.store_sequence(
                    &src[anchor..input],
                    offset as u32 + REP_MOVE,
                    (match_length - MIN_MATCH) as u32,
                );
                input += match_length;
                anchor = input;
                probe_repeats(
                    src,
                    &mut input,
                    &mut anchor,
                    input_limit,
                    input_end,
                    current,
                    &mut offset1,
                    &mut offset2,
                    store,
                    state,
                    search_length,
                );
                continue;
            }

            // nothing here; skip ahead faster the longer we find nothing
            input += ((input - anchor) >> SEARCH_STRENGTH) + 1;
            continue;
        }

        input += match_length;
        anchor = input;
        probe_repeats(
            src,
            &mut input,
            &mut anchor,
            input_limit,
            input_end,
            current,
            &mut offset1,
            &mut offset2,
            store,
            state,
            search_length,
        );
    }

    offsets.save_pending(
        if offset1 != 0 { offset1 } else { saved_offset } as u32,
        if offset2 != 0 { offset2 } else { saved_offset } as u32,
    );

    input_end - anchor
}

/// Walk a fresh match backward while its predecessor bytes also match.
#[inline(always)]
fn extend_backward(
    src: &[u8],
    mut input: usize,
    mut matched: usize,
    anchor: usize,
    window_base: usize,
) -> (usize, usize) {
    let mut extra = 0;
    while input > anchor && matched > window_base && src[input - 1] == src[matched - 1] {
        input -= 1;
        matched -= 1;
        extra += 1;
    }
    (input, extra)
}

/// After a match: refresh the hash tables around it, then greedily take
/// immediate matches against the second repeated offset.
#[allow(clippy::too_many_arguments)]
#[inline(always)]
fn probe_repeats(
    src: &[u8],
    input: &mut usize,
    anchor: &mut usize,
    input_limit: usize,
    input_end: usize,
    current: usize,
    offset1: &mut usize,
    offset2: &mut usize,
    store: &mut SequenceStore,
    state: &mut BlockCompressionState,
    search_length: usize,
) {
    if *input > input_limit {
        return;
    }

    let long_bits = state.long_hash_bits;
    let short_bits = state.short_hash_bits;

    state.long_hash_table[hash8(read8(src, current + 2), long_bits)] =
        (current + 2) as u32;
    state.short_hash_table[hash_short(read8(src, current + 2), short_bits, search_length)] =
        (current + 2) as u32;
    state.long_hash_table[hash8(read8(src, *input - 2), long_bits)] =
        (*input - 2) as u32;
    state.short_hash_table[hash_short(read8(src, *input - 2), short_bits, search_length)] =
        (*input - 2) as u32;

    while *input <= input_limit
        && *offset2 > 0
        && read4(src, *input) == read4(src, *input - *offset2)
    {
        let rep_length = count_matching(src, *input + 4, input_end, *input + 4 - *offset2) + 4;

        // the match ran against what the decoder will see as rep1, which
        // its zero-literals bias then swaps to the front
        std::mem::swap(offset1, offset2);

        state.short_hash_table
            [hash_short(read8(src, *input), short_bits, search_length)] = *input as u32;
        state.long_hash_table[hash8(read8(src, *input), long_bits)] = *input as u32;

        store.store_sequence(&[], 0, (rep_length - MIN_MATCH) as u32);
        *input += rep_length;
        *anchor = *input;
    }
}
