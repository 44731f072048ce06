use zett_foundation::{highest_bit, min_table_log, Histogram};
use zett_io::BitWriter;

use crate::errors::Error;
use crate::{MAX_SYMBOL_COUNT, MAX_TABLE_LOG};

const MAX_FSE_TABLE_LOG: u8 = 6;

/// Leaves and internal nodes of the Huffman tree under construction.
/// Leaves occupy the first `MAX_SYMBOL_COUNT` slots sorted by descending
/// count; internal nodes grow upward from `MAX_SYMBOL_COUNT`.
struct NodeTable {
    count: [u32; 2 * MAX_SYMBOL_COUNT],
    parents: [u16; 2 * MAX_SYMBOL_COUNT],
    symbols: [u16; 2 * MAX_SYMBOL_COUNT],
    number_of_bits: [u8; 2 * MAX_SYMBOL_COUNT],
}

impl NodeTable {
    fn new() -> Self {
        Self {
            count: [0; 2 * MAX_SYMBOL_COUNT],
            parents: [0; 2 * MAX_SYMBOL_COUNT],
            symbols: [0; 2 * MAX_SYMBOL_COUNT],
            number_of_bits: [0; 2 * MAX_SYMBOL_COUNT],
        }
    }

    fn reset(&mut self) {
        self.count.fill(0);
        self.parents.fill(0);
        self.symbols.fill(0);
        self.number_of_bits.fill(0);
    }

    fn copy_node(&mut self, from: usize, to: usize) {
        self.count[to] = self.count[from];
        self.parents[to] = self.parents[from];
        self.symbols[to] = self.symbols[from];
        self.number_of_bits[to] = self.number_of_bits[from];
    }
}

/// Scratch state shared by table construction and serialization, owned by
/// the compressor so blocks reuse the allocations.
pub struct Workspace {
    node_table: NodeTable,
    entries_per_rank: [u16; (MAX_TABLE_LOG + 1) as usize],
    values_per_rank: [u16; (MAX_TABLE_LOG + 1) as usize],
    rank_last: [i32; (MAX_TABLE_LOG + 2) as usize],
    weights: [u8; MAX_SYMBOL_COUNT],
    counts: [u32; 256],
    normalized: [i16; 256],
    fse_table: zett_fse::CompressionTable,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            node_table: NodeTable::new(),
            entries_per_rank: [0; (MAX_TABLE_LOG + 1) as usize],
            values_per_rank: [0; (MAX_TABLE_LOG + 1) as usize],
            rank_last: [0; (MAX_TABLE_LOG + 2) as usize],
            weights: [0; MAX_SYMBOL_COUNT],
            counts: [0; 256],
            normalized: [0; 256],
            fse_table: zett_fse::CompressionTable::new(MAX_FSE_TABLE_LOG, MAX_TABLE_LOG),
        }
    }

    fn reset(&mut self) {
        self.node_table.reset();
        self.entries_per_rank.fill(0);
        self.values_per_rank.fill(0);
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical Huffman code book: per-symbol code value and length.
pub struct CompressionTable {
    values: [u16; MAX_SYMBOL_COUNT],
    number_of_bits: [u8; MAX_SYMBOL_COUNT],
    max_symbol: u8,
    max_number_of_bits: u8,
}

impl CompressionTable {
    pub fn new() -> Self {
        Self {
            values: [0; MAX_SYMBOL_COUNT],
            number_of_bits: [0; MAX_SYMBOL_COUNT],
            max_symbol: 0,
            max_number_of_bits: 0,
        }
    }

    /// Code-length ceiling worth using for the given input, inside the
    /// absolute format limits.
    pub fn optimal_number_of_bits(
        max_number_of_bits: u8,
        input_size: usize,
        max_symbol: u8,
    ) -> u8 {
        assert!(input_size > 1, "single-symbol inputs are RLE territory");

        let mut result = max_number_of_bits as i32;

        result = result.min(highest_bit((input_size - 1) as u32) as i32 - 1);
        result = result.max(min_table_log(input_size, max_symbol) as i32);
        result = result.max(zett_fse::MIN_TABLE_LOG as i32);
        result = result.min(MAX_TABLE_LOG as i32);

        result as u8
    }

    pub fn initialize(
        &mut self,
        counts: &[u32; 256],
        max_symbol: u8,
        max_number_of_bits: u8,
        workspace: &mut Workspace,
    ) -> Result<(), Error> {
        workspace.reset();

        let last_non_zero =
            Self::build_tree(&mut workspace.node_table, counts, max_symbol);

        let max_number_of_bits = Self::set_max_height(
            &mut workspace.node_table,
            last_non_zero,
            max_number_of_bits,
            &mut workspace.rank_last,
        );
        if max_number_of_bits > MAX_TABLE_LOG {
            return Err(Error::TableOverflow);
        }

        self.values.fill(0);
        self.number_of_bits.fill(0);

        let nodes = &workspace.node_table;
        let symbol_count = max_symbol as usize + 1;
        for node in 0..symbol_count {
            let symbol = nodes.symbols[node] as usize;
            self.number_of_bits[symbol] = nodes.number_of_bits[node];
        }

        let entries_per_rank = &mut workspace.entries_per_rank;
        let values_per_rank = &mut workspace.values_per_rank;

        for node in 0..=last_non_zero {
            entries_per_rank[nodes.number_of_bits[node] as usize] += 1;
        }

        // starting code value per rank; moving to a shorter rank halves
        // the rolling value
        let mut starting_value = 0u16;
        for rank in (1..=max_number_of_bits as usize).rev() {
            values_per_rank[rank] = starting_value;
            starting_value += entries_per_rank[rank];
            starting_value >>= 1;
        }

        for symbol in 0..symbol_count {
            let rank = self.number_of_bits[symbol] as usize;
            self.values[symbol] = values_per_rank[rank];
            values_per_rank[rank] += 1;
        }

        self.max_symbol = max_symbol;
        self.max_number_of_bits = max_number_of_bits;

        Ok(())
    }

    fn build_tree(nodes: &mut NodeTable, counts: &[u32; 256], max_symbol: u8) -> usize {
        // leaves sorted by descending count, ascending symbol on ties
        let mut current = 0usize;
        for symbol in 0..=max_symbol as usize {
            let count = counts[symbol];

            let mut position = current;
            while position > 0 && count > nodes.count[position - 1] {
                nodes.copy_node(position - 1, position);
                position -= 1;
            }

            nodes.count[position] = count;
            nodes.symbols[position] = symbol as u16;
            current += 1;
        }

        let mut last_non_zero = max_symbol as usize;
        while nodes.count[last_non_zero] == 0 {
            last_non_zero -= 1;
        }
        debug_assert!(last_non_zero >= 1, "a one-symbol alphabet cannot be coded");

        let non_leaf_start = MAX_SYMBOL_COUNT;
        let mut current = non_leaf_start;
        let mut current_leaf = last_non_zero as i32;

        // the two smallest leaves seed the first internal node
        let mut current_non_leaf = current;
        nodes.count[current] = nodes.count[current_leaf as usize]
            + nodes.count[current_leaf as usize - 1];
        nodes.parents[current_leaf as usize] = current as u16;
        nodes.parents[current_leaf as usize - 1] = current as u16;
        current += 1;
        current_leaf -= 2;

        let root = MAX_SYMBOL_COUNT + last_non_zero - 1;

        for n in current..=root {
            nodes.count[n] = 1 << 30;
        }

        while current <= root {
            let child1 = if current_leaf >= 0
                && nodes.count[current_leaf as usize] < nodes.count[current_non_leaf]
            {
                let child = current_leaf as usize;
                current_leaf -= 1;
                child
            } else {
                let child = current_non_leaf;
                current_non_leaf += 1;
                child
            };

            let child2 = if current_leaf >= 0
                && nodes.count[current_leaf as usize] < nodes.count[current_non_leaf]
            {
                let child = current_leaf as usize;
                current_leaf -= 1;
                child
            } else {
                let child = current_non_leaf;
                current_non_leaf += 1;
                child
            };

            nodes.count[current] = nodes.count[child1] + nodes.count[child2];
            nodes.parents[child1] = current as u16;
            nodes.parents[child2] = current as u16;
            current += 1;
        }

        nodes.number_of_bits[root] = 0;
        for n in (non_leaf_start..root).rev() {
            nodes.number_of_bits[n] =
                nodes.number_of_bits[nodes.parents[n] as usize] + 1;
        }
        for n in 0..=last_non_zero {
            nodes.number_of_bits[n] =
                nodes.number_of_bits[nodes.parents[n] as usize] + 1;
        }

        last_non_zero
    }

    // Depth-limited rebalancing: clip over-deep leaves, then repay the
    // accumulated cost by deepening shallower leaves, preferring leaves
    // whose doubled count still undercuts the clipped leaf's count.
    // http://fastcompression.blogspot.com/2015/07/huffman-revisited-part-3-depth-limited.html
    fn set_max_height(
        nodes: &mut NodeTable,
        last_non_zero: usize,
        max_number_of_bits: u8,
        rank_last: &mut [i32; (MAX_TABLE_LOG + 2) as usize],
    ) -> u8 {
        let largest_bits = nodes.number_of_bits[last_non_zero];

        if largest_bits <= max_number_of_bits {
            return largest_bits;
        }

        let mut total_cost: i32 = 0;
        let base_cost: i32 = 1 << (largest_bits - max_number_of_bits);
        let mut n = last_non_zero as i32;

        while nodes.number_of_bits[n as usize] > max_number_of_bits {
            total_cost +=
                base_cost - (1 << (largest_bits - nodes.number_of_bits[n as usize]));
            nodes.number_of_bits[n as usize] = max_number_of_bits;
            n -= 1;
        }

        while nodes.number_of_bits[n as usize] == max_number_of_bits {
            n -= 1;
        }

        total_cost >>= largest_bits - max_number_of_bits;

        const NO_SYMBOL: i32 = -1;
        rank_last.fill(NO_SYMBOL);

        // position of the last (smallest) leaf per rank
        let mut current_nb_bits = max_number_of_bits;
        let mut pos = n;
        while pos >= 0 {
            if nodes.number_of_bits[pos as usize] < current_nb_bits {
                current_nb_bits = nodes.number_of_bits[pos as usize];
                rank_last[(max_number_of_bits - current_nb_bits) as usize] = pos;
            }
            pos -= 1;
        }

        while total_cost > 0 {
            let mut bits_to_decrease = highest_bit(total_cost as u32) as usize + 1;

            while bits_to_decrease > 1 {
                let high_position = rank_last[bits_to_decrease];
                let low_position = rank_last[bits_to_decrease - 1];

                if high_position == NO_SYMBOL {
                    bits_to_decrease -= 1;
                    continue;
                }
                if low_position == NO_SYMBOL {
                    break;
                }

                let high_total = nodes.count[high_position as usize];
                let low_total = 2 * nodes.count[low_position as usize];
                if high_total <= low_total {
                    break;
                }
                bits_to_decrease -= 1;
            }

            // no rank-1 repayment left; find the closest occupied rank
            while bits_to_decrease <= MAX_TABLE_LOG as usize
                && rank_last[bits_to_decrease] == NO_SYMBOL
            {
                bits_to_decrease += 1;
            }

            total_cost -= 1 << (bits_to_decrease - 1);
            if rank_last[bits_to_decrease - 1] == NO_SYMBOL {
                rank_last[bits_to_decrease - 1] = rank_last[bits_to_decrease];
            }

            nodes.number_of_bits[rank_last[bits_to_decrease] as usize] += 1;

            if rank_last[bits_to_decrease] == 0 {
                // reached the largest leaf
                rank_last[bits_to_decrease] = NO_SYMBOL;
            } else {
                rank_last[bits_to_decrease] -= 1;
                if nodes.number_of_bits[rank_last[bits_to_decrease] as usize]
                    != max_number_of_bits - bits_to_decrease as u8
                {
                    rank_last[bits_to_decrease] = NO_SYMBOL;
                }
            }
        }

        while total_cost < 0 {
            // cost correction overshot
            if rank_last[1] == NO_SYMBOL {
                while nodes.number_of_bits[n as usize] == max_number_of_bits {
                    n -= 1;
                }
                nodes.number_of_bits[(n + 1) as usize] -= 1;
                rank_last[1] = n + 1;
                total_cost += 1;
                continue;
            }

            nodes.number_of_bits[(rank_last[1] + 1) as usize] -= 1;
            rank_last[1] += 1;
            total_cost += 1;
        }

        max_number_of_bits
    }

    #[inline(always)]
    pub fn encode_symbol(&self, w: &mut BitWriter, symbol: u8) {
        w.put(
            self.values[symbol as usize] as u64,
            self.number_of_bits[symbol as usize],
        );
    }

    /// Serialize the table: FSE-compressed weights when that pays off,
    /// raw 4-bit nibbles with an implicit final weight otherwise.
    pub fn write(&self, dst: &mut [u8], workspace: &mut Workspace) -> Result<usize, Error> {
        let max_number_of_bits = self.max_number_of_bits;
        let max_symbol = self.max_symbol as usize;

        let Workspace {
            weights,
            counts,
            normalized,
            fse_table,
            ..
        } = workspace;

        for symbol in 0..max_symbol {
            let bits = self.number_of_bits[symbol];
            weights[symbol] = if bits == 0 {
                0
            } else {
                max_number_of_bits + 1 - bits
            };
        }

        if dst.is_empty() {
            return Err(Error::IO(zett_io::Error::NotEnoughSpace {
                needed: 1,
                available: 0,
            }));
        }

        let size = compress_weights(
            &mut dst[1..],
            &weights[..max_symbol],
            counts,
            normalized,
            fse_table,
        )?;

        if size >= 2 && size < max_symbol / 2 {
            // also guaranteed to be <= 127 since max_symbol is at most 255
            dst[0] = size as u8;
            return Ok(size + 1);
        }

        // raw nibbles; the final weight completes the total to a power of
        // two and stays implicit
        let entry_count = max_symbol;
        if entry_count > 128 {
            return Err(Error::TableOverflow);
        }

        let n_bytes = entry_count.div_ceil(2);
        if dst.len() < n_bytes + 1 {
            return Err(Error::IO(zett_io::Error::NotEnoughSpace {
                needed: n_bytes + 1,
                available: dst.len(),
            }));
        }

        dst[0] = (127 + entry_count) as u8;
        weights[max_symbol] = 0;
        for i in 0..n_bytes {
            dst[1 + i] = (weights[2 * i] << 4) | weights[2 * i + 1];
        }

        Ok(1 + n_bytes)
    }

    /// Can this table encode every symbol with a non-zero count?
    pub fn is_valid(&self, counts: &[u32; 256], max_symbol: u8) -> bool {
        if max_symbol > self.max_symbol {
            return false;
        }

        for symbol in 0..=max_symbol as usize {
            if counts[symbol] != 0 && self.number_of_bits[symbol] == 0 {
                return false;
            }
        }
        true
    }

    /// Payload bytes this table would produce for the given histogram,
    /// excluding the serialized table itself.
    pub fn estimate_compressed_size(&self, counts: &[u32; 256], max_symbol: u8) -> usize {
        let mut bits = 0usize;
        for symbol in 0..=max_symbol.min(self.max_symbol) as usize {
            bits += self.number_of_bits[symbol] as usize * counts[symbol] as usize;
        }
        bits >> 3
    }
}

impl Default for CompressionTable {
    fn default() -> Self {
        Self::new()
    }
}

fn compress_weights(
    dst: &mut [u8],
    weights: &[u8],
    counts: &mut [u32; 256],
    normalized: &mut [i16; 256],
    fse_table: &mut zett_fse::CompressionTable,
) -> Result<usize, Error> {
    if weights.len() <= 1 {
        return Ok(0); // not compressible
    }

    Histogram::count(weights, counts);
    let max_symbol = Histogram::find_max_symbol(counts, MAX_TABLE_LOG);
    let max_count = Histogram::find_largest_count(counts, max_symbol);

    if max_count as usize == weights.len() {
        return Ok(1); // a single distinct weight
    }
    if max_count == 1 {
        return Ok(0); // every weight unique, not compressible
    }

    let table_log =
        zett_fse::optimal_table_log(MAX_FSE_TABLE_LOG, weights.len(), max_symbol);
    zett_fse::normalize_counts(normalized, table_log, counts, weights.len(), max_symbol)?;

    let header_size =
        zett_fse::write_normalized_counts(dst, normalized, max_symbol, table_log)?;

    fse_table.initialize(normalized, max_symbol, table_log)?;
    let compressed = zett_fse::compress(&mut dst[header_size..], weights, fse_table)?;
    if compressed == 0 {
        return Ok(0);
    }

    Ok(header_size + compressed)
}

/// Huffman-code `src` as one backward-read stream. Returns 0 when the
/// encoded form will not fit in `dst`.
pub fn compress_single_stream(
    dst: &mut [u8],
    src: &[u8],
    table: &CompressionTable,
) -> Result<usize, Error> {
    match single_stream(dst, src, table) {
        Ok(written) => Ok(written),
        Err(zett_io::Error::NotEnoughSpace { .. }) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

fn single_stream(
    dst: &mut [u8],
    src: &[u8],
    table: &CompressionTable,
) -> Result<usize, zett_io::Error> {
    let mut w = BitWriter::new(dst);

    // walk the input backward so the decoder streams forward
    let tail = src.len() & 3;
    let n = src.len() - tail;

    if tail >= 3 {
        table.encode_symbol(&mut w, src[n + 2]);
    }
    if tail >= 2 {
        table.encode_symbol(&mut w, src[n + 1]);
    }
    if tail >= 1 {
        table.encode_symbol(&mut w, src[n]);
        w.flush()?;
    }

    let mut i = n;
    while i > 0 {
        table.encode_symbol(&mut w, src[i - 1]);
        table.encode_symbol(&mut w, src[i - 2]);
        table.encode_symbol(&mut w, src[i - 3]);
        table.encode_symbol(&mut w, src[i - 4]);
        w.flush()?;
        i -= 4;
    }

    w.finish_with_mark()
}

/// Huffman-code `src` as four independent streams behind a 6-byte jump
/// table of the first three stream sizes. Returns 0 when the encoded form
/// will not fit or a stream size overflows its 16-bit length field.
pub fn compress_four_streams(
    dst: &mut [u8],
    src: &[u8],
    table: &CompressionTable,
) -> Result<usize, Error> {
    if src.len() < 4 || dst.len() < 6 + 8 {
        return Ok(0);
    }

    let segment_size = src.len().div_ceil(4);
    let mut pos = 6;

    for i in 0..3 {
        let segment = &src[i * segment_size..(i + 1) * segment_size];

        let size = compress_single_stream(&mut dst[pos..], segment, table)?;
        if size == 0 || size > u16::MAX as usize {
            return Ok(0);
        }

        let bytes = (size as u16).to_le_bytes();
        dst[2 * i] = bytes[0];
        dst[2 * i + 1] = bytes[1];
        pos += size;
    }

    let size = compress_single_stream(&mut dst[pos..], &src[3 * segment_size..], table)?;
    if size == 0 {
        return Ok(0);
    }

    Ok(pos + size)
}
