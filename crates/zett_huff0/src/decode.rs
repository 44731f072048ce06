use zett_foundation::const_assert;

use crate::errors::Error;
use crate::{MAX_BITS, MAX_SYMBOL_COUNT};

const TABLE_SIZE: usize = 1 << MAX_BITS;

const FSE_ACCURACY_LOG: u8 = 6;
const FSE_TABLE_SIZE: usize = 1 << FSE_ACCURACY_LOG;
const_assert!(FSE_TABLE_SIZE == 64);

/// Huffman decoding state: a sliding window of `max_bits` stream bits that
/// doubles as the table index.
pub struct Decoder<'t, const N: usize = TABLE_SIZE> {
    table: &'t DecodingTable<N>,
    state: u64,
}

impl<'t, const N: usize> Decoder<'t, N> {
    pub fn new(table: &'t DecodingTable<N>, r: &mut zett_io::ReverseBitReader) -> Self {
        let state = r.read_padded(table.max_bits);
        Self { table, state }
    }

    #[inline(always)]
    pub fn decode(&mut self, r: &mut zett_io::ReverseBitReader) -> u8 {
        debug_assert!((self.state as usize) < self.table.entries().len());
        let entry = self.table.entries[self.state as usize];
        let new_bits = r.read_padded(entry.n_bits);

        self.state <<= entry.n_bits;
        self.state &= self.table.entries().len() as u64 - 1;
        self.state |= new_bits;

        entry.symbol
    }
}

#[repr(align(2))]
#[derive(Clone, Copy)]
pub struct Entry {
    symbol: u8,
    n_bits: u8,
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entry")
            .field("symbol", &self.symbol)
            .field("num_bits", &self.n_bits)
            .finish()
    }
}

#[repr(align(64))]
#[derive(Debug)]
pub struct DecodingTable<const N: usize = TABLE_SIZE> {
    entries: [Entry; N],
    n_entries: usize,
    max_bits: u8,
}
const_assert!(std::mem::size_of::<DecodingTable>() % 64 == 0);

impl<const N: usize> DecodingTable<N> {
    /// Parse a serialized table description (either FSE-compressed weights
    /// or raw 4-bit weights) and expand it. Returns the table and the
    /// number of description bytes consumed.
    pub fn read(src: &[u8]) -> Result<(Self, usize), Error> {
        let mut weights = [0u8; MAX_SYMBOL_COUNT];
        let (weights_count, consumed) = Self::read_weights(src, &mut weights)?;
        tracing::debug!(count = weights_count, consumed, "read huffman weights");

        for &w in &weights[..weights_count] {
            if w > MAX_BITS {
                return Err(Error::WeightTooLarge(w, MAX_BITS));
            }
        }

        let table = Self::from_weights(&weights[..weights_count])?;
        Ok((table, consumed))
    }

    pub fn from_weights(weights: &[u8]) -> Result<Self, Error> {
        let mut sum = 0u32;
        let mut bit_rank = [0u32; (MAX_BITS + 1) as usize];

        for &w in weights {
            if w == 0 {
                continue;
            }

            sum += 1 << (w - 1);
            bit_rank[w as usize] += 1;
        }

        if sum == 0 {
            return Err(Error::ZeroWeightSum);
        }

        let max_bits = sum.ilog2() as u8 + 1;
        if max_bits > MAX_BITS {
            return Err(Error::TableOverflow);
        }

        let target = 1u32 << max_bits;
        let remainder = target - sum;

        if remainder == 0 || !remainder.is_power_of_two() {
            return Err(Error::InvalidInferredWeight(remainder));
        }

        let inferred_weight = remainder.ilog2() as u8 + 1;
        bit_rank[inferred_weight as usize] += 1;

        let mut next_code = [0u32; (MAX_BITS + 1) as usize];
        let mut curr = 0u32;

        for w in 1..=max_bits as usize {
            next_code[w] = curr;
            curr += bit_rank[w] << (w - 1);
        }

        if curr != target {
            return Err(Error::TableUnderflow);
        }

        if target as usize > N {
            return Err(Error::TableOverflow);
        }

        let mut entries = [Entry {
            symbol: 0,
            n_bits: 0,
        }; N];

        for (sym, &w) in weights
            .iter()
            .chain(std::iter::once(&inferred_weight))
            .enumerate()
        {
            if w == 0 {
                continue;
            }

            let code_start = next_code[w as usize];
            let n_bits = max_bits - (w - 1);
            let num_slots = 1u32 << (w - 1);

            for i in 0..num_slots as usize {
                let idx = code_start as usize + i;
                entries[idx] = Entry {
                    symbol: sym as u8,
                    n_bits,
                };
            }

            next_code[w as usize] += num_slots;
        }

        Ok(Self {
            entries,
            n_entries: target as usize,
            max_bits,
        })
    }

    fn read_weights(
        src: &[u8],
        out: &mut [u8; MAX_SYMBOL_COUNT],
    ) -> Result<(usize, usize), Error> {
        let header = *src.first().ok_or(Error::IO(zett_io::Error::Truncated {
            requested: 1,
            remaining: 0,
        }))?;
        let src = &src[1..];

        if header >= 128 {
            let count = (header - 127) as usize;
            let consumed = Self::read_weights_direct(src, out, count)?;
            Ok((count, consumed + 1))
        } else {
            let num_weights = Self::read_weights_compressed(src, out, header)?;
            Ok((num_weights, header as usize + 1))
        }
    }

    /// Raw encoding: two 4-bit weights per byte, high nibble first.
    fn read_weights_direct(
        src: &[u8],
        out: &mut [u8; MAX_SYMBOL_COUNT],
        count: usize,
    ) -> Result<usize, Error> {
        debug_assert!(count <= 128);

        let n_bytes = count.div_ceil(2);
        if src.len() < n_bytes {
            return Err(Error::IO(zett_io::Error::Truncated {
                requested: n_bytes,
                remaining: src.len(),
            }));
        }

        for (idx, &byte) in src[..n_bytes].iter().enumerate() {
            out[2 * idx] = byte >> 4;
            if 2 * idx + 1 < count {
                out[2 * idx + 1] = byte & 0xF;
            }
        }

        Ok(n_bytes)
    }

    fn read_weights_compressed(
        src: &[u8],
        out: &mut [u8; MAX_SYMBOL_COUNT],
        compressed_size: u8,
    ) -> Result<usize, Error> {
        let compressed_size = compressed_size as usize;
        if src.len() < compressed_size {
            return Err(Error::IO(zett_io::Error::Truncated {
                requested: compressed_size,
                remaining: src.len(),
            }));
        }

        let mut table_reader = zett_io::BitReader::new(src)?;
        let table = zett_fse::DecodingTable::<FSE_TABLE_SIZE>::read(
            &mut table_reader,
            compressed_size,
        )?;
        let mut br = zett_io::ReverseBitReader::new(
            &src[table_reader.bytes_consumed()..compressed_size],
        )?;

        let mut dec1 = zett_fse::Decoder::new(&table, &mut br)?;
        let mut dec2 = zett_fse::Decoder::new(&table, &mut br)?;

        // the stream carries no symbol count; it ends when a state update
        // would overdraw the remaining bits
        let mut idx = 0;
        loop {
            if idx + 2 > out.len() {
                return Err(Error::TableOverflow);
            }

            out[idx] = dec1.peek();
            idx += 1;

            if dec1.bits_required() as usize > br.bits_remaining() {
                out[idx] = dec2.peek();
                idx += 1;
                break;
            }

            dec1.update(&mut br)?;

            out[idx] = dec2.peek();
            idx += 1;

            if dec2.bits_required() as usize > br.bits_remaining() {
                out[idx] = dec1.peek();
                idx += 1;
                break;
            }

            dec2.update(&mut br)?;
        }

        Ok(idx)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries[..self.n_entries]
    }

    pub const fn max_bits(&self) -> u8 {
        self.max_bits
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_canonical_decoding() -> Result<(), Error> {
        // weights 4,3,2,0,1 plus the implicit weight 1; codes are
        // A=1, B=01, C=001, E=0000, F=0001
        let weights = [4, 3, 2, 0, 1];
        let table = DecodingTable::<64>::from_weights(&weights)?;

        // "ABEF" written back to front, LSB-first: F=0001, E=0000, B=01,
        // A=1, sentinel
        let data = [0x01, 0x0D];
        let mut reader = zett_io::ReverseBitReader::new(&data)?;
        let mut decoder = Decoder::new(&table, &mut reader);

        let sym = decoder.decode(&mut reader);
        assert_eq!(sym, 0, "Expected A (0)");

        let sym = decoder.decode(&mut reader);
        assert_eq!(sym, 1, "Expected B (1)");

        let sym = decoder.decode(&mut reader);
        assert_eq!(sym, 4, "Expected E (4)");

        let sym = decoder.decode(&mut reader);
        assert_eq!(sym, 5, "Expected F (5)");

        assert_eq!(reader.bits_remaining(), 0);
        Ok(())
    }

    #[test]
    fn test_simple_inferred_weight() {
        let weights = [1u8];
        let table = DecodingTable::<256>::from_weights(&weights).expect("Should succeed");

        assert_eq!(table.max_bits, 1);
        assert_eq!(table.entries[0].symbol, 0);
        assert_eq!(table.entries[1].symbol, 1);
    }

    #[test]
    fn test_invalid_weight_sum() {
        let weights = [3, 2];
        assert!(DecodingTable::<256>::from_weights(&weights).is_ok());

        let weights_bad = [3, 3, 2];
        assert!(DecodingTable::<256>::from_weights(&weights_bad).is_err());
    }

    #[test]
    fn test_read_direct() {
        // header 129 => 2 explicit weights, nibbles 4 and 3; weight 2 is
        // inferred (2^3 + 2^2 = 12, remainder to 16 is 4 => weight 3)
        let data = [129, 0x43];
        let (table, consumed) =
            DecodingTable::<64>::read(&data).expect("Read direct failed");

        assert_eq!(consumed, 2);
        assert_eq!(table.max_bits, 4);
    }

    #[test]
    fn test_inferred_weight_boundaries() {
        let w1 = [1, 1, 1];
        let t1 = DecodingTable::<2048>::from_weights(&w1).unwrap();
        assert_eq!(t1.max_bits, 2);

        let w_max = [11, 11];
        let t_max = DecodingTable::<2048>::from_weights(&w_max);
        assert!(t_max.is_err(), "Should fail: no room for inferred weight");
    }

    #[test]
    fn test_oversized_table_log_is_rejected() {
        // 256 symbols of weight 11 would demand a 19-bit table
        let weights = [11u8; 256];
        assert!(matches!(
            DecodingTable::<2048>::from_weights(&weights),
            Err(Error::TableOverflow)
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn test_fuzz_from_weights(
            weights in proptest::collection::vec(0u8..=MAX_BITS, 2..100)
        ) {
            let _ = DecodingTable::<2048>::from_weights(&weights);
        }

        #[test]
        fn test_fuzz_read_direct(
            count in 1u8..=128,
            payload in proptest::collection::vec(any::<u8>(), 64)
        ) {
             let header = 127 + count;
             let mut buf = vec![header];
             buf.extend(&payload[..(count as usize).div_ceil(2)]);

             let _ = DecodingTable::<2048>::read(&buf);
        }

        #[test]
        fn test_table_consistency(
            weights in prop::collection::vec(0..=11u8, 1..255)
        ) {
            if let Ok(table) = DecodingTable::<2048>::from_weights(&weights) {
                assert!(table.max_bits <= 11);

                let table_size = 1usize << table.max_bits;
                for i in 0..table_size {
                    assert!(table.entries[i].n_bits > 0, "Empty slot at index {}", i);
                }
            }
        }

        #[test]
        fn test_decoder_no_panic_on_random_bits(
            weights in prop::collection::vec(0u8..=11, 2..20),
            random_data in prop::collection::vec(any::<u8>(), 1..64)
        ) {
            if let Ok(table) = DecodingTable::<2048>::from_weights(&weights) {
                if random_data[random_data.len()-1] == 0 { return Ok(()); }

                let mut reader = zett_io::ReverseBitReader::new(&random_data)?;
                let mut decoder = Decoder::new(&table, &mut reader);

                for _ in 0..20 {
                    if reader.bits_remaining() < table.max_bits as usize { break; }
                    let _ = decoder.decode(&mut reader);
                }
            }
        }
    }
}
