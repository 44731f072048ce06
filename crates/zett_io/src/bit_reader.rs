use crate::Error;

/// Forward little-endian bit reader, used for normalized-count headers and
/// Huffman weight tables.
#[derive(Debug)]
pub struct BitReader<'src> {
    src: &'src [u8],
    buf: u64,
    bit_count: u8,
    index: usize,
}

impl<'src> BitReader<'src> {
    pub fn new(src: &'src [u8]) -> Result<Self, Error> {
        if src.is_empty() {
            return Err(Error::EmptyStream);
        }

        let mut ret = Self {
            src,
            buf: 0,
            bit_count: 0,
            index: 0,
        };
        ret.refill();

        Ok(ret)
    }

    #[inline(always)]
    pub fn read(&mut self, n_bits: u8) -> Result<u64, Error> {
        assert!(n_bits <= 56);

        self.ensure_bits(n_bits)?;

        let ret = self.peek(n_bits);
        self.consume(n_bits);
        Ok(ret)
    }

    #[inline(always)]
    pub fn ensure_bits(&mut self, n_bits: u8) -> Result<(), Error> {
        if self.bit_count < n_bits {
            self.refill();

            if self.bit_count < n_bits {
                return Err(Error::NotEnoughBits {
                    requested: n_bits as usize,
                    remaining: self.bit_count as usize + self.src.len() * 8,
                });
            }
        }
        Ok(())
    }

    #[inline(always)]
    pub fn peek(&self, n_bits: u8) -> u64 {
        assert!(n_bits <= self.bit_count);

        self.buf & ((1u64 << n_bits) - 1)
    }

    #[inline(always)]
    pub fn consume(&mut self, n_bits: u8) {
        assert!(n_bits <= self.bit_count);

        self.buf >>= n_bits;
        self.bit_count -= n_bits;
    }

    /// Bytes of the source that the bits consumed so far span, rounding up
    /// to whole bytes.
    #[inline(always)]
    pub fn bytes_consumed(&self) -> usize {
        self.index - (self.bit_count as usize / 8)
    }

    #[cold]
    fn refill(&mut self) {
        debug_assert!(self.bit_count < 64);

        let count = ((64 - self.bit_count) / 8) as usize;
        if count == 0 {
            return;
        }

        let to_read = count.min(self.src.len());
        if to_read < 8 {
            return self.refill_cold(to_read);
        }

        assert_eq!(self.bit_count, 0);

        let buf = {
            let bytes = self.src[..8]
                .try_into()
                .expect("slice length is guaranteed to be 8");
            u64::from_le_bytes(bytes)
        };

        self.buf = buf;
        self.bit_count = 64;
        self.src = &self.src[8..];
        self.index += 8;
    }

    #[cold]
    fn refill_cold(&mut self, count: usize) {
        let to_read = count.min(self.src.len());

        for (idx, &byte) in self.src[..to_read].iter().enumerate() {
            self.buf |= (byte as u64) << (self.bit_count + (idx as u8) * 8);
        }

        self.bit_count += (to_read * 8) as u8;
        self.src = &self.src[to_read..];
        self.index += to_read;
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::tests::*;

    #[test]
    fn test_bit_order() -> Result<(), Error> {
        let mut br = BitReader::new(&[0x1D])?;

        assert_eq!(br.read(1)?, 1);
        assert_eq!(br.read(1)?, 0);
        assert_eq!(br.read(1)?, 1);
        assert_eq!(br.read(1)?, 1);
        assert_eq!(br.read(1)?, 1);
        assert_eq!(br.read(1)?, 0);

        Ok(())
    }

    #[test]
    fn test_refill_cold_byte_order() -> Result<(), Error> {
        let mut br = BitReader::new(&[0xAA, 0xBB])?;

        assert_eq!(br.read(8)?, 0xAA);
        assert_eq!(br.read(8)?, 0xBB);

        Ok(())
    }

    #[test]
    fn test_refill_hot_path() -> Result<(), Error> {
        let mut br =
            BitReader::new(&[0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99])?;

        for expected in [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99] {
            assert_eq!(br.read(8)?, expected);
        }

        Ok(())
    }

    #[test]
    fn test_peek_consume_split() -> Result<(), Error> {
        let mut br = BitReader::new(&[0b1010_0110])?;

        br.ensure_bits(5)?;
        assert_eq!(br.peek(5), 0b0_0110);
        br.consume(3);
        assert_eq!(br.read(3)?, 0b100);

        Ok(())
    }

    #[test]
    fn test_constructor_edge_cases() {
        assert!(matches!(BitReader::new(&[]), Err(Error::EmptyStream)));

        assert!(BitReader::new(&[0]).is_ok());
    }

    #[test]
    fn test_bytes_consumed() -> Result<(), Error> {
        let data = [0xAA, 0xBB, 0xCC, 0xDD];
        let mut br = BitReader::new(&data)?;

        assert_eq!(br.bytes_consumed(), 0);

        br.read(4)?;
        assert_eq!(br.bytes_consumed(), 1);

        br.read(4)?;
        assert_eq!(br.bytes_consumed(), 1);

        br.read(1)?;
        assert_eq!(br.bytes_consumed(), 2);

        br.read(23)?;
        assert_eq!(br.bytes_consumed(), 4);

        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(1000))]

        #[test]
        fn test_fuzz_random_reads(
            bits in proptest::collection::vec(any::<bool>(), 0..2000),
            reads in proptest::collection::vec(1u8..=56, 0..1000)
        ) {
            let src = encode_bits(&bits);
            if src.is_empty() {
                prop_assert!(matches!(BitReader::new(&src), Err(Error::EmptyStream)));
                return Ok(());
            }

            let mut br = BitReader::new(&src)?;
            let mut remaining = bits.as_slice();

            for n in reads {
                if remaining.len() < n as usize {
                     break;
                }

                let (chunk, rest) = remaining.split_at(n as usize);
                let expected = pack_bits(chunk);

                let actual = br.read(n)?;
                prop_assert_eq!(actual, expected, "Mismatch reading {} bits", n);

                remaining = rest;
            }
        }
    }

    fn encode_bits(bits: &[bool]) -> Vec<u8> {
        bits.chunks(8)
            .map(|chunk| {
                chunk
                    .iter()
                    .enumerate()
                    .fold(0u8, |acc, (i, &b)| acc | ((b as u8) << i))
            })
            .collect()
    }
}
