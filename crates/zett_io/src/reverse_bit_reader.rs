use crate::Error;

/// Backward bit reader for FSE and Huffman payloads.
///
/// The payload is written forward, least-significant bit first, and read
/// back to front: the final non-zero byte carries a sentinel bit, and each
/// field is returned with the bit closest to the sentinel as its most
/// significant bit. Reading a field therefore yields exactly the value the
/// forward writer was given.
#[derive(Debug)]
pub struct ReverseBitReader<'src> {
    src: &'src [u8],
    buf: u64,
    bit_count: u8,
}

impl<'src> ReverseBitReader<'src> {
    pub fn new(src: &'src [u8]) -> Result<Self, Error> {
        if src.is_empty() {
            return Err(Error::EmptyStream);
        }

        let last = src[src.len() - 1];
        if last == 0 {
            return Err(Error::MissingSentinel);
        }

        let src = &src[..src.len() - 1];
        let bit_count = (u8::BITS - last.leading_zeros() - 1) as u8;

        let buf = {
            let mask = (1u64 << bit_count) - 1;
            (last as u64) & mask
        };

        Ok(Self {
            src,
            buf,
            bit_count,
        })
    }

    #[inline(always)]
    pub fn read(&mut self, n_bits: u8) -> Result<u64, Error> {
        assert!(n_bits <= 56);

        if n_bits == 0 {
            return Ok(0);
        }

        if self.bit_count < n_bits {
            self.refill();
            if self.bit_count < n_bits {
                return Err(Error::NotEnoughBits {
                    requested: n_bits as usize,
                    remaining: self.bits_remaining(),
                });
            }
        }

        let ret = (self.buf >> (self.bit_count - n_bits)) & ((1u64 << n_bits) - 1);
        self.bit_count -= n_bits;

        Ok(ret)
    }

    /// Like [`ReverseBitReader::read`], but a depleted stream zero-pads the
    /// low end of the field instead of failing. Huffman decoding relies on
    /// this to drain its final states.
    #[inline(always)]
    pub fn read_padded(&mut self, n_bits: u8) -> u64 {
        assert!(n_bits <= 56);

        if n_bits == 0 {
            return 0;
        }

        if self.bit_count < n_bits {
            self.refill();
        }

        if self.bit_count >= n_bits {
            let ret = (self.buf >> (self.bit_count - n_bits)) & ((1u64 << n_bits) - 1);
            self.bit_count -= n_bits;
            return ret;
        }

        let available = self.bit_count;
        let ret = (self.buf & ((1u64 << available) - 1)) << (n_bits - available);
        self.bit_count = 0;
        self.buf = 0;

        ret
    }

    #[inline(always)]
    pub fn bits_remaining(&self) -> usize {
        self.bit_count as usize + self.src.len() * 8
    }

    #[cold]
    fn refill(&mut self) {
        debug_assert!(self.bit_count < 64);

        let count = ((64 - self.bit_count) / 8) as usize;
        let to_read = count.min(self.src.len());
        if to_read == 0 {
            return;
        }

        let start = self.src.len() - to_read;
        let chunk = {
            let mut bytes = [0u8; 8];
            bytes[..to_read].copy_from_slice(&self.src[start..]);
            u64::from_le_bytes(bytes)
        };

        // Older bytes are read later, so they slot in below the bits that
        // are already loaded.
        if self.bit_count == 0 {
            self.buf = chunk;
        } else {
            debug_assert!(to_read <= 7);
            self.buf = (self.buf << (to_read * 8)) | chunk;
        }

        self.bit_count += (to_read * 8) as u8;
        self.src = &self.src[..start];
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_sentinel_and_bit_order() -> Result<(), Error> {
        // 0x1D = 0b0001_1101: sentinel at bit 4, then bits 3..0 in
        // descending order.
        let data = [0x1D];

        let mut br = ReverseBitReader::new(&data)?;

        assert_eq!(br.read(1)?, 1, "Bit below the sentinel should be 1");
        assert_eq!(br.read(1)?, 1);
        assert_eq!(br.read(1)?, 0);
        assert_eq!(br.read(1)?, 1);

        assert!(matches!(br.read(1), Err(Error::NotEnoughBits { .. })));

        Ok(())
    }

    #[test]
    fn test_refill_byte_order() -> Result<(), Error> {
        let data = [0xAA, 0xBB, 0x01];
        let mut br = ReverseBitReader::new(&data)?;

        assert_eq!(br.read(8)?, 0xBB);
        assert_eq!(br.read(8)?, 0xAA);

        Ok(())
    }

    #[test]
    fn test_field_spanning_bytes() -> Result<(), Error> {
        // Forward writer emitted the 12-bit value 0xABC followed by the
        // sentinel: low byte first, sentinel above bit 11.
        let data = [0xBC, 0x1A];
        let mut br = ReverseBitReader::new(&data)?;

        assert_eq!(br.read(12)?, 0xABC);
        assert_eq!(br.bits_remaining(), 0);

        Ok(())
    }

    #[test]
    fn test_refill_hot_path() -> Result<(), Error> {
        let data = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x01];
        let mut br = ReverseBitReader::new(&data)?;

        assert_eq!(br.read(8)?, 0x88);
        assert_eq!(br.read(8)?, 0x77);
        assert_eq!(br.read(16)?, 0x6655);

        Ok(())
    }

    #[test]
    fn test_read_padded_pads_low_bits() -> Result<(), Error> {
        // sentinel at bit 2, payload bits "10" (read order 1, 0)
        let data = [0b110];
        let mut br = ReverseBitReader::new(&data)?;

        // asking for 4 bits with only 2 available zero-fills the low end
        assert_eq!(br.read_padded(4), 0b1000);
        assert_eq!(br.bits_remaining(), 0);
        assert_eq!(br.read_padded(4), 0);
        Ok(())
    }

    #[test]
    fn test_constructor_edge_cases() -> Result<(), Error> {
        assert!(matches!(
            ReverseBitReader::new(&[]).err(),
            Some(Error::EmptyStream)
        ));

        assert!(matches!(
            ReverseBitReader::new(&[0]).err(),
            Some(Error::MissingSentinel)
        ));

        let mut br = ReverseBitReader::new(&[0x01])?;
        assert!(matches!(br.read(1).err(), Some(Error::NotEnoughBits { .. })));

        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        #[test]
        fn test_fuzz_random_reads(
          bits in proptest::collection::vec(any::<bool>(), 0..2000),
          reads in proptest::collection::vec(1u8..=56, 0..1000)
        ) {
            let src = encode_bits(&bits);
            let mut br = ReverseBitReader::new(&src)?;

            let mut remaining = bits.as_slice();

            for n in reads {
              if remaining.len() < n as usize {
                break;
              }

              let (chunk, rest) = remaining.split_at(n as usize);

              let expected = pack_bits_msb(chunk);
              let actual = br.read(n)?;

              prop_assert_eq!(actual, expected,
                  "Mismatch reading {} bits ({} bits remaining)", n, remaining.len());

              remaining = rest;
            }

            if remaining.len() < 56 {
                let too_many = (remaining.len() + 1) as u8;
                prop_assert!(br.read(too_many).is_err());
            }
        }
    }

    /// First-read bit becomes the most significant bit of the field.
    fn pack_bits_msb(chunk: &[bool]) -> u64 {
        chunk.iter().fold(0, |acc, &b| (acc << 1) | b as u64)
    }

    /// Builds the forward byte stream whose backward read order is `bits`.
    fn encode_bits(bits: &[bool]) -> Vec<u8> {
        let total = bits.len();
        let mut out = vec![0u8; total / 8 + 1];

        for (read_idx, &bit) in bits.iter().enumerate() {
            let pos = total - 1 - read_idx;
            out[pos / 8] |= (bit as u8) << (pos % 8);
        }
        out[total / 8] |= 1 << (total % 8);

        out
    }
}
