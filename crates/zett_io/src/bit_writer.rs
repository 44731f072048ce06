use crate::Error;

/// Forward bit writer. Fields are accumulated least-significant bit first
/// and flushed to the destination in little-endian order, which is exactly
/// the layout [`crate::ReverseBitReader`] consumes back to front.
///
/// Callers are responsible for flushing often enough that no more than 64
/// bits are ever pending; the entropy coders do this between every few
/// fields.
#[derive(Debug)]
pub struct BitWriter<'dst> {
    dst: &'dst mut [u8],
    pos: usize,
    container: u64,
    bit_count: u8,
}

impl<'dst> BitWriter<'dst> {
    pub fn new(dst: &'dst mut [u8]) -> Self {
        Self {
            dst,
            pos: 0,
            container: 0,
            bit_count: 0,
        }
    }

    #[inline(always)]
    pub fn put(&mut self, value: u64, n_bits: u8) {
        debug_assert!(n_bits <= 56);
        debug_assert!(self.bit_count + n_bits <= 64);

        self.container |= (value & ((1u64 << n_bits) - 1)) << self.bit_count;
        self.bit_count += n_bits;
    }

    /// Write every whole byte accumulated so far, keeping at most 7 bits
    /// pending.
    #[inline(always)]
    pub fn flush(&mut self) -> Result<(), Error> {
        let bytes = (self.bit_count >> 3) as usize;
        if bytes == 0 {
            return Ok(());
        }

        if self.pos + bytes > self.dst.len() {
            return Err(Error::NotEnoughSpace {
                needed: bytes,
                available: self.dst.len() - self.pos,
            });
        }

        self.dst[self.pos..self.pos + bytes]
            .copy_from_slice(&self.container.to_le_bytes()[..bytes]);
        self.pos += bytes;
        self.bit_count &= 7;

        if bytes == 8 {
            self.container = 0;
        } else {
            self.container >>= bytes * 8;
        }

        Ok(())
    }

    /// Terminate a backward-read stream: append the 1-bit sentinel, pad to
    /// a byte boundary and return the total number of bytes written.
    pub fn finish_with_mark(mut self) -> Result<usize, Error> {
        self.put(1, 1);
        self.finish_padded()
    }

    /// Pad the final partial byte with zero bits and return the total
    /// number of bytes written.
    pub fn finish_padded(mut self) -> Result<usize, Error> {
        self.flush()?;

        if self.bit_count > 0 {
            if self.pos >= self.dst.len() {
                return Err(Error::NotEnoughSpace {
                    needed: 1,
                    available: 0,
                });
            }
            self.dst[self.pos] = self.container as u8;
            self.pos += 1;
        }

        Ok(self.pos)
    }

    #[inline(always)]
    pub fn bytes_written(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::{BitReader, ReverseBitReader};

    #[test]
    fn test_single_field_with_mark() -> Result<(), Error> {
        let mut buf = [0u8; 4];
        let mut w = BitWriter::new(&mut buf);

        w.put(0xABC, 12);
        w.flush()?;
        let written = w.finish_with_mark()?;

        assert_eq!(written, 2);
        assert_eq!(&buf[..2], &[0xBC, 0x1A]);
        Ok(())
    }

    #[test]
    fn test_overflow_reports_space() {
        let mut buf = [0u8; 1];
        let mut w = BitWriter::new(&mut buf);

        w.put(0xFFFF, 16);
        assert!(matches!(
            w.flush(),
            Err(Error::NotEnoughSpace { .. })
        ));
    }

    #[test]
    fn test_zero_width_field_is_noop() -> Result<(), Error> {
        let mut buf = [0u8; 2];
        let mut w = BitWriter::new(&mut buf);

        w.put(0x7, 0);
        w.put(0x5, 3);
        let written = w.finish_with_mark()?;

        assert_eq!(written, 1);
        assert_eq!(buf[0], 0b1101);
        Ok(())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        /// Fields written forward come back out of the backward reader in
        /// reverse order, value for value.
        #[test]
        fn test_roundtrip_reverse_reader(
            fields in proptest::collection::vec((any::<u64>(), 1u8..=32), 1..200)
        ) {
            let mut buf = vec![0u8; fields.len() * 8 + 8];

            let mut w = BitWriter::new(&mut buf);
            for &(value, n_bits) in &fields {
                w.put(value, n_bits);
                w.flush()?;
            }
            let written = w.finish_with_mark()?;

            let mut r = ReverseBitReader::new(&buf[..written])?;
            for &(value, n_bits) in fields.iter().rev() {
                let expected = value & ((1u64 << n_bits) - 1);
                prop_assert_eq!(r.read(n_bits)?, expected);
            }
            prop_assert_eq!(r.bits_remaining(), 0);
        }

        /// The forward reader sees the same fields in writing order.
        #[test]
        fn test_roundtrip_forward_reader(
            fields in proptest::collection::vec((any::<u64>(), 1u8..=32), 1..200)
        ) {
            let mut buf = vec![0u8; fields.len() * 8 + 8];

            let mut w = BitWriter::new(&mut buf);
            for &(value, n_bits) in &fields {
                w.put(value, n_bits);
                w.flush()?;
            }
            let written = w.finish_padded()?;

            let mut r = BitReader::new(&buf[..written])?;
            for &(value, n_bits) in &fields {
                let expected = value & ((1u64 << n_bits) - 1);
                prop_assert_eq!(r.read(n_bits)?, expected);
            }
        }
    }
}
