use crate::Error;

/// Byte-level view over an input slice with little-endian field accessors.
/// Every multi-byte read is bounds-checked before it happens.
#[derive(Debug, Clone)]
pub struct InputCursor<'src> {
    src: &'src [u8],
    pos: usize,
}

impl<'src> InputCursor<'src> {
    pub fn new(src: &'src [u8]) -> Self {
        Self { src, pos: 0 }
    }

    /// Absolute byte offset from the start of the underlying slice.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.src.len() - self.pos
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.pos == self.src.len()
    }

    #[inline(always)]
    pub fn read_u8(&mut self) -> Result<u8, Error> {
        let [byte] = *self.take_array::<1>()?;
        Ok(byte)
    }

    #[inline(always)]
    pub fn read_u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(*self.take_array::<2>()?))
    }

    #[inline(always)]
    pub fn read_u24(&mut self) -> Result<u32, Error> {
        let bytes = self.take_array::<3>()?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }

    #[inline(always)]
    pub fn read_u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(*self.take_array::<4>()?))
    }

    #[inline(always)]
    pub fn read_u64(&mut self) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(*self.take_array::<8>()?))
    }

    /// Little-endian unsigned integer of 1, 2, 4 or 8 bytes.
    pub fn read_uint(&mut self, n_bytes: usize) -> Result<u64, Error> {
        debug_assert!(matches!(n_bytes, 1 | 2 | 4 | 8));

        let mut bytes = [0u8; 8];
        bytes[..n_bytes].copy_from_slice(self.take(n_bytes)?);
        Ok(u64::from_le_bytes(bytes))
    }

    #[inline(always)]
    pub fn take(&mut self, len: usize) -> Result<&'src [u8], Error> {
        if self.remaining() < len {
            return Err(Error::Truncated {
                requested: len,
                remaining: self.remaining(),
            });
        }

        let ret = &self.src[self.pos..self.pos + len];
        self.pos += len;
        Ok(ret)
    }

    #[inline(always)]
    fn take_array<const N: usize>(&mut self) -> Result<&'src [u8; N], Error> {
        let bytes = self.take(N)?;
        Ok(bytes.try_into().expect("take returned exactly N bytes"))
    }
}
