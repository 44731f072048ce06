use crate::sequences::Sequence;
use crate::{
    FrameError, LITERALS_LENGTH_TABLE_SIZE, MATCH_LENGTH_TABLE_SIZE, MAX_BLOCK_SIZE,
    OFFSET_TABLE_SIZE,
};

/// Scratch state owned by a [`crate::Decompressor`] and reused across
/// blocks within a frame (and across frames on the same instance). Reset
/// at every frame boundary.
pub(crate) struct DecodeContext {
    pub literals_buf: Vec<u8>,
    pub literals_len: usize,

    pub sequences: Vec<Sequence>,

    pub huffman: Option<zett_huff0::DecodingTable>,

    pub ll_table: Option<zett_fse::DecodingTable<LITERALS_LENGTH_TABLE_SIZE>>,
    pub of_table: Option<zett_fse::DecodingTable<OFFSET_TABLE_SIZE>>,
    pub ml_table: Option<zett_fse::DecodingTable<MATCH_LENGTH_TABLE_SIZE>>,

    pub offset_history: [usize; 3],
}

impl DecodeContext {
    pub fn new() -> Self {
        Self {
            literals_buf: vec![0; MAX_BLOCK_SIZE],
            literals_len: 0,
            sequences: Vec::with_capacity(MAX_BLOCK_SIZE / 8),
            huffman: None,
            ll_table: None,
            of_table: None,
            ml_table: None,
            offset_history: [1, 4, 8],
        }
    }

    pub fn reset(&mut self) {
        self.literals_len = 0;
        self.sequences.clear();
        self.huffman = None;
        self.ll_table = None;
        self.of_table = None;
        self.ml_table = None;
        self.offset_history = [1, 4, 8];
    }
}

/// Write view over the caller's output slice. Tracks the current frame's
/// origin so match copies can be validated against it.
pub(crate) struct OutputCursor<'dst> {
    buf: &'dst mut [u8],
    pos: usize,
    frame_base: usize,
}

impl<'dst> OutputCursor<'dst> {
    pub fn new(buf: &'dst mut [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            frame_base: 0,
        }
    }

    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn start_frame(&mut self) {
        self.frame_base = self.pos;
    }

    /// Bytes produced so far by the current frame.
    #[inline(always)]
    pub fn frame_len(&self) -> usize {
        self.pos - self.frame_base
    }

    pub fn frame_bytes(&self) -> &[u8] {
        &self.buf[self.frame_base..self.pos]
    }

    #[inline(always)]
    pub fn push_slice(&mut self, data: &[u8]) -> Result<(), FrameError> {
        if self.pos + data.len() > self.buf.len() {
            return Err(FrameError::DestinationFull);
        }

        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(())
    }

    #[inline(always)]
    pub fn fill(&mut self, byte: u8, count: usize) -> Result<(), FrameError> {
        if self.pos + count > self.buf.len() {
            return Err(FrameError::DestinationFull);
        }

        self.buf[self.pos..self.pos + count].fill(byte);
        self.pos += count;
        Ok(())
    }

    /// Copy `n_bytes` from `offset` bytes back in the produced output,
    /// handling self-overlap.
    #[inline(always)]
    pub fn copy_match(&mut self, offset: usize, n_bytes: usize) -> Result<(), FrameError> {
        if offset == 0 {
            return Err(FrameError::ZeroOffset);
        }
        if offset > self.frame_len() {
            return Err(FrameError::OffsetBeforeFrameStart {
                offset,
                produced: self.frame_len(),
            });
        }
        if self.pos + n_bytes > self.buf.len() {
            return Err(FrameError::DestinationFull);
        }

        let start = self.pos - offset;
        if offset >= n_bytes {
            self.buf.copy_within(start..start + n_bytes, self.pos);
        } else if offset == 1 {
            let val = self.buf[start];
            self.buf[self.pos..self.pos + n_bytes].fill(val);
        } else {
            // overlapping: seed one period, then double the copied span
            let initial_copy = offset.min(n_bytes);
            self.buf
                .copy_within(start..start + initial_copy, self.pos);
            let mut copied = initial_copy;

            while copied < n_bytes {
                let copy_len = copied.min(n_bytes - copied);
                self.buf
                    .copy_within(self.pos..self.pos + copy_len, self.pos + copied);
                copied += copy_len;
            }
        }

        self.pos += n_bytes;
        Ok(())
    }
}
