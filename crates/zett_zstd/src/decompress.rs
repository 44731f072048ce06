use xxhash_rust::xxh64::xxh64;
use zett_io::InputCursor;

use crate::context::{DecodeContext, OutputCursor};
use crate::{
    block, execution, frame, literals, sequences, Error, FrameError, MAGIC_NUMBER,
    MAGIC_NUMBER_V07, MAX_BLOCK_SIZE, SKIPPABLE_MAGIC_BASE,
};

/// One-shot frame decoder. Owns all scratch state (literals buffer,
/// entropy tables, sequence buffer), which is reused across blocks and
/// frames. Not meant to be shared across threads; use one instance per
/// thread instead.
pub struct Decompressor {
    ctx: DecodeContext,
}

impl Decompressor {
    pub fn new() -> Self {
        Self {
            ctx: DecodeContext::new(),
        }
    }

    /// Decode every frame in `input` back to back, writing the
    /// concatenated content into `output`. Returns the number of bytes
    /// produced.
    ///
    /// After an error the instance's transient state is unspecified; it
    /// is safe to reuse for a fresh call but no partial output should be
    /// trusted.
    pub fn decompress(&mut self, input: &[u8], output: &mut [u8]) -> Result<usize, Error> {
        let mut cursor = InputCursor::new(input);
        let mut out = OutputCursor::new(output);

        while !cursor.is_empty() {
            self.decode_frame(&mut cursor, &mut out)
                .map_err(|source| match source {
                    FrameError::DestinationFull => Error::OutputTooSmall {
                        required: out.position() + 1,
                    },
                    source => Error::Malformed {
                        offset: cursor.position(),
                        source,
                    },
                })?;
        }

        Ok(out.position())
    }

    /// Content size declared by the first frame header in `input`;
    /// `None` when the frame does not declare one.
    pub fn decompressed_size(input: &[u8]) -> Result<Option<u64>, Error> {
        let mut cursor = InputCursor::new(input);

        let parse = |cursor: &mut InputCursor| -> Result<Option<u64>, FrameError> {
            read_magic(cursor)?;
            let header = frame::Header::read(cursor)?;
            Ok(header.content_size())
        };

        parse(&mut cursor).map_err(|source| Error::Malformed {
            offset: cursor.position(),
            source,
        })
    }

    fn decode_frame(
        &mut self,
        cursor: &mut InputCursor,
        out: &mut OutputCursor,
    ) -> Result<(), FrameError> {
        read_magic(cursor)?;

        let header = frame::Header::read(cursor)?;
        // validates the window against the implementation ceiling
        header.window_size()?;

        self.ctx.reset();
        out.start_frame();

        loop {
            let block_header = block::Header::read(cursor)?;

            match block_header.block_type {
                block::Type::Raw => {
                    let data = cursor.take(block_header.block_size as usize)?;
                    out.push_slice(data)?;
                }
                block::Type::Rle => {
                    let byte = cursor.read_u8()?;
                    out.fill(byte, block_header.block_size as usize)?;
                }
                block::Type::Compressed => {
                    let body = cursor.take(block_header.block_size as usize)?;
                    self.decode_compressed_block(body, out)?;
                }
            }

            if block_header.last_block {
                break;
            }
        }

        if let Some(declared) = header.content_size() {
            if declared != out.frame_len() as u64 {
                return Err(FrameError::ContentSizeMismatch {
                    declared,
                    actual: out.frame_len() as u64,
                });
            }
        }

        if header.has_checksum() {
            let expected = cursor.read_u32()?;
            let actual = xxh64(out.frame_bytes(), 0) as u32;

            if expected != actual {
                return Err(FrameError::ChecksumMismatch { expected, actual });
            }
        }

        Ok(())
    }

    fn decode_compressed_block(
        &mut self,
        body: &[u8],
        out: &mut OutputCursor,
    ) -> Result<(), FrameError> {
        let block_start = out.position();

        let literals_size = literals::decode(&mut self.ctx, body)?;
        sequences::decode(&mut self.ctx, &body[literals_size..])?;
        execution::execute(&mut self.ctx, out)?;

        let produced = out.position() - block_start;
        if produced > MAX_BLOCK_SIZE {
            return Err(FrameError::BlockContentTooLarge(produced));
        }

        Ok(())
    }
}

impl Default for Decompressor {
    fn default() -> Self {
        Self::new()
    }
}

fn read_magic(cursor: &mut InputCursor) -> Result<(), FrameError> {
    let magic = cursor.read_u32()?;

    match magic {
        MAGIC_NUMBER => Ok(()),
        MAGIC_NUMBER_V07 => Err(FrameError::LegacyFrameUnsupported),
        m if m & !0xF == SKIPPABLE_MAGIC_BASE => {
            Err(FrameError::SkippableFrameUnsupported(m))
        }
        m => Err(FrameError::InvalidMagicNumber(m)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_magic_rejections() {
        let mut out = [0u8; 16];
        let mut dec = Decompressor::new();

        let err = dec
            .decompress(&0xFD2F_B527u32.to_le_bytes(), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Malformed {
                source: FrameError::LegacyFrameUnsupported,
                ..
            }
        ));

        let err = dec
            .decompress(&0x184D_2A53u32.to_le_bytes(), &mut out)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Malformed {
                source: FrameError::SkippableFrameUnsupported(0x184D_2A53),
                ..
            }
        ));

        let err = dec.decompress(b"not zstd", &mut out).unwrap_err();
        assert!(matches!(
            err,
            Error::Malformed {
                source: FrameError::InvalidMagicNumber(_),
                ..
            }
        ));
    }

    #[test]
    fn test_empty_input_produces_nothing() {
        let mut out = [0u8; 4];
        let written = Decompressor::new().decompress(&[], &mut out).unwrap();
        assert_eq!(written, 0);
    }

    #[test]
    fn test_truncated_magic_reports_offset() {
        let mut out = [0u8; 4];
        let err = Decompressor::new()
            .decompress(&[0x28, 0xB5], &mut out)
            .unwrap_err();

        assert!(matches!(err, Error::Malformed { offset: 0, .. }));
    }
}
