use zett_io::InputCursor;

use crate::context::DecodeContext;
use crate::{FrameError, MAX_BLOCK_SIZE};

const RAW_RLE_EXTRA_BYTES: [usize; 4] = [0, 1, 0, 2];
const RAW_RLE_SHIFT: [u32; 4] = [3, 4, 3, 4];
const COMPRESSED_EXTRA_BYTES: [usize; 4] = [2, 2, 3, 4];
const COMPRESSED_BITS: [u32; 4] = [10, 10, 14, 18];
const COMPRESSED_STREAMS: [Streams; 4] =
    [Streams::One, Streams::Four, Streams::Four, Streams::Four];

/// Decode the literals section at the start of a compressed block into
/// `ctx.literals_buf`. Returns the number of section bytes consumed.
pub(crate) fn decode(ctx: &mut DecodeContext, src: &[u8]) -> Result<usize, FrameError> {
    let mut cursor = InputCursor::new(src);
    let header = Header::read(&mut cursor)?;
    tracing::debug!(?header, "literals section");

    if header.regenerated_size as usize > MAX_BLOCK_SIZE {
        return Err(FrameError::LiteralsSizeTooLarge(header.regenerated_size));
    }

    let dst = &mut ctx.literals_buf[..header.regenerated_size as usize];
    ctx.literals_len = header.regenerated_size as usize;

    match header.ls_type {
        Type::Raw => {
            dst.copy_from_slice(cursor.take(dst.len())?);
        }

        Type::Rle => {
            let byte = cursor.read_u8()?;
            dst.fill(byte);
        }

        Type::Compressed | Type::Treeless => {
            let compressed_size = header.compressed_size;
            if compressed_size as usize > MAX_BLOCK_SIZE {
                return Err(FrameError::CompressedSizeTooLarge(compressed_size));
            }

            let payload = cursor.take(compressed_size as usize)?;

            let table_size = if header.ls_type == Type::Compressed {
                let (table, read) = zett_huff0::DecodingTable::read(payload)?;
                ctx.huffman = Some(table);
                read
            } else {
                0
            };

            let table = ctx
                .huffman
                .as_ref()
                .ok_or(FrameError::MissingHuffmanTable)?;
            decode_streams(&payload[table_size..], dst, table, header.streams)?;
        }
    };

    Ok(cursor.position())
}

fn decode_streams(
    src: &[u8],
    dst: &mut [u8],
    table: &zett_huff0::DecodingTable,
    streams: Streams,
) -> Result<(), FrameError> {
    match streams {
        Streams::One => {
            let mut r = zett_io::ReverseBitReader::new(src)?;
            let mut decoder = zett_huff0::Decoder::new(table, &mut r);

            for d in dst.iter_mut() {
                *d = decoder.decode(&mut r);
            }

            if r.bits_remaining() > 0 {
                return Err(FrameError::ExtraBitsInStream(r.bits_remaining()));
            }

            Ok(())
        }
        Streams::Four => {
            if src.len() < 6 {
                return Err(FrameError::JumpTableInvalid);
            }

            let s0 = src[0] as usize + ((src[1] as usize) << 8);
            let s1 = s0 + src[2] as usize + ((src[3] as usize) << 8);
            let s2 = s1 + src[4] as usize + ((src[5] as usize) << 8);

            let payload = &src[6..];
            if s2 > payload.len() {
                return Err(FrameError::JumpTableInvalid);
            }

            let segments = [
                &payload[..s0],
                &payload[s0..s1],
                &payload[s1..s2],
                &payload[s2..],
            ];

            // the three sized streams regenerate equal chunks; the fourth
            // carries the remainder
            let chunk = dst.len().div_ceil(4);

            let mut rest = dst;
            for (idx, segment) in segments.iter().enumerate() {
                let out = if idx < 3 {
                    if rest.len() <= chunk {
                        return Err(FrameError::Corruption);
                    }
                    let (head, tail) = rest.split_at_mut(chunk);
                    rest = tail;
                    head
                } else {
                    std::mem::take(&mut rest)
                };

                let mut r = zett_io::ReverseBitReader::new(segment)?;
                let mut decoder = zett_huff0::Decoder::new(table, &mut r);

                for d in out.iter_mut() {
                    *d = decoder.decode(&mut r);
                }

                if r.bits_remaining() > 0 {
                    return Err(FrameError::ExtraBitsInStream(r.bits_remaining()));
                }
            }

            Ok(())
        }
    }
}

pub(crate) struct Header {
    ls_type: Type,
    regenerated_size: u32,
    compressed_size: u32,
    streams: Streams,
}

impl std::fmt::Debug for Header {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiteralsSection")
            .field("ls_type", &self.ls_type)
            .field("regenerated_size", &self.regenerated_size)
            .field("compressed_size", &self.compressed_size)
            .field("num_streams", &(self.streams as usize))
            .finish()
    }
}

impl Header {
    pub fn read(src: &mut InputCursor) -> Result<Header, FrameError> {
        let first = src.read_u8()?;

        let ls_type = match first & 0x03 {
            0 => Type::Raw,
            1 => Type::Rle,
            2 => Type::Compressed,
            _ => Type::Treeless,
        };
        let size_format = ((first >> 2) & 0x3) as usize;

        match ls_type {
            Type::Raw | Type::Rle => Self::read_raw_rle(src, first, ls_type, size_format),
            Type::Compressed | Type::Treeless => {
                Self::read_compressed(src, first, ls_type, size_format)
            }
        }
    }

    fn read_raw_rle(
        src: &mut InputCursor,
        first: u8,
        ls_type: Type,
        size_format: usize,
    ) -> Result<Header, FrameError> {
        let header = {
            let mut buf = [0u8; 4];
            buf[0] = first;

            let extra = RAW_RLE_EXTRA_BYTES[size_format];
            buf[1..=extra].copy_from_slice(src.take(extra)?);

            u32::from_le_bytes(buf)
        };

        let regenerated_size = header >> RAW_RLE_SHIFT[size_format];

        Ok(Self {
            ls_type,
            regenerated_size,
            streams: Streams::One,
            compressed_size: match ls_type {
                Type::Rle => 1,
                _ => regenerated_size,
            },
        })
    }

    fn read_compressed(
        src: &mut InputCursor,
        first: u8,
        ls_type: Type,
        size_format: usize,
    ) -> Result<Header, FrameError> {
        let extra = COMPRESSED_EXTRA_BYTES[size_format];
        let n_bits = COMPRESSED_BITS[size_format];
        let mask = (1u64 << n_bits) - 1;

        let header = {
            let mut buf = [0u8; 8];
            buf[0] = first;
            buf[1..=extra].copy_from_slice(src.take(extra)?);
            u64::from_le_bytes(buf)
        };
        let header = header >> 4;

        let regenerated_size = (header & mask) as u32;
        let compressed_size = ((header >> n_bits) & mask) as u32;

        Ok(Self {
            ls_type,
            regenerated_size,
            streams: COMPRESSED_STREAMS[size_format],
            compressed_size,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Streams {
    One = 1,
    Four = 4,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Type {
    /// Literals are stored uncompressed.
    Raw = 0,

    /// A single byte repeated `regenerated_size` times.
    Rle = 1,

    /// Huffman-compressed, starting with a table description.
    Compressed = 2,

    /// Huffman-compressed with the table of the previous compressed
    /// literals block in this frame. Fatal when no such table exists.
    Treeless = 3,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> (Header, usize) {
        let mut cursor = InputCursor::new(bytes);
        let header = Header::read(&mut cursor).unwrap();
        (header, cursor.position())
    }

    #[test]
    fn test_raw_single_byte_header() {
        // type raw, size format 0, size 13 (5-bit field)
        let (header, consumed) = parse(&[13 << 3]);

        assert_eq!(header.ls_type, Type::Raw);
        assert_eq!(header.regenerated_size, 13);
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_rle_two_byte_header() {
        // type rle, size format 1 => 12-bit size over 2 bytes
        let size = 1000u32;
        let word = 1 | (1 << 2) | (size << 4);
        let (header, consumed) = parse(&word.to_le_bytes());

        assert_eq!(header.ls_type, Type::Rle);
        assert_eq!(header.regenerated_size, size);
        assert_eq!(header.compressed_size, 1);
        assert_eq!(consumed, 2);
    }

    #[test]
    fn test_compressed_three_byte_header() {
        // type compressed, size format 1 => 4 streams, 10-bit fields
        let regenerated = 700u32;
        let compressed = 300u32;
        let word = 2 | (1 << 2) | (regenerated << 4) | (compressed << 14);
        let (header, consumed) = parse(&word.to_le_bytes());

        assert_eq!(header.ls_type, Type::Compressed);
        assert_eq!(header.regenerated_size, regenerated);
        assert_eq!(header.compressed_size, compressed);
        assert!(matches!(header.streams, Streams::Four));
        assert_eq!(consumed, 3);
    }

    #[test]
    fn test_compressed_single_stream_format() {
        // size format 0 keeps a single stream
        let word = 2 | (80u32 << 4) | (40 << 14);
        let (header, _) = parse(&word.to_le_bytes());

        assert!(matches!(header.streams, Streams::One));
    }

    #[test]
    fn test_treeless_without_table_fails() {
        let mut ctx = DecodeContext::new();

        // treeless, size format 0, tiny sizes
        let word = 3u32 | (4 << 4) | (2 << 14);
        let mut section = word.to_le_bytes()[..3].to_vec();
        section.extend_from_slice(&[0xAB, 0x01]);

        assert!(matches!(
            decode(&mut ctx, &section),
            Err(FrameError::MissingHuffmanTable)
        ));
    }
}
