use zett_io::{BitReader, InputCursor, ReverseBitReader};

use crate::codes::{LITERALS_LENGTH_BASE, MATCH_LENGTH_BASE};
use crate::context::DecodeContext;
use crate::{
    FrameError, SequenceChannel, LITERALS_LENGTH_CHANNEL, MATCH_LENGTH_CHANNEL,
    OFFSET_CHANNEL,
};

/// One decoded sequence. The offset is kept in wire form (repeat code or
/// biased distance) because resolving it against the offset history needs
/// the literals length at execution time.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Sequence {
    pub lit_len: u32,
    pub offset_value: u32,
    pub match_len: u32,
}

/// Decode the sequences section of a compressed block into
/// `ctx.sequences`.
pub(crate) fn decode(ctx: &mut DecodeContext, src: &[u8]) -> Result<(), FrameError> {
    ctx.sequences.clear();

    let mut cursor = InputCursor::new(src);
    let Some(header) = Header::read(&mut cursor)? else {
        return Ok(());
    };
    tracing::debug!(n_seqs = header.n_seqs, "sequences section");

    let mut idx = cursor.position();

    idx += update_table(
        header.modes.literal_lengths(),
        &LITERALS_LENGTH_CHANNEL,
        &src[idx..],
        &mut ctx.ll_table,
        FrameError::MissingLiteralsLengthTable,
    )?;

    idx += update_table(
        header.modes.offsets(),
        &OFFSET_CHANNEL,
        &src[idx..],
        &mut ctx.of_table,
        FrameError::MissingOffsetTable,
    )?;

    idx += update_table(
        header.modes.match_lengths(),
        &MATCH_LENGTH_CHANNEL,
        &src[idx..],
        &mut ctx.ml_table,
        FrameError::MissingMatchLengthTable,
    )?;

    let mut r = ReverseBitReader::new(&src[idx..])?;

    let ll_table = ctx.ll_table.as_ref().expect("installed above");
    let of_table = ctx.of_table.as_ref().expect("installed above");
    let ml_table = ctx.ml_table.as_ref().expect("installed above");

    // state initialization order is part of the wire format
    let mut ll_state = zett_fse::Decoder::new(ll_table, &mut r)?;
    let mut of_state = zett_fse::Decoder::new(of_table, &mut r)?;
    let mut ml_state = zett_fse::Decoder::new(ml_table, &mut r)?;

    for i in 0..header.n_seqs {
        let ll_code = ll_state.peek();
        let ml_code = ml_state.peek();
        let of_code = of_state.peek();

        // extra bits come out in offset, match, literals order
        let offset_value = decode_offset(of_code, &mut r)?;
        let match_len = decode_match_length(ml_code, &mut r)?;
        let lit_len = decode_literals_length(ll_code, &mut r)?;

        ctx.sequences.push(Sequence {
            lit_len,
            offset_value,
            match_len,
        });

        // the final sequence leaves the states untouched
        if i < header.n_seqs - 1 {
            ll_state.update(&mut r)?;
            ml_state.update(&mut r)?;
            of_state.update(&mut r)?;
        }
    }

    if r.bits_remaining() > 0 {
        return Err(FrameError::ExtraBitsInStream(r.bits_remaining()));
    }

    Ok(())
}

pub(crate) struct Header {
    n_seqs: u32,
    modes: CompressionModes,
}

impl Header {
    /// `None` when the block carries no sequences (the mode byte is then
    /// absent too).
    pub fn read(r: &mut InputCursor) -> Result<Option<Self>, FrameError> {
        let first = r.read_u8()?;

        let n_seqs = match first {
            0 => return Ok(None),
            1..=127 => first as u32,
            128..=254 => {
                let second = r.read_u8()? as u32;
                (((first as u32) - 128) << 8) + second
            }
            255 => {
                let second = r.read_u8()? as u32;
                let third = r.read_u8()? as u32;

                second + (third << 8) + 0x7F00
            }
        };
        let modes = CompressionModes::read(r.read_u8()?)?;

        Ok(Some(Self { n_seqs, modes }))
    }
}

pub(crate) struct CompressionModes(u8);

impl CompressionModes {
    fn read(val: u8) -> Result<Self, FrameError> {
        let ret = Self(val);

        if ret.reserved() != 0 {
            return Err(FrameError::ReservedBitSet);
        }
        Ok(ret)
    }

    fn literal_lengths(&self) -> Mode {
        Mode::from_bits(self.0 >> 6)
    }

    fn offsets(&self) -> Mode {
        Mode::from_bits((self.0 >> 4) & 0x3)
    }

    fn match_lengths(&self) -> Mode {
        Mode::from_bits((self.0 >> 2) & 0x3)
    }

    fn reserved(&self) -> u8 {
        self.0 & 0x3
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum Mode {
    /// A predefined FSE distribution; no table description present.
    Predefined,

    /// A single byte carrying the symbol used for every sequence.
    Rle,

    /// Standard FSE compression with a table description.
    FseCompressed,

    /// Reuse the table installed by an earlier block of this frame.
    Repeat,
}

impl Mode {
    fn from_bits(val: u8) -> Self {
        match val & 0x3 {
            0 => Self::Predefined,
            1 => Self::Rle,
            2 => Self::FseCompressed,
            _ => Self::Repeat,
        }
    }
}

fn update_table<const N: usize>(
    mode: Mode,
    channel: &SequenceChannel,
    src: &[u8],
    curr: &mut Option<zett_fse::DecodingTable<N>>,
    missing: FrameError,
) -> Result<usize, FrameError> {
    match mode {
        Mode::Repeat => {
            if curr.is_none() {
                return Err(missing);
            }
            Ok(0)
        }
        Mode::Predefined => {
            let mut norm = zett_fse::NormalizedDistribution::from_predefined(
                channel.predefined_counts(),
                channel.predefined_accuracy_log(),
            )?;
            *curr = Some(zett_fse::DecodingTable::from_distribution(&mut norm)?);
            Ok(0)
        }
        Mode::Rle => {
            let symbol = *src.first().ok_or(FrameError::IO(
                zett_io::Error::Truncated {
                    requested: 1,
                    remaining: 0,
                },
            ))?;
            if symbol > channel.max_symbol() {
                return Err(FrameError::InvalidSequenceCode(symbol));
            }
            *curr = Some(zett_fse::DecodingTable::rle(symbol));
            Ok(1)
        }
        Mode::FseCompressed => {
            let mut br = BitReader::new(src)?;
            *curr = Some(zett_fse::DecodingTable::read(&mut br, src.len())?);

            Ok(br.bytes_consumed())
        }
    }
}

fn decode_literals_length(
    code: u8,
    r: &mut ReverseBitReader,
) -> Result<u32, FrameError> {
    let &(baseline, n_bits) = LITERALS_LENGTH_BASE
        .get(code as usize)
        .ok_or(FrameError::InvalidSequenceCode(code))?;

    Ok(baseline + r.read(n_bits)? as u32)
}

fn decode_match_length(code: u8, r: &mut ReverseBitReader) -> Result<u32, FrameError> {
    let &(baseline, n_bits) = MATCH_LENGTH_BASE
        .get(code as usize)
        .ok_or(FrameError::InvalidSequenceCode(code))?;

    Ok(baseline + r.read(n_bits)? as u32)
}

fn decode_offset(code: u8, r: &mut ReverseBitReader) -> Result<u32, FrameError> {
    if code > 31 {
        return Err(FrameError::InvalidSequenceCode(code));
    }

    let extra = r.read(code)?;
    Ok((1u32 << code).wrapping_add(extra as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_count_encodings() -> Result<(), FrameError> {
        let header = Header::read(&mut InputCursor::new(&[5, 0]))?.unwrap();
        assert_eq!(header.n_seqs, 5);

        // two-byte form: ((b0 - 128) << 8) + b1
        let header = Header::read(&mut InputCursor::new(&[130, 7, 0]))?.unwrap();
        assert_eq!(header.n_seqs, (2 << 8) + 7);

        // long form: 255 tag, 16-bit LE value + 0x7F00
        let header = Header::read(&mut InputCursor::new(&[255, 0x34, 0x12, 0]))?.unwrap();
        assert_eq!(header.n_seqs, 0x1234 + 0x7F00);

        assert!(Header::read(&mut InputCursor::new(&[0]))?.is_none());
        Ok(())
    }

    #[test]
    fn test_reserved_mode_bits_rejected() {
        assert!(matches!(
            Header::read(&mut InputCursor::new(&[1, 0b0000_0001])),
            Err(FrameError::ReservedBitSet)
        ));
    }

    #[test]
    fn test_repeat_without_table_fails() {
        let mut table: Option<zett_fse::DecodingTable<512>> = None;

        assert!(matches!(
            update_table(
                Mode::Repeat,
                &LITERALS_LENGTH_CHANNEL,
                &[],
                &mut table,
                FrameError::MissingLiteralsLengthTable,
            ),
            Err(FrameError::MissingLiteralsLengthTable)
        ));
    }

    #[test]
    fn test_rle_table_symbol_range() {
        let mut table: Option<zett_fse::DecodingTable<512>> = None;

        // literals-length codes stop at 35
        assert!(matches!(
            update_table(
                Mode::Rle,
                &LITERALS_LENGTH_CHANNEL,
                &[200],
                &mut table,
                FrameError::MissingLiteralsLengthTable,
            ),
            Err(FrameError::InvalidSequenceCode(200))
        ));

        let consumed = update_table(
            Mode::Rle,
            &LITERALS_LENGTH_CHANNEL,
            &[20],
            &mut table,
            FrameError::MissingLiteralsLengthTable,
        )
        .unwrap();
        assert_eq!(consumed, 1);
        assert!(table.is_some());
    }

    #[test]
    fn test_predefined_tables_expand() {
        let mut ll: Option<zett_fse::DecodingTable<512>> = None;
        let mut of: Option<zett_fse::DecodingTable<256>> = None;
        let mut ml: Option<zett_fse::DecodingTable<512>> = None;

        update_table(
            Mode::Predefined,
            &LITERALS_LENGTH_CHANNEL,
            &[],
            &mut ll,
            FrameError::MissingLiteralsLengthTable,
        )
        .unwrap();
        update_table(
            Mode::Predefined,
            &OFFSET_CHANNEL,
            &[],
            &mut of,
            FrameError::MissingOffsetTable,
        )
        .unwrap();
        update_table(
            Mode::Predefined,
            &MATCH_LENGTH_CHANNEL,
            &[],
            &mut ml,
            FrameError::MissingMatchLengthTable,
        )
        .unwrap();

        assert!(ll.is_some() && of.is_some() && ml.is_some());
    }
}
