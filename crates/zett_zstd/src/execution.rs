use crate::context::{DecodeContext, OutputCursor};
use crate::FrameError;

/// Run the decoded sequences of one block: alternate literal runs with
/// match copies, then append the literal residue.
pub(crate) fn execute(
    ctx: &mut DecodeContext,
    out: &mut OutputCursor,
) -> Result<(), FrameError> {
    let literals = &ctx.literals_buf[..ctx.literals_len];
    let mut lit_idx = 0usize;

    for seq in &ctx.sequences {
        let lit_len = seq.lit_len as usize;

        let next_lit_idx = lit_idx
            .checked_add(lit_len)
            .filter(|&next| next <= literals.len())
            .ok_or(FrameError::LiteralsBufferOverread {
                idx: lit_idx,
                len: lit_len,
            })?;

        out.push_slice(&literals[lit_idx..next_lit_idx])?;
        lit_idx = next_lit_idx;

        let offset = resolve_offset(&mut ctx.offset_history, seq.offset_value, lit_len)?;
        out.copy_match(offset, seq.match_len as usize)?;
    }

    if lit_idx < literals.len() {
        out.push_slice(&literals[lit_idx..])?;
    }

    Ok(())
}

/// Map a wire offset value to a concrete distance, maintaining the
/// three-slot repeated-offset history.
///
/// Values above 3 are literal distances (biased by 3) and rotate the
/// history. Values 1-3 select a slot, shifted up by one when the sequence
/// carries no literals; the shifted value 4 means "slot 0 minus one".
/// Unless slot 0 was selected directly, the history rotates.
pub(crate) fn resolve_offset(
    history: &mut [usize; 3],
    value: u32,
    lit_len: usize,
) -> Result<usize, FrameError> {
    if value > 3 {
        let offset = value as usize - 3;
        history[2] = history[1];
        history[1] = history[0];
        history[0] = offset;
        return Ok(offset);
    }

    let mut index = value as usize;
    if lit_len == 0 {
        index += 1;
    }

    if index == 1 {
        return Ok(history[0]);
    }

    let offset = if index == 4 {
        history[0]
            .checked_sub(1)
            .ok_or(FrameError::InvalidSequenceCode(value as u8))?
    } else {
        history[index - 1]
    };
    let offset = if offset == 0 { 1 } else { offset };

    if index != 2 {
        history[2] = history[1];
    }
    history[1] = history[0];
    history[0] = offset;

    Ok(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_offset_rotates_history() {
        let mut history = [1, 4, 8];

        let offset = resolve_offset(&mut history, 25, 5).unwrap();
        assert_eq!(offset, 22);
        assert_eq!(history, [22, 1, 4]);
    }

    #[test]
    fn test_repeat_codes_with_literals() {
        let mut history = [11, 22, 33];

        // value 1 selects slot 0 and leaves the history alone
        assert_eq!(resolve_offset(&mut history, 1, 3).unwrap(), 11);
        assert_eq!(history, [11, 22, 33]);

        // value 2 swaps in slot 1
        assert_eq!(resolve_offset(&mut history, 2, 3).unwrap(), 22);
        assert_eq!(history, [22, 11, 33]);

        // value 3 pulls slot 2 through a full rotation
        let mut history = [11, 22, 33];
        assert_eq!(resolve_offset(&mut history, 3, 3).unwrap(), 33);
        assert_eq!(history, [33, 11, 22]);
    }

    #[test]
    fn test_repeat_codes_shift_when_no_literals() {
        // with lit_len == 0 each code selects the next slot up
        let mut history = [11, 22, 33];
        assert_eq!(resolve_offset(&mut history, 1, 0).unwrap(), 22);
        assert_eq!(history, [22, 11, 33]);

        let mut history = [11, 22, 33];
        assert_eq!(resolve_offset(&mut history, 2, 0).unwrap(), 33);
        assert_eq!(history, [33, 11, 22]);

        // the shifted value 4 means slot 0 minus one
        let mut history = [11, 22, 33];
        assert_eq!(resolve_offset(&mut history, 3, 0).unwrap(), 10);
        assert_eq!(history, [10, 11, 22]);
    }

    #[test]
    fn test_zero_offset_is_clamped_to_one() {
        let mut history = [1, 22, 33];
        assert_eq!(resolve_offset(&mut history, 3, 0).unwrap(), 1);
        assert_eq!(history, [1, 1, 22]);
    }

    #[test]
    fn test_slot_zero_minus_one_underflow_fails() {
        let mut history = [0, 22, 33];
        assert!(resolve_offset(&mut history, 3, 0).is_err());
    }
}
