use crate::codes::{literals_length_code, match_length_code};
use crate::MAX_BLOCK_SIZE;

/// Sequences and literals accumulated while matching one block, plus the
/// code arrays derived from them before entropy coding.
///
/// Offsets are stored in wire form: repeat codes 1-3, or the real
/// distance biased by 3.
pub(crate) struct SequenceStore {
    pub literals: Vec<u8>,

    pub literal_lengths: Vec<u32>,
    /// Match lengths minus the 3-byte minimum.
    pub match_lengths: Vec<u32>,
    pub offsets: Vec<u32>,

    pub literal_length_codes: Vec<u8>,
    pub match_length_codes: Vec<u8>,
    pub offset_codes: Vec<u8>,
}

impl SequenceStore {
    pub fn new() -> Self {
        let max_sequences = MAX_BLOCK_SIZE / 3;
        Self {
            literals: Vec::with_capacity(MAX_BLOCK_SIZE),
            literal_lengths: Vec::with_capacity(max_sequences),
            match_lengths: Vec::with_capacity(max_sequences),
            offsets: Vec::with_capacity(max_sequences),
            literal_length_codes: Vec::with_capacity(max_sequences),
            match_length_codes: Vec::with_capacity(max_sequences),
            offset_codes: Vec::with_capacity(max_sequences),
        }
    }

    pub fn reset(&mut self) {
        self.literals.clear();
        self.literal_lengths.clear();
        self.match_lengths.clear();
        self.offsets.clear();
        self.literal_length_codes.clear();
        self.match_length_codes.clear();
        self.offset_codes.clear();
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Record one sequence: the literal run preceding the match, the wire
    /// offset code (before the +1 bias), and the match length minus the
    /// minimum match.
    #[inline(always)]
    pub fn store_sequence(
        &mut self,
        literals: &[u8],
        offset_code: u32,
        match_length_base: u32,
    ) {
        self.literals.extend_from_slice(literals);
        self.literal_lengths.push(literals.len() as u32);
        self.offsets.push(offset_code + 1);
        self.match_lengths.push(match_length_base);
    }

    /// The literal tail after the final match of the block.
    pub fn append_literals(&mut self, literals: &[u8]) {
        self.literals.extend_from_slice(literals);
    }

    pub fn generate_codes(&mut self) {
        self.literal_length_codes.clear();
        self.match_length_codes.clear();
        self.offset_codes.clear();

        for i in 0..self.len() {
            self.literal_length_codes
                .push(literals_length_code(self.literal_lengths[i]));
            self.match_length_codes
                .push(match_length_code(self.match_lengths[i]));
            self.offset_codes
                .push(zett_foundation::highest_bit(self.offsets[i]) as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_and_codes() {
        let mut store = SequenceStore::new();

        store.store_sequence(b"hello", 0, 4); // rep0, match length 7
        store.store_sequence(b"", 42 + 2, 130 - 3); // distance 42
        store.append_literals(b"tail");

        assert_eq!(store.len(), 2);
        assert_eq!(store.literals, b"hellotail");
        assert_eq!(store.offsets, [1, 45]);

        store.generate_codes();
        assert_eq!(store.literal_length_codes, [5, 0]);
        // offset code is the position of the value's highest bit
        assert_eq!(store.offset_codes, [0, 5]);
        assert_eq!(store.match_length_codes, [4, 42]);
    }
}
