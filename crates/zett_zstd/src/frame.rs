use zett_foundation::const_assert;
use zett_io::InputCursor;

use crate::{FrameError, WINDOW_SIZE_RANGE};

/// Decoded frame header. Variable size, from 2 bytes up to 14 depending on
/// which optional fields the descriptor enables.
///
/// https://www.rfc-editor.org/rfc/rfc8878#name-frame-header
pub struct Header {
    descriptor: HeaderDescriptor,
    window_descriptor: WindowDescriptor,
    content_size: Option<u64>,
}

impl Header {
    pub fn read(src: &mut InputCursor) -> Result<Self, FrameError> {
        let descriptor = HeaderDescriptor::read(src.read_u8()?)?;

        let window_descriptor = if descriptor.is_single_segment() {
            WindowDescriptor(0)
        } else {
            WindowDescriptor(src.read_u8()?)
        };

        // dictionary frames are rejected outright
        match descriptor.did_field_size() {
            DIDFieldSize::Zero => {}
            size => {
                let id = src.read_uint(size.as_usize())? as u32;
                return Err(FrameError::DictionaryUnsupported(id));
            }
        }

        let content_size = match descriptor.fcs_field_size() {
            FCSFieldSize::Zero => None,
            size => Some(src.read_uint(size.as_usize())? + size.offset()),
        };

        let header = Self {
            descriptor,
            window_descriptor,
            content_size,
        };
        if header.descriptor.is_single_segment() {
            assert!(
                header.content_size.is_some(),
                "Single segment implies Content Size is present"
            )
        }

        Ok(header)
    }

    /// The original (uncompressed) size; `None` when the header does not
    /// declare it.
    pub fn content_size(&self) -> Option<u64> {
        self.content_size
    }

    /// Minimum memory buffer size needed to decode the frame. For
    /// single-segment frames this is the content size itself.
    pub fn window_size(&self) -> Result<u64, FrameError> {
        if self.descriptor.is_single_segment() {
            return Ok(self.content_size.expect("validated on read"));
        }

        let size = self.window_descriptor.size();
        if !WINDOW_SIZE_RANGE.contains(&size) {
            return Err(FrameError::WindowSizeOutOfBounds(size));
        }

        Ok(size)
    }

    /// Whether the frame ends with a 32-bit content checksum.
    pub fn has_checksum(&self) -> bool {
        self.descriptor.content_checksum_flag() == 1
    }
}

/// The first header byte. It describes which other fields are present, so
/// decoding it is enough to tell the size of [`Header`].
///
/// | Bit Number | Field Name              |
/// |------------|-------------------------|
/// | 7-6        | Frame_Content_Size_Flag |
/// | 5          | Single_Segment_Flag     |
/// | 4          | (unused)                |
/// | 3          | (reserved)              |
/// | 2          | Content_Checksum_Flag   |
/// | 1-0        | Dictionary_ID_Flag      |
struct HeaderDescriptor(u8);

impl HeaderDescriptor {
    fn read(val: u8) -> Result<Self, FrameError> {
        let ret = Self(val);

        if ret.reserved_bit() != 0 {
            return Err(FrameError::ReservedBitSet);
        }

        Ok(ret)
    }

    fn fcs_flag(&self) -> u8 {
        self.0 >> 6
    }

    /// The number of bytes used by the content-size field.
    ///
    /// | fcs_flag       | 0      | 1 | 2 | 3 |
    /// |----------------|--------|---|---|---|
    /// | fcs_field_size | 0 or 1 | 2 | 4 | 8 |
    ///
    /// When the flag is 0, the field is present (1 byte) only for
    /// single-segment frames.
    fn fcs_field_size(&self) -> FCSFieldSize {
        match self.fcs_flag() {
            0 if self.is_single_segment() => FCSFieldSize::One,
            0 => FCSFieldSize::Zero,
            1 => FCSFieldSize::Two,
            2 => FCSFieldSize::Four,
            _ => FCSFieldSize::Eight,
        }
    }

    /// Data must be regenerated within a single continuous memory segment;
    /// the window descriptor is skipped, and the content size is present.
    const fn single_segment_flag(&self) -> u8 {
        (self.0 & 0x20) >> 5
    }

    fn is_single_segment(&self) -> bool {
        self.single_segment_flag() == 1
    }

    fn reserved_bit(&self) -> u8 {
        (self.0 & 0x8) >> 3
    }

    fn content_checksum_flag(&self) -> u8 {
        (self.0 & 0x04) >> 2
    }

    /// The number of bytes used by the dictionary-id field.
    ///
    /// | dictionary_id  | 0 | 1 | 2 | 3 |
    /// |----------------|---|---|---|---|
    /// | did_field_size | 0 | 1 | 2 | 4 |
    fn did_field_size(&self) -> DIDFieldSize {
        match self.0 & 0x03 {
            0 => DIDFieldSize::Zero,
            1 => DIDFieldSize::One,
            2 => DIDFieldSize::Two,
            _ => DIDFieldSize::Four,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum FCSFieldSize {
    Zero = 0,
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
}

const_assert!(FCSFieldSize::Zero as usize == 0);
const_assert!(FCSFieldSize::One as usize == 1);
const_assert!(FCSFieldSize::Two as usize == 2);
const_assert!(FCSFieldSize::Four as usize == 4);
const_assert!(FCSFieldSize::Eight as usize == 8);

impl FCSFieldSize {
    const fn as_usize(self) -> usize {
        self as usize
    }

    /// The 2-byte encoding is biased by 256 so it never overlaps the
    /// 1-byte range.
    const fn offset(&self) -> u64 {
        match self {
            Self::Two => 256,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DIDFieldSize {
    Zero = 0,
    One = 1,
    Two = 2,
    Four = 4,
}

impl DIDFieldSize {
    pub const fn as_usize(self) -> usize {
        self as usize
    }
}

/// Window size in exponent/mantissa form.
///
/// | Bit number | 7-3      | 2-0      |
/// |------------|----------|----------|
/// | Field name | exponent | mantissa |
struct WindowDescriptor(u8);

impl WindowDescriptor {
    const fn exponent(&self) -> u8 {
        self.0 >> 3
    }

    const fn mantissa(&self) -> u8 {
        self.0 & 0x7
    }

    const fn size(&self) -> u64 {
        let window_log = 10 + self.exponent() as u64;
        let window_base = 1u64 << window_log;
        let window_add = (window_base / 8) * self.mantissa() as u64;
        window_base + window_add
    }
}
