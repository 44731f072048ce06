use zett_foundation::Histogram;
use zett_io::BitWriter;

use super::store::SequenceStore;
use crate::codes::{literals_length_bits, match_length_bits};
use crate::{
    Error, SequenceChannel, LITERALS_LENGTH_CHANNEL, MATCH_LENGTH_CHANNEL,
    OFFSET_CHANNEL,
};

const SEQUENCE_ENCODING_BASIC: u8 = 0;
const SEQUENCE_ENCODING_RLE: u8 = 1;
const SEQUENCE_ENCODING_COMPRESSED: u8 = 2;

const LONG_NUMBER_OF_SEQUENCES: usize = 0x7F00;

/// FSE compression tables for the three sequence channels, plus the
/// predefined tables built once and shared by every BASIC-mode block.
pub(crate) struct SequenceEncodingContext {
    ll_table: zett_fse::CompressionTable,
    of_table: zett_fse::CompressionTable,
    ml_table: zett_fse::CompressionTable,

    predefined_ll: zett_fse::CompressionTable,
    predefined_of: zett_fse::CompressionTable,
    predefined_ml: zett_fse::CompressionTable,

    counts: [u32; 256],
    normalized: [i16; 256],
}

impl SequenceEncodingContext {
    pub fn new() -> Self {
        Self {
            ll_table: channel_table(&LITERALS_LENGTH_CHANNEL),
            of_table: channel_table(&OFFSET_CHANNEL),
            ml_table: channel_table(&MATCH_LENGTH_CHANNEL),
            predefined_ll: predefined_table(&LITERALS_LENGTH_CHANNEL),
            predefined_of: predefined_table(&OFFSET_CHANNEL),
            predefined_ml: predefined_table(&MATCH_LENGTH_CHANNEL),
            counts: [0; 256],
            normalized: [0; 256],
        }
    }
}

fn channel_table(channel: &SequenceChannel) -> zett_fse::CompressionTable {
    zett_fse::CompressionTable::new(channel.max_accuracy_log(), channel.max_symbol())
}

fn predefined_table(channel: &SequenceChannel) -> zett_fse::CompressionTable {
    let mut normalized = [0i16; 256];
    normalized[..channel.predefined_counts().len()]
        .copy_from_slice(channel.predefined_counts());

    let mut table = zett_fse::CompressionTable::new(
        channel.predefined_accuracy_log(),
        channel.max_symbol(),
    );
    table
        .initialize(
            &normalized,
            channel.max_symbol(),
            channel.predefined_accuracy_log(),
        )
        .expect("predefined distributions are well-formed");
    table
}

/// Serialize the sequences section: count header, per-channel mode byte
/// and table descriptions, then the interleaved FSE/extra-bit stream.
pub(crate) fn compress_sequences(
    dst: &mut [u8],
    store: &SequenceStore,
    ctx: &mut SequenceEncodingContext,
) -> Result<usize, Error> {
    let n = store.len();
    let mut pos = 0usize;

    // count header, mode byte and up to three RLE symbol bytes are
    // written without further checks
    let needed = if n == 0 { 1 } else { 8 };
    if dst.len() < needed {
        return Err(Error::OutputTooSmall { required: needed });
    }

    if n < 128 {
        dst[pos] = n as u8;
        pos += 1;
    } else if n < LONG_NUMBER_OF_SEQUENCES {
        dst[pos] = ((n >> 8) + 0x80) as u8;
        dst[pos + 1] = n as u8;
        pos += 2;
    } else {
        dst[pos] = 0xFF;
        let biased = (n - LONG_NUMBER_OF_SEQUENCES) as u16;
        dst[pos + 1..pos + 3].copy_from_slice(&biased.to_le_bytes());
        pos += 3;
    }

    if n == 0 {
        return Ok(pos);
    }

    let header_pos = pos;
    pos += 1;

    let SequenceEncodingContext {
        ll_table,
        of_table,
        ml_table,
        predefined_ll,
        predefined_of,
        predefined_ml,
        counts,
        normalized,
    } = ctx;

    // literals lengths
    Histogram::count(&store.literal_length_codes, counts);
    let max_symbol =
        Histogram::find_max_symbol(counts, LITERALS_LENGTH_CHANNEL.max_symbol());
    let largest_count = Histogram::find_largest_count(counts, max_symbol);
    let ll_mode = select_encoding_type(
        largest_count,
        n,
        LITERALS_LENGTH_CHANNEL.predefined_accuracy_log(),
        true,
    );
    let ll_ref: &zett_fse::CompressionTable = match ll_mode {
        SEQUENCE_ENCODING_RLE => {
            dst[pos] = store.literal_length_codes[0];
            pos += 1;
            ll_table.initialize_rle(store.literal_length_codes[0]);
            &*ll_table
        }
        SEQUENCE_ENCODING_BASIC => &*predefined_ll,
        _ => {
            pos += build_compression_table(
                ll_table,
                &mut dst[pos..],
                n,
                &LITERALS_LENGTH_CHANNEL,
                &store.literal_length_codes,
                counts,
                max_symbol,
                normalized,
            )?;
            &*ll_table
        }
    };

    // offsets
    Histogram::count(&store.offset_codes, counts);
    let max_symbol = Histogram::find_max_symbol(counts, OFFSET_CHANNEL.max_symbol());
    let largest_count = Histogram::find_largest_count(counts, max_symbol);
    // the predefined offset table only covers codes up to 28
    let default_allowed = max_symbol < OFFSET_CHANNEL.predefined_counts().len() as u8;
    let of_mode = select_encoding_type(
        largest_count,
        n,
        OFFSET_CHANNEL.predefined_accuracy_log(),
        default_allowed,
    );
    let of_ref: &zett_fse::CompressionTable = match of_mode {
        SEQUENCE_ENCODING_RLE => {
            dst[pos] = store.offset_codes[0];
            pos += 1;
            of_table.initialize_rle(store.offset_codes[0]);
            &*of_table
        }
        SEQUENCE_ENCODING_BASIC => &*predefined_of,
        _ => {
            pos += build_compression_table(
                of_table,
                &mut dst[pos..],
                n,
                &OFFSET_CHANNEL,
                &store.offset_codes,
                counts,
                max_symbol,
                normalized,
            )?;
            &*of_table
        }
    };

    // match lengths
    Histogram::count(&store.match_length_codes, counts);
    let max_symbol =
        Histogram::find_max_symbol(counts, MATCH_LENGTH_CHANNEL.max_symbol());
    let largest_count = Histogram::find_largest_count(counts, max_symbol);
    let ml_mode = select_encoding_type(
        largest_count,
        n,
        MATCH_LENGTH_CHANNEL.predefined_accuracy_log(),
        true,
    );
    let ml_ref: &zett_fse::CompressionTable = match ml_mode {
        SEQUENCE_ENCODING_RLE => {
            dst[pos] = store.match_length_codes[0];
            pos += 1;
            ml_table.initialize_rle(store.match_length_codes[0]);
            &*ml_table
        }
        SEQUENCE_ENCODING_BASIC => &*predefined_ml,
        _ => {
            pos += build_compression_table(
                ml_table,
                &mut dst[pos..],
                n,
                &MATCH_LENGTH_CHANNEL,
                &store.match_length_codes,
                counts,
                max_symbol,
                normalized,
            )?;
            &*ml_table
        }
    };

    dst[header_pos] = (ll_mode << 6) | (of_mode << 4) | (ml_mode << 2);

    pos += encode_interleaved(&mut dst[pos..], ml_ref, of_ref, ll_ref, store)?;

    Ok(pos)
}

fn select_encoding_type(
    largest_count: u32,
    sequence_count: usize,
    default_accuracy_log: u8,
    default_allowed: bool,
) -> u8 {
    if largest_count as usize == sequence_count {
        // one symbol throughout; but RLE costs a byte that the default
        // table beats on very short runs
        if default_allowed && sequence_count <= 2 {
            return SEQUENCE_ENCODING_BASIC;
        }
        return SEQUENCE_ENCODING_RLE;
    }

    if default_allowed {
        // fast strategy: a fresh table has to amortize its description
        let dynamic_fse_minimum = ((1usize << default_accuracy_log) * 9) >> 3;
        if sequence_count < dynamic_fse_minimum
            || (largest_count as usize) < sequence_count >> (default_accuracy_log - 1)
        {
            return SEQUENCE_ENCODING_BASIC;
        }
    }

    SEQUENCE_ENCODING_COMPRESSED
}

#[allow(clippy::too_many_arguments)]
fn build_compression_table(
    table: &mut zett_fse::CompressionTable,
    dst: &mut [u8],
    sequence_count: usize,
    channel: &SequenceChannel,
    codes: &[u8],
    counts: &mut [u32; 256],
    max_symbol: u8,
    normalized: &mut [i16; 256],
) -> Result<usize, Error> {
    let table_log = zett_fse::optimal_table_log(
        channel.max_accuracy_log(),
        sequence_count,
        max_symbol,
    );

    // the final symbol rides in the initial state, not in the bitstream
    let mut adjusted_count = sequence_count;
    let last = codes[sequence_count - 1] as usize;
    if counts[last] > 1 {
        counts[last] -= 1;
        adjusted_count -= 1;
    }

    map_encode_err(zett_fse::normalize_counts(
        normalized,
        table_log,
        counts,
        adjusted_count,
        max_symbol,
    ))?;
    map_encode_err(table.initialize(normalized, max_symbol, table_log))?;

    map_encode_err(zett_fse::write_normalized_counts(
        dst, normalized, max_symbol, table_log,
    ))
}

fn encode_interleaved(
    dst: &mut [u8],
    ml_table: &zett_fse::CompressionTable,
    of_table: &zett_fse::CompressionTable,
    ll_table: &zett_fse::CompressionTable,
    store: &SequenceStore,
) -> Result<usize, Error> {
    let mut w = BitWriter::new(dst);
    let last = store.len() - 1;

    let mut ml_state = zett_fse::Encoder::begin(ml_table, store.match_length_codes[last]);
    let mut of_state = zett_fse::Encoder::begin(of_table, store.offset_codes[last]);
    let mut ll_state = zett_fse::Encoder::begin(ll_table, store.literal_length_codes[last]);

    // extra bits of the final sequence go first; the decoder reads them
    // right after initializing its states
    w.put(
        store.literal_lengths[last] as u64,
        literals_length_bits(store.literal_length_codes[last]),
    );
    w.put(
        store.match_lengths[last] as u64,
        match_length_bits(store.match_length_codes[last]),
    );
    map_io_err(w.flush())?;
    w.put(store.offsets[last] as u64, store.offset_codes[last]);
    map_io_err(w.flush())?;

    for i in (0..last).rev() {
        let ll_code = store.literal_length_codes[i];
        let ml_code = store.match_length_codes[i];
        let of_code = store.offset_codes[i];

        of_state.encode(&mut w, of_code);
        ml_state.encode(&mut w, ml_code);
        ll_state.encode(&mut w, ll_code);
        map_io_err(w.flush())?;

        w.put(store.literal_lengths[i] as u64, literals_length_bits(ll_code));
        w.put(store.match_lengths[i] as u64, match_length_bits(ml_code));
        map_io_err(w.flush())?;
        w.put(store.offsets[i] as u64, of_code);
        map_io_err(w.flush())?;
    }

    ml_state.finish(&mut w);
    of_state.finish(&mut w);
    ll_state.finish(&mut w);

    map_io_err(w.finish_with_mark())
}

fn map_io_err<T>(res: Result<T, zett_io::Error>) -> Result<T, Error> {
    res.map_err(|e| match e {
        zett_io::Error::NotEnoughSpace { needed, .. } => {
            Error::OutputTooSmall { required: needed }
        }
        _ => Error::OutputTooSmall { required: 0 },
    })
}

fn map_encode_err<T>(res: Result<T, zett_fse::Error>) -> Result<T, Error> {
    res.map_err(|e| match e {
        zett_fse::Error::IO(zett_io::Error::NotEnoughSpace { needed, .. }) => {
            Error::OutputTooSmall { required: needed }
        }
        _ => Error::OutputTooSmall { required: 0 },
    })
}
