//! Cross-decoder checks: every frame this encoder produces must be
//! accepted by an independent Zstandard implementation.

use std::io::Cursor;

use zett_zstd::Compressor;

fn compress(input: &[u8]) -> Vec<u8> {
    let mut output = vec![0u8; Compressor::max_compressed_length(input.len())];
    let written = Compressor::new().compress(input, &mut output).unwrap();
    output.truncate(written);
    output
}

fn ruzstd_decode(frame: &[u8]) -> Vec<u8> {
    let mut decoder =
        ruzstd::decoding::StreamingDecoder::new(Cursor::new(frame)).unwrap();
    let mut out = Vec::new();
    std::io::copy(&mut decoder, &mut out).unwrap();
    out
}

fn assert_foreign_decodable(input: &[u8]) {
    let frame = compress(input);
    assert_eq!(
        ruzstd_decode(&frame),
        input,
        "ruzstd disagreed on a {}-byte input",
        input.len()
    );
}

fn lcg_bytes(len: usize, mut seed: u32) -> Vec<u8> {
    let mut data = Vec::with_capacity(len + 4);
    while data.len() < len {
        seed = seed.wrapping_mul(1664525).wrapping_add(1013904223);
        data.extend_from_slice(&seed.to_le_bytes());
    }
    data.truncate(len);
    data
}

#[test]
fn test_foreign_decoder_accepts_empty() {
    assert_foreign_decodable(b"");
}

#[test]
fn test_foreign_decoder_accepts_tiny() {
    assert_foreign_decodable(b"a");
    assert_foreign_decodable(b"hello, interop");
}

#[test]
fn test_foreign_decoder_accepts_rle() {
    assert_foreign_decodable(&vec![0xAA; 4096]);
}

#[test]
fn test_foreign_decoder_accepts_text() {
    let text: Vec<u8> = b"across implementations, the stream is the contract. "
        .iter()
        .copied()
        .cycle()
        .take(64 * 1024)
        .collect();
    assert_foreign_decodable(&text);
}

#[test]
fn test_foreign_decoder_accepts_noise() {
    assert_foreign_decodable(&lcg_bytes(130 * 1024, 0xBEEF));
}

#[test]
fn test_foreign_decoder_accepts_mixed_blocks() {
    let mut input: Vec<u8> = b"structured prefix structured prefix "
        .iter()
        .copied()
        .cycle()
        .take(200_000)
        .collect();
    input.extend_from_slice(&lcg_bytes(150_000, 3));
    input.extend_from_slice(&vec![7u8; 50_000]);

    assert_foreign_decodable(&input);
}

#[test]
fn test_foreign_decoder_accepts_all_levels() {
    let input: Vec<u8> = b"level sweep payload, moderately repetitive. "
        .iter()
        .copied()
        .cycle()
        .take(40_000)
        .collect();

    for level in 1..=9 {
        let mut output = vec![0u8; Compressor::max_compressed_length(input.len())];
        let written = Compressor::new()
            .compress_with_level(&input, &mut output, level)
            .unwrap();

        assert_eq!(ruzstd_decode(&output[..written]), input, "level {}", level);
    }
}
