//! Binary wire formats
//!
//! Versioned CBOR encodings for the two durable payloads: a word diff (the
//! chunk/snapshot wire format consumed by downstream sidecars) and the full
//! recovery point. CBOR is self-describing, so a reader can reconstruct the
//! mapping without out-of-band schema knowledge, and the leading version
//! tag keeps the format stable across writer/reader revisions.
//!
//! Word diff layout:    `[version, {word: count, ...}]`
//! Recovery layout:     `[version, total, agg_size, focus_period,
//!                       long, focus, [chunk, ...], {word: translation}]`
//! Chunks appear oldest to newest.

use std::collections::HashMap;

use minicbor::{Decoder, Encoder};

use crate::diff::Count;
use crate::error::{Error, Result};
use crate::snapshot::RecoveryPoint;

/// Version tag on every serialized word diff.
pub const DIFF_FORMAT_VERSION: u32 = 1;

/// Version tag on the recovery file.
pub const RECOVERY_FORMAT_VERSION: u32 = 1;

/// Encode a word→count table.
pub fn encode_diff(counts: &HashMap<String, Count>) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(16 + counts.len() * 16);
    let mut encoder = Encoder::new(&mut buf);
    encoder.array(2)?.u32(DIFF_FORMAT_VERSION)?;
    encode_counts(&mut encoder, counts)?;
    Ok(buf)
}

/// Decode a word→count table.
pub fn decode_diff(bytes: &[u8]) -> Result<HashMap<String, Count>> {
    let mut decoder = Decoder::new(bytes);
    expect_array(&mut decoder, 2, "word diff")?;
    expect_version(&mut decoder, DIFF_FORMAT_VERSION, "word diff")?;
    decode_counts(&mut decoder)
}

/// Encode a full recovery point.
pub fn encode_recovery(point: &RecoveryPoint) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = Encoder::new(&mut buf);
    encoder
        .array(8)?
        .u32(RECOVERY_FORMAT_VERSION)?
        .u64(point.total_messages)?
        .u64(point.agg_size)?
        .u64(point.focus_period as u64)?;
    encode_counts(&mut encoder, &point.long)?;
    encode_counts(&mut encoder, &point.focus)?;
    encoder.array(point.chunks.len() as u64)?;
    for chunk in &point.chunks {
        encode_counts(&mut encoder, chunk)?;
    }
    encoder.map(point.translations.len() as u64)?;
    for (word, translation) in &point.translations {
        encoder.str(word)?.str(translation)?;
    }
    Ok(buf)
}

/// Decode a full recovery point.
pub fn decode_recovery(bytes: &[u8]) -> Result<RecoveryPoint> {
    let mut decoder = Decoder::new(bytes);
    expect_array(&mut decoder, 8, "recovery point")?;
    expect_version(&mut decoder, RECOVERY_FORMAT_VERSION, "recovery point")?;

    let total_messages = decoder.u64()?;
    let agg_size = decoder.u64()?;
    let focus_period = decoder.u64()? as usize;
    let long = decode_counts(&mut decoder)?;
    let focus = decode_counts(&mut decoder)?;

    let chunk_count = decoder
        .array()?
        .ok_or_else(|| indefinite_length("chunk list"))?;
    let mut chunks = Vec::with_capacity(chunk_count as usize);
    for _ in 0..chunk_count {
        chunks.push(decode_counts(&mut decoder)?);
    }

    let translation_count = decoder
        .map()?
        .ok_or_else(|| indefinite_length("translation cache"))?;
    let mut translations = HashMap::with_capacity(translation_count as usize);
    for _ in 0..translation_count {
        let word = decoder.str()?.to_owned();
        let translation = decoder.str()?.to_owned();
        translations.insert(word, translation);
    }

    Ok(RecoveryPoint {
        total_messages,
        agg_size,
        focus_period,
        long,
        focus,
        chunks,
        translations,
    })
}

fn encode_counts(
    encoder: &mut Encoder<&mut Vec<u8>>,
    counts: &HashMap<String, Count>,
) -> Result<()> {
    encoder.map(counts.len() as u64)?;
    for (word, count) in counts {
        encoder.str(word)?.i64(*count)?;
    }
    Ok(())
}

fn decode_counts(decoder: &mut Decoder) -> Result<HashMap<String, Count>> {
    let len = decoder.map()?.ok_or_else(|| indefinite_length("word map"))?;
    let mut counts = HashMap::with_capacity(len as usize);
    for _ in 0..len {
        let word = decoder.str()?.to_owned();
        let count = decoder.i64()?;
        counts.insert(word, count);
    }
    Ok(counts)
}

fn expect_array(decoder: &mut Decoder, expected: u64, what: &str) -> Result<()> {
    let len = decoder.array()?.ok_or_else(|| indefinite_length(what))?;
    if len != expected {
        return Err(Error::Decode(minicbor::decode::Error::message(format!(
            "{what}: expected {expected}-element array, got {len}"
        ))));
    }
    Ok(())
}

fn expect_version(decoder: &mut Decoder, expected: u32, what: &str) -> Result<()> {
    let version = decoder.u32()?;
    if version != expected {
        return Err(Error::Decode(minicbor::decode::Error::message(format!(
            "{what}: unsupported format version {version}"
        ))));
    }
    Ok(())
}

fn indefinite_length(what: &str) -> Error {
    Error::Decode(minicbor::decode::Error::message(format!(
        "{what}: indefinite-length encoding is not supported"
    )))
}
