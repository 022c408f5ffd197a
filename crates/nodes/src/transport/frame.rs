// SPDX-FileCopyrightText: © 2025 Cablekit Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Frame codec.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────┐
//! │ 8 ASCII hex digits   │ body: per sample, left f32 LE, right f32 LE │
//! │ (body length, bytes) │                                          │
//! └──────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Headers are written zero padded and lowercase. Reading accepts either case
//! and leading spaces, which older peers used for padding.

use super::constants::{HEADER_LEN, MAX_BODY_LEN};
use super::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use cablekit_core::format::BYTES_PER_SAMPLE;
use cablekit_core::{Sample, SampleBlock};

/// Render the header for a body of `body_len` bytes.
///
/// # Errors
///
/// Returns [`ProtocolError::Oversized`] if the length needs more than 8 hex digits.
pub fn encode_header(body_len: usize) -> Result<[u8; HEADER_LEN], ProtocolError> {
    if body_len > MAX_BODY_LEN {
        return Err(ProtocolError::Oversized(body_len));
    }
    let text = format!("{body_len:08x}");
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(text.as_bytes());
    Ok(header)
}

/// Parse a header into a body length.
///
/// # Errors
///
/// Returns [`ProtocolError::BadHeader`] unless the header is optional leading
/// spaces followed by at least one hex digit.
pub fn parse_header(header: &[u8; HEADER_LEN]) -> Result<usize, ProtocolError> {
    let bad = || ProtocolError::BadHeader(String::from_utf8_lossy(header).into_owned());

    let text = std::str::from_utf8(header).map_err(|_| bad())?;
    let digits = text.trim_start_matches(' ');
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(bad());
    }
    usize::from_str_radix(digits, 16).map_err(|_| bad())
}

/// Append the body encoding of `block` to `buf`.
pub fn encode_body(block: &SampleBlock, buf: &mut BytesMut) {
    buf.reserve(block.len() * BYTES_PER_SAMPLE);
    for sample in block.samples() {
        buf.put_f32_le(sample.left);
        buf.put_f32_le(sample.right);
    }
}

/// Decode a frame body into a block.
///
/// # Errors
///
/// Returns [`ProtocolError::Decode`] if the body is not a whole number of samples.
pub fn decode_body(mut body: &[u8]) -> Result<SampleBlock, ProtocolError> {
    if body.len() % BYTES_PER_SAMPLE != 0 {
        return Err(ProtocolError::Decode(body.len()));
    }
    let mut samples = Vec::with_capacity(body.len() / BYTES_PER_SAMPLE);
    while body.has_remaining() {
        let left = body.get_f32_le();
        let right = body.get_f32_le();
        samples.push(Sample::new(left, right));
    }
    Ok(SampleBlock::from_samples(samples))
}

/// Encode a complete frame, header and body in one buffer.
///
/// # Errors
///
/// Returns [`ProtocolError::Oversized`] if the block is too large to frame.
pub fn encode(block: &SampleBlock) -> Result<Bytes, ProtocolError> {
    let body_len = block.len() * BYTES_PER_SAMPLE;
    let header = encode_header(body_len)?;
    let mut buf = BytesMut::with_capacity(HEADER_LEN + body_len);
    buf.put_slice(&header);
    encode_body(block, &mut buf);
    Ok(buf.freeze())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_utils::ramp_block;

    #[test]
    fn test_header_is_zero_padded_hex() {
        assert_eq!(&encode_header(900).unwrap(), b"00000384");
        assert_eq!(&encode_header(0).unwrap(), b"00000000");
        assert_eq!(&encode_header(MAX_BODY_LEN).unwrap(), b"ffffffff");
        assert_eq!(encode_header(MAX_BODY_LEN + 1), Err(ProtocolError::Oversized(MAX_BODY_LEN + 1)));
    }

    #[test]
    fn test_parse_header_variants() {
        assert_eq!(parse_header(b"00000384").unwrap(), 900);
        assert_eq!(parse_header(b"     384").unwrap(), 900);
        assert_eq!(parse_header(b"0000ABCD").unwrap(), 0xabcd);

        for bad in [b"0000038z", b"        ", b"-0000384", b"+0000384", b"384     "] {
            assert!(
                matches!(parse_header(bad), Err(ProtocolError::BadHeader(_))),
                "{:?} should be rejected",
                String::from_utf8_lossy(bad)
            );
        }
        assert!(parse_header(&[0xff; HEADER_LEN]).is_err());
    }

    #[test]
    fn test_frame_round_trip_is_bit_exact() {
        let mut samples = ramp_block(-1.0, 0.013, 61).samples().to_vec();
        samples.push(Sample::new(-0.0, f32::MIN_POSITIVE / 2.0));
        samples.push(Sample::new(f32::MAX, f32::NAN));
        let block = SampleBlock::from_samples(samples);

        let frame = encode(&block).unwrap();
        assert_eq!(frame.len(), HEADER_LEN + block.len() * BYTES_PER_SAMPLE);

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&frame[..HEADER_LEN]);
        assert_eq!(parse_header(&header).unwrap(), block.len() * BYTES_PER_SAMPLE);

        let decoded = decode_body(&frame[HEADER_LEN..]).unwrap();
        assert_eq!(decoded.len(), block.len());
        for (a, b) in decoded.samples().iter().zip(block.samples()) {
            assert_eq!(a.left.to_bits(), b.left.to_bits());
            assert_eq!(a.right.to_bits(), b.right.to_bits());
        }
    }

    #[test]
    fn test_body_is_little_endian_left_then_right() {
        let block = SampleBlock::from_samples(vec![Sample::new(0.5, -0.5)]);
        let frame = encode(&block).unwrap();
        assert_eq!(&frame[..HEADER_LEN], b"00000008");
        assert_eq!(&frame[HEADER_LEN..HEADER_LEN + 4], &0.5f32.to_le_bytes());
        assert_eq!(&frame[HEADER_LEN + 4..], &(-0.5f32).to_le_bytes());
    }

    #[test]
    fn test_decode_rejects_partial_sample() {
        assert_eq!(decode_body(&[0u8; 7]), Err(ProtocolError::Decode(7)));
    }
}
