use crate::gzip_constants::*;
use crate::inflate::Inflater;
use crate::streams::chunked_buffer_input::ChunkedBufferInput;
use crate::streams::chunked_buffer_output::{ChunkedBufferOutput, OutStreamResult};
use crate::streams::run_inflate;
use crate::StreamError;

/*
 * Decode one gzip member (RFC 1952): header, DEFLATE payload, CRC-32 and
 * ISIZE trailer. The output facade must be carrying a CRC-32 checksum.
 * Concatenated members are handled by calling this in a loop while input
 * remains.
 */
pub fn gzip_decompress(
    inflater: &mut Inflater,
    input: &mut ChunkedBufferInput,
    output: &mut ChunkedBufferOutput,
) -> Result<OutStreamResult, StreamError> {
    /* ID1, ID2 */
    let id1 = input.read_byte().ok_or(StreamError::Truncated)?;
    let id2 = input.read_byte().ok_or(StreamError::Truncated)?;
    if id1 != GZIP_ID1 || id2 != GZIP_ID2 {
        return Err(StreamError::Format("bad gzip magic"));
    }
    /* CM */
    if input.read_byte().ok_or(StreamError::Truncated)? != GZIP_CM_DEFLATE {
        return Err(StreamError::Format("unsupported compression method"));
    }
    let flg = input.read_byte().ok_or(StreamError::Truncated)?;
    if (flg & GZIP_FRESERVED) != 0 {
        return Err(StreamError::Format("reserved flag bits set"));
    }

    /* MTIME, XFL, OS */
    if !input.skip(6) {
        return Err(StreamError::Truncated);
    }

    /* Extra field */
    if (flg & GZIP_FEXTRA) != 0 {
        let xlen = input.read_le_u16().ok_or(StreamError::Truncated)?;
        if !input.skip(xlen as usize) {
            return Err(StreamError::Truncated);
        }
    }

    /* Original file name (zero terminated) */
    if (flg & GZIP_FNAME) != 0 {
        while input.read_byte().ok_or(StreamError::Truncated)? != 0 {}
    }

    /* File comment (zero terminated) */
    if (flg & GZIP_FCOMMENT) != 0 {
        while input.read_byte().ok_or(StreamError::Truncated)? != 0 {}
    }

    /* CRC16 for the gzip header */
    if (flg & GZIP_FHCRC) != 0 && !input.skip(2) {
        return Err(StreamError::Truncated);
    }

    /* Compressed data */
    inflater.reset()?;
    run_inflate(inflater, input, output)?;
    let result = output.finish()?;

    let stored_crc = input.read_le_u32().ok_or(StreamError::Truncated)?;
    if result.checksum != stored_crc {
        return Err(StreamError::Checksum {
            expected: stored_crc,
            found: result.checksum,
        });
    }

    let stored_size = input.read_le_u32().ok_or(StreamError::Truncated)?;
    if result.written as u32 != stored_size {
        return Err(StreamError::Length {
            expected: stored_size,
            found: result.written as u32,
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use crate::{gzip_decompress_to_vec, StreamError};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(plain: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(plain).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn roundtrips_through_flate2() {
        for size in [0usize, 1, 100, 70_000] {
            let plain: Vec<u8> = (0..size).map(|i| (i % 251) as u8).collect();
            let out = gzip_decompress_to_vec(&gzip(&plain)).unwrap();
            assert_eq!(out, plain, "size {size}");
        }
    }

    #[test]
    fn multi_member_streams_concatenate() {
        let mut data = gzip(b"hello ");
        data.extend_from_slice(&gzip(b"world"));
        assert_eq!(gzip_decompress_to_vec(&data).unwrap(), b"hello world");
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut data = gzip(b"payload");
        data[0] = 0x1e;
        assert!(matches!(
            gzip_decompress_to_vec(&data),
            Err(StreamError::Format(_))
        ));
    }

    #[test]
    fn corrupted_crc_is_detected() {
        let mut data = gzip(b"checksummed payload");
        let crc_offset = data.len() - 8;
        data[crc_offset] ^= 0x01;
        assert!(matches!(
            gzip_decompress_to_vec(&data),
            Err(StreamError::Checksum { .. })
        ));
    }

    #[test]
    fn corrupted_isize_is_detected() {
        let mut data = gzip(b"sized payload");
        let size_offset = data.len() - 4;
        data[size_offset] ^= 0x01;
        assert!(matches!(
            gzip_decompress_to_vec(&data),
            Err(StreamError::Length { .. })
        ));
    }

    #[test]
    fn truncated_trailer_is_detected() {
        let data = gzip(b"cut short");
        assert!(matches!(
            gzip_decompress_to_vec(&data[..data.len() - 3]),
            Err(StreamError::Truncated)
        ));
    }

    #[test]
    fn truncated_payload_is_an_inflate_error() {
        let data = gzip(b"a longer payload that will be cut inside the deflate stream");
        assert!(matches!(
            gzip_decompress_to_vec(&data[..data.len() - 12]),
            Err(StreamError::Inflate(_))
        ));
    }
}
