use crate::inflate::Inflater;
use crate::streams::chunked_buffer_input::ChunkedBufferInput;
use crate::streams::chunked_buffer_output::{ChunkedBufferOutput, OutStreamResult};
use crate::streams::run_inflate;
use crate::StreamError;
use simd_adler32::Adler32;

const ZLIB_CM_DEFLATE: u8 = 8;
const ZLIB_FDICT: u8 = 0x20;

/*
 * Decode a zlib stream (RFC 1950): CMF/FLG header, optional preset
 * dictionary id, DEFLATE payload, big-endian Adler-32 trailer. The output
 * facade must be carrying an Adler-32 checksum. If the stream requires a
 * preset dictionary the caller must supply the identical bytes the
 * compressor used.
 */
pub fn zlib_decompress(
    inflater: &mut Inflater,
    input: &mut ChunkedBufferInput,
    output: &mut ChunkedBufferOutput,
    dictionary: Option<&[u8]>,
) -> Result<OutStreamResult, StreamError> {
    let cmf = input.read_byte().ok_or(StreamError::Truncated)?;
    let flg = input.read_byte().ok_or(StreamError::Truncated)?;

    if cmf & 0x0f != ZLIB_CM_DEFLATE {
        return Err(StreamError::Format("unsupported compression method"));
    }
    if cmf >> 4 > 7 {
        return Err(StreamError::Format("window size above 32 KiB"));
    }
    if (u16::from(cmf) * 256 + u16::from(flg)) % 31 != 0 {
        return Err(StreamError::Format("header check failed"));
    }

    inflater.reset()?;

    if (flg & ZLIB_FDICT) != 0 {
        let dict_id = input.read_be_u32().ok_or(StreamError::Truncated)?;
        let dict = dictionary.ok_or(StreamError::Format("preset dictionary required"))?;
        let mut adler = Adler32::new();
        adler.write(dict);
        if adler.finish() != dict_id {
            return Err(StreamError::Format("preset dictionary id mismatch"));
        }
        inflater.set_dictionary(dict)?;
    }

    run_inflate(inflater, input, output)?;
    let result = output.finish()?;

    let stored_adler = input.read_be_u32().ok_or(StreamError::Truncated)?;
    if result.checksum != stored_adler {
        return Err(StreamError::Checksum {
            expected: stored_adler,
            found: result.checksum,
        });
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use crate::{zlib_decompress_to_vec, zlib_decompress_to_vec_with_dictionary, StreamError};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use simd_adler32::Adler32;
    use std::io::Write;

    fn zlib(plain: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(plain).unwrap();
        encoder.finish().unwrap()
    }

    fn adler(data: &[u8]) -> u32 {
        let mut hasher = Adler32::new();
        hasher.write(data);
        hasher.finish()
    }

    #[test]
    fn roundtrips_through_flate2() {
        for size in [0usize, 1, 333, 100_000] {
            let plain: Vec<u8> = (0..size).map(|i| (i * 7 % 256) as u8).collect();
            let out = zlib_decompress_to_vec(&zlib(&plain)).unwrap();
            assert_eq!(out, plain, "size {size}");
        }
    }

    #[test]
    fn corrupted_adler_is_detected() {
        let mut data = zlib(b"adler-checked payload");
        let last = data.len() - 1;
        data[last] ^= 0x40;
        assert!(matches!(
            zlib_decompress_to_vec(&data),
            Err(StreamError::Checksum { .. })
        ));
    }

    #[test]
    fn bad_method_and_bad_fcheck_are_rejected() {
        let data = zlib(b"x");
        let mut bad_method = data.clone();
        bad_method[0] = (bad_method[0] & 0xf0) | 7;
        assert!(matches!(
            zlib_decompress_to_vec(&bad_method),
            Err(StreamError::Format(_))
        ));

        let mut bad_check = data;
        bad_check[1] ^= 0x01;
        assert!(matches!(
            zlib_decompress_to_vec(&bad_check),
            Err(StreamError::Format(_))
        ));
    }

    /* Hand-assemble an FDICT stream whose single block is one
     * back-reference into the dictionary (fixed Huffman, length 20 at
     * distance 20). */
    fn fdict_stream(dict: &[u8]) -> Vec<u8> {
        let cmf = 0x78u8;
        let mut flg = super::ZLIB_FDICT;
        let check = (u16::from(cmf) * 256 + u16::from(flg)) % 31;
        if check != 0 {
            flg += (31 - check) as u8;
        }
        let mut data = vec![cmf, flg];
        data.extend_from_slice(&adler(dict).to_be_bytes());
        data.extend_from_slice(&[0xc3, 0x26, 0x06, 0x00]);
        data.extend_from_slice(&adler(dict).to_be_bytes());
        data
    }

    #[test]
    fn preset_dictionary_stream_decodes() {
        let dict = b"The quick brown fox ";
        let data = fdict_stream(dict);
        let out = zlib_decompress_to_vec_with_dictionary(&data, Some(dict)).unwrap();
        assert_eq!(out.as_slice(), dict);
    }

    #[test]
    fn missing_dictionary_is_rejected() {
        let dict = b"The quick brown fox ";
        let data = fdict_stream(dict);
        assert!(matches!(
            zlib_decompress_to_vec(&data),
            Err(StreamError::Format(_))
        ));
    }

    #[test]
    fn wrong_dictionary_id_is_rejected() {
        let dict = b"The quick brown fox ";
        let data = fdict_stream(dict);
        assert!(matches!(
            zlib_decompress_to_vec_with_dictionary(&data, Some(b"some other dict")),
            Err(StreamError::Format(_))
        ));
    }
}
