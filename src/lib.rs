pub mod bitstream;
pub mod decompress_gzip;
pub mod decompress_zlib;
pub mod inflate;
pub mod streams;

mod deflate_constants;
mod gzip_constants;
mod huffman;
mod window;

#[macro_use]
extern crate static_assertions;

use crate::decompress_gzip::gzip_decompress;
use crate::decompress_zlib::zlib_decompress;
use crate::streams::chunked_buffer_input::ChunkedBufferInput;
use crate::streams::chunked_buffer_output::{ChunkedBufferOutput, RunningChecksum};
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub use crate::inflate::{Inflated, InflateStatus, Inflater};

const DEFAULT_BUF_SIZE: usize = 64 * 1024;

/*
 * Result of a failed core decode. All of these are terminal: the decoder
 * latches the error and refuses further work until reset().
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflateError {
    /* Operation called in an invalid order, e.g. a dictionary installed
     * after input was consumed. */
    BadState,
    /* Window or table storage could not be allocated. */
    Oom,
    /* Reserved block type, or stored length/complement mismatch. */
    BadBlock,
    /* Malformed code description in a dynamic block header. */
    BadTree,
    /* The stream used a bit pattern with no assigned codeword. */
    BadCode,
    /* Back-reference distance exceeds the available history. */
    FarOffset,
    /* The input was declared final but the stream needs more of it. */
    InputEnd,
}

impl fmt::Display for InflateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            InflateError::BadState => "operation called in an invalid decoder state",
            InflateError::Oom => "window or table allocation failed",
            InflateError::BadBlock => "invalid block header",
            InflateError::BadTree => "malformed code lengths in dynamic block",
            InflateError::BadCode => "bit pattern with no assigned codeword",
            InflateError::FarOffset => "back-reference beyond available history",
            InflateError::InputEnd => "compressed stream is truncated",
        };
        f.write_str(message)
    }
}

impl std::error::Error for InflateError {}

/* The wrapper layer's own taxonomy on top of the core errors. */
#[derive(Debug)]
pub enum StreamError {
    /* Malformed gzip or zlib framing. */
    Format(&'static str),
    /* Trailer checksum does not match the decompressed data. */
    Checksum { expected: u32, found: u32 },
    /* gzip trailer length does not match the decompressed data. */
    Length { expected: u32, found: u32 },
    /* The stream ends inside a header or trailer. */
    Truncated,
    /* The output callback refused more data. */
    Sink,
    Inflate(InflateError),
}

impl From<InflateError> for StreamError {
    fn from(error: InflateError) -> Self {
        StreamError::Inflate(error)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Format(reason) => write!(f, "invalid stream: {reason}"),
            StreamError::Checksum { expected, found } => {
                write!(f, "checksum mismatch: stored {expected:#010x}, computed {found:#010x}")
            }
            StreamError::Length { expected, found } => {
                write!(f, "length mismatch: stored {expected}, produced {found}")
            }
            StreamError::Truncated => f.write_str("stream truncated inside header or trailer"),
            StreamError::Sink => f.write_str("output sink refused data"),
            StreamError::Inflate(error) => write!(f, "deflate stream invalid: {error}"),
        }
    }
}

impl std::error::Error for StreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StreamError::Inflate(error) => Some(error),
            _ => None,
        }
    }
}

/* Decompress a gzip file through a caller-supplied sink, member by member.
 * Returns the total number of decompressed bytes. */
pub fn decompress_gzip_file_buffered(
    file: impl AsRef<Path>,
    func: impl FnMut(&[u8]) -> Result<(), ()>,
    buf_size: usize,
) -> Result<u64, StreamError> {
    let mut read_file = File::open(file).map_err(|_| StreamError::Truncated)?;
    let mut input = ChunkedBufferInput::new(|buf| read_file.read(buf).unwrap_or(0), buf_size);
    let mut output = ChunkedBufferOutput::new(func, buf_size, RunningChecksum::crc32());

    let mut inflater = Inflater::new();
    let mut total = 0;
    while input.has_data() {
        total += gzip_decompress(&mut inflater, &mut input, &mut output)?.written;
    }
    Ok(total)
}

fn slice_reader(data: &[u8]) -> impl FnMut(&mut [u8]) -> usize + '_ {
    let mut position = 0;
    move |buf: &mut [u8]| {
        let count = (data.len() - position).min(buf.len());
        buf[..count].copy_from_slice(&data[position..position + count]);
        position += count;
        count
    }
}

/* Decompress a whole in-memory gzip stream (all members). */
pub fn gzip_decompress_to_vec(data: &[u8]) -> Result<Vec<u8>, StreamError> {
    let mut out = Vec::new();
    {
        let mut input = ChunkedBufferInput::new(slice_reader(data), DEFAULT_BUF_SIZE);
        let mut output = ChunkedBufferOutput::new(
            |chunk| {
                out.extend_from_slice(chunk);
                Ok(())
            },
            DEFAULT_BUF_SIZE,
            RunningChecksum::crc32(),
        );
        let mut inflater = Inflater::new();
        while input.has_data() {
            gzip_decompress(&mut inflater, &mut input, &mut output)?;
        }
    }
    Ok(out)
}

/* Decompress a whole in-memory zlib stream. */
pub fn zlib_decompress_to_vec(data: &[u8]) -> Result<Vec<u8>, StreamError> {
    zlib_decompress_to_vec_with_dictionary(data, None)
}

pub fn zlib_decompress_to_vec_with_dictionary(
    data: &[u8],
    dictionary: Option<&[u8]>,
) -> Result<Vec<u8>, StreamError> {
    let mut out = Vec::new();
    {
        let mut input = ChunkedBufferInput::new(slice_reader(data), DEFAULT_BUF_SIZE);
        let mut output = ChunkedBufferOutput::new(
            |chunk| {
                out.extend_from_slice(chunk);
                Ok(())
            },
            DEFAULT_BUF_SIZE,
            RunningChecksum::adler32(),
        );
        let mut inflater = Inflater::new();
        zlib_decompress(&mut inflater, &mut input, &mut output, dictionary)?;
    }
    Ok(out)
}

/* Decompress a whole in-memory raw DEFLATE stream. */
pub fn inflate_to_vec(data: &[u8]) -> Result<Vec<u8>, InflateError> {
    let mut inflater = Inflater::new();
    inflater.reset()?;
    let mut out = Vec::new();
    let mut buf = vec![0u8; DEFAULT_BUF_SIZE];
    let mut position = 0;
    loop {
        let res = inflater.inflate(&data[position..], &mut buf, true)?;
        position += res.consumed;
        out.extend_from_slice(&buf[..res.written]);
        match res.status {
            InflateStatus::Finished => return Ok(out),
            InflateStatus::TargetExhausted => {}
            /* Unreachable with final input, which turns this into an
             * InputEnd error instead. */
            InflateStatus::SourceExhausted => return Err(InflateError::InputEnd),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use rayon::prelude::*;
    use std::io::Write;

    #[test]
    fn independent_decoders_run_in_parallel() {
        let streams: Vec<(Vec<u8>, Vec<u8>)> = (0..64u32)
            .map(|seed| {
                let plain: Vec<u8> = (0..40_000u32)
                    .map(|i| (i.wrapping_mul(seed + 3) >> 5) as u8 % 13 + b'a')
                    .collect();
                let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
                encoder.write_all(&plain).unwrap();
                (encoder.finish().unwrap(), plain)
            })
            .collect();

        streams.par_iter().for_each(|(compressed, plain)| {
            let out = gzip_decompress_to_vec(compressed).unwrap();
            assert_eq!(&out, plain);
        });
    }
}
