use filebuffer::FileBuffer;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use streaming_inflate_rs::decompress_gzip::gzip_decompress;
use streaming_inflate_rs::decompress_zlib::zlib_decompress;
use streaming_inflate_rs::streams::chunked_buffer_input::ChunkedBufferInput;
use streaming_inflate_rs::streams::chunked_buffer_output::{ChunkedBufferOutput, RunningChecksum};
use streaming_inflate_rs::{inflate_to_vec, Inflater, StreamError};
use structopt::StructOpt;

const BUF_SIZE: usize = 1024 * 512;

#[derive(StructOpt)]
struct ZpipeParams {
    input: PathBuf,
    output: Option<PathBuf>,
    /// Decode and discard, printing statistics only
    #[structopt(short)]
    simulate: bool,
    /// Container format: auto, gzip, zlib or raw
    #[structopt(long, default_value = "auto")]
    format: String,
}

#[derive(Copy, Clone, PartialEq)]
enum Format {
    Gzip,
    Zlib,
    Raw,
}

fn detect_format(data: &[u8]) -> Format {
    if data.len() >= 2 && data[0] == 0x1f && data[1] == 0x8b {
        return Format::Gzip;
    }
    if data.len() >= 2
        && data[0] & 0x0f == 8
        && data[0] >> 4 <= 7
        && (u16::from(data[0]) * 256 + u16::from(data[1])) % 31 == 0
    {
        return Format::Zlib;
    }
    Format::Raw
}

fn decompress(
    data: &[u8],
    format: Format,
    mut sink: impl FnMut(&[u8]) -> Result<(), ()>,
) -> Result<u64, StreamError> {
    if format == Format::Raw {
        let out = inflate_to_vec(data)?;
        let written = out.len() as u64;
        sink(&out).map_err(|_| StreamError::Sink)?;
        return Ok(written);
    }

    let mut position = 0;
    let mut input = ChunkedBufferInput::new(
        |buf| {
            let count = (data.len() - position).min(buf.len());
            buf[..count].copy_from_slice(&data[position..position + count]);
            position += count;
            count
        },
        BUF_SIZE,
    );

    let checksum = match format {
        Format::Gzip => RunningChecksum::crc32(),
        Format::Zlib => RunningChecksum::adler32(),
        Format::Raw => RunningChecksum::none(),
    };
    let mut output = ChunkedBufferOutput::new(&mut sink, BUF_SIZE, checksum);
    let mut inflater = Inflater::new();

    let mut total = 0;
    match format {
        Format::Gzip => {
            /* gzip files may concatenate members. */
            while input.has_data() {
                total += gzip_decompress(&mut inflater, &mut input, &mut output)?.written;
            }
        }
        Format::Zlib => {
            total = zlib_decompress(&mut inflater, &mut input, &mut output, None)?.written;
        }
        Format::Raw => unreachable!(),
    }
    Ok(total)
}

fn main() {
    let params: ZpipeParams = ZpipeParams::from_args();

    let data = FileBuffer::open(&params.input).unwrap();
    let format = match params.format.as_str() {
        "auto" => detect_format(&data),
        "gzip" => Format::Gzip,
        "zlib" => Format::Zlib,
        "raw" => Format::Raw,
        other => {
            eprintln!("unknown format: {other}");
            std::process::exit(2);
        }
    };

    let start = Instant::now();
    let written = if params.simulate {
        decompress(&data, format, |_| Ok(())).unwrap()
    } else {
        let mut write_file = BufWriter::new(
            File::create(
                params
                    .output
                    .clone()
                    .unwrap_or_else(|| params.input.with_extension("")),
            )
            .unwrap(),
        );
        decompress(&data, format, move |chunk| {
            write_file.write_all(chunk).map_err(|_| ())
        })
        .unwrap()
    };

    let elapsed = start.elapsed();
    println!(
        "Decompressed {} bytes in {:?} ({:.2} MB/s)",
        written,
        elapsed,
        written as f64 / 1024.0 / 1024.0 / elapsed.as_secs_f64()
    );
}
