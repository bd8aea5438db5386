use crate::StreamError;
use crc32fast::Hasher;
use simd_adler32::Adler32;

/* Checksum maintained over everything flushed, selected to match the
 * wrapper: CRC-32 for gzip, Adler-32 for zlib. */
pub enum RunningChecksum {
    None,
    Crc32(Hasher),
    Adler32(Adler32),
}

impl RunningChecksum {
    pub fn none() -> Self {
        RunningChecksum::None
    }

    pub fn crc32() -> Self {
        RunningChecksum::Crc32(Hasher::new())
    }

    pub fn adler32() -> Self {
        RunningChecksum::Adler32(Adler32::new())
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            RunningChecksum::None => {}
            RunningChecksum::Crc32(hasher) => hasher.update(data),
            RunningChecksum::Adler32(adler) => adler.write(data),
        }
    }

    fn finalize(&self) -> u32 {
        match self {
            RunningChecksum::None => 0,
            RunningChecksum::Crc32(hasher) => hasher.clone().finalize(),
            RunningChecksum::Adler32(adler) => adler.finish(),
        }
    }

    fn restart(&mut self) {
        *self = match self {
            RunningChecksum::None => RunningChecksum::None,
            RunningChecksum::Crc32(_) => RunningChecksum::crc32(),
            RunningChecksum::Adler32(_) => RunningChecksum::adler32(),
        };
    }
}

pub struct OutStreamResult {
    pub written: u64,
    pub checksum: u32,
}

/*
 * Output buffer flushed to a caller-supplied consumer. The free tail is
 * handed to the core as an inflate target; flushing folds the filled part
 * into the running checksum before passing it on.
 */
pub struct ChunkedBufferOutput<'a> {
    buffer: Box<[u8]>,
    position: usize,
    written: u64,
    checksum: RunningChecksum,
    func: Box<dyn FnMut(&[u8]) -> Result<(), ()> + 'a>,
}

impl<'a> ChunkedBufferOutput<'a> {
    pub fn new<F: FnMut(&[u8]) -> Result<(), ()> + 'a>(
        write_func: F,
        buf_size: usize,
        checksum: RunningChecksum,
    ) -> Self {
        Self {
            buffer: vec![0; buf_size.max(64)].into_boxed_slice(),
            position: 0,
            written: 0,
            checksum,
            func: Box::new(write_func),
        }
    }

    #[inline]
    pub fn space(&mut self) -> &mut [u8] {
        &mut self.buffer[self.position..]
    }

    #[inline]
    pub fn advance(&mut self, count: usize) {
        self.position += count;
    }

    pub fn flush(&mut self) -> Result<(), StreamError> {
        if self.position > 0 {
            self.checksum.update(&self.buffer[..self.position]);
            (self.func)(&self.buffer[..self.position]).map_err(|_| StreamError::Sink)?;
            self.written += self.position as u64;
            self.position = 0;
        }
        Ok(())
    }

    /* Flush, report totals, and restart the counters so the same sink can
     * take a following stream member. */
    pub fn finish(&mut self) -> Result<OutStreamResult, StreamError> {
        self.flush()?;
        let result = OutStreamResult {
            written: self.written,
            checksum: self.checksum.finalize(),
        };
        self.written = 0;
        self.checksum.restart();
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_covers_all_flushes() {
        let mut collected = Vec::new();
        let mut output = ChunkedBufferOutput::new(
            |chunk| {
                collected.extend_from_slice(chunk);
                Ok(())
            },
            64,
            RunningChecksum::crc32(),
        );

        output.space()[..5].copy_from_slice(b"hello");
        output.advance(5);
        output.flush().unwrap();
        output.space()[..6].copy_from_slice(b" world");
        output.advance(6);

        let result = output.finish().unwrap();
        assert_eq!(result.written, 11);
        assert_eq!(result.checksum, crc32fast::hash(b"hello world"));
        drop(output);
        assert_eq!(collected.as_slice(), b"hello world");
    }
}
