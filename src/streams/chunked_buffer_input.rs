use std::cmp::min;

/*
 * Input buffer refilled from a caller-supplied producer. The unconsumed
 * span is handed to the core as an inflate source; bytes the core did not
 * consume stay in place for the next round. Header parsing uses the
 * byte-wise reads, which refill transparently.
 */
pub struct ChunkedBufferInput<'a> {
    buffer: Box<[u8]>,
    start: usize,
    end: usize,
    eof: bool,
    func: Box<dyn FnMut(&mut [u8]) -> usize + 'a>,
}

impl<'a> ChunkedBufferInput<'a> {
    pub fn new<F: FnMut(&mut [u8]) -> usize + 'a>(read_func: F, buf_size: usize) -> Self {
        Self {
            buffer: vec![0; buf_size.max(64)].into_boxed_slice(),
            start: 0,
            end: 0,
            eof: false,
            func: Box::new(read_func),
        }
    }

    /* Compact the unconsumed tail to the front and pull more bytes.
     * Returns whether anything new arrived. */
    pub fn refill(&mut self) -> bool {
        if self.eof {
            return false;
        }
        if self.start > 0 {
            self.buffer.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        let count = (self.func)(&mut self.buffer[self.end..]);
        self.end += count;
        if count == 0 {
            self.eof = true;
        }
        count > 0
    }

    #[inline]
    pub fn remaining(&self) -> &[u8] {
        &self.buffer[self.start..self.end]
    }

    #[inline]
    pub fn consume(&mut self, count: usize) {
        self.start += count;
    }

    /* The producer has signalled end of data; what is buffered is all
     * there will ever be. */
    #[inline]
    pub fn at_eof(&self) -> bool {
        self.eof
    }

    /* Refill if empty; true while at least one byte is available. */
    pub fn has_data(&mut self) -> bool {
        if self.start == self.end {
            self.refill();
        }
        self.start < self.end
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        if self.start == self.end && !self.refill() {
            return None;
        }
        let byte = self.buffer[self.start];
        self.start += 1;
        Some(byte)
    }

    pub fn read_le_u16(&mut self) -> Option<u16> {
        let lo = self.read_byte()?;
        let hi = self.read_byte()?;
        Some(u16::from_le_bytes([lo, hi]))
    }

    pub fn read_le_u32(&mut self) -> Option<u32> {
        let lo = self.read_le_u16()?;
        let hi = self.read_le_u16()?;
        Some(u32::from(lo) | (u32::from(hi) << 16))
    }

    pub fn read_be_u32(&mut self) -> Option<u32> {
        self.read_le_u32().map(u32::swap_bytes)
    }

    pub fn skip(&mut self, count: usize) -> bool {
        let mut left = count;
        while left > 0 {
            if self.start == self.end && !self.refill() {
                return false;
            }
            let step = min(left, self.end - self.start);
            self.start += step;
            left -= step;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_cross_refill_boundaries() {
        let data: Vec<u8> = (0u8..200).collect();
        let mut position = 0;
        /* Producer that trickles 3 bytes at a time. */
        let mut input = ChunkedBufferInput::new(
            |buf| {
                let count = (data.len() - position).min(buf.len()).min(3);
                buf[..count].copy_from_slice(&data[position..position + count]);
                position += count;
                count
            },
            64,
        );

        assert_eq!(input.read_byte(), Some(0));
        assert_eq!(input.read_le_u16(), Some(u16::from_le_bytes([1, 2])));
        assert_eq!(input.read_le_u32(), Some(u32::from_le_bytes([3, 4, 5, 6])));
        assert_eq!(input.read_be_u32(), Some(u32::from_be_bytes([7, 8, 9, 10])));
        assert!(input.skip(100));
        assert_eq!(input.read_byte(), Some(111));
        assert!(!input.skip(1000));
        assert!(input.at_eof());
    }
}
