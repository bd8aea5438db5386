/*
 * Output cursor and 32 KiB sliding window.
 *
 * The window is a circular buffer of the most recent decoded bytes: 'end'
 * is the next write slot and 'count' the number of valid bytes, saturating
 * once the buffer fills. The logical start is (end - count) mod 32 KiB.
 * During an inflate call back-references read first from the bytes already
 * written into the caller's target span, and only the part reaching further
 * back comes from the window; the window is brought up to date with the
 * newly emitted bytes when the call returns.
 */

use crate::deflate_constants::DEFLATE_WINDOW_SIZE;
use crate::InflateError;

const WORD_BYTES: usize = std::mem::size_of::<usize>();

/* Write cursor over the caller's output span for one inflate call. */
pub struct Target<'a> {
    data: &'a mut [u8],
    position: usize,
}

impl<'a> Target<'a> {
    #[inline]
    pub fn new(data: &'a mut [u8]) -> Self {
        Self { data, position: 0 }
    }

    #[inline(always)]
    pub fn written(&self) -> usize {
        self.position
    }

    #[inline(always)]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.position == self.data.len()
    }

    #[inline(always)]
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.position]
    }

    #[inline(always)]
    pub fn push_byte(&mut self, byte: u8) {
        self.data[self.position] = byte;
        self.position += 1;
    }

    #[inline(always)]
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
    }

    /*
     * Copy up to 'length' match bytes from 'distance' back within this
     * span, byte by byte so overlapping copies (distance < length)
     * replicate correctly. Returns how many bytes fit.
     */
    pub(crate) fn copy_match(&mut self, distance: usize, length: usize) -> usize {
        debug_assert!(distance >= 1 && distance <= self.position);
        let count = length.min(self.remaining());
        let mut from = self.position - distance;
        for _ in 0..count {
            self.data[self.position] = self.data[from];
            self.position += 1;
            from += 1;
        }
        count
    }

    /*
     * Fast-path variant: the caller guarantees the whole match fits. Wide
     * distances go word-at-a-time until less than a word remains.
     */
    pub(crate) fn copy_match_fast(&mut self, distance: usize, length: usize) {
        debug_assert!(distance >= 1 && distance <= self.position);
        debug_assert!(length <= self.remaining());
        let end = self.position + length;
        let mut from = self.position - distance;
        if distance >= WORD_BYTES {
            while self.position + WORD_BYTES <= end {
                self.data.copy_within(from..from + WORD_BYTES, self.position);
                from += WORD_BYTES;
                self.position += WORD_BYTES;
            }
        }
        while self.position < end {
            self.data[self.position] = self.data[from];
            self.position += 1;
            from += 1;
        }
    }
}

pub(crate) struct Window {
    buffer: Vec<u8>,
    end: usize,
    count: usize,
}

impl Window {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            end: 0,
            count: 0,
        }
    }

    /* Storage is claimed on the first reset and kept afterwards. */
    pub fn allocate(&mut self) -> Result<(), InflateError> {
        if self.buffer.is_empty() {
            self.buffer
                .try_reserve_exact(DEFLATE_WINDOW_SIZE)
                .map_err(|_| InflateError::Oom)?;
            self.buffer.resize(DEFLATE_WINDOW_SIZE, 0);
        }
        Ok(())
    }

    #[inline(always)]
    pub fn is_allocated(&self) -> bool {
        !self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.end = 0;
        self.count = 0;
    }

    #[inline(always)]
    pub fn count(&self) -> usize {
        self.count
    }

    /* Fold newly emitted output into the window; only the last 32 KiB can
     * matter. Copies crossing the physical end are split in two. */
    pub fn feed(&mut self, emitted: &[u8]) {
        let tail = if emitted.len() > DEFLATE_WINDOW_SIZE {
            &emitted[emitted.len() - DEFLATE_WINDOW_SIZE..]
        } else {
            emitted
        };
        if tail.is_empty() {
            return;
        }

        let first = tail.len().min(DEFLATE_WINDOW_SIZE - self.end);
        self.buffer[self.end..self.end + first].copy_from_slice(&tail[..first]);
        self.buffer[..tail.len() - first].copy_from_slice(&tail[first..]);

        self.end = (self.end + tail.len()) & (DEFLATE_WINDOW_SIZE - 1);
        self.count = (self.count + emitted.len()).min(DEFLATE_WINDOW_SIZE);
    }

    /*
     * Copy for a back-reference whose source starts 'back' bytes behind
     * the window's write position (the caller has already checked
     * back <= count). Copies at most 'back' bytes; any remainder of the
     * match continues inside the target span itself. Returns the number
     * of bytes produced.
     */
    pub(crate) fn copy_to_target(&self, target: &mut Target, back: usize, length: usize) -> usize {
        debug_assert!(back >= 1 && back <= self.count);
        let count = length.min(back).min(target.remaining());
        let start = (self.end + DEFLATE_WINDOW_SIZE - back) & (DEFLATE_WINDOW_SIZE - 1);

        let first = count.min(DEFLATE_WINDOW_SIZE - start);
        target.extend_from_slice(&self.buffer[start..start + first]);
        target.extend_from_slice(&self.buffer[..count - first]);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(history: &[u8]) -> Window {
        let mut window = Window::new();
        window.allocate().unwrap();
        window.feed(history);
        window
    }

    #[test]
    fn feed_saturates_at_window_size() {
        let mut window = Window::new();
        window.allocate().unwrap();
        window.feed(&vec![7u8; DEFLATE_WINDOW_SIZE + 100]);
        assert_eq!(window.count(), DEFLATE_WINDOW_SIZE);
    }

    #[test]
    fn backref_reads_recent_history() {
        let window = window_with(b"The quick brown fox ");
        let mut out = [0u8; 20];
        let mut target = Target::new(&mut out);
        let copied = window.copy_to_target(&mut target, 20, 20);
        assert_eq!(copied, 20);
        assert_eq!(&out, b"The quick brown fox ");
    }

    #[test]
    fn backref_straddles_the_wrap_point() {
        let mut window = Window::new();
        window.allocate().unwrap();
        /* Push the write position to 10 bytes before the physical end,
         * then feed 20 recognizable bytes across the seam. */
        window.feed(&vec![0u8; DEFLATE_WINDOW_SIZE - 10]);
        let marker: Vec<u8> = (b'a'..b'a' + 20).collect();
        window.feed(&marker);

        let mut out = [0u8; 20];
        let mut target = Target::new(&mut out);
        assert_eq!(window.copy_to_target(&mut target, 20, 20), 20);
        assert_eq!(out.as_slice(), marker.as_slice());
    }

    #[test]
    fn copy_match_replicates_single_byte() {
        let mut out = vec![0u8; 259];
        let mut target = Target::new(&mut out);
        target.push_byte(b'x');
        assert_eq!(target.copy_match(1, 258), 258);
        assert!(out.iter().all(|&b| b == b'x'));
    }

    #[test]
    fn copy_match_fast_agrees_with_slow_copy() {
        for &(distance, length) in
            &[(1usize, 258usize), (2, 77), (7, 256), (8, 258), (13, 100), (200, 258)]
        {
            let seed: Vec<u8> = (0..distance).map(|i| (i * 31 + 7) as u8).collect();

            let mut slow_buf = vec![0u8; distance + length + 16];
            let mut slow = Target::new(&mut slow_buf);
            slow.extend_from_slice(&seed);
            assert_eq!(slow.copy_match(distance, length), length);

            let mut fast_buf = vec![0u8; distance + length + 16];
            let mut fast = Target::new(&mut fast_buf);
            fast.extend_from_slice(&seed);
            fast.copy_match_fast(distance, length);

            assert_eq!(slow_buf, fast_buf, "distance {distance} length {length}");
        }
    }

    #[test]
    fn truncated_copy_resumes_into_fresh_target() {
        let window = window_with(b"abcdef");
        let mut first = [0u8; 4];
        {
            let mut target = Target::new(&mut first);
            assert_eq!(window.copy_to_target(&mut target, 6, 6), 4);
        }
        assert_eq!(&first, b"abcd");
    }
}
