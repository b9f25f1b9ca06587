//! Fixed-capacity receive accumulator.
//!
//! One [`Accumulator`] fronts each connection's socket reads. It owns a
//! flat buffer with two cursors: `used` marks how far the decoders have
//! consumed and `valid` marks how far reads have filled. The span
//! between them is the window the decoders work on. Both cursors reset
//! to zero whenever the window drains, so a connection that keeps up
//! never pays for compaction.
//!
//! Compaction only happens inside [`next_line`]: when no terminator is
//! in sight and free space has fallen below [`LOW_WATER`], the window is
//! shifted to the front so the line can keep growing. Consuming never
//! shifts bytes on its own.
//!
//! [`next_line`]: Accumulator::next_line

use tracing::trace;

/// Compaction threshold for [`Accumulator::next_line`].
const LOW_WATER: usize = 256;

#[derive(Debug)]
pub struct Accumulator {
    buf: Box<[u8]>,
    /// consumed up to here
    used: usize,
    /// filled up to here
    valid: usize,
}

impl Accumulator {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { buf: vec![0; capacity].into_boxed_slice(), used: 0, valid: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes currently in the window.
    pub fn len(&self) -> usize {
        self.valid - self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == self.valid
    }

    /// Bytes of tail space available to [`fill`](Accumulator::fill).
    pub fn free(&self) -> usize {
        self.buf.len() - self.valid
    }

    /// Copy in as much of `bytes` as fits; returns how many were taken.
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.free());
        self.buf[self.valid..self.valid + n].copy_from_slice(&bytes[..n]);
        self.valid += n;
        n
    }

    /// Writable tail for a direct socket read; commit the byte count
    /// with [`fill`](Accumulator::fill).
    pub fn space(&mut self) -> &mut [u8] {
        &mut self.buf[self.valid..]
    }

    /// Commit `n` bytes previously read into [`space`](Accumulator::space).
    pub fn fill(&mut self, n: usize) {
        debug_assert!(n <= self.free());
        self.valid += n;
    }

    /// The unconsumed span.
    pub fn window(&self) -> &[u8] {
        &self.buf[self.used..self.valid]
    }

    /// Consume `n` bytes from the front of the window.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.len());
        self.used += n;
        if self.used == self.valid {
            self.used = 0;
            self.valid = 0;
        }
    }

    /// Extract the next `\r\n`-terminated line, without the terminator.
    ///
    /// Consumes the line and its terminator. When no full line is
    /// present and free space has dropped below the low-water mark, the
    /// window is compacted to the front of the buffer; a window that
    /// already spans the whole buffer with no terminator is the caller's
    /// overflow condition to detect.
    pub fn next_line(&mut self) -> Option<&[u8]> {
        let window = &self.buf[self.used..self.valid];
        let Some(pos) = find_crlf(window) else {
            if self.free() < LOW_WATER && self.used > 0 {
                trace!(window = self.len(), "compacting accumulator");
                self.buf.copy_within(self.used..self.valid, 0);
                self.valid -= self.used;
                self.used = 0;
            }
            return None;
        };
        let start = self.used;
        self.used += pos + 2;
        if self.used == self.valid {
            self.used = 0;
            self.valid = 0;
        }
        Some(&self.buf[start..start + pos])
    }

    /// Forget everything buffered.
    pub fn reset(&mut self) {
        self.used = 0;
        self.valid = 0;
    }
}

fn find_crlf(window: &[u8]) -> Option<usize> {
    window.windows(2).position(|pair| pair == b"\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_reports_partial_when_full() {
        let mut acc = Accumulator::with_capacity(8);
        assert_eq!(acc.append(b"abcdef"), 6);
        assert_eq!(acc.append(b"ghij"), 2);
        assert_eq!(acc.window(), b"abcdefgh");
        assert_eq!(acc.free(), 0);
    }

    #[test]
    fn cursors_reset_when_window_drains() {
        let mut acc = Accumulator::with_capacity(8);
        acc.append(b"abcd");
        acc.consume(2);
        assert_eq!(acc.window(), b"cd");
        acc.consume(2);
        assert!(acc.is_empty());
        // the full capacity is writable again without compaction
        assert_eq!(acc.free(), 8);
        assert_eq!(acc.append(b"efghijkl"), 8);
    }

    #[test]
    fn fill_commits_direct_reads() {
        let mut acc = Accumulator::with_capacity(8);
        let space = acc.space();
        space[..3].copy_from_slice(b"xyz");
        acc.fill(3);
        assert_eq!(acc.window(), b"xyz");
    }

    #[test]
    fn next_line_strips_terminator_and_consumes() {
        let mut acc = Accumulator::with_capacity(32);
        acc.append(b"alpha\r\nbeta\r\ngam");
        assert_eq!(acc.next_line().unwrap(), b"alpha");
        assert_eq!(acc.next_line().unwrap(), b"beta");
        assert!(acc.next_line().is_none());
        assert_eq!(acc.window(), b"gam");
    }

    #[test]
    fn next_line_handles_empty_line() {
        let mut acc = Accumulator::with_capacity(16);
        acc.append(b"\r\nrest");
        assert_eq!(acc.next_line().unwrap(), b"");
        assert_eq!(acc.window(), b"rest");
    }

    #[test]
    fn split_crlf_across_appends() {
        let mut acc = Accumulator::with_capacity(16);
        acc.append(b"line\r");
        assert!(acc.next_line().is_none());
        acc.append(b"\n");
        assert_eq!(acc.next_line().unwrap(), b"line");
    }

    #[test]
    fn unfinished_line_compacts_near_capacity() {
        let mut acc = Accumulator::with_capacity(512);
        let long = vec![b'a'; 260];
        acc.append(b"first\r\n");
        acc.append(&long);
        assert_eq!(acc.next_line().unwrap(), b"first");
        // the partial line leaves less than LOW_WATER free while the
        // consumed prefix still occupies the front
        assert!(acc.next_line().is_none());
        // compaction reclaimed the consumed prefix
        assert_eq!(acc.free(), 512 - 260);
        acc.append(b"\r\n");
        assert_eq!(acc.next_line().unwrap(), &long[..]);
    }

    #[test]
    fn no_compaction_while_plenty_of_room() {
        let mut acc = Accumulator::with_capacity(512);
        acc.append(b"first\r\npartial");
        assert_eq!(acc.next_line().unwrap(), b"first");
        assert!(acc.next_line().is_none());
        // still room above low water, so the consumed prefix stays
        assert_eq!(acc.free(), 512 - 14);
    }
}
