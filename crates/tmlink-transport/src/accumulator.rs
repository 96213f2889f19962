use bytes::{Buf, BytesMut};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Growable FIFO byte buffer.
///
/// Bytes are appended at the back and consumed from the front. Consuming a
/// prefix is a pointer bump, so unconsumed history is never copied.
#[derive(Debug, Default)]
pub struct ByteAccumulator {
    bytes: BytesMut,
}

impl ByteAccumulator {
    /// An empty buffer.
    pub fn new() -> Self {
        Self::with_capacity(INITIAL_BUFFER_CAPACITY)
    }

    /// An empty buffer with room for `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
        }
    }

    /// Append bytes at the back. Returns the number appended.
    pub fn append(&mut self, data: &[u8]) -> usize {
        self.bytes.extend_from_slice(data);
        data.len()
    }

    /// Remove the first `n` bytes, clamped to the current length.
    pub fn pop_front(&mut self, n: usize) {
        if n >= self.bytes.len() {
            self.bytes.clear();
        } else {
            self.bytes.advance(n);
        }
    }

    /// Drop every buffered byte.
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    /// The buffered bytes, oldest first.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of buffered bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_then_pop_front() {
        let mut acc = ByteAccumulator::new();
        assert_eq!(acc.append(b"hello "), 6);
        acc.append(b"world");
        assert_eq!(acc.as_slice(), b"hello world");

        acc.pop_front(6);
        assert_eq!(acc.as_slice(), b"world");
        assert_eq!(acc.len(), 5);
    }

    #[test]
    fn pop_front_clamps_to_length() {
        let mut acc = ByteAccumulator::new();
        acc.append(b"abc");
        acc.pop_front(100);
        assert!(acc.is_empty());

        acc.pop_front(1);
        assert!(acc.is_empty());
    }

    #[test]
    fn pop_front_zero_is_noop() {
        let mut acc = ByteAccumulator::with_capacity(4);
        acc.append(b"abc");
        acc.pop_front(0);
        assert_eq!(acc.as_slice(), b"abc");
    }

    #[test]
    fn grows_past_initial_capacity() {
        let mut acc = ByteAccumulator::with_capacity(4);
        for _ in 0..1000 {
            acc.append(b"0123456789");
        }
        assert_eq!(acc.len(), 10_000);
        acc.pop_front(9_995);
        assert_eq!(acc.as_slice(), b"56789");
    }
}
