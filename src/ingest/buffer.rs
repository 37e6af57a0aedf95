/// Growable byte queue with a read cursor.
///
/// Bytes are appended at the tail and consumed from the head by advancing a
/// cursor. The consumed prefix is reclaimed lazily: when it makes up at least
/// half of the allocation (and more than `COMPACT_MIN_BYTES`) the live bytes are
/// shifted to the front before the next append.
pub struct ByteBuffer {
    data: Vec<u8>,
    head: usize,
}

const COMPACT_MIN_BYTES: usize = 4 * 1024;

impl ByteBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            head: 0,
        }
    }

    /// Unconsumed bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.head..]
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.compact_if_needed();
        self.data.extend_from_slice(bytes);
    }

    /// Discard `n` bytes from the head.
    pub fn consume(&mut self, n: usize) {
        let n = n.min(self.len());
        self.head += n;
        if self.head == self.data.len() {
            self.data.clear();
            self.head = 0;
        }
    }

    /// Remove `n` bytes from the head and hand them to the caller.
    pub fn take(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.len());
        let out = self.data[self.head..self.head + n].to_vec();
        self.consume(n);
        out
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
    }

    fn compact_if_needed(&mut self) {
        if self.head >= COMPACT_MIN_BYTES && self.head * 2 >= self.data.len() {
            self.data.copy_within(self.head.., 0);
            self.data.truncate(self.data.len() - self.head);
            self.head = 0;
        }
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::with_capacity(64 * 1024)
    }
}

/// Position of the first occurrence of `needle` in `haystack` at or after `from`.
pub(crate) fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() || needle.is_empty() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

/// Position of the last occurrence of `needle` fully contained in `haystack`.
pub(crate) fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
