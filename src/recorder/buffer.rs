//! Ordered, append-only fragment storage

/// One discrete unit of encoded output emitted by a recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Encoded bytes
    pub data: Vec<u8>,
    /// Milliseconds since the recorder started
    pub timecode_ms: f64,
}

impl Fragment {
    pub fn new(data: Vec<u8>, timecode_ms: f64) -> Self {
        Self { data, timecode_ms }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Fragments in emission order.
///
/// Only ever grows. Order matters because container formats cannot be
/// reassembled out of order.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    fragments: Vec<Fragment>,
    total_bytes: usize,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment, returning the new fragment count
    pub fn push(&mut self, fragment: Fragment) -> usize {
        self.total_bytes += fragment.len();
        self.fragments.push(fragment);
        self.fragments.len()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.total_bytes
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// All fragment bytes joined in insertion order
    pub fn concat(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_bytes);
        for fragment in &self.fragments {
            out.extend_from_slice(&fragment.data);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_preserves_order_and_duplicates() {
        let mut buffer = ChunkBuffer::new();
        assert_eq!(buffer.push(Fragment::new(vec![1], 0.0)), 1);
        assert_eq!(buffer.push(Fragment::new(vec![1], 1.0)), 2);
        assert_eq!(buffer.push(Fragment::new(vec![2, 3], 2.0)), 3);

        let data: Vec<_> = buffer.fragments().iter().map(|f| f.data.clone()).collect();
        assert_eq!(data, vec![vec![1], vec![1], vec![2, 3]]);
        assert_eq!(buffer.total_bytes(), 4);
    }

    #[test]
    fn test_concat_in_insertion_order() {
        let mut buffer = ChunkBuffer::new();
        buffer.push(Fragment::new(b"AA".to_vec(), 0.0));
        buffer.push(Fragment::new(b"B".to_vec(), 0.0));
        buffer.push(Fragment::new(Vec::new(), 0.0));
        buffer.push(Fragment::new(b"CCC".to_vec(), 0.0));

        assert_eq!(buffer.concat(), b"AABCCC".to_vec());
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_empty_buffer() {
        let buffer = ChunkBuffer::new();
        assert!(buffer.is_empty());
        assert!(buffer.concat().is_empty());
    }
}
