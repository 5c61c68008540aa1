//! Fixed-capacity byte window used as the session read buffer.
//!
//! A [`ByteWindow`] owns a backing store that is allocated once and never
//! reallocated. Only the prefix `[0, len)` is "committed" data; the tail
//! `[len, capacity)` is free space that a USB receive can write into
//! directly before the usable part is committed with [`ByteWindow::grow`].
//! Parsed data is consumed from the front with [`ByteWindow::shift_left`].
//!
//! # Example
//!
//! ```
//! use tellstick_core::ByteWindow;
//!
//! let mut window = ByteWindow::new(8);
//! let free = window.free_space().unwrap();
//! free[..3].copy_from_slice(b"ab\n");
//! window.grow(3);
//! assert_eq!(window.as_slice(), b"ab\n");
//!
//! window.shift_left(3);
//! assert!(window.is_empty());
//! ```

/// A resizable view over a fixed-capacity byte buffer.
///
/// Invariant: `0 <= len <= capacity` after every operation. No operation
/// allocates or touches bytes outside `[0, capacity)`.
#[derive(Debug, Clone)]
pub struct ByteWindow {
    storage: Box<[u8]>,
    len: usize,
}

impl ByteWindow {
    /// Create an empty window backed by `capacity` zeroed bytes.
    pub fn new(capacity: usize) -> Self {
        ByteWindow {
            storage: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    /// Total size of the backing store.
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Number of committed bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes are committed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether the committed region covers the entire backing store.
    pub fn is_full(&self) -> bool {
        self.len == self.storage.len()
    }

    /// The committed bytes `[0, len)`.
    pub fn as_slice(&self) -> &[u8] {
        &self.storage[..self.len]
    }

    /// Mutable access to the committed bytes `[0, len)`.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.storage[..self.len]
    }

    /// Extend the committed length to the full capacity.
    pub fn cap_full(&mut self) {
        self.len = self.storage.len();
    }

    /// The uncommitted tail `[len, capacity)`, or `None` when the window is
    /// full.
    ///
    /// Bytes written here are not visible through [`as_slice`](Self::as_slice)
    /// until they are committed with [`grow`](Self::grow).
    pub fn free_space(&mut self) -> Option<&mut [u8]> {
        if self.len < self.storage.len() {
            Some(&mut self.storage[self.len..])
        } else {
            None
        }
    }

    /// Commit `n` more bytes from the free space.
    ///
    /// A zero or overflowing `n` commits all remaining free space instead.
    pub fn grow(&mut self, n: usize) {
        let remaining = self.storage.len() - self.len;
        let n = if n == 0 || n > remaining { remaining } else { n };
        self.len += n;
    }

    /// Drop the first `n` committed bytes, moving the rest to offset 0.
    ///
    /// `n >= len` empties the window; `n == 0` leaves it untouched.
    pub fn shift_left(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        if n < self.len {
            self.storage.copy_within(n..self.len, 0);
            self.len -= n;
        } else {
            self.len = 0;
        }
    }

    /// Set the committed length to `n`, clamped to the capacity.
    pub fn truncate(&mut self, n: usize) {
        self.len = n.min(self.storage.len());
    }

    /// Logically discard all committed bytes.
    pub fn clear(&mut self) {
        self.len = 0;
    }
}
