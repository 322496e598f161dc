//! Range cursors

/// Bidirectional cursor over a bounded key range.
///
/// Movement methods return whether the cursor now sits on an entry.
/// `key()`/`value()` are `None` whenever it does not.
pub trait RangeIterator: Send {
    /// Moves onto the first entry of the range.
    fn first(&mut self) -> bool;

    /// Moves onto the last entry of the range.
    fn last(&mut self) -> bool;

    /// Moves forward one entry.
    fn next(&mut self) -> bool;

    /// Moves back one entry.
    fn prev(&mut self) -> bool;

    /// Moves onto the first entry whose key is `>= key`.
    fn seek(&mut self, key: &[u8]) -> bool;

    /// Key at the cursor.
    fn key(&self) -> Option<&[u8]>;

    /// Value at the cursor.
    fn value(&self) -> Option<&[u8]>;

    /// Releases the snapshot. The cursor is unusable afterwards.
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    At(usize),
    AfterLast,
}

/// Cursor over an owned, sorted copy of a key range.
#[derive(Debug)]
pub struct SnapshotIterator {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    position: Position,
    released: bool,
}

impl SnapshotIterator {
    /// Wraps entries that are already sorted by key.
    pub fn new(entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        Self {
            entries,
            position: Position::BeforeFirst,
            released: false,
        }
    }

    /// Number of entries in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn valid(&self) -> bool {
        matches!(self.position, Position::At(_))
    }

    fn current(&self) -> Option<&(Vec<u8>, Vec<u8>)> {
        match self.position {
            Position::At(idx) if !self.released => self.entries.get(idx),
            _ => None,
        }
    }
}

impl RangeIterator for SnapshotIterator {
    fn first(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.position = if self.entries.is_empty() {
            Position::AfterLast
        } else {
            Position::At(0)
        };
        self.valid()
    }

    fn last(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.position = match self.entries.len() {
            0 => Position::BeforeFirst,
            n => Position::At(n - 1),
        };
        self.valid()
    }

    fn next(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.position = match self.position {
            Position::BeforeFirst if !self.entries.is_empty() => Position::At(0),
            Position::At(idx) if idx + 1 < self.entries.len() => Position::At(idx + 1),
            _ => Position::AfterLast,
        };
        self.valid()
    }

    fn prev(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.position = match self.position {
            Position::AfterLast if !self.entries.is_empty() => {
                Position::At(self.entries.len() - 1)
            }
            Position::At(idx) if idx > 0 => Position::At(idx - 1),
            _ => Position::BeforeFirst,
        };
        self.valid()
    }

    fn seek(&mut self, key: &[u8]) -> bool {
        if self.released {
            return false;
        }
        let idx = self.entries.partition_point(|(k, _)| k.as_slice() < key);
        self.position = if idx < self.entries.len() {
            Position::At(idx)
        } else {
            Position::AfterLast
        };
        self.valid()
    }

    fn key(&self) -> Option<&[u8]> {
        self.current().map(|(k, _)| k.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        self.current().map(|(_, v)| v.as_slice())
    }

    fn release(&mut self) {
        self.released = true;
        self.entries = Vec::new();
        self.position = Position::AfterLast;
    }
}
