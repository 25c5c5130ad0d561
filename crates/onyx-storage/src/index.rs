//! Ordered indexes over concatenated column keys.
//!
//! An [`Index`] maps fixed-length keys — the concatenation of one or more
//! column values in their row byte encoding — to [`Rid`]s. Because numeric
//! columns are stored little-endian, plain bytewise ordering would not
//! match value ordering; keys are therefore compared field by field
//! according to a [`KeyLayout`].
//!
//! Positions in the index are exposed as [`IndexPos`] values, with
//! `lower_bound`/`upper_bound`/`leaf_begin`/`leaf_end` delimiting scan
//! ranges and [`IndexCursor`] walking them. Keys are unique; inserting a
//! duplicate reports [`PageId::INVALID`] so callers can run compensation
//! logic.

use std::cmp::Ordering;

use onyx_common::{PageId, Rid, PAGE_SIZE};

use crate::error::{StorageError, StorageResult};

/// Value interpretation of one key field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    /// Little-endian `i32`.
    Int,
    /// Little-endian `f32`.
    Float,
    /// Raw bytes, NUL-padded, compared bytewise.
    Bytes,
}

/// One field of a composite key: its interpretation and byte length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyField {
    /// How the field's bytes are compared.
    pub kind: KeyKind,
    /// Field width in bytes.
    pub len: usize,
}

impl KeyField {
    /// Creates a key field.
    #[must_use]
    pub const fn new(kind: KeyKind, len: usize) -> Self {
        Self { kind, len }
    }

    /// Bytes of the smallest value this field can hold.
    #[must_use]
    pub fn min_bytes(&self) -> Vec<u8> {
        match self.kind {
            KeyKind::Int => i32::MIN.to_le_bytes().to_vec(),
            KeyKind::Float => f32::NEG_INFINITY.to_le_bytes().to_vec(),
            KeyKind::Bytes => vec![0x00; self.len],
        }
    }

    /// Bytes of the largest value this field can hold.
    #[must_use]
    pub fn max_bytes(&self) -> Vec<u8> {
        match self.kind {
            KeyKind::Int => i32::MAX.to_le_bytes().to_vec(),
            KeyKind::Float => f32::INFINITY.to_le_bytes().to_vec(),
            KeyKind::Bytes => vec![0xff; self.len],
        }
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.kind {
            KeyKind::Int => {
                let x = i32::from_le_bytes(a[..4].try_into().unwrap());
                let y = i32::from_le_bytes(b[..4].try_into().unwrap());
                x.cmp(&y)
            }
            KeyKind::Float => {
                let x = f32::from_le_bytes(a[..4].try_into().unwrap());
                let y = f32::from_le_bytes(b[..4].try_into().unwrap());
                x.total_cmp(&y)
            }
            KeyKind::Bytes => a.cmp(b),
        }
    }
}

/// Field layout of an index key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    fields: Vec<KeyField>,
    key_len: usize,
}

impl KeyLayout {
    /// Creates a layout from its fields, in key order.
    #[must_use]
    pub fn new(fields: Vec<KeyField>) -> Self {
        let key_len = fields.iter().map(|f| f.len).sum();
        Self { fields, key_len }
    }

    /// Total key length in bytes.
    #[must_use]
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// The fields of the key, in order.
    #[must_use]
    pub fn fields(&self) -> &[KeyField] {
        &self.fields
    }

    /// Compares two full keys field by field.
    #[must_use]
    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        let mut off = 0;
        for field in &self.fields {
            let ord = field.compare(&a[off..off + field.len], &b[off..off + field.len]);
            if ord != Ordering::Equal {
                return ord;
            }
            off += field.len;
        }
        Ordering::Equal
    }
}

/// A position between entries of an index, in leaf order.
///
/// `lower_bound(k)` is the position of the first entry `>= k`;
/// `upper_bound(k)` the first `> k`. `leaf_begin`/`leaf_end` delimit the
/// whole index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexPos(usize);

impl IndexPos {
    /// Raw entry offset of this position.
    #[must_use]
    pub fn entry_no(self) -> usize {
        self.0
    }
}

/// An ordered, unique-key index from composite keys to rids.
#[derive(Debug, Clone)]
pub struct Index {
    layout: KeyLayout,
    entries: Vec<(Vec<u8>, Rid)>,
    leaf_capacity: usize,
}

impl Index {
    /// Creates an empty index with the given key layout.
    #[must_use]
    pub fn new(layout: KeyLayout) -> Self {
        let entry_bytes = layout.key_len() + std::mem::size_of::<Rid>();
        let leaf_capacity = (PAGE_SIZE / entry_bytes.max(1)).max(1);
        Self {
            layout,
            entries: Vec::new(),
            leaf_capacity,
        }
    }

    /// The key layout of this index.
    #[must_use]
    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    /// Number of entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Position of the first entry whose key is `>= key`.
    pub fn lower_bound(&self, key: &[u8]) -> StorageResult<IndexPos> {
        self.check_key(key)?;
        Ok(IndexPos(self.entries.partition_point(|(k, _)| {
            self.layout.compare(k, key) == Ordering::Less
        })))
    }

    /// Position of the first entry whose key is `> key`.
    pub fn upper_bound(&self, key: &[u8]) -> StorageResult<IndexPos> {
        self.check_key(key)?;
        Ok(IndexPos(self.entries.partition_point(|(k, _)| {
            self.layout.compare(k, key) != Ordering::Greater
        })))
    }

    /// Position before the first entry.
    #[must_use]
    pub fn leaf_begin(&self) -> IndexPos {
        IndexPos(0)
    }

    /// Position after the last entry.
    #[must_use]
    pub fn leaf_end(&self) -> IndexPos {
        IndexPos(self.entries.len())
    }

    /// Inserts an entry, keeping keys unique.
    ///
    /// Returns the id of the leaf page the entry landed on, or
    /// [`PageId::INVALID`] if the key is already present.
    pub fn insert_entry(&mut self, key: &[u8], rid: Rid) -> StorageResult<PageId> {
        self.check_key(key)?;
        let pos = self.lower_bound(key)?.0;
        if let Some((existing, _)) = self.entries.get(pos) {
            if self.layout.compare(existing, key) == Ordering::Equal {
                return Ok(PageId::INVALID);
            }
        }
        self.entries.insert(pos, (key.to_vec(), rid));
        Ok(PageId::new((pos / self.leaf_capacity) as u32))
    }

    /// Removes the entry with the given key.
    pub fn delete_entry(&mut self, key: &[u8]) -> StorageResult<()> {
        let pos = self.lower_bound(key)?.0;
        match self.entries.get(pos) {
            Some((existing, _)) if self.layout.compare(existing, key) == Ordering::Equal => {
                self.entries.remove(pos);
                Ok(())
            }
            _ => Err(StorageError::KeyNotFound),
        }
    }

    /// Looks up the rid stored under `key`, if any.
    pub fn get_entry(&self, key: &[u8]) -> StorageResult<Option<Rid>> {
        let pos = self.lower_bound(key)?.0;
        Ok(match self.entries.get(pos) {
            Some((existing, rid)) if self.layout.compare(existing, key) == Ordering::Equal => {
                Some(*rid)
            }
            _ => None,
        })
    }

    /// Opens a cursor over `[from, to)`.
    #[must_use]
    pub fn cursor(&self, from: IndexPos, to: IndexPos) -> IndexCursor<'_> {
        IndexCursor {
            index: self,
            pos: from.0,
            end: to.0.min(self.entries.len()),
        }
    }

    /// Collects the rids in `[from, to)`, in key order.
    #[must_use]
    pub fn collect_range(&self, from: IndexPos, to: IndexPos) -> Vec<Rid> {
        let end = to.0.min(self.entries.len());
        self.entries[from.0.min(end)..end]
            .iter()
            .map(|(_, rid)| *rid)
            .collect()
    }

    fn check_key(&self, key: &[u8]) -> StorageResult<()> {
        if key.len() != self.layout.key_len() {
            return Err(StorageError::KeySizeMismatch {
                expected: self.layout.key_len(),
                actual: key.len(),
            });
        }
        Ok(())
    }
}

/// A forward cursor over a half-open range of index entries.
#[derive(Debug)]
pub struct IndexCursor<'a> {
    index: &'a Index,
    pos: usize,
    end: usize,
}

impl IndexCursor<'_> {
    /// True once the cursor has passed its range.
    #[must_use]
    pub fn at_end(&self) -> bool {
        self.pos >= self.end
    }

    /// The rid of the entry under the cursor.
    ///
    /// Only valid while `!at_end()`.
    #[must_use]
    pub fn rid(&self) -> Rid {
        self.index.entries[self.pos].1
    }

    /// The key of the entry under the cursor.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.index.entries[self.pos].0
    }

    /// Advances to the next entry.
    pub fn next(&mut self) {
        if self.pos < self.end {
            self.pos += 1;
        }
    }
}
