//! Table catalog: column, index, and table metadata.
//!
//! The catalog maps table names to [`TabMeta`]. Column metadata fixes each
//! column's byte offset inside the row at table creation; offsets are
//! immutable afterwards. The whole catalog serializes to `db.meta` as the
//! database's persistent schema image.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use onyx_storage::{KeyField, KeyKind, KeyLayout};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::types::{ColDef, ColumnType, TabCol};

/// Metadata of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColMeta {
    /// Real name of the owning table.
    pub tab_name: String,
    /// Column name, unique within the table.
    pub name: String,
    /// Storage type.
    pub col_type: ColumnType,
    /// Byte length.
    pub len: usize,
    /// Byte offset inside the row.
    pub offset: usize,
    /// True if some index covers this column.
    pub indexed: bool,
}

impl ColMeta {
    /// True if this column matches a resolved reference.
    #[must_use]
    pub fn matches(&self, col: &TabCol) -> bool {
        self.tab_name == col.tab_name && self.name == col.col_name
    }
}

/// Metadata of one index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    /// Table the index belongs to.
    pub tab_name: String,
    /// Total key length: the sum of the indexed columns' lengths.
    pub col_tot_len: usize,
    /// Indexed columns, in key order.
    pub cols: Vec<ColMeta>,
}

impl IndexMeta {
    /// Number of indexed columns.
    #[must_use]
    pub fn col_num(&self) -> usize {
        self.cols.len()
    }

    /// Names of the indexed columns, in key order.
    #[must_use]
    pub fn col_names(&self) -> Vec<String> {
        self.cols.iter().map(|c| c.name.clone()).collect()
    }

    /// The storage-layer key layout of this index.
    #[must_use]
    pub fn key_layout(&self) -> KeyLayout {
        KeyLayout::new(
            self.cols
                .iter()
                .map(|c| {
                    let kind = match c.col_type {
                        ColumnType::Int => KeyKind::Int,
                        ColumnType::Float => KeyKind::Float,
                        ColumnType::Str => KeyKind::Bytes,
                    };
                    KeyField::new(kind, c.len)
                })
                .collect(),
        )
    }

    /// Assembles the index key for a row: the concatenation, in key order,
    /// of each indexed column's raw bytes.
    #[must_use]
    pub fn build_key(&self, row: &[u8]) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.col_tot_len);
        for col in &self.cols {
            key.extend_from_slice(&row[col.offset..col.offset + col.len]);
        }
        key
    }

    /// True if this index covers exactly `col_names`, ignoring order.
    #[must_use]
    pub fn covers(&self, col_names: &[String]) -> bool {
        if self.cols.len() != col_names.len() {
            return false;
        }
        let mut mine: Vec<&str> = self.cols.iter().map(|c| c.name.as_str()).collect();
        let mut theirs: Vec<&str> = col_names.iter().map(String::as_str).collect();
        mine.sort_unstable();
        theirs.sort_unstable();
        mine == theirs
    }
}

/// Metadata of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabMeta {
    /// Table name.
    pub name: String,
    /// Columns, in declaration order; offsets are monotonic and their
    /// lengths sum to the row size.
    pub cols: Vec<ColMeta>,
    /// Indexes, in creation order. At most one index exists per distinct
    /// column-set signature.
    pub indexes: Vec<IndexMeta>,
}

impl TabMeta {
    /// Builds table metadata from column definitions, assigning offsets.
    pub fn from_defs(name: impl Into<String>, defs: &[ColDef]) -> QueryResult<Self> {
        let name = name.into();
        let mut cols = Vec::with_capacity(defs.len());
        let mut offset = 0;
        for def in defs {
            if cols.iter().any(|c: &ColMeta| c.name == def.name) {
                return Err(QueryError::DuplicateColumn(format!(
                    "{}.{}",
                    name, def.name
                )));
            }
            cols.push(ColMeta {
                tab_name: name.clone(),
                name: def.name.clone(),
                col_type: def.col_type,
                len: def.len,
                offset,
                indexed: false,
            });
            offset += def.len;
        }
        Ok(Self {
            name,
            cols,
            indexes: Vec::new(),
        })
    }

    /// The fixed row size of this table.
    #[must_use]
    pub fn row_size(&self) -> usize {
        self.cols.last().map_or(0, |c| c.offset + c.len)
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn get_col(&self, name: &str) -> Option<&ColMeta> {
        self.cols.iter().find(|c| c.name == name)
    }

    /// True if an index on exactly `col_names` (order ignored) exists.
    #[must_use]
    pub fn is_index(&self, col_names: &[String]) -> bool {
        self.indexes.iter().any(|ix| ix.covers(col_names))
    }

    /// The index covering exactly `col_names`, if any.
    #[must_use]
    pub fn get_index_meta(&self, col_names: &[String]) -> Option<&IndexMeta> {
        self.indexes.iter().find(|ix| ix.covers(col_names))
    }
}

/// The table catalog.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Catalog {
    tables: HashMap<String, TabMeta>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether a table exists.
    #[must_use]
    pub fn is_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Fetches a table's metadata.
    pub fn get_table(&self, name: &str) -> QueryResult<&TabMeta> {
        self.tables
            .get(name)
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))
    }

    /// Fetches a table's metadata mutably.
    pub fn get_table_mut(&mut self, name: &str) -> QueryResult<&mut TabMeta> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))
    }

    /// Registers a new table.
    pub fn create_table(&mut self, meta: TabMeta) -> QueryResult<()> {
        if self.tables.contains_key(&meta.name) {
            return Err(QueryError::TableExists(meta.name));
        }
        self.tables.insert(meta.name.clone(), meta);
        Ok(())
    }

    /// Removes a table, returning its metadata.
    pub fn drop_table(&mut self, name: &str) -> QueryResult<TabMeta> {
        self.tables
            .remove(name)
            .ok_or_else(|| QueryError::TableNotFound(name.to_string()))
    }

    /// Table names, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    /// Writes the catalog image to `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> QueryResult<()> {
        let data =
            serde_json::to_vec_pretty(self).map_err(|e| QueryError::Catalog(e.to_string()))?;
        fs::write(path, data)?;
        Ok(())
    }

    /// Reads a catalog image from `path`.
    pub fn load(path: impl AsRef<Path>) -> QueryResult<Self> {
        let data = fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| QueryError::Catalog(e.to_string()))
    }
}
