//! The database: catalog plus open heap files and index handles.
//!
//! [`Database`] plays the system-manager role: it owns the catalog, one
//! heap [`RecordFile`] per table, and one [`Index`] per index descriptor,
//! and it executes DDL against them. Executors borrow handles from here;
//! they never own storage.
//!
//! On disk a database is a directory holding `db.meta` (catalog image)
//! and one heap file per table. Indexes are rebuilt from the heap when a
//! database is opened.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use onyx_common::CATALOG_FILE_NAME;
use onyx_storage::{Index, RecordFile};
use onyx_txn::LockManager;
use parking_lot::RwLock;
use tracing::debug;

use crate::catalog::{Catalog, ColMeta, IndexMeta, TabMeta};
use crate::error::{QueryError, QueryResult};
use crate::types::ColDef;

/// Shared handle to a table's heap file.
pub type FileHandle = Arc<RwLock<RecordFile>>;

/// Shared handle to an index.
pub type IndexHandle = Arc<RwLock<Index>>;

/// An open database.
#[derive(Debug)]
pub struct Database {
    name: String,
    root: Option<PathBuf>,
    catalog: Catalog,
    files: HashMap<String, FileHandle>,
    indexes: HashMap<String, IndexHandle>,
    lock_mgr: Arc<LockManager>,
    next_file_id: u64,
}

impl Database {
    /// Creates a database that lives purely in memory.
    #[must_use]
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: None,
            catalog: Catalog::new(),
            files: HashMap::new(),
            indexes: HashMap::new(),
            lock_mgr: Arc::new(LockManager::new()),
            next_file_id: 1,
        }
    }

    /// Creates a database directory at `path`.
    pub fn create(path: impl AsRef<Path>) -> QueryResult<Self> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onyx".to_string());
        let db = Self {
            name,
            root: Some(root),
            catalog: Catalog::new(),
            files: HashMap::new(),
            indexes: HashMap::new(),
            lock_mgr: Arc::new(LockManager::new()),
            next_file_id: 1,
        };
        db.catalog.save(db.catalog_path().unwrap())?;
        Ok(db)
    }

    /// Opens an existing database directory, loading the catalog and heap
    /// files and rebuilding indexes from the heap.
    pub fn open(path: impl AsRef<Path>) -> QueryResult<Self> {
        let root = path.as_ref().to_path_buf();
        let catalog = Catalog::load(root.join(CATALOG_FILE_NAME))?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onyx".to_string());
        let mut db = Self {
            name,
            root: Some(root),
            catalog,
            files: HashMap::new(),
            indexes: HashMap::new(),
            lock_mgr: Arc::new(LockManager::new()),
            next_file_id: 1,
        };
        for table in db.catalog.table_names() {
            let file_id = db.next_file_id;
            db.next_file_id += 1;
            let path = db.heap_path(&table).unwrap();
            let file = RecordFile::open(path, file_id)?;
            db.files.insert(table.clone(), Arc::new(RwLock::new(file)));
            let meta = db.catalog.get_table(&table)?.clone();
            for ix_meta in &meta.indexes {
                db.build_index(ix_meta)?;
            }
        }
        Ok(db)
    }

    /// Flushes heap files and the catalog image to disk.
    pub fn flush(&mut self) -> QueryResult<()> {
        for file in self.files.values() {
            file.write().flush()?;
        }
        if let Some(path) = self.catalog_path() {
            self.catalog.save(path)?;
        }
        Ok(())
    }

    /// The database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// The lock manager shared by all statements of this database.
    #[must_use]
    pub fn lock_manager(&self) -> Arc<LockManager> {
        Arc::clone(&self.lock_mgr)
    }

    /// The heap file handle of a table.
    pub fn file(&self, table: &str) -> QueryResult<FileHandle> {
        self.files
            .get(table)
            .cloned()
            .ok_or_else(|| QueryError::TableNotFound(table.to_string()))
    }

    /// The handle of the index named `name`.
    pub fn index(&self, name: &str) -> QueryResult<IndexHandle> {
        self.indexes
            .get(name)
            .cloned()
            .ok_or_else(|| QueryError::IndexNotFound(name.to_string()))
    }

    /// The handle for an index descriptor.
    pub fn index_for(&self, meta: &IndexMeta) -> QueryResult<IndexHandle> {
        self.index(&Self::index_name(&meta.tab_name, &meta.col_names()))
    }

    /// The canonical file name of an index.
    #[must_use]
    pub fn index_name(table: &str, cols: &[String]) -> String {
        format!("{}_{}.idx", table, cols.join("_"))
    }

    /// Creates a table with the given column definitions.
    pub fn create_table(&mut self, table: &str, defs: &[ColDef]) -> QueryResult<()> {
        let meta = TabMeta::from_defs(table, defs)?;
        let row_size = meta.row_size();
        self.catalog.create_table(meta)?;
        let file_id = self.next_file_id;
        self.next_file_id += 1;
        let file = match self.heap_path(table) {
            Some(path) => RecordFile::create(path, row_size, file_id)?,
            None => RecordFile::in_memory(row_size, file_id),
        };
        self.files
            .insert(table.to_string(), Arc::new(RwLock::new(file)));
        self.save_catalog()?;
        debug!(table, row_size, "created table");
        Ok(())
    }

    /// Drops a table, its heap file, and all of its indexes.
    pub fn drop_table(&mut self, table: &str) -> QueryResult<()> {
        let meta = self.catalog.drop_table(table)?;
        self.files.remove(table);
        for ix in &meta.indexes {
            self.indexes
                .remove(&Self::index_name(table, &ix.col_names()));
        }
        if let Some(path) = self.heap_path(table) {
            let _ = fs::remove_file(path);
        }
        self.save_catalog()?;
        debug!(table, "dropped table");
        Ok(())
    }

    /// Creates an index on `table` over `col_names` (in key order) and
    /// backfills it from the heap.
    pub fn create_index(&mut self, table: &str, col_names: &[String]) -> QueryResult<()> {
        let meta = self.catalog.get_table(table)?;
        if meta.is_index(col_names) {
            return Err(QueryError::IndexExists(Self::index_name(table, col_names)));
        }
        let mut cols: Vec<ColMeta> = Vec::with_capacity(col_names.len());
        for name in col_names {
            let col = meta
                .get_col(name)
                .ok_or_else(|| QueryError::ColumnNotFound(format!("{}.{}", table, name)))?;
            cols.push(col.clone());
        }
        let ix_meta = IndexMeta {
            tab_name: table.to_string(),
            col_tot_len: cols.iter().map(|c| c.len).sum(),
            cols,
        };
        self.build_index(&ix_meta)?;

        let meta = self.catalog.get_table_mut(table)?;
        for col in &mut meta.cols {
            if col_names.contains(&col.name) {
                col.indexed = true;
            }
        }
        meta.indexes.push(ix_meta);
        self.save_catalog()?;
        debug!(table, cols = ?col_names, "created index");
        Ok(())
    }

    /// Drops the index on `table` covering `col_names`.
    pub fn drop_index(&mut self, table: &str, col_names: &[String]) -> QueryResult<()> {
        let meta = self.catalog.get_table_mut(table)?;
        let pos = meta
            .indexes
            .iter()
            .position(|ix| ix.covers(col_names))
            .ok_or_else(|| QueryError::IndexNotFound(Self::index_name(table, col_names)))?;
        let removed = meta.indexes.remove(pos);
        // Recompute coverage flags from the surviving indexes.
        let still_indexed: Vec<String> = meta
            .indexes
            .iter()
            .flat_map(|ix| ix.col_names())
            .collect();
        for col in &mut meta.cols {
            col.indexed = still_indexed.contains(&col.name);
        }
        self.indexes
            .remove(&Self::index_name(table, &removed.col_names()));
        self.save_catalog()?;
        debug!(table, cols = ?col_names, "dropped index");
        Ok(())
    }

    fn build_index(&mut self, ix_meta: &IndexMeta) -> QueryResult<()> {
        let mut index = Index::new(ix_meta.key_layout());
        let file = self.file(&ix_meta.tab_name)?;
        let file = file.read();
        for rid in file.scan() {
            let record = file.get_record(rid)?;
            let key = ix_meta.build_key(&record.data);
            let page = index.insert_entry(&key, rid)?;
            if !page.is_valid() {
                return Err(QueryError::IndexUpdateFailed(format!(
                    "duplicate key while building index on {}",
                    ix_meta.tab_name
                )));
            }
        }
        self.indexes.insert(
            Self::index_name(&ix_meta.tab_name, &ix_meta.col_names()),
            Arc::new(RwLock::new(index)),
        );
        Ok(())
    }

    fn heap_path(&self, table: &str) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(format!("{}.tab", table)))
    }

    fn catalog_path(&self) -> Option<PathBuf> {
        self.root.as_ref().map(|r| r.join(CATALOG_FILE_NAME))
    }

    fn save_catalog(&self) -> QueryResult<()> {
        if let Some(path) = self.catalog_path() {
            self.catalog.save(path)?;
        }
        Ok(())
    }
}
