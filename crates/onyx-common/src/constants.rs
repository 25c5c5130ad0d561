//! System-wide constants and limits.

/// Size of a heap page in bytes.
pub const PAGE_SIZE: usize = 4096;

/// File name of the serialized catalog inside a database directory.
pub const CATALOG_FILE_NAME: &str = "db.meta";

/// Maximum length of a table or column identifier.
pub const MAX_IDENT_LEN: usize = 64;

/// Maximum number of columns a single index may cover.
pub const MAX_INDEX_COLS: usize = 8;
