//! Column projection.

use onyx_common::Rid;
use onyx_storage::Record;

use crate::catalog::ColMeta;
use crate::error::{QueryError, QueryResult};
use crate::executor::eval::get_col;
use crate::executor::{BoxedExecutor, Executor};
use crate::types::TabCol;

/// One projected field: where it comes from and where it lands.
#[derive(Debug, Clone, Copy)]
struct FieldMap {
    src_offset: usize,
    len: usize,
    dst_offset: usize,
}

/// Copies the selected columns of the child's rows into packed output
/// rows. Output offsets are assigned sequentially in the listed order.
pub struct ProjectionExec {
    child: BoxedExecutor,
    schema: Vec<ColMeta>,
    fields: Vec<FieldMap>,
    row_size: usize,
}

impl ProjectionExec {
    /// Builds a projection of `sel_cols` over `child`.
    pub fn new(child: BoxedExecutor, sel_cols: &[TabCol]) -> QueryResult<Self> {
        let mut schema = Vec::with_capacity(sel_cols.len());
        let mut fields = Vec::with_capacity(sel_cols.len());
        let mut offset = 0;
        for sel_col in sel_cols {
            let src = get_col(child.schema(), sel_col)?;
            fields.push(FieldMap {
                src_offset: src.offset,
                len: src.len,
                dst_offset: offset,
            });
            let mut col = src.clone();
            col.offset = offset;
            offset += col.len;
            schema.push(col);
        }
        Ok(Self {
            child,
            schema,
            fields,
            row_size: offset,
        })
    }
}

impl Executor for ProjectionExec {
    fn name(&self) -> &'static str {
        "Projection"
    }

    fn schema(&self) -> &[ColMeta] {
        &self.schema
    }

    fn row_size(&self) -> usize {
        self.row_size
    }

    fn open(&mut self) -> QueryResult<()> {
        self.child.open()
    }

    fn next(&mut self) -> QueryResult<()> {
        self.child.next()
    }

    fn at_end(&self) -> bool {
        self.child.at_end()
    }

    fn current(&self) -> QueryResult<Record> {
        let source = self.child.current()?;
        if source.data.len() < self.child.row_size() {
            return Err(QueryError::Internal(
                "child row shorter than its schema".to_string(),
            ));
        }
        let mut data = vec![0u8; self.row_size];
        for field in &self.fields {
            data[field.dst_offset..field.dst_offset + field.len]
                .copy_from_slice(&source.data[field.src_offset..field.src_offset + field.len]);
        }
        Ok(Record::new(data))
    }

    fn rid(&self) -> Rid {
        self.child.rid()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::executor::seq_scan::SeqScanExec;
    use crate::types::ColDef;

    fn db() -> Database {
        let mut db = Database::in_memory("test");
        db.create_table(
            "t",
            &[ColDef::int("a"), ColDef::char("s", 4), ColDef::int("b")],
        )
        .unwrap();
        let file = db.file("t").unwrap();
        let mut file = file.write();
        for (a, s, b) in [(1i32, b"aa\0\0", 10i32), (2, b"bb\0\0", 20)] {
            let mut row = a.to_le_bytes().to_vec();
            row.extend_from_slice(s);
            row.extend_from_slice(&b.to_le_bytes());
            file.insert_record(&row).unwrap();
        }
        drop(file);
        db
    }

    fn project(db: &Database, cols: &[TabCol]) -> ProjectionExec {
        let scan = Box::new(SeqScanExec::new(db, "t", vec![]).unwrap());
        ProjectionExec::new(scan, cols).unwrap()
    }

    #[test]
    fn test_packs_selected_columns() {
        let db = db();
        let mut exec = project(&db, &[TabCol::new("t", "b"), TabCol::new("t", "a")]);
        // Output is (b, a): 8 bytes, offsets 0 and 4.
        assert_eq!(exec.row_size(), 8);
        assert_eq!(exec.schema()[0].name, "b");
        assert_eq!(exec.schema()[0].offset, 0);
        assert_eq!(exec.schema()[1].name, "a");
        assert_eq!(exec.schema()[1].offset, 4);

        exec.open().unwrap();
        let row = exec.current().unwrap();
        assert_eq!(row.data.len(), 8);
        assert_eq!(i32::from_le_bytes(row.data[0..4].try_into().unwrap()), 10);
        assert_eq!(i32::from_le_bytes(row.data[4..8].try_into().unwrap()), 1);
    }

    #[test]
    fn test_row_size_matches_schema_sum() {
        let db = db();
        let exec = project(&db, &[TabCol::new("t", "a"), TabCol::new("t", "s")]);
        let total: usize = exec.schema().iter().map(|c| c.len).sum();
        assert_eq!(exec.row_size(), total);
    }

    #[test]
    fn test_projection_idempotence() {
        // Project(Project(rows, cols), cols) produces the same rows and
        // row size as a single projection.
        let db = db();
        let cols = vec![TabCol::new("t", "s"), TabCol::new("t", "a")];
        let mut once = project(&db, &cols);
        let inner = Box::new(project(&db, &cols));
        let mut twice = ProjectionExec::new(inner, &cols).unwrap();
        assert_eq!(once.row_size(), twice.row_size());

        once.open().unwrap();
        twice.open().unwrap();
        while !once.at_end() {
            assert!(!twice.at_end());
            assert_eq!(once.current().unwrap(), twice.current().unwrap());
            once.next().unwrap();
            twice.next().unwrap();
        }
        assert!(twice.at_end());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let db = db();
        let scan = Box::new(SeqScanExec::new(&db, "t", vec![]).unwrap());
        assert!(matches!(
            ProjectionExec::new(scan, &[TabCol::new("t", "zz")]),
            Err(QueryError::ColumnNotFound(_))
        ));
    }
}
