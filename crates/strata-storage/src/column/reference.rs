//! Reference columns and position lists.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use strata_common::prelude::*;

use crate::table::SharedTable;

static NEXT_POS_LIST_ID: AtomicU64 = AtomicU64::new(0);

/// An ordered sequence of row ids, shared between the reference columns of
/// one segment.
///
/// Every position list gets a process-unique id at construction; columns
/// belong to the same segment exactly when their position lists carry the
/// same id. Identity is explicit rather than derived from pointer equality.
#[derive(Debug)]
pub struct PosList {
    id: u64,
    positions: Vec<RowId>,
}

impl PosList {
    pub fn new(positions: Vec<RowId>) -> Self {
        Self {
            id: NEXT_POS_LIST_ID.fetch_add(1, Ordering::Relaxed),
            positions,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn positions(&self) -> &[RowId] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// True when `other` is the same list, not merely an equal one.
    pub fn same_as(&self, other: &PosList) -> bool {
        self.id == other.id
    }
}

/// A column whose values live in another table, read through a shared
/// position list. Reference columns never nest: the referenced column is
/// always part of a `Data` table.
#[derive(Debug, Clone)]
pub struct ReferenceColumn {
    referenced_table: SharedTable,
    referenced_column_id: ColumnId,
    pos_list: Arc<PosList>,
}

impl ReferenceColumn {
    pub fn new(
        referenced_table: SharedTable,
        referenced_column_id: ColumnId,
        pos_list: Arc<PosList>,
    ) -> Self {
        // try_read: the caller may already hold a read lock on this table
        debug_assert!(
            referenced_table
                .try_read()
                .is_none_or(|table| table.table_type() == TableType::Data),
            "reference columns must not reference another References table"
        );
        Self {
            referenced_table,
            referenced_column_id,
            pos_list,
        }
    }

    pub fn referenced_table(&self) -> &SharedTable {
        &self.referenced_table
    }

    pub fn referenced_column_id(&self) -> ColumnId {
        self.referenced_column_id
    }

    pub fn pos_list(&self) -> &Arc<PosList> {
        &self.pos_list
    }

    pub fn element_type(&self) -> ElementType {
        self.referenced_table
            .read()
            .column_type(self.referenced_column_id)
    }

    pub fn len(&self) -> usize {
        self.pos_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pos_list.is_empty()
    }

    pub fn value_at(&self, row: usize) -> Value {
        let row_id = self.pos_list.positions()[row];
        let table = self.referenced_table.read();
        table
            .get_chunk(row_id.chunk_id)
            .column(self.referenced_column_id)
            .value_at(row_id.chunk_offset.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_list_identity() {
        let rows = vec![RowId::new(0, 0), RowId::new(0, 1)];
        let a = PosList::new(rows.clone());
        let b = PosList::new(rows);

        assert_eq!(a.positions(), b.positions());
        assert!(a.same_as(&a));
        assert!(!a.same_as(&b));
    }
}
