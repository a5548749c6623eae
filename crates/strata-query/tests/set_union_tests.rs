//! Operator-level tests for the position-set union.

use std::sync::Arc;

use strata_common::types::{ColumnDefinition, ColumnId, ElementType, RowId, Value};
use strata_query::operators::SetUnion;
use strata_query::{ExecutionContext, PhysicalOperator};
use strata_storage::chunk::Chunk;
use strata_storage::column::{Column, PosList, ReferenceColumn};
use strata_storage::storage_manager::StorageManager;
use strata_storage::table::{SharedTable, Table};

fn context() -> ExecutionContext {
    ExecutionContext::new(Arc::new(StorageManager::new()))
}

/// A base table of one Int32 column with `rows` rows in one chunk.
fn base_table(rows: i32) -> SharedTable {
    let mut table = Table::new(vec![ColumnDefinition::new("x", ElementType::Int32)], 0);
    for value in 0..rows {
        table.append(vec![Value::Int32(value)]).unwrap();
    }
    table.into_shared()
}

/// A single-chunk References table over `base` with the given positions.
fn reference_table(base: &SharedTable, positions: Vec<RowId>, chunk_size: u32) -> SharedTable {
    let definitions = base.read().column_definitions().to_vec();
    let mut table = Table::new_references(definitions, chunk_size);
    let mut chunk = Chunk::new();
    chunk.add_column(Column::Reference(ReferenceColumn::new(
        base.clone(),
        ColumnId(0),
        Arc::new(PosList::new(positions)),
    )));
    table.emplace_chunk(chunk);
    table.into_shared()
}

/// Row ids of the whole output, per segment-begin column, in output order.
fn output_positions(table: &SharedTable) -> Vec<RowId> {
    let table = table.read();
    let mut positions = Vec::new();
    for chunk in table.chunks() {
        let Column::Reference(reference) = chunk.column(ColumnId(0)) else {
            panic!("expected a reference column");
        };
        positions.extend_from_slice(reference.pos_list().positions());
    }
    positions
}

fn union(left: &SharedTable, right: &SharedTable) -> SharedTable {
    SetUnion::new()
        .execute(&[left.clone(), right.clone()], &context())
        .unwrap()
}

#[test]
fn test_set_union_merges_overlapping_positions() {
    let base = base_table(6);
    let left = reference_table(&base, vec![RowId::new(0, 0), RowId::new(0, 2)], 0);
    let right = reference_table(&base, vec![RowId::new(0, 2), RowId::new(0, 5)], 0);

    let result = union(&left, &right);
    assert_eq!(
        output_positions(&result),
        vec![RowId::new(0, 0), RowId::new(0, 2), RowId::new(0, 5)]
    );
}

#[test]
fn test_set_union_is_commutative() {
    let base = base_table(8);
    let left = reference_table(
        &base,
        vec![RowId::new(0, 1), RowId::new(0, 4), RowId::new(0, 6)],
        0,
    );
    let right = reference_table(&base, vec![RowId::new(0, 0), RowId::new(0, 4)], 0);

    assert_eq!(
        output_positions(&union(&left, &right)),
        output_positions(&union(&right, &left))
    );
}

#[test]
fn test_set_union_with_itself() {
    let base = base_table(5);
    let positions = vec![RowId::new(0, 1), RowId::new(0, 3)];
    let table = reference_table(&base, positions.clone(), 0);

    let result = union(&table, &table);
    assert_eq!(output_positions(&result), positions);
}

#[test]
fn test_set_union_empty_side_returns_other() {
    let base = base_table(4);
    let filled = reference_table(&base, vec![RowId::new(0, 1)], 0);
    let empty = reference_table(&base, Vec::new(), 0);

    let result = union(&filled, &empty);
    assert_eq!(output_positions(&result), vec![RowId::new(0, 1)]);

    let result = union(&empty, &filled);
    assert_eq!(output_positions(&result), vec![RowId::new(0, 1)]);
}

#[test]
fn test_set_union_duplicate_row_emitted_once() {
    let base = base_table(4);
    // the same row id appears on both sides and twice on the left
    let left = reference_table(
        &base,
        vec![RowId::new(0, 2), RowId::new(0, 2), RowId::new(0, 3)],
        0,
    );
    let right = reference_table(&base, vec![RowId::new(0, 2)], 0);

    let result = union(&left, &right);
    // within one side duplicates survive (it is a position multiset); the
    // cross-side duplicate collapses
    assert_eq!(
        output_positions(&result),
        vec![RowId::new(0, 2), RowId::new(0, 2), RowId::new(0, 3)]
    );
}

#[test]
fn test_set_union_chunked_output() {
    let base = base_table(10);
    let left = reference_table(
        &base,
        (0..4).map(|offset| RowId::new(0, offset)).collect(),
        2,
    );
    let right = reference_table(
        &base,
        (4..8).map(|offset| RowId::new(0, offset)).collect(),
        2,
    );

    let result = union(&left, &right);
    // output chunk size is max(left, right) = 2, eight rows total
    assert_eq!(result.read().chunk_count(), 4);
    assert_eq!(
        output_positions(&result),
        (0..8).map(|offset| RowId::new(0, offset)).collect::<Vec<_>>()
    );
}

#[test]
fn test_set_union_rejects_schema_mismatch() {
    let base = base_table(3);
    let left = reference_table(&base, vec![RowId::new(0, 0)], 0);

    let mut other = Table::new(
        vec![ColumnDefinition::new("renamed", ElementType::Int32)],
        0,
    );
    other.append(vec![Value::Int32(0)]).unwrap();
    let other = other.into_shared();
    let right = reference_table(&other, vec![RowId::new(0, 0)], 0);

    let result = SetUnion::new().execute(&[left, right], &context());
    assert!(result.is_err());
}

#[test]
fn test_set_union_multi_segment() {
    // two segments per row, as a join output would produce
    let base_a = base_table(4);
    let base_b = base_table(4);

    let two_segment_table = |pairs: Vec<(RowId, RowId)>| -> SharedTable {
        let definitions = vec![
            ColumnDefinition::new("x", ElementType::Int32),
            ColumnDefinition::new("y", ElementType::Int32),
        ];
        let mut table = Table::new_references(definitions, 0);
        let mut chunk = Chunk::new();
        let (left_rows, right_rows): (Vec<RowId>, Vec<RowId>) = pairs.into_iter().unzip();
        chunk.add_column(Column::Reference(ReferenceColumn::new(
            base_a.clone(),
            ColumnId(0),
            Arc::new(PosList::new(left_rows)),
        )));
        chunk.add_column(Column::Reference(ReferenceColumn::new(
            base_b.clone(),
            ColumnId(0),
            Arc::new(PosList::new(right_rows)),
        )));
        table.emplace_chunk(chunk);
        table.into_shared()
    };

    let left = two_segment_table(vec![
        (RowId::new(0, 0), RowId::new(0, 1)),
        (RowId::new(0, 2), RowId::new(0, 3)),
    ]);
    let right = two_segment_table(vec![
        (RowId::new(0, 0), RowId::new(0, 1)),
        (RowId::new(0, 1), RowId::new(0, 0)),
    ]);

    let result = union(&left, &right);
    let table = result.read();
    assert_eq!(table.row_count(), 3);

    // both segments stay aligned: the shared tuple (0,0)/(0,1) appears once
    let chunk = table.get_chunk(strata_common::types::ChunkId(0));
    let Column::Reference(first) = chunk.column(ColumnId(0)) else {
        panic!("expected a reference column");
    };
    let Column::Reference(second) = chunk.column(ColumnId(1)) else {
        panic!("expected a reference column");
    };
    let tuples: Vec<(RowId, RowId)> = first
        .pos_list()
        .positions()
        .iter()
        .copied()
        .zip(second.pos_list().positions().iter().copied())
        .collect();
    assert_eq!(
        tuples,
        vec![
            (RowId::new(0, 0), RowId::new(0, 1)),
            (RowId::new(0, 1), RowId::new(0, 0)),
            (RowId::new(0, 2), RowId::new(0, 3)),
        ]
    );
}
