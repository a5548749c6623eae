//! End-to-end execution tests: SQL text through translation, lowering, and
//! the operator pipeline.

use std::sync::Arc;

use strata_common::config::EngineConfig;
use strata_common::types::{ColumnDefinition, ColumnId, ElementType, Value};
use strata_query::{build_operator_plan, execute_sql, ExecutionContext};
use strata_sql::{parse_sql, SqlTranslator};
use strata_storage::encoding::{encode_chunk, ChunkEncoding};
use strata_storage::storage_manager::StorageManager;
use strata_storage::table::{SharedTable, Table};

fn setup() -> Arc<StorageManager> {
    let storage = Arc::new(StorageManager::new());

    let mut t = Table::new(
        vec![
            ColumnDefinition::new("a", ElementType::Int32),
            ColumnDefinition::new("b", ElementType::Int32),
        ],
        2,
    );
    for (a, b) in [(1, 10), (2, 20), (3, 30), (4, 40), (5, 50)] {
        t.append(vec![Value::Int32(a), Value::Int32(b)]).unwrap();
    }
    storage.add_table("t", t.into_shared()).unwrap();

    let mut sales = Table::new(
        vec![
            ColumnDefinition::new("region", ElementType::Int32),
            ColumnDefinition::new("amount", ElementType::Int32),
        ],
        4,
    );
    for (region, amount) in [(1, 5), (1, 7), (2, -4), (2, 2), (3, 9)] {
        sales
            .append(vec![Value::Int32(region), Value::Int32(amount)])
            .unwrap();
    }
    storage.add_table("sales", sales.into_shared()).unwrap();

    let mut t1 = Table::new(
        vec![
            ColumnDefinition::new("a", ElementType::Int32),
            ColumnDefinition::new("b", ElementType::Int32),
        ],
        4,
    );
    t1.append(vec![Value::Int32(1), Value::Int32(7)]).unwrap();
    t1.append(vec![Value::Int32(2), Value::Int32(8)]).unwrap();
    storage.add_table("t1", t1.into_shared()).unwrap();

    let mut t2 = Table::new(
        vec![
            ColumnDefinition::new("b", ElementType::Int32),
            ColumnDefinition::new("c", ElementType::Int32),
        ],
        4,
    );
    t2.append(vec![Value::Int32(7), Value::Int32(100)]).unwrap();
    t2.append(vec![Value::Int32(9), Value::Int32(200)]).unwrap();
    storage.add_table("t2", t2.into_shared()).unwrap();

    let mut names = Table::new(
        vec![ColumnDefinition::new("name", ElementType::String)],
        4,
    );
    for name in ["alice", "bob", "anna"] {
        names.append(vec![Value::String(name.into())]).unwrap();
    }
    storage.add_table("names", names.into_shared()).unwrap();

    storage
}

fn run(storage: &Arc<StorageManager>, sql: &str) -> SharedTable {
    execute_sql(sql, storage, &EngineConfig::default())
        .unwrap()
        .pop()
        .unwrap()
}

/// All rows of a result, materialized row-major.
fn rows(table: &SharedTable) -> Vec<Vec<Value>> {
    let table = table.read();
    let mut out = Vec::new();
    for chunk in table.chunks() {
        for row in 0..chunk.row_count() {
            out.push(
                (0..table.column_count())
                    .map(|column| chunk.column(ColumnId(column as u32)).value_at(row))
                    .collect(),
            );
        }
    }
    out
}

fn int_column(table: &SharedTable, column: usize) -> Vec<i64> {
    rows(table)
        .iter()
        .map(|row| row[column].as_i64().unwrap())
        .collect()
}

#[test]
fn test_select_with_reversed_comparison() {
    let storage = setup();
    let result = run(&storage, "SELECT a FROM t WHERE 5 > a");
    let mut values = int_column(&result, 0);
    values.sort_unstable();
    assert_eq!(values, vec![1, 2, 3, 4]);
}

#[test]
fn test_where_and_chains() {
    let storage = setup();
    let result = run(&storage, "SELECT a FROM t WHERE a > 1 AND b < 50");
    let mut values = int_column(&result, 0);
    values.sort_unstable();
    assert_eq!(values, vec![2, 3, 4]);
}

#[test]
fn test_where_or_unions_positions_without_duplicates() {
    let storage = setup();
    // the branches overlap on a = 1; the union must emit it once
    let result = run(&storage, "SELECT a FROM t WHERE a < 3 OR a < 2");
    let mut values = int_column(&result, 0);
    values.sort_unstable();
    assert_eq!(values, vec![1, 2]);

    let result = run(&storage, "SELECT a FROM t WHERE a < 2 OR a > 4");
    let mut values = int_column(&result, 0);
    values.sort_unstable();
    assert_eq!(values, vec![1, 5]);
}

#[test]
fn test_between_is_inclusive() {
    let storage = setup();
    let result = run(&storage, "SELECT a FROM t WHERE a BETWEEN 2 AND 4");
    let mut values = int_column(&result, 0);
    values.sort_unstable();
    assert_eq!(values, vec![2, 3, 4]);
}

#[test]
fn test_order_by_and_limit() {
    let storage = setup();
    let result = run(&storage, "SELECT a, b FROM t ORDER BY a DESC LIMIT 3");
    assert_eq!(int_column(&result, 0), vec![5, 4, 3]);
    assert_eq!(int_column(&result, 1), vec![50, 40, 30]);
}

#[test]
fn test_projection_arithmetic() {
    let storage = setup();
    let result = run(&storage, "SELECT a + 1, b / 10 FROM t WHERE a = 3");
    assert_eq!(rows(&result), vec![vec![Value::Int64(4), Value::Int64(3)]]);
}

#[test]
fn test_aggregate_group_by() {
    let storage = setup();
    let result = run(
        &storage,
        "SELECT region, SUM(amount) FROM sales GROUP BY region",
    );
    let mut grouped = rows(&result);
    grouped.sort_by_key(|row| row[0].as_i64());
    assert_eq!(
        grouped,
        vec![
            vec![Value::Int32(1), Value::Int64(12)],
            vec![Value::Int32(2), Value::Int64(-2)],
            vec![Value::Int32(3), Value::Int64(9)],
        ]
    );
}

#[test]
fn test_having_with_hidden_aggregate() {
    let storage = setup();
    // AVG(amount) is computed for the filter but not part of the output
    let result = run(
        &storage,
        "SELECT region, SUM(amount) FROM sales GROUP BY region HAVING AVG(amount) > 0",
    );
    assert_eq!(result.read().column_count(), 2);
    let mut grouped = rows(&result);
    grouped.sort_by_key(|row| row[0].as_i64());
    assert_eq!(
        grouped,
        vec![
            vec![Value::Int32(1), Value::Int64(12)],
            vec![Value::Int32(3), Value::Int64(9)],
        ]
    );
}

#[test]
fn test_count_star_and_avg() {
    let storage = setup();
    let result = run(&storage, "SELECT COUNT(*) FROM t");
    assert_eq!(rows(&result), vec![vec![Value::Int64(5)]]);

    let result = run(&storage, "SELECT AVG(b) FROM t");
    assert_eq!(rows(&result), vec![vec![Value::Double(30.0)]]);
}

#[test]
fn test_count_on_empty_filter_yields_zero() {
    let storage = setup();
    let result = run(&storage, "SELECT COUNT(*) FROM t WHERE a > 100");
    assert_eq!(rows(&result), vec![vec![Value::Int64(0)]]);
}

#[test]
fn test_natural_join() {
    let storage = setup();
    let result = run(&storage, "SELECT * FROM t1 NATURAL JOIN t2");
    // one shared column "b"; only t1 row (1, 7) matches t2 row (7, 100)
    assert_eq!(
        rows(&result),
        vec![vec![Value::Int32(1), Value::Int32(7), Value::Int32(100)]]
    );
}

#[test]
fn test_inner_join_on() {
    let storage = setup();
    let result = run(&storage, "SELECT t1.a, t2.c FROM t1 JOIN t2 ON t1.b = t2.b");
    assert_eq!(rows(&result), vec![vec![Value::Int32(1), Value::Int32(100)]]);
}

#[test]
fn test_left_outer_join_pads_with_null() {
    let storage = setup();
    let result = run(
        &storage,
        "SELECT t1.a, t2.c FROM t1 LEFT JOIN t2 ON t1.b = t2.b",
    );
    let mut result_rows = rows(&result);
    result_rows.sort_by_key(|row| row[0].as_i64());
    assert_eq!(
        result_rows,
        vec![
            vec![Value::Int32(1), Value::Int32(100)],
            vec![Value::Int32(2), Value::Null],
        ]
    );
}

#[test]
fn test_like_scan() {
    let storage = setup();
    let result = run(&storage, "SELECT name FROM names WHERE name LIKE 'a%'");
    let mut values: Vec<String> = rows(&result)
        .into_iter()
        .map(|row| row[0].as_str().unwrap().to_string())
        .collect();
    values.sort();
    assert_eq!(values, vec!["alice", "anna"]);
}

#[test]
fn test_scan_over_encoded_chunks() {
    let storage = setup();
    {
        // chunk 0 dictionary, chunk 1 run-length, chunk 2 stays plain
        let table = storage.get_table("t").unwrap();
        let mut table = table.write();
        encode_chunk(
            &mut table,
            strata_common::types::ChunkId(0),
            ChunkEncoding::Dictionary,
        )
        .unwrap();
        encode_chunk(
            &mut table,
            strata_common::types::ChunkId(1),
            ChunkEncoding::RunLength,
        )
        .unwrap();
    }

    let result = run(&storage, "SELECT a FROM t WHERE b >= 20");
    let mut values = int_column(&result, 0);
    values.sort_unstable();
    assert_eq!(values, vec![2, 3, 4, 5]);

    let result = run(&storage, "SELECT a FROM t WHERE b BETWEEN 20 AND 40");
    let mut values = int_column(&result, 0);
    values.sort_unstable();
    assert_eq!(values, vec![2, 3, 4]);
}

#[test]
fn test_recreate_binds_placeholders() {
    let storage = setup();
    let statements = parse_sql("SELECT a FROM t WHERE a = ?").unwrap();
    let plan = SqlTranslator::new(storage.clone())
        .translate_statement(&statements[0])
        .unwrap();
    let operators = build_operator_plan(&plan).unwrap();

    // executing with the placeholder unbound is an error
    assert!(operators.execute(&ExecutionContext::new(storage.clone())).is_err());

    let bound = operators.recreate(&[strata_query::OperatorParameterValue::Value(
        Value::Int64(3),
    )]);
    let result = bound.execute(&ExecutionContext::new(storage)).unwrap();
    assert_eq!(int_column(&result, 0), vec![3]);
}

#[test]
fn test_insert_and_read_back() {
    let storage = setup();
    run(&storage, "INSERT INTO t VALUES (6, 60)");
    let result = run(&storage, "SELECT COUNT(*) FROM t");
    assert_eq!(rows(&result), vec![vec![Value::Int64(6)]]);

    // a column list prefills the unnamed columns with NULL
    run(&storage, "INSERT INTO t (a) VALUES (7)");
    let result = run(&storage, "SELECT b FROM t WHERE a = 7");
    assert_eq!(rows(&result), vec![vec![Value::Null]]);
}

#[test]
fn test_delete_hides_rows_from_validate() {
    let storage = setup();
    run(&storage, "DELETE FROM t WHERE a = 2");
    let result = run(&storage, "SELECT a FROM t");
    let mut values = int_column(&result, 0);
    values.sort_unstable();
    assert_eq!(values, vec![1, 3, 4, 5]);
}

#[test]
fn test_update_is_delete_plus_insert() {
    let storage = setup();
    run(&storage, "UPDATE t SET b = 99 WHERE a = 1");

    let result = run(&storage, "SELECT b FROM t WHERE a = 1");
    assert_eq!(rows(&result), vec![vec![Value::Int32(99)]]);

    let result = run(&storage, "SELECT COUNT(*) FROM t");
    assert_eq!(rows(&result), vec![vec![Value::Int64(5)]]);
}

#[test]
fn test_show_tables_and_columns() {
    let storage = setup();
    let result = run(&storage, "SHOW TABLES");
    let names: Vec<String> = rows(&result)
        .into_iter()
        .map(|row| row[0].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["names", "sales", "t", "t1", "t2"]);

    let result = run(&storage, "SHOW COLUMNS FROM t");
    assert_eq!(
        rows(&result)[0],
        vec![
            Value::String("a".into()),
            Value::String("INTEGER".into()),
            Value::String("Yes".into()),
        ]
    );
}

#[test]
fn test_derived_table_with_alias() {
    let storage = setup();
    let result = run(
        &storage,
        "SELECT x.a FROM (SELECT a, b FROM t WHERE a > 3) AS x WHERE x.b < 50",
    );
    assert_eq!(int_column(&result, 0), vec![4]);
}

#[test]
fn test_cancellation_aborts_execution() {
    let storage = setup();
    let statements = parse_sql("SELECT a FROM t").unwrap();
    let plan = SqlTranslator::new(storage.clone())
        .translate_statement(&statements[0])
        .unwrap();
    let operators = build_operator_plan(&plan).unwrap();

    let context = ExecutionContext::new(storage);
    context.cancellation.cancel();
    assert!(operators.execute(&context).is_err());
}

#[test]
fn test_translation_errors_surface_before_execution() {
    let storage = setup();
    let config = EngineConfig::default();
    assert!(execute_sql("SELECT missing FROM t", &storage, &config).is_err());
    assert!(execute_sql("SELECT a FROM nowhere", &storage, &config).is_err());
    assert!(execute_sql("SELECT b FROM t1 JOIN t2 ON b = b", &storage, &config).is_err());
}
