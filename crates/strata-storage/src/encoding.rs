//! Column encoders.
//!
//! Sealed value columns can be re-encoded as dictionary or run-length
//! columns without changing row ids.

use std::cmp::Ordering;

use strata_common::prelude::*;

use crate::column::{Column, DictionaryColumn, RunLengthColumn, TypedValues, ValueColumn};
use crate::table::Table;
use crate::zs::{encode_by_zs_type, fixed_size_type_for};

/// Target encoding for [`encode_chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEncoding {
    Dictionary,
    RunLength,
}

/// Dictionary-encode a value column.
///
/// The dictionary is the sorted, deduplicated sequence of non-null values;
/// each row's attribute is the `lower_bound` index of its value, with NULL
/// rows assigned the reserved index `dictionary.len()`. The attribute vector
/// uses the narrowest fixed-size codec that fits the null index.
pub fn encode_dictionary(column: &ValueColumn) -> DictionaryColumn {
    let nulls = column.null_values();

    let (dictionary, attributes) = match column.values() {
        TypedValues::Int32(v) => {
            let (d, a) = encode_typed(v, nulls, Ord::cmp);
            (TypedValues::Int32(d), a)
        }
        TypedValues::Int64(v) => {
            let (d, a) = encode_typed(v, nulls, Ord::cmp);
            (TypedValues::Int64(d), a)
        }
        TypedValues::Float(v) => {
            let (d, a) = encode_typed(v, nulls, |a, b| a.total_cmp(b));
            (TypedValues::Float(d), a)
        }
        TypedValues::Double(v) => {
            let (d, a) = encode_typed(v, nulls, |a, b| a.total_cmp(b));
            (TypedValues::Double(d), a)
        }
        TypedValues::String(v) => {
            let (d, a) = encode_typed(v, nulls, Ord::cmp);
            (TypedValues::String(d), a)
        }
    };

    let null_value_id = ValueId(dictionary.len() as u32);
    let zs_type = fixed_size_type_for(null_value_id.0);
    let attribute_vector = encode_by_zs_type(zs_type, &attributes);

    DictionaryColumn::new(dictionary, attribute_vector, null_value_id)
}

fn encode_typed<T: Clone>(
    values: &[T],
    nulls: Option<&[bool]>,
    cmp: impl Fn(&T, &T) -> Ordering + Copy,
) -> (Vec<T>, Vec<u32>) {
    let mut dictionary: Vec<T> = match nulls {
        Some(nulls) => values
            .iter()
            .zip(nulls)
            .filter(|(_, &is_null)| !is_null)
            .map(|(value, _)| value.clone())
            .collect(),
        None => values.to_vec(),
    };
    dictionary.sort_by(cmp);
    dictionary.dedup_by(|a, b| cmp(a, b) == Ordering::Equal);
    dictionary.shrink_to_fit();

    let null_value_id = dictionary.len() as u32;
    let attributes = values
        .iter()
        .enumerate()
        .map(|(row, value)| {
            if nulls.is_some_and(|nulls| nulls[row]) {
                null_value_id
            } else {
                dictionary.partition_point(|entry| cmp(entry, value) == Ordering::Less) as u32
            }
        })
        .collect();

    (dictionary, attributes)
}

/// Sentinel standing in for NULL within a run-length column of `element_type`.
fn run_length_null_value(element_type: ElementType) -> Value {
    match element_type {
        ElementType::Int32 => Value::Int32(i32::MIN),
        ElementType::Int64 => Value::Int64(i64::MIN),
        ElementType::Float => Value::Float(f32::MIN),
        ElementType::Double => Value::Double(f64::MIN),
        ElementType::String => Value::String("\u{0}".into()),
    }
}

/// Run-length-encode a value column: consecutive equal values (NULLs mapped
/// to the sentinel) collapse into one run with an inclusive end position.
pub fn encode_run_length(column: &ValueColumn) -> RunLengthColumn {
    let null_value = run_length_null_value(column.element_type());
    let mut values = TypedValues::new(column.element_type());
    let mut end_positions: Vec<u32> = Vec::new();
    let mut current: Option<Value> = None;

    for row in 0..column.len() {
        let value = match column.value_at(row) {
            Value::Null => null_value.clone(),
            value => value,
        };
        if current.as_ref() == Some(&value) {
            *end_positions.last_mut().unwrap() = row as u32;
        } else {
            values.push(&value).expect("value type matches column type");
            end_positions.push(row as u32);
            current = Some(value);
        }
    }

    RunLengthColumn::new(values, end_positions, null_value)
}

/// Re-encode every value column of a sealed chunk in place. Already-encoded
/// columns are left untouched; row ids are unaffected.
pub fn encode_chunk(table: &mut Table, chunk_id: ChunkId, encoding: ChunkEncoding) -> Result<()> {
    if chunk_id.0 as usize >= table.chunk_count() {
        return Err(Error::Storage(StorageError::ChunkNotFound(chunk_id.0)));
    }

    let chunk = table.get_chunk_mut(chunk_id);
    for column_index in 0..chunk.column_count() {
        let column_id = ColumnId(column_index as u32);
        let encoded = match chunk.column(column_id) {
            Column::Value(value_column) => match encoding {
                ChunkEncoding::Dictionary => {
                    Column::Dictionary(encode_dictionary(value_column))
                }
                ChunkEncoding::RunLength => Column::RunLength(encode_run_length(value_column)),
            },
            _ => continue,
        };
        chunk.replace_column(column_id, encoded);
    }

    tracing::debug!(chunk = chunk_id.0, ?encoding, "re-encoded chunk");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_column(values: &[Option<&str>]) -> ValueColumn {
        let mut column = ValueColumn::new(ElementType::String, true);
        for value in values {
            let value = match value {
                Some(s) => Value::String((*s).into()),
                None => Value::Null,
            };
            column.append(&value).unwrap();
        }
        column
    }

    #[test]
    fn test_dictionary_encoding_with_null() {
        // ["b", NULL, "a", "a"] -> dictionary ["a", "b"], null index 2,
        // attribute vector [1, 2, 0, 0]
        let column = string_column(&[Some("b"), None, Some("a"), Some("a")]);
        let encoded = encode_dictionary(&column);

        assert_eq!(
            *encoded.dictionary(),
            TypedValues::String(vec!["a".into(), "b".into()])
        );
        assert_eq!(encoded.null_value_id(), ValueId(2));
        assert_eq!(encoded.attribute_vector().decode(), vec![1, 2, 0, 0]);
    }

    #[test]
    fn test_dictionary_round_trip() {
        let mut column = ValueColumn::new(ElementType::Int32, true);
        let input = [
            Value::Int32(5),
            Value::Null,
            Value::Int32(-2),
            Value::Int32(5),
            Value::Int32(100),
        ];
        for value in &input {
            column.append(value).unwrap();
        }

        let encoded = encode_dictionary(&column);
        for (row, expected) in input.iter().enumerate() {
            assert_eq!(encoded.value_at(row), *expected);
        }
    }

    #[test]
    fn test_dictionary_attribute_vector_width() {
        let mut column = ValueColumn::new(ElementType::Int32, false);
        for i in 0..300 {
            column.append(&Value::Int32(i)).unwrap();
        }
        let encoded = encode_dictionary(&column);
        // 300 distinct values force 2-byte attributes
        assert_eq!(
            encoded.attribute_vector().zs_type(),
            crate::zs::ZsType::FixedSize2
        );
    }

    #[test]
    fn test_run_length_encoding() {
        let mut column = ValueColumn::new(ElementType::Int32, true);
        for value in [
            Value::Int32(5),
            Value::Int32(5),
            Value::Null,
            Value::Null,
            Value::Int32(7),
        ] {
            column.append(&value).unwrap();
        }

        let encoded = encode_run_length(&column);
        assert_eq!(encoded.end_positions(), &[1, 3, 4]);
        assert_eq!(encoded.len(), 5);
        assert_eq!(encoded.value_at(0), Value::Int32(5));
        assert_eq!(encoded.value_at(2), Value::Null);
        assert_eq!(encoded.value_at(4), Value::Int32(7));
    }

    #[test]
    fn test_encode_chunk() {
        let mut table = Table::new(
            vec![
                ColumnDefinition::new("a", ElementType::Int32),
                ColumnDefinition::new("b", ElementType::String),
            ],
            0,
        );
        for i in 0..10 {
            table
                .append(vec![Value::Int32(i % 3), Value::String("s".into())])
                .unwrap();
        }

        encode_chunk(&mut table, ChunkId(0), ChunkEncoding::Dictionary).unwrap();
        let chunk = table.get_chunk(ChunkId(0));
        assert!(matches!(chunk.column(ColumnId(0)), Column::Dictionary(_)));
        assert_eq!(chunk.column(ColumnId(0)).value_at(4), Value::Int32(1));
    }
}
