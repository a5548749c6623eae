//! Dictionary-encoded columns.

use strata_common::prelude::*;

use super::TypedValues;
use crate::zs::ZsVector;

/// A sorted unique dictionary plus a compressed attribute vector of
/// dictionary indices. The index `dictionary.len()` is reserved for NULL.
/// Immutable.
#[derive(Debug, Clone)]
pub struct DictionaryColumn {
    dictionary: TypedValues,
    attribute_vector: ZsVector,
    null_value_id: ValueId,
}

impl DictionaryColumn {
    pub fn new(dictionary: TypedValues, attribute_vector: ZsVector, null_value_id: ValueId) -> Self {
        debug_assert_eq!(null_value_id.0 as usize, dictionary.len());
        Self {
            dictionary,
            attribute_vector,
            null_value_id,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.dictionary.element_type()
    }

    pub fn len(&self) -> usize {
        self.attribute_vector.size()
    }

    pub fn is_empty(&self) -> bool {
        self.attribute_vector.is_empty()
    }

    pub fn dictionary(&self) -> &TypedValues {
        &self.dictionary
    }

    pub fn attribute_vector(&self) -> &ZsVector {
        &self.attribute_vector
    }

    pub fn null_value_id(&self) -> ValueId {
        self.null_value_id
    }

    /// Number of distinct non-null values.
    pub fn unique_values_count(&self) -> usize {
        self.dictionary.len()
    }

    pub fn value_at(&self, row: usize) -> Value {
        let value_id = self.attribute_vector.get(row);
        if value_id == self.null_value_id.0 {
            Value::Null
        } else {
            self.dictionary.value_at(value_id as usize)
        }
    }

    /// Id of the first dictionary entry not less than `value`.
    pub fn lower_bound(&self, value: &Value) -> ValueId {
        ValueId(self.dictionary.lower_bound(value) as u32)
    }

    /// Id of the first dictionary entry greater than `value`.
    pub fn upper_bound(&self, value: &Value) -> ValueId {
        ValueId(self.dictionary.upper_bound(value) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zs::{encode_by_zs_type, ZsType};

    fn sample_column() -> DictionaryColumn {
        // Rows: "b", NULL, "a", "a"
        let dictionary = TypedValues::String(vec!["a".into(), "b".into()]);
        let attribute_vector = encode_by_zs_type(ZsType::FixedSize1, &[1, 2, 0, 0]);
        DictionaryColumn::new(dictionary, attribute_vector, ValueId(2))
    }

    #[test]
    fn test_value_lookup() {
        let column = sample_column();
        assert_eq!(column.len(), 4);
        assert_eq!(column.value_at(0), Value::String("b".into()));
        assert_eq!(column.value_at(1), Value::Null);
        assert_eq!(column.value_at(2), Value::String("a".into()));
    }

    #[test]
    fn test_bounds() {
        let column = sample_column();
        assert_eq!(column.lower_bound(&Value::String("a".into())), ValueId(0));
        assert_eq!(column.upper_bound(&Value::String("a".into())), ValueId(1));
        assert_eq!(column.lower_bound(&Value::String("c".into())), ValueId(2));
    }
}
