//! Plain value columns.

use strata_common::prelude::*;

use super::TypedValues;

/// A contiguous typed sequence plus an optional parallel null-flag sequence.
/// Appendable until the owning chunk is sealed.
#[derive(Debug, Clone)]
pub struct ValueColumn {
    values: TypedValues,
    null_values: Option<Vec<bool>>,
}

impl ValueColumn {
    pub fn new(element_type: ElementType, nullable: bool) -> Self {
        Self {
            values: TypedValues::new(element_type),
            null_values: nullable.then(Vec::new),
        }
    }

    pub fn from_values(values: TypedValues, null_values: Option<Vec<bool>>) -> Self {
        if let Some(nulls) = &null_values {
            debug_assert_eq!(values.len(), nulls.len());
        }
        Self {
            values,
            null_values,
        }
    }

    pub fn element_type(&self) -> ElementType {
        self.values.element_type()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_nullable(&self) -> bool {
        self.null_values.is_some()
    }

    pub fn values(&self) -> &TypedValues {
        &self.values
    }

    pub fn null_values(&self) -> Option<&[bool]> {
        self.null_values.as_deref()
    }

    pub fn value_at(&self, row: usize) -> Value {
        if let Some(nulls) = &self.null_values {
            if nulls[row] {
                return Value::Null;
            }
        }
        self.values.value_at(row)
    }

    pub fn append(&mut self, value: &Value) -> Result<()> {
        match &mut self.null_values {
            Some(nulls) => {
                self.values.push(value)?;
                nulls.push(value.is_null());
            }
            None => {
                if value.is_null() {
                    return Err(Error::invalid_argument(
                        "cannot append NULL to a non-nullable column",
                    ));
                }
                self.values.push(value)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_read() {
        let mut column = ValueColumn::new(ElementType::Int64, true);
        column.append(&Value::Int64(10)).unwrap();
        column.append(&Value::Null).unwrap();
        column.append(&Value::Int64(-3)).unwrap();

        assert_eq!(column.len(), 3);
        assert_eq!(column.value_at(0), Value::Int64(10));
        assert_eq!(column.value_at(1), Value::Null);
        assert_eq!(column.value_at(2), Value::Int64(-3));
    }

    #[test]
    fn test_null_rejected_when_not_nullable() {
        let mut column = ValueColumn::new(ElementType::Double, false);
        column.append(&Value::Double(1.5)).unwrap();
        assert!(column.append(&Value::Null).is_err());
        assert_eq!(column.len(), 1);
    }
}
