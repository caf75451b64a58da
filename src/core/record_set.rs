//! In-memory record source
//!
//! [`RecordSet`] holds a column list and a set of rows and implements [`DataReader`] over
//! them. It is what the SQLite backend returns and what tests feed into converters.

use super::error::{MappingError, Result};
use super::field_type::FieldType;
use super::record::{Column, DataReader, DataRecord, RecordSchema};
use super::value::DatabaseValue;
use std::sync::Arc;

/// In-memory, forward-only record source
#[derive(Debug, Clone)]
pub struct RecordSet {
    columns: Arc<[Column]>,
    rows: Vec<Vec<DatabaseValue>>,
    // index of the row the reader is positioned on; `None` before the first `advance`
    cursor: Option<usize>,
}

impl RecordSet {
    /// Create an empty record set with the given columns
    pub fn new(columns: impl Into<Vec<Column>>) -> Self {
        Self {
            columns: columns.into().into(),
            rows: Vec::new(),
            cursor: None,
        }
    }

    /// Columns of this record set
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of rows held
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the record set holds no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row
    ///
    /// # Errors
    ///
    /// Returns error if the row width does not match the column count
    pub fn push_row<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        let row: Vec<DatabaseValue> = values.into_iter().map(Into::into).collect();
        if row.len() != self.columns.len() {
            return Err(MappingError::other(format!(
                "Row has {} values but record set has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Builder-style variant of [`push_row`](Self::push_row)
    pub fn with_row<I, V>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        self.push_row(values)?;
        Ok(self)
    }

    /// Change the schema nullability of a column
    pub fn set_nullable(&mut self, ordinal: usize, nullable: bool) {
        let mut columns = self.columns.to_vec();
        if let Some(column) = columns.get_mut(ordinal) {
            column.nullable = nullable;
        }
        self.columns = columns.into();
    }

    /// Position the reader before the first row again
    pub fn rewind(&mut self) {
        self.cursor = None;
    }

    fn current(&self) -> &[DatabaseValue] {
        match self.cursor {
            Some(row) if row < self.rows.len() => &self.rows[row],
            _ => &[],
        }
    }
}

static NULL: DatabaseValue = DatabaseValue::Null;

impl RecordSchema for RecordSet {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, ordinal: usize) -> &str {
        &self.columns[ordinal].name
    }

    fn field_type(&self, ordinal: usize) -> FieldType {
        self.columns[ordinal].field_type
    }

    fn provider_specific_field_type(&self, ordinal: usize) -> Option<FieldType> {
        self.columns[ordinal].provider_specific_type
    }

    fn is_nullable(&self, ordinal: usize) -> bool {
        self.columns[ordinal].nullable
    }
}

impl DataRecord for RecordSet {
    fn value(&self, ordinal: usize) -> &DatabaseValue {
        self.current().get(ordinal).unwrap_or(&NULL)
    }
}

impl DataReader for RecordSet {
    fn advance(&mut self) -> Result<bool> {
        let next = self.cursor.map_or(0, |row| row + 1);
        self.cursor = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> RecordSet {
        let mut records = RecordSet::new(vec![
            Column::new("Id", FieldType::Int),
            Column::nullable("Name", FieldType::String),
        ]);
        records
            .push_row([DatabaseValue::Int(1), DatabaseValue::Null])
            .unwrap();
        records
            .push_row([DatabaseValue::Int(2), DatabaseValue::from("Bob")])
            .unwrap();
        records
    }

    #[test]
    fn test_record_set_iteration() {
        let mut records = people();
        assert_eq!(records.len(), 2);

        assert!(records.advance().unwrap());
        assert_eq!(records.value(0), &DatabaseValue::Int(1));
        assert!(records.is_null(1));

        assert!(records.advance().unwrap());
        assert_eq!(records.value(1).as_str(), Some("Bob"));

        assert!(!records.advance().unwrap());
        assert!(!records.advance().unwrap());

        records.rewind();
        assert!(records.advance().unwrap());
        assert_eq!(records.value(0), &DatabaseValue::Int(1));
    }

    #[test]
    fn test_record_set_schema() {
        let mut records = people();
        assert_eq!(records.field_count(), 2);
        assert_eq!(records.field_name(1), "Name");
        assert_eq!(records.field_type(0), FieldType::Int);
        assert!(!records.is_nullable(0));
        assert!(records.is_nullable(1));
        assert_eq!(records.ordinal_of("Name"), Some(1));
        assert_eq!(records.ordinal_of("Missing"), None);

        records.set_nullable(0, true);
        assert!(records.is_nullable(0));
    }

    #[test]
    fn test_push_row_width_mismatch() {
        let mut records = people();
        assert!(records.push_row([DatabaseValue::Int(3)]).is_err());
    }

    #[test]
    fn test_value_before_first_row_is_null() {
        let records = people();
        assert!(records.is_null(0));
    }
}
