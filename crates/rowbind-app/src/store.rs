// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;

use thiserror::Error;

use crate::{Record, Value};

/// Failure reported by a record store, carrying the store's own error text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    message: String,
}

impl StoreError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Foreign-key resolution for one column: stored ids are looked up in
/// `table.id_field` and shown as `table.display_field`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub table: String,
    pub id_field: String,
    pub display_field: String,
}

impl Relation {
    pub fn new(
        table: impl Into<String>,
        id_field: impl Into<String>,
        display_field: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            id_field: id_field.into(),
            display_field: display_field.into(),
        }
    }
}

/// Store-level row filter: `field == value`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm {
    pub field: String,
    pub value: Value,
}

impl FilterTerm {
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Null never equals anything, matching SQL comparison semantics.
    pub fn matches(&self, record: &Record) -> bool {
        let actual = record.value(&self.field);
        !self.value.is_null() && !actual.is_null() && values_equal(actual, &self.value)
    }

    /// SQL rendering of the term. The field is quoted as an identifier and
    /// text values as string literals.
    pub fn to_sql(&self) -> String {
        format!("{} = {}", quote_identifier(&self.field), sql_literal(&self.value))
    }
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_owned(),
        Value::Integer(value) => value.to_string(),
        Value::Real(value) => value.to_string(),
        Value::Text(value) => format!("'{}'", value.replace('\'', "''")),
    }
}

/// Store equality: integers and reals compare numerically.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Integer(_) | Value::Real(_), Value::Integer(_) | Value::Real(_)) => {
            left.as_f64() == right.as_f64()
        }
        _ => left == right,
    }
}

/// The record store a model binds to: a buffered, filterable view of one
/// table.
///
/// Row-level writes (`insert_row`, `remove_row`, `set_cell_value`) only touch
/// the edit buffer; `submit_all` persists them and `revert_all` drops them.
pub trait RecordStore {
    fn table_name(&self) -> &str;

    fn column_count(&self) -> usize;

    fn field_name_at(&self, index: usize) -> Option<&str>;

    fn index_of(&self, name: &str) -> Option<usize> {
        (0..self.column_count()).find(|index| self.field_name_at(*index) == Some(name))
    }

    fn row_count(&self) -> usize;

    fn row_at(&self, row: usize) -> Option<Record>;

    fn value_at(&self, row: usize, column: usize) -> Option<Value> {
        self.row_at(row)
            .and_then(|record| record.value_at(column).cloned())
    }

    /// Value as the store would present it: the related display value for
    /// columns with a relation, the stored value otherwise.
    fn display_value_at(&self, row: usize, column: usize) -> Option<Value>;

    fn insert_row(&mut self, row: usize) -> Result<(), StoreError>;

    fn remove_row(&mut self, row: usize) -> Result<(), StoreError>;

    fn set_cell_value(&mut self, row: usize, column: usize, value: Value)
    -> Result<(), StoreError>;

    /// Re-reads the table with the current filter, discarding the buffer.
    fn select(&mut self) -> Result<(), StoreError>;

    fn submit_all(&mut self) -> Result<(), StoreError>;

    fn revert_all(&mut self);

    fn has_pending_changes(&self) -> bool;

    /// Takes effect on the next `select()`.
    fn set_filter(&mut self, filter: Option<FilterTerm>);

    fn filter(&self) -> Option<&FilterTerm>;

    fn set_relation(&mut self, column: usize, relation: Relation) -> Result<(), StoreError>;

    fn relation(&self, column: usize) -> Option<&Relation>;

    /// `(id, display)` pairs an editor can offer for a related column. A
    /// column without a relation is an error.
    fn relation_choices(&self, column: usize) -> Result<Vec<(Value, Value)>, StoreError>;

    fn next_sequence_value(&mut self, sequence: &str) -> Result<Value, StoreError>;

    /// Text of the last failed operation, if any.
    fn last_error(&self) -> Option<&str>;
}

/// Opens stores over named tables of one database.
pub trait TableSource {
    type Store: RecordStore;

    fn open_table(&self, table: &str) -> Result<Self::Store, StoreError>;
}
