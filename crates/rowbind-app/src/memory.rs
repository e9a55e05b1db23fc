// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! In-process record store, used by tests and by hosts that keep their data
//! outside a database.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::{
    FilterTerm, Record, RecordStore, Relation, StoreError, TableSource, Value, values_equal,
};

#[derive(Debug)]
struct TableData {
    columns: Rc<[String]>,
    not_null: Vec<bool>,
    rows: Vec<(u64, Vec<Value>)>,
    next_rowid: u64,
}

impl TableData {
    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}

#[derive(Debug, Default)]
struct Catalog {
    tables: BTreeMap<String, TableData>,
    sequences: BTreeMap<String, i64>,
}

/// A set of named tables and sequences. Clones share the same data, so
/// every store opened from a database sees the others' committed writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    catalog: Rc<RefCell<Catalog>>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_table(&self, name: &str, columns: &[&str]) -> Result<(), StoreError> {
        let mut catalog = self.catalog.borrow_mut();
        if catalog.tables.contains_key(name) {
            return Err(StoreError::new(format!("table {name} already exists")));
        }
        if columns.is_empty() {
            return Err(StoreError::new(format!("table {name} has no columns")));
        }
        let columns: Rc<[String]> = columns.iter().map(|column| (*column).to_owned()).collect();
        catalog.tables.insert(
            name.to_owned(),
            TableData {
                not_null: vec![false; columns.len()],
                columns,
                rows: Vec::new(),
                next_rowid: 1,
            },
        );
        Ok(())
    }

    /// Rejects null values in `column` at submit time.
    pub fn require_not_null(&self, table: &str, column: &str) -> Result<(), StoreError> {
        let mut catalog = self.catalog.borrow_mut();
        let data = catalog
            .tables
            .get_mut(table)
            .ok_or_else(|| no_such_table(table))?;
        let index = data
            .column(column)
            .ok_or_else(|| StoreError::new(format!("no such column: {table}.{column}")))?;
        data.not_null[index] = true;
        Ok(())
    }

    /// Appends a committed row directly, bypassing any store buffer.
    pub fn insert(&self, table: &str, values: Vec<Value>) -> Result<(), StoreError> {
        let mut catalog = self.catalog.borrow_mut();
        let data = catalog
            .tables
            .get_mut(table)
            .ok_or_else(|| no_such_table(table))?;
        if values.len() != data.columns.len() {
            return Err(StoreError::new(format!(
                "table {table} has {} columns but {} values were supplied",
                data.columns.len(),
                values.len()
            )));
        }
        let rowid = data.next_rowid;
        data.next_rowid += 1;
        data.rows.push((rowid, values));
        Ok(())
    }

    /// Registers a sequence whose first `next` value is `start`.
    pub fn create_sequence(&self, name: &str, start: i64) {
        self.catalog
            .borrow_mut()
            .sequences
            .insert(name.to_owned(), start);
    }

    pub fn next_sequence_value(&self, name: &str) -> Result<i64, StoreError> {
        let mut catalog = self.catalog.borrow_mut();
        let next = catalog
            .sequences
            .get_mut(name)
            .ok_or_else(|| StoreError::new(format!("no such sequence: {name}")))?;
        let value = *next;
        *next += 1;
        Ok(value)
    }

    /// Committed rows of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Result<Vec<Record>, StoreError> {
        let catalog = self.catalog.borrow();
        let data = catalog.tables.get(table).ok_or_else(|| no_such_table(table))?;
        Ok(data
            .rows
            .iter()
            .map(|(_, values)| Record::new(Rc::clone(&data.columns), values.clone()))
            .collect())
    }

    fn columns(&self, table: &str) -> Result<Rc<[String]>, StoreError> {
        let catalog = self.catalog.borrow();
        catalog
            .tables
            .get(table)
            .map(|data| Rc::clone(&data.columns))
            .ok_or_else(|| no_such_table(table))
    }

    fn lookup(&self, relation: &Relation, id: &Value) -> Option<Value> {
        let catalog = self.catalog.borrow();
        let data = catalog.tables.get(&relation.table)?;
        let id_column = data.column(&relation.id_field)?;
        let display_column = data.column(&relation.display_field)?;
        data.rows
            .iter()
            .find(|(_, values)| values.get(id_column).is_some_and(|key| values_equal(key, id)))
            .and_then(|(_, values)| values.get(display_column).cloned())
    }
}

impl TableSource for MemoryDatabase {
    type Store = MemoryStore;

    fn open_table(&self, table: &str) -> Result<MemoryStore, StoreError> {
        MemoryStore::open(self.clone(), table)
    }
}

fn no_such_table(table: &str) -> StoreError {
    StoreError::new(format!("no such table: {table}"))
}

#[derive(Debug, Clone)]
struct BufferedRow {
    rowid: Option<u64>,
    values: Vec<Value>,
    dirty: bool,
}

/// Manual-submit store over one table of a [`MemoryDatabase`].
#[derive(Debug)]
pub struct MemoryStore {
    database: MemoryDatabase,
    table: String,
    columns: Rc<[String]>,
    rows: Vec<BufferedRow>,
    removed: Vec<u64>,
    filter: Option<FilterTerm>,
    relations: BTreeMap<usize, Relation>,
    last_error: Option<String>,
}

impl MemoryStore {
    pub fn open(database: MemoryDatabase, table: &str) -> Result<Self, StoreError> {
        let columns = database.columns(table)?;
        let mut store = Self {
            database,
            table: table.to_owned(),
            columns,
            rows: Vec::new(),
            removed: Vec::new(),
            filter: None,
            relations: BTreeMap::new(),
            last_error: None,
        };
        store.load();
        Ok(store)
    }

    fn load(&mut self) {
        let catalog = self.database.catalog.borrow();
        let rows = catalog
            .tables
            .get(&self.table)
            .map(|data| {
                data.rows
                    .iter()
                    .map(|(rowid, values)| BufferedRow {
                        rowid: Some(*rowid),
                        values: values.clone(),
                        dirty: false,
                    })
                    .filter(|row| {
                        self.filter.as_ref().is_none_or(|term| {
                            term.matches(&Record::new(Rc::clone(&self.columns), row.values.clone()))
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        drop(catalog);
        self.rows = rows;
        self.removed.clear();
    }

    fn fail(&mut self, error: StoreError) -> StoreError {
        self.last_error = Some(error.message().to_owned());
        error
    }

    fn check_not_null(&self) -> Result<(), StoreError> {
        let catalog = self.database.catalog.borrow();
        let data = catalog
            .tables
            .get(&self.table)
            .ok_or_else(|| no_such_table(&self.table))?;
        for row in self.rows.iter().filter(|row| row.dirty) {
            for (index, value) in row.values.iter().enumerate() {
                if data.not_null[index] && value.is_null() {
                    return Err(StoreError::new(format!(
                        "NOT NULL constraint failed: {}.{}",
                        self.table, data.columns[index]
                    )));
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.check_not_null()?;
        let mut catalog = self.database.catalog.borrow_mut();
        let data = catalog
            .tables
            .get_mut(&self.table)
            .ok_or_else(|| no_such_table(&self.table))?;
        data.rows.retain(|(rowid, _)| !self.removed.contains(rowid));
        for row in self.rows.iter().filter(|row| row.dirty) {
            match row.rowid {
                Some(rowid) => {
                    if let Some((_, values)) =
                        data.rows.iter_mut().find(|(candidate, _)| *candidate == rowid)
                    {
                        values.clone_from(&row.values);
                    }
                }
                None => {
                    let rowid = data.next_rowid;
                    data.next_rowid += 1;
                    data.rows.push((rowid, row.values.clone()));
                }
            }
        }
        Ok(())
    }

    fn check_row(&self, row: usize) -> Result<(), StoreError> {
        if row < self.rows.len() {
            Ok(())
        } else {
            Err(StoreError::new(format!(
                "row {row} is out of range for {} ({} rows)",
                self.table,
                self.rows.len()
            )))
        }
    }
}

impl RecordStore for MemoryStore {
    fn table_name(&self) -> &str {
        &self.table
    }

    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name_at(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn row_at(&self, row: usize) -> Option<Record> {
        self.rows
            .get(row)
            .map(|buffered| Record::new(Rc::clone(&self.columns), buffered.values.clone()))
    }

    fn value_at(&self, row: usize, column: usize) -> Option<Value> {
        self.rows
            .get(row)
            .and_then(|buffered| buffered.values.get(column))
            .cloned()
    }

    fn display_value_at(&self, row: usize, column: usize) -> Option<Value> {
        let value = self.value_at(row, column)?;
        match self.relations.get(&column) {
            Some(relation) if !value.is_null() => {
                Some(self.database.lookup(relation, &value).unwrap_or_default())
            }
            _ => Some(value),
        }
    }

    fn insert_row(&mut self, row: usize) -> Result<(), StoreError> {
        if row > self.rows.len() {
            let error = StoreError::new(format!("cannot insert at row {row}"));
            return Err(self.fail(error));
        }
        self.rows.insert(
            row,
            BufferedRow {
                rowid: None,
                values: vec![Value::Null; self.columns.len()],
                dirty: true,
            },
        );
        Ok(())
    }

    fn remove_row(&mut self, row: usize) -> Result<(), StoreError> {
        if let Err(error) = self.check_row(row) {
            return Err(self.fail(error));
        }
        let removed = self.rows.remove(row);
        if let Some(rowid) = removed.rowid {
            self.removed.push(rowid);
        }
        Ok(())
    }

    fn set_cell_value(
        &mut self,
        row: usize,
        column: usize,
        value: Value,
    ) -> Result<(), StoreError> {
        if let Err(error) = self.check_row(row) {
            return Err(self.fail(error));
        }
        if column >= self.columns.len() {
            let error = StoreError::new(format!("no column {column} in {}", self.table));
            return Err(self.fail(error));
        }
        let buffered = &mut self.rows[row];
        buffered.values[column] = value;
        buffered.dirty = true;
        Ok(())
    }

    fn select(&mut self) -> Result<(), StoreError> {
        self.load();
        self.last_error = None;
        Ok(())
    }

    fn submit_all(&mut self) -> Result<(), StoreError> {
        match self.commit() {
            Ok(()) => self.select(),
            Err(error) => Err(self.fail(error)),
        }
    }

    fn revert_all(&mut self) {
        self.load();
    }

    fn has_pending_changes(&self) -> bool {
        !self.removed.is_empty() || self.rows.iter().any(|row| row.dirty)
    }

    fn set_filter(&mut self, filter: Option<FilterTerm>) {
        self.filter = filter;
    }

    fn filter(&self) -> Option<&FilterTerm> {
        self.filter.as_ref()
    }

    fn set_relation(&mut self, column: usize, relation: Relation) -> Result<(), StoreError> {
        if column >= self.columns.len() {
            let error = StoreError::new(format!("no column {column} in {}", self.table));
            return Err(self.fail(error));
        }
        let related = self.database.columns(&relation.table)?;
        for field in [&relation.id_field, &relation.display_field] {
            if !related.contains(field) {
                let error =
                    StoreError::new(format!("no such column: {}.{field}", relation.table));
                return Err(self.fail(error));
            }
        }
        self.relations.insert(column, relation);
        Ok(())
    }

    fn relation(&self, column: usize) -> Option<&Relation> {
        self.relations.get(&column)
    }

    fn relation_choices(&self, column: usize) -> Result<Vec<(Value, Value)>, StoreError> {
        let relation = self
            .relations
            .get(&column)
            .ok_or_else(|| StoreError::new(format!("no relation on column {column}")))?;
        let rows = self.database.rows(&relation.table)?;
        Ok(rows
            .iter()
            .map(|record| {
                (
                    record.value(&relation.id_field).clone(),
                    record.value(&relation.display_field).clone(),
                )
            })
            .collect())
    }

    fn next_sequence_value(&mut self, sequence: &str) -> Result<Value, StoreError> {
        match self.database.next_sequence_value(sequence) {
            Ok(value) => Ok(Value::Integer(value)),
            Err(error) => Err(self.fail(error)),
        }
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
