// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::ser::{Serialize, SerializeMap, Serializer};
use std::rc::Rc;

use crate::Value;

static NULL_VALUE: Value = Value::Null;

/// Snapshot of one row: field names in column order plus their values.
///
/// A record is detached from its store. It goes stale on the next store
/// mutation and should be re-read by row index rather than kept around.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    names: Rc<[String]>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(names: Rc<[String]>, values: Vec<Value>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self { names, values }
    }

    /// A record with every field null, as produced by inserting a blank row.
    pub fn empty(names: Rc<[String]>) -> Self {
        let values = vec![Value::Null; names.len()];
        Self { names, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn field_name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }

    /// Value of the named field, or null when the field does not exist.
    pub fn value(&self, name: &str) -> &Value {
        self.index_of(name)
            .and_then(|index| self.values.get(index))
            .unwrap_or(&NULL_VALUE)
    }

    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn set_value_at(&mut self, index: usize, value: Value) -> bool {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
