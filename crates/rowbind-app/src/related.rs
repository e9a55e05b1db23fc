// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;
use std::ops::{Deref, DerefMut};

use tracing::debug;

use crate::{
    BindError, BindResult, CellData, CellRole, EditableModel, FilterTerm, ItemFlags, ModelEvent,
    Orientation, Record, RecordModel, RecordStore, Signal, TableModel, Value,
};

/// Parent key a detail model filters on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelatedId {
    Integer(i64),
    Text(String),
}

impl RelatedId {
    pub fn to_value(&self) -> Value {
        match self {
            Self::Integer(id) => Value::Integer(*id),
            Self::Text(id) => Value::Text(id.clone()),
        }
    }

    /// Integer and text values convert; null and real values do not.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Integer(id) => Some(Self::Integer(*id)),
            Value::Text(id) => Some(Self::Text(id.clone())),
            Value::Null | Value::Real(_) => None,
        }
    }
}

impl fmt::Display for RelatedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(id) => write!(f, "{id}"),
            Self::Text(id) => f.write_str(id),
        }
    }
}

impl From<i64> for RelatedId {
    fn from(id: i64) -> Self {
        Self::Integer(id)
    }
}

impl From<&str> for RelatedId {
    fn from(id: &str) -> Self {
        Self::Text(id.to_owned())
    }
}

impl From<String> for RelatedId {
    fn from(id: String) -> Self {
        Self::Text(id)
    }
}

/// A [`RecordModel`] whose rows are narrowed to one parent key.
///
/// Until a parent id is set the model shows the whole table.
pub struct RelatedRecordModel<S: RecordStore> {
    model: RecordModel<S>,
    related_id_field: String,
    related_id: Option<RelatedId>,
}

impl<S: RecordStore> RelatedRecordModel<S> {
    pub fn new(model: RecordModel<S>, related_id_field: impl Into<String>) -> BindResult<Self> {
        let related_id_field = related_id_field.into();
        if model.field(&related_id_field).is_none() {
            return Err(BindError::Configuration(format!(
                "related id field {related_id_field} does not exist in table {}",
                model.table_name()
            )));
        }
        Ok(Self {
            model,
            related_id_field,
            related_id: None,
        })
    }

    pub fn related_id_field(&self) -> &str {
        &self.related_id_field
    }

    pub fn related_id(&self) -> Option<&RelatedId> {
        self.related_id.as_ref()
    }

    /// Narrows the store filter to `related_id_field == id`. The row set
    /// changes on the next `select()`, not here.
    #[tracing::instrument(skip(self), fields(table = %self.model.table_name()))]
    pub fn set_related_id(&mut self, id: impl Into<RelatedId> + fmt::Debug) {
        let id = id.into();
        let term = FilterTerm::equals(self.related_id_field.clone(), id.to_value());
        debug!(filter = %term, "related filter set");
        self.model.set_filter(Some(term));
        self.related_id = Some(id);
    }

    /// Detaches from any parent: the next `select()` yields no rows.
    pub fn clear_related_id(&mut self) {
        self.model.set_filter(Some(FilterTerm::equals(
            self.related_id_field.clone(),
            Value::Null,
        )));
        self.related_id = None;
    }

    /// Adds a row whose related id field is preset to the current parent.
    pub fn add_related_record(&mut self, values: &[(&str, Value)]) -> BindResult<(Record, usize)> {
        let mut with_parent = Vec::with_capacity(values.len() + 1);
        if let Some(id) = &self.related_id
            && !values.iter().any(|(name, _)| *name == self.related_id_field)
        {
            with_parent.push((self.related_id_field.as_str(), id.to_value()));
        }
        with_parent.extend(values.iter().cloned());
        self.model.add_record(&with_parent)
    }

    pub fn into_inner(self) -> RecordModel<S> {
        self.model
    }
}

impl<S: RecordStore> Deref for RelatedRecordModel<S> {
    type Target = RecordModel<S>;

    fn deref(&self) -> &RecordModel<S> {
        &self.model
    }
}

impl<S: RecordStore> DerefMut for RelatedRecordModel<S> {
    fn deref_mut(&mut self) -> &mut RecordModel<S> {
        &mut self.model
    }
}

impl<S: RecordStore> TableModel for RelatedRecordModel<S> {
    fn row_count(&self) -> usize {
        self.model.row_count()
    }

    fn column_count(&self) -> usize {
        self.model.column_count()
    }

    fn column_name(&self, column: usize) -> Option<String> {
        self.model.column_name(column)
    }

    fn record(&self, row: usize) -> Option<Record> {
        self.model.record(row)
    }

    fn data(&self, row: usize, column: usize, role: CellRole) -> CellData {
        self.model.data(row, column, role)
    }

    fn flags(&self, row: usize, column: usize) -> ItemFlags {
        TableModel::flags(&self.model, row, column)
    }

    fn header_data(&self, section: usize, orientation: Orientation, role: CellRole) -> CellData {
        self.model.header_data(section, orientation, role)
    }

    fn events(&self) -> &Signal<ModelEvent> {
        self.model.events()
    }
}

impl<S: RecordStore> EditableModel for RelatedRecordModel<S> {
    type Store = S;

    fn base(&self) -> &RecordModel<S> {
        &self.model
    }

    fn base_mut(&mut self) -> &mut RecordModel<S> {
        &mut self.model
    }

    fn add_record(&mut self, values: &[(&str, Value)]) -> BindResult<(Record, usize)> {
        self.add_related_record(values)
    }

    fn follow_parent(&mut self, parent_id: &Value) -> BindResult<bool> {
        match RelatedId::from_value(parent_id) {
            Some(id) => self.set_related_id(id),
            None => self.clear_related_id(),
        }
        self.model.select()?;
        Ok(true)
    }
}

impl<S: RecordStore> fmt::Debug for RelatedRecordModel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelatedRecordModel")
            .field("model", &self.model)
            .field("related_id_field", &self.related_id_field)
            .field("related_id", &self.related_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{RelatedId, RelatedRecordModel};
    use crate::{
        BindError, EditableModel, MemoryDatabase, MemoryStore, ModelConfig, RecordModel,
        TableModel, Value,
    };

    fn lines() -> anyhow::Result<RelatedRecordModel<MemoryStore>> {
        let db = MemoryDatabase::new();
        db.create_table("order_lines", &["id", "order_id", "item", "sku"])?;
        let rows = [
            (1, 42, "bolt", "a1"),
            (2, 42, "nut", "abc"),
            (3, 7, "washer", "abc"),
            (4, 420, "gear", "x9"),
        ];
        for (id, order, item, sku) in rows {
            db.insert(
                "order_lines",
                vec![
                    Value::Integer(id),
                    Value::Integer(order),
                    Value::from(item),
                    Value::from(sku),
                ],
            )?;
        }
        db.create_sequence("order_lines_id_seq", 100);
        let model = RecordModel::open(
            &db,
            ModelConfig::new("order_lines").with_sequence("order_lines_id_seq"),
        )?;
        Ok(RelatedRecordModel::new(model, "order_id")?)
    }

    fn column(model: &RelatedRecordModel<MemoryStore>, name: &str) -> Vec<Value> {
        (0..model.row_count())
            .filter_map(|row| model.record(row))
            .map(|record| record.value(name).clone())
            .collect()
    }

    #[test]
    fn set_related_id_requires_select_to_take_effect() -> anyhow::Result<()> {
        let mut model = lines()?;
        assert_eq!(model.row_count(), 4);

        model.set_related_id(42);
        assert_eq!(model.row_count(), 4);
        assert_eq!(model.related_id(), Some(&RelatedId::Integer(42)));

        model.select()?;
        assert_eq!(column(&model, "order_id"), vec![Value::Integer(42); 2]);
        Ok(())
    }

    #[test]
    fn text_ids_become_quoted_filter_terms() -> anyhow::Result<()> {
        let db = lines()?.into_inner();
        let mut model = RelatedRecordModel::new(db, "sku")?;
        model.set_related_id("abc");
        assert_eq!(
            model.filter().map(ToString::to_string).as_deref(),
            Some("\"sku\" = 'abc'")
        );
        model.select()?;
        assert_eq!(
            column(&model, "item"),
            vec![Value::from("nut"), Value::from("washer")]
        );
        Ok(())
    }

    #[test]
    fn follow_parent_refilters_and_selects() -> anyhow::Result<()> {
        let mut model = lines()?;
        assert!(model.follow_parent(&Value::Integer(7))?);
        assert_eq!(column(&model, "item"), vec![Value::from("washer")]);

        assert!(model.follow_parent(&Value::Null)?);
        assert_eq!(model.row_count(), 0);
        assert_eq!(model.related_id(), None);
        Ok(())
    }

    #[test]
    fn related_records_inherit_the_parent_id() -> anyhow::Result<()> {
        let mut model = lines()?;
        model.set_related_id(42);
        model.select()?;
        let (record, _) = model.add_related_record(&[("item", Value::from("spring"))])?;
        assert_eq!(record.value("order_id"), &Value::Integer(42));
        assert_eq!(record.value("id"), &Value::Integer(100));
        Ok(())
    }

    #[test]
    fn unknown_related_field_is_rejected() -> anyhow::Result<()> {
        let model = lines()?.into_inner();
        assert!(matches!(
            RelatedRecordModel::new(model, "parent_id"),
            Err(BindError::Configuration(_))
        ));
        Ok(())
    }
}
