// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::Deserialize;
use tracing::debug;

use crate::{
    BindError, BindResult, CellData, CellRole, Field, FilterTerm, ItemFlags, Orientation, Record,
    RecordStore, Relation, Signal, TableSource, Value,
};

const DEFAULT_ID_FIELD: &str = "id";

/// Setup for a [`RecordModel`]. Deserializable so hosts can declare models
/// in their configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelConfig {
    pub table: String,
    #[serde(default = "default_auto_populate_id")]
    pub auto_populate_id: bool,
    #[serde(default = "default_id_field_name")]
    pub id_field_name: String,
    #[serde(default)]
    pub id_sequence_name: Option<String>,
    #[serde(default)]
    pub vertical_header: bool,
    #[serde(default)]
    pub vertical_header_field: Option<String>,
}

const fn default_auto_populate_id() -> bool {
    true
}

fn default_id_field_name() -> String {
    DEFAULT_ID_FIELD.to_owned()
}

impl ModelConfig {
    /// Auto-populated ids are on by default, so a sequence must be supplied
    /// with [`ModelConfig::with_sequence`] or ids turned off.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            auto_populate_id: true,
            id_field_name: default_id_field_name(),
            id_sequence_name: None,
            vertical_header: false,
            vertical_header_field: None,
        }
    }

    pub fn with_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.id_sequence_name = Some(sequence.into());
        self
    }

    pub fn without_auto_id(mut self) -> Self {
        self.auto_populate_id = false;
        self
    }

    pub fn with_id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field_name = name.into();
        self
    }

    pub fn with_vertical_header(mut self, field: Option<&str>) -> Self {
        self.vertical_header = true;
        self.vertical_header_field = field.map(str::to_owned);
        self
    }

    /// Checks that need no store. Blank names count as missing.
    pub fn check(&self) -> BindResult<()> {
        if !self.auto_populate_id {
            return Ok(());
        }
        if self
            .id_sequence_name
            .as_deref()
            .is_none_or(|name| name.trim().is_empty())
        {
            return Err(BindError::Configuration(
                "id_sequence_name must be provided if auto_populate_id is set".to_owned(),
            ));
        }
        if self.id_field_name.trim().is_empty() {
            return Err(BindError::Configuration(
                "id_field_name must be provided if auto_populate_id is set".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Change notifications published by every [`TableModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelEvent {
    /// The row set was replaced wholesale; any row index may have moved.
    Reset,
    RowsInserted { first: usize, last: usize },
    RowsRemoved { first: usize, last: usize },
    DataChanged { row: usize, column: usize },
}

/// Read side of a tabular model, as seen by proxies and rendering surfaces.
pub trait TableModel {
    fn row_count(&self) -> usize;

    fn column_count(&self) -> usize;

    fn column_name(&self, column: usize) -> Option<String>;

    fn column_of(&self, name: &str) -> Option<usize> {
        (0..self.column_count()).find(|column| self.column_name(*column).as_deref() == Some(name))
    }

    fn record(&self, row: usize) -> Option<Record>;

    fn data(&self, row: usize, column: usize, role: CellRole) -> CellData;

    fn flags(&self, row: usize, column: usize) -> ItemFlags;

    fn header_data(&self, section: usize, orientation: Orientation, role: CellRole) -> CellData;

    fn events(&self) -> &Signal<ModelEvent>;

    /// Whether queries can be answered right now. Views over a source that
    /// is mid-mutation report `false`.
    fn is_ready(&self) -> bool {
        true
    }
}

/// A store-backed model that views can write through.
pub trait EditableModel: TableModel {
    type Store: RecordStore;

    fn base(&self) -> &RecordModel<Self::Store>;

    fn base_mut(&mut self) -> &mut RecordModel<Self::Store>;

    /// Creates a row the way this model's views expect new rows to look.
    fn add_record(&mut self, values: &[(&str, Value)]) -> BindResult<(Record, usize)> {
        self.base_mut().add_record(values)
    }

    /// Master-detail hook run when a parent view's current row changes.
    /// Returns whether the model re-filtered; plain models ignore parents.
    fn follow_parent(&mut self, _parent_id: &Value) -> BindResult<bool> {
        Ok(false)
    }
}

/// Binds the rows of one store table to per-column [`Field`] policies.
pub struct RecordModel<S: RecordStore> {
    store: S,
    config: ModelConfig,
    fields: Vec<Field>,
    id_column: Option<usize>,
    events: Signal<ModelEvent>,
}

impl<S: RecordStore> RecordModel<S> {
    pub fn open<T>(source: &T, config: ModelConfig) -> BindResult<Self>
    where
        T: TableSource<Store = S>,
    {
        config.check()?;
        let store = source.open_table(&config.table)?;
        Self::from_store(store, config)
    }

    /// Derives one plain [`Field`] per store column, in column order.
    pub fn from_store(store: S, config: ModelConfig) -> BindResult<Self> {
        config.check()?;
        let id_column = store.index_of(&config.id_field_name);
        if config.auto_populate_id && id_column.is_none() {
            return Err(BindError::Configuration(format!(
                "id field {} does not exist in table {}",
                config.id_field_name, config.table
            )));
        }
        if let Some(field) = &config.vertical_header_field
            && store.index_of(field).is_none()
        {
            return Err(BindError::Configuration(format!(
                "vertical header field {field} does not exist in table {}",
                config.table
            )));
        }

        let fields = (0..store.column_count())
            .map(|index| Field::new(store.field_name_at(index).unwrap_or_default(), index))
            .collect();
        Ok(Self {
            store,
            config,
            fields,
            id_column,
            events: Signal::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn table_name(&self) -> &str {
        &self.config.table
    }

    pub fn id_field_name(&self) -> &str {
        &self.config.id_field_name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name() == name)
    }

    /// Mutable access for display overrides; name and index stay fixed.
    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|field| field.name() == name)
    }

    pub fn field_at(&self, column: usize) -> Option<&Field> {
        self.fields.get(column)
    }

    pub fn field_index(&self, name: &str) -> BindResult<usize> {
        self.field(name)
            .map(Field::index)
            .ok_or_else(|| BindError::FieldNotFound(name.to_owned()))
    }

    /// Swaps in `field` at its own index.
    pub fn replace_field(&mut self, field: Field) -> BindResult<()> {
        let Some(slot) = self.fields.get_mut(field.index()) else {
            return Err(BindError::Configuration(format!(
                "field {} has index {} but {} has {} columns",
                field.name(),
                field.index(),
                self.config.table,
                self.fields.len()
            )));
        };
        if slot.name() != field.name() {
            return Err(BindError::Configuration(format!(
                "field {} cannot replace column {} ({})",
                field.name(),
                field.index(),
                slot.name()
            )));
        }
        *slot = field;
        Ok(())
    }

    /// Shows `column` through `table.display_field`, keyed by `table.id_field`.
    pub fn set_relation(
        &mut self,
        column: usize,
        table: &str,
        id_field: &str,
        display_field: &str,
    ) -> BindResult<()> {
        self.store
            .set_relation(column, Relation::new(table, id_field, display_field))?;
        Ok(())
    }

    pub fn relation_choices(&self, column: usize) -> BindResult<Vec<(Value, Value)>> {
        Ok(self.store.relation_choices(column)?)
    }

    /// Appends a row: sequence id first, then auto-populated fields, then
    /// the caller's values. Not transactional; a failed write leaves the
    /// partial row in the buffer until the next select or submit.
    #[tracing::instrument(skip(self, values), fields(table = %self.config.table))]
    pub fn add_record(&mut self, values: &[(&str, Value)]) -> BindResult<(Record, usize)> {
        let columns = values
            .iter()
            .map(|(name, value)| Ok((self.field_index(name)?, value.clone())))
            .collect::<BindResult<Vec<_>>>()?;

        let row = self.store.row_count();
        self.store.insert_row(row)?;
        let populated = self.populate_new_row(row, columns);
        self.events.emit(&ModelEvent::RowsInserted {
            first: row,
            last: row,
        });
        populated?;

        let record = self
            .store
            .row_at(row)
            .ok_or_else(|| BindError::Configuration(format!("row {row} vanished after insert")))?;
        debug!(row, "record added");
        Ok((record, row))
    }

    fn populate_new_row(&mut self, row: usize, caller: Vec<(usize, Value)>) -> BindResult<()> {
        if self.config.auto_populate_id
            && let (Some(sequence), Some(id_column)) =
                (self.config.id_sequence_name.as_deref(), self.id_column)
        {
            let id = self.store.next_sequence_value(sequence)?;
            self.store.set_cell_value(row, id_column, id)?;
        }

        for index in 0..self.fields.len() {
            let Some(rule) = self.fields[index].auto_populate.clone() else {
                continue;
            };
            let in_progress = self
                .store
                .row_at(row)
                .ok_or_else(|| BindError::Configuration(format!("row {row} does not exist")))?;
            let value = rule(&in_progress);
            self.store.set_cell_value(row, index, value)?;
        }

        for (column, value) in caller {
            self.store.set_cell_value(row, column, value)?;
        }
        Ok(())
    }

    pub fn set_row_values(&mut self, row: usize, values: &[(&str, Value)]) -> BindResult<()> {
        for (name, value) in values {
            let column = self.field_index(name)?;
            self.set_value(row, column, value.clone())?;
        }
        Ok(())
    }

    pub fn set_value(&mut self, row: usize, column: usize, value: Value) -> BindResult<()> {
        self.store.set_cell_value(row, column, value)?;
        self.events.emit(&ModelEvent::DataChanged { row, column });
        Ok(())
    }

    pub fn remove_row(&mut self, row: usize) -> BindResult<()> {
        self.store.remove_row(row)?;
        debug!(table = %self.config.table, row, "row removed");
        self.events.emit(&ModelEvent::RowsRemoved {
            first: row,
            last: row,
        });
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(table = %self.config.table))]
    pub fn select(&mut self) -> BindResult<()> {
        let result = self.store.select();
        self.events.emit(&ModelEvent::Reset);
        result?;
        debug!(rows = self.store.row_count(), "selected");
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(table = %self.config.table))]
    pub fn submit_all(&mut self) -> BindResult<()> {
        self.store.submit_all()?;
        self.events.emit(&ModelEvent::Reset);
        Ok(())
    }

    pub fn revert_all(&mut self) {
        self.store.revert_all();
        self.events.emit(&ModelEvent::Reset);
    }

    pub fn has_pending_changes(&self) -> bool {
        self.store.has_pending_changes()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.store.last_error()
    }

    /// Store-level filter; applied by the next [`RecordModel::select`].
    pub fn set_filter(&mut self, filter: Option<FilterTerm>) {
        self.store.set_filter(filter);
    }

    pub fn filter(&self) -> Option<&FilterTerm> {
        self.store.filter()
    }

    pub fn id_at(&self, row: usize) -> Option<Value> {
        self.id_column
            .and_then(|column| self.store.value_at(row, column))
    }

    pub fn row_of_id(&self, id: &Value) -> Option<usize> {
        let column = self.id_column?;
        (0..self.store.row_count())
            .find(|row| self.store.value_at(*row, column).as_ref() == Some(id))
    }
}

impl<S: RecordStore> TableModel for RecordModel<S> {
    fn row_count(&self) -> usize {
        self.store.row_count()
    }

    fn column_count(&self) -> usize {
        self.fields.len()
    }

    fn column_name(&self, column: usize) -> Option<String> {
        self.fields.get(column).map(|field| field.name().to_owned())
    }

    fn record(&self, row: usize) -> Option<Record> {
        self.store.row_at(row)
    }

    fn data(&self, row: usize, column: usize, role: CellRole) -> CellData {
        let (Some(field), Some(record)) = (self.fields.get(column), self.store.row_at(row)) else {
            return CellData::None;
        };
        let raw = record.value_at(column).cloned().unwrap_or_default();
        match role {
            CellRole::Display => {
                let shown = self.store.display_value_at(row, column).unwrap_or_default();
                field.display(&shown, &record).into()
            }
            CellRole::Foreground => field.text_color(&raw, &record).into(),
            CellRole::Background => field.background_color(&raw, &record).into(),
            CellRole::Decoration => field.decoration(&raw, &record).into(),
            CellRole::Edit => CellData::Value(raw),
            CellRole::ToolTip => CellData::None,
        }
    }

    fn flags(&self, row: usize, column: usize) -> ItemFlags {
        let (Some(field), Some(record)) = (self.fields.get(column), self.store.row_at(row)) else {
            return ItemFlags::default();
        };
        let value = record.value_at(column).cloned().unwrap_or_default();
        field.flags(&value, &record)
    }

    fn header_data(&self, section: usize, orientation: Orientation, role: CellRole) -> CellData {
        match orientation {
            Orientation::Horizontal => {
                let Some(field) = self.fields.get(section) else {
                    return CellData::None;
                };
                match role {
                    CellRole::Display => CellData::Value(Value::from(field.header.as_str())),
                    CellRole::Decoration => field.header_icon.clone().into(),
                    _ => CellData::None,
                }
            }
            Orientation::Vertical => {
                if !self.config.vertical_header
                    || role != CellRole::Display
                    || section >= self.store.row_count()
                {
                    return CellData::None;
                }
                match &self.config.vertical_header_field {
                    Some(name) => self
                        .store
                        .index_of(name)
                        .and_then(|column| self.store.display_value_at(section, column))
                        .into(),
                    None => CellData::Value(Value::from(section as i64 + 1)),
                }
            }
        }
    }

    fn events(&self) -> &Signal<ModelEvent> {
        &self.events
    }
}

impl<S: RecordStore> EditableModel for RecordModel<S> {
    type Store = S;

    fn base(&self) -> &RecordModel<S> {
        self
    }

    fn base_mut(&mut self) -> &mut RecordModel<S> {
        self
    }
}

impl<S: RecordStore> std::fmt::Debug for RecordModel<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordModel")
            .field("table", &self.config.table)
            .field("fields", &self.fields)
            .field("rows", &self.store.row_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{ModelConfig, ModelEvent, RecordModel, TableModel};
    use crate::{
        BindError, CellData, CellRole, Color, Field, Icon, ItemFlags, MemoryDatabase, MemoryStore,
        Orientation, Value,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn orders() -> anyhow::Result<MemoryDatabase> {
        let db = MemoryDatabase::new();
        db.create_table("customers", &["id", "name"])?;
        db.create_table("orders", &["id", "name", "active", "customer_id"])?;
        db.insert("customers", vec![Value::Integer(5), Value::from("Acme")])?;
        db.insert(
            "orders",
            vec![
                Value::Integer(1),
                Value::from("bolts"),
                Value::Integer(1),
                Value::Integer(5),
            ],
        )?;
        db.create_sequence("orders_id_seq", 7);
        Ok(db)
    }

    fn model(db: &MemoryDatabase) -> anyhow::Result<RecordModel<MemoryStore>> {
        Ok(RecordModel::open(
            db,
            ModelConfig::new("orders").with_sequence("orders_id_seq"),
        )?)
    }

    #[test]
    fn missing_sequence_is_a_configuration_error() -> anyhow::Result<()> {
        let db = orders()?;
        let error = RecordModel::open(&db, ModelConfig::new("orders")).expect_err("no sequence");
        assert!(matches!(error, BindError::Configuration(_)));

        let plain = RecordModel::open(&db, ModelConfig::new("orders").without_auto_id())?;
        assert_eq!(plain.column_count(), 4);
        Ok(())
    }

    #[test]
    fn blank_sequence_or_id_field_counts_as_missing() -> anyhow::Result<()> {
        let db = orders()?;
        for sequence in ["", "   "] {
            let error = RecordModel::open(&db, ModelConfig::new("orders").with_sequence(sequence))
                .expect_err("blank sequence");
            assert!(matches!(error, BindError::Configuration(_)));
        }
        let config = ModelConfig::new("orders")
            .with_sequence("orders_id_seq")
            .with_id_field(" ");
        assert!(matches!(
            RecordModel::open(&db, config),
            Err(BindError::Configuration(message)) if message.contains("id_field_name")
        ));

        let plain = ModelConfig::new("orders").with_sequence("").without_auto_id();
        assert!(plain.check().is_ok());
        Ok(())
    }

    #[test]
    fn missing_id_field_is_a_configuration_error() -> anyhow::Result<()> {
        let db = orders()?;
        let config = ModelConfig::new("orders")
            .with_sequence("orders_id_seq")
            .with_id_field("order_id");
        assert!(matches!(
            RecordModel::open(&db, config),
            Err(BindError::Configuration(_))
        ));
        Ok(())
    }

    #[test]
    fn fields_follow_store_columns() -> anyhow::Result<()> {
        let db = orders()?;
        let model = model(&db)?;
        assert_eq!(model.fields().len(), model.column_count());
        for (index, field) in model.fields().iter().enumerate() {
            assert_eq!(field.index(), index);
        }
        assert_eq!(
            model.field("customer_id").map(|field| field.header.as_str()),
            Some("Customer Id")
        );
        Ok(())
    }

    #[test]
    fn add_record_writes_sequence_then_auto_then_caller() -> anyhow::Result<()> {
        let db = orders()?;
        let mut model = model(&db)?;
        if let Some(field) = model.field_mut("active") {
            field.auto_populate = Some(Rc::new(|_| Value::Integer(1)));
        }
        if let Some(field) = model.field_mut("name") {
            field.auto_populate = Some(Rc::new(|record| {
                Value::from(format!("order {}", record.value("id")))
            }));
        }

        let (record, row) = model.add_record(&[])?;
        assert_eq!(row, 1);
        assert_eq!(record.value("id"), &Value::Integer(7));
        assert_eq!(record.value("name"), &Value::from("order 7"));
        assert_eq!(record.value("active"), &Value::Integer(1));

        let (record, _) = model.add_record(&[("name", Value::from("custom"))])?;
        assert_eq!(record.value("id"), &Value::Integer(8));
        assert_eq!(record.value("name"), &Value::from("custom"));
        Ok(())
    }

    #[test]
    fn add_record_rejects_unknown_fields_before_inserting() -> anyhow::Result<()> {
        let db = orders()?;
        let mut model = model(&db)?;
        let error = model
            .add_record(&[("colour", Value::from("red"))])
            .expect_err("unknown field");
        assert_eq!(error, BindError::FieldNotFound("colour".to_owned()));
        assert_eq!(model.row_count(), 1);
        Ok(())
    }

    #[test]
    fn add_record_emits_rows_inserted() -> anyhow::Result<()> {
        let db = orders()?;
        let mut model = model(&db)?;
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        model
            .events()
            .connect(move |event| sink.borrow_mut().push(*event));
        model.add_record(&[("name", Value::from("x"))])?;
        assert_eq!(
            *seen.borrow(),
            vec![ModelEvent::RowsInserted { first: 1, last: 1 }]
        );
        Ok(())
    }

    #[test]
    fn roles_dispatch_to_the_field() -> anyhow::Result<()> {
        let db = orders()?;
        let mut model = model(&db)?;
        let active = Field::boolean_icon(model.field_at(2).expect("active column"));
        model.replace_field(active)?;

        assert_eq!(model.data(0, 1, CellRole::Display).display_text(), "bolts");
        assert_eq!(model.data(0, 2, CellRole::Display), CellData::None);
        assert_eq!(
            model.data(0, 2, CellRole::Decoration),
            CellData::Icon(Icon::new(":record/tick"))
        );
        assert_eq!(
            model.data(0, 2, CellRole::Edit),
            CellData::Value(Value::Integer(1))
        );
        assert_eq!(model.data(0, 1, CellRole::Foreground), CellData::None);
        assert_eq!(model.data(0, 1, CellRole::ToolTip), CellData::None);
        assert_eq!(model.flags(0, 1), ItemFlags::editable());
        assert_eq!(model.data(9, 1, CellRole::Display), CellData::None);
        Ok(())
    }

    #[test]
    fn replace_field_keeps_indexes_aligned() -> anyhow::Result<()> {
        let db = orders()?;
        let mut model = model(&db)?;
        let wrong = Field::new("name", 2);
        assert!(matches!(
            model.replace_field(wrong),
            Err(BindError::Configuration(_))
        ));
        assert!(model.replace_field(Field::new("ghost", 9)).is_err());
        model.replace_field(Field::new("name", 1).with_header("Order"))?;
        assert_eq!(model.fields()[1].header, "Order");
        Ok(())
    }

    #[test]
    fn relation_display_resolves_through_store() -> anyhow::Result<()> {
        let db = orders()?;
        let mut model = model(&db)?;
        model.set_relation(3, "customers", "id", "name")?;
        assert_eq!(model.data(0, 3, CellRole::Display).display_text(), "Acme");
        assert_eq!(
            model.data(0, 3, CellRole::Edit),
            CellData::Value(Value::Integer(5))
        );
        Ok(())
    }

    #[test]
    fn set_row_values_writes_named_fields() -> anyhow::Result<()> {
        let db = orders()?;
        let mut model = model(&db)?;
        model.set_row_values(0, &[("name", Value::from("nuts")), ("active", Value::Integer(0))])?;
        let record = model.record(0).expect("row 0");
        assert_eq!(record.value("name"), &Value::from("nuts"));
        assert_eq!(record.value("active"), &Value::Integer(0));
        assert!(model.set_row_values(0, &[("nope", Value::Null)]).is_err());
        Ok(())
    }

    #[test]
    fn headers_use_field_headers_and_optional_row_numbers() -> anyhow::Result<()> {
        let db = orders()?;
        let model = model(&db)?;
        assert_eq!(
            model
                .header_data(3, Orientation::Horizontal, CellRole::Display)
                .display_text(),
            "Customer Id"
        );
        assert!(
            model
                .header_data(0, Orientation::Vertical, CellRole::Display)
                .is_none()
        );

        let numbered = RecordModel::open(
            &db,
            ModelConfig::new("orders")
                .without_auto_id()
                .with_vertical_header(None),
        )?;
        assert_eq!(
            numbered.header_data(0, Orientation::Vertical, CellRole::Display),
            CellData::Value(Value::Integer(1))
        );

        let named = RecordModel::open(
            &db,
            ModelConfig::new("orders")
                .without_auto_id()
                .with_vertical_header(Some("name")),
        )?;
        assert_eq!(
            named
                .header_data(0, Orientation::Vertical, CellRole::Display)
                .display_text(),
            "bolts"
        );
        Ok(())
    }

    #[test]
    fn custom_colors_reach_role_queries() -> anyhow::Result<()> {
        use crate::{CellRenderer, Record};

        struct Inactive;
        impl CellRenderer for Inactive {
            fn background_color(&self, _value: &Value, record: &Record) -> Option<Color> {
                (!record.value("active").is_truthy()).then_some(Color::GRAY)
            }
        }

        let db = orders()?;
        let mut model = model(&db)?;
        let field = Field::custom(model.field_at(1).expect("name column"), Inactive);
        model.replace_field(field)?;
        assert_eq!(model.data(0, 1, CellRole::Background), CellData::None);
        model.set_value(0, 2, Value::Integer(0))?;
        assert_eq!(
            model.data(0, 1, CellRole::Background),
            CellData::Color(Color::GRAY)
        );
        Ok(())
    }
}
