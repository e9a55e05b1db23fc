// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Record form and record table views: the editing surfaces built on top of
//! [`TableView`] and an [`EditableModel`].

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    BindError, BindResult, EditableModel, FilterSpec, FilterToolbar, Record, SelectionMode, Shared,
    Signal, TableView, Value,
};

/// A view that follows a parent's current row (master-detail).
pub trait DetailView {
    fn name(&self) -> &str;

    /// Narrows to the parent's id and refreshes, cascading further down.
    fn follow_parent(&mut self, parent_id: &Value) -> BindResult<()>;
}

/// Result of [`RecordFormView::save_record`]. Rejections carry the message
/// to show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Rejected(String),
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, Self::Saved)
    }
}

#[derive(Debug, Clone)]
struct Editor {
    column: usize,
    value: Value,
}

/// Edits one row of a model through named editors, one per mapped field.
pub struct RecordFormView<M: EditableModel> {
    model: Shared<M>,
    editors: BTreeMap<String, Editor>,
    current_row: Option<usize>,
    new_record: bool,
    read_only: bool,
    focused: Option<String>,
    subviews: Vec<Rc<RefCell<dyn DetailView>>>,
    pre_save: Signal<Record>,
    post_save: Signal<()>,
    current_changed: Signal<Option<usize>>,
}

impl<M: EditableModel> RecordFormView<M> {
    /// Maps an editor to each named field.
    pub fn new(model: Shared<M>, fields: &[&str]) -> BindResult<Self> {
        let editors = {
            let model = model.borrow();
            fields
                .iter()
                .map(|name| {
                    let column = model.base().field_index(name)?;
                    Ok((
                        (*name).to_owned(),
                        Editor {
                            column,
                            value: Value::Null,
                        },
                    ))
                })
                .collect::<BindResult<BTreeMap<_, _>>>()?
        };
        Ok(Self {
            model,
            editors,
            current_row: None,
            new_record: false,
            read_only: false,
            focused: None,
            subviews: Vec::new(),
            pre_save: Signal::new(),
            post_save: Signal::new(),
            current_changed: Signal::new(),
        })
    }

    /// Maps an editor to every field of the model.
    pub fn for_all_fields(model: Shared<M>) -> BindResult<Self> {
        let names = model
            .borrow()
            .base()
            .fields()
            .iter()
            .map(|field| field.name().to_owned())
            .collect::<Vec<_>>();
        let names = names.iter().map(String::as_str).collect::<Vec<_>>();
        Self::new(model, &names)
    }

    pub fn model(&self) -> &Shared<M> {
        &self.model
    }

    /// Registers a detail view refreshed whenever the current row changes.
    pub fn add_subview(&mut self, view: Rc<RefCell<dyn DetailView>>) {
        self.subviews.push(view);
    }

    pub fn subview(&self, name: &str) -> Option<&Rc<RefCell<dyn DetailView>>> {
        self.subviews
            .iter()
            .find(|view| view.borrow().name() == name)
    }

    /// Emitted with the record about to be submitted.
    pub fn pre_save(&self) -> &Signal<Record> {
        &self.pre_save
    }

    pub fn post_save(&self) -> &Signal<()> {
        &self.post_save
    }

    pub fn current_changed(&self) -> &Signal<Option<usize>> {
        &self.current_changed
    }

    pub fn current_row(&self) -> Option<usize> {
        self.current_row
    }

    /// A form with no current row is disabled.
    pub fn is_enabled(&self) -> bool {
        self.current_row.is_some()
    }

    pub fn is_new_record(&self) -> bool {
        self.new_record
    }

    pub fn set_new_record(&mut self, new_record: bool) {
        self.new_record = new_record;
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn editor_names(&self) -> impl Iterator<Item = &str> {
        self.editors.keys().map(String::as_str)
    }

    pub fn editor_value(&self, name: &str) -> Option<&Value> {
        self.editors.get(name).map(|editor| &editor.value)
    }

    pub fn set_editor_value(&mut self, name: &str, value: impl Into<Value>) -> BindResult<()> {
        if self.read_only || self.current_row.is_none() {
            return Err(BindError::ReadOnly(name.to_owned()));
        }
        let editor = self
            .editors
            .get_mut(name)
            .ok_or_else(|| BindError::FieldNotFound(name.to_owned()))?;
        editor.value = value.into();
        Ok(())
    }

    /// Moves keyboard focus to an editor; unknown names are ignored.
    pub fn focus(&mut self, name: &str) -> bool {
        if self.editors.contains_key(name) {
            self.focused = Some(name.to_owned());
            true
        } else {
            false
        }
    }

    pub fn focused(&self) -> Option<&str> {
        self.focused.as_deref()
    }

    /// `(id, display)` pairs for an editor bound to a related column.
    pub fn choices(&self, name: &str) -> BindResult<Vec<(Value, Value)>> {
        let editor = self
            .editors
            .get(name)
            .ok_or_else(|| BindError::FieldNotFound(name.to_owned()))?;
        self.model.borrow().base().relation_choices(editor.column)
    }

    /// Points the form at `row` (or at nothing), reloads the editors and
    /// cascades the row's id into every subview, depth-first.
    pub fn set_record_index(&mut self, row: Option<usize>) -> BindResult<()> {
        let (row, record, id) = {
            let model = self.model.borrow();
            match row.and_then(|row| model.record(row).map(|record| (row, record))) {
                Some((row, record)) => {
                    let id = model.base().id_at(row).unwrap_or_default();
                    (Some(row), Some(record), id)
                }
                None => (None, None, Value::Null),
            }
        };

        self.current_row = row;
        for editor in self.editors.values_mut() {
            editor.value = record
                .as_ref()
                .and_then(|record| record.value_at(editor.column).cloned())
                .unwrap_or_default();
        }
        self.current_changed.emit(&row);

        for view in &self.subviews {
            view.borrow_mut().follow_parent(&id)?;
        }
        Ok(())
    }

    /// Writes the editors back, validates, submits and reports the outcome.
    /// Store failures become a user-facing rejection, never an error.
    pub fn save_record(&mut self) -> SaveOutcome {
        let Some(row) = self.current_row else {
            return SaveOutcome::Rejected("No record selected".to_owned());
        };

        let invalid = {
            let model = self.model.borrow();
            self.editors.iter().find_map(|(name, editor)| {
                let field = model.base().field(name)?;
                (!field.validate(&editor.value)).then(|| field.header.clone())
            })
        };
        if let Some(header) = invalid {
            return SaveOutcome::Rejected(format!("Invalid value for {header}"));
        }

        let values = self
            .editors
            .iter()
            .map(|(name, editor)| (name.as_str(), editor.value.clone()))
            .collect::<Vec<_>>();
        let written = self.model.borrow_mut().base_mut().set_row_values(row, &values);
        if let Err(error) = written {
            return self.reject(&error);
        }

        let (record, id) = {
            let model = self.model.borrow();
            (model.record(row), model.base().id_at(row))
        };
        if let Some(record) = record {
            self.pre_save.emit(&record);
        }

        let submitted = self.model.borrow_mut().base_mut().submit_all();
        if let Err(error) = submitted {
            return self.reject(&error);
        }

        self.new_record = false;
        let row = {
            let model = self.model.borrow();
            id.and_then(|id| model.base().row_of_id(&id))
        };
        if let Err(error) = self.set_record_index(row) {
            return self.reject(&error);
        }
        debug!(?row, "record saved");
        self.post_save.emit(&());
        SaveOutcome::Saved
    }

    fn reject(&self, cause: &BindError) -> SaveOutcome {
        let text = self
            .model
            .borrow()
            .base()
            .last_error()
            .map_or_else(|| cause.to_string(), str::to_owned);
        error!(error = %text, "unable to save record");
        SaveOutcome::Rejected(format!("Unable to save record\n{text}"))
    }
}

impl<M: EditableModel> fmt::Debug for RecordFormView<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordFormView")
            .field("editors", &self.editors.keys().collect::<Vec<_>>())
            .field("current_row", &self.current_row)
            .field("new_record", &self.new_record)
            .field("read_only", &self.read_only)
            .field("subviews", &self.subviews.len())
            .finish()
    }
}

/// Behaviour switches for a [`RecordTableView`]; deserializable so views
/// can be declared in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TableViewOptions {
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub read_only_table: bool,
    pub read_only_form: bool,
    pub inline_form: bool,
    pub dbl_click_edit: bool,
    pub single_select: bool,
    pub enable_sorting: bool,
    pub focus_form_field: Option<String>,
}

impl Default for TableViewOptions {
    fn default() -> Self {
        Self {
            can_create: true,
            can_edit: true,
            can_delete: true,
            read_only_table: true,
            read_only_form: false,
            inline_form: false,
            dbl_click_edit: true,
            single_select: true,
            enable_sorting: false,
            focus_form_field: None,
        }
    }
}

pub type FormFactory<M> = Box<dyn Fn(Shared<M>) -> BindResult<RecordFormView<M>>>;

/// A table of records with create, edit and delete actions, an optional
/// text filter and an optional inline form that follows the selection.
pub struct RecordTableView<M: EditableModel> {
    name: String,
    table: TableView<M>,
    options: TableViewOptions,
    form_factory: Option<FormFactory<M>>,
    form: Option<RecordFormView<M>>,
    filter_toolbar: Option<FilterToolbar<M>>,
    after_record_added: Signal<usize>,
    after_record_deleted: Signal<()>,
}

impl<M: EditableModel> RecordTableView<M> {
    pub fn new(name: impl Into<String>, model: Shared<M>, options: TableViewOptions) -> Self {
        let mut table = TableView::new(model);
        table.set_read_only(options.read_only_table);
        table.set_sorting_enabled(options.enable_sorting);
        table.set_selection_mode(if options.single_select {
            SelectionMode::Single
        } else {
            SelectionMode::Multi
        });
        Self {
            name: name.into(),
            table,
            options,
            form_factory: None,
            form: None,
            filter_toolbar: None,
            after_record_added: Signal::new(),
            after_record_deleted: Signal::new(),
        }
    }

    /// Sets how edit forms are built. Inline tables build theirs at once.
    pub fn with_form<F>(mut self, factory: F) -> BindResult<Self>
    where
        F: Fn(Shared<M>) -> BindResult<RecordFormView<M>> + 'static,
    {
        if self.options.inline_form {
            let mut form = factory(Rc::clone(self.table.model()))?;
            form.set_read_only(self.options.read_only_form);
            form.set_record_index(None)?;
            self.form = Some(form);
        }
        self.form_factory = Some(Box::new(factory));
        Ok(self)
    }

    pub fn with_filter_fields(mut self, specs: Vec<FilterSpec>) -> BindResult<Self> {
        if !specs.is_empty() {
            let toolbar = FilterToolbar::new(Rc::clone(self.table.proxy()), specs)?;
            self.filter_toolbar = Some(toolbar);
        }
        Ok(self)
    }

    pub fn table(&self) -> &TableView<M> {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TableView<M> {
        &mut self.table
    }

    pub fn options(&self) -> &TableViewOptions {
        &self.options
    }

    pub fn form(&self) -> Option<&RecordFormView<M>> {
        self.form.as_ref()
    }

    pub fn form_mut(&mut self) -> Option<&mut RecordFormView<M>> {
        self.form.as_mut()
    }

    /// Closes a popped-up form; inline forms stay.
    pub fn close_form(&mut self) {
        if !self.options.inline_form {
            self.form = None;
        }
    }

    pub fn filter_toolbar(&self) -> Option<&FilterToolbar<M>> {
        self.filter_toolbar.as_ref()
    }

    pub fn filter_toolbar_mut(&mut self) -> Option<&mut FilterToolbar<M>> {
        self.filter_toolbar.as_mut()
    }

    /// Emitted with the model row of every record created here.
    pub fn after_record_added(&self) -> &Signal<usize> {
        &self.after_record_added
    }

    pub fn after_record_deleted(&self) -> &Signal<()> {
        &self.after_record_deleted
    }

    /// Adds a record and opens it in the form, if there is one.
    pub fn new_record(&mut self) -> BindResult<usize> {
        if !self.options.can_create {
            return Err(BindError::ReadOnly(self.name.clone()));
        }
        let (_, row) = self.table.model().borrow_mut().add_record(&[])?;
        debug!(view = %self.name, row, "new record");

        if !self.options.inline_form {
            self.form = self.build_form()?;
        }
        if let Some(form) = self.form.as_mut() {
            form.set_new_record(true);
            form.set_record_index(Some(row))?;
            if let Some(field) = &self.options.focus_form_field {
                form.focus(field);
            }
        }
        self.after_record_added.emit(&row);
        Ok(row)
    }

    /// Opens the selected record in a form. Returns `false` without a
    /// selection or a form factory.
    pub fn edit_record(&mut self) -> BindResult<bool> {
        if !self.options.can_edit {
            return Err(BindError::ReadOnly(self.name.clone()));
        }
        let Some(row) = self.table.selected_index() else {
            return Ok(false);
        };
        if !self.options.inline_form {
            self.form = self.build_form()?;
        }
        let Some(form) = self.form.as_mut() else {
            return Ok(false);
        };
        form.set_new_record(false);
        form.set_record_index(Some(row))?;
        form.set_read_only(self.options.read_only_form);
        Ok(true)
    }

    /// Removes every selected row and commits. A failed commit reverts the
    /// buffer and surfaces the store error.
    pub fn delete_selected_records(&mut self) -> BindResult<usize> {
        if !self.options.can_delete {
            return Err(BindError::ReadOnly(self.name.clone()));
        }
        let mut rows = self.table.selected_rows();
        rows.sort_unstable_by(|a, b| b.cmp(a));
        rows.dedup();
        if rows.is_empty() {
            return Ok(0);
        }

        let result = {
            let mut model = self.table.model().borrow_mut();
            let base = model.base_mut();
            let removed = rows.iter().try_for_each(|row| base.remove_row(*row));
            match removed.and_then(|()| base.submit_all()) {
                Ok(()) => Ok(()),
                Err(error) => {
                    base.revert_all();
                    Err(error)
                }
            }
        };
        result?;
        debug!(view = %self.name, count = rows.len(), "records deleted");
        self.sync_form()?;
        self.after_record_deleted.emit(&());
        Ok(rows.len())
    }

    pub fn refresh(&mut self) -> BindResult<()> {
        self.table.model().borrow_mut().base_mut().select()?;
        self.sync_form()
    }

    /// Selects visible `row`; an inline form follows the selection.
    pub fn select_row(&mut self, row: usize) -> BindResult<bool> {
        if !self.table.select_row(row) {
            return Ok(false);
        }
        self.sync_form()?;
        Ok(true)
    }

    /// Double-click or enter on visible `row`.
    pub fn activate(&mut self, row: usize) -> BindResult<bool> {
        if !self.table.activate(row) {
            return Ok(false);
        }
        self.sync_form()?;
        if self.options.dbl_click_edit && !self.options.inline_form && self.options.can_edit {
            return self.edit_record();
        }
        Ok(true)
    }

    fn build_form(&self) -> BindResult<Option<RecordFormView<M>>> {
        self.form_factory
            .as_ref()
            .map(|factory| factory(Rc::clone(self.table.model())))
            .transpose()
    }

    fn sync_form(&mut self) -> BindResult<()> {
        if !self.options.inline_form {
            return Ok(());
        }
        let row = self.table.selected_index();
        match self.form.as_mut() {
            Some(form) => {
                form.set_new_record(false);
                form.set_record_index(row)
            }
            None => Ok(()),
        }
    }
}

impl<M: EditableModel> DetailView for RecordTableView<M> {
    fn name(&self) -> &str {
        &self.name
    }

    fn follow_parent(&mut self, parent_id: &Value) -> BindResult<()> {
        self.table.model().borrow_mut().follow_parent(parent_id)?;
        self.table.clear_selection();
        self.sync_form()
    }
}

impl<M: EditableModel> fmt::Debug for RecordTableView<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordTableView")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("rows", &self.table.row_count())
            .field("form", &self.form)
            .finish()
    }
}
