// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::{
    BindError, BindResult, CellRole, ConnectionId, FilterProxy, Orientation, Record, Shared,
    Signal, SortOrder, TableModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Single,
    Multi,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ColumnState {
    hidden: bool,
    width: Option<u16>,
}

/// A bound table surface without a toolkit: a [`FilterProxy`] over the
/// model, per-column header state and a row selection.
///
/// Selections are kept in proxy rows and dropped whenever the proxy resets;
/// every accessor reports rows of the underlying model.
pub struct TableView<M: TableModel> {
    model: Shared<M>,
    proxy: Rc<FilterProxy<M>>,
    columns: Vec<ColumnState>,
    visual_order: Vec<usize>,
    stretch_last: bool,
    sorting: bool,
    read_only: bool,
    mode: SelectionMode,
    selection: Rc<RefCell<Vec<usize>>>,
    reset_connection: ConnectionId,
    selection_changed: Signal<Vec<usize>>,
    activated: Signal<usize>,
}

impl<M: TableModel> TableView<M> {
    pub fn new(model: Shared<M>) -> Self {
        let proxy = Rc::new(FilterProxy::new(Rc::clone(&model)));
        let column_count = model.borrow().column_count();
        let selection = Rc::new(RefCell::new(Vec::new()));
        let reset_connection = {
            let selection = Rc::clone(&selection);
            proxy.events().connect(move |_| selection.borrow_mut().clear())
        };
        Self {
            model,
            proxy,
            columns: vec![ColumnState::default(); column_count],
            visual_order: (0..column_count).collect(),
            stretch_last: false,
            sorting: false,
            read_only: true,
            mode: SelectionMode::Single,
            selection,
            reset_connection,
            selection_changed: Signal::new(),
            activated: Signal::new(),
        }
    }

    pub fn model(&self) -> &Shared<M> {
        &self.model
    }

    pub fn proxy(&self) -> &Rc<FilterProxy<M>> {
        &self.proxy
    }

    /// Visible (filtered) row count.
    pub fn row_count(&self) -> usize {
        self.proxy.row_count()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Source rows of the new selection.
    pub fn selection_changed(&self) -> &Signal<Vec<usize>> {
        &self.selection_changed
    }

    /// Source row of a double-clicked or entered row.
    pub fn activated(&self) -> &Signal<usize> {
        &self.activated
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Turning sorting off restores source order.
    pub fn set_sorting_enabled(&mut self, enabled: bool) {
        self.sorting = enabled;
        if !enabled {
            self.proxy.clear_sort();
        }
    }

    pub fn is_sorting_enabled(&self) -> bool {
        self.sorting
    }

    /// Sorts by logical `column`. Ignored while sorting is disabled or the
    /// column does not exist.
    pub fn sort_by_column(&mut self, column: usize, order: SortOrder) -> bool {
        if !self.sorting || column >= self.columns.len() {
            return false;
        }
        self.proxy.sort(column, order);
        true
    }

    pub fn sort_indicator(&self) -> Option<(usize, SortOrder)> {
        self.proxy.sort_column()
    }

    /// Whether the cell at visible `row` accepts inline edits.
    pub fn is_cell_editable(&self, row: usize, column: usize) -> bool {
        !self.read_only && self.proxy.flags(row, column).editable
    }

    pub fn header_text(&self, column: usize) -> String {
        self.proxy
            .header_data(column, Orientation::Horizontal, CellRole::Display)
            .display_text()
    }

    /// Handle for header operations on the column called `name`.
    pub fn column(&mut self, name: &str) -> BindResult<TableColumn<'_, M>> {
        let column = self.logical_index(name)?;
        Ok(TableColumn { view: self, column })
    }

    fn logical_index(&self, name: &str) -> BindResult<usize> {
        self.model
            .borrow()
            .column_of(name)
            .filter(|column| *column < self.columns.len())
            .ok_or_else(|| BindError::FieldNotFound(name.to_owned()))
    }

    pub fn set_column_hidden(&mut self, column: usize, hidden: bool) {
        if let Some(state) = self.columns.get_mut(column) {
            state.hidden = hidden;
        }
    }

    pub fn is_column_hidden(&self, column: usize) -> bool {
        self.columns.get(column).is_some_and(|state| state.hidden)
    }

    pub fn set_column_width(&mut self, column: usize, width: u16) {
        if let Some(state) = self.columns.get_mut(column) {
            state.width = Some(width);
        }
    }

    /// `None` until a width is set; surfaces pick their own default.
    pub fn column_width(&self, column: usize) -> Option<u16> {
        self.columns.get(column).and_then(|state| state.width)
    }

    pub fn stretch_last_column(&mut self, stretch: bool) {
        self.stretch_last = stretch;
    }

    pub fn stretches_last_column(&self) -> bool {
        self.stretch_last
    }

    pub fn visual_index(&self, column: usize) -> Option<usize> {
        self.visual_order
            .iter()
            .position(|logical| *logical == column)
    }

    pub fn logical_at(&self, visual: usize) -> Option<usize> {
        self.visual_order.get(visual).copied()
    }

    /// Moves the section at visual position `from` to `to`, shifting the
    /// sections in between.
    pub fn move_section(&mut self, from: usize, to: usize) {
        let last = self.visual_order.len().saturating_sub(1);
        if from > last {
            return;
        }
        let logical = self.visual_order.remove(from);
        self.visual_order.insert(to.min(last), logical);
    }

    /// Exchanges the visual positions of two logical columns.
    pub fn swap_columns(&mut self, first: usize, second: usize) {
        if let (Some(a), Some(b)) = (self.visual_index(first), self.visual_index(second)) {
            self.visual_order.swap(a, b);
        }
    }

    /// Puts the named columns first, in the given order. Unnamed columns
    /// keep their relative order after them.
    pub fn set_column_order(&mut self, names: &[&str]) -> BindResult<()> {
        let named = names
            .iter()
            .map(|name| self.logical_index(name))
            .collect::<BindResult<Vec<_>>>()?;
        let mut order = Vec::with_capacity(self.visual_order.len());
        for logical in named {
            if !order.contains(&logical) {
                order.push(logical);
            }
        }
        for logical in &self.visual_order {
            if !order.contains(logical) {
                order.push(*logical);
            }
        }
        self.visual_order = order;
        Ok(())
    }

    /// Logical indexes of shown columns, in visual order.
    pub fn visible_columns(&self) -> Vec<usize> {
        self.visual_order
            .iter()
            .copied()
            .filter(|column| !self.is_column_hidden(*column))
            .collect()
    }

    pub fn set_selection_mode(&mut self, mode: SelectionMode) {
        self.mode = mode;
        if mode == SelectionMode::Single {
            let mut selection = self.selection.borrow_mut();
            selection.truncate(1);
        }
    }

    pub fn selection_mode(&self) -> SelectionMode {
        self.mode
    }

    /// Makes visible `row` the only selected row.
    pub fn select_row(&mut self, row: usize) -> bool {
        if row >= self.row_count() {
            return false;
        }
        *self.selection.borrow_mut() = vec![row];
        self.announce_selection();
        true
    }

    /// Adds or removes `row` in multi selection; selects it in single mode.
    pub fn toggle_row(&mut self, row: usize) -> bool {
        if self.mode == SelectionMode::Single {
            return self.select_row(row);
        }
        if row >= self.row_count() {
            return false;
        }
        {
            let mut selection = self.selection.borrow_mut();
            match selection.iter().position(|selected| *selected == row) {
                Some(position) => {
                    selection.remove(position);
                }
                None => selection.push(row),
            }
        }
        self.announce_selection();
        true
    }

    pub fn clear_selection(&mut self) {
        self.selection.borrow_mut().clear();
        self.announce_selection();
    }

    /// Visible row of the primary selection.
    pub fn current_row(&self) -> Option<usize> {
        self.selection.borrow().first().copied()
    }

    /// Selected rows mapped to the model, in selection order.
    pub fn selected_rows(&self) -> Vec<usize> {
        let selection = self.selection.borrow().clone();
        selection
            .into_iter()
            .filter_map(|row| self.proxy.map_to_source(row))
            .collect()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.current_row()
            .and_then(|row| self.proxy.map_to_source(row))
    }

    /// Records of the selected rows without duplicates.
    pub fn selected_records(&self) -> Vec<Record> {
        let model = self.model.borrow();
        let mut records: Vec<Record> = Vec::new();
        for row in self.selected_rows() {
            if let Some(record) = model.record(row)
                && !records.contains(&record)
            {
                records.push(record);
            }
        }
        records
    }

    /// Double-click or enter on visible `row`.
    pub fn activate(&mut self, row: usize) -> bool {
        let Some(source_row) = self.proxy.map_to_source(row) else {
            return false;
        };
        if self.current_row() != Some(row) {
            self.select_row(row);
        }
        self.activated.emit(&source_row);
        true
    }

    fn announce_selection(&self) {
        let rows = self.selected_rows();
        self.selection_changed.emit(&rows);
    }
}

impl<M: TableModel> Drop for TableView<M> {
    fn drop(&mut self) {
        self.proxy.events().disconnect(self.reset_connection);
    }
}

impl<M: TableModel> fmt::Debug for TableView<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableView")
            .field("proxy", &self.proxy)
            .field("visual_order", &self.visual_order)
            .field("selection", &self.selection.borrow())
            .finish()
    }
}

/// Header operations on one column, addressed by field name.
pub struct TableColumn<'a, M: TableModel> {
    view: &'a mut TableView<M>,
    column: usize,
}

impl<M: TableModel> TableColumn<'_, M> {
    pub fn index(&self) -> usize {
        self.column
    }

    pub fn show(&mut self) {
        self.view.set_column_hidden(self.column, false);
    }

    pub fn hide(&mut self) {
        self.view.set_column_hidden(self.column, true);
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.view.set_column_hidden(self.column, !visible);
    }

    pub fn is_visible(&self) -> bool {
        !self.view.is_column_hidden(self.column)
    }

    pub fn visual_index(&self) -> Option<usize> {
        self.view.visual_index(self.column)
    }

    pub fn move_to(&mut self, visual: usize) {
        if let Some(from) = self.visual_index() {
            self.view.move_section(from, visual);
        }
    }

    pub fn swap_with(&mut self, other: &str) -> BindResult<()> {
        let other = self.view.logical_index(other)?;
        self.view.swap_columns(self.column, other);
        Ok(())
    }

    pub fn set_width(&mut self, width: u16) {
        self.view.set_column_width(self.column, width);
    }

    pub fn width(&self) -> Option<u16> {
        self.view.column_width(self.column)
    }
}
