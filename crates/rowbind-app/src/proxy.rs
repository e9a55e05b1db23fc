// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::{
    CellData, CellRole, ConnectionId, ItemFlags, ModelEvent, Orientation, Record, Shared, Signal,
    SortOrder, TableModel, Value,
};

/// String filter: `(row, filter text) -> visible`.
pub type StringFilter = Rc<dyn Fn(&Record, &str) -> bool>;

/// Boolean filter comparator: `(cell value, expected) -> visible`.
pub type BooleanComparator = Rc<dyn Fn(&Value, bool) -> bool>;

struct BooleanFilter {
    field: String,
    expected: bool,
    comparator: BooleanComparator,
}

/// Row-hiding, optionally sorting view over another [`TableModel`].
///
/// A source row is visible iff every string filter and every boolean filter
/// accepts it. String filters only apply while the filter text is non-empty.
/// Visible rows keep source order unless a sort column is set. All mutators
/// take `&self` so one proxy can be shared by a table view and the toolbars
/// driving it.
///
/// Source events are relayed as [`ModelEvent::Reset`] while the source may
/// still be mutably borrowed. Until that borrow ends the proxy stays stale
/// and answers like an empty model; the first read afterwards recomputes.
pub struct FilterProxy<M: TableModel> {
    source: Shared<M>,
    filter_string: RefCell<Option<String>>,
    string_filters: RefCell<Vec<(String, StringFilter)>>,
    boolean_filters: RefCell<Vec<BooleanFilter>>,
    sort: Cell<Option<(usize, SortOrder)>>,
    mapping: RefCell<Vec<usize>>,
    stale: Rc<Cell<bool>>,
    events: Signal<ModelEvent>,
    filter_changed: Signal<()>,
    source_connection: ConnectionId,
}

impl<M: TableModel> FilterProxy<M> {
    pub fn new(source: Shared<M>) -> Self {
        let stale = Rc::new(Cell::new(true));
        let events = Signal::new();
        let source_connection = {
            let stale = Rc::clone(&stale);
            let relay = events.clone();
            source.borrow().events().connect(move |_event: &ModelEvent| {
                stale.set(true);
                relay.emit(&ModelEvent::Reset);
            })
        };
        Self {
            source,
            filter_string: RefCell::new(None),
            string_filters: RefCell::new(Vec::new()),
            boolean_filters: RefCell::new(Vec::new()),
            sort: Cell::new(None),
            mapping: RefCell::new(Vec::new()),
            stale,
            events,
            filter_changed: Signal::new(),
            source_connection,
        }
    }

    pub fn source(&self) -> &Shared<M> {
        &self.source
    }

    /// Emitted whenever the filter text changes, before revalidation.
    pub fn filter_changed(&self) -> &Signal<()> {
        &self.filter_changed
    }

    pub fn filter_string(&self) -> Option<String> {
        self.filter_string.borrow().clone()
    }

    pub fn set_filter_string(&self, text: &str) {
        *self.filter_string.borrow_mut() = Some(text.to_owned());
        self.filter_changed.emit(&());
        self.invalidate();
    }

    pub fn clear_filter_string(&self) {
        *self.filter_string.borrow_mut() = None;
        self.filter_changed.emit(&());
        self.invalidate();
    }

    /// Installs or replaces the string filter called `name`.
    pub fn add_filter_function<F>(&self, name: &str, filter: F)
    where
        F: Fn(&Record, &str) -> bool + 'static,
    {
        self.add_filter(name, Rc::new(filter));
    }

    pub fn add_filter(&self, name: &str, filter: StringFilter) {
        {
            let mut filters = self.string_filters.borrow_mut();
            match filters.iter_mut().find(|(existing, _)| existing == name) {
                Some((_, slot)) => *slot = filter,
                None => filters.push((name.to_owned(), filter)),
            }
        }
        self.invalidate();
    }

    pub fn remove_filter_function(&self, name: &str) -> bool {
        let removed = {
            let mut filters = self.string_filters.borrow_mut();
            let before = filters.len();
            filters.retain(|(existing, _)| existing != name);
            filters.len() != before
        };
        if removed {
            self.invalidate();
        }
        removed
    }

    pub fn clear_filter_functions(&self) {
        self.string_filters.borrow_mut().clear();
        self.invalidate();
    }

    pub fn has_filter_function(&self, name: &str) -> bool {
        self.string_filters
            .borrow()
            .iter()
            .any(|(existing, _)| existing == name)
    }

    /// Boolean filter on `field` with the equality comparator.
    pub fn set_boolean_filter(&self, field: &str, expected: bool) {
        self.set_boolean_filter_with(field, expected, Rc::new(|value: &Value, expected| {
            value.eq_bool(expected)
        }));
    }

    pub fn set_boolean_filter_with(&self, field: &str, expected: bool, comparator: BooleanComparator) {
        {
            let mut filters = self.boolean_filters.borrow_mut();
            let filter = BooleanFilter {
                field: field.to_owned(),
                expected,
                comparator,
            };
            match filters.iter_mut().find(|existing| existing.field == field) {
                Some(slot) => *slot = filter,
                None => filters.push(filter),
            }
        }
        self.invalidate();
    }

    /// Flips the expected value of an installed boolean filter, keeping its
    /// comparator. Returns `false` when no such filter exists.
    pub fn set_boolean_expected(&self, field: &str, expected: bool) -> bool {
        let changed = {
            let mut filters = self.boolean_filters.borrow_mut();
            match filters.iter_mut().find(|existing| existing.field == field) {
                Some(filter) => {
                    filter.expected = expected;
                    true
                }
                None => false,
            }
        };
        if changed {
            self.invalidate();
        }
        changed
    }

    pub fn boolean_filter(&self, field: &str) -> Option<bool> {
        self.boolean_filters
            .borrow()
            .iter()
            .find(|filter| filter.field == field)
            .map(|filter| filter.expected)
    }

    pub fn remove_boolean_filter(&self, field: &str) -> bool {
        let removed = {
            let mut filters = self.boolean_filters.borrow_mut();
            let before = filters.len();
            filters.retain(|filter| filter.field != field);
            filters.len() != before
        };
        if removed {
            self.invalidate();
        }
        removed
    }

    /// Orders visible rows by the raw (Edit role) value of `column`. Ties
    /// keep source order.
    pub fn sort(&self, column: usize, order: SortOrder) {
        self.sort.set(Some((column, order)));
        self.invalidate();
    }

    /// Back to source order.
    pub fn clear_sort(&self) {
        if self.sort.replace(None).is_some() {
            self.invalidate();
        }
    }

    pub fn sort_column(&self) -> Option<(usize, SortOrder)> {
        self.sort.get()
    }

    /// Forces revalidation, e.g. after a change the source did not announce.
    pub fn update(&self) {
        self.invalidate();
    }

    /// Recomputes visibility for every source row and announces a reset.
    pub fn invalidate(&self) {
        self.stale.set(true);
        self.revalidate();
        self.events.emit(&ModelEvent::Reset);
    }

    pub fn accepts_row(&self, source_row: usize) -> bool {
        let Ok(source) = self.source.try_borrow() else {
            return false;
        };
        source
            .record(source_row)
            .is_some_and(|record| self.accepts_record(&record))
    }

    fn accepts_record(&self, record: &Record) -> bool {
        self.string_filters_pass(record) && self.boolean_filters_pass(record)
    }

    fn string_filters_pass(&self, record: &Record) -> bool {
        let text = self.filter_string.borrow();
        match text.as_deref() {
            None | Some("") => true,
            Some(text) => self
                .string_filters
                .borrow()
                .iter()
                .all(|(_, filter)| filter(record, text)),
        }
    }

    fn boolean_filters_pass(&self, record: &Record) -> bool {
        self.boolean_filters
            .borrow()
            .iter()
            .all(|filter| (filter.comparator)(record.value(&filter.field), filter.expected))
    }

    /// Returns `false`, leaving the mapping stale, while the source is busy.
    fn revalidate(&self) -> bool {
        let Ok(source) = self.source.try_borrow() else {
            debug!("source busy, revalidation deferred");
            return false;
        };
        if !source.is_ready() {
            return false;
        }
        let mut visible = (0..source.row_count())
            .filter(|row| {
                source
                    .record(*row)
                    .is_some_and(|record| self.accepts_record(&record))
            })
            .collect::<Vec<_>>();
        if let Some((column, order)) = self.sort.get() {
            let mut keyed = visible
                .into_iter()
                .map(|row| {
                    let key = match source.data(row, column, CellRole::Edit) {
                        CellData::Value(value) => value,
                        _ => Value::Null,
                    };
                    (key, row)
                })
                .collect::<Vec<_>>();
            keyed.sort_by(|(left, _), (right, _)| match order {
                SortOrder::Ascending => left.sort_cmp(right),
                SortOrder::Descending => right.sort_cmp(left),
            });
            visible = keyed.into_iter().map(|(_, row)| row).collect();
        }
        drop(source);

        debug!(
            visible = visible.len(),
            string_filters = self.string_filters.borrow().len(),
            boolean_filters = self.boolean_filters.borrow().len(),
            sort = ?self.sort.get(),
            "filter revalidated"
        );
        *self.mapping.borrow_mut() = visible;
        self.stale.set(false);
        true
    }

    fn ensure_fresh(&self) -> bool {
        !self.stale.get() || self.revalidate()
    }

    pub fn map_to_source(&self, row: usize) -> Option<usize> {
        if !self.ensure_fresh() {
            return None;
        }
        self.mapping.borrow().get(row).copied()
    }

    pub fn map_from_source(&self, source_row: usize) -> Option<usize> {
        if !self.ensure_fresh() {
            return None;
        }
        self.mapping
            .borrow()
            .iter()
            .position(|candidate| *candidate == source_row)
    }

    /// Source row of every visible row, in visible order.
    pub fn visible_indexes(&self) -> Vec<usize> {
        (0..self.row_count())
            .filter_map(|row| self.map_to_source(row))
            .collect()
    }

    pub fn visible_records(&self) -> Vec<Record> {
        let indexes = self.visible_indexes();
        let Ok(source) = self.source.try_borrow() else {
            return Vec::new();
        };
        indexes
            .into_iter()
            .filter_map(|row| source.record(row))
            .collect()
    }
}

impl<M: TableModel> TableModel for FilterProxy<M> {
    fn row_count(&self) -> usize {
        if !self.ensure_fresh() {
            return 0;
        }
        self.mapping.borrow().len()
    }

    fn column_count(&self) -> usize {
        self.source
            .try_borrow()
            .map_or(0, |source| source.column_count())
    }

    fn column_name(&self, column: usize) -> Option<String> {
        self.source.try_borrow().ok()?.column_name(column)
    }

    fn record(&self, row: usize) -> Option<Record> {
        let source_row = self.map_to_source(row)?;
        self.source.try_borrow().ok()?.record(source_row)
    }

    fn data(&self, row: usize, column: usize, role: CellRole) -> CellData {
        let source = self.source.try_borrow();
        match (self.map_to_source(row), source) {
            (Some(source_row), Ok(source)) => source.data(source_row, column, role),
            _ => CellData::None,
        }
    }

    fn flags(&self, row: usize, column: usize) -> ItemFlags {
        let source = self.source.try_borrow();
        match (self.map_to_source(row), source) {
            (Some(source_row), Ok(source)) => source.flags(source_row, column),
            _ => ItemFlags::default(),
        }
    }

    fn header_data(&self, section: usize, orientation: Orientation, role: CellRole) -> CellData {
        let section = match orientation {
            Orientation::Horizontal => Some(section),
            Orientation::Vertical => self.map_to_source(section),
        };
        match (section, self.source.try_borrow()) {
            (Some(section), Ok(source)) => source.header_data(section, orientation, role),
            _ => CellData::None,
        }
    }

    fn is_ready(&self) -> bool {
        self.source.try_borrow().is_ok_and(|source| source.is_ready())
    }

    fn events(&self) -> &Signal<ModelEvent> {
        &self.events
    }
}

impl<M: TableModel> Drop for FilterProxy<M> {
    fn drop(&mut self) {
        if let Ok(source) = self.source.try_borrow() {
            source.events().disconnect(self.source_connection);
        }
    }
}

impl<M: TableModel> fmt::Debug for FilterProxy<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterProxy")
            .field("filter_string", &self.filter_string.borrow())
            .field(
                "string_filters",
                &self
                    .string_filters
                    .borrow()
                    .iter()
                    .map(|(name, _)| name.clone())
                    .collect::<Vec<_>>(),
            )
            .field(
                "boolean_filters",
                &self
                    .boolean_filters
                    .borrow()
                    .iter()
                    .map(|filter| (filter.field.clone(), filter.expected))
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::FilterProxy;
    use crate::{
        CellRole, MemoryDatabase, MemoryStore, ModelConfig, ModelEvent, RecordModel, Shared,
        SortOrder, TableModel, Value, shared,
    };
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    fn source() -> anyhow::Result<Shared<RecordModel<MemoryStore>>> {
        let db = MemoryDatabase::new();
        db.create_table("orders", &["id", "name", "active", "paid"])?;
        let rows = [
            (1, "bolts", 1, 1),
            (2, "nuts", 0, 1),
            (3, "Bolt cutter", 1, 0),
            (4, "washers", 1, 1),
        ];
        for (id, name, active, paid) in rows {
            db.insert(
                "orders",
                vec![
                    Value::Integer(id),
                    Value::from(name),
                    Value::Integer(active),
                    Value::Integer(paid),
                ],
            )?;
        }
        db.create_sequence("orders_id_seq", 10);
        let model = RecordModel::open(&db, ModelConfig::new("orders").with_sequence("orders_id_seq"))?;
        Ok(shared(model))
    }

    fn names(proxy: &FilterProxy<RecordModel<MemoryStore>>) -> Vec<String> {
        proxy
            .visible_records()
            .iter()
            .map(|record| record.value("name").to_string())
            .collect()
    }

    fn contains_name(record: &crate::Record, text: &str) -> bool {
        record
            .value("name")
            .to_string()
            .to_lowercase()
            .contains(&text.to_lowercase())
    }

    #[test]
    fn no_filters_shows_every_row() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        assert_eq!(proxy.row_count(), 4);
        assert_eq!(proxy.visible_indexes(), vec![0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn string_filters_ignored_while_text_is_empty() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        proxy.add_filter_function("filter", |_, _| false);
        assert_eq!(proxy.row_count(), 4);
        proxy.set_filter_string("");
        assert_eq!(proxy.row_count(), 4);
        proxy.set_filter_string("x");
        assert_eq!(proxy.row_count(), 0);
        proxy.clear_filter_string();
        assert_eq!(proxy.row_count(), 4);
        Ok(())
    }

    #[test]
    fn string_and_boolean_filters_compose_with_and() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        proxy.add_filter_function("filter", contains_name);
        proxy.set_filter_string("bolt");
        assert_eq!(names(&proxy), vec!["bolts", "Bolt cutter"]);

        proxy.set_boolean_filter("active", true);
        assert_eq!(names(&proxy), vec!["bolts", "Bolt cutter"]);

        proxy.set_boolean_filter("paid", true);
        assert_eq!(names(&proxy), vec!["bolts"]);
        assert_eq!(proxy.visible_indexes(), vec![0]);
        Ok(())
    }

    #[test]
    fn second_failing_boolean_filter_hides_row() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        proxy.set_boolean_filter("active", true);
        assert!(proxy.accepts_row(2));
        proxy.set_boolean_filter("paid", true);
        assert!(!proxy.accepts_row(2));
        assert!(proxy.remove_boolean_filter("paid"));
        assert!(proxy.accepts_row(2));
        Ok(())
    }

    #[test]
    fn custom_comparator_and_expected_toggle() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        proxy.set_boolean_filter_with(
            "active",
            false,
            Rc::new(|value: &Value, expected| expected || !value.is_truthy()),
        );
        assert_eq!(names(&proxy), vec!["nuts"]);
        assert!(proxy.set_boolean_expected("active", true));
        assert_eq!(proxy.row_count(), 4);
        assert_eq!(proxy.boolean_filter("active"), Some(true));
        assert!(!proxy.set_boolean_expected("missing", true));
        Ok(())
    }

    #[test]
    fn removing_a_filter_revalidates() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        proxy.set_filter_string("zzz");
        proxy.add_filter_function("filter", contains_name);
        assert_eq!(proxy.row_count(), 0);
        assert!(proxy.remove_filter_function("filter"));
        assert!(!proxy.remove_filter_function("filter"));
        assert_eq!(proxy.row_count(), 4);
        Ok(())
    }

    #[test]
    fn filter_functions_are_replaced_by_name() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        proxy.set_filter_string("x");
        proxy.add_filter_function("filter", |_, _| false);
        proxy.add_filter_function("filter", |_, _| true);
        assert_eq!(proxy.row_count(), 4);
        proxy.clear_filter_functions();
        assert!(!proxy.has_filter_function("filter"));
        Ok(())
    }

    #[test]
    fn filter_string_change_notifies() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        proxy
            .filter_changed()
            .connect(move |_| *counter.borrow_mut() += 1);
        proxy.set_filter_string("a");
        proxy.clear_filter_string();
        assert_eq!(*count.borrow(), 2);
        Ok(())
    }

    #[test]
    fn source_mutations_mark_the_mapping_stale() -> anyhow::Result<()> {
        let source = source()?;
        let proxy = FilterProxy::new(Rc::clone(&source));
        proxy.set_boolean_filter("active", true);
        assert_eq!(proxy.row_count(), 3);

        let resets = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&resets);
        proxy.events().connect(move |event| {
            if *event == ModelEvent::Reset {
                *counter.borrow_mut() += 1;
            }
        });

        source
            .borrow_mut()
            .add_record(&[("name", Value::from("gears")), ("active", Value::Integer(1))])?;
        assert_eq!(*resets.borrow(), 1);
        assert_eq!(proxy.row_count(), 4);
        assert_eq!(proxy.map_to_source(3), Some(4));
        assert_eq!(proxy.map_from_source(1), None);
        Ok(())
    }

    #[test]
    fn reset_subscribers_can_read_back_during_source_mutation() -> anyhow::Result<()> {
        let source = source()?;
        let proxy = Rc::new(FilterProxy::new(Rc::clone(&source)));
        let seen = Rc::new(RefCell::new(Vec::new()));
        {
            let weak = Rc::downgrade(&proxy);
            let seen = Rc::clone(&seen);
            proxy.events().connect(move |_| {
                if let Some(proxy) = weak.upgrade() {
                    let name = proxy.data(0, 1, CellRole::Display).display_text();
                    seen.borrow_mut().push((proxy.row_count(), name));
                }
            });
        }

        source
            .borrow_mut()
            .add_record(&[("name", Value::from("gears"))])?;
        assert!(!seen.borrow().is_empty());
        assert!(
            seen.borrow()
                .iter()
                .all(|(rows, name)| *rows == 0 && name.is_empty())
        );

        assert_eq!(proxy.row_count(), 5);
        assert_eq!(proxy.visible_records()[4].value("name"), &Value::from("gears"));
        Ok(())
    }

    #[test]
    fn nested_proxies_stay_stale_while_the_base_is_borrowed() -> anyhow::Result<()> {
        let source = source()?;
        let inner = shared(FilterProxy::new(Rc::clone(&source)));
        let outer = Rc::new(FilterProxy::new(Rc::clone(&inner)));
        assert_eq!(outer.row_count(), 4);
        let during = Rc::new(Cell::new(None));
        {
            let weak = Rc::downgrade(&outer);
            let during = Rc::clone(&during);
            outer.events().connect(move |_| {
                if let Some(outer) = weak.upgrade() {
                    during.set(Some(outer.row_count()));
                }
            });
        }

        source.borrow_mut().remove_row(0)?;
        assert_eq!(during.get(), Some(0));
        assert_eq!(outer.row_count(), 3);
        Ok(())
    }

    #[test]
    fn sorting_orders_visible_rows_by_raw_value() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        proxy.sort(1, SortOrder::Ascending);
        assert_eq!(names(&proxy), vec!["Bolt cutter", "bolts", "nuts", "washers"]);
        assert_eq!(proxy.visible_indexes(), vec![2, 0, 1, 3]);
        assert_eq!(proxy.map_from_source(2), Some(0));

        proxy.set_boolean_filter("active", true);
        proxy.sort(0, SortOrder::Descending);
        assert_eq!(proxy.visible_indexes(), vec![3, 2, 0]);
        assert_eq!(proxy.sort_column(), Some((0, SortOrder::Descending)));

        proxy.clear_sort();
        assert_eq!(proxy.visible_indexes(), vec![0, 2, 3]);
        assert_eq!(proxy.sort_column(), None);
        Ok(())
    }

    #[test]
    fn equal_sort_keys_keep_source_order() -> anyhow::Result<()> {
        let proxy = FilterProxy::new(source()?);
        proxy.sort(3, SortOrder::Descending);
        assert_eq!(proxy.visible_indexes(), vec![0, 1, 3, 2]);
        proxy.sort(2, SortOrder::Ascending);
        assert_eq!(proxy.visible_indexes(), vec![1, 0, 2, 3]);
        Ok(())
    }

    #[test]
    fn proxies_nest() -> anyhow::Result<()> {
        let inner = shared(FilterProxy::new(source()?));
        inner.borrow().set_boolean_filter("active", true);
        let outer = FilterProxy::new(Rc::clone(&inner));
        outer.set_boolean_filter("paid", false);
        assert_eq!(outer.row_count(), 1);
        assert_eq!(outer.visible_indexes(), vec![1]);
        assert_eq!(
            outer.record(0).map(|record| record.value("name").clone()),
            Some(Value::from("Bolt cutter"))
        );

        inner.borrow().remove_boolean_filter("active");
        assert_eq!(outer.visible_indexes(), vec![2]);
        Ok(())
    }
}
