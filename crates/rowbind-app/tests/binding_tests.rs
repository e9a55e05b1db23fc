// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use rowbind_app::{
    BindError, CellData, CellRole, DEFAULT_FALSE_ICON, DEFAULT_TRUE_ICON, EventConnector,
    EventPayload, Field, FilterProxy, Icon, ItemFlags, MemoryDatabase, MemoryStore, ModelConfig,
    RecordFormView, RecordModel, RecordTableView, RelatedRecordModel, ScalarExecutor, ScalarQuery,
    Shared, StoreError, TableModel, TableViewOptions, Value, Widget, shared,
};

fn shop() -> Result<MemoryDatabase> {
    let db = MemoryDatabase::new();
    db.create_table("orders", &["id", "name", "active"])?;
    db.create_table("order_lines", &["id", "order_id", "item", "shipped"])?;
    db.create_sequence("orders_id_seq", 7);
    db.create_sequence("order_lines_id_seq", 1);
    Ok(db)
}

fn orders(db: &MemoryDatabase) -> Result<RecordModel<MemoryStore>> {
    Ok(RecordModel::open(
        db,
        ModelConfig::new("orders").with_sequence("orders_id_seq"),
    )?)
}

fn seed_orders(db: &MemoryDatabase) -> Result<()> {
    let rows = [(1, "bolts", 1), (2, "nuts", 0), (3, "washers", 1)];
    for (id, name, active) in rows {
        db.insert(
            "orders",
            vec![Value::Integer(id), Value::from(name), Value::Integer(active)],
        )?;
    }
    Ok(())
}

fn names<M: TableModel>(proxy: &FilterProxy<M>) -> Vec<Value> {
    proxy
        .visible_records()
        .iter()
        .map(|record| record.value("name").clone())
        .collect()
}

#[test]
fn add_record_takes_the_sequence_value_for_its_id() -> Result<()> {
    let db = shop()?;
    let mut model = orders(&db)?;

    let (record, row) = model.add_record(&[("name", Value::from("x"))])?;
    assert_eq!(row, 0);
    assert_eq!(record.value("id"), &Value::Integer(7));
    assert_eq!(record.value("name"), &Value::from("x"));
    assert_eq!(record.value("active"), &Value::Null);

    model.submit_all()?;
    let stored = db.rows("orders")?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].values(), record.values());
    Ok(())
}

#[test]
fn caller_values_override_auto_populated_ones() -> Result<()> {
    let db = shop()?;
    let mut model = orders(&db)?;
    if let Some(field) = model.field_mut("active") {
        field.auto_populate = Some(Rc::new(|_| Value::Integer(1)));
    }

    let (defaulted, _) = model.add_record(&[("name", Value::from("a"))])?;
    let (overridden, _) =
        model.add_record(&[("name", Value::from("b")), ("active", Value::Integer(0))])?;
    assert_eq!(defaulted.value("active"), &Value::Integer(1));
    assert_eq!(overridden.value("active"), &Value::Integer(0));
    assert_eq!(overridden.value("id"), &Value::Integer(8));
    Ok(())
}

#[test]
fn every_cell_is_selectable_enabled_and_editable_by_default() -> Result<()> {
    let db = shop()?;
    seed_orders(&db)?;
    let model = orders(&db)?;
    for row in 0..model.row_count() {
        for column in 0..model.column_count() {
            assert_eq!(TableModel::flags(&model, row, column), ItemFlags::editable());
        }
    }
    Ok(())
}

#[test]
fn boolean_icon_fields_render_icons_only() -> Result<()> {
    let db = shop()?;
    seed_orders(&db)?;
    let mut model = orders(&db)?;
    let active = model
        .field("active")
        .map(Field::boolean_icon)
        .ok_or_else(|| anyhow::anyhow!("active field"))?;
    model.replace_field(active)?;
    let column = model.field_index("active")?;

    for row in 0..model.row_count() {
        assert_eq!(model.data(row, column, CellRole::Display), CellData::None);
    }
    assert_eq!(
        model.data(0, column, CellRole::Decoration),
        CellData::Icon(Icon::new(DEFAULT_TRUE_ICON))
    );
    assert_eq!(
        model.data(1, column, CellRole::Decoration),
        CellData::Icon(Icon::new(DEFAULT_FALSE_ICON))
    );
    Ok(())
}

#[test]
fn boolean_and_string_filters_compose_conjunctively() -> Result<()> {
    let db = shop()?;
    seed_orders(&db)?;
    let model = shared(orders(&db)?);
    let proxy = FilterProxy::new(Rc::clone(&model));
    assert_eq!(proxy.row_count(), 3);

    proxy.set_boolean_filter("active", true);
    assert_eq!(names(&proxy), vec![Value::from("bolts"), Value::from("washers")]);

    proxy.set_boolean_filter_with(
        "name",
        true,
        Rc::new(|value: &Value, expected: bool| {
            value.as_str().is_some_and(|name| name.len() > 5) == expected
        }),
    );
    assert_eq!(names(&proxy), vec![Value::from("washers")]);

    proxy.add_filter_function("starts", |record, text| {
        record.value("name").to_string().starts_with(text)
    });
    assert_eq!(names(&proxy).len(), 1);
    proxy.set_filter_string("b");
    assert!(names(&proxy).is_empty());
    proxy.set_filter_string("");
    assert_eq!(names(&proxy), vec![Value::from("washers")]);
    Ok(())
}

#[test]
fn nested_proxies_narrow_further() -> Result<()> {
    let db = shop()?;
    seed_orders(&db)?;
    let model = shared(orders(&db)?);
    let active = shared(FilterProxy::new(Rc::clone(&model)));
    active.borrow().set_boolean_filter("active", true);

    let named = FilterProxy::new(Rc::clone(&active));
    named.add_filter_function("name", |record, text| {
        record.value("name").to_string().contains(text)
    });
    named.set_filter_string("sh");
    assert_eq!(names(&named), vec![Value::from("washers")]);

    model
        .borrow_mut()
        .add_record(&[("name", Value::from("shims")), ("active", Value::Integer(1))])?;
    assert_eq!(
        names(&named),
        vec![Value::from("washers"), Value::from("shims")]
    );
    Ok(())
}

#[test]
fn master_detail_cascades_through_the_form() -> Result<()> {
    let db = shop()?;
    seed_orders(&db)?;
    for (id, order, item) in [(1, 1, "m6"), (2, 1, "m8"), (3, 3, "flat")] {
        db.insert(
            "order_lines",
            vec![
                Value::Integer(id),
                Value::Integer(order),
                Value::from(item),
                Value::Integer(0),
            ],
        )?;
    }
    db.create_sequence("order_lines_id_seq", 10);

    let lines: Shared<RelatedRecordModel<MemoryStore>> = shared(RelatedRecordModel::new(
        RecordModel::open(
            &db,
            ModelConfig::new("order_lines").with_sequence("order_lines_id_seq"),
        )?,
        "order_id",
    )?);
    let detail = Rc::new(RefCell::new(RecordTableView::new(
        "order_lines",
        Rc::clone(&lines),
        TableViewOptions::default(),
    )));
    let mut master = RecordTableView::new(
        "orders",
        shared(orders(&db)?),
        TableViewOptions {
            inline_form: true,
            ..TableViewOptions::default()
        },
    )
    .with_form(|model| RecordFormView::new(model, &["name", "active"]))?;
    if let Some(form) = master.form_mut() {
        form.add_subview(detail.clone());
    }

    let items = || -> Vec<Value> {
        detail
            .borrow()
            .table()
            .proxy()
            .visible_records()
            .iter()
            .map(|record| record.value("item").clone())
            .collect()
    };

    master.select_row(0)?;
    assert_eq!(items(), vec![Value::from("m6"), Value::from("m8")]);
    master.select_row(1)?;
    assert!(items().is_empty());
    master.select_row(2)?;
    assert_eq!(items(), vec![Value::from("flat")]);

    let row = detail.borrow_mut().new_record()?;
    let record = lines.borrow().record(row);
    assert_eq!(
        record.map(|record| record.value("order_id").clone()),
        Some(Value::Integer(3))
    );
    Ok(())
}

#[test]
fn handlers_bind_by_name_and_missing_children_only_warn() -> Result<()> {
    let db = shop()?;
    let model = shared(orders(&db)?);

    let host = Widget::new().with_child("saveButton", Widget::new().with_signal("click"));
    let target = Rc::clone(&model);
    let connector = EventConnector::new()
        .handler("saveButton__click__event", move |_| {
            let _ = target
                .borrow_mut()
                .add_record(&[("name", Value::from("from click"))]);
        })
        .handler("cancelButton__click__event", |_| {});

    let report = connector.connect(&host);
    assert_eq!(report.connected.len(), 1);
    assert_eq!(report.warnings.len(), 1);

    let button = host
        .child_widget("saveButton")
        .ok_or_else(|| anyhow::anyhow!("saveButton"))?;
    assert!(button.emit("click", &EventPayload::None));
    assert_eq!(model.borrow().row_count(), 1);
    Ok(())
}

struct Totals {
    rows: Vec<(i64, i64)>,
}

impl ScalarExecutor for Totals {
    fn query_scalar(&self, _sql: &str, parameters: &[Value]) -> Result<Option<Value>, StoreError> {
        let order = parameters.first().and_then(Value::as_i64);
        let matching = self
            .rows
            .iter()
            .filter(|(candidate, _)| Some(*candidate) == order)
            .map(|(_, amount)| *amount)
            .collect::<Vec<_>>();
        Ok((!matching.is_empty()).then(|| Value::Integer(matching.iter().sum())))
    }
}

#[test]
fn scalar_queries_report_missing_arguments_and_default_to_zero() -> Result<()> {
    let totals = Totals {
        rows: vec![(1, 250), (1, 100), (2, 75)],
    };
    let query = ScalarQuery::new(
        "SELECT sum(amount) FROM order_lines WHERE order_id = ?",
        ["order_id"],
    );

    assert_eq!(
        query.calculate(&totals, &[]),
        Err(BindError::MissingArgument(vec!["order_id".to_owned()]))
    );
    assert_eq!(
        query.calculate(&totals, &[("order_id", Value::Integer(1))])?,
        Value::Integer(350)
    );
    assert_eq!(
        query.calculate(&totals, &[("order_id", Value::Integer(9))])?,
        Value::Integer(0)
    );
    Ok(())
}
