// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::{BooleanFilterDecl, Config, ModelDecl};
use anyhow::{Context, Result, anyhow, bail};
use rowbind_app::{
    BooleanFilterSpec, BooleanFilterToolbar, DetailView, EditableModel, Field, FilterSpec,
    RecordFormView, RecordModel, RecordStore, RecordTableView, RelatedRecordModel, TableSource,
    TableViewOptions, shared,
};
use rowbind_db::Database;
use rowbind_testkit::{OrderFaker, SCHEMA, SEQUENCES, seed};
use rowbind_tui::{Browser, TablePane, TableSnapshot};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};

pub const DEMO_SEED: u64 = 42;
pub const DEMO_CUSTOMERS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw {
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            other => bail!("unknown export format {other:?}; use json or text"),
        }
    }
}

/// In-memory SQLite database with the order fixtures seeded.
pub fn open_demo_database() -> Result<Database> {
    let db = Database::open_memory()?;
    db.execute_batch(SCHEMA).context("create demo schema")?;
    let counts = seed(
        db.raw_connection(),
        &mut OrderFaker::new(DEMO_SEED),
        DEMO_CUSTOMERS,
    )?;
    for (table, sequence) in SEQUENCES {
        db.create_sequence_after(sequence, table, "id")?;
    }
    info!(?counts, "demo database seeded");
    Ok(db)
}

/// `--table`, then the first declared model, then the first table on disk.
pub fn resolve_table(db: &Database, config: &Config, requested: Option<&str>) -> Result<String> {
    if let Some(table) = requested {
        return Ok(table.to_owned());
    }
    if let Some(table) = config.first_table() {
        return Ok(table.to_owned());
    }
    db.table_names()?.into_iter().next().ok_or_else(|| {
        anyhow!("database has no tables; create one or run with --demo to browse sample data")
    })
}

/// Opens every declared model and subview so configuration mistakes show up
/// before the browser starts.
pub fn check_models<T>(source: &T, config: &Config) -> Result<()>
where
    T: TableSource,
    T::Store: 'static,
{
    for decl in &config.models {
        build_browser(source, decl)?;
        debug!(table = decl.table(), "model checked");
    }
    Ok(())
}

/// Columns a new record cannot be saved without that a declared
/// `form_fields` list leaves out. Auto-populated ids are exempt.
pub fn required_columns_outside_form(db: &Database, config: &Config) -> Result<Vec<String>> {
    let mut problems = Vec::new();
    for decl in config.models.iter().filter(|decl| !decl.form_fields.is_empty()) {
        let table = decl.table();
        for column in db.table_columns(table)? {
            let auto_id = decl.model.auto_populate_id && column.name == decl.model.id_field_name;
            if column.is_required() && !auto_id && !decl.form_fields.contains(&column.name) {
                let problem = format!(
                    "{table}.{} is NOT NULL without a default but missing from form_fields; new records will not save",
                    column.name
                );
                warn!("{problem}");
                problems.push(problem);
            }
        }
    }
    Ok(problems)
}

pub fn build_browser<T>(source: &T, decl: &ModelDecl) -> Result<Browser<RecordModel<T::Store>>>
where
    T: TableSource,
    T::Store: 'static,
{
    let table = decl.table().to_owned();
    let mut model = RecordModel::open(source, decl.model.clone())
        .with_context(|| format!("open model for table {table}"))?;
    apply_boolean_fields(&mut model, &decl.boolean_fields)?;
    for relation in &decl.relations {
        let column = model.field_index(&relation.column)?;
        model
            .set_relation(
                column,
                &relation.table,
                &relation.id_field,
                &relation.display_field,
            )
            .with_context(|| {
                format!(
                    "relate {table}.{} to {}.{}",
                    relation.column, relation.table, relation.display_field
                )
            })?;
    }

    let details = decl
        .subviews
        .iter()
        .map(|subview| {
            let mut child = RecordModel::open(source, subview.model.clone()).with_context(|| {
                format!("open subview {} of {table}", subview.model.table)
            })?;
            apply_boolean_fields(&mut child, &subview.boolean_fields)?;
            let related = RelatedRecordModel::new(child, &subview.related_id_field)?;
            Ok(Rc::new(RefCell::new(RecordTableView::new(
                subview.model.table.clone(),
                shared(related),
                TableViewOptions::default(),
            ))))
        })
        .collect::<Result<Vec<_>>>()?;

    // Subviews follow the inline form's current row.
    let mut options = decl.view.clone();
    if !details.is_empty() {
        options.inline_form = true;
    }

    let subviews = details
        .iter()
        .map(|detail| Rc::clone(detail) as Rc<RefCell<dyn DetailView>>)
        .collect::<Vec<_>>();
    let form_fields = decl.form_fields.clone();
    let view = RecordTableView::new(table, shared(model), options)
        .with_form(move |model| {
            let mut form = if form_fields.is_empty() {
                RecordFormView::for_all_fields(model)?
            } else {
                let names = form_fields.iter().map(String::as_str).collect::<Vec<_>>();
                RecordFormView::new(model, &names)?
            };
            for subview in &subviews {
                form.add_subview(Rc::clone(subview));
            }
            Ok(form)
        })?
        .with_filter_fields(
            decl.filter_fields
                .iter()
                .map(|field| FilterSpec::plain(field.clone()))
                .collect(),
        )?;

    let checkboxes = BooleanFilterToolbar::new(
        Rc::clone(view.table().proxy()),
        decl.boolean_filters.iter().map(boolean_filter_spec).collect(),
    );
    let mut browser = Browser::new(view).with_checkboxes(checkboxes);
    if let Some(detail) = details.first() {
        let pane: Rc<RefCell<dyn TablePane>> = detail.clone();
        browser = browser.with_detail(pane);
    }
    Ok(browser)
}

fn apply_boolean_fields<S: RecordStore>(
    model: &mut RecordModel<S>,
    names: &[String],
) -> Result<()> {
    for name in names {
        let field = model.field(name).map(Field::boolean_icon).ok_or_else(|| {
            anyhow!(
                "boolean field {name} is not a column of {}",
                model.table_name()
            )
        })?;
        model.replace_field(field)?;
    }
    Ok(())
}

fn boolean_filter_spec(decl: &BooleanFilterDecl) -> BooleanFilterSpec {
    let spec = BooleanFilterSpec::new(decl.field.clone()).with_default(decl.default);
    match &decl.caption {
        Some(caption) => spec.with_caption(caption.clone()),
        None => spec,
    }
}

pub fn apply_filter<M: EditableModel>(browser: &mut Browser<M>, text: &str) -> Result<()> {
    let name = DetailView::name(browser.view()).to_owned();
    let toolbar = browser.view_mut().filter_toolbar_mut().ok_or_else(|| {
        anyhow!("table {name} declares no filter_fields; add some to its [[models]] entry to use --filter")
    })?;
    toolbar.set_text(text);
    Ok(())
}

/// Visible rows as JSON objects keyed by column name.
pub fn export_json<M: EditableModel>(browser: &Browser<M>) -> Result<String> {
    let records = browser.view().table().proxy().visible_records();
    serde_json::to_string_pretty(&records).context("encode rows as JSON")
}

/// Visible rows as display text in aligned columns.
pub fn export_text(snapshot: &TableSnapshot) -> String {
    let mut widths = snapshot
        .headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();
    for row in &snapshot.rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.text.chars().count());
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}", width = *width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_owned()
    };

    let mut out = line(snapshot.headers.iter().map(String::as_str).collect());
    out.push('\n');
    for row in &snapshot.rows {
        out.push_str(&line(row.iter().map(|cell| cell.text.as_str()).collect()));
        out.push('\n');
    }
    out
}
