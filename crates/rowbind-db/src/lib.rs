// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rowbind_app::{
    FilterTerm, Record, RecordStore, Relation, ScalarExecutor, StoreError, TableSource, Value,
    quote_identifier, values_equal,
};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

pub const APP_NAME: &str = "rowbind";

const SEQUENCE_TABLE: &str = "rowbind_sequences";

/// The parts of `PRAGMA table_info` the binding layer uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PragmaColumn {
    pub name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub primary_key: i32,
}

impl PragmaColumn {
    /// NOT NULL with no default: an insert must supply it.
    pub fn is_required(&self) -> bool {
        self.not_null && self.default_value.is_none() && self.primary_key == 0
    }
}

/// A SQLite database shared by every store opened from it.
#[derive(Debug, Clone)]
pub struct Database {
    conn: Rc<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        Self::configure(conn)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self> {
        configure_connection(&conn)?;
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {SEQUENCE_TABLE} (
               name TEXT PRIMARY KEY,
               next_value INTEGER NOT NULL
             )"
        ))
        .context("create sequence table")?;
        Ok(Self {
            conn: Rc::new(conn),
        })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).context("execute sql batch")
    }

    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(
                "
                SELECT name
                FROM sqlite_master
                WHERE type = 'table'
                  AND name NOT LIKE 'sqlite_%'
                  AND name <> ?1
                ORDER BY name ASC
                ",
            )
            .context("prepare table names query")?;
        let rows = stmt
            .query_map([SEQUENCE_TABLE], |row| row.get::<_, String>(0))
            .context("query table names")?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .context("collect table names")
    }

    pub fn table_columns(&self, table: &str) -> Result<Vec<PragmaColumn>> {
        table_columns(&self.conn, table)
    }

    /// Creates (or resets) a sequence whose next value is `start`.
    pub fn create_sequence(&self, name: &str, start: i64) -> Result<()> {
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {SEQUENCE_TABLE} (name, next_value) VALUES (?1, ?2)
                     ON CONFLICT(name) DO UPDATE SET next_value = excluded.next_value"
                ),
                params![name, start],
            )
            .with_context(|| format!("create sequence {name}"))?;
        Ok(())
    }

    /// Creates a sequence that continues after the largest value already
    /// stored in `table.column`. Returns the sequence's next value.
    pub fn create_sequence_after(&self, name: &str, table: &str, column: &str) -> Result<i64> {
        let start: i64 = self
            .conn
            .query_row(
                &format!(
                    "SELECT COALESCE(MAX({}), 0) + 1 FROM {}",
                    quote_identifier(column),
                    quote_identifier(table)
                ),
                [],
                |row| row.get(0),
            )
            .with_context(|| format!("read max {table}.{column}"))?;
        self.create_sequence(name, start)?;
        Ok(start)
    }

    pub fn next_sequence_value(&self, name: &str) -> Result<i64> {
        next_sequence_value(&self.conn, name)
    }

    pub fn open_store(&self, table: &str) -> Result<SqliteStore> {
        SqliteStore::open(Rc::clone(&self.conn), table)
    }
}

impl TableSource for Database {
    type Store = SqliteStore;

    fn open_table(&self, table: &str) -> Result<SqliteStore, StoreError> {
        self.open_store(table).map_err(|error| store_error(&error))
    }
}

impl ScalarExecutor for Database {
    fn query_scalar(&self, sql: &str, parameters: &[Value]) -> Result<Option<Value>, StoreError> {
        let bound = parameters.iter().map(to_sql_value).collect::<Vec<_>>();
        self.conn
            .query_row(sql, params_from_iter(bound), |row| {
                row.get_ref(0).map(from_value_ref)
            })
            .optional()
            .map_err(|error| StoreError::new(error.to_string()))
    }
}

/// Edit state of one buffered row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    Clean,
    Inserted,
    Updated,
}

#[derive(Debug, Clone)]
struct BufferedRow {
    rowid: Option<i64>,
    values: Vec<Value>,
    status: RowStatus,
}

#[derive(Debug, Clone)]
struct LoadedRelation {
    relation: Relation,
    choices: Vec<(Value, Value)>,
}

/// Manual-submit record store over one SQLite table.
///
/// Edits stay in memory until `submit_all`, which writes deletes, updates
/// and inserts in one transaction and reselects. A failed submit rolls the
/// transaction back, keeps the buffer and records the SQLite message as
/// `last_error`.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Rc<Connection>,
    table: String,
    columns: Rc<[String]>,
    rows: Vec<BufferedRow>,
    removed: Vec<i64>,
    filter: Option<FilterTerm>,
    relations: BTreeMap<usize, LoadedRelation>,
    last_error: Option<String>,
}

impl SqliteStore {
    fn open(conn: Rc<Connection>, table: &str) -> Result<Self> {
        let columns = table_columns(&conn, table)?;
        if columns.is_empty() {
            bail!("no such table: {table}");
        }
        let columns = columns
            .into_iter()
            .map(|column| column.name)
            .collect::<Vec<_>>();
        let mut store = Self {
            conn,
            table: table.to_owned(),
            columns: Rc::from(columns),
            rows: Vec::new(),
            removed: Vec::new(),
            filter: None,
            relations: BTreeMap::new(),
            last_error: None,
        };
        store.load()?;
        Ok(store)
    }

    pub fn row_status(&self, row: usize) -> Option<RowStatus> {
        self.rows.get(row).map(|buffered| buffered.status)
    }

    fn select_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!(
            "SELECT rowid, {columns} FROM {}",
            quote_identifier(&self.table)
        );
        if let Some(term) = &self.filter {
            sql.push_str(&format!(" WHERE {} = ?1", quote_identifier(&term.field)));
        }
        sql.push_str(" ORDER BY rowid");
        sql
    }

    fn load(&mut self) -> Result<()> {
        let sql = self.select_sql();
        let bound = self
            .filter
            .iter()
            .map(|term| to_sql_value(&term.value))
            .collect::<Vec<_>>();
        let rows = query_rows(&self.conn, &sql, bound, self.columns.len())
            .with_context(|| format!("select from {}", self.table))?;
        debug!(table = %self.table, rows = rows.len(), "store selected");
        self.rows = rows;
        self.removed.clear();

        for loaded in self.relations.values_mut() {
            loaded.choices = load_choices(&self.conn, &loaded.relation)?;
        }
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        let table = quote_identifier(&self.table);
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin transaction")?;

        for rowid in &self.removed {
            tx.execute(&format!("DELETE FROM {table} WHERE rowid = ?1"), params![rowid])
                .with_context(|| format!("delete from {}", self.table))?;
        }

        for row in &self.rows {
            match (row.status, row.rowid) {
                (RowStatus::Updated, Some(rowid)) => {
                    let assignments = self
                        .columns
                        .iter()
                        .enumerate()
                        .map(|(index, column)| {
                            format!("{} = ?{}", quote_identifier(column), index + 1)
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    let mut bound = row.values.iter().map(to_sql_value).collect::<Vec<_>>();
                    bound.push(SqlValue::Integer(rowid));
                    tx.execute(
                        &format!(
                            "UPDATE {table} SET {assignments} WHERE rowid = ?{}",
                            self.columns.len() + 1
                        ),
                        params_from_iter(bound),
                    )
                    .with_context(|| format!("update {}", self.table))?;
                }
                (RowStatus::Inserted, _) | (RowStatus::Updated, None) => {
                    // Null cells are left out so column defaults apply.
                    let present = row
                        .values
                        .iter()
                        .enumerate()
                        .filter(|(_, value)| !value.is_null())
                        .collect::<Vec<_>>();
                    let sql = if present.is_empty() {
                        format!("INSERT INTO {table} DEFAULT VALUES")
                    } else {
                        let names = present
                            .iter()
                            .map(|(index, _)| quote_identifier(&self.columns[*index]))
                            .collect::<Vec<_>>()
                            .join(", ");
                        let placeholders = (1..=present.len())
                            .map(|position| format!("?{position}"))
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("INSERT INTO {table} ({names}) VALUES ({placeholders})")
                    };
                    let bound = present.iter().map(|(_, value)| to_sql_value(value));
                    tx.execute(&sql, params_from_iter(bound))
                        .with_context(|| format!("insert into {}", self.table))?;
                }
                (RowStatus::Clean, _) => {}
            }
        }

        tx.commit().context("commit transaction")?;
        Ok(())
    }

    fn fail(&mut self, error: &anyhow::Error) -> StoreError {
        let error = store_error(error);
        self.last_error = Some(error.message().to_owned());
        error
    }

    fn check_row(&self, row: usize) -> Result<()> {
        if row < self.rows.len() {
            Ok(())
        } else {
            Err(anyhow!(
                "row {row} is out of range for {} ({} rows)",
                self.table,
                self.rows.len()
            ))
        }
    }
}

impl RecordStore for SqliteStore {
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
            Some(loaded) if !value.is_null() => Some(
                loaded
                    .choices
                    .iter()
                    .find(|(id, _)| values_equal(id, &value))
                    .map(|(_, display)| display.clone())
                    .unwrap_or_default(),
            ),
            _ => Some(value),
        }
    }

    fn insert_row(&mut self, row: usize) -> Result<(), StoreError> {
        if row > self.rows.len() {
            return Err(self.fail(&anyhow!("cannot insert at row {row}")));
        }
        self.rows.insert(
            row,
            BufferedRow {
                rowid: None,
                values: vec![Value::Null; self.columns.len()],
                status: RowStatus::Inserted,
            },
        );
        Ok(())
    }

    fn remove_row(&mut self, row: usize) -> Result<(), StoreError> {
        if let Err(error) = self.check_row(row) {
            return Err(self.fail(&error));
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
            return Err(self.fail(&error));
        }
        if column >= self.columns.len() {
            let error = anyhow!("no column {column} in {}", self.table);
            return Err(self.fail(&error));
        }
        let buffered = &mut self.rows[row];
        buffered.values[column] = value;
        if buffered.status == RowStatus::Clean {
            buffered.status = RowStatus::Updated;
        }
        Ok(())
    }

    fn select(&mut self) -> Result<(), StoreError> {
        match self.load() {
            Ok(()) => {
                self.last_error = None;
                Ok(())
            }
            Err(error) => Err(self.fail(&error)),
        }
    }

    fn submit_all(&mut self) -> Result<(), StoreError> {
        if let Err(error) = self.commit() {
            return Err(self.fail(&error));
        }
        debug!(table = %self.table, "store submitted");
        self.select()
    }

    fn revert_all(&mut self) {
        if let Err(error) = self.load() {
            self.fail(&error);
        }
    }

    fn has_pending_changes(&self) -> bool {
        !self.removed.is_empty() || self.rows.iter().any(|row| row.status != RowStatus::Clean)
    }

    fn set_filter(&mut self, filter: Option<FilterTerm>) {
        self.filter = filter;
    }

    fn filter(&self) -> Option<&FilterTerm> {
        self.filter.as_ref()
    }

    fn set_relation(&mut self, column: usize, relation: Relation) -> Result<(), StoreError> {
        if column >= self.columns.len() {
            let error = anyhow!("no column {column} in {}", self.table);
            return Err(self.fail(&error));
        }
        let choices = match load_choices(&self.conn, &relation) {
            Ok(choices) => choices,
            Err(error) => return Err(self.fail(&error)),
        };
        self.relations
            .insert(column, LoadedRelation { relation, choices });
        Ok(())
    }

    fn relation(&self, column: usize) -> Option<&Relation> {
        self.relations.get(&column).map(|loaded| &loaded.relation)
    }

    fn relation_choices(&self, column: usize) -> Result<Vec<(Value, Value)>, StoreError> {
        self.relations
            .get(&column)
            .map(|loaded| loaded.choices.clone())
            .ok_or_else(|| StoreError::new(format!("no relation on column {column}")))
    }

    fn next_sequence_value(&mut self, sequence: &str) -> Result<Value, StoreError> {
        match next_sequence_value(&self.conn, sequence) {
            Ok(value) => Ok(Value::Integer(value)),
            Err(error) => Err(self.fail(&error)),
        }
    }

    fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("ROWBIND_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set ROWBIND_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("rowbind.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

pub fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(value) => SqlValue::Integer(*value),
        Value::Real(value) => SqlValue::Real(*value),
        Value::Text(value) => SqlValue::Text(value.clone()),
    }
}

/// Blobs have no cell representation and come back as lossy text.
pub fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(value) => Value::Integer(value),
        ValueRef::Real(value) => Value::Real(value),
        ValueRef::Text(value) | ValueRef::Blob(value) => {
            Value::Text(String::from_utf8_lossy(value).into_owned())
        }
    }
}

fn store_error(error: &anyhow::Error) -> StoreError {
    StoreError::new(error.root_cause().to_string())
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

fn table_columns(conn: &Connection, table: &str) -> Result<Vec<PragmaColumn>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_identifier(table)))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| {
            let not_null: i32 = row.get(3)?;
            Ok(PragmaColumn {
                name: row.get(1)?,
                not_null: not_null != 0,
                default_value: row.get(4)?,
                primary_key: row.get(5)?,
            })
        })
        .with_context(|| format!("query column info for {table}"))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn query_rows(
    conn: &Connection,
    sql: &str,
    bound: Vec<SqlValue>,
    width: usize,
) -> Result<Vec<BufferedRow>> {
    let mut stmt = conn.prepare(sql).context("prepare select")?;
    let mut rows = stmt.query(params_from_iter(bound)).context("run select")?;
    let mut loaded = Vec::new();
    while let Some(row) = rows.next().context("scan selected rows")? {
        let rowid: i64 = row.get(0).context("read rowid")?;
        let values = (1..=width)
            .map(|index| row.get_ref(index).map(from_value_ref))
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("read selected row")?;
        loaded.push(BufferedRow {
            rowid: Some(rowid),
            values,
            status: RowStatus::Clean,
        });
    }
    Ok(loaded)
}

fn load_choices(conn: &Connection, relation: &Relation) -> Result<Vec<(Value, Value)>> {
    let sql = format!(
        "SELECT {id}, {display} FROM {table} ORDER BY {display}, {id}",
        id = quote_identifier(&relation.id_field),
        display = quote_identifier(&relation.display_field),
        table = quote_identifier(&relation.table),
    );
    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare relation lookup on {}", relation.table))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                from_value_ref(row.get_ref(0)?),
                from_value_ref(row.get_ref(1)?),
            ))
        })
        .with_context(|| format!("query relation lookup on {}", relation.table))?;
    rows.collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("collect relation lookup on {}", relation.table))
}

fn next_sequence_value(conn: &Connection, name: &str) -> Result<i64> {
    conn.query_row(
        &format!(
            "UPDATE {SEQUENCE_TABLE} SET next_value = next_value + 1
             WHERE name = ?1
             RETURNING next_value - 1"
        ),
        [name],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("advance sequence {name}"))?
    .ok_or_else(|| anyhow!("no such sequence: {name}"))
}
