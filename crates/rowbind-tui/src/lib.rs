// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode};
use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table};
use rowbind_app::{
    BooleanFilterToolbar, CellData, CellRole, DEFAULT_FALSE_ICON, DEFAULT_TRUE_ICON, DetailView,
    EditableModel, Orientation, RecordTableView, SaveOutcome, SortOrder, TableModel, TableView,
    Value, derive_header,
};
use std::cell::RefCell;
use std::io;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

const MAX_COLUMN_WIDTH: usize = 40;

/// One drawn cell: the display text plus the colors the field asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotCell {
    pub text: String,
    pub foreground: Option<rowbind_app::Color>,
    pub background: Option<rowbind_app::Color>,
}

/// Everything needed to draw a bound table, read through its proxy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSnapshot {
    pub title: String,
    pub headers: Vec<String>,
    pub row_labels: Vec<String>,
    pub rows: Vec<Vec<SnapshotCell>>,
    pub widths: Vec<Option<u16>>,
    pub selected: Vec<usize>,
    /// Sorted column as a position in `headers`.
    pub sort: Option<(usize, SortOrder)>,
}

impl TableSnapshot {
    pub fn column_text(&self, header: &str) -> Vec<&str> {
        let Some(column) = self.headers.iter().position(|candidate| candidate == header) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.get(column))
            .map(|cell| cell.text.as_str())
            .collect()
    }
}

/// Visible rows and columns of `view`, in visual column order.
pub fn snapshot<M: TableModel>(title: &str, view: &TableView<M>) -> TableSnapshot {
    let proxy = view.proxy();
    let columns = view.visible_columns();
    let row_count = proxy.row_count();

    let mut row_labels = Vec::with_capacity(row_count);
    let mut rows = Vec::with_capacity(row_count);
    for row in 0..row_count {
        row_labels.push(
            proxy
                .header_data(row, Orientation::Vertical, CellRole::Display)
                .display_text(),
        );
        rows.push(
            columns
                .iter()
                .map(|column| snapshot_cell(&**proxy, row, *column))
                .collect(),
        );
    }

    let selected = view
        .selected_rows()
        .into_iter()
        .filter_map(|row| proxy.map_from_source(row))
        .collect();
    let sort = view.sort_indicator().and_then(|(column, order)| {
        columns
            .iter()
            .position(|candidate| *candidate == column)
            .map(|position| (position, order))
    });

    TableSnapshot {
        title: title.to_owned(),
        headers: columns
            .iter()
            .map(|column| view.header_text(*column))
            .collect(),
        row_labels,
        rows,
        widths: columns
            .iter()
            .map(|column| view.column_width(*column))
            .collect(),
        selected,
        sort,
    }
}

fn snapshot_cell<T: TableModel + ?Sized>(model: &T, row: usize, column: usize) -> SnapshotCell {
    let mut text = model.data(row, column, CellRole::Display).display_text();
    if let CellData::Icon(icon) = model.data(row, column, CellRole::Decoration) {
        let glyph = icon_glyph(icon.resource());
        text = if text.is_empty() {
            glyph
        } else {
            format!("{glyph} {text}")
        };
    }
    SnapshotCell {
        text,
        foreground: model.data(row, column, CellRole::Foreground).as_color(),
        background: model.data(row, column, CellRole::Background).as_color(),
    }
}

/// Terminal stand-in for an icon resource.
pub fn icon_glyph(resource: &str) -> String {
    match resource {
        DEFAULT_TRUE_ICON => "✓".to_owned(),
        DEFAULT_FALSE_ICON => "✗".to_owned(),
        other => {
            let name = other.rsplit('/').next().unwrap_or(other);
            format!("[{}]", name.trim_start_matches(':'))
        }
    }
}

/// A table that can be drawn beside the browsed one.
pub trait TablePane {
    fn snapshot(&self) -> TableSnapshot;
}

impl<M: EditableModel> TablePane for RecordTableView<M> {
    fn snapshot(&self) -> TableSnapshot {
        snapshot(DetailView::name(self), self.table())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowseMode {
    #[default]
    Nav,
    Filter,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseCommand {
    MoveRow(isize),
    FirstRow,
    LastRow,
    MoveColumn(isize),
    HideColumn,
    ShowColumns,
    SortColumn,
    StartFilter,
    ToggleCheckbox,
    NextCheckbox,
    NewRecord,
    DeleteSelected,
    Refresh,
    Activate,
    Quit,
}

pub fn browse_command_for_key(key: KeyEvent) -> Option<BrowseCommand> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
            Some(BrowseCommand::MoveRow(1))
        }
        (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
            Some(BrowseCommand::MoveRow(-1))
        }
        (KeyCode::Char('d'), KeyModifiers::CONTROL) | (KeyCode::PageDown, _) => {
            Some(BrowseCommand::MoveRow(10))
        }
        (KeyCode::Char('u'), KeyModifiers::CONTROL) | (KeyCode::PageUp, _) => {
            Some(BrowseCommand::MoveRow(-10))
        }
        (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
            Some(BrowseCommand::FirstRow)
        }
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(BrowseCommand::LastRow),
        (KeyCode::Char('l'), KeyModifiers::NONE) | (KeyCode::Right, _) => {
            Some(BrowseCommand::MoveColumn(1))
        }
        (KeyCode::Char('h'), KeyModifiers::NONE) | (KeyCode::Left, _) => {
            Some(BrowseCommand::MoveColumn(-1))
        }
        (KeyCode::Char('c'), KeyModifiers::NONE) => Some(BrowseCommand::HideColumn),
        (KeyCode::Char('C'), _) => Some(BrowseCommand::ShowColumns),
        (KeyCode::Char('s'), KeyModifiers::NONE) => Some(BrowseCommand::SortColumn),
        (KeyCode::Char('/'), _) => Some(BrowseCommand::StartFilter),
        (KeyCode::Char('t'), KeyModifiers::NONE) => Some(BrowseCommand::ToggleCheckbox),
        (KeyCode::Char('T'), _) => Some(BrowseCommand::NextCheckbox),
        (KeyCode::Char('n'), KeyModifiers::NONE) => Some(BrowseCommand::NewRecord),
        (KeyCode::Char('d'), KeyModifiers::NONE) => Some(BrowseCommand::DeleteSelected),
        (KeyCode::Char('r'), KeyModifiers::NONE) => Some(BrowseCommand::Refresh),
        (KeyCode::Enter, _) => Some(BrowseCommand::Activate),
        (KeyCode::Char('q'), KeyModifiers::NONE)
        | (KeyCode::Esc, _)
        | (KeyCode::Char('c'), KeyModifiers::CONTROL) => Some(BrowseCommand::Quit),
        _ => None,
    }
}

/// Turns typed editor text into a value. Text editors stay text; other
/// editors take integers and reals when the input parses as one.
pub fn parse_input(input: &str, current: &Value) -> Value {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if matches!(current, Value::Text(_)) {
        return Value::Text(input.to_owned());
    }
    if let Ok(integer) = trimmed.parse::<i64>() {
        return Value::Integer(integer);
    }
    if let Ok(real) = trimmed.parse::<f64>() {
        return Value::Real(real);
    }
    Value::Text(input.to_owned())
}

/// Interactive state around one [`RecordTableView`]: cursor, mode, the
/// form editor buffer and the status line.
pub struct Browser<M: EditableModel> {
    view: RecordTableView<M>,
    detail: Option<Rc<RefCell<dyn TablePane>>>,
    checkboxes: Option<BooleanFilterToolbar<M>>,
    checkbox: usize,
    mode: BrowseMode,
    column: usize,
    input: String,
    status: Option<String>,
}

impl<M: EditableModel> Browser<M> {
    pub fn new(view: RecordTableView<M>) -> Self {
        Self {
            view,
            detail: None,
            checkboxes: None,
            checkbox: 0,
            mode: BrowseMode::Nav,
            column: 0,
            input: String::new(),
            status: None,
        }
    }

    /// Draws `pane` under the browsed table; wiring it to follow the
    /// selection is the caller's job.
    pub fn with_detail(mut self, pane: Rc<RefCell<dyn TablePane>>) -> Self {
        self.detail = Some(pane);
        self
    }

    pub fn with_checkboxes(mut self, toolbar: BooleanFilterToolbar<M>) -> Self {
        if !toolbar.checkboxes().is_empty() {
            self.checkboxes = Some(toolbar);
        }
        self
    }

    pub fn view(&self) -> &RecordTableView<M> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut RecordTableView<M> {
        &mut self.view
    }

    pub fn detail(&self) -> Option<&Rc<RefCell<dyn TablePane>>> {
        self.detail.as_ref()
    }

    pub fn checkboxes(&self) -> Option<&BooleanFilterToolbar<M>> {
        self.checkboxes.as_ref()
    }

    pub fn mode(&self) -> BrowseMode {
        self.mode
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    /// Visual index of the column cursor.
    pub fn cursor_column(&self) -> usize {
        self.column
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    /// Handles one key press. Returns `true` when the browser should exit.
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        let result = match self.mode {
            BrowseMode::Nav => match browse_command_for_key(key) {
                Some(command) => self.dispatch(command),
                None => Ok(false),
            },
            BrowseMode::Filter => self.handle_filter_key(key).map(|()| false),
            BrowseMode::Form => self.handle_form_key(key).map(|()| false),
        };
        result.unwrap_or_else(|error| {
            self.status = Some(format!("{error:#}"));
            false
        })
    }

    pub fn dispatch(&mut self, command: BrowseCommand) -> Result<bool> {
        debug!(?command, "browse command");
        match command {
            BrowseCommand::MoveRow(delta) => self.move_row(delta)?,
            BrowseCommand::FirstRow => self.select_visible(0)?,
            BrowseCommand::LastRow => {
                let count = self.view.table().row_count();
                if count > 0 {
                    self.select_visible(count - 1)?;
                }
            }
            BrowseCommand::MoveColumn(delta) => {
                let count = self.view.table().visible_columns().len();
                if count > 0 {
                    self.column = self.column.saturating_add_signed(delta).min(count - 1);
                }
            }
            BrowseCommand::HideColumn => self.hide_cursor_column(),
            BrowseCommand::ShowColumns => {
                let table = self.view.table_mut();
                for column in 0..table.column_count() {
                    table.set_column_hidden(column, false);
                }
            }
            BrowseCommand::SortColumn => self.sort_cursor_column(),
            BrowseCommand::StartFilter => {
                if self.view.filter_toolbar().is_some() {
                    self.mode = BrowseMode::Filter;
                } else {
                    self.status = Some("no filter fields".to_owned());
                }
            }
            BrowseCommand::ToggleCheckbox => self.toggle_checkbox()?,
            BrowseCommand::NextCheckbox => {
                if let Some(toolbar) = &self.checkboxes {
                    self.checkbox = (self.checkbox + 1) % toolbar.checkboxes().len();
                }
            }
            BrowseCommand::NewRecord => self.new_record()?,
            BrowseCommand::DeleteSelected => {
                let removed = self.view.delete_selected_records()?;
                self.status = Some(format!("deleted {removed} record(s)"));
            }
            BrowseCommand::Refresh => {
                self.view.refresh()?;
                self.status = Some("refreshed".to_owned());
            }
            BrowseCommand::Activate => self.activate()?,
            BrowseCommand::Quit => return Ok(true),
        }
        Ok(false)
    }

    fn move_row(&mut self, delta: isize) -> Result<()> {
        let count = self.view.table().row_count();
        if count == 0 {
            return Ok(());
        }
        let target = match self.view.table().current_row() {
            Some(row) => row.saturating_add_signed(delta).min(count - 1),
            None => 0,
        };
        self.select_visible(target)
    }

    fn select_visible(&mut self, row: usize) -> Result<()> {
        self.view.select_row(row)?;
        Ok(())
    }

    fn hide_cursor_column(&mut self) {
        let visible = self.view.table().visible_columns();
        if visible.len() <= 1 {
            self.status = Some("last visible column".to_owned());
            return;
        }
        if let Some(column) = visible.get(self.column) {
            self.view.table_mut().set_column_hidden(*column, true);
            self.column = self.column.min(visible.len() - 2);
        }
    }

    /// First press sorts ascending; pressing again on the same column flips
    /// the order.
    fn sort_cursor_column(&mut self) {
        let table = self.view.table_mut();
        if !table.is_sorting_enabled() {
            self.status = Some("sorting disabled".to_owned());
            return;
        }
        let Some(column) = table.visible_columns().get(self.column).copied() else {
            return;
        };
        let order = match table.sort_indicator() {
            Some((sorted, order)) if sorted == column => order.reversed(),
            _ => SortOrder::Ascending,
        };
        table.sort_by_column(column, order);
        let direction = match order {
            SortOrder::Ascending => "ascending",
            SortOrder::Descending => "descending",
        };
        self.status = Some(format!(
            "sorted by {} {direction}",
            table.header_text(column)
        ));
    }

    fn toggle_checkbox(&mut self) -> Result<()> {
        let Some(toolbar) = self.checkboxes.as_mut() else {
            self.status = Some("no checkboxes".to_owned());
            return Ok(());
        };
        let Some(field) = toolbar
            .checkboxes()
            .get(self.checkbox)
            .map(|checkbox| checkbox.field.clone())
        else {
            return Ok(());
        };
        toolbar.toggle(&field)?;
        Ok(())
    }

    fn new_record(&mut self) -> Result<()> {
        let row = self.view.new_record()?;
        if let Some(visible) = self.view.table().proxy().map_from_source(row) {
            self.view.table_mut().select_row(visible);
        }
        self.status = Some("new record".to_owned());
        self.enter_form();
        Ok(())
    }

    fn activate(&mut self) -> Result<()> {
        let Some(row) = self.view.table().current_row() else {
            self.status = Some("no row selected".to_owned());
            return Ok(());
        };
        self.view.activate(row)?;
        self.enter_form();
        Ok(())
    }

    fn enter_form(&mut self) {
        let preferred = self.view.options().focus_form_field.clone();
        let Some(form) = self.view.form_mut() else {
            return;
        };
        if !form.is_enabled() || form.is_read_only() {
            return;
        }
        if form.focused().is_none()
            && let Some(first) = preferred
                .filter(|name| form.editor_value(name).is_some())
                .or_else(|| form.editor_names().next().map(str::to_owned))
        {
            form.focus(&first);
        }
        self.input = focused_text(form.focused(), |name| form.editor_value(name));
        self.mode = BrowseMode::Form;
    }

    fn handle_filter_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(toolbar) = self.view.filter_toolbar_mut() else {
            self.mode = BrowseMode::Nav;
            return Ok(());
        };
        match key.code {
            KeyCode::Char(ch) => {
                let mut text = toolbar.text().to_owned();
                text.push(ch);
                toolbar.set_text(&text);
            }
            KeyCode::Backspace => {
                let mut text = toolbar.text().to_owned();
                text.pop();
                toolbar.set_text(&text);
            }
            KeyCode::Tab => {
                let captions = toolbar.captions().map(str::to_owned).collect::<Vec<_>>();
                let current = captions
                    .iter()
                    .position(|caption| caption == toolbar.current_caption())
                    .unwrap_or(0);
                let next = &captions[(current + 1) % captions.len()];
                toolbar.select_caption(next)?;
            }
            KeyCode::Enter => self.mode = BrowseMode::Nav,
            KeyCode::Esc => {
                toolbar.clear();
                self.mode = BrowseMode::Nav;
            }
            _ => {}
        }
        Ok(())
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Char(ch) => self.input.push(ch),
            KeyCode::Backspace => {
                self.input.pop();
            }
            KeyCode::Tab => self.move_editor(true)?,
            KeyCode::BackTab => self.move_editor(false)?,
            KeyCode::Enter => self.save()?,
            KeyCode::Esc => self.cancel_form()?,
            _ => {}
        }
        Ok(())
    }

    fn commit_input(&mut self) -> Result<()> {
        let Some(form) = self.view.form_mut() else {
            return Ok(());
        };
        let Some(name) = form.focused().map(str::to_owned) else {
            return Ok(());
        };
        let current = form.editor_value(&name).cloned().unwrap_or_default();
        form.set_editor_value(&name, parse_input(&self.input, &current))?;
        Ok(())
    }

    fn move_editor(&mut self, forward: bool) -> Result<()> {
        self.commit_input()?;
        let Some(form) = self.view.form_mut() else {
            return Ok(());
        };
        let names = form.editor_names().map(str::to_owned).collect::<Vec<_>>();
        if names.is_empty() {
            return Ok(());
        }
        let current = form
            .focused()
            .and_then(|focused| names.iter().position(|name| name == focused))
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % names.len()
        } else {
            (current + names.len() - 1) % names.len()
        };
        form.focus(&names[next]);
        self.input = focused_text(form.focused(), |name| form.editor_value(name));
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        self.commit_input()?;
        let Some(form) = self.view.form_mut() else {
            self.mode = BrowseMode::Nav;
            return Ok(());
        };
        match form.save_record() {
            SaveOutcome::Saved => {
                self.status = Some("saved".to_owned());
                self.view.close_form();
                self.mode = BrowseMode::Nav;
            }
            SaveOutcome::Rejected(message) => {
                self.status = Some(message.replace('\n', ": "));
            }
        }
        Ok(())
    }

    fn cancel_form(&mut self) -> Result<()> {
        self.view
            .table()
            .model()
            .borrow_mut()
            .base_mut()
            .revert_all();
        self.view.close_form();
        self.view.refresh()?;
        self.mode = BrowseMode::Nav;
        self.status = Some("edit cancelled".to_owned());
        Ok(())
    }

    pub fn filter_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(toolbar) = self.view.filter_toolbar() {
            let cursor = if self.mode == BrowseMode::Filter { "_" } else { "" };
            parts.push(format!(
                "{}: {}{cursor}",
                toolbar.current_caption(),
                toolbar.text()
            ));
        }
        if let Some(toolbar) = &self.checkboxes {
            for (index, checkbox) in toolbar.checkboxes().iter().enumerate() {
                let mark = if checkbox.checked { "x" } else { " " };
                let focus = if index == self.checkbox { "*" } else { "" };
                parts.push(format!("[{mark}] {}{focus}", checkbox.caption));
            }
        }
        if parts.is_empty() {
            "no filters".to_owned()
        } else {
            parts.join("  ")
        }
    }

    pub fn status_text(&self) -> String {
        let (mode, hints) = match self.mode {
            BrowseMode::Nav => (
                "NAV",
                "j/k g/G h/l c/C s sort | / filter t/T check | n new enter edit d delete r refresh | q",
            ),
            BrowseMode::Filter => ("FILTER", "type to filter | tab field | enter done | esc clear"),
            BrowseMode::Form => ("FORM", "tab/shift+tab field | enter save | esc cancel"),
        };
        match &self.status {
            Some(status) => format!("{mode} | {status} | {hints}"),
            None => format!("{mode} | {hints}"),
        }
    }
}

impl<M: EditableModel> std::fmt::Debug for Browser<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Browser")
            .field("view", &self.view)
            .field("mode", &self.mode)
            .field("column", &self.column)
            .field("status", &self.status)
            .finish()
    }
}

fn focused_text<'a>(focused: Option<&str>, value: impl Fn(&str) -> Option<&'a Value>) -> String {
    focused
        .and_then(value)
        .map(Value::to_string)
        .unwrap_or_default()
}

pub fn run_browser<M: EditableModel>(browser: &mut Browser<M>) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut result = Ok(());
    loop {
        if let Err(error) = terminal.draw(|frame| render(frame, browser)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if browser.handle_key(key) {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

pub fn render<M: EditableModel>(frame: &mut Frame<'_>, browser: &Browser<M>) {
    let mut constraints = vec![Constraint::Length(3), Constraint::Min(3)];
    if browser.detail.is_some() {
        constraints.push(Constraint::Percentage(40));
    }
    constraints.push(Constraint::Length(2));
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    let filter = Paragraph::new(browser.filter_text())
        .block(Block::default().title("filter").borders(Borders::ALL));
    frame.render_widget(filter, chunks[0]);

    render_snapshot(frame, chunks[1], &browser.view.snapshot(), Some(browser.column));

    let mut status_chunk = 2;
    if let Some(detail) = &browser.detail {
        let snapshot = detail.borrow().snapshot();
        render_snapshot(frame, chunks[2], &snapshot, None);
        status_chunk = 3;
    }

    let status = Paragraph::new(browser.status_text()).style(Style::default().fg(Color::Yellow));
    frame.render_widget(status, chunks[status_chunk]);

    if browser.mode == BrowseMode::Form {
        render_form(frame, browser);
    }
}

fn render_snapshot(
    frame: &mut Frame<'_>,
    area: Rect,
    snapshot: &TableSnapshot,
    cursor_column: Option<usize>,
) {
    let labelled = snapshot.row_labels.iter().any(|label| !label.is_empty());

    let mut header_cells = Vec::with_capacity(snapshot.headers.len() + 1);
    if labelled {
        header_cells.push(Cell::from(""));
    }
    header_cells.extend(snapshot.headers.iter().enumerate().map(|(index, header)| {
        let mut style = Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        if cursor_column == Some(index) {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        let text = match snapshot.sort {
            Some((sorted, SortOrder::Ascending)) if sorted == index => format!("{header} ▲"),
            Some((sorted, SortOrder::Descending)) if sorted == index => format!("{header} ▼"),
            _ => header.clone(),
        };
        Cell::from(text).style(style)
    }));

    let rows = snapshot
        .rows
        .iter()
        .enumerate()
        .map(|(index, cells)| {
            let mut row_cells = Vec::with_capacity(cells.len() + 1);
            if labelled {
                row_cells.push(
                    Cell::from(snapshot.row_labels[index].clone())
                        .style(Style::default().fg(Color::DarkGray)),
                );
            }
            row_cells.extend(
                cells
                    .iter()
                    .map(|cell| Cell::from(cell.text.clone()).style(cell_style(cell))),
            );
            let row = Row::new(row_cells);
            if snapshot.selected.contains(&index) {
                row.style(Style::default().bg(Color::DarkGray))
            } else {
                row
            }
        })
        .collect::<Vec<_>>();

    let mut widths = Vec::with_capacity(snapshot.headers.len() + 1);
    if labelled {
        let label_width = snapshot
            .row_labels
            .iter()
            .map(|label| label.chars().count())
            .max()
            .unwrap_or(0);
        widths.push(Constraint::Length(label_width as u16));
    }
    widths.extend((0..snapshot.headers.len()).map(|column| {
        let width = snapshot.widths.get(column).copied().flatten().unwrap_or_else(|| {
            let content = snapshot
                .rows
                .iter()
                .filter_map(|row| row.get(column))
                .map(|cell| cell.text.chars().count())
                .max()
                .unwrap_or(0);
            let indicator = if snapshot.sort.is_some_and(|(sorted, _)| sorted == column) {
                2
            } else {
                0
            };
            content
                .max(snapshot.headers[column].chars().count() + indicator)
                .min(MAX_COLUMN_WIDTH) as u16
        });
        Constraint::Length(width)
    }));

    let title = format!("{} ({} rows)", snapshot.title, snapshot.rows.len());
    let table = Table::new(rows, widths)
        .header(Row::new(header_cells))
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn cell_style(cell: &SnapshotCell) -> Style {
    let mut style = Style::default();
    if let Some(color) = cell.foreground {
        style = style.fg(terminal_color(color));
    }
    if let Some(color) = cell.background {
        style = style.bg(terminal_color(color));
    }
    style
}

fn terminal_color(color: rowbind_app::Color) -> Color {
    Color::Rgb(color.r, color.g, color.b)
}

fn render_form<M: EditableModel>(frame: &mut Frame<'_>, browser: &Browser<M>) {
    let Some(form) = browser.view.form() else {
        return;
    };
    let focused = form.focused();
    let mut lines = Vec::new();
    for name in form.editor_names() {
        let label = derive_header(name);
        if focused == Some(name) {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("> {label}: "),
                    Style::default()
                        .fg(Color::Yellow)
                        .add_modifier(Modifier::BOLD),
                ),
                Span::raw(format!("{}_", browser.input)),
            ]));
        } else {
            let value = form
                .editor_value(name)
                .map(Value::to_string)
                .unwrap_or_default();
            lines.push(Line::from(format!("  {label}: {value}")));
        }
    }
    if let Some(name) = focused
        && let Ok(choices) = form.choices(name)
        && !choices.is_empty()
    {
        let choices = choices
            .iter()
            .map(|(id, text)| format!("{id}={text}"))
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(Line::from(""));
        lines.push(Line::styled(
            format!("choices: {choices}"),
            Style::default().fg(Color::DarkGray),
        ));
    }

    let title = if form.is_new_record() {
        "new record"
    } else {
        "edit record"
    };
    let area = centered_rect(60, 60, frame.area());
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().title(title).borders(Borders::ALL)),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
