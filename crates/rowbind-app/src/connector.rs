// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Name-driven wiring of handlers to signals.
//!
//! A handler declared as `save_button__click__event` is connected to the
//! `click` signal of the `save_button` child. Path segments walk nested
//! children; a handler named `<event>__event` binds to the host itself.
//! Event names are tried in camel case first (`double_clicked` ->
//! `doubleClicked`), then verbatim.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::field::title_case;
use crate::{ConnectionId, Signal, Value};

const HANDLER_SUFFIX: &str = "__event";
const IGNORED_PREFIX: &str = "_x_";

/// Argument carried by a presentation signal.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EventPayload {
    #[default]
    None,
    Bool(bool),
    Row(usize),
    Text(String),
    Value(Value),
}

/// Anything that exposes named signals and named children.
pub trait SignalHost {
    fn child(&self, name: &str) -> Option<&dyn SignalHost>;

    fn signal(&self, name: &str) -> Option<&Signal<EventPayload>>;
}

/// A plain tree of named signals, enough to stand in for a widget
/// hierarchy.
#[derive(Debug, Default)]
pub struct Widget {
    signals: BTreeMap<String, Signal<EventPayload>>,
    children: BTreeMap<String, Widget>,
}

impl Widget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signal(mut self, name: &str) -> Self {
        self.signals.insert(name.to_owned(), Signal::new());
        self
    }

    pub fn with_child(mut self, name: &str, child: Widget) -> Self {
        self.children.insert(name.to_owned(), child);
        self
    }

    pub fn child_widget(&self, name: &str) -> Option<&Widget> {
        self.children.get(name)
    }

    /// Emits `name` with `payload`; returns `false` for unknown signals.
    pub fn emit(&self, name: &str, payload: &EventPayload) -> bool {
        match self.signals.get(name) {
            Some(signal) => {
                signal.emit(payload);
                true
            }
            None => false,
        }
    }
}

impl SignalHost for Widget {
    fn child(&self, name: &str) -> Option<&dyn SignalHost> {
        self.children
            .get(name)
            .map(|child| child as &dyn SignalHost)
    }

    fn signal(&self, name: &str) -> Option<&Signal<EventPayload>> {
        self.signals.get(name)
    }
}

pub type Handler = Rc<dyn Fn(&EventPayload)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub handler: String,
    pub path: Vec<String>,
    pub signal: String,
    pub connection: ConnectionId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WiringWarning {
    #[error("event handler name {handler} is malformed")]
    MalformedName { handler: String },
    #[error("event connector attribute not found - {segment} of {handler}")]
    MissingPath { handler: String, segment: String },
    #[error("event connector signal not found for {handler}, tried {}", tried.join(", "))]
    MissingSignal { handler: String, tried: Vec<String> },
}

/// Outcome of one wiring pass. Warnings never abort the pass.
#[derive(Debug, Default)]
pub struct WiringReport {
    pub connected: Vec<Binding>,
    pub ignored: Vec<String>,
    pub warnings: Vec<WiringWarning>,
}

impl WiringReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Declared handler table, wired once against a [`SignalHost`].
#[derive(Default)]
pub struct EventConnector {
    handlers: Vec<(String, Handler)>,
}

impl EventConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handler<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&EventPayload) + 'static,
    {
        self.handlers.push((name.to_owned(), Rc::new(handler)));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn connect(&self, host: &dyn SignalHost) -> WiringReport {
        let mut report = WiringReport::default();
        for (name, handler) in &self.handlers {
            if !name.ends_with(HANDLER_SUFFIX) || name.starts_with(IGNORED_PREFIX) {
                report.ignored.push(name.clone());
                continue;
            }
            match wire(host, name, handler) {
                Ok(binding) => {
                    debug!(handler = %name, signal = %binding.signal, "connected event");
                    report.connected.push(binding);
                }
                Err(warning) => {
                    warn!("{warning}");
                    report.warnings.push(warning);
                }
            }
        }
        report
    }
}

impl fmt::Debug for EventConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|(name, _)| name))
            .finish()
    }
}

fn wire(host: &dyn SignalHost, name: &str, handler: &Handler) -> Result<Binding, WiringWarning> {
    let malformed = || WiringWarning::MalformedName {
        handler: name.to_owned(),
    };
    let stem = name.strip_suffix(HANDLER_SUFFIX).ok_or_else(malformed)?;
    let mut parts = stem.split("__").collect::<Vec<_>>();
    let event = parts.pop().filter(|event| !event.is_empty()).ok_or_else(malformed)?;
    if parts.iter().any(|segment| segment.is_empty()) {
        return Err(malformed());
    }

    let mut target = host;
    for segment in &parts {
        target = target
            .child(segment)
            .ok_or_else(|| WiringWarning::MissingPath {
                handler: name.to_owned(),
                segment: (*segment).to_owned(),
            })?;
    }

    let camel = camel_case(event);
    let (signal_name, signal) = match target.signal(&camel) {
        Some(signal) => (camel, signal),
        None => match target.signal(event) {
            Some(signal) => (event.to_owned(), signal),
            None => {
                let mut tried = vec![camel];
                if event != tried[0] {
                    tried.push(event.to_owned());
                }
                return Err(WiringWarning::MissingSignal {
                    handler: name.to_owned(),
                    tried,
                });
            }
        },
    };

    let handler = Rc::clone(handler);
    let connection = signal.connect(move |payload| handler(payload));
    Ok(Binding {
        handler: name.to_owned(),
        path: parts.into_iter().map(str::to_owned).collect(),
        signal: signal_name,
        connection,
    })
}

/// `double_clicked` -> `doubleClicked`.
pub fn camel_case(event: &str) -> String {
    let pascal = event.split('_').map(title_case).collect::<String>();
    let mut chars = pascal.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{EventConnector, EventPayload, Widget, WiringWarning, camel_case};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn window() -> Widget {
        Widget::new()
            .with_signal("closed")
            .with_child("saveButton", Widget::new().with_signal("click"))
            .with_child(
                "table",
                Widget::new()
                    .with_signal("doubleClicked")
                    .with_child("header", Widget::new().with_signal("sectionMoved")),
            )
            .with_child("search", Widget::new().with_signal("textChanged"))
    }

    #[test]
    fn camel_cases_event_names() {
        assert_eq!(camel_case("click"), "click");
        assert_eq!(camel_case("double_clicked"), "doubleClicked");
        assert_eq!(camel_case("section_moved"), "sectionMoved");
        assert_eq!(camel_case("textChanged"), "textchanged");
    }

    #[test]
    fn handler_binds_to_child_signal() {
        let window = window();
        let clicks = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&clicks);
        let report = EventConnector::new()
            .handler("saveButton__click__event", move |_| *counter.borrow_mut() += 1)
            .connect(&window);

        assert!(report.is_clean());
        assert_eq!(report.connected.len(), 1);
        assert_eq!(report.connected[0].path, vec!["saveButton".to_owned()]);

        let button = window.child_widget("saveButton").expect("button exists");
        assert!(button.emit("click", &EventPayload::None));
        assert_eq!(*clicks.borrow(), 1);
    }

    #[test]
    fn missing_child_is_skipped_with_warning() {
        let window = Widget::new().with_signal("closed");
        let report = EventConnector::new()
            .handler("saveButton__click__event", |_| {})
            .handler("closed__event", |_| {})
            .connect(&window);

        assert_eq!(report.connected.len(), 1);
        assert_eq!(
            report.warnings,
            vec![WiringWarning::MissingPath {
                handler: "saveButton__click__event".to_owned(),
                segment: "saveButton".to_owned(),
            }]
        );
    }

    #[test]
    fn nested_paths_and_raw_name_fallback() {
        let window = window();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let moved = Rc::clone(&seen);
        let typed = Rc::clone(&seen);
        let report = EventConnector::new()
            .handler("table__header__section_moved__event", move |payload| {
                moved.borrow_mut().push(payload.clone());
            })
            .handler("search__textChanged__event", move |payload| {
                typed.borrow_mut().push(payload.clone());
            })
            .connect(&window);

        assert!(report.is_clean());
        assert_eq!(report.connected[1].signal, "textChanged");

        let table = window.child_widget("table").expect("table exists");
        table
            .child_widget("header")
            .expect("header exists")
            .emit("sectionMoved", &EventPayload::Row(2));
        window
            .child_widget("search")
            .expect("search exists")
            .emit("textChanged", &EventPayload::Text("bolt".to_owned()));
        assert_eq!(
            *seen.borrow(),
            vec![EventPayload::Row(2), EventPayload::Text("bolt".to_owned())]
        );
    }

    #[test]
    fn unknown_signal_reports_both_names() {
        let report = EventConnector::new()
            .handler("table__row_dropped__event", |_| {})
            .connect(&window());
        assert_eq!(
            report.warnings,
            vec![WiringWarning::MissingSignal {
                handler: "table__row_dropped__event".to_owned(),
                tried: vec!["rowDropped".to_owned(), "row_dropped".to_owned()],
            }]
        );
    }

    #[test]
    fn ignored_and_malformed_names() {
        let report = EventConnector::new()
            .handler("_x_saveButton__click__event", |_| {})
            .handler("refresh", |_| {})
            .handler("saveButton____event", |_| {})
            .handler("__click__event", |_| {})
            .connect(&window());
        assert!(report.connected.is_empty());
        assert_eq!(report.ignored.len(), 2);
        assert_eq!(report.warnings.len(), 2);
        assert!(
            report
                .warnings
                .iter()
                .all(|warning| matches!(warning, WiringWarning::MalformedName { .. }))
        );
    }
}
