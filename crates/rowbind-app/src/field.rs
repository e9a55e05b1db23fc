// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt;
use std::rc::Rc;

use crate::{Color, Icon, ItemFlags, Record, Value};

pub const DEFAULT_TRUE_ICON: &str = ":record/tick";
pub const DEFAULT_FALSE_ICON: &str = ":record/cross";

/// Computes a field's value for a row that is being created.
pub type AutoPopulate = Rc<dyn Fn(&Record) -> Value>;

/// Returns `false` when a value must not be saved.
pub type Validation = Rc<dyn Fn(&Value) -> bool>;

/// Rendering policy for a custom field. Every method receives the cell's
/// value and the whole row, and must not have side effects.
pub trait CellRenderer {
    fn display(&self, value: &Value, _record: &Record) -> Option<Value> {
        Some(value.clone())
    }

    fn text_color(&self, _value: &Value, _record: &Record) -> Option<Color> {
        None
    }

    fn background_color(&self, _value: &Value, _record: &Record) -> Option<Color> {
        None
    }

    fn decoration(&self, _value: &Value, _record: &Record) -> Option<Icon> {
        None
    }

    fn flags(&self, _value: &Value, _record: &Record) -> ItemFlags {
        ItemFlags::editable()
    }
}

#[derive(Clone)]
pub enum FieldKind {
    Plain,
    BooleanIcon { true_icon: Icon, false_icon: Icon },
    Custom(Rc<dyn CellRenderer>),
}

impl FieldKind {
    pub fn boolean_icon() -> Self {
        Self::BooleanIcon {
            true_icon: Icon::new(DEFAULT_TRUE_ICON),
            false_icon: Icon::new(DEFAULT_FALSE_ICON),
        }
    }
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => f.write_str("Plain"),
            Self::BooleanIcon {
                true_icon,
                false_icon,
            } => f
                .debug_struct("BooleanIcon")
                .field("true_icon", true_icon)
                .field("false_icon", false_icon)
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Display, formatting and interaction policy for one column.
#[derive(Clone)]
pub struct Field {
    name: String,
    index: usize,
    pub header: String,
    pub header_icon: Option<Icon>,
    pub icon: Option<Icon>,
    pub validation: Option<Validation>,
    pub auto_populate: Option<AutoPopulate>,
    pub kind: FieldKind,
}

impl Field {
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        let name = name.into();
        let header = derive_header(&name);
        Self {
            name,
            index,
            header,
            header_icon: None,
            icon: None,
            validation: None,
            auto_populate: None,
            kind: FieldKind::Plain,
        }
    }

    /// Boolean field standing in for `parent`, with the default tick/cross icons.
    pub fn boolean_icon(parent: &Field) -> Self {
        Self::new(parent.name.clone(), parent.index).with_kind(FieldKind::boolean_icon())
    }

    pub fn boolean_icon_with(parent: &Field, true_icon: Icon, false_icon: Icon) -> Self {
        Self::new(parent.name.clone(), parent.index).with_kind(FieldKind::BooleanIcon {
            true_icon,
            false_icon,
        })
    }

    pub fn custom(parent: &Field, renderer: impl CellRenderer + 'static) -> Self {
        Self::new(parent.name.clone(), parent.index).with_kind(FieldKind::Custom(Rc::new(renderer)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn index(&self) -> usize {
        self.index
    }

    pub fn with_kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_header_icon(mut self, icon: Icon) -> Self {
        self.header_icon = Some(icon);
        self
    }

    pub fn with_icon(mut self, icon: Icon) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn with_validation<F>(mut self, validation: F) -> Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        self.validation = Some(Rc::new(validation));
        self
    }

    pub fn with_auto_populate<F>(mut self, rule: F) -> Self
    where
        F: Fn(&Record) -> Value + 'static,
    {
        self.auto_populate = Some(Rc::new(rule));
        self
    }

    pub fn display(&self, value: &Value, record: &Record) -> Option<Value> {
        match &self.kind {
            FieldKind::Plain => Some(value.clone()),
            FieldKind::BooleanIcon { .. } => None,
            FieldKind::Custom(renderer) => renderer.display(value, record),
        }
    }

    pub fn text_color(&self, value: &Value, record: &Record) -> Option<Color> {
        match &self.kind {
            FieldKind::Custom(renderer) => renderer.text_color(value, record),
            _ => None,
        }
    }

    pub fn background_color(&self, value: &Value, record: &Record) -> Option<Color> {
        match &self.kind {
            FieldKind::Custom(renderer) => renderer.background_color(value, record),
            _ => None,
        }
    }

    pub fn decoration(&self, value: &Value, record: &Record) -> Option<Icon> {
        match &self.kind {
            FieldKind::Plain => self.icon.clone(),
            FieldKind::BooleanIcon {
                true_icon,
                false_icon,
            } => {
                let icon = if value.is_truthy() {
                    true_icon
                } else {
                    false_icon
                };
                Some(icon.clone())
            }
            FieldKind::Custom(renderer) => renderer
                .decoration(value, record)
                .or_else(|| self.icon.clone()),
        }
    }

    pub fn flags(&self, value: &Value, record: &Record) -> ItemFlags {
        match &self.kind {
            FieldKind::Custom(renderer) => renderer.flags(value, record),
            _ => ItemFlags::editable(),
        }
    }

    /// Runs the validation predicate; fields without one accept everything.
    pub fn validate(&self, value: &Value) -> bool {
        self.validation
            .as_ref()
            .is_none_or(|validation| validation(value))
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("index", &self.index)
            .field("header", &self.header)
            .field("kind", &self.kind)
            .field("validation", &self.validation.is_some())
            .field("auto_populate", &self.auto_populate.is_some())
            .finish()
    }
}

/// `order_total` -> `Order Total`.
pub fn derive_header(name: &str) -> String {
    name.split('_')
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn title_case(part: &str) -> String {
    let mut chars = part.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
