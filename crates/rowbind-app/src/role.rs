// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{Color, Icon, Value};

/// What a surface is asking for when it queries a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellRole {
    Display,
    Edit,
    Foreground,
    Background,
    Decoration,
    ToolTip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    pub const fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Answer to a role query. `None` means "use the surface default".
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellData {
    #[default]
    None,
    Value(Value),
    Color(Color),
    Icon(Icon),
}

impl CellData {
    pub const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Self::Color(color) => Some(*color),
            _ => None,
        }
    }

    pub fn as_icon(&self) -> Option<&Icon> {
        match self {
            Self::Icon(icon) => Some(icon),
            _ => None,
        }
    }

    /// Text a surface would draw for this answer; empty for non-values.
    pub fn display_text(&self) -> String {
        self.as_value().map(Value::to_string).unwrap_or_default()
    }
}

impl From<Option<Value>> for CellData {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::None, Self::Value)
    }
}

impl From<Option<Color>> for CellData {
    fn from(color: Option<Color>) -> Self {
        color.map_or(Self::None, Self::Color)
    }
}

impl From<Option<Icon>> for CellData {
    fn from(icon: Option<Icon>) -> Self {
        icon.map_or(Self::None, Self::Icon)
    }
}

/// Interaction capabilities of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemFlags {
    pub selectable: bool,
    pub enabled: bool,
    pub editable: bool,
}

impl ItemFlags {
    /// Selectable, enabled and editable: what every plain field reports.
    pub const fn editable() -> Self {
        Self {
            selectable: true,
            enabled: true,
            editable: true,
        }
    }

    pub const fn read_only() -> Self {
        Self {
            selectable: true,
            enabled: true,
            editable: false,
        }
    }

    pub const fn disabled() -> Self {
        Self {
            selectable: false,
            enabled: false,
            editable: false,
        }
    }

    pub const fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }
}
