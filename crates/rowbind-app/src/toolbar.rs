// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Headless filter toolbars driving a [`FilterProxy`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::field::derive_header;
use crate::{
    BindError, BindResult, BooleanComparator, FilterProxy, Record, StringFilter, TableModel,
};

/// Name under which the free-text matcher is installed on the proxy.
pub const TEXT_FILTER_NAME: &str = "filter";

/// One entry of the text toolbar's field selector.
#[derive(Clone)]
pub enum FilterSpec {
    /// Match the field's text; caption derived from the name.
    Plain(String),
    Custom {
        field: String,
        caption: Option<String>,
        matcher: Option<StringFilter>,
    },
}

impl FilterSpec {
    pub fn plain(field: impl Into<String>) -> Self {
        Self::Plain(field.into())
    }

    pub fn custom(field: impl Into<String>) -> Self {
        Self::Custom {
            field: field.into(),
            caption: None,
            matcher: None,
        }
    }

    /// Only meaningful on [`FilterSpec::Custom`]; plain specs are promoted.
    pub fn with_caption(self, caption: impl Into<String>) -> Self {
        let (field, matcher) = self.into_parts();
        Self::Custom {
            field,
            caption: Some(caption.into()),
            matcher,
        }
    }

    pub fn with_matcher<F>(self, matcher: F) -> Self
    where
        F: Fn(&Record, &str) -> bool + 'static,
    {
        let caption = self.caption_override();
        let (field, _) = self.into_parts();
        Self::Custom {
            field,
            caption,
            matcher: Some(Rc::new(matcher)),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Plain(field) | Self::Custom { field, .. } => field,
        }
    }

    pub fn caption(&self) -> String {
        self.caption_override()
            .unwrap_or_else(|| derive_header(self.field()))
    }

    fn caption_override(&self) -> Option<String> {
        match self {
            Self::Plain(_) => None,
            Self::Custom { caption, .. } => caption.clone(),
        }
    }

    fn into_parts(self) -> (String, Option<StringFilter>) {
        match self {
            Self::Plain(field) => (field, None),
            Self::Custom { field, matcher, .. } => (field, matcher),
        }
    }
}

impl From<&str> for FilterSpec {
    fn from(field: &str) -> Self {
        Self::plain(field)
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(field) => f.debug_tuple("Plain").field(field).finish(),
            Self::Custom {
                field,
                caption,
                matcher,
            } => f
                .debug_struct("Custom")
                .field("field", field)
                .field("caption", caption)
                .field("matcher", &matcher.is_some())
                .finish(),
        }
    }
}

/// Case-insensitive regex search over the text of `field`. Patterns that
/// do not compile are matched literally.
pub fn text_matcher(field: &str) -> StringFilter {
    let field = field.to_owned();
    let compiled: RefCell<Option<(String, Option<Regex>)>> = RefCell::new(None);
    Rc::new(move |record: &Record, pattern: &str| {
        let mut cache = compiled.borrow_mut();
        if cache.as_ref().is_none_or(|(cached, _)| cached != pattern) {
            *cache = Some((pattern.to_owned(), compile_pattern(pattern)));
        }
        let text = record.value(&field).to_string();
        match cache.as_ref().and_then(|(_, regex)| regex.as_ref()) {
            Some(regex) => regex.is_match(&text),
            None => text.to_lowercase().contains(&pattern.to_lowercase()),
        }
    })
}

fn compile_pattern(pattern: &str) -> Option<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .or_else(|_| {
            RegexBuilder::new(&regex::escape(pattern))
                .case_insensitive(true)
                .build()
        })
        .ok()
}

struct FilterChoice {
    caption: String,
    field: String,
    matcher: StringFilter,
}

/// Free-text box plus a field selector.
pub struct FilterToolbar<M: TableModel> {
    proxy: Rc<FilterProxy<M>>,
    choices: Vec<FilterChoice>,
    current: usize,
    text: String,
}

impl<M: TableModel> FilterToolbar<M> {
    /// Installs the first spec's matcher right away.
    pub fn new(proxy: Rc<FilterProxy<M>>, specs: Vec<FilterSpec>) -> BindResult<Self> {
        if specs.is_empty() {
            return Err(BindError::Configuration(
                "filter toolbar needs at least one filter field".to_owned(),
            ));
        }
        let mut choices: Vec<FilterChoice> = Vec::with_capacity(specs.len());
        for spec in specs {
            let caption = spec.caption();
            if choices.iter().any(|choice| choice.caption == caption) {
                return Err(BindError::Configuration(format!(
                    "duplicate filter caption {caption}"
                )));
            }
            let (field, matcher) = spec.into_parts();
            let matcher = matcher.unwrap_or_else(|| text_matcher(&field));
            choices.push(FilterChoice {
                caption,
                field,
                matcher,
            });
        }
        let toolbar = Self {
            proxy,
            choices,
            current: 0,
            text: String::new(),
        };
        toolbar.install_current();
        Ok(toolbar)
    }

    pub fn captions(&self) -> impl Iterator<Item = &str> {
        self.choices.iter().map(|choice| choice.caption.as_str())
    }

    pub fn current_caption(&self) -> &str {
        &self.choices[self.current].caption
    }

    pub fn current_field(&self) -> &str {
        &self.choices[self.current].field
    }

    pub fn select_caption(&mut self, caption: &str) -> BindResult<()> {
        let index = self
            .choices
            .iter()
            .position(|choice| choice.caption == caption)
            .ok_or_else(|| BindError::FieldNotFound(caption.to_owned()))?;
        self.current = index;
        self.install_current();
        Ok(())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: &str) {
        text.clone_into(&mut self.text);
        self.proxy.set_filter_string(text);
    }

    pub fn clear(&mut self) {
        self.set_text("");
    }

    fn install_current(&self) {
        let choice = &self.choices[self.current];
        debug!(caption = %choice.caption, field = %choice.field, "text filter field selected");
        self.proxy
            .add_filter(TEXT_FILTER_NAME, Rc::clone(&choice.matcher));
    }
}

impl<M: TableModel> fmt::Debug for FilterToolbar<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterToolbar")
            .field("captions", &self.captions().collect::<Vec<_>>())
            .field("current", &self.current_caption())
            .field("text", &self.text)
            .finish()
    }
}

/// One checkbox of a [`BooleanFilterToolbar`].
#[derive(Clone)]
pub struct BooleanFilterSpec {
    pub field: String,
    pub caption: Option<String>,
    pub default: bool,
    pub comparator: Option<BooleanComparator>,
}

impl BooleanFilterSpec {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            caption: None,
            default: false,
            comparator: None,
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }

    pub fn with_default(mut self, default: bool) -> Self {
        self.default = default;
        self
    }

    pub fn with_comparator(mut self, comparator: BooleanComparator) -> Self {
        self.comparator = Some(comparator);
        self
    }
}

impl fmt::Debug for BooleanFilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BooleanFilterSpec")
            .field("field", &self.field)
            .field("caption", &self.caption)
            .field("default", &self.default)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkbox {
    pub caption: String,
    pub field: String,
    pub checked: bool,
}

/// Checkboxes, each holding one boolean filter on the proxy.
pub struct BooleanFilterToolbar<M: TableModel> {
    proxy: Rc<FilterProxy<M>>,
    checkboxes: Vec<Checkbox>,
}

impl<M: TableModel> BooleanFilterToolbar<M> {
    pub fn new(proxy: Rc<FilterProxy<M>>, specs: Vec<BooleanFilterSpec>) -> Self {
        let mut checkboxes = Vec::with_capacity(specs.len());
        for spec in specs {
            match spec.comparator {
                Some(comparator) => {
                    proxy.set_boolean_filter_with(&spec.field, spec.default, comparator);
                }
                None => proxy.set_boolean_filter(&spec.field, spec.default),
            }
            checkboxes.push(Checkbox {
                caption: spec.caption.unwrap_or_else(|| derive_header(&spec.field)),
                field: spec.field,
                checked: spec.default,
            });
        }
        Self { proxy, checkboxes }
    }

    pub fn checkboxes(&self) -> &[Checkbox] {
        &self.checkboxes
    }

    pub fn is_checked(&self, field: &str) -> Option<bool> {
        self.checkboxes
            .iter()
            .find(|checkbox| checkbox.field == field)
            .map(|checkbox| checkbox.checked)
    }

    pub fn set_checked(&mut self, field: &str, checked: bool) -> BindResult<()> {
        let checkbox = self
            .checkboxes
            .iter_mut()
            .find(|checkbox| checkbox.field == field)
            .ok_or_else(|| BindError::FieldNotFound(field.to_owned()))?;
        checkbox.checked = checked;
        self.proxy.set_boolean_expected(field, checked);
        Ok(())
    }

    pub fn toggle(&mut self, field: &str) -> BindResult<bool> {
        let checked = !self
            .is_checked(field)
            .ok_or_else(|| BindError::FieldNotFound(field.to_owned()))?;
        self.set_checked(field, checked)?;
        Ok(checked)
    }
}

impl<M: TableModel> fmt::Debug for BooleanFilterToolbar<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BooleanFilterToolbar")
            .field("checkboxes", &self.checkboxes)
            .finish()
    }
}
