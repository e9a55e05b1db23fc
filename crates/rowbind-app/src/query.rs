// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::debug;

use crate::{BindError, BindResult, StoreError, Value};

/// Runs SQL that yields at most one interesting value.
pub trait ScalarExecutor {
    /// First column of the first row, or `None` when the query returns no
    /// rows. Parameters bind positionally.
    fn query_scalar(&self, sql: &str, parameters: &[Value]) -> Result<Option<Value>, StoreError>;
}

/// A parameterized aggregate, e.g. a total shown next to a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScalarQuery {
    sql: String,
    parameters: Vec<String>,
}

impl ScalarQuery {
    /// `parameters` names the positional placeholders of `sql`, in order.
    pub fn new<I, P>(sql: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            sql: sql.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Returns `0` when the query yields no row or a null value.
    #[tracing::instrument(skip_all, fields(sql = %self.sql))]
    pub fn calculate<E>(&self, executor: &E, arguments: &[(&str, Value)]) -> BindResult<Value>
    where
        E: ScalarExecutor + ?Sized,
    {
        let lookup = |name: &str| {
            arguments
                .iter()
                .find(|(candidate, _)| *candidate == name)
                .map(|(_, value)| value.clone())
        };

        let missing = self
            .parameters
            .iter()
            .filter(|name| lookup(name.as_str()).is_none())
            .cloned()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(BindError::MissingArgument(missing));
        }

        let bound = self
            .parameters
            .iter()
            .filter_map(|name| lookup(name.as_str()))
            .collect::<Vec<_>>();
        let value = executor.query_scalar(&self.sql, &bound)?;
        debug!(?value, "calculated");
        Ok(match value {
            None | Some(Value::Null) => Value::Integer(0),
            Some(value) => value,
        })
    }
}
