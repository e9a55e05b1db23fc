// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use thiserror::Error;

use crate::StoreError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BindError {
    /// Required setup is missing; raised while constructing a model or view.
    #[error("improperly configured: {0}")]
    Configuration(String),
    #[error("field not found: {0}")]
    FieldNotFound(String),
    #[error("missing arguments - requires {}", .0.join(","))]
    MissingArgument(Vec<String>),
    #[error("invalid value for field {0}")]
    Validation(String),
    #[error("field {0} is read only")]
    ReadOnly(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type BindResult<T> = std::result::Result<T, BindError>;
