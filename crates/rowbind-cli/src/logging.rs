// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

pub const LOG_ENV: &str = "ROWBIND_LOG";

/// `ROWBIND_LOG` wins over the configured filter.
pub fn env_filter(configured: &str) -> Result<EnvFilter> {
    match std::env::var(LOG_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(&directives)
            .with_context(|| format!("parse {LOG_ENV} filter {directives:?}")),
        _ => EnvFilter::try_new(configured)
            .with_context(|| format!("parse [logging].filter {configured:?}")),
    }
}

/// Installs the global subscriber. With a log file, nothing is written to
/// the terminal so the browser screen stays intact.
pub fn init(filter: EnvFilter, file: Option<&Path>) -> Result<()> {
    let layer = match file {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .with_filter(filter)
                .boxed()
        }
        None => fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .context("install tracing subscriber")?;
    tracing::debug!(file = ?file, "logging initialized");
    Ok(())
}
