// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use rowbind_app::{ModelConfig, TableViewOptions};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_VERSION: i64 = 1;
const DEFAULT_LOG_FILTER: &str = "warn";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub models: Vec<ModelDecl>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            storage: Storage::default(),
            logging: Logging::default(),
            models: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Logging {
    pub filter: Option<String>,
    pub file: Option<String>,
}

/// One browsable table: the model setup plus how its view is dressed.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelDecl {
    #[serde(flatten)]
    pub model: ModelConfig,
    #[serde(default)]
    pub boolean_fields: Vec<String>,
    #[serde(default)]
    pub filter_fields: Vec<String>,
    #[serde(default)]
    pub boolean_filters: Vec<BooleanFilterDecl>,
    #[serde(default)]
    pub form_fields: Vec<String>,
    #[serde(default)]
    pub relations: Vec<RelationDecl>,
    #[serde(default)]
    pub view: TableViewOptions,
    #[serde(default)]
    pub subviews: Vec<SubviewDecl>,
}

impl ModelDecl {
    /// Declaration used for a table nothing in the config mentions.
    pub fn bare(table: &str) -> Self {
        Self {
            model: ModelConfig::new(table).without_auto_id(),
            boolean_fields: Vec::new(),
            filter_fields: Vec::new(),
            boolean_filters: Vec::new(),
            form_fields: Vec::new(),
            relations: Vec::new(),
            view: TableViewOptions::default(),
            subviews: Vec::new(),
        }
    }

    pub fn table(&self) -> &str {
        &self.model.table
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RelationDecl {
    pub column: String,
    pub table: String,
    #[serde(default = "default_relation_id_field")]
    pub id_field: String,
    pub display_field: String,
}

fn default_relation_id_field() -> String {
    "id".to_owned()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BooleanFilterDecl {
    pub field: String,
    pub caption: Option<String>,
    #[serde(default)]
    pub default: bool,
}

/// Detail table that follows the selected row of its parent.
#[derive(Debug, Clone, Deserialize)]
pub struct SubviewDecl {
    #[serde(flatten)]
    pub model: ModelConfig,
    pub related_id_field: String,
    #[serde(default)]
    pub boolean_fields: Vec<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ROWBIND_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ROWBIND_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(rowbind_db::APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self> {
        let value: toml::Value = toml::from_str(raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` at the top and declare tables under [[models]]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            rowbind_db::validate_db_path(db_path)?;
        }

        let mut tables = BTreeSet::new();
        for decl in &self.models {
            let table = decl.table();
            if table.trim().is_empty() {
                bail!("models.table in {} must not be empty", path.display());
            }
            if !tables.insert(table) {
                bail!(
                    "table {table} is declared twice in {}; merge the [[models]] entries",
                    path.display()
                );
            }
            if decl.model.check().is_err() {
                bail!(
                    "model {table} in {} auto-populates ids but names no id_sequence_name or id_field_name; set them or add auto_populate_id = false",
                    path.display()
                );
            }
            for subview in &decl.subviews {
                if subview.related_id_field.trim().is_empty() {
                    bail!(
                        "subview {} of {table} in {} needs a related_id_field",
                        subview.model.table,
                        path.display()
                    );
                }
                if subview.model.check().is_err() {
                    bail!(
                        "subview {} of {table} in {} auto-populates ids but names no id_sequence_name or id_field_name",
                        subview.model.table,
                        path.display()
                    );
                }
            }
        }
        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => rowbind_db::default_db_path(),
        }
    }

    pub fn log_filter(&self) -> &str {
        self.logging.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging.file.as_ref().map(PathBuf::from)
    }

    /// The declaration for `table`, falling back to a bare one.
    pub fn model(&self, table: &str) -> ModelDecl {
        self.models
            .iter()
            .find(|decl| decl.table() == table)
            .cloned()
            .unwrap_or_else(|| ModelDecl::bare(table))
    }

    /// Table browsed when `--table` is not given.
    pub fn first_table(&self) -> Option<&str> {
        self.models.first().map(ModelDecl::table)
    }

    /// Declarations matching the tables the demo database seeds.
    pub fn with_demo_models(mut self) -> Result<Self> {
        if self.models.is_empty() {
            let demo: Config = toml::from_str(DEMO_MODELS).context("decode demo models")?;
            self.models = demo.models;
        }
        Ok(self)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# rowbind config\n# Place this file at: {}\n\nversion = 1\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/rowbind/rowbind.db)\n# db_path = \"/absolute/path/to/rowbind.db\"\n\n[logging]\n# Overridden by ROWBIND_LOG.\nfilter = \"{DEFAULT_LOG_FILTER}\"\n# Log to a file so the terminal UI stays clean.\n# file = \"/tmp/rowbind.log\"\n{}",
            path.display(),
            DEMO_MODELS.trim_start_matches("version = 1\n"),
        )
    }
}

const DEMO_MODELS: &str = r#"version = 1

[[models]]
table = "orders"
id_sequence_name = "orders_id_seq"
vertical_header = true
boolean_fields = ["active"]
filter_fields = ["name", "created_on"]
form_fields = ["name", "active", "customer_id", "created_on"]
relations = [
  { column = "customer_id", table = "customers", display_field = "name" },
]
boolean_filters = [{ field = "active", caption = "Active only", default = true }]

[models.view]
focus_form_field = "name"
enable_sorting = true

[[models.subviews]]
table = "order_lines"
id_sequence_name = "order_lines_id_seq"
related_id_field = "order_id"
boolean_fields = ["shipped"]

[[models]]
table = "customers"
id_sequence_name = "customers_id_seq"
filter_fields = ["name", "city"]

[[models.subviews]]
table = "orders"
id_sequence_name = "orders_id_seq"
related_id_field = "customer_id"
boolean_fields = ["active"]
"#;

#[cfg(test)]
mod tests {
    use super::Config;
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert!(config.models.is_empty());
        assert_eq!(config.log_filter(), "warn");
        assert_eq!(config.log_file(), None);
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[[models]]\ntable = \"orders\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[[models]]"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn models_parse_with_flattened_model_settings() -> Result<()> {
        let (_temp, path) = write_config(
            r#"version = 1
[logging]
filter = "rowbind_app=debug"
file = "/tmp/rowbind-test.log"

[[models]]
table = "orders"
id_sequence_name = "orders_id_seq"
vertical_header = true
vertical_header_field = "name"
boolean_fields = ["active"]
relations = [{ column = "customer_id", table = "customers", display_field = "name" }]

[models.view]
can_delete = false
inline_form = true

[[models.subviews]]
table = "order_lines"
auto_populate_id = false
related_id_field = "order_id"
"#,
        )?;
        let config = Config::load(&path)?;
        assert_eq!(config.log_filter(), "rowbind_app=debug");
        assert_eq!(config.log_file(), Some(PathBuf::from("/tmp/rowbind-test.log")));

        let orders = config.model("orders");
        assert_eq!(orders.model.id_sequence_name.as_deref(), Some("orders_id_seq"));
        assert!(orders.model.auto_populate_id);
        assert_eq!(orders.model.id_field_name, "id");
        assert_eq!(orders.model.vertical_header_field.as_deref(), Some("name"));
        assert_eq!(orders.relations[0].id_field, "id");
        assert!(!orders.view.can_delete);
        assert!(orders.view.inline_form);
        assert!(orders.view.can_create);
        assert_eq!(orders.subviews[0].related_id_field, "order_id");
        assert!(!orders.subviews[0].model.auto_populate_id);
        assert_eq!(config.first_table(), Some("orders"));
        Ok(())
    }

    #[test]
    fn undeclared_tables_get_a_bare_model() {
        let config = Config::default();
        let decl = config.model("invoices");
        assert_eq!(decl.table(), "invoices");
        assert!(!decl.model.auto_populate_id);
        assert!(decl.subviews.is_empty());
    }

    #[test]
    fn auto_ids_without_a_sequence_are_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[[models]]\ntable = \"orders\"\n")?;
        let error = Config::load(&path).expect_err("missing sequence should fail");
        assert!(error.to_string().contains("id_sequence_name"));
        Ok(())
    }

    #[test]
    fn blank_sequence_names_are_rejected() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[[models]]\ntable = \"orders\"\nid_sequence_name = \"  \"\n",
        )?;
        let error = Config::load(&path).expect_err("blank sequence should fail");
        assert!(error.to_string().contains("model orders"));

        let (_temp, path) = write_config(
            "version = 1\n[[models]]\ntable = \"orders\"\nauto_populate_id = false\n[[models.subviews]]\ntable = \"order_lines\"\nid_sequence_name = \"\"\nrelated_id_field = \"order_id\"\n",
        )?;
        let error = Config::load(&path).expect_err("blank subview sequence should fail");
        assert!(error.to_string().contains("subview order_lines of orders"));
        Ok(())
    }

    #[test]
    fn duplicate_tables_are_rejected() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[[models]]\ntable = \"orders\"\nauto_populate_id = false\n[[models]]\ntable = \"orders\"\nauto_populate_id = false\n",
        )?;
        let error = Config::load(&path).expect_err("duplicate table should fail");
        assert!(error.to_string().contains("declared twice"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROWBIND_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROWBIND_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn db_path_prefers_storage_config_over_env_override() -> Result<()> {
        let _guard = env_lock();
        let (_temp, path) =
            write_config("version = 1\n[storage]\ndb_path = \"/explicit/from-config.db\"\n")?;
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ROWBIND_DB_PATH", "/from/env.db");
        }
        let config = Config::load(&path)?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ROWBIND_DB_PATH");
        }
        assert_eq!(config.db_path()?, PathBuf::from("/explicit/from-config.db"));
        Ok(())
    }

    #[test]
    fn db_path_rejects_uri_style_storage_value() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[storage]\ndb_path = \"https://evil.example/rowbind.db\"\n",
        )?;
        let error = Config::load(&path).expect_err("URI db_path should fail validation");
        let message = error.to_string();
        assert!(
            message.contains("looks like a URI") || message.contains("filesystem path"),
            "unexpected message: {message}"
        );
        Ok(())
    }

    #[test]
    fn example_config_parses_and_declares_demo_tables() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[storage]"));
        assert!(example.contains("[logging]"));

        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        let tables = config
            .models
            .iter()
            .map(|decl| decl.table())
            .collect::<Vec<_>>();
        assert_eq!(tables, vec!["orders", "customers"]);
        assert_eq!(config.model("orders").subviews[0].model.table, "order_lines");
        assert!(config.model("orders").view.enable_sorting);
        Ok(())
    }

    #[test]
    fn demo_models_only_fill_an_empty_config() -> Result<()> {
        let demo = Config::default().with_demo_models()?;
        assert_eq!(demo.first_table(), Some("orders"));

        let (_temp, path) = write_config(
            "version = 1\n[[models]]\ntable = \"customers\"\nauto_populate_id = false\n",
        )?;
        let declared = Config::load(&path)?.with_demo_models()?;
        assert_eq!(declared.models.len(), 1);
        assert_eq!(declared.first_table(), Some("customers"));
        Ok(())
    }
}
