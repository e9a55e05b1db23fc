// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use anyhow::{Context, Result};
use config::Config;
use rowbind_db::Database;
use rowbind_tui::TablePane;
use runtime::ExportFormat;
use std::env;
use std::path::PathBuf;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let mut config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `rowbind --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    logging::init(
        logging::env_filter(config.log_filter())?,
        config.log_file().as_deref(),
    )?;

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let db = if options.demo {
        config = config.with_demo_models()?;
        runtime::open_demo_database()?
    } else {
        Database::open(&db_path).with_context(|| {
            format!(
                "open database {} -- if this path is wrong, set [storage].db_path or ROWBIND_DB_PATH",
                db_path.display()
            )
        })?
    };

    runtime::check_models(&db, &config)?;
    let problems = runtime::required_columns_outside_form(&db, &config)?;
    if options.check_only {
        for problem in &problems {
            eprintln!("warning: {problem}");
        }
        return Ok(());
    }

    let table = runtime::resolve_table(&db, &config, options.table.as_deref())?;
    let mut browser = runtime::build_browser(&db, &config.model(&table))?;
    if let Some(text) = &options.filter {
        runtime::apply_filter(&mut browser, text)?;
    }

    match options.export {
        Some(ExportFormat::Json) => println!("{}", runtime::export_json(&browser)?),
        Some(ExportFormat::Text) => print!("{}", runtime::export_text(&browser.view().snapshot())),
        None => rowbind_tui::run_browser(&mut browser)?,
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    table: Option<String>,
    filter: Option<String>,
    export: Option<ExportFormat>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        table: None,
        filter: None,
        export: None,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--table" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--table requires a table name"))?;
                options.table = Some(value.as_ref().to_owned());
            }
            "--filter" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--filter requires filter text"))?;
                options.filter = Some(value.as_ref().to_owned());
            }
            "--export" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--export requires json or text"))?;
                options.export = Some(ExportFormat::parse(value.as_ref())?);
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("rowbind");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Browse seeded demo data (in-memory)");
    println!("  --table <name>           Table to open (default: first [[models]] entry)");
    println!("  --filter <text>          Pre-fill the text filter");
    println!("  --export <json|text>     Print the visible rows and exit");
    println!("  --check                  Validate config, database and model declarations");
    println!("  --help                   Show this help");
}

#[cfg(test)]
mod tests {
    use super::{CliOptions, parse_cli_args};
    use crate::runtime::ExportFormat;
    use anyhow::Result;
    use std::path::PathBuf;

    fn default_options_path() -> PathBuf {
        PathBuf::from("/tmp/rowbind-config.toml")
    }

    #[test]
    fn parse_cli_args_defaults_to_provided_config_path() -> Result<()> {
        let options = parse_cli_args(Vec::<String>::new(), default_options_path())?;
        assert_eq!(
            options,
            CliOptions {
                config_path: default_options_path(),
                print_config_path: false,
                print_db_path: false,
                demo: false,
                print_example: false,
                check_only: false,
                show_help: false,
                table: None,
                filter: None,
                export: None,
            }
        );
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_config_path_override() -> Result<()> {
        let options = parse_cli_args(
            vec!["--config", "/custom/config.toml"],
            default_options_path(),
        )?;
        assert_eq!(options.config_path, PathBuf::from("/custom/config.toml"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_errors_for_missing_values() {
        for flag in ["--config", "--table", "--filter", "--export"] {
            let error = parse_cli_args(vec![flag], default_options_path())
                .expect_err("missing value should fail");
            assert!(error.to_string().contains("requires"), "{flag}: {error}");
        }
    }

    #[test]
    fn parse_cli_args_errors_for_unknown_argument() {
        let error = parse_cli_args(vec!["--wat"], default_options_path())
            .expect_err("unknown arg should fail");
        let message = error.to_string();
        assert!(message.contains("unknown argument"));
        assert!(message.contains("--help"));
    }

    #[test]
    fn parse_cli_args_reads_browse_options() -> Result<()> {
        let options = parse_cli_args(
            vec![
                "--demo", "--table", "customers", "--filter", "Boise", "--export", "json",
            ],
            default_options_path(),
        )?;
        assert!(options.demo);
        assert_eq!(options.table.as_deref(), Some("customers"));
        assert_eq!(options.filter.as_deref(), Some("Boise"));
        assert_eq!(options.export, Some(ExportFormat::Json));

        let error = parse_cli_args(vec!["--export", "xml"], default_options_path())
            .expect_err("xml export should fail");
        assert!(error.to_string().contains("unknown export format"));
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_print_and_check_flags() -> Result<()> {
        let options = parse_cli_args(
            vec!["--print-config-path", "--print-example-config", "--check"],
            default_options_path(),
        )?;
        assert!(options.print_config_path);
        assert!(!options.print_db_path);
        assert!(!options.demo);
        assert!(options.print_example);
        assert!(options.check_only);
        assert!(!options.show_help);
        Ok(())
    }

    #[test]
    fn parse_cli_args_sets_help_flag_for_long_and_short_variants() -> Result<()> {
        let long = parse_cli_args(vec!["--help"], default_options_path())?;
        assert!(long.show_help);

        let short = parse_cli_args(vec!["-h"], default_options_path())?;
        assert!(short.show_help);
        Ok(())
    }
}
