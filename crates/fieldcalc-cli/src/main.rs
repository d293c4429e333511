//! fieldcalc CLI - check and run department formulas

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fieldcalc::prelude::*;
use fieldcalc::{export_preset, extract_field_references, extract_unique_field_references};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "fieldcalc")]
#[command(author, version, about = "Department formula checking and evaluation tool")]
struct Cli {
    /// Log debug output (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Accept the legacy `**` operator
    #[arg(long, global = true)]
    allow_double_star: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the syntax of an expression
    Validate {
        /// Formula expression, e.g. "[price] * [quantity]"
        expression: String,
    },

    /// List the fields an expression references
    Refs {
        expression: String,

        /// Print each field once
        #[arg(short, long)]
        unique: bool,
    },

    /// Compute an expression against sample values
    Test {
        expression: String,

        /// Sample value as NAME=VALUE (repeatable)
        #[arg(long = "value", value_name = "NAME=VALUE", value_parser = parse_field_value)]
        values: Vec<(String, FieldValue)>,
    },

    /// Compute every formula of a department
    #[command(alias = "run")]
    Eval {
        /// Formulas table (CSV)
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short, long)]
        department: i64,

        /// Field value as NAME=VALUE (repeatable)
        #[arg(long = "value", value_name = "NAME=VALUE", value_parser = parse_field_value)]
        values: Vec<(String, FieldValue)>,
    },

    /// Check a department's formulas against its fields
    Check {
        /// Formulas table (CSV)
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short, long)]
        department: i64,

        /// Configured field as NAME or NAME:TYPE (type defaults to number)
        #[arg(long = "field", value_name = "NAME[:TYPE]", value_parser = parse_field_spec)]
        fields: Vec<(String, FieldType)>,
    },

    /// Export a department's active formulas as a JSON preset
    Export {
        /// Formulas table (CSV)
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short, long)]
        department: i64,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a JSON preset into a department
    Import {
        /// Formulas table (CSV)
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short, long)]
        department: i64,

        /// Preset file
        preset: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let env = env_logger::Env::default().default_filter_or("warn");
    let mut logger = env_logger::Builder::from_env(env);
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let validation = ValidationOptions {
        allow_double_star: cli.allow_double_star,
        ..Default::default()
    };

    match cli.command {
        Commands::Validate { expression } => validate_expression(&expression, &validation),
        Commands::Refs { expression, unique } => list_references(&expression, unique),
        Commands::Test { expression, values } => test_expression(&expression, values, validation),
        Commands::Eval {
            store,
            department,
            values,
        } => evaluate_department(&store, department, values, validation),
        Commands::Check {
            store,
            department,
            fields,
        } => check_department(&store, department, fields, validation),
        Commands::Export {
            store,
            department,
            output,
        } => export(&store, department, output.as_deref(), validation),
        Commands::Import {
            store,
            department,
            preset,
        } => import(&store, department, &preset, validation),
    }
}

fn validate_expression(expression: &str, validation: &ValidationOptions) -> Result<ExitCode> {
    match fieldcalc::validate_with(expression, validation) {
        Ok(()) => {
            println!("OK");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

fn list_references(expression: &str, unique: bool) -> Result<ExitCode> {
    let references = if unique {
        extract_unique_field_references(expression)
    } else {
        extract_field_references(expression)
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for name in references {
        writeln!(out, "{}", name)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn test_expression(
    expression: &str,
    values: Vec<(String, FieldValue)>,
    validation: ValidationOptions,
) -> Result<ExitCode> {
    let engine =
        FormulaEngine::with_options(MemoryFormulaStore::new(), EngineOptions { validation });
    let values: FieldValues = values.into_iter().collect();

    let outcome = engine.test_formula(expression, &values);
    if let FormulaTestOutcome::CannotCompute(reason) = &outcome {
        log::info!("{}", reason);
    }

    match outcome.result() {
        Some(value) => {
            println!("{}", value);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("{}", outcome.error_message().unwrap_or_default());
            Ok(ExitCode::FAILURE)
        }
    }
}

fn open_store(path: &Path, validation: &ValidationOptions) -> CsvFormulaStore {
    CsvFormulaStore::new(path).with_validation(*validation)
}

fn evaluate_department(
    store: &Path,
    department: i64,
    values: Vec<(String, FieldValue)>,
    validation: ValidationOptions,
) -> Result<ExitCode> {
    let engine = FormulaEngine::with_options(
        open_store(store, &validation),
        EngineOptions { validation },
    );
    let values: FieldValues = values.into_iter().collect();

    let mut results: Vec<(String, f64)> = engine
        .evaluate_all_formulas(department, &values)
        .into_iter()
        .collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (target, value) in results {
        writeln!(out, "{}={}", target, value)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn check_department(
    store: &Path,
    department: i64,
    fields: Vec<(String, FieldType)>,
    validation: ValidationOptions,
) -> Result<ExitCode> {
    let engine = FormulaEngine::with_options(
        open_store(store, &validation),
        EngineOptions { validation },
    );
    let fields: Vec<FieldConfiguration> = fields
        .into_iter()
        .enumerate()
        .map(|(idx, (name, field_type))| {
            FieldConfiguration::new(department, name, field_type).with_display_order(idx as u32)
        })
        .collect();

    let issues = engine
        .check_department(department, &fields)
        .with_context(|| format!("Failed to read '{}'", store.display()))?;

    if issues.is_empty() {
        println!("OK");
        return Ok(ExitCode::SUCCESS);
    }
    for issue in &issues {
        println!("{}", issue);
    }
    Ok(ExitCode::FAILURE)
}

fn export(
    store: &Path,
    department: i64,
    output: Option<&Path>,
    validation: ValidationOptions,
) -> Result<ExitCode> {
    let preset = export_preset(&open_store(store, &validation), department)
        .with_context(|| format!("Failed to read '{}'", store.display()))?;

    match output {
        Some(path) => {
            preset
                .write_file(path)
                .with_context(|| format!("Failed to write '{}'", path.display()))?;
            eprintln!(
                "Exported {} formulas to {}",
                preset.formulas().len(),
                path.display()
            );
        }
        None => println!("{}", preset.to_json()?),
    }
    Ok(ExitCode::SUCCESS)
}

fn import(
    store: &Path,
    department: i64,
    preset_path: &Path,
    validation: ValidationOptions,
) -> Result<ExitCode> {
    let preset = Preset::read_file(preset_path)
        .with_context(|| format!("Failed to read preset '{}'", preset_path.display()))?;

    let mut store = open_store(store, &validation);
    let summary = fieldcalc::import_preset_with(&mut store, department, &preset, &validation)
        .with_context(|| format!("Failed to import '{}'", preset_path.display()))?;

    println!(
        "Imported {} formulas ({} new, {} updated)",
        summary.total(),
        summary.inserted,
        summary.updated
    );
    Ok(ExitCode::SUCCESS)
}

/// Parse `NAME=VALUE`; numbers and booleans are typed, anything else is text
fn parse_field_value(arg: &str) -> std::result::Result<(String, FieldValue), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", arg))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{}'", arg));
    }

    let value = value.trim();
    let value = if value.is_empty() {
        FieldValue::Empty
    } else if let Ok(number) = value.parse::<f64>() {
        if !number.is_finite() {
            return Err(format!("value of '{}' must be a finite number, got '{}'", name, value));
        }
        FieldValue::Number(number)
    } else {
        match value {
            "true" => FieldValue::Boolean(true),
            "false" => FieldValue::Boolean(false),
            text => FieldValue::from(text),
        }
    };
    Ok((name.to_string(), value))
}

/// Parse `NAME` or `NAME:TYPE`
fn parse_field_spec(arg: &str) -> std::result::Result<(String, FieldType), String> {
    let (name, field_type) = match arg.split_once(':') {
        Some((name, field_type)) => (
            name,
            field_type.parse::<FieldType>().map_err(|e| e.to_string())?,
        ),
        None => (arg, FieldType::Number),
    };
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{}'", arg));
    }
    Ok((name.to_string(), field_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_value() {
        assert_eq!(
            parse_field_value("price=1500").unwrap(),
            ("price".to_string(), FieldValue::Number(1500.0))
        );
        assert_eq!(
            parse_field_value("note = abc").unwrap(),
            ("note".to_string(), FieldValue::from("abc"))
        );
        assert_eq!(
            parse_field_value("flag=true").unwrap().1,
            FieldValue::Boolean(true)
        );
        assert_eq!(parse_field_value("empty=").unwrap().1, FieldValue::Empty);
        assert!(parse_field_value("novalue").is_err());
        assert!(parse_field_value("=1").is_err());
    }

    #[test]
    fn test_parse_field_value_rejects_non_finite() {
        assert!(parse_field_value("a=inf").is_err());
        assert!(parse_field_value("a=-Infinity").is_err());
        assert_eq!(
            parse_field_value("a=NaN").unwrap_err(),
            "value of 'a' must be a finite number, got 'NaN'"
        );
        assert_eq!(parse_field_value("a=1e3").unwrap().1, FieldValue::Number(1000.0));
    }

    #[test]
    fn test_parse_field_spec() {
        assert_eq!(
            parse_field_spec("price").unwrap(),
            ("price".to_string(), FieldType::Number)
        );
        assert_eq!(
            parse_field_spec("note:text").unwrap(),
            ("note".to_string(), FieldType::Text)
        );
        assert!(parse_field_spec("x:blob").is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
