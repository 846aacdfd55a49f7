//! liveconf CLI - Command-line interface for liveconf configuration files
//!
//! Usage:
//!   liveconf get config.json database.host
//!   liveconf get config.json servers[0].port --type int
//!   liveconf check config.json
//!   liveconf watch config.json --path database.host

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use liveconf_core::{fileutil, ConfigRegistry, Document, MonitorOptions, RawTree};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

/// liveconf - Typed access to hot-reloadable JSON configuration
#[derive(Parser)]
#[command(name = "liveconf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Get a specific value from a configuration file
    Get {
        /// Configuration file
        file: PathBuf,

        /// Path to the value (e.g., database.host or servers[0].port)
        path: String,

        /// Type to decode the value as
        #[arg(short, long, value_enum, default_value_t = ValueType::Raw)]
        r#type: ValueType,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Default value if the lookup fails
        #[arg(short, long)]
        default: Option<String>,
    },

    /// Check that files are JSON objects
    Check {
        /// Configuration file(s) to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Watch configuration files and report reloads until interrupted
    Watch {
        /// Configuration file(s) to watch, registered under their file stem
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Seconds between two change scans
        #[arg(short, long, default_value_t = 10)]
        interval: u64,

        /// Path to print after every reload
        #[arg(short, long)]
        path: Option<String>,
    },
}

/// Value types understood by `get`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ValueType {
    Raw,
    String,
    Int,
    Float,
    Bool,
    StringList,
    IntList,
    FloatList,
    BoolList,
}

/// Run the CLI with the given arguments
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Get {
            file,
            path,
            r#type,
            format,
            default,
        } => cmd_get(&file, &path, r#type, &format, default),

        Commands::Check { files } => cmd_check(files),

        Commands::Watch {
            files,
            interval,
            path,
        } => cmd_watch(files, Duration::from_secs(interval), path),
    }
}

/// Look up `path` in `doc` and render it as JSON
pub fn lookup(
    doc: &Document,
    path: &str,
    value_type: ValueType,
) -> liveconf_core::Result<serde_json::Value> {
    let value = match value_type {
        ValueType::Raw => {
            let raw = doc.get_raw(path)?;
            serde_json::from_str(raw.get())
                .map_err(|e| liveconf_core::Error::decode(path, "JSON value", e))?
        }
        ValueType::String => doc.get_string(path)?.into(),
        ValueType::Int => doc.get_int(path)?.into(),
        ValueType::Float => doc.get_float(path)?.into(),
        ValueType::Bool => doc.get_bool(path)?.into(),
        ValueType::StringList => doc.get_string_slice(path)?.into(),
        ValueType::IntList => doc.get_int_slice(path)?.into(),
        ValueType::FloatList => doc.get_float_slice(path)?.into(),
        ValueType::BoolList => doc.get_bool_slice(path)?.into(),
    };
    Ok(value)
}

/// Text rendering: strings unquoted, everything else as compact JSON
pub fn render_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn load_document(file: &Path) -> Result<Document, String> {
    match fileutil::is_file(file) {
        Ok(true) => {}
        Ok(false) => return Err(format!("{} is not a file", file.display())),
        Err(e) => return Err(format!("Failed to load {}: {}", file.display(), e)),
    }
    Document::load(file).map_err(|e| format!("Failed to load {}: {}", file.display(), e))
}

fn cmd_get(
    file: &Path,
    path: &str,
    value_type: ValueType,
    format: &str,
    default: Option<String>,
) -> ExitCode {
    let doc = match load_document(file) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("{}", e.red());
            return ExitCode::from(2);
        }
    };

    match lookup(&doc, path, value_type) {
        Ok(value) => {
            match format {
                "json" => match serde_json::to_string_pretty(&value) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("{}: {}", "Error".red(), e);
                        return ExitCode::from(1);
                    }
                },
                _ => println!("{}", render_text(&value)),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            if let Some(default_val) = default {
                println!("{}", default_val);
                ExitCode::SUCCESS
            } else {
                eprintln!("{}: {}", "Error".red(), e);
                ExitCode::from(1)
            }
        }
    }
}

fn cmd_check(files: Vec<PathBuf>) -> ExitCode {
    let mut all_valid = true;

    for file in files {
        let content = match fileutil::read_all(&file) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("{} {}: {}", "✗".red(), file.display(), e);
                all_valid = false;
                continue;
            }
        };

        match RawTree::from_slice(&content) {
            Ok(tree) => {
                println!(
                    "{} {}: valid JSON object ({} top-level keys)",
                    "✓".green(),
                    file.display(),
                    tree.len()
                );
            }
            Err(e) => {
                eprintln!("{} {}: Invalid JSON object: {}", "✗".red(), file.display(), e);
                all_valid = false;
            }
        }
    }

    if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn cmd_watch(files: Vec<PathBuf>, interval: Duration, path: Option<String>) -> ExitCode {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start runtime".red(), e);
            return ExitCode::from(2);
        }
    };

    let registry = Arc::new(ConfigRegistry::with_monitor_options(
        MonitorOptions::with_interval(interval),
    ));

    for file in &files {
        let name = file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let on_change = change_reporter(Arc::downgrade(&registry), path.clone());

        if let Err(e) = registry.register(name.clone(), file, Some(on_change)) {
            eprintln!("{}", format!("Failed to watch {}: {}", file.display(), e).red());
            return ExitCode::from(2);
        }
        println!("{} watching {} as '{}'", "✓".green(), file.display(), name);
        if let Some(p) = &path {
            print_value(&registry.get(&name), &name, p);
        }
    }

    runtime.block_on(async {
        if let Err(e) = registry.start_monitor() {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::from(2);
        }

        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("{}: {}", "Error".red(), e);
        }
        registry.stop_monitor();
        ExitCode::SUCCESS
    })
}

fn change_reporter(
    registry: std::sync::Weak<ConfigRegistry>,
    path: Option<String>,
) -> liveconf_core::ChangeCallback {
    Arc::new(move |name: &str| {
        println!("{} configuration '{}' reloaded", "↻".yellow(), name);
        if let (Some(registry), Some(p)) = (registry.upgrade(), &path) {
            print_value(&registry.get(name), name, p);
        }
    })
}

fn print_value(doc: &Document, name: &str, path: &str) {
    match lookup(doc, path, ValueType::Raw) {
        Ok(value) => println!("  {}:{} = {}", name, path, render_text(&value)),
        Err(e) => println!("  {}:{} {}", name, path, e.kind.to_string().red()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::from_json_str(
            r#"{"db": {"host": "localhost", "ports": [5432, 5433], "tls": false}, "ratio": 0.5}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_lookup_typed_values() {
        let doc = doc();

        assert_eq!(
            lookup(&doc, "db.host", ValueType::String).unwrap(),
            serde_json::json!("localhost")
        );
        assert_eq!(
            lookup(&doc, "db.ports", ValueType::IntList).unwrap(),
            serde_json::json!([5432, 5433])
        );
        assert_eq!(
            lookup(&doc, "db.ports[1]", ValueType::Int).unwrap(),
            serde_json::json!(5433)
        );
        assert_eq!(
            lookup(&doc, "db.tls", ValueType::Bool).unwrap(),
            serde_json::json!(false)
        );
        assert_eq!(
            lookup(&doc, "ratio", ValueType::Float).unwrap(),
            serde_json::json!(0.5)
        );
    }

    #[test]
    fn test_lookup_raw_mapping() {
        let value = lookup(&doc(), "db", ValueType::Raw).unwrap();
        assert_eq!(value["host"], "localhost");
    }

    #[test]
    fn test_lookup_missing_path() {
        let err = lookup(&doc(), "db.user", ValueType::String).unwrap_err();
        assert_eq!(err.kind, liveconf_core::ErrorKind::KeyNotFound);
    }

    #[test]
    fn test_render_text() {
        assert_eq!(render_text(&serde_json::json!("plain")), "plain");
        assert_eq!(render_text(&serde_json::json!([1, 2])), "[1,2]");
        assert_eq!(render_text(&serde_json::json!(true)), "true");
    }
}
