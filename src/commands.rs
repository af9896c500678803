//! Command execution.

use crate::config::Config;
use crate::Commands;
use colored::Colorize;
use sqlwire_protocol::{inspect, CompressionPolicy, Message, Query, Value};
use sqlwire_sqlite::Database;
use std::path::{Path, PathBuf};

type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Executes a command and returns the formatted output.
pub fn execute(config: &Config, cmd: Commands) -> CommandResult {
    match cmd {
        Commands::Select {
            db,
            sql,
            args,
            out,
            compress,
        } => {
            let query = build_query(sql, &args)?;
            let db = open(config, db, config.database.read_only)?;
            let result = db.select(&query)?;

            match out {
                Some(path) => {
                    let encoded = result.encode_with(&output_policy(config, compress))?;
                    std::fs::write(&path, &encoded)?;
                    Ok(format!(
                        "{} {} row(s), {} to {}",
                        "Wrote".green(),
                        result.len(),
                        format_bytes(encoded.len()),
                        path.display().to_string().cyan()
                    ))
                }
                None if result.is_empty() => Ok("No rows".yellow().to_string()),
                None => Ok(result.to_string()),
            }
        }

        Commands::Exec { db, sql, args } => {
            let query = build_query(sql, &args)?;
            let db = open(config, db, false)?;
            db.exec(&query)?;
            Ok("OK".green().to_string())
        }

        Commands::EncodeQuery {
            sql,
            args,
            out,
            compress,
        } => {
            let query = build_query(sql, &args)?;
            if !query.valid() {
                eprintln!(
                    "{}: {} placeholder(s), {} argument(s)",
                    "Warning".yellow(),
                    query.placeholder_count(),
                    query.args().len()
                );
            }

            let encoded = query.encode_with(&output_policy(config, compress))?;
            std::fs::write(&out, &encoded)?;
            Ok(format!(
                "{} query with {} argument(s), {} to {}",
                "Wrote".green(),
                query.args().len(),
                format_bytes(encoded.len()),
                out.display().to_string().cyan()
            ))
        }

        Commands::Decode { file, json } => {
            let data = std::fs::read(&file)?;
            let (message, consumed) =
                Message::try_decode_with_limit(&data, config.compression.max_decompressed)?;
            if consumed < data.len() {
                tracing::warn!(
                    "{} trailing byte(s) after the first unit in {}",
                    data.len() - consumed,
                    file.display()
                );
            }

            if json {
                return Ok(match &message {
                    Message::Query(q) => serde_json::to_string_pretty(q)?,
                    Message::Result(r) => serde_json::to_string_pretty(r)?,
                });
            }

            Ok(match message {
                Message::Query(q) => format!("{}\n{}", "Query".bold(), q),
                Message::Result(r) => format!(
                    "{}\n{}",
                    format!("Result ({} row(s))", r.len()).bold(),
                    r
                ),
            })
        }

        Commands::Inspect { file } => {
            let data = std::fs::read(&file)?;
            Ok(inspect::dump_with_limit(&data, config.compression.max_decompressed)
                .trim_end()
                .to_string())
        }
    }
}

/// Builds a query from the command line, parsing each argument into a value.
fn build_query(sql: String, args: &[String]) -> Result<Query, Box<dyn std::error::Error>> {
    let args = args
        .iter()
        .map(|arg| parse_arg(arg))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Query::with_args(sql, args))
}

/// Parses one argument: `NULL`, `x'..'` hex blob, integer, float, otherwise text.
fn parse_arg(arg: &str) -> Result<Value, hex::FromHexError> {
    if arg.eq_ignore_ascii_case("null") {
        return Ok(Value::Null);
    }

    if let Some(hex) = arg
        .strip_prefix("x'")
        .or_else(|| arg.strip_prefix("X'"))
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Ok(Value::Blob(hex::decode(hex)?));
    }

    if let Ok(n) = arg.parse::<i64>() {
        return Ok(Value::Integer(n));
    }

    // "inf" and "nan" stay text
    if arg.bytes().any(|b| b.is_ascii_digit()) {
        if let Ok(x) = arg.parse::<f64>() {
            return Ok(Value::Double(x));
        }
    }

    Ok(Value::Text(arg.to_string()))
}

fn open(
    config: &Config,
    db: Option<PathBuf>,
    read_only: bool,
) -> Result<Database, Box<dyn std::error::Error>> {
    let path: &Path = match (&db, &config.database.path) {
        (Some(path), _) | (None, Some(path)) => path,
        (None, None) => return Err("no database given (use --db or SQLWIRE_DB)".into()),
    };
    Ok(Database::open(path, read_only)?)
}

fn output_policy(config: &Config, force: bool) -> CompressionPolicy {
    if force {
        CompressionPolicy::always().with_level(config.compression.level)
    } else {
        config.compression.policy()
    }
}

fn format_bytes(bytes: usize) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
