//! Rendering for command results
//!
//! List commands render as tables; single reports (a team record, a
//! diagnosis, a destruction report) render as indented key/value lines
//! in table mode, or as JSON/YAML when asked.

use colored::*;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables and key/value reports
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Table
    }
}

/// Print a list of rows in the selected format.
pub fn print_list<T: Serialize + Tabled>(rows: Vec<T>, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if rows.is_empty() {
                println!("{}", "No results".dimmed());
            } else {
                println!("{}", Table::new(rows));
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&rows).unwrap());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(&rows).unwrap());
        }
    }
}

/// Print one report in the selected format.
pub fn print_report<T: Serialize>(report: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let value = serde_json::to_value(report).unwrap();
            for line in field_lines(&value, 0) {
                println!("{line}");
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report).unwrap());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(report).unwrap());
        }
    }
}

/// Flatten a JSON value into indented `key: value` lines.
fn field_lines(value: &serde_json::Value, depth: usize) -> Vec<String> {
    let pad = "  ".repeat(depth);
    let mut lines = Vec::new();
    match value {
        serde_json::Value::Object(fields) => {
            for (key, field) in fields {
                match field {
                    serde_json::Value::Object(inner) if !inner.is_empty() => {
                        lines.push(format!("{pad}{}:", key.bold()));
                        lines.extend(field_lines(field, depth + 1));
                    }
                    serde_json::Value::Array(items) if !items.is_empty() => {
                        lines.push(format!("{pad}{}:", key.bold()));
                        lines.extend(field_lines(field, depth + 1));
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        lines.push(format!("{pad}{}: -", key.bold()));
                    }
                    other => {
                        lines.push(format!("{pad}{}: {}", key.bold(), scalar(other)));
                    }
                }
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                match item {
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        lines.extend(field_lines(item, depth));
                    }
                    other => lines.push(format!("{pad}- {}", scalar(other))),
                }
            }
        }
        other => lines.push(format!("{pad}{}", scalar(other))),
    }
    lines
}

fn scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_default() {
        assert!(matches!(OutputFormat::default(), OutputFormat::Table));
    }

    #[test]
    fn test_field_lines_flatten_nested_report() {
        colored::control::set_override(false);
        let report = serde_json::json!({
            "team": "payments",
            "service": {
                "running": 2,
                "desired": 2,
            },
            "findings": ["1 unhealthy load-balancer targets"],
            "log_tail": [],
            "bundle_version": null,
        });

        let lines = field_lines(&report, 0);

        assert!(lines.contains(&"team: payments".to_string()));
        assert!(lines.contains(&"service:".to_string()));
        assert!(lines.contains(&"  running: 2".to_string()));
        assert!(lines.contains(&"  - 1 unhealthy load-balancer targets".to_string()));
        assert!(lines.contains(&"log_tail: -".to_string()));
        assert!(lines.contains(&"bundle_version: -".to_string()));
    }
}
