use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::error::NifiError;

pub const OUTPUT_FORMAT_ENV: &str = "NIFI_OUTPUT_FORMAT";
const HEREDOC_DELIMITER: &str = "NIFI_CI_EOF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Github,
    Dotenv,
}

impl OutputFormat {
    /// An explicit choice, else `NIFI_OUTPUT_FORMAT`, else whichever CI
    /// system we appear to run under, else JSON.
    pub fn detect<F>(explicit: Option<OutputFormat>, env: F) -> OutputFormat
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(format) = explicit {
            return format;
        }
        let named = env(OUTPUT_FORMAT_ENV).and_then(|v| match v.trim().to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "github" => Some(OutputFormat::Github),
            "dotenv" | "gitlab" => Some(OutputFormat::Dotenv),
            _ => None,
        });
        let truthy = |key: &str| env(key).map(|v| !v.is_empty() && v != "false").unwrap_or(false);
        named.unwrap_or(if truthy("GITHUB_ACTIONS") {
            OutputFormat::Github
        } else if truthy("GITLAB_CI") {
            OutputFormat::Dotenv
        } else {
            OutputFormat::Json
        })
    }
}

pub type OutputMap = BTreeMap<String, String>;

/// Flatten a result into string values. Nested values become compact JSON.
pub fn flatten(value: &Value) -> OutputMap {
    match value {
        Value::Object(object) => object
            .iter()
            .map(|(key, value)| (key.clone(), scalar(value)))
            .collect(),
        other => BTreeMap::from([("result".to_string(), scalar(other))]),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        nested => nested.to_string(),
    }
}

pub fn success_payload(value: &Value) -> OutputMap {
    let mut map = flatten(value);
    map.entry("success".to_string()).or_insert_with(|| "true".to_string());
    map
}

pub fn error_payload(command: &str, error: &NifiError, logs: &[String]) -> OutputMap {
    let mut map = OutputMap::new();
    map.insert("success".to_string(), "false".to_string());
    map.insert("error".to_string(), error.to_string());
    map.insert("error_type".to_string(), error.kind().to_string());
    map.insert("command".to_string(), command.to_string());
    if !logs.is_empty() {
        map.insert("logs".to_string(), logs.join("\n"));
    }
    map
}

pub fn render(format: OutputFormat, map: &OutputMap) -> String {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(map).unwrap_or_default(),
        OutputFormat::Github => map
            .iter()
            .map(|(key, value)| github_line(key, value))
            .collect::<Vec<_>>()
            .join("\n"),
        OutputFormat::Dotenv => map
            .iter()
            .map(|(key, value)| format!("{}={}", dotenv_key(key), dotenv_value(value)))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn github_line(key: &str, value: &str) -> String {
    if !value.contains('\n') {
        return format!("{}={}", key, value);
    }
    let mut delimiter = HEREDOC_DELIMITER.to_string();
    while value.lines().any(|line| line == delimiter) {
        delimiter.push('_');
    }
    format!("{}<<{}\n{}\n{}", key, delimiter, value, delimiter)
}

fn dotenv_key(key: &str) -> String {
    key.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn dotenv_value(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "-_./:@,+".contains(c));
    if plain {
        return value.to_string();
    }
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('$', "\\$");
    format!("\"{}\"", escaped)
}

/// Append GitHub outputs to the `$GITHUB_OUTPUT` file.
pub fn append_github_output(path: &Path, rendered: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", rendered)
}

/// Print the payload and, under GitHub Actions, record it as step outputs.
pub fn emit<F>(format: OutputFormat, map: &OutputMap, env: F) -> std::io::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let rendered = render(format, map);
    println!("{}", rendered);
    if format == OutputFormat::Github {
        if let Some(path) = env("GITHUB_OUTPUT").filter(|p| !p.is_empty()) {
            append_github_output(Path::new(&path), &rendered)?;
        }
    }
    Ok(())
}
