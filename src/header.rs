//! Inline script metadata header.
//!
//! Grammar:
//!
//! ```text
//! # /// script
//! # key = value
//! # ///
//! ```
//!
//! Every line between the fences is `#` or `# ` followed by TOML text; the
//! stripped lines together form one TOML document. Values may span lines
//! (e.g. a multi-line `dependencies` array).

use chrono::Utc;
use thiserror::Error;

pub const OPEN_FENCE: &str = "# /// script";
pub const CLOSE_FENCE: &str = "# ///";
pub const DEFAULT_TAGS: [&str; 2] = ["generated", "script-magic"];
pub const GENERATOR_AUTHOR: &str = "Script-Magic AI Generator";
const DEFAULT_REQUIRES_PYTHON: &str = ">=3.9";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("header opened on line {0} is never closed")]
    Unterminated(usize),

    #[error("header line {line} is not a comment: {text}")]
    NotComment { line: usize, text: String },

    #[error("header is not valid TOML: {0}")]
    Toml(String),

    #[error("header key '{key}' must be {expected}")]
    InvalidField { key: String, expected: &'static str },
}

/// Parsed header. Unknown keys are kept in `extra` in order of appearance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptHeader {
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub authors: Option<Vec<String>>,
    pub date: Option<String>,
    pub requires_python: Option<String>,
    pub dependencies: Option<Vec<String>>,
    pub extra: Vec<(String, toml::Value)>,
}

impl ScriptHeader {
    /// Header stamped on generated scripts.
    pub fn generated(description: &str, tags: &[String]) -> Self {
        let tags = if tags.is_empty() {
            DEFAULT_TAGS.iter().map(|t| t.to_string()).collect()
        } else {
            tags.to_vec()
        };
        Self {
            description: Some(description.to_string()),
            tags: Some(tags),
            authors: Some(vec![GENERATOR_AUTHOR.to_string()]),
            date: Some(Utc::now().format("%Y-%m-%d").to_string()),
            requires_python: Some(DEFAULT_REQUIRES_PYTHON.to_string()),
            dependencies: Some(Vec::new()),
            extra: Vec::new(),
        }
    }

    fn entries(&self) -> Vec<(String, toml::Value)> {
        let mut out = Vec::new();
        let mut push = |key: &str, value: Option<toml::Value>| {
            if let Some(value) = value {
                out.push((key.to_string(), value));
            }
        };
        push("description", self.description.clone().map(toml::Value::String));
        push("authors", self.authors.as_deref().map(string_array));
        push("date", self.date.clone().map(toml::Value::String));
        push(
            "requires-python",
            self.requires_python.clone().map(toml::Value::String),
        );
        push("dependencies", self.dependencies.as_deref().map(string_array));
        push("tags", self.tags.as_deref().map(string_array));
        out.extend(self.extra.iter().cloned());
        out
    }
}

fn string_array(items: &[String]) -> toml::Value {
    toml::Value::Array(items.iter().cloned().map(toml::Value::String).collect())
}

/// Render `header` as a fenced comment block, ending with a newline.
pub fn render_header(header: &ScriptHeader) -> String {
    let mut out = String::new();
    out.push_str(OPEN_FENCE);
    out.push('\n');
    for (key, value) in header.entries() {
        out.push_str("# ");
        out.push_str(&render_key(&key));
        out.push_str(" = ");
        render_value(&value, &mut out);
        out.push('\n');
    }
    out.push_str(CLOSE_FENCE);
    out.push('\n');
    out
}

fn render_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if bare {
        key.to_string()
    } else {
        let mut out = String::new();
        render_string(key, &mut out);
        out
    }
}

/// Inline TOML for `value`, always on one line so no value can form a fence line.
fn render_value(value: &toml::Value, out: &mut String) {
    match value {
        toml::Value::String(s) => render_string(s, out),
        toml::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                render_value(item, out);
            }
            out.push(']');
        }
        toml::Value::Table(table) => {
            if table.is_empty() {
                out.push_str("{}");
                return;
            }
            out.push_str("{ ");
            for (i, (key, item)) in table.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&render_key(key));
                out.push_str(" = ");
                render_value(item, out);
            }
            out.push_str(" }");
        }
        other => out.push_str(&other.to_string()),
    }
}

/// Basic string with line breaks and control characters escaped.
fn render_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// True when `code` contains an opening fence line.
pub fn has_header(code: &str) -> bool {
    code.lines().any(|line| line.trim_end() == OPEN_FENCE)
}

/// Parse the first header block in `code`. `Ok(None)` when there is none.
pub fn parse_header(code: &str) -> Result<Option<ScriptHeader>, HeaderError> {
    let mut lines = code.lines().enumerate();
    let Some((open_line, _)) = lines.find(|(_, line)| line.trim_end() == OPEN_FENCE) else {
        return Ok(None);
    };

    let mut body = Vec::new();
    let mut closed = false;
    for (idx, line) in lines {
        let line = line.trim_end_matches('\r');
        if line.trim_end() == CLOSE_FENCE {
            closed = true;
            break;
        }
        let stripped = if line == "#" {
            ""
        } else if let Some(rest) = line.strip_prefix("# ") {
            rest
        } else {
            return Err(HeaderError::NotComment {
                line: idx + 1,
                text: line.to_string(),
            });
        };
        body.push(stripped);
    }
    if !closed {
        return Err(HeaderError::Unterminated(open_line + 1));
    }

    let document = body.join("\n");
    let mut table: toml::Table =
        toml::from_str(&document).map_err(|e| HeaderError::Toml(e.to_string()))?;

    let mut header = ScriptHeader {
        description: take_string(&mut table, "description")?,
        tags: take_strings(&mut table, "tags")?,
        authors: take_strings(&mut table, "authors")?,
        date: take_date(&mut table)?,
        requires_python: take_string(&mut table, "requires-python")?,
        dependencies: take_strings(&mut table, "dependencies")?,
        extra: Vec::new(),
    };

    // `toml::Table` is sorted; recover the source order of the remaining keys.
    for key in key_order(&body) {
        if let Some(value) = table.remove(&key) {
            header.extra.push((key, value));
        }
    }
    header.extra.extend(table);
    Ok(Some(header))
}

/// Top-level keys in the order they start a line.
fn key_order(body: &[&str]) -> Vec<String> {
    let mut keys = Vec::new();
    for line in body {
        let Some((lhs, _)) = line.split_once('=') else {
            continue;
        };
        if line.starts_with(char::is_whitespace) {
            continue;
        }
        let lhs = lhs.trim();
        let key = match toml::from_str::<toml::Table>(&format!("{} = 0", lhs)) {
            Ok(parsed) if parsed.len() == 1 => parsed.keys().next().cloned(),
            _ => None,
        };
        if let Some(key) = key {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}

fn take_string(table: &mut toml::Table, key: &str) -> Result<Option<String>, HeaderError> {
    match table.remove(key) {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(invalid(key, "a string")),
    }
}

fn take_strings(table: &mut toml::Table, key: &str) -> Result<Option<Vec<String>>, HeaderError> {
    match table.remove(key) {
        None => Ok(None),
        Some(toml::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                toml::Value::String(s) => Ok(s),
                _ => Err(invalid(key, "an array of strings")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(_) => Err(invalid(key, "an array of strings")),
    }
}

/// `date` is usually a quoted string but a bare TOML date is accepted too.
fn take_date(table: &mut toml::Table) -> Result<Option<String>, HeaderError> {
    match table.remove("date") {
        None => Ok(None),
        Some(toml::Value::String(s)) => Ok(Some(s)),
        Some(toml::Value::Datetime(dt)) => Ok(Some(dt.to_string())),
        Some(_) => Err(invalid("date", "a string or date")),
    }
}

fn invalid(key: &str, expected: &'static str) -> HeaderError {
    HeaderError::InvalidField {
        key: key.to_string(),
        expected,
    }
}

/// Prepend a generated header to `code` unless it already has one.
///
/// An empty `description` falls back to the first sentence of `prompt`.
pub fn ensure_header(code: &str, prompt: &str, description: &str, tags: &[String]) -> String {
    if has_header(code) {
        return code.to_string();
    }
    let prompt = prompt.trim();
    let description = if description.trim().is_empty() {
        prompt.split('.').next().unwrap_or(prompt).trim()
    } else {
        description.trim()
    };
    let header = ScriptHeader::generated(description, tags);
    format!(
        "{}\n# Generated from the prompt: {}\n\n{}",
        render_header(&header),
        toml::Value::String(prompt.replace('\n', " ")),
        code
    )
}

/// Tags declared in the header, or the defaults when absent or unreadable.
pub fn header_tags(code: &str) -> Vec<String> {
    match parse_header(code) {
        Ok(Some(ScriptHeader {
            tags: Some(tags), ..
        })) if !tags.is_empty() => tags,
        _ => DEFAULT_TAGS.iter().map(|t| t.to_string()).collect(),
    }
}
