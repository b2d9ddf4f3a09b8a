//! Human-readable and JSON rendering of command results.

use crate::error::ApiError;
use crate::sync::{BootstrapOutcome, SyncState};
use crate::types::{timestamp, ScriptRecord};
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::{ContentArrangement, Table};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::path::PathBuf;

pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| ApiError::StorageError(crate::error::StorageError::Serialization(e)))
}

/// Records as a table; `verbose` adds identifiers and creation times.
pub fn format_records_table(records: &[ScriptRecord], verbose: bool) -> String {
    if records.is_empty() {
        return "No scripts found.".to_string();
    }
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic);
    if verbose {
        table.set_header(vec!["Name", "Description", "Tags", "Remote ID", "Created"]);
    } else {
        table.set_header(vec!["Name", "Description", "Tags"]);
    }
    for record in records {
        let mut row = vec![
            record.name.clone(),
            record.description().unwrap_or("-").to_string(),
            record.tags().join(", "),
        ];
        if verbose {
            row.push(record.remote_id.clone());
            row.push(record.created_at.format("%Y-%m-%d %H:%M").to_string());
        }
        table.add_row(row);
    }
    format!("{}\n{} script(s)", table, records.len())
}

pub fn format_record(record: &ScriptRecord) -> String {
    let mut out = format!("{}\n", format_section_heading(&record.name));
    out.push_str(&format!("  Remote ID:   {}\n", record.remote_id));
    out.push_str(&format!("  Created:     {}\n", timestamp::format(&record.created_at)));
    if let Some(description) = record.description() {
        out.push_str(&format!("  Description: {}\n", description));
    }
    let tags = record.tags();
    if !tags.is_empty() {
        out.push_str(&format!("  Tags:        {}\n", tags.join(", ")));
    }
    for (key, value) in &record.metadata {
        if key == "description" || key == "tags" {
            continue;
        }
        let shown = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        out.push_str(&format!("  {}: {}\n", key, shown));
    }
    out
}

/// Snapshot reported by `sm status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub data_dir: PathBuf,
    pub mapping_file: PathBuf,
    pub remote_configured: bool,
    pub remote_id: Option<String>,
    pub state: SyncState,
    pub bootstrap: Option<BootstrapOutcome>,
    #[serde(with = "timestamp::option")]
    pub last_synced_at: Option<DateTime<Utc>>,
    pub scripts: usize,
}

pub fn format_status_text(status: &StatusView) -> String {
    let mut out = format!("{}\n", format_section_heading("Script Magic Status"));
    out.push_str(&format!("  Data directory: {}\n", status.data_dir.display()));
    out.push_str(&format!("  Mapping file:   {}\n", status.mapping_file.display()));
    out.push_str(&format!("  Scripts:        {}\n", status.scripts));
    let remote = match (&status.remote_id, status.remote_configured) {
        (_, false) => format!("{}", "not configured (local only)".yellow()),
        (Some(id), true) => id.clone(),
        (None, true) => format!("{}", "not linked yet".yellow()),
    };
    out.push_str(&format!("  Remote mirror:  {}\n", remote));
    if let Some(outcome) = &status.bootstrap {
        let health = if outcome.github_ok {
            format!("{}", "ok".green())
        } else {
            format!("{}", "unavailable".red())
        };
        out.push_str(&format!("  Remote health:  {}\n", health));
    }
    let synced = status
        .last_synced_at
        .as_ref()
        .map(timestamp::format)
        .unwrap_or_else(|| "never".to_string());
    out.push_str(&format!("  Last synced:    {}\n", synced));
    out
}
