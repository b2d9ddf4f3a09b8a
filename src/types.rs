//! Core types for the script inventory: records and the mapping store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Open metadata attached to a record (description, tags, arbitrary fields).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Keys owned by the record itself; metadata may not shadow them.
pub const RESERVED_KEYS: [&str; 4] = ["remoteId", "createdAt", "gist_id", "created_at"];

/// Stored form of a record: the value under its name in `MappingStore::scripts`.
///
/// Metadata is flattened into the record object, so `{"remoteId": .., "createdAt": ..,
/// "description": ..}` reads back with `description` in `metadata`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptEntry {
    /// Identifier of the blob holding the script source.
    #[serde(default, alias = "gist_id")]
    pub remote_id: String,

    /// Set once at creation.
    #[serde(alias = "created_at", with = "timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(flatten)]
    pub metadata: Metadata,
}

/// A record together with its name, as handed out by the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptRecord {
    pub name: String,
    pub remote_id: String,
    pub created_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl ScriptRecord {
    pub fn from_entry(name: &str, entry: &ScriptEntry) -> Self {
        Self {
            name: name.to_string(),
            remote_id: entry.remote_id.clone(),
            created_at: entry.created_at,
            metadata: entry.metadata.clone(),
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.get("description").and_then(|v| v.as_str())
    }

    /// Tags from metadata; non-string entries are skipped.
    pub fn tags(&self) -> Vec<String> {
        self.metadata
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|tags| {
                tags.iter()
                    .filter_map(|t| t.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// The full local state, mirrored as one remote blob.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingStore {
    #[serde(default)]
    pub scripts: BTreeMap<String, ScriptEntry>,

    /// Last successful push or pull.
    #[serde(default, alias = "last_synced", with = "timestamp::option")]
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl MappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry under `name`, returning the previous entry.
    pub fn upsert(&mut self, name: &str, entry: ScriptEntry) -> Option<ScriptEntry> {
        self.scripts.insert(name.to_string(), entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<ScriptEntry> {
        self.scripts.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<ScriptRecord> {
        self.scripts
            .get(name)
            .map(|entry| ScriptRecord::from_entry(name, entry))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// All records ordered by name.
    pub fn records(&self) -> Vec<ScriptRecord> {
        self.scripts
            .iter()
            .map(|(name, entry)| ScriptRecord::from_entry(name, entry))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Deterministic serialized form shared by the local file and the mirror blob.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

/// Timestamp encoding: RFC 3339 out; RFC 3339 or legacy offset-less ISO 8601 (read as UTC) in.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const LEGACY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn format(value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, LEGACY_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(ts) => serializer.serialize_str(&super::format(ts)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) => super::parse(&raw).map(Some).ok_or_else(|| {
                    serde::de::Error::custom(format!("invalid timestamp: {}", raw))
                }),
                None => Ok(None),
            }
        }
    }
}
