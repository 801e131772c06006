//! Entity and Interaction rows as they arrive from the backend.
//!
//! Both types keep their descriptive columns in an open JSON map. The
//! engine never interprets a column until a predicate asks for it by name,
//! so new columns on the backend tables need no code change here.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::timestamp;

/// Opaque parent-entity key. Integer keys are carried as their decimal text.
pub type EntityId = String;

/// Attribute naming the user that owns an entity row.
pub const OWNER_FIELD: &str = "owner_id";

/// Render a row key as text. Keys arrive as strings or integers depending
/// on the source table.
pub fn key_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

fn key_from_json<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    key_text(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("row key must be a string or integer, got {}", raw))
    })
}

// ──────────────────────────────────────────────
// Entity
// ──────────────────────────────────────────────

/// A parent business record (lead, client, branch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(deserialize_with = "key_from_json")]
    pub id: EntityId,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Entity {
            id: id.into(),
            attributes: Map::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// The owning user's key, if the row carries one.
    pub fn owner(&self) -> Option<String> {
        self.attributes.get(OWNER_FIELD).and_then(key_text)
    }
}

// ──────────────────────────────────────────────
// Interaction
// ──────────────────────────────────────────────

/// A timestamped activity record (call log, visit log, status update)
/// tied to exactly one entity.
///
/// `occurred_on` and `recorded_at` are kept as raw JSON so that malformed
/// values survive a round trip unchanged; they are parsed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    #[serde(default, deserialize_with = "key_from_json")]
    pub id: String,
    #[serde(deserialize_with = "key_from_json")]
    pub entity_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occurred_on: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<Value>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Interaction {
    pub fn new(id: impl Into<String>, entity_id: impl Into<EntityId>) -> Self {
        Interaction {
            id: id.into(),
            entity_id: entity_id.into(),
            occurred_on: None,
            recorded_at: None,
            fields: Map::new(),
        }
    }

    pub fn occurred(mut self, value: impl Into<Value>) -> Self {
        self.occurred_on = Some(value.into());
        self
    }

    pub fn recorded(mut self, value: impl Into<Value>) -> Self {
        self.recorded_at = Some(value.into());
        self
    }

    /// Builder-style field setter.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Look up a column by name, including the two timestamp columns.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match name {
            "occurred_on" => self.occurred_on.as_ref(),
            "recorded_at" => self.recorded_at.as_ref(),
            _ => self.fields.get(name),
        }
    }

    pub fn occurred_instant(&self) -> Option<time::OffsetDateTime> {
        self.occurred_on.as_ref().and_then(timestamp::instant_of)
    }

    pub fn recorded_instant(&self) -> Option<time::OffsetDateTime> {
        self.recorded_at.as_ref().and_then(timestamp::instant_of)
    }
}
