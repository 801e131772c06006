//! In-memory record source loaded from a JSON dataset.
//!
//! Backs the CLI and `crm serve` when no database is attached. Entity rows
//! are scoped by their `owner_id`; an Interaction is visible exactly when
//! its entity is.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crm_core::{Entity, Interaction, Scope};

use crate::error::StorageError;
use crate::source::RecordSource;

/// On-disk shape: `{"entities": [...], "interactions": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl Dataset {
    pub fn from_json(text: &str) -> Result<Self, StorageError> {
        Self::from_value(serde_json::from_str(text)?)
    }

    /// Only a JSON object is a dataset. Serde would also take a positional
    /// array, which would load an unrelated file as empty sections.
    pub fn from_value(value: serde_json::Value) -> Result<Self, StorageError> {
        if !value.is_object() {
            return Err(StorageError::Malformed(serde::de::Error::custom(
                "expected an object with \"entities\" and \"interactions\"",
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn load(path: &Path) -> Result<Self, StorageError> {
        let text = std::fs::read_to_string(path).map_err(|source| StorageError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    dataset: Dataset,
    /// entity id -> owner id, first entity row wins.
    owners: HashMap<String, Option<String>>,
}

impl MemoryStore {
    pub fn new(dataset: Dataset) -> Self {
        let mut owners = HashMap::new();
        for e in &dataset.entities {
            owners.entry(e.id.clone()).or_insert_with(|| e.owner());
        }
        MemoryStore { dataset, owners }
    }

    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let store = Self::new(Dataset::load(path)?);
        tracing::info!(
            path = %path.display(),
            entities = store.dataset.entities.len(),
            interactions = store.dataset.interactions.len(),
            "dataset loaded"
        );
        Ok(store)
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn entity_visible(&self, scope: &Scope, entity_id: &str) -> bool {
        match scope {
            Scope::All => true,
            Scope::Owners(_) => self
                .owners
                .get(entity_id)
                .is_some_and(|owner| scope.admits(owner.as_deref())),
        }
    }
}

fn page<'a, T: Clone + 'a>(
    rows: impl Iterator<Item = &'a T>,
    offset: usize,
    limit: usize,
) -> Vec<T> {
    rows.skip(offset).take(limit).cloned().collect()
}

#[async_trait]
impl RecordSource<Entity> for MemoryStore {
    async fn fetch_page(
        &self,
        scope: &Scope,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>, StorageError> {
        let visible = self
            .dataset
            .entities
            .iter()
            .filter(|e| scope.admits(e.owner().as_deref()));
        Ok(page(visible, offset, limit))
    }
}

#[async_trait]
impl RecordSource<Interaction> for MemoryStore {
    async fn fetch_page(
        &self,
        scope: &Scope,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Interaction>, StorageError> {
        let visible = self
            .dataset
            .interactions
            .iter()
            .filter(|i| self.entity_visible(scope, &i.entity_id));
        Ok(page(visible, offset, limit))
    }
}
