//! Named metric definitions.
//!
//! A metric is a predicate plus two explicit choices the caller must make
//! at the definition site: what to do with entities that have no
//! Interaction yet, and whether to look at the latest Interaction only or
//! at the whole history.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crm_core::Interaction;

use crate::error::RollupError;
use crate::predicate::{FieldRef, Predicate};

/// Treatment of an entity with no Interaction at all.
///
/// JSON: `"exclude"` or `{"default": {"status": "New", "sub_status": "New Lead"}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Leave the entity out of this metric.
    Exclude,
    /// Evaluate as if the entity had an Interaction with these columns.
    Default(Map<String, Value>),
}

impl MissingPolicy {
    /// The `"New"` / `"New Lead"` default used by the lead dashboards.
    pub fn new_lead() -> Self {
        let mut fields = Map::new();
        fields.insert("status".to_string(), Value::from("New"));
        fields.insert("sub_status".to_string(), Value::from("New Lead"));
        MissingPolicy::Default(fields)
    }

    /// Stand-in Interaction for the `Default` policy.
    pub(crate) fn stand_in(&self) -> Option<Interaction> {
        match self {
            MissingPolicy::Exclude => None,
            MissingPolicy::Default(fields) => {
                let mut i = Interaction::new("", "");
                for (k, v) in fields {
                    i = match k.as_str() {
                        "occurred_on" => i.occurred(v.clone()),
                        "recorded_at" => i.recorded(v.clone()),
                        _ => i.with(k, v.clone()),
                    };
                }
                Some(i)
            }
        }
    }
}

/// Which Interactions a metric looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    /// The entity's latest Interaction only.
    #[default]
    Latest,
    /// Any Interaction in the entity's history; the entity still counts once.
    History,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub predicate: Predicate,
    /// Required: there is no implicit default status.
    pub when_missing: MissingPolicy,
    #[serde(default)]
    pub basis: Basis,
}

impl MetricSpec {
    pub fn new(predicate: Predicate, when_missing: MissingPolicy) -> Self {
        MetricSpec {
            predicate,
            when_missing,
            basis: Basis::Latest,
        }
    }

    pub fn over_history(mut self) -> Self {
        self.basis = Basis::History;
        self
    }
}

/// Known columns, used to reject predicates that name a column that does
/// not exist before any row is evaluated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub entity_fields: BTreeSet<String>,
    #[serde(default)]
    pub interaction_fields: BTreeSet<String>,
}

impl Schema {
    pub fn knows(&self, field: &FieldRef) -> bool {
        match field {
            FieldRef::Entity(n) => self.entity_fields.contains(n),
            FieldRef::Interaction(n) => {
                n == "occurred_on" || n == "recorded_at" || self.interaction_fields.contains(n)
            }
        }
    }
}

fn default_flag() -> FieldRef {
    FieldRef::entity("is_startup")
}

/// A set of named metrics sharing one flag column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Column behind every `flagged` sub-count.
    #[serde(default = "default_flag")]
    pub flag: FieldRef,
    pub metrics: BTreeMap<String, MetricSpec>,
}

impl Default for MetricSet {
    fn default() -> Self {
        MetricSet {
            flag: default_flag(),
            metrics: BTreeMap::new(),
        }
    }
}

impl MetricSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag_on(mut self, flag: FieldRef) -> Self {
        self.flag = flag;
        self
    }

    pub fn metric(mut self, name: &str, spec: MetricSpec) -> Self {
        self.metrics.insert(name.to_string(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Result<&MetricSpec, RollupError> {
        self.metrics
            .get(name)
            .ok_or_else(|| RollupError::UnknownMetric {
                name: name.to_string(),
            })
    }

    pub fn needs_history(&self) -> bool {
        self.metrics.values().any(|m| m.basis == Basis::History)
    }

    /// Keep only the named metrics. Unknown names are an error, not a
    /// silent omission.
    pub fn restrict<S: AsRef<str>>(&self, names: &[S]) -> Result<MetricSet, RollupError> {
        let mut metrics = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            metrics.insert(name.to_string(), self.get(name)?.clone());
        }
        Ok(MetricSet {
            flag: self.flag.clone(),
            metrics,
        })
    }

    /// Configuration checks run before any row is looked at.
    pub fn validate(&self, schema: Option<&Schema>, has_history: bool) -> Result<(), RollupError> {
        for (name, spec) in &self.metrics {
            if spec.basis == Basis::History && !has_history {
                return Err(RollupError::MissingHistory {
                    metric: name.clone(),
                });
            }
            let Some(schema) = schema else { continue };
            for field in spec.predicate.fields() {
                if !schema.knows(field) {
                    return Err(RollupError::UnknownField {
                        metric: name.clone(),
                        field: field.to_string(),
                    });
                }
            }
        }
        if let Some(schema) = schema {
            if !schema.knows(&self.flag) {
                return Err(RollupError::UnknownField {
                    metric: "flag".to_string(),
                    field: self.flag.to_string(),
                });
            }
        }
        Ok(())
    }
}
