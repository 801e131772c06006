//! Declarative predicates over an (Entity, latest Interaction) pair.
//!
//! Predicates arrive as JSON tagged by `op`:
//!
//! ```json
//! {"op": "equals", "field": "status", "value": "Interested"}
//! {"op": "contains", "field": "franchise_status", "value": "form filled"}
//! {"op": "flagged", "field": "entity.is_startup"}
//! {"op": "all", "of": [ ... ]}
//! ```
//!
//! Text comparisons trim and lowercase both sides. A column that is
//! missing or null never matches and never fails; a column holding the
//! wrong shape of value fails with an [`EvalFailure`].

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crm_core::{is_flagged, timestamp, Entity, Interaction};

use crate::error::{EvalFailure, RollupError};
use crate::filter::CalendarDate;

// ──────────────────────────────────────────────
// Field references
// ──────────────────────────────────────────────

/// A column on either side of the pair. Bare names address the
/// Interaction; `entity.` and `interaction.` prefixes are explicit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldRef {
    Entity(String),
    Interaction(String),
}

impl FieldRef {
    pub fn entity(name: &str) -> Self {
        FieldRef::Entity(name.to_string())
    }

    pub fn interaction(name: &str) -> Self {
        FieldRef::Interaction(name.to_string())
    }

    pub fn name(&self) -> &str {
        match self {
            FieldRef::Entity(n) | FieldRef::Interaction(n) => n,
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Entity(n) => write!(f, "entity.{}", n),
            FieldRef::Interaction(n) => write!(f, "interaction.{}", n),
        }
    }
}

impl FromStr for FieldRef {
    type Err = RollupError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (side, name) = match raw.split_once('.') {
            Some(("entity", rest)) => (Some(true), rest),
            Some(("interaction", rest)) => (Some(false), rest),
            _ => (None, raw),
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(RollupError::InvalidFieldRef {
                raw: raw.to_string(),
                reason: "empty column name".to_string(),
            });
        }
        Ok(match side {
            Some(true) => FieldRef::Entity(name.to_string()),
            _ => FieldRef::Interaction(name.to_string()),
        })
    }
}

impl TryFrom<String> for FieldRef {
    type Error = RollupError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl From<FieldRef> for String {
    fn from(f: FieldRef) -> String {
        f.to_string()
    }
}

// ──────────────────────────────────────────────
// Subject
// ──────────────────────────────────────────────

/// What a predicate is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct Subject<'a> {
    pub entity: &'a Entity,
    pub interaction: Option<&'a Interaction>,
}

impl<'a> Subject<'a> {
    pub fn new(entity: &'a Entity, interaction: Option<&'a Interaction>) -> Self {
        Subject {
            entity,
            interaction,
        }
    }

    /// Column value, with JSON null folded into absence.
    pub fn lookup(&self, field: &FieldRef) -> Option<&'a Value> {
        let v = match field {
            FieldRef::Entity(n) => self.entity.attribute(n),
            FieldRef::Interaction(n) => self.interaction.and_then(|i| i.field(n)),
        };
        v.filter(|v| !v.is_null())
    }
}

// ──────────────────────────────────────────────
// Predicates
// ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    /// Every subject qualifies.
    Always,
    /// Case-insensitive, whitespace-trimmed equality.
    Equals { field: FieldRef, value: String },
    /// Case-insensitive substring containment.
    Contains { field: FieldRef, value: String },
    /// Equality against any of several values.
    OneOf { field: FieldRef, values: Vec<String> },
    /// Boolean-ish coercion, see [`crm_core::is_flagged`].
    Flagged { field: FieldRef },
    /// Column holds something other than null or blank text.
    Present { field: FieldRef },
    /// Column's calendar date lies in `[from, to]`.
    DateBetween {
        field: FieldRef,
        from: CalendarDate,
        to: CalendarDate,
    },
    /// Column's numeric value is at least `value`.
    AtLeast { field: FieldRef, value: Decimal },
    All { of: Vec<Predicate> },
    Any { of: Vec<Predicate> },
    Not { of: Box<Predicate> },
}

impl Predicate {
    pub fn equals(field: &str, value: &str) -> Result<Self, RollupError> {
        Ok(Predicate::Equals {
            field: field.parse()?,
            value: value.to_string(),
        })
    }

    pub fn contains(field: &str, value: &str) -> Result<Self, RollupError> {
        Ok(Predicate::Contains {
            field: field.parse()?,
            value: value.to_string(),
        })
    }

    /// Every column this predicate reads, in tree order.
    pub fn fields(&self) -> Vec<&FieldRef> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'p>(&'p self, out: &mut Vec<&'p FieldRef>) {
        match self {
            Predicate::Always => {}
            Predicate::Equals { field, .. }
            | Predicate::Contains { field, .. }
            | Predicate::OneOf { field, .. }
            | Predicate::Flagged { field }
            | Predicate::Present { field }
            | Predicate::DateBetween { field, .. }
            | Predicate::AtLeast { field, .. } => out.push(field),
            Predicate::All { of } | Predicate::Any { of } => {
                for p in of {
                    p.collect_fields(out);
                }
            }
            Predicate::Not { of } => of.collect_fields(out),
        }
    }

    /// Evaluate against one subject.
    pub fn eval(&self, subject: &Subject<'_>) -> Result<bool, EvalFailure> {
        match self {
            Predicate::Always => Ok(true),

            Predicate::Equals { field, value } => match subject.lookup(field) {
                Some(v) => Ok(normalize(&text_of(field, v)?) == normalize(value)),
                None => Ok(false),
            },

            Predicate::Contains { field, value } => match subject.lookup(field) {
                Some(v) => Ok(normalize(&text_of(field, v)?).contains(&normalize(value))),
                None => Ok(false),
            },

            Predicate::OneOf { field, values } => match subject.lookup(field) {
                Some(v) => {
                    let have = normalize(&text_of(field, v)?);
                    Ok(values.iter().any(|want| normalize(want) == have))
                }
                None => Ok(false),
            },

            Predicate::Flagged { field } => Ok(is_flagged(subject.lookup(field))),

            Predicate::Present { field } => Ok(match subject.lookup(field) {
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(_) => true,
                None => false,
            }),

            Predicate::DateBetween { field, from, to } => match subject.lookup(field) {
                Some(v) => {
                    let d = timestamp::date_of(v).ok_or_else(|| EvalFailure::NotADate {
                        field: field.to_string(),
                        raw: raw_text(v),
                    })?;
                    Ok(from.0 <= d && d <= to.0)
                }
                None => Ok(false),
            },

            Predicate::AtLeast { field, value } => match subject.lookup(field) {
                Some(v) => at_least(field, v, value),
                None => Ok(false),
            },

            Predicate::All { of } => {
                for p in of {
                    if !p.eval(subject)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }

            Predicate::Any { of } => {
                for p in of {
                    if p.eval(subject)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }

            Predicate::Not { of } => Ok(!of.eval(subject)?),
        }
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "text",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn raw_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Scalars compare as their text; lists and objects do not.
fn text_of(field: &FieldRef, v: &Value) -> Result<String, EvalFailure> {
    match v {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(EvalFailure::NotText {
            field: field.to_string(),
            found: json_type(other),
        }),
    }
}

/// Compares in `Decimal` when the value fits its 28-digit range and falls
/// back to `f64` for magnitudes outside it. Non-finite text stays an error.
fn at_least(field: &FieldRef, v: &Value, threshold: &Decimal) -> Result<bool, EvalFailure> {
    let raw = match v {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().replace(',', ""),
        _ => String::new(),
    };
    if let Ok(d) = Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw)) {
        return Ok(d >= *threshold);
    }
    match (raw.parse::<f64>(), threshold.to_f64()) {
        (Ok(f), Some(t)) if f.is_finite() => Ok(f >= t),
        _ => Err(EvalFailure::NotNumeric {
            field: field.to_string(),
            raw: raw_text(v),
        }),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
