//! CRM metric rollup engine -- accepts entities, their interactions and a
//! set of named predicates, produces `{total, flagged}` counts per metric.
//!
//! The engine reads the resolver's latest-per-entity map from `crm-core`,
//! applies an optional calendar-date filter, evaluates each metric's
//! predicate per entity and counts each entity at most once per metric.
//! Rows that do not fit a predicate are reported as diagnostics instead of
//! failing the call.

pub mod error;
pub mod filter;
pub mod metric;
pub mod predicate;
pub mod presets;
pub mod rollup;

pub use error::{EvalFailure, RollupError};
pub use filter::{CalendarDate, DateFilter};
pub use metric::{Basis, MetricSet, MetricSpec, MissingPolicy, Schema};
pub use predicate::{FieldRef, Predicate, Subject};
pub use presets::{dashboard, dashboards, Dashboard, DASHBOARD_NAMES};
pub use rollup::{
    evaluate, rollup, rollup_with_history, Count, Diagnostic, RollupReport, RollupRequest,
};
