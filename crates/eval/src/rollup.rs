//! The metric rollup engine.
//!
//! For every entity (deduplicated by id, first row wins):
//! 1. find its latest Interaction
//! 2. drop it from the whole call if the date filter rejects it
//! 3. for each metric, pick the Interaction(s) to test per the metric's
//!    basis and missing policy, evaluate, and bump `total` (and `flagged`
//!    when the entity's flag column coerces to true)
//!
//! An entity contributes at most 1 to any metric. Evaluation failures
//! remove the entity from that one metric and are returned as
//! diagnostics; they never abort the call.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crm_core::{
    group_by_entity, is_flagged, resolve_latest, Entity, HistoryByEntity, Interaction,
    LatestByEntity,
};

use crate::error::{EvalFailure, RollupError};
use crate::filter::DateFilter;
use crate::metric::{Basis, MetricSet, MetricSpec, Schema};
use crate::predicate::{FieldRef, Subject};

/// One metric's counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Count {
    pub total: u64,
    pub flagged: u64,
}

/// One entity that could not be evaluated for one metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub entity_id: String,
    pub metric: String,
    pub cause: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupReport {
    pub counts: BTreeMap<String, Count>,
    /// Distinct entities that passed the date filter.
    pub considered: usize,
    /// Distinct entities rejected by the date filter.
    pub excluded_by_date: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl RollupReport {
    pub fn count(&self, metric: &str) -> Result<Count, RollupError> {
        self.counts
            .get(metric)
            .copied()
            .ok_or_else(|| RollupError::UnknownMetric {
                name: metric.to_string(),
            })
    }

    /// Narrow the report to the named metrics, failing on any unknown name.
    pub fn select<S: AsRef<str>>(mut self, names: &[S]) -> Result<RollupReport, RollupError> {
        let mut counts = BTreeMap::new();
        for name in names {
            let name = name.as_ref();
            counts.insert(name.to_string(), self.count(name)?);
        }
        self.diagnostics
            .retain(|d| names.iter().any(|n| n.as_ref() == d.metric));
        self.counts = counts;
        Ok(self)
    }
}

/// Where the engine reads Interactions from.
#[derive(Debug, Clone, Copy)]
enum Timeline<'m, 'a> {
    Latest(&'m LatestByEntity<'a>),
    History(&'m HistoryByEntity<'a>),
}

impl<'m, 'a> Timeline<'m, 'a> {
    fn latest(&self, entity: &str) -> Option<&'a Interaction> {
        match *self {
            Timeline::Latest(map) => map.get(entity).copied(),
            Timeline::History(map) => map.get(entity).and_then(|g| g.first().copied()),
        }
    }

    fn history(&self, entity: &str) -> Option<&'m [&'a Interaction]> {
        match *self {
            Timeline::Latest(_) => None,
            Timeline::History(map) => map.get(entity).map(Vec::as_slice),
        }
    }
}

/// Roll up metrics from the resolver's latest-per-entity map.
///
/// Metrics with [`Basis::History`] need [`rollup_with_history`] instead.
pub fn rollup(
    entities: &[Entity],
    latest: &LatestByEntity<'_>,
    metrics: &MetricSet,
    date_filter: Option<&DateFilter>,
) -> Result<RollupReport, RollupError> {
    run(entities, Timeline::Latest(latest), metrics, date_filter, None)
}

/// Roll up metrics from full per-entity history (see
/// [`crm_core::group_by_entity`]). Latest-basis metrics read the head of
/// each group.
pub fn rollup_with_history(
    entities: &[Entity],
    history: &HistoryByEntity<'_>,
    metrics: &MetricSet,
    date_filter: Option<&DateFilter>,
) -> Result<RollupReport, RollupError> {
    run(entities, Timeline::History(history), metrics, date_filter, None)
}

/// Everything a caller hands the engine in one request.
#[derive(Debug, Clone, Copy)]
pub struct RollupRequest<'r> {
    pub entities: &'r [Entity],
    pub interactions: &'r [Interaction],
    pub metrics: &'r MetricSet,
    pub date_filter: Option<&'r DateFilter>,
    pub schema: Option<&'r Schema>,
}

/// Resolve and roll up in one step, grouping history only when a metric
/// asks for it.
pub fn evaluate(request: RollupRequest<'_>) -> Result<RollupReport, RollupError> {
    if request.metrics.needs_history() {
        let history = group_by_entity(request.interactions);
        run(
            request.entities,
            Timeline::History(&history),
            request.metrics,
            request.date_filter,
            request.schema,
        )
    } else {
        let latest = resolve_latest(request.interactions);
        run(
            request.entities,
            Timeline::Latest(&latest),
            request.metrics,
            request.date_filter,
            request.schema,
        )
    }
}

fn run(
    entities: &[Entity],
    timeline: Timeline<'_, '_>,
    metrics: &MetricSet,
    date_filter: Option<&DateFilter>,
    schema: Option<&Schema>,
) -> Result<RollupReport, RollupError> {
    metrics.validate(schema, matches!(timeline, Timeline::History(_)))?;
    if let Some(filter) = date_filter {
        filter.validate()?;
        if let Some(schema) = schema {
            let field = FieldRef::interaction(&filter.field);
            if !schema.knows(&field) {
                return Err(RollupError::UnknownField {
                    metric: "date_filter".to_string(),
                    field: field.to_string(),
                });
            }
        }
    }

    let stand_ins: BTreeMap<&str, Option<Interaction>> = metrics
        .metrics
        .iter()
        .map(|(name, spec)| (name.as_str(), spec.when_missing.stand_in()))
        .collect();

    let mut report = RollupReport {
        counts: metrics
            .metrics
            .keys()
            .map(|name| (name.clone(), Count::default()))
            .collect(),
        ..RollupReport::default()
    };

    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for entity in entities {
        if !seen.insert(entity.id.as_str()) {
            continue;
        }
        let latest = timeline.latest(&entity.id);
        if let Some(filter) = date_filter {
            if !filter.admits(latest) {
                report.excluded_by_date += 1;
                continue;
            }
        }
        report.considered += 1;

        for (name, spec) in &metrics.metrics {
            let stand_in = stand_ins.get(name.as_str()).and_then(Option::as_ref);
            match qualifies(entity, latest, timeline, spec, stand_in) {
                Ok(true) => {
                    // A stand-in row answers interaction-side flag lookups too.
                    let subject = Subject::new(entity, latest.or(stand_in));
                    if let Some(count) = report.counts.get_mut(name) {
                        count.total += 1;
                        if is_flagged(subject.lookup(&metrics.flag)) {
                            count.flagged += 1;
                        }
                    }
                }
                Ok(false) => {}
                Err(cause) => {
                    tracing::debug!(
                        entity_id = %entity.id,
                        metric = %name,
                        %cause,
                        "predicate evaluation failed"
                    );
                    report.diagnostics.push(Diagnostic {
                        entity_id: entity.id.clone(),
                        metric: name.clone(),
                        cause: cause.to_string(),
                    });
                }
            }
        }
    }

    tracing::debug!(
        metrics = report.counts.len(),
        considered = report.considered,
        excluded_by_date = report.excluded_by_date,
        diagnostics = report.diagnostics.len(),
        "rollup complete"
    );
    Ok(report)
}

/// Does one entity count toward one metric?
fn qualifies(
    entity: &Entity,
    latest: Option<&Interaction>,
    timeline: Timeline<'_, '_>,
    spec: &MetricSpec,
    stand_in: Option<&Interaction>,
) -> Result<bool, EvalFailure> {
    if latest.is_none() {
        return match stand_in {
            Some(i) => spec.predicate.eval(&Subject::new(entity, Some(i))),
            None => Ok(false),
        };
    }
    match spec.basis {
        Basis::Latest => spec.predicate.eval(&Subject::new(entity, latest)),
        Basis::History => {
            let mut first_failure = None;
            for &i in timeline.history(&entity.id).unwrap_or_default() {
                match spec.predicate.eval(&Subject::new(entity, Some(i))) {
                    Ok(true) => return Ok(true),
                    Ok(false) => {}
                    Err(e) if first_failure.is_none() => first_failure = Some(e),
                    Err(_) => {}
                }
            }
            match first_failure {
                Some(e) => Err(e),
                None => Ok(false),
            }
        }
    }
}
