//! Built-in dashboards.
//!
//! Each dashboard states its missing-Interaction policy per metric, here,
//! where the definition lives. Lead counts that must include untouched
//! leads default them to `New` / `New Lead`; status tiles exclude them.

use crm_core::Role;

use crate::error::RollupError;
use crate::metric::{MetricSet, MetricSpec, MissingPolicy};
use crate::predicate::{FieldRef, Predicate};

/// A named metric set plus who may view it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub name: &'static str,
    pub min_role: Role,
    pub metrics: MetricSet,
}

pub const DASHBOARD_NAMES: [&str; 3] = ["leadgen", "fse", "franchise"];

fn eq(field: &str, value: &str) -> Predicate {
    Predicate::Equals {
        field: FieldRef::interaction(field),
        value: value.to_string(),
    }
}

fn has(field: &str, value: &str) -> Predicate {
    Predicate::Contains {
        field: FieldRef::interaction(field),
        value: value.to_string(),
    }
}

/// Lead generation: lead funnel by latest call outcome.
fn leadgen() -> Dashboard {
    let metrics = MetricSet::new()
        // Untouched leads are still leads.
        .metric(
            "total_leads",
            MetricSpec::new(Predicate::Always, MissingPolicy::new_lead()),
        )
        .metric(
            "new_leads",
            MetricSpec::new(eq("sub_status", "New Lead"), MissingPolicy::new_lead()),
        )
        .metric(
            "interested",
            MetricSpec::new(eq("status", "Interested"), MissingPolicy::Exclude),
        )
        .metric(
            "not_picked",
            MetricSpec::new(eq("status", "Not Picked"), MissingPolicy::Exclude),
        )
        .metric(
            "contract_share",
            MetricSpec::new(eq("sub_status", "Contract Share"), MissingPolicy::Exclude),
        )
        .metric(
            "onboarded",
            MetricSpec::new(has("status", "onboard"), MissingPolicy::Exclude),
        );
    Dashboard {
        name: "leadgen",
        min_role: Role::LeadGen,
        metrics,
    }
}

/// Field sales: visit pipeline by latest visit log.
fn fse() -> Dashboard {
    let metrics = MetricSet::new()
        .metric(
            "visits_planned",
            MetricSpec::new(eq("status", "Planned"), MissingPolicy::Exclude),
        )
        .metric(
            "visits_done",
            MetricSpec::new(
                Predicate::OneOf {
                    field: FieldRef::interaction("status"),
                    values: vec!["Completed".to_string(), "Visited".to_string()],
                },
                MissingPolicy::Exclude,
            ),
        )
        .metric(
            "follow_up",
            MetricSpec::new(has("sub_status", "follow up"), MissingPolicy::Exclude),
        )
        .metric(
            "closed_won",
            MetricSpec::new(eq("projection", "Closed"), MissingPolicy::Exclude),
        );
    Dashboard {
        name: "fse",
        min_role: Role::Fse,
        metrics,
    }
}

/// Franchise pipeline. `franchise_discussed` counts companies, not calls.
fn franchise() -> Dashboard {
    let metrics = MetricSet::new()
        .metric(
            "franchise_discussed",
            MetricSpec::new(
                Predicate::Present {
                    field: FieldRef::interaction("franchise_status"),
                },
                MissingPolicy::Exclude,
            )
            .over_history(),
        )
        .metric(
            "form_filled",
            MetricSpec::new(
                has("franchise_status", "form filled"),
                MissingPolicy::Exclude,
            ),
        );
    Dashboard {
        name: "franchise",
        min_role: Role::Manager,
        metrics,
    }
}

pub fn dashboard(name: &str) -> Result<Dashboard, RollupError> {
    match name {
        "leadgen" => Ok(leadgen()),
        "fse" => Ok(fse()),
        "franchise" => Ok(franchise()),
        _ => Err(RollupError::UnknownDashboard {
            name: name.to_string(),
        }),
    }
}

pub fn dashboards() -> Vec<Dashboard> {
    vec![leadgen(), fse(), franchise()]
}
