//! Role capability checks.
//!
//! Identity is asserted by the upstream auth provider; this module only
//! answers "may this principal see that?" and "whose rows may it see?".
//! It never touches storage.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors building a principal from upstream identity claims.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("principal id is missing")]
    MissingIdentity,
}

/// Position in the sales hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    LeadGen,
    Fse,
    Manager,
    Hod,
    Admin,
    Operations,
}

impl Role {
    fn rank(self) -> u8 {
        match self {
            Role::LeadGen => 0,
            Role::Fse => 1,
            Role::Manager => 2,
            Role::Hod => 3,
            Role::Admin | Role::Operations => 4,
        }
    }

    /// Whether holding `self` is enough where `required` is asked for.
    pub fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    /// Roles that see every row regardless of ownership.
    pub fn sees_all(self) -> bool {
        matches!(self, Role::Hod | Role::Admin | Role::Operations)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::LeadGen => "lead_gen",
            Role::Fse => "fse",
            Role::Manager => "manager",
            Role::Hod => "hod",
            Role::Admin => "admin",
            Role::Operations => "operations",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AccessError;

    /// Accepts the spellings found in role arrays: `MANAGER`, `LeadGen`,
    /// `lead_gen`, `lead-gen`, `FSE`, `ops`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "leadgen" => Ok(Role::LeadGen),
            "fse" => Ok(Role::Fse),
            "manager" => Ok(Role::Manager),
            "hod" => Ok(Role::Hod),
            "admin" => Ok(Role::Admin),
            "operations" | "ops" => Ok(Role::Operations),
            _ => Err(AccessError::UnknownRole(s.trim().to_string())),
        }
    }
}

/// Which owners' rows a caller may read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    All,
    Owners(BTreeSet<String>),
}

impl Scope {
    /// Whether a row owned by `owner` is visible. Unowned rows are only
    /// visible under [`Scope::All`].
    pub fn admits(&self, owner: Option<&str>) -> bool {
        match self {
            Scope::All => true,
            Scope::Owners(set) => owner.is_some_and(|o| set.contains(o)),
        }
    }
}

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub roles: Vec<Role>,
    /// Users reporting to this principal, directly or indirectly.
    #[serde(default)]
    pub reports: Vec<String>,
}

impl Principal {
    /// Build a principal from comma-separated claim strings.
    pub fn from_claims(id: &str, roles: &str, reports: &str) -> Result<Self, AccessError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(AccessError::MissingIdentity);
        }
        let roles = split_csv(roles)
            .map(str::parse)
            .collect::<Result<Vec<Role>, _>>()?;
        let reports = split_csv(reports).map(str::to_string).collect();
        Ok(Principal {
            id: id.to_string(),
            roles,
            reports,
        })
    }

    pub fn scope(&self) -> Scope {
        if self.roles.iter().any(|r| r.sees_all()) {
            return Scope::All;
        }
        let mut owners: BTreeSet<String> = self.reports.iter().cloned().collect();
        owners.insert(self.id.clone());
        Scope::Owners(owners)
    }
}

fn split_csv(s: &str) -> impl Iterator<Item = &str> {
    s.split(',').map(str::trim).filter(|p| !p.is_empty())
}

/// Capability check: does any of the principal's roles satisfy `required`?
pub fn has_role(principal: &Principal, required: Role) -> bool {
    principal.roles.iter().any(|r| r.satisfies(required))
}
