//! Grouped latest-record resolver.
//!
//! Ordering rule for the Interactions of one entity:
//! 1. `occurred_on` descending; null, missing or malformed sorts last
//! 2. `recorded_at` descending, same null handling
//! 3. input order: the first-encountered candidate wins a full tie
//!
//! `Option<OffsetDateTime>` already orders `None` below every `Some`, so
//! comparing `(occurred, recorded)` tuples gives rules 1 and 2 directly.
//! Rule 3 falls out of replacing the current pick only on a strictly
//! greater key.

use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::record::Interaction;

/// Entity key -> its latest Interaction.
pub type LatestByEntity<'a> = BTreeMap<&'a str, &'a Interaction>;

/// Entity key -> every Interaction, latest first.
pub type HistoryByEntity<'a> = BTreeMap<&'a str, Vec<&'a Interaction>>;

/// Sort key derived from an Interaction's two timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct OrderKey {
    pub occurred: Option<OffsetDateTime>,
    pub recorded: Option<OffsetDateTime>,
}

impl OrderKey {
    pub fn of(interaction: &Interaction) -> Self {
        OrderKey {
            occurred: interaction.occurred_instant(),
            recorded: interaction.recorded_instant(),
        }
    }
}

/// Select one Interaction per entity.
///
/// The result holds one entry for every distinct `entity_id` in the input.
/// Never fails: an empty slice gives an empty map.
pub fn resolve_latest(interactions: &[Interaction]) -> LatestByEntity<'_> {
    let mut best: BTreeMap<&str, (OrderKey, &Interaction)> = BTreeMap::new();
    for interaction in interactions {
        let key = OrderKey::of(interaction);
        best.entry(interaction.entity_id.as_str())
            .and_modify(|current| {
                if key > current.0 {
                    *current = (key, interaction);
                }
            })
            .or_insert((key, interaction));
    }
    best.into_iter()
        .map(|(entity, (_, interaction))| (entity, interaction))
        .collect()
}

/// Group every Interaction by entity, each group ordered latest first.
///
/// The first element of each group is the one [`resolve_latest`] picks.
pub fn group_by_entity(interactions: &[Interaction]) -> HistoryByEntity<'_> {
    let mut keyed: BTreeMap<&str, Vec<(OrderKey, &Interaction)>> = BTreeMap::new();
    for interaction in interactions {
        keyed
            .entry(interaction.entity_id.as_str())
            .or_default()
            .push((OrderKey::of(interaction), interaction));
    }
    keyed
        .into_iter()
        .map(|(entity, mut group)| {
            // Stable sort keeps input order among equal keys.
            group.sort_by(|a, b| b.0.cmp(&a.0));
            (entity, group.into_iter().map(|(_, i)| i).collect())
        })
        .collect()
}
