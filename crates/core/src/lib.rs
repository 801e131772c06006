//! crm-core: record model and the grouped latest-record resolver.
//!
//! Everything in this crate is a pure function over in-memory rows. The
//! collaborator layer fetches already-scoped Entity and Interaction
//! collections; this crate decides which Interaction represents each
//! Entity's current state.
//!
//! # Public API
//!
//! - [`resolve_latest()`] -- one Interaction per entity, latest first
//! - [`group_by_entity()`] -- full per-entity history in resolver order
//! - [`is_flagged()`] -- the shared boolean-ish coercion for flag attributes
//! - [`Entity`], [`Interaction`] -- the row types
//! - [`Principal`], [`Role`], [`Scope`] -- capability checks

pub mod access;
pub mod flag;
pub mod record;
pub mod resolve;
pub mod timestamp;

pub use access::{has_role, AccessError, Principal, Role, Scope};
pub use flag::is_flagged;
pub use record::{Entity, EntityId, Interaction};
pub use resolve::{group_by_entity, resolve_latest, HistoryByEntity, LatestByEntity, OrderKey};
