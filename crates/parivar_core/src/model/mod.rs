//! Domain model for Parivar family groups.
//!
//! # Responsibility
//! - Define the canonical records shared by the create-flow and remote
//!   document payloads.
//! - Keep field naming aligned with the remote document schema (camelCase).
//!
//! # Invariants
//! - Exactly one member per family carries the `Self` relationship and the
//!   creator's account id.
//! - Member ids are client-generated and never reused within a family.

pub mod draft;
pub mod family;
pub mod member;
