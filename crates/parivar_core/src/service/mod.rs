//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate store and identity contracts into use-case level APIs.
//! - Keep UI layers decoupled from document and storage details.

pub mod draft_reconciler;
