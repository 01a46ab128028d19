//! First-run device permission coordination.
//!
//! # Responsibility
//! - Declare the device capabilities the app asks for and their tri-state
//!   results.
//! - Drive the one-shot bootstrap that requests, persists, and summarizes
//!   them.

pub mod bootstrap;
pub mod capability;
