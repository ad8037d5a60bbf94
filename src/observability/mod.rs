//! Observability
//!
//! Structured audit events for spawn decisions.

pub mod audit;
