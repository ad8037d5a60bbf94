//! Spawn data model and process-scoped state.
//!
//! Profiles and exit classifications live in `types`, the singleton registry
//! and termination latch in `state`, and the runtime collaborator seam in
//! `runtime`.

pub mod runtime;
pub mod state;
pub mod types;
