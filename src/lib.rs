//! warmfork: a privileged process-spawning service
//! Forks children from a pre-warmed privileged parent and downgrades each one to a role-specific security context
//!
//! # Architecture
//!
//! This crate is organized by Linux kernel primitive families:
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::credentials`]: Supplementary groups and the gid-then-uid transition
//! - [`kernel::capabilities`]: Keep-caps across setuid, capset with read-back
//! - [`kernel::rlimit`]: Resource limits
//! - [`kernel::mount`]: External storage mounts in a private namespace
//! - [`kernel::label`]: MAC label derivation and application
//! - [`kernel::sched`], [`kernel::personality`], [`kernel::debug`]: Scheduler class, layout workaround, debuggability
//! - [`kernel::signal`]: Async-signal-safe SIGCHLD reaping and singleton-death enforcement
//!
//! ## Execution Control ([`exec`])
//! - [`exec::preexec`]: Type-state enforced specialization ordering
//! - [`exec::spawner`]: Fork, route to child/parent, singleton liveness re-check
//! - [`exec::shell`]: `/bin/sh -c` exec
//!
//! ## Core ([`core`])
//! - [`core::types`]: Security profiles and closed enums
//! - [`core::state`]: Singleton registry and termination latch
//! - [`core::runtime`]: Hooks into the hosted runtime
//!
//! ## Observability ([`observability`])
//! - [`observability::audit`]: Structured spawn events
//!
//! ## Configuration & Policy ([`config`])
//! - [`config::loader`]: Service configuration loading
//! - [`config::validator`]: Pre-fork profile validation
//! - [`config::types`]: Error taxonomy and exit codes
//!
//! ## Testing Infrastructure ([`testing`])
//! - [`testing::fake_kernel`]: Recording kernel
//! - [`testing::fake_runtime`]: Recording hooks, reaper, waiter and terminator
//!
//! # Design Principles
//!
//! 1. **Order is fixed** - The specialization sequence cannot be reordered, skipped or reused
//! 2. **Refuse before fork** - Anything checkable in the parent is checked there
//! 3. **Fail closed in the child** - A child that cannot be specialized exits before running any payload
//! 4. **Minimal unsafe** - Thin wrappers with explicit preconditions

// Kernel Primitives
pub mod kernel;

// Execution Control
pub mod exec;

// Profiles, process-wide state, runtime hooks
pub mod core;

// Observability
pub mod observability;

// Configuration & Policy
pub mod config;

// Testing Infrastructure
pub mod testing;

// CLI entrypoint wiring for warmforkd.
pub mod cli;

// Re-export commonly used types for convenience
pub use config::types::*;
pub use crate::core::types::{SecurityProfile, SpawnRole};
pub use exec::preexec;
pub use exec::Spawner;
