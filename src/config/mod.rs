//! Configuration and policy
//!
//! Error types, the service config file, and pre-fork validation.

pub mod loader;
pub mod types;
pub mod validator;

pub use loader::ServiceConfig;
