//! Repository layer — entity-scoped database operations.

mod staging_rule;

pub use staging_rule::*;
