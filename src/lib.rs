// entgraph - schema-driven graph persistence: a fluent schema DSL resolved
// into relational storage layouts, a mutation spec executor over sqlx, and a
// code generator emitting typed models and builders.

// Schema DSL, registry and layout resolution
pub mod schema;

// Typed runtime values bridging schema fields and SQL storage classes
pub mod value;

// Snowflake node id generation
pub mod id;

// Mutation specs consumed by the executor
pub mod spec;

// Graph executor - plans and runs specs against a driver
pub mod executor;

// Mutation hooks (timestamps, audit)
pub mod hooks;

// Runtime node builders - untyped create/update/delete pipelines
pub mod builder;

// Schema migration - DDL derived from resolved layouts
pub mod migrate;

// Code generation - typed models and builders per entity
pub mod codegen;

// Sample social graph schemas used by entc and the integration tests
pub mod sample;

// Common error taxonomy
pub mod error;

// Re-exports for convenience
pub use error::{EntError, EntResult};
pub use value::Value;
