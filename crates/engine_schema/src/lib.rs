//! # engine_schema
//!
//! Declared field tables for component types, and the conversion of
//! loosely-typed `serde_json::Value` input into typed [`FieldValue`]s.
//!
//! Entity fields may hold cross-references written as `"e3"`, `"3"` or `3`;
//! when parsing level data these resolve against the array of entities built
//! for that level.
//!
//! Besides component tables, named object types ([`ObjectTypes`]) describe
//! plain records that component fields can hold, singly or as a list.

pub mod error;
pub mod field;
pub mod object;
pub mod schema;

pub use error::SchemaError;
pub use field::{FieldDef, FieldType, FieldValue};
pub use object::{ObjectTypes, ObjectValue};
pub use schema::{ParseOutcome, Schema};
