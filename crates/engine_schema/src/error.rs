use thiserror::Error;

use crate::field::FieldType;

/// Errors raised while converting loosely-typed data into field values.
///
/// None of these are fatal to the caller: [`Schema::parse`](crate::Schema::parse)
/// collects them and keeps the field's previous value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("field '{field}' expects {expected}, found {found}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        found: String,
    },
    #[error("field '{field}' references unknown entity '{reference}'")]
    UnresolvedEntity { field: String, reference: String },
    #[error("component data must be an object, found {0}")]
    NotAnObject(String),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("unknown object type '{0}'")]
    UnknownObjectType(String),
}
