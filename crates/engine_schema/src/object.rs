//! Named record types that are not components.
//!
//! An object type is just a name and a [`Schema`]. Instances are built from
//! loosely-typed JSON like component data, and live inside component fields
//! declared with [`Schema::object`] or [`Schema::objects`].

use std::collections::HashMap;

use engine_component::Entity;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::SchemaError;
use crate::field::FieldValue;
use crate::schema::Schema;

/// One instance of a registered object type. Holds every declared field,
/// in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectValue {
    pub ty: String,
    pub fields: Vec<(String, FieldValue)>,
}

impl ObjectValue {
    /// Value of the field `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// JSON object of the fields. The type name is not included.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }
}

/// Registry of object types by name.
#[derive(Debug, Clone, Default)]
pub struct ObjectTypes {
    types: HashMap<String, Schema>,
}

impl ObjectTypes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `schema` under `name`, returning the schema it replaced.
    pub fn register(&mut self, name: impl Into<String>, schema: Schema) -> Option<Schema> {
        self.types.insert(name.into(), schema)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.types.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Builds an instance of `name` from `data`.
    ///
    /// Fields that are missing or rejected take their declared default.
    /// Entity references resolve against `entities` as in
    /// [`Schema::parse`], including inside nested objects.
    ///
    /// # Errors
    ///
    /// [`SchemaError::UnknownObjectType`] for an unregistered name, or
    /// [`SchemaError::NotAnObject`] when `data` is neither an object nor
    /// `null`.
    pub fn create(
        &self,
        name: &str,
        data: &Value,
        entities: Option<&[Entity]>,
    ) -> Result<ObjectValue, SchemaError> {
        let schema = self
            .types
            .get(name)
            .ok_or_else(|| SchemaError::UnknownObjectType(name.to_owned()))?;
        let outcome = schema.parse_in(data, entities, Some(self))?;
        if !outcome.errors.is_empty() {
            debug!(object = name, rejected = outcome.errors.len(), "ignored part of object data");
        }
        let fields = schema
            .fields()
            .iter()
            .map(|def| {
                let value = outcome.get(&def.name).unwrap_or(&def.default).clone();
                (def.name.clone(), value)
            })
            .collect();
        Ok(ObjectValue {
            ty: name.to_owned(),
            fields,
        })
    }
}
