//! Declared field tables and their parser.

use engine_component::Entity;
use serde_json::Value;
use tracing::debug;

use crate::error::SchemaError;
use crate::field::{FieldDef, FieldType, FieldValue, json_kind};
use crate::object::ObjectTypes;

/// An ordered table of declared fields.
///
/// Built with [`Schema::field`]; a derived component type appends its own
/// table to its base type's with [`Schema::extend`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<FieldDef>,
}

/// Result of [`Schema::parse`].
///
/// `values` holds one entry per field that produced a value, in declaration
/// order. Fields whose input was rejected are absent from `values` and
/// reported in `errors`; their target keeps whatever value it had.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub values: Vec<(String, FieldValue)>,
    pub errors: Vec<SchemaError>,
}

impl ParseOutcome {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field. Redeclaring a name replaces the earlier declaration
    /// in place.
    #[must_use]
    pub fn field(mut self, name: &str, ty: FieldType, default: impl Into<FieldValue>) -> Self {
        let default: FieldValue = default.into();
        let default = default
            .coerce(ty)
            .unwrap_or_else(|| fallback_default(ty));
        self.insert(FieldDef {
            name: name.to_owned(),
            ty,
            default,
            object_type: None,
        })
    }

    /// Adds a field holding one instance of the object type `type_name`,
    /// null by default.
    #[must_use]
    pub fn object(self, name: &str, type_name: &str) -> Self {
        self.insert(FieldDef {
            name: name.to_owned(),
            ty: FieldType::Object,
            default: FieldValue::Object(None),
            object_type: Some(type_name.to_owned()),
        })
    }

    /// Adds a field holding a list of `type_name` instances, empty by
    /// default.
    #[must_use]
    pub fn objects(self, name: &str, type_name: &str) -> Self {
        self.insert(FieldDef {
            name: name.to_owned(),
            ty: FieldType::ObjectList,
            default: FieldValue::Objects(Vec::new()),
            object_type: Some(type_name.to_owned()),
        })
    }

    fn insert(mut self, def: FieldDef) -> Self {
        match self.fields.iter_mut().find(|f| f.name == def.name) {
            Some(existing) => *existing = def,
            None => self.fields.push(def),
        }
        self
    }

    /// Appends every field of `other`, with `other` winning on name clashes.
    #[must_use]
    pub fn extend(mut self, other: Schema) -> Self {
        for def in other.fields {
            self = self.insert(def);
        }
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Every field paired with its default value.
    #[must_use]
    pub fn defaults(&self) -> Vec<(String, FieldValue)> {
        self.fields
            .iter()
            .map(|f| (f.name.clone(), f.default.clone()))
            .collect()
    }

    /// Parses loosely-typed component data against this table.
    ///
    /// `data` must be a JSON object or `null` (treated as empty). Missing
    /// keys produce their field's default. Keys that do not name a field are
    /// reported as [`SchemaError::UnknownField`] and otherwise ignored.
    pub fn parse(
        &self,
        data: &Value,
        entities: Option<&[Entity]>,
    ) -> Result<ParseOutcome, SchemaError> {
        self.parse_in(data, entities, None)
    }

    /// Like [`Schema::parse`]; object fields are built from `types`. Without
    /// a registry every non-null object value is rejected.
    pub fn parse_in(
        &self,
        data: &Value,
        entities: Option<&[Entity]>,
        types: Option<&ObjectTypes>,
    ) -> Result<ParseOutcome, SchemaError> {
        let empty = serde_json::Map::new();
        let object = match data {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => return Err(SchemaError::NotAnObject(json_kind(other).to_owned())),
        };

        let mut outcome = ParseOutcome::default();
        for def in &self.fields {
            match object.get(&def.name) {
                None => outcome.values.push((def.name.clone(), def.default.clone())),
                Some(raw) => match def.convert_in(raw, entities, types) {
                    Ok(value) => outcome.values.push((def.name.clone(), value)),
                    Err(err) => {
                        debug!(field = %def.name, error = %err, "ignoring field value");
                        outcome.errors.push(err);
                    }
                },
            }
        }
        for key in object.keys() {
            if self.get(key).is_none() {
                debug!(field = %key, "ignoring unknown field");
                outcome.errors.push(SchemaError::UnknownField(key.clone()));
            }
        }
        Ok(outcome)
    }

    /// Checks a typed value for assignment to `name`, coercing where
    /// lossless.
    pub fn check(&self, name: &str, value: FieldValue) -> Result<FieldValue, SchemaError> {
        let def = self
            .get(name)
            .ok_or_else(|| SchemaError::UnknownField(name.to_owned()))?;
        let found = value.ty();
        let mismatch = |found: String| SchemaError::TypeMismatch {
            field: name.to_owned(),
            expected: def.ty,
            found,
        };
        let value = value.coerce(def.ty).ok_or_else(|| mismatch(found.to_string()))?;
        if let Some(expected) = def.object_type.as_deref()
            && let Some(other) = foreign_object(&value, expected)
        {
            return Err(mismatch(format!("object '{other}'")));
        }
        Ok(value)
    }
}

/// Type name of the first object in `value` that is not a `expected`.
fn foreign_object<'a>(value: &'a FieldValue, expected: &str) -> Option<&'a str> {
    let objects: &[_] = match value {
        FieldValue::Object(Some(o)) => std::slice::from_ref(o),
        FieldValue::Objects(list) => list,
        _ => &[],
    };
    objects.iter().map(|o| o.ty.as_str()).find(|ty| *ty != expected)
}

fn fallback_default(ty: FieldType) -> FieldValue {
    match ty {
        FieldType::Bool => FieldValue::Bool(false),
        FieldType::Int => FieldValue::Int(0),
        FieldType::Float => FieldValue::Float(0.0),
        FieldType::String => FieldValue::String(String::new()),
        FieldType::Entity => FieldValue::Entity(None),
        FieldType::Json => FieldValue::Json(Value::Null),
        FieldType::Object => FieldValue::Object(None),
        FieldType::ObjectList => FieldValue::Objects(Vec::new()),
    }
}
