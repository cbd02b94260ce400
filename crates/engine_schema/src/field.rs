//! Field types, definitions and typed values.

use std::fmt;

use engine_component::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::object::{ObjectTypes, ObjectValue};

/// The declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Int,
    Float,
    String,
    /// A reference to another entity, possibly null.
    Entity,
    /// Any JSON value, stored as-is.
    Json,
    /// An instance of a registered object type, possibly null.
    Object,
    /// A list of instances of one registered object type.
    ObjectList,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Entity => "entity",
            Self::Json => "json",
            Self::Object => "object",
            Self::ObjectList => "object list",
        };
        f.write_str(name)
    }
}

/// A strongly-typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Entity(Option<Entity>),
    Json(Value),
    Object(Option<ObjectValue>),
    Objects(Vec<ObjectValue>),
}

impl FieldValue {
    /// The field type this value belongs to.
    #[must_use]
    pub fn ty(&self) -> FieldType {
        match self {
            Self::Bool(_) => FieldType::Bool,
            Self::Int(_) => FieldType::Int,
            Self::Float(_) => FieldType::Float,
            Self::String(_) => FieldType::String,
            Self::Entity(_) => FieldType::Entity,
            Self::Json(_) => FieldType::Json,
            Self::Object(_) => FieldType::Object,
            Self::Objects(_) => FieldType::ObjectList,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float value; integers widen.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The referenced entity. `None` both for null references and for
    /// values that are not entity references.
    #[must_use]
    pub fn as_entity(&self) -> Option<Entity> {
        match self {
            Self::Entity(e) => *e,
            _ => None,
        }
    }

    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            _ => None,
        }
    }

    /// The object, when this is a non-null object value.
    #[must_use]
    pub fn as_object(&self) -> Option<&ObjectValue> {
        match self {
            Self::Object(o) => o.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_objects(&self) -> Option<&[ObjectValue]> {
        match self {
            Self::Objects(list) => Some(list),
            _ => None,
        }
    }

    /// Converts this value to `ty`, if the conversion is lossless.
    ///
    /// Integers become floats and anything becomes JSON; every other
    /// mismatch is refused.
    #[must_use]
    pub fn coerce(self, ty: FieldType) -> Option<FieldValue> {
        match (self, ty) {
            (v, t) if v.ty() == t => Some(v),
            (Self::Int(i), FieldType::Float) => Some(Self::Float(i as f64)),
            (v, FieldType::Json) => Some(Self::Json(v.to_json())),
            _ => None,
        }
    }

    /// Plain JSON rendering. Entities render as their raw id.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::Entity(Some(e)) => Value::from(e.id()),
            Self::Entity(None) => Value::Null,
            Self::Json(v) => v.clone(),
            Self::Object(Some(o)) => o.to_json(),
            Self::Object(None) => Value::Null,
            Self::Objects(list) => list.iter().map(ObjectValue::to_json).collect(),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Entity> for FieldValue {
    fn from(v: Entity) -> Self {
        Self::Entity(Some(v))
    }
}

impl From<Option<Entity>> for FieldValue {
    fn from(v: Option<Entity>) -> Self {
        Self::Entity(v)
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        Self::Json(v)
    }
}

impl From<ObjectValue> for FieldValue {
    fn from(v: ObjectValue) -> Self {
        Self::Object(Some(v))
    }
}

impl From<Vec<ObjectValue>> for FieldValue {
    fn from(v: Vec<ObjectValue>) -> Self {
        Self::Objects(v)
    }
}

/// One entry of a schema's field table.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: FieldType,
    pub default: FieldValue,
    /// Registered object type of `Object` and `ObjectList` fields.
    pub object_type: Option<String>,
}

impl FieldDef {
    /// Converts a loosely-typed JSON value into this field's type.
    ///
    /// Entity fields accept `null`, a number, a numeric string, or an
    /// `"eN"` string. With an `entities` slice the number is an index into
    /// it; without one a number is taken as a raw entity id.
    pub fn convert(
        &self,
        value: &Value,
        entities: Option<&[Entity]>,
    ) -> Result<FieldValue, SchemaError> {
        self.convert_in(value, entities, None)
    }

    /// Like [`FieldDef::convert`], building object fields from `types`.
    pub fn convert_in(
        &self,
        value: &Value,
        entities: Option<&[Entity]>,
        types: Option<&ObjectTypes>,
    ) -> Result<FieldValue, SchemaError> {
        let converted = match self.ty {
            FieldType::Bool => value.as_bool().map(FieldValue::Bool),
            FieldType::Int => value
                .as_i64()
                .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
                .map(FieldValue::Int),
            FieldType::Float => value.as_f64().map(FieldValue::Float),
            FieldType::String => value.as_str().map(|s| FieldValue::String(s.to_owned())),
            FieldType::Entity => return self.resolve_entity(value, entities),
            FieldType::Json => Some(FieldValue::Json(value.clone())),
            FieldType::Object if value.is_null() => Some(FieldValue::Object(None)),
            FieldType::Object => {
                let object = self.object(value, entities, types)?;
                return Ok(FieldValue::Object(Some(object)));
            }
            FieldType::ObjectList => {
                let Value::Array(items) = value else {
                    return Err(self.mismatch(value));
                };
                let list = items
                    .iter()
                    .map(|item| self.object(item, entities, types))
                    .collect::<Result<Vec<_>, _>>()?;
                return Ok(FieldValue::Objects(list));
            }
        };
        converted.ok_or_else(|| self.mismatch(value))
    }

    fn object(
        &self,
        value: &Value,
        entities: Option<&[Entity]>,
        types: Option<&ObjectTypes>,
    ) -> Result<ObjectValue, SchemaError> {
        if !value.is_object() {
            return Err(self.mismatch(value));
        }
        let name = self.object_type.as_deref().unwrap_or_default();
        types
            .ok_or_else(|| SchemaError::UnknownObjectType(name.to_owned()))?
            .create(name, value, entities)
    }

    fn resolve_entity(
        &self,
        value: &Value,
        entities: Option<&[Entity]>,
    ) -> Result<FieldValue, SchemaError> {
        let reference = match value {
            Value::Null => return Ok(FieldValue::Entity(None)),
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.strip_prefix('e').unwrap_or(s).parse::<u64>().ok(),
            _ => return Err(self.mismatch(value)),
        };
        let unresolved = || SchemaError::UnresolvedEntity {
            field: self.name.clone(),
            reference: value.to_string(),
        };
        let Some(n) = reference else {
            return Err(unresolved());
        };
        match entities {
            Some(list) => usize::try_from(n)
                .ok()
                .and_then(|i| list.get(i))
                .map(|e| FieldValue::Entity(Some(*e)))
                .ok_or_else(unresolved),
            None if matches!(value, Value::Number(_)) && n != 0 => {
                Ok(FieldValue::Entity(Some(Entity::from_raw(n))))
            }
            None => Err(unresolved()),
        }
    }

    fn mismatch(&self, value: &Value) -> SchemaError {
        SchemaError::TypeMismatch {
            field: self.name.clone(),
            expected: self.ty,
            found: json_kind(value).to_owned(),
        }
    }
}

/// Short name of a JSON value's kind, for error messages.
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn def(ty: FieldType) -> FieldDef {
        FieldDef {
            name: "f".into(),
            ty,
            default: FieldValue::Json(Value::Null),
            object_type: None,
        }
    }

    #[test]
    fn test_convert_scalars() {
        assert_eq!(def(FieldType::Bool).convert(&json!(true), None), Ok(FieldValue::Bool(true)));
        assert_eq!(def(FieldType::Int).convert(&json!(4), None), Ok(FieldValue::Int(4)));
        assert_eq!(def(FieldType::Int).convert(&json!(4.0), None), Ok(FieldValue::Int(4)));
        assert_eq!(def(FieldType::Float).convert(&json!(2), None), Ok(FieldValue::Float(2.0)));
        assert_eq!(
            def(FieldType::String).convert(&json!("hi"), None),
            Ok(FieldValue::String("hi".into()))
        );
    }

    #[test]
    fn test_convert_rejects_mismatch() {
        let err = def(FieldType::Bool).convert(&json!("yes"), None).unwrap_err();
        assert_eq!(
            err,
            SchemaError::TypeMismatch {
                field: "f".into(),
                expected: FieldType::Bool,
                found: "string".into(),
            }
        );
        assert!(def(FieldType::Int).convert(&json!(1.5), None).is_err());
    }

    #[test]
    fn test_entity_reference_forms() {
        let ents = [Entity(10), Entity(11), Entity(12), Entity(13)];
        let d = def(FieldType::Entity);
        assert_eq!(d.convert(&json!("e3"), Some(&ents)), Ok(FieldValue::Entity(Some(Entity(13)))));
        assert_eq!(d.convert(&json!("1"), Some(&ents)), Ok(FieldValue::Entity(Some(Entity(11)))));
        assert_eq!(d.convert(&json!(2), Some(&ents)), Ok(FieldValue::Entity(Some(Entity(12)))));
        assert_eq!(d.convert(&json!(null), Some(&ents)), Ok(FieldValue::Entity(None)));
    }

    #[test]
    fn test_entity_reference_out_of_range() {
        let ents = [Entity(10)];
        let err = def(FieldType::Entity).convert(&json!("e5"), Some(&ents)).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedEntity { .. }));
    }

    #[test]
    fn test_entity_without_slice_uses_raw_id() {
        let d = def(FieldType::Entity);
        assert_eq!(d.convert(&json!(7), None), Ok(FieldValue::Entity(Some(Entity(7)))));
        assert!(d.convert(&json!("e7"), None).is_err());
        assert!(d.convert(&json!(true), None).is_err());
    }

    #[test]
    fn test_coerce() {
        assert_eq!(FieldValue::Int(3).coerce(FieldType::Float), Some(FieldValue::Float(3.0)));
        assert_eq!(FieldValue::Float(3.5).coerce(FieldType::Int), None);
        assert_eq!(
            FieldValue::from("x").coerce(FieldType::Json),
            Some(FieldValue::Json(json!("x")))
        );
        assert_eq!(FieldValue::Bool(true).coerce(FieldType::Entity), None);
    }

    #[test]
    fn test_accessors() {
        assert_eq!(FieldValue::Int(2).as_f64(), Some(2.0));
        assert_eq!(FieldValue::from(Entity(4)).as_entity(), Some(Entity(4)));
        assert_eq!(FieldValue::Entity(None).as_entity(), None);
        assert_eq!(FieldValue::from("a").as_str(), Some("a"));
        assert_eq!(FieldValue::Bool(false).as_i64(), None);
    }
}
