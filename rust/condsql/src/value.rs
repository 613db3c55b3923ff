//! Bound parameter values and INSERT/UPDATE payloads.

use crate::error::{QueryError, Result};
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{Map, Value};

/// A single positional parameter matched to one `?` placeholder.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindParam {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Datetime(NaiveDateTime),
}

impl BindParam {
    /// Converts a JSON scalar. Arrays and objects have no scalar form.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(BindParam::Null),
            Value::Bool(flag) => Some(BindParam::Bool(*flag)),
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    Some(BindParam::Int(int))
                } else if let Some(uint) = number.as_u64() {
                    Some(BindParam::UInt(uint))
                } else {
                    number.as_f64().map(BindParam::Float)
                }
            }
            Value::String(text) => Some(BindParam::Text(text.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, BindParam::Null)
    }
}

impl From<bool> for BindParam {
    fn from(value: bool) -> Self {
        BindParam::Bool(value)
    }
}

impl From<i32> for BindParam {
    fn from(value: i32) -> Self {
        BindParam::Int(i64::from(value))
    }
}

impl From<i64> for BindParam {
    fn from(value: i64) -> Self {
        BindParam::Int(value)
    }
}

impl From<u32> for BindParam {
    fn from(value: u32) -> Self {
        BindParam::UInt(u64::from(value))
    }
}

impl From<u64> for BindParam {
    fn from(value: u64) -> Self {
        BindParam::UInt(value)
    }
}

impl From<f64> for BindParam {
    fn from(value: f64) -> Self {
        BindParam::Float(value)
    }
}

impl From<&str> for BindParam {
    fn from(value: &str) -> Self {
        BindParam::Text(value.to_string())
    }
}

impl From<String> for BindParam {
    fn from(value: String) -> Self {
        BindParam::Text(value)
    }
}

impl From<NaiveDateTime> for BindParam {
    fn from(value: NaiveDateTime) -> Self {
        BindParam::Datetime(value)
    }
}

impl<T: Into<BindParam>> From<Option<T>> for BindParam {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(BindParam::Null)
    }
}

/// Value written to a column by INSERT or UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Param(BindParam),
    /// Nested object or array, stored through `JSON_OBJECT`/`JSON_ARRAY`.
    Json(Value),
}

impl FieldValue {
    pub fn from_json(value: Value) -> Self {
        match BindParam::from_json(&value) {
            Some(param) => FieldValue::Param(param),
            None => FieldValue::Json(value),
        }
    }
}

impl From<BindParam> for FieldValue {
    fn from(value: BindParam) -> Self {
        FieldValue::Param(value)
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::from_json(value)
    }
}

impl<T: Into<BindParam>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        FieldValue::Param(value.into())
    }
}

macro_rules! field_value_from_scalar {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Param(BindParam::from(value))
                }
            }
        )+
    };
}

field_value_from_scalar!(bool, i32, i64, u32, u64, f64, &str, String, NaiveDateTime);

/// Ordered column/value pairs of a row to insert or update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(String, FieldValue)>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a column, replacing an earlier value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) {
        let column = column.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self::from(map)),
            other => Err(QueryError::Validation(format!(
                "payload must be a JSON object, got {other}"
            ))),
        }
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        let fields = map
            .into_iter()
            .map(|(column, value)| (column, FieldValue::from_json(value)))
            .collect();
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_keep_their_width() {
        assert_eq!(BindParam::from_json(&json!(-3)), Some(BindParam::Int(-3)));
        assert_eq!(
            BindParam::from_json(&json!(u64::MAX)),
            Some(BindParam::UInt(u64::MAX))
        );
        assert_eq!(BindParam::from_json(&json!(1.5)), Some(BindParam::Float(1.5)));
        assert_eq!(BindParam::from_json(&json!([1])), None);
    }

    #[test]
    fn params_serialize_as_plain_json() {
        let params = vec![
            BindParam::Int(1),
            BindParam::Text("%abc%".into()),
            BindParam::Null,
            BindParam::Bool(true),
        ];
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!([1, "%abc%", null, true])
        );
    }

    #[test]
    fn payload_preserves_document_order() {
        let raw: Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": {"k": [1, 2]}, "mid": null}"#).unwrap();
        let payload = Payload::from_json(raw).unwrap();
        let columns: Vec<_> = payload.iter().map(|(name, _)| name).collect();
        assert_eq!(columns, vec!["zeta", "alpha", "mid"]);
        assert_eq!(
            payload.get("alpha"),
            Some(&FieldValue::Json(json!({"k": [1, 2]})))
        );
        assert_eq!(payload.get("mid"), Some(&FieldValue::Param(BindParam::Null)));
    }

    #[test]
    fn set_replaces_existing_column_in_place() {
        let payload = Payload::new()
            .with("a", 1)
            .with("b", "x")
            .with("a", Option::<i64>::None);
        let fields: Vec<_> = payload.iter().collect();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], ("a", &FieldValue::Param(BindParam::Null)));
    }

    #[test]
    fn rejects_non_object_payloads() {
        let err = Payload::from_json(json!([1, 2])).unwrap_err();
        assert!(err.is_client_error());
    }
}
