//! Encodes single column conditions and JSON payload values into SQL fragments.

use crate::{
    condition::Condition,
    error::{QueryError, Result},
    value::{BindParam, FieldValue},
};
use serde_json::Value;

/// A piece of SQL and the parameters for its placeholders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<BindParam>,
}

impl Fragment {
    fn new(sql: String, params: Vec<BindParam>) -> Self {
        Self { sql, params }
    }

    fn placeholder(param: BindParam) -> Self {
        Self::new("?".to_string(), vec![param])
    }
}

pub fn encode_condition(column: &str, condition: &Condition) -> Result<Fragment> {
    let fragment = match condition {
        Condition::IsNull | Condition::Eq(BindParam::Null) => {
            Fragment::new(format!("{column} IS NULL"), Vec::new())
        }
        Condition::Ne(BindParam::Null) => Fragment::new(format!("{column} IS NOT NULL"), Vec::new()),
        Condition::Eq(value) => compare(column, "=", value)?,
        Condition::Ne(value) => compare(column, "!=", value)?,
        Condition::Gt(value) => compare(column, ">", value)?,
        Condition::Gte(value) => compare(column, ">=", value)?,
        Condition::Lt(value) => compare(column, "<", value)?,
        Condition::Lte(value) => compare(column, "<=", value)?,
        Condition::Between(low, high) => {
            if low.is_null() || high.is_null() {
                return Err(QueryError::Validation(format!(
                    "BETWEEN bounds on '{column}' cannot be null"
                )));
            }
            Fragment::new(
                format!("{column} BETWEEN ? AND ?"),
                vec![low.clone(), high.clone()],
            )
        }
        Condition::In(values) => {
            if values.is_empty() {
                return Err(QueryError::Validation(format!(
                    "IN list on '{column}' requires at least one value"
                )));
            }
            if values.iter().any(BindParam::is_null) {
                return Err(QueryError::Validation(format!(
                    "IN list on '{column}' cannot contain null"
                )));
            }
            let placeholders = vec!["?"; values.len()].join(", ");
            Fragment::new(format!("{column} IN ({placeholders})"), values.clone())
        }
        Condition::Like(pattern) => Fragment::new(
            format!("{column} LIKE ?"),
            vec![BindParam::Text(pattern.clone())],
        ),
        Condition::JsonContains(value) => {
            let serialized = serde_json::to_string(value)
                .map_err(|err| QueryError::Internal(err.into()))?;
            Fragment::new(
                format!("JSON_CONTAINS({column}, ?)"),
                vec![BindParam::Text(serialized)],
            )
        }
        Condition::JsonArray(items) => {
            let array = json_array(items);
            Fragment::new(format!("{column} = {}", array.sql), array.params)
        }
    };

    Ok(fragment)
}

fn compare(column: &str, op: &str, value: &BindParam) -> Result<Fragment> {
    if value.is_null() {
        return Err(QueryError::Validation(format!(
            "cannot compare '{column}' {op} NULL"
        )));
    }
    Ok(Fragment::new(format!("{column} {op} ?"), vec![value.clone()]))
}

/// Value expression for one INSERT/UPDATE column.
pub fn encode_field(value: &FieldValue) -> Fragment {
    match value {
        FieldValue::Param(param) => Fragment::placeholder(param.clone()),
        FieldValue::Json(value) => encode_json(value),
    }
}

/// Builds nested `JSON_OBJECT`/`JSON_ARRAY` calls with every key and leaf bound.
///
/// Empty containers render as `JSON_OBJECT()` / `JSON_ARRAY()`, never as a NULL bind,
/// so an empty object or array is stored as JSON rather than SQL NULL.
pub fn encode_json(value: &Value) -> Fragment {
    match value {
        Value::Object(map) => {
            let mut parts = Vec::with_capacity(map.len() * 2);
            let mut params = Vec::new();
            for (key, item) in map {
                parts.push("?".to_string());
                params.push(BindParam::Text(key.clone()));
                let nested = encode_json(item);
                parts.push(nested.sql);
                params.extend(nested.params);
            }
            Fragment::new(format!("JSON_OBJECT({})", parts.join(", ")), params)
        }
        Value::Array(items) => json_array(items),
        scalar => Fragment::placeholder(BindParam::from_json(scalar).unwrap_or(BindParam::Null)),
    }
}

fn json_array(items: &[Value]) -> Fragment {
    let mut parts = Vec::with_capacity(items.len());
    let mut params = Vec::new();
    for item in items {
        let nested = encode_json(item);
        parts.push(nested.sql);
        params.extend(nested.params);
    }
    Fragment::new(format!("JSON_ARRAY({})", parts.join(", ")), params)
}
