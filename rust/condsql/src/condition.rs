//! Condition maps: column filters parsed from request query/body JSON.
//!
//! A JSON condition object maps each column to either a plain value (equality),
//! `null` (`IS NULL`), an array (`IN`), or an operator object carrying exactly one
//! `$`-prefixed operator such as `{"$gt": 3}` or `{"$btw": [1, 9]}`.

use crate::{
    error::{QueryError, Result},
    value::BindParam,
};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Btw,
    In,
    Like,
    JsonArray,
    JsonContains,
}

impl Operator {
    pub fn parse(raw: &str) -> Option<Self> {
        let op = match raw {
            "$ne" => Operator::Ne,
            "$gt" => Operator::Gt,
            "$lt" => Operator::Lt,
            "$gte" => Operator::Gte,
            "$lte" => Operator::Lte,
            "$btw" => Operator::Btw,
            "$in" => Operator::In,
            "$like" => Operator::Like,
            "$json_array" => Operator::JsonArray,
            "$json_contains" => Operator::JsonContains,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Ne => "$ne",
            Operator::Gt => "$gt",
            Operator::Lt => "$lt",
            Operator::Gte => "$gte",
            Operator::Lte => "$lte",
            Operator::Btw => "$btw",
            Operator::In => "$in",
            Operator::Like => "$like",
            Operator::JsonArray => "$json_array",
            Operator::JsonContains => "$json_contains",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    IsNull,
    Eq(BindParam),
    /// `Ne(BindParam::Null)` renders as `IS NOT NULL`.
    Ne(BindParam),
    Gt(BindParam),
    Gte(BindParam),
    Lt(BindParam),
    Lte(BindParam),
    Between(BindParam, BindParam),
    In(Vec<BindParam>),
    Like(String),
    JsonContains(Value),
    JsonArray(Vec<Value>),
}

impl Condition {
    pub fn from_json(column: &str, value: &Value) -> Result<Self> {
        match value {
            Value::Null => Ok(Condition::IsNull),
            Value::Array(items) => Ok(Condition::In(param_list(column, Operator::In, items)?)),
            Value::Object(map) => from_operator_object(column, map),
            scalar => Ok(Condition::Eq(scalar_operand(column, "=", scalar)?)),
        }
    }
}

fn from_operator_object(column: &str, map: &Map<String, Value>) -> Result<Condition> {
    let mut recognized = Vec::with_capacity(map.len());
    for (key, operand) in map {
        let op = Operator::parse(key).ok_or_else(|| QueryError::UnsupportedOperator {
            operator: key.clone(),
            column: column.to_string(),
        })?;
        recognized.push((op, operand));
    }

    let (op, operand) = match recognized.as_slice() {
        [single] => *single,
        [] => {
            return Err(QueryError::Validation(format!(
                "operator object for '{column}' is empty"
            )))
        }
        _ => {
            return Err(QueryError::Validation(format!(
                "operator object for '{column}' must hold exactly one operator, got {}",
                recognized.len()
            )))
        }
    };

    let condition = match op {
        Operator::Ne => Condition::Ne(scalar_operand(column, op.as_str(), operand)?),
        Operator::Gt => Condition::Gt(scalar_operand(column, op.as_str(), operand)?),
        Operator::Lt => Condition::Lt(scalar_operand(column, op.as_str(), operand)?),
        Operator::Gte => Condition::Gte(scalar_operand(column, op.as_str(), operand)?),
        Operator::Lte => Condition::Lte(scalar_operand(column, op.as_str(), operand)?),
        Operator::Btw => {
            let items = array_operand(column, op, operand)?;
            match items {
                [low, high] => Condition::Between(
                    scalar_operand(column, op.as_str(), low)?,
                    scalar_operand(column, op.as_str(), high)?,
                ),
                _ => {
                    return Err(QueryError::Validation(format!(
                        "$btw on '{column}' requires exactly two values, got {}",
                        items.len()
                    )))
                }
            }
        }
        Operator::In => Condition::In(param_list(column, op, array_operand(column, op, operand)?)?),
        Operator::Like => match operand {
            Value::String(pattern) => Condition::Like(pattern.clone()),
            other => {
                return Err(QueryError::Validation(format!(
                    "$like on '{column}' expects a string pattern, got {other}"
                )))
            }
        },
        Operator::JsonContains => Condition::JsonContains(operand.clone()),
        Operator::JsonArray => Condition::JsonArray(array_operand(column, op, operand)?.to_vec()),
    };

    Ok(condition)
}

fn scalar_operand(column: &str, op: &str, value: &Value) -> Result<BindParam> {
    BindParam::from_json(value).ok_or_else(|| {
        QueryError::Validation(format!(
            "operator '{op}' on '{column}' expects a scalar value, got {value}"
        ))
    })
}

fn array_operand<'a>(column: &str, op: Operator, value: &'a Value) -> Result<&'a [Value]> {
    match value {
        Value::Array(items) => Ok(items.as_slice()),
        other => Err(QueryError::Validation(format!(
            "{op} on '{column}' expects an array, got {other}"
        ))),
    }
}

fn param_list(column: &str, op: Operator, items: &[Value]) -> Result<Vec<BindParam>> {
    if items.is_empty() {
        return Err(QueryError::Validation(format!(
            "{op} on '{column}' requires at least one value"
        )));
    }
    items
        .iter()
        .map(|item| scalar_operand(column, op.as_str(), item))
        .collect()
}

/// Ordered column → condition mapping, joined with `AND` when compiled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionMap {
    entries: Vec<(String, Condition)>,
}

impl ConditionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a condition, replacing an earlier one on the same column in place.
    pub fn insert(&mut self, column: impl Into<String>, condition: Condition) {
        let column = column.into();
        match self.entries.iter_mut().find(|(name, _)| *name == column) {
            Some(slot) => slot.1 = condition,
            None => self.entries.push((column, condition)),
        }
    }

    pub fn with(mut self, column: impl Into<String>, condition: Condition) -> Self {
        self.insert(column, condition);
        self
    }

    pub fn with_eq(self, column: impl Into<String>, value: impl Into<BindParam>) -> Self {
        self.with(column, Condition::Eq(value.into()))
    }

    pub fn get(&self, column: &str) -> Option<&Condition> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, condition)| condition)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.entries
            .iter()
            .map(|(name, condition)| (name.as_str(), condition))
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let map = match value {
            Value::Object(map) => map,
            Value::Null => return Ok(Self::new()),
            other => {
                return Err(QueryError::Validation(format!(
                    "conditions must be a JSON object, got {other}"
                )))
            }
        };

        let mut conditions = Self::new();
        for (column, raw) in map {
            conditions.insert(column.clone(), Condition::from_json(column, raw)?);
        }
        Ok(conditions)
    }
}
