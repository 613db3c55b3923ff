//! Table descriptors: the table name, primary key and the columns a repository
//! accepts from untrusted input.

use crate::{
    assembler::{OrderClause, OrderDirection},
    error::{QueryError, Result},
};
use serde::Deserialize;
use std::collections::HashSet;

/// Builds a [`TableDescriptor`] from bare identifiers.
///
/// ```
/// let tasks = condsql::table_descriptor!(t_task (ID) { ID, task_name, status }).unwrap();
/// assert!(tasks.contains("task_name"));
/// ```
#[macro_export]
macro_rules! table_descriptor {
    ($table:ident ($($key:ident),+ $(,)?) { $($column:ident),+ $(,)? }) => {
        $crate::schema::TableDescriptor::new(
            stringify!($table),
            &[$(stringify!($key)),+],
            &[$(stringify!($column)),+],
        )
    };
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    name: String,
    primary_key: Vec<String>,
    columns: Vec<String>,
    lookup: HashSet<String>,
}

impl TableDescriptor {
    pub fn new(name: &str, primary_key: &[&str], columns: &[&str]) -> Result<Self> {
        if !is_identifier(name) {
            return Err(QueryError::InvalidDescriptor(format!(
                "table name '{name}' is not a plain identifier"
            )));
        }
        if columns.is_empty() {
            return Err(QueryError::InvalidDescriptor(format!(
                "table '{name}' declares no columns"
            )));
        }
        if primary_key.is_empty() {
            return Err(QueryError::InvalidDescriptor(format!(
                "table '{name}' declares no primary key"
            )));
        }

        let mut lookup = HashSet::with_capacity(columns.len());
        for column in columns {
            if !is_identifier(column) {
                return Err(QueryError::InvalidDescriptor(format!(
                    "column '{column}' of '{name}' is not a plain identifier"
                )));
            }
            if !lookup.insert((*column).to_string()) {
                return Err(QueryError::InvalidDescriptor(format!(
                    "column '{column}' declared twice on '{name}'"
                )));
            }
        }

        for key in primary_key {
            if !lookup.contains(*key) {
                return Err(QueryError::InvalidDescriptor(format!(
                    "primary key '{key}' is not a column of '{name}'"
                )));
            }
        }

        Ok(Self {
            name: name.to_string(),
            primary_key: primary_key.iter().map(|key| key.to_string()).collect(),
            columns: columns.iter().map(|column| column.to_string()).collect(),
            lookup,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.lookup.contains(column)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|key| key == column)
    }

    /// Fails with `InvalidColumn` unless `column` belongs to this table.
    pub fn require(&self, column: &str) -> Result<()> {
        if self.contains(column) {
            Ok(())
        } else {
            Err(QueryError::invalid_column(&self.name, column))
        }
    }

    /// Primary key ascending, used when a query names no ordering.
    pub fn default_order(&self) -> Vec<OrderClause> {
        self.primary_key
            .iter()
            .map(|key| OrderClause {
                column: key.clone(),
                direction: OrderDirection::Asc,
            })
            .collect()
    }
}

/// Serializable form of a descriptor, as accepted by the translate command.
#[derive(Debug, Clone, Deserialize)]
pub struct TableSpec {
    pub name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: Vec<String>,
    pub columns: Vec<String>,
}

fn default_primary_key() -> Vec<String> {
    vec!["ID".to_string()]
}

impl TryFrom<TableSpec> for TableDescriptor {
    type Error = QueryError;

    fn try_from(spec: TableSpec) -> Result<Self> {
        let primary_key: Vec<&str> = spec.primary_key.iter().map(String::as_str).collect();
        let columns: Vec<&str> = spec.columns.iter().map(String::as_str).collect();
        TableDescriptor::new(&spec.name, &primary_key, &columns)
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(raw: &str) -> bool {
    let mut chars = raw.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}
