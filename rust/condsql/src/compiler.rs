use crate::{
    condition::ConditionMap,
    encoder::encode_condition,
    error::Result,
    schema::TableDescriptor,
    value::BindParam,
};

/// Compiled `WHERE` clause. An empty clause matches every row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<BindParam>,
}

impl WhereClause {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// Folds a condition map into `WHERE a AND b ...`.
///
/// Every column is checked against the table before anything is encoded.
pub fn compile(table: &TableDescriptor, conditions: &ConditionMap) -> Result<WhereClause> {
    for column in conditions.columns() {
        table.require(column)?;
    }

    if conditions.is_empty() {
        return Ok(WhereClause::default());
    }

    let mut fragments = Vec::with_capacity(conditions.len());
    let mut params = Vec::new();
    for (column, condition) in conditions.iter() {
        let fragment = encode_condition(column, condition)?;
        fragments.push(fragment.sql);
        params.extend(fragment.params);
    }

    Ok(WhereClause {
        sql: format!("WHERE {}", fragments.join(" AND ")),
        params,
    })
}
