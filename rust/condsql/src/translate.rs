//! Offline translation: turns a JSON request into the SQL a repository would send.

use crate::{
    condition::ConditionMap,
    config::AppConfig,
    error::Result,
    repository::{
        build_delete, build_insert, build_insert_many, build_select, build_update, QueryRequest,
        QueryRequestBody,
    },
    schema::{TableDescriptor, TableSpec},
    statement::Statement,
    value::{BindParam, Payload},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Deserialize)]
pub struct TranslateRequest {
    pub table: TableSpec,
    pub operation: TranslateOperation,
}

/// Conditions and payloads arrive as raw JSON and are validated during translation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslateOperation {
    Select(QueryRequestBody),
    Insert {
        payload: Value,
    },
    InsertMany {
        payloads: Vec<Value>,
    },
    Update {
        conditions: Value,
        payload: Value,
        #[serde(default)]
        many: bool,
    },
    Delete {
        conditions: Value,
        #[serde(default)]
        many: bool,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct TranslateResponse {
    pub sql: String,
    pub params: Vec<BindParam>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_sql: Option<String>,
}

impl From<Statement> for TranslateResponse {
    fn from(statement: Statement) -> Self {
        Self {
            sql: statement.sql,
            params: statement.params,
            count_sql: None,
        }
    }
}

pub fn translate_request(config: &AppConfig, request: TranslateRequest) -> Result<TranslateResponse> {
    let table = TableDescriptor::try_from(request.table)?;

    let (statement, count) = match request.operation {
        TranslateOperation::Select(body) => {
            let query = QueryRequest::try_from(body)?;
            let plan = build_select(&table, &query, config.default_limit)?;
            (plan.rows, plan.count)
        }
        TranslateOperation::Insert { payload } => {
            (build_insert(&table, &Payload::from_json(payload)?)?, None)
        }
        TranslateOperation::InsertMany { payloads } => {
            let payloads = payloads
                .into_iter()
                .map(Payload::from_json)
                .collect::<Result<Vec<_>>>()?;
            (build_insert_many(&table, &payloads)?, None)
        }
        TranslateOperation::Update {
            conditions,
            payload,
            many,
        } => {
            let conditions = ConditionMap::from_json(&conditions)?;
            let payload = Payload::from_json(payload)?;
            (build_update(&table, &conditions, &payload, !many)?, None)
        }
        TranslateOperation::Delete { conditions, many } => {
            let conditions = ConditionMap::from_json(&conditions)?;
            (build_delete(&table, &conditions, !many)?, None)
        }
    };

    statement.verify_arity()?;
    debug!(table = table.name(), sql = %statement.sql, "translated request");

    let mut response = TranslateResponse::from(statement);
    response.count_sql = count.map(|count| count.sql);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use serde_json::json;

    fn translate(value: serde_json::Value) -> Result<TranslateResponse> {
        let request: TranslateRequest =
            serde_json::from_value(value).expect("request should deserialize");
        translate_request(&AppConfig::default(), request)
    }

    fn tasks_table() -> serde_json::Value {
        json!({
            "name": "tasks",
            "columns": ["ID", "name", "status", "create_time", "problems"]
        })
    }

    #[test]
    fn translates_select_with_count() {
        let response = translate(json!({
            "table": tasks_table(),
            "operation": {"select": {
                "conditions": {"status": {"$in": [1, 2, 3]}, "name": {"$like": "%abc%"}},
                "order": ["create_time asc"],
                "limit": 10,
                "count": true
            }}
        }))
        .unwrap();

        assert_eq!(
            response.sql,
            "SELECT * FROM tasks WHERE status IN (?, ?, ?) AND name LIKE ? ORDER BY create_time asc LIMIT 10 OFFSET 0"
        );
        assert_eq!(
            serde_json::to_value(&response.params).unwrap(),
            json!([1, 2, 3, "%abc%"])
        );
        assert_eq!(
            response.count_sql.as_deref(),
            Some("SELECT COUNT(*) AS count FROM (SELECT * FROM tasks WHERE status IN (?, ?, ?) AND name LIKE ?) AS t")
        );
    }

    #[test]
    fn select_uses_configured_default_limit() {
        let request: TranslateRequest = serde_json::from_value(json!({
            "table": tasks_table(),
            "operation": {"select": {}}
        }))
        .unwrap();
        let config = AppConfig {
            default_limit: 5,
            ..AppConfig::default()
        };
        let response = translate_request(&config, request).unwrap();
        assert_eq!(response.sql, "SELECT * FROM tasks ORDER BY ID asc LIMIT 5 OFFSET 0");
        assert!(response.count_sql.is_none());
    }

    #[test]
    fn translates_mutations() {
        let insert = translate(json!({
            "table": tasks_table(),
            "operation": {"insert": {"payload": {"name": "x", "bogus_col": "y"}}}
        }))
        .unwrap();
        assert_eq!(insert.sql, "INSERT INTO tasks (name) VALUES (?)");

        let update = translate(json!({
            "table": tasks_table(),
            "operation": {"update": {"conditions": {"ID": 3}, "payload": {"status": 2}, "many": true}}
        }))
        .unwrap();
        assert_eq!(update.sql, "UPDATE tasks SET status = ? WHERE ID = ?");

        let delete = translate(json!({
            "table": tasks_table(),
            "operation": {"delete": {"conditions": {"status": null}}}
        }))
        .unwrap();
        assert_eq!(delete.sql, "DELETE FROM tasks WHERE status IS NULL LIMIT 1");
        assert!(delete.params.is_empty());
    }

    #[test]
    fn surfaces_compile_errors() {
        let err = translate(json!({
            "table": tasks_table(),
            "operation": {"select": {"conditions": {"create_time": {"$btw": [1, 2, 3]}}}}
        }))
        .unwrap_err();
        assert!(matches!(err, QueryError::Validation(_)));

        let err = translate(json!({
            "table": tasks_table(),
            "operation": {"delete": {"conditions": {"status": {"$regex": "x"}}}}
        }))
        .unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedOperator { .. }));

        let err = translate(json!({
            "table": tasks_table(),
            "operation": {"update": {"conditions": {"ID": 1}, "payload": [1, 2]}}
        }))
        .unwrap_err();
        assert!(err.is_client_error());

        let err = translate(json!({
            "table": {"name": "tasks", "columns": ["name"]},
            "operation": {"select": {}}
        }))
        .unwrap_err();
        assert!(matches!(err, QueryError::InvalidDescriptor(_)));
    }
}
