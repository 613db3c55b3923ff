//! Combines a base SELECT with ordering and pagination.

use crate::{
    compiler::WhereClause,
    error::{QueryError, Result},
    schema::{is_identifier, TableDescriptor},
    statement::{top_level_words, Statement},
    value::BindParam,
};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderClause {
    pub column: String,
    pub direction: OrderDirection,
}

impl OrderClause {
    /// Parses `"<column> <asc|desc>"`. The column may be qualified (`t.col`).
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.split_whitespace();
        let (Some(column), Some(direction), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(QueryError::InvalidOrder(format!(
                "expected '<column> <asc|desc>', got '{raw}'"
            )));
        };

        if !column.split('.').all(is_identifier) {
            return Err(QueryError::InvalidOrder(format!(
                "'{column}' is not a column name"
            )));
        }

        let direction = match direction.to_ascii_lowercase().as_str() {
            "asc" => OrderDirection::Asc,
            "desc" => OrderDirection::Desc,
            other => {
                return Err(QueryError::InvalidOrder(format!(
                    "unknown sort direction '{other}' for '{column}'"
                )))
            }
        };

        Ok(Self {
            column: column.to_string(),
            direction,
        })
    }

    pub fn to_sql(&self) -> String {
        format!("{} {}", self.column, self.direction.as_str())
    }
}

pub fn parse_order(raw: &[String]) -> Result<Vec<OrderClause>> {
    raw.iter().map(|entry| OrderClause::parse(entry)).collect()
}

/// One-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageSpec {
    page: u64,
    limit: u64,
}

impl PageSpec {
    pub fn new(page: u64, limit: u64) -> Result<Self> {
        if page == 0 {
            return Err(QueryError::Validation("page must be at least 1".into()));
        }
        if limit == 0 {
            return Err(QueryError::Validation("limit must be at least 1".into()));
        }
        let spec = Self { page, limit };
        spec.checked_offset()?;
        Ok(spec)
    }

    pub fn first(limit: u64) -> Result<Self> {
        Self::new(1, limit)
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    fn checked_offset(&self) -> Result<u64> {
        (self.page - 1).checked_mul(self.limit).ok_or_else(|| {
            QueryError::Validation(format!(
                "page {} with limit {} overflows the row offset",
                self.page, self.limit
            ))
        })
    }
}

/// Hand-written SQL that bypasses column validation.
///
/// Only build this from SQL written in code; request input belongs in `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSql {
    sql: String,
    params: Vec<BindParam>,
}

impl RawSql {
    pub fn trusted(sql: impl Into<String>, params: Vec<BindParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[BindParam] {
        &self.params
    }

    pub fn into_statement(self) -> Statement {
        Statement::new(self.sql, self.params)
    }
}

/// Base SELECT before ordering and pagination are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery<'t> {
    /// `None` in passthrough mode.
    table: Option<&'t TableDescriptor>,
    sql: String,
    params: Vec<BindParam>,
}

impl<'t> SelectQuery<'t> {
    /// `SELECT * FROM <table> <where>`, or the listed columns instead of `*`.
    pub fn from_table(
        table: &'t TableDescriptor,
        projection: &[String],
        filter: WhereClause,
    ) -> Result<Self> {
        for column in projection {
            table.require(column)?;
        }

        let columns = if projection.is_empty() {
            "*".to_string()
        } else {
            projection.join(", ")
        };

        let mut sql = format!("SELECT {columns} FROM {}", table.name());
        if !filter.is_empty() {
            sql.push(' ');
            sql.push_str(&filter.sql);
        }

        Ok(Self {
            table: Some(table),
            sql,
            params: filter.params,
        })
    }

    /// Passthrough mode: the caller's SQL and params are kept verbatim.
    pub fn from_raw(raw: RawSql) -> Self {
        let sql = raw.sql.trim().trim_end_matches(';').trim_end().to_string();
        Self {
            table: None,
            sql,
            params: raw.params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Appends `ORDER BY` (when given) and `LIMIT/OFFSET`.
    ///
    /// Passthrough SQL that already carries a top-level `ORDER BY` or `LIMIT` keeps
    /// its own clause and the corresponding argument is ignored.
    pub fn paginate(&self, order: &[OrderClause], page: PageSpec) -> Result<Statement> {
        let (has_order, has_limit) = match self.table {
            Some(table) => {
                for clause in order {
                    require_order_column(table, &clause.column)?;
                }
                (false, false)
            }
            None => existing_clauses(&self.sql),
        };

        let mut sql = self.sql.clone();
        if !order.is_empty() {
            if has_order {
                debug!("keeping ORDER BY from passthrough sql");
            } else {
                let rendered: Vec<String> = order.iter().map(OrderClause::to_sql).collect();
                sql.push_str(" ORDER BY ");
                sql.push_str(&rendered.join(", "));
            }
        }

        if has_limit {
            debug!("keeping LIMIT from passthrough sql");
        } else {
            sql.push_str(&format!(" LIMIT {} OFFSET {}", page.limit(), page.offset()));
        }
        Ok(Statement::new(sql, self.params.clone()))
    }

    /// Row count of the unpaginated base query.
    pub fn count(&self) -> Statement {
        Statement::new(
            format!("SELECT COUNT(*) AS count FROM ({}) AS t", self.sql),
            self.params.clone(),
        )
    }
}

/// Accepts `col` or `<table>.col` for a column of `table`.
fn require_order_column(table: &TableDescriptor, column: &str) -> Result<()> {
    let bare = match column.split_once('.') {
        Some((qualifier, rest)) if qualifier == table.name() => rest,
        _ => column,
    };
    table.require(bare)
}

/// Whether `sql` already has a top-level `ORDER BY` and `LIMIT`.
fn existing_clauses(sql: &str) -> (bool, bool) {
    let words = top_level_words(sql);
    let has_order = words
        .windows(2)
        .any(|pair| pair[0] == "ORDER" && pair[1] == "BY");
    let has_limit = words.iter().any(|word| word == "LIMIT");
    (has_order, has_limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tasks() -> TableDescriptor {
        crate::table_descriptor!(tasks (ID) { ID, status, name, create_time }).unwrap()
    }

    #[test]
    fn parses_order_entries() {
        let clause = OrderClause::parse("create_time DESC").unwrap();
        assert_eq!(clause.column, "create_time");
        assert_eq!(clause.direction, OrderDirection::Desc);
        assert_eq!(clause.to_sql(), "create_time desc");
        assert_eq!(OrderClause::parse("tt.priority asc").unwrap().column, "tt.priority");
    }

    #[test]
    fn rejects_malformed_order_entries() {
        for raw in ["create_time", "create_time sideways", "a asc, b desc", "1=1 asc", ""] {
            assert!(
                matches!(OrderClause::parse(raw), Err(QueryError::InvalidOrder(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn pagination_offsets() {
        let page = PageSpec::new(2, 20).unwrap();
        assert_eq!((page.limit(), page.offset()), (20, 20));
        let page = PageSpec::new(1, 1).unwrap();
        assert_eq!((page.limit(), page.offset()), (1, 0));
        assert!(PageSpec::new(0, 10).is_err());
        assert!(PageSpec::new(1, 0).is_err());
        assert!(PageSpec::new(u64::MAX, u64::MAX).is_err());
    }

    #[test]
    fn table_select_with_order_and_page() {
        let table = tasks();
        let query = SelectQuery::from_table(&table, &[], WhereClause::default()).unwrap();
        let order = parse_order(&["create_time asc".to_string()]).unwrap();
        let statement = query.paginate(&order, PageSpec::new(2, 20).unwrap()).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT * FROM tasks ORDER BY create_time asc LIMIT 20 OFFSET 20"
        );
        assert!(statement.params.is_empty());
    }

    #[test]
    fn projection_and_order_columns_must_exist() {
        let table = tasks();
        assert!(SelectQuery::from_table(&table, &["password".to_string()], WhereClause::default()).is_err());

        let query =
            SelectQuery::from_table(&table, &["ID".to_string(), "name".to_string()], WhereClause::default())
                .unwrap();
        assert_eq!(query.sql(), "SELECT ID, name FROM tasks");
        let order = parse_order(&["priority desc".to_string()]).unwrap();
        let err = query.paginate(&order, PageSpec::first(10).unwrap()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidColumn { .. }));
    }

    #[test]
    fn raw_passthrough_keeps_sql_and_params() {
        let raw = RawSql::trusted(
            "SELECT tt.*, ti.msg_cnt FROM t_task tt LEFT JOIN t_interact ti ON tt.ID = ti.task_id WHERE tt.status != ?;",
            vec![BindParam::Int(5)],
        );
        let query = SelectQuery::from_raw(raw);
        let order = parse_order(&["tt.priority desc".to_string()]).unwrap();
        let statement = query.paginate(&order, PageSpec::first(50).unwrap()).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT tt.*, ti.msg_cnt FROM t_task tt LEFT JOIN t_interact ti ON tt.ID = ti.task_id WHERE tt.status != ? ORDER BY tt.priority desc LIMIT 50 OFFSET 0"
        );
        assert_eq!(statement.params, vec![BindParam::Int(5)]);

        let count = query.count();
        assert!(count.sql.starts_with("SELECT COUNT(*) AS count FROM (SELECT tt.*"));
        assert!(count.sql.ends_with(") AS t"));
        assert_eq!(count.params, vec![BindParam::Int(5)]);
    }

    #[test]
    fn table_qualified_order_columns() {
        let table = tasks();
        let query = SelectQuery::from_table(&table, &[], WhereClause::default()).unwrap();

        let order = parse_order(&["tasks.create_time asc".to_string()]).unwrap();
        let statement = query.paginate(&order, PageSpec::first(5).unwrap()).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT * FROM tasks ORDER BY tasks.create_time asc LIMIT 5 OFFSET 0"
        );

        for raw in ["other.create_time asc", "tasks.bogus asc"] {
            let order = parse_order(&[raw.to_string()]).unwrap();
            let err = query.paginate(&order, PageSpec::first(5).unwrap()).unwrap_err();
            assert!(matches!(err, QueryError::InvalidColumn { .. }), "{raw}: {err:?}");
        }
    }

    #[test]
    fn passthrough_keeps_existing_order_and_limit() {
        let query = SelectQuery::from_raw(RawSql::trusted(
            "SELECT * FROM t WHERE a = ? LIMIT ?,?",
            vec![BindParam::Int(1), BindParam::Int(0), BindParam::Int(10)],
        ));
        let statement = query.paginate(&[], PageSpec::first(20).unwrap()).unwrap();
        assert_eq!(statement.sql, "SELECT * FROM t WHERE a = ? LIMIT ?,?");
        statement.verify_arity().unwrap();

        let query = SelectQuery::from_raw(RawSql::trusted(
            "SELECT * FROM login_log WHERE user_id = ? ORDER BY create_time desc",
            vec![BindParam::Int(7)],
        ));
        let order = parse_order(&["id asc".to_string()]).unwrap();
        let statement = query.paginate(&order, PageSpec::new(2, 10).unwrap()).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT * FROM login_log WHERE user_id = ? ORDER BY create_time desc LIMIT 10 OFFSET 10"
        );
    }

    #[test]
    fn passthrough_ignores_clauses_in_subqueries_and_literals() {
        let query = SelectQuery::from_raw(RawSql::trusted(
            "SELECT * FROM (SELECT id FROM t ORDER BY id LIMIT 3) x WHERE note != 'limit'",
            vec![],
        ));
        let order = parse_order(&["id desc".to_string()]).unwrap();
        let statement = query.paginate(&order, PageSpec::first(3).unwrap()).unwrap();
        assert_eq!(
            statement.sql,
            "SELECT * FROM (SELECT id FROM t ORDER BY id LIMIT 3) x WHERE note != 'limit' ORDER BY id desc LIMIT 3 OFFSET 0"
        );
    }
}
