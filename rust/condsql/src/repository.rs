//! Generic per-table repository built on the condition compiler.

use crate::{
    assembler::{parse_order, OrderClause, PageSpec, RawSql, SelectQuery},
    compiler::compile,
    condition::ConditionMap,
    config::AppConfig,
    encoder::encode_field,
    error::{QueryError, Result},
    executor::{Executor, InsertOutcome},
    schema::TableDescriptor,
    statement::Statement,
    value::{FieldValue, Payload},
};
use diesel::mysql::Mysql;
use diesel::QueryableByName;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{marker::PhantomData, sync::Arc};
use tracing::debug;

/// Filter, projection, ordering and paging for one list query.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub conditions: ConditionMap,
    /// Columns to select instead of `*`.
    pub columns: Vec<String>,
    /// `"<column> <asc|desc>"` entries; the primary key ascending when empty.
    pub order: Vec<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Issue a second `COUNT(*)` statement.
    pub count: bool,
}

impl QueryRequest {
    pub fn new(conditions: ConditionMap) -> Self {
        Self {
            conditions,
            ..Self::default()
        }
    }

    pub fn order_by(mut self, order: &[&str]) -> Self {
        self.order = order.iter().map(|entry| entry.to_string()).collect();
        self
    }

    pub fn page(mut self, page: u64, limit: u64) -> Self {
        self.page = Some(page);
        self.limit = Some(limit);
        self
    }

    pub fn with_count(mut self) -> Self {
        self.count = true;
        self
    }
}

/// JSON form of a [`QueryRequest`]. Conditions stay raw so that building the
/// request reports `QueryError`s instead of deserialization failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct QueryRequestBody {
    pub conditions: Value,
    pub columns: Vec<String>,
    pub order: Vec<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub count: bool,
}

impl TryFrom<QueryRequestBody> for QueryRequest {
    type Error = QueryError;

    fn try_from(body: QueryRequestBody) -> Result<Self> {
        Ok(Self {
            conditions: ConditionMap::from_json(&body.conditions)?,
            columns: body.columns,
            order: body.order,
            page: body.page,
            limit: body.limit,
            count: body.count,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub count: Option<u64>,
}

/// Row and optional count statements for one list query.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectPlan {
    pub rows: Statement,
    pub count: Option<Statement>,
}

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

pub fn build_select(
    table: &TableDescriptor,
    request: &QueryRequest,
    default_limit: u64,
) -> Result<SelectPlan> {
    let page = PageSpec::new(
        request.page.unwrap_or(1),
        request.limit.unwrap_or(default_limit),
    )?;
    let order = resolve_order(table, &request.order)?;
    let filter = compile(table, &request.conditions)?;
    let query = SelectQuery::from_table(table, &request.columns, filter)?;

    Ok(SelectPlan {
        rows: query.paginate(&order, page)?,
        count: request.count.then(|| query.count()),
    })
}

pub fn build_raw_select(
    raw: RawSql,
    order: &[String],
    page: PageSpec,
    with_count: bool,
) -> Result<SelectPlan> {
    let order = parse_order(order)?;
    let query = SelectQuery::from_raw(raw);
    Ok(SelectPlan {
        rows: query.paginate(&order, page)?,
        count: with_count.then(|| query.count()),
    })
}

fn resolve_order(table: &TableDescriptor, raw: &[String]) -> Result<Vec<OrderClause>> {
    if raw.is_empty() {
        Ok(table.default_order())
    } else {
        parse_order(raw)
    }
}

/// Keeps the payload columns the table declares; `skip_keys` also drops the primary key.
fn writable_fields<'p>(
    table: &TableDescriptor,
    payload: &'p Payload,
    skip_keys: bool,
) -> Vec<(&'p str, &'p FieldValue)> {
    let mut kept = Vec::with_capacity(payload.len());
    for (column, value) in payload.iter() {
        if !table.contains(column) {
            debug!(table = table.name(), column, "dropping column outside table schema");
            continue;
        }
        if skip_keys && table.is_primary_key(column) {
            debug!(table = table.name(), column, "primary key is not updatable");
            continue;
        }
        kept.push((column, value));
    }
    kept
}

pub fn build_insert(table: &TableDescriptor, payload: &Payload) -> Result<Statement> {
    build_insert_many(table, std::slice::from_ref(payload))
}

/// Multi-row INSERT; every row must carry the same set of columns.
pub fn build_insert_many(table: &TableDescriptor, payloads: &[Payload]) -> Result<Statement> {
    let Some((first, rest)) = payloads.split_first() else {
        return Err(QueryError::Validation(format!(
            "no rows to insert into '{}'",
            table.name()
        )));
    };

    let head = writable_fields(table, first, false);
    if head.is_empty() {
        return Err(QueryError::Validation(format!(
            "payload for '{}' has no valid columns",
            table.name()
        )));
    }
    let columns: Vec<&str> = head.iter().map(|(column, _)| *column).collect();

    let mut rows = Vec::with_capacity(payloads.len());
    let mut params = Vec::new();
    let mut push_row = |fields: &[(&str, &FieldValue)]| {
        let mut values = Vec::with_capacity(fields.len());
        for (_, value) in fields {
            let fragment = encode_field(value);
            values.push(fragment.sql);
            params.extend(fragment.params);
        }
        rows.push(format!("({})", values.join(", ")));
    };

    push_row(&head);
    for (index, payload) in rest.iter().enumerate() {
        let fields = writable_fields(table, payload, false);
        let mut aligned = Vec::with_capacity(columns.len());
        for column in &columns {
            match fields.iter().find(|(name, _)| name == column) {
                Some(field) => aligned.push(*field),
                None => {
                    return Err(QueryError::Validation(format!(
                        "row {} for '{}' is missing column '{column}'",
                        index + 1,
                        table.name()
                    )))
                }
            }
        }
        if fields.len() != columns.len() {
            return Err(QueryError::Validation(format!(
                "row {} for '{}' has columns the first row lacks",
                index + 1,
                table.name()
            )));
        }
        push_row(&aligned);
    }

    Ok(Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            table.name(),
            columns.join(", "),
            rows.join(", ")
        ),
        params,
    ))
}

pub fn build_update(
    table: &TableDescriptor,
    conditions: &ConditionMap,
    payload: &Payload,
    single: bool,
) -> Result<Statement> {
    require_condition(table, conditions, "update")?;

    let fields = writable_fields(table, payload, true);
    if fields.is_empty() {
        return Err(QueryError::Validation(format!(
            "payload for '{}' has no updatable columns",
            table.name()
        )));
    }

    let mut sets = Vec::with_capacity(fields.len());
    let mut params = Vec::new();
    for (column, value) in fields {
        let fragment = encode_field(value);
        sets.push(format!("{column} = {}", fragment.sql));
        params.extend(fragment.params);
    }

    let filter = compile(table, conditions)?;
    params.extend(filter.params);

    let mut sql = format!("UPDATE {} SET {} {}", table.name(), sets.join(", "), filter.sql);
    if single {
        sql.push_str(" LIMIT 1");
    }
    Ok(Statement::new(sql, params))
}

pub fn build_delete(
    table: &TableDescriptor,
    conditions: &ConditionMap,
    single: bool,
) -> Result<Statement> {
    require_condition(table, conditions, "delete")?;
    let filter = compile(table, conditions)?;
    let mut sql = format!("DELETE FROM {} {}", table.name(), filter.sql);
    if single {
        sql.push_str(" LIMIT 1");
    }
    Ok(Statement::new(sql, filter.params))
}

fn require_condition(table: &TableDescriptor, conditions: &ConditionMap, action: &str) -> Result<()> {
    if conditions.is_empty() {
        return Err(QueryError::Validation(format!(
            "refusing to {action} every row of '{}' without a condition",
            table.name()
        )));
    }
    Ok(())
}

/// CRUD facade for one table. `E` is the row type loaded by queries.
pub struct Repository<E, X> {
    table: Arc<TableDescriptor>,
    executor: X,
    default_limit: u64,
    _row: PhantomData<fn() -> E>,
}

impl<E, X: Clone> Clone for Repository<E, X> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            executor: self.executor.clone(),
            default_limit: self.default_limit,
            _row: PhantomData,
        }
    }
}

impl<E, X> Repository<E, X>
where
    E: QueryableByName<Mysql> + Send + 'static,
    X: Executor,
{
    pub fn new(table: TableDescriptor, executor: X) -> Self {
        Self {
            table: Arc::new(table),
            executor,
            default_limit: 20,
            _row: PhantomData,
        }
    }

    /// Like [`Repository::new`], with the page size taken from `CONDSQL_DEFAULT_LIMIT`.
    pub fn from_config(table: TableDescriptor, executor: X, config: &AppConfig) -> Self {
        Self::new(table, executor).with_default_limit(config.default_limit)
    }

    pub fn with_default_limit(mut self, limit: u64) -> Self {
        self.default_limit = limit.max(1);
        self
    }

    pub fn table(&self) -> &TableDescriptor {
        &self.table
    }

    pub fn executor(&self) -> &X {
        &self.executor
    }

    pub async fn insert_one(&self, payload: &Payload) -> Result<InsertOutcome> {
        let statement = build_insert(&self.table, payload)?;
        statement.verify_arity()?;
        self.executor.insert(&statement).await
    }

    pub async fn insert_many(&self, payloads: &[Payload]) -> Result<InsertOutcome> {
        let statement = build_insert_many(&self.table, payloads)?;
        statement.verify_arity()?;
        self.executor.insert(&statement).await
    }

    /// Updates at most one row; returns the affected-row count.
    pub async fn update_one(&self, conditions: &ConditionMap, payload: &Payload) -> Result<u64> {
        self.update(conditions, payload, true).await
    }

    pub async fn update_many(&self, conditions: &ConditionMap, payload: &Payload) -> Result<u64> {
        self.update(conditions, payload, false).await
    }

    async fn update(&self, conditions: &ConditionMap, payload: &Payload, single: bool) -> Result<u64> {
        let statement = build_update(&self.table, conditions, payload, single)?;
        statement.verify_arity()?;
        self.executor.execute(&statement).await
    }

    pub async fn delete_one(&self, conditions: &ConditionMap) -> Result<u64> {
        self.delete(conditions, true).await
    }

    pub async fn delete_many(&self, conditions: &ConditionMap) -> Result<u64> {
        self.delete(conditions, false).await
    }

    async fn delete(&self, conditions: &ConditionMap, single: bool) -> Result<u64> {
        let statement = build_delete(&self.table, conditions, single)?;
        statement.verify_arity()?;
        self.executor.execute(&statement).await
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<Page<E>> {
        let plan = build_select(&self.table, request, self.default_limit)?;
        self.run_plan(plan).await
    }

    pub async fn query_one(&self, conditions: &ConditionMap) -> Result<Option<E>> {
        let request = QueryRequest {
            conditions: conditions.clone(),
            page: Some(1),
            limit: Some(1),
            ..QueryRequest::default()
        };
        let page = self.query(&request).await?;
        Ok(page.data.into_iter().next())
    }

    /// Pages hand-written SQL. Column validation does not apply.
    pub async fn query_raw(
        &self,
        raw: RawSql,
        order: &[String],
        page: PageSpec,
        with_count: bool,
    ) -> Result<Page<E>> {
        let plan = build_raw_select(raw, order, page, with_count)?;
        self.run_plan(plan).await
    }

    /// Runs hand-written SQL unchanged. Column validation does not apply.
    pub async fn query_by_sql<T>(&self, raw: RawSql) -> Result<Vec<T>>
    where
        T: QueryableByName<Mysql> + Send + 'static,
    {
        let statement = raw.into_statement();
        statement.verify_arity()?;
        debug!(table = self.table.name(), sql = %statement.sql, "unchecked sql");
        self.executor.load::<T>(&statement).await
    }

    async fn run_plan(&self, plan: SelectPlan) -> Result<Page<E>> {
        plan.rows.verify_arity()?;
        let data = self.executor.load::<E>(&plan.rows).await?;

        let count = match &plan.count {
            Some(statement) => {
                let rows = self.executor.load::<CountRow>(statement).await?;
                let total = rows.first().map(|row| row.count).unwrap_or(0);
                Some(u64::try_from(total).unwrap_or(0))
            }
            None => None,
        };

        Ok(Page { data, count })
    }
}
