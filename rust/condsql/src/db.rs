use crate::{
    config::AppConfig,
    error::{QueryError, Result},
    executor::{Executor, InsertOutcome},
    statement::Statement,
    value::BindParam,
};
use anyhow::Context;
use async_trait::async_trait;
use bb8::{ManageConnection, Pool, PooledConnection};
use diesel::mysql::Mysql;
use diesel::query_builder::{BoxedSqlQuery, SqlQuery};
use diesel::sql_query;
use diesel::QueryableByName;
use diesel_async::{AsyncConnection, AsyncMysqlConnection, RunQueryDsl, SimpleAsyncConnection};
use tracing::{debug, error, info};

pub type MysqlPool = Pool<MysqlConnectionManager>;

pub async fn connect_pool(config: &AppConfig) -> anyhow::Result<MysqlPool> {
    let database_url = config
        .database_url
        .as_deref()
        .context("CONDSQL_DATABASE_URL or DATABASE_URL must be set")?;
    let manager = MysqlConnectionManager::new(database_url)?;
    let pool = Pool::builder()
        .max_size(config.max_pool_size)
        .connection_timeout(config.connect_timeout)
        .build(manager)
        .await
        .context("failed to build MySQL connection pool")?;

    match pool.get().await {
        Ok(_) => info!("database connectivity check succeeded"),
        Err(err) => error!(error = ?err, "initial database connectivity check failed"),
    }

    Ok(pool)
}

#[derive(Clone)]
pub struct MysqlConnectionManager {
    database_url: String,
}

impl MysqlConnectionManager {
    pub fn new(database_url: &str) -> anyhow::Result<Self> {
        if !database_url.starts_with("mysql://") {
            anyhow::bail!("database url must use the mysql:// scheme");
        }
        Ok(Self {
            database_url: database_url.to_string(),
        })
    }
}

#[async_trait]
impl ManageConnection for MysqlConnectionManager {
    type Connection = AsyncMysqlConnection;
    type Error = anyhow::Error;

    async fn connect(&self) -> anyhow::Result<Self::Connection> {
        AsyncMysqlConnection::establish(&self.database_url)
            .await
            .map_err(|err| anyhow::anyhow!(err))
    }

    async fn is_valid(&self, conn: &mut Self::Connection) -> anyhow::Result<()> {
        conn.batch_execute("SELECT 1").await?;
        Ok(())
    }

    fn has_broken(&self, _: &mut Self::Connection) -> bool {
        false
    }
}

#[derive(QueryableByName)]
struct LastInsertId {
    #[diesel(sql_type = diesel::sql_types::Unsigned<diesel::sql_types::BigInt>)]
    id: u64,
}

async fn checkout(pool: &MysqlPool) -> Result<PooledConnection<'_, MysqlConnectionManager>> {
    pool.get().await.map_err(|err| {
        error!(error = ?err, "failed to acquire database connection");
        QueryError::Pool(format!("{err:?}"))
    })
}

fn bind_statement(statement: &Statement) -> BoxedSqlQuery<'static, Mysql, SqlQuery> {
    statement
        .params
        .iter()
        .fold(sql_query(statement.sql.clone()).into_boxed::<Mysql>(), |query, param| {
            param.apply(query)
        })
}

fn log_failure(statement: &Statement, err: diesel::result::Error) -> QueryError {
    error!(error = %err, sql = %statement.sql, "statement failed");
    QueryError::Database(err)
}

#[async_trait]
impl Executor for MysqlPool {
    async fn load<T>(&self, statement: &Statement) -> Result<Vec<T>>
    where
        T: QueryableByName<Mysql> + Send + 'static,
    {
        debug!(sql = %statement.sql, params = statement.params.len(), "select");
        let mut conn = checkout(self).await?;
        bind_statement(statement)
            .load::<T>(&mut *conn)
            .await
            .map_err(|err| log_failure(statement, err))
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        debug!(sql = %statement.sql, params = statement.params.len(), "execute");
        let mut conn = checkout(self).await?;
        let affected = bind_statement(statement)
            .execute(&mut *conn)
            .await
            .map_err(|err| log_failure(statement, err))?;
        Ok(affected as u64)
    }

    async fn insert(&self, statement: &Statement) -> Result<InsertOutcome> {
        debug!(sql = %statement.sql, params = statement.params.len(), "insert");
        let mut conn = checkout(self).await?;
        let affected = bind_statement(statement)
            .execute(&mut *conn)
            .await
            .map_err(|err| log_failure(statement, err))?;

        // LAST_INSERT_ID is scoped to the connection.
        let LastInsertId { id } = sql_query("SELECT LAST_INSERT_ID() AS id")
            .get_result::<LastInsertId>(&mut *conn)
            .await?;

        Ok(InsertOutcome {
            affected_rows: affected as u64,
            last_insert_id: (id > 0).then_some(id),
        })
    }
}

impl BindParam {
    fn apply<'a>(
        &self,
        query: BoxedSqlQuery<'a, Mysql, SqlQuery>,
    ) -> BoxedSqlQuery<'a, Mysql, SqlQuery> {
        use diesel::sql_types::{BigInt, Bool, Datetime, Double, Nullable, Text, Unsigned};
        match self {
            BindParam::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            BindParam::Bool(value) => query.bind::<Bool, _>(*value),
            BindParam::Int(value) => query.bind::<BigInt, _>(*value),
            BindParam::UInt(value) => query.bind::<Unsigned<BigInt>, _>(*value),
            BindParam::Float(value) => query.bind::<Double, _>(*value),
            BindParam::Text(value) => query.bind::<Text, _>(value.clone()),
            BindParam::Datetime(value) => query.bind::<Datetime, _>(*value),
        }
    }
}
