use crate::{error::Result, statement::Statement};
use async_trait::async_trait;
use diesel::mysql::Mysql;
use diesel::QueryableByName;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    pub affected_rows: u64,
    /// `None` when the table has no auto-increment key.
    pub last_insert_id: Option<u64>,
}

/// Runs finished statements against the database.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn load<T>(&self, statement: &Statement) -> Result<Vec<T>>
    where
        T: QueryableByName<Mysql> + Send + 'static;

    /// Returns the affected-row count.
    async fn execute(&self, statement: &Statement) -> Result<u64>;

    async fn insert(&self, statement: &Statement) -> Result<InsertOutcome>;
}
