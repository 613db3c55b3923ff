use async_trait::async_trait;
use condsql::{Executor, InsertOutcome, Result, Statement};
use diesel::mysql::Mysql;
use diesel::QueryableByName;
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every statement and reports canned outcomes instead of touching a database.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    statements: Arc<Mutex<Vec<Statement>>>,
    affected_rows: u64,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn affecting(rows: u64) -> Self {
        Self {
            affected_rows: rows,
            ..Self::default()
        }
    }

    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements
            .lock()
            .iter()
            .map(|statement| statement.sql.clone())
            .collect()
    }

    fn record(&self, statement: &Statement) {
        self.statements.lock().push(statement.clone());
    }
}

#[async_trait]
impl Executor for RecordingExecutor {
    async fn load<T>(&self, statement: &Statement) -> Result<Vec<T>>
    where
        T: QueryableByName<Mysql> + Send + 'static,
    {
        self.record(statement);
        Ok(Vec::new())
    }

    async fn execute(&self, statement: &Statement) -> Result<u64> {
        self.record(statement);
        Ok(self.affected_rows)
    }

    async fn insert(&self, statement: &Statement) -> Result<InsertOutcome> {
        self.record(statement);
        Ok(InsertOutcome {
            affected_rows: self.affected_rows,
            last_insert_id: Some(1),
        })
    }
}
