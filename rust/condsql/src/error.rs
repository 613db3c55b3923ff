use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryError>;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid column '{column}' for table '{table}'")]
    InvalidColumn { table: String, column: String },

    #[error("unsupported operator '{operator}' on column '{column}'")]
    UnsupportedOperator { operator: String, column: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid order clause: {0}")]
    InvalidOrder(String),

    #[error("invalid table descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("connection pool error: {0}")]
    Pool(String),

    /// Driver failures are passed through untouched.
    #[error(transparent)]
    Database(#[from] diesel::result::Error),

    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

impl QueryError {
    pub(crate) fn invalid_column(table: &str, column: &str) -> Self {
        QueryError::InvalidColumn {
            table: table.to_string(),
            column: column.to_string(),
        }
    }

    /// Errors caused by the caller's input rather than the database.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            QueryError::InvalidColumn { .. }
                | QueryError::UnsupportedOperator { .. }
                | QueryError::Validation(_)
                | QueryError::InvalidOrder(_)
        )
    }
}
