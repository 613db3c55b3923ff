pub mod assembler;
pub mod compiler;
pub mod condition;
pub mod config;
pub mod db;
pub mod encoder;
pub mod error;
pub mod executor;
pub mod repository;
pub mod schema;
pub mod statement;
pub mod telemetry;
pub mod translate;
pub mod value;

pub use crate::{
    assembler::{OrderClause, OrderDirection, PageSpec, RawSql},
    condition::{Condition, ConditionMap},
    error::{QueryError, Result},
    executor::{Executor, InsertOutcome},
    repository::{Page, QueryRequest, QueryRequestBody, Repository},
    schema::TableDescriptor,
    statement::Statement,
    value::{BindParam, FieldValue, Payload},
};

use crate::{config::AppConfig, translate::TranslateRequest};
use anyhow::Context;
use std::io::{Read, Write};

/// Reads a JSON translate request from `input` and writes the translated SQL to `output`.
pub fn run_translate(input: impl Read, mut output: impl Write) -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let request: TranslateRequest =
        serde_json::from_reader(input).context("failed to parse translate request")?;
    let response = translate::translate_request(&config, request)?;
    serde_json::to_writer_pretty(&mut output, &response)
        .context("failed to write translate response")?;
    writeln!(output)?;
    Ok(())
}
