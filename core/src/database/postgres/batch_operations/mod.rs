//! Set-based batch mutations executed as one statement per chunk.
//!
//! UPDATE and DELETE are expressed as a join between the target table and an
//! inline VALUES row-set carrying one row per record, so a chunk costs one
//! round trip instead of one per row. Chunks are capped because every row
//! contributes one parameter per named column and engine parameter ceilings
//! sit in the low thousands.

mod binder;
mod bulk;
mod planner;
mod query_builder;

pub use binder::{bind_record, resolve_columns, ResolvedColumn};
pub use bulk::{bulk_insert, BulkDestination, CopyOptions};
pub use planner::{plan_batches, BatchPlan};
pub use query_builder::{format_table_name, quote_identifier};

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::database::postgres::bulk_copy::BulkWriteError;
use crate::database::postgres::client::{PostgresError, PostgresTransaction, ToSql};
use crate::database::postgres::sql_type_wrapper::{SqlType, SqlValue};
use crate::record::TableRecord;

use self::query_builder::{
    build_cte_header, build_delete_body, build_key_condition, build_set_clause, build_update_body,
    build_values_rows, build_where_clause, update_alias,
};

/// Rows per generated UPDATE/DELETE statement.
pub const DEFAULT_STATEMENT_ROWS: usize = 300;

/// Rows per bulk-load COPY round trip.
pub const DEFAULT_COPY_ROWS: usize = 1000;

/// Timeout hint applied to each COPY round trip.
pub const DEFAULT_COPY_TIMEOUT: Duration = Duration::from_secs(60);

/// Chunking bounds for batch operations.
///
/// The defaults fit typical PostgreSQL parameter ceilings; engines with
/// different limits get different bounds here rather than a code change.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub statement_rows: usize,
    pub copy_rows: usize,
    pub copy_timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            statement_rows: DEFAULT_STATEMENT_ROWS,
            copy_rows: DEFAULT_COPY_ROWS,
            copy_timeout: DEFAULT_COPY_TIMEOUT,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigurationError {
    #[error("record type {0} resolves to an empty table name")]
    MissingTableName(&'static str),

    #[error("key columns must not be empty")]
    EmptyKeyColumns,

    #[error("update columns must not be empty")]
    EmptyUpdateColumns,

    #[error("column '{column}' has no mapped field on record type {record_type}")]
    UnresolvableColumn { column: String, record_type: &'static str },

    #[error("no declared column on record type {record_type} exists on table '{table}'")]
    NoMappedColumns { record_type: &'static str, table: String },

    #[error("batch size must be at least 1")]
    InvalidBatchSize,
}

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("no records supplied")]
    NoRecords,

    #[error("column '{column}' is not nullable but row {row} holds no value")]
    NullInNonNullableColumn { column: String, row: usize },
}

#[derive(thiserror::Error, Debug)]
pub enum BatchOperationError {
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),

    #[error("{0}")]
    Validation(#[from] ValidationError),

    #[error("{0}")]
    Postgres(#[from] PostgresError),

    #[error("{0}")]
    BulkWrite(#[from] BulkWriteError),
}

/// Runs one generated statement against the caller's open transaction.
///
/// The affected-row count is surfaced for logging only; batch operations
/// discard it.
#[async_trait]
pub trait StatementExecutor: Send {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, PostgresError>;
}

#[async_trait]
impl StatementExecutor for PostgresTransaction<'_> {
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, PostgresError> {
        let params: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|param| param as &(dyn ToSql + Sync)).collect();

        self.transaction.execute(sql, &params).await.map_err(PostgresError::PgError)
    }
}

/// Applies `update_columns` from every record to the table rows matching its
/// `key_columns`, one statement per chunk of `config.statement_rows` records.
///
/// Every chunk runs inside the caller's transaction: a failing chunk leaves
/// earlier chunks applied, and commit or rollback stays with the caller.
pub async fn batch_update<T, E>(
    executor: &mut E,
    items: &[T],
    key_columns: &[&str],
    update_columns: &[&str],
    config: &BatchConfig,
) -> Result<(), BatchOperationError>
where
    T: TableRecord,
    E: StatementExecutor,
{
    if items.is_empty() {
        return Err(ValidationError::NoRecords.into());
    }
    if key_columns.is_empty() {
        return Err(ConfigurationError::EmptyKeyColumns.into());
    }
    if update_columns.is_empty() {
        return Err(ConfigurationError::EmptyUpdateColumns.into());
    }

    let table_name = require_table_name::<T>()?;
    let keys = resolve_columns::<T>(key_columns)?;
    let updates = resolve_columns::<T>(update_columns)?;

    for range in plan_batches(items.len(), config.statement_rows)? {
        let chunk = &items[range];
        let sql = build_update_sql(table_name, &keys, &updates, chunk.len());

        let mut params = Vec::with_capacity(chunk.len() * (keys.len() + updates.len()));
        for record in chunk {
            params.extend(bind_record(record, &keys));
            params.extend(bind_record(record, &updates));
        }

        debug!("batch update statement: {}", sql);
        let affected = executor.execute(&sql, &params).await?;
        debug!("batch update matched {} rows on {}", affected, table_name);
    }

    Ok(())
}

/// Deletes the table rows matching every record's `key_columns`, one
/// statement per chunk of `config.statement_rows` records.
pub async fn batch_delete<T, E>(
    executor: &mut E,
    items: &[T],
    key_columns: &[&str],
    config: &BatchConfig,
) -> Result<(), BatchOperationError>
where
    T: TableRecord,
    E: StatementExecutor,
{
    if items.is_empty() {
        return Err(ValidationError::NoRecords.into());
    }
    if key_columns.is_empty() {
        return Err(ConfigurationError::EmptyKeyColumns.into());
    }

    let table_name = require_table_name::<T>()?;
    let keys = resolve_columns::<T>(key_columns)?;

    for range in plan_batches(items.len(), config.statement_rows)? {
        let chunk = &items[range];
        let sql = build_delete_sql(table_name, &keys, chunk.len());

        let mut params = Vec::with_capacity(chunk.len() * keys.len());
        for record in chunk {
            params.extend(bind_record(record, &keys));
        }

        debug!("batch delete statement: {}", sql);
        let affected = executor.execute(&sql, &params).await?;
        debug!("batch delete removed {} rows from {}", affected, table_name);
    }

    Ok(())
}

pub(crate) fn require_table_name<T: TableRecord>() -> Result<&'static str, ConfigurationError> {
    let table_name = T::table_name();
    if table_name.is_empty() {
        return Err(ConfigurationError::MissingTableName(std::any::type_name::<T>()));
    }
    Ok(table_name)
}

fn build_update_sql(
    table_name: &str,
    keys: &[ResolvedColumn],
    updates: &[ResolvedColumn],
    row_count: usize,
) -> String {
    let key_names: Vec<&str> = keys.iter().map(|column| column.spec.column).collect();

    let mut aliases: Vec<String> = key_names.iter().map(|name| name.to_string()).collect();
    let mut set_clauses = Vec::with_capacity(updates.len());
    for column in updates {
        let alias = update_alias(column.spec.column, &key_names);
        set_clauses.push(build_set_clause(column.spec.column, &alias));
        aliases.push(alias);
    }

    let column_types: Vec<SqlType> =
        keys.iter().chain(updates).map(|column| column.spec.sql_type).collect();

    let mut sql = build_cte_header(&aliases);
    sql.push_str(&build_values_rows(&column_types, row_count));
    sql.push_str("\n)");
    sql.push_str(&build_update_body(&format_table_name(table_name), set_clauses));
    sql.push_str(&build_where_clause(&key_conditions(keys)));
    sql
}

fn build_delete_sql(table_name: &str, keys: &[ResolvedColumn], row_count: usize) -> String {
    let aliases: Vec<String> =
        keys.iter().map(|column| column.spec.column.to_string()).collect();
    let column_types: Vec<SqlType> = keys.iter().map(|column| column.spec.sql_type).collect();

    let mut sql = build_cte_header(&aliases);
    sql.push_str(&build_values_rows(&column_types, row_count));
    sql.push_str("\n)");
    sql.push_str(&build_delete_body(&format_table_name(table_name)));
    sql.push_str(&build_where_clause(&key_conditions(keys)));
    sql
}

fn key_conditions(keys: &[ResolvedColumn]) -> Vec<String> {
    keys.iter().map(|column| build_key_condition(column.spec.column)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::postgres::sql_type_wrapper::SqlType;

    #[derive(Clone)]
    struct Listing {
        id: i64,
        region: String,
        price: i64,
        status: String,
        note: Option<String>,
    }

    crate::impl_table_record!(
        Listing,
        "market.listings",
        [
            (id, "id", SqlType::BigInt, not_null),
            (region, "region", SqlType::Varchar, not_null),
            (price, "price", SqlType::BigInt, not_null),
            (status, "status", SqlType::Varchar, not_null),
            (note, "note", SqlType::Varchar, nullable),
        ]
    );

    fn listing(id: i64) -> Listing {
        Listing {
            id,
            region: format!("region-{}", id % 4),
            price: id * 10,
            status: "open".to_string(),
            note: None,
        }
    }

    #[derive(Default)]
    struct RecordingExecutor {
        statements: Vec<(String, Vec<SqlValue>)>,
    }

    #[async_trait]
    impl StatementExecutor for RecordingExecutor {
        async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64, PostgresError> {
            self.statements.push((sql.to_string(), params.to_vec()));
            Ok(params.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_update_chunks_750_records_into_300_300_150() {
        let items: Vec<Listing> = (0..750).map(listing).collect();
        let mut executor = RecordingExecutor::default();

        batch_update(
            &mut executor,
            &items,
            &["id", "region"],
            &["price", "status", "note"],
            &BatchConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(executor.statements.len(), 3);
        // five bound parameters per record: two keys and three updates
        assert_eq!(executor.statements[0].1.len(), 300 * 5);
        assert_eq!(executor.statements[1].1.len(), 300 * 5);
        assert_eq!(executor.statements[2].1.len(), 150 * 5);
    }

    #[tokio::test]
    async fn test_update_statement_shape_matches_column_counts() {
        let items: Vec<Listing> = (0..2).map(listing).collect();
        let mut executor = RecordingExecutor::default();

        batch_update(
            &mut executor,
            &items,
            &["id", "region"],
            &["price", "status", "note"],
            &BatchConfig::default(),
        )
        .await
        .unwrap();

        let sql = &executor.statements[0].0;

        // one AND per key column minus one
        let where_clause = sql.split("WHERE").nth(1).unwrap();
        assert_eq!(where_clause.matches("AND").count(), 1);

        // one comma per update column minus one
        let set_clause = sql.split("SET ").nth(1).unwrap().split("\nFROM").next().unwrap();
        assert_eq!(set_clause.matches(',').count(), 2);

        assert!(sql.contains("UPDATE \"market\".\"listings\" dst"));
        assert!(sql.contains("price = src.price"));
        assert!(sql.contains("dst.id = src.id"));
    }

    #[tokio::test]
    async fn test_statement_shape_depends_on_rows_not_values() {
        let items: Vec<Listing> = (0..600).map(listing).collect();
        let mut executor = RecordingExecutor::default();

        batch_update(&mut executor, &items, &["id"], &["price"], &BatchConfig::default())
            .await
            .unwrap();

        assert_eq!(executor.statements.len(), 2);
        assert_eq!(executor.statements[0].0, executor.statements[1].0);
        assert_ne!(executor.statements[0].1, executor.statements[1].1);
    }

    #[tokio::test]
    async fn test_shared_key_and_update_column_gets_distinct_positions() {
        let items = vec![listing(1)];
        let mut executor = RecordingExecutor::default();

        batch_update(&mut executor, &items, &["id"], &["id", "price"], &BatchConfig::default())
            .await
            .unwrap();

        let (sql, params) = &executor.statements[0];

        assert!(sql.contains("WITH incoming (id, id__set, price)"));
        assert!(sql.contains("id = src.id__set"));
        assert!(sql.contains("dst.id = src.id"));
        // the shared column is bound twice, once per VALUES position
        assert_eq!(params.len(), 3);
        assert_eq!(params[0], params[1]);
    }

    #[tokio::test]
    async fn test_absent_update_value_is_bound_as_null() {
        let item = Listing {
            id: 5,
            region: "region-1".to_string(),
            price: 50,
            status: "open".to_string(),
            note: None,
        };
        let mut executor = RecordingExecutor::default();

        batch_update(&mut executor, &[item], &["id"], &["note"], &BatchConfig::default())
            .await
            .unwrap();

        let params = &executor.statements[0].1;
        assert_eq!(params.len(), 2);
        assert_eq!(params[1], SqlValue::Null);
    }

    #[tokio::test]
    async fn test_empty_update_columns_fail_before_any_statement() {
        let items = vec![listing(1)];
        let mut executor = RecordingExecutor::default();

        let result =
            batch_update(&mut executor, &items, &["id"], &[], &BatchConfig::default()).await;

        assert!(matches!(
            result,
            Err(BatchOperationError::Configuration(ConfigurationError::EmptyUpdateColumns))
        ));
        assert!(executor.statements.is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_column_fails_before_any_statement() {
        let items: Vec<Listing> = (0..10).map(listing).collect();
        let mut executor = RecordingExecutor::default();

        let result =
            batch_update(&mut executor, &items, &["id"], &["warehouse"], &BatchConfig::default())
                .await;

        assert!(matches!(
            result,
            Err(BatchOperationError::Configuration(ConfigurationError::UnresolvableColumn { .. }))
        ));
        assert!(executor.statements.is_empty());
    }

    #[tokio::test]
    async fn test_empty_items_are_a_validation_error() {
        let mut executor = RecordingExecutor::default();

        let result = batch_update(
            &mut executor,
            &Vec::<Listing>::new(),
            &["id"],
            &["price"],
            &BatchConfig::default(),
        )
        .await;

        assert!(matches!(
            result,
            Err(BatchOperationError::Validation(ValidationError::NoRecords))
        ));
        assert!(executor.statements.is_empty());
    }

    #[tokio::test]
    async fn test_delete_uses_using_join_and_single_key_has_no_and() {
        let items: Vec<Listing> = (0..3).map(listing).collect();
        let mut executor = RecordingExecutor::default();

        batch_delete(&mut executor, &items, &["id"], &BatchConfig::default()).await.unwrap();

        let (sql, params) = &executor.statements[0];
        assert!(sql.contains("DELETE FROM \"market\".\"listings\" dst"));
        assert!(sql.contains("USING incoming src"));
        assert!(!sql.split("WHERE").nth(1).unwrap().contains("AND"));
        assert_eq!(params.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_empty_key_columns_are_a_configuration_error() {
        let items = vec![listing(1)];
        let mut executor = RecordingExecutor::default();

        let result = batch_delete(&mut executor, &items, &[], &BatchConfig::default()).await;

        assert!(matches!(
            result,
            Err(BatchOperationError::Configuration(ConfigurationError::EmptyKeyColumns))
        ));
        assert!(executor.statements.is_empty());
    }

    #[tokio::test]
    async fn test_zero_statement_rows_fail_before_any_statement() {
        let items = vec![listing(1)];
        let mut executor = RecordingExecutor::default();
        let config = BatchConfig { statement_rows: 0, ..BatchConfig::default() };

        let result = batch_update(&mut executor, &items, &["id"], &["price"], &config).await;

        assert!(matches!(
            result,
            Err(BatchOperationError::Configuration(ConfigurationError::InvalidBatchSize))
        ));
        assert!(executor.statements.is_empty());
    }
}
