//! Bulk-load path: COPY-backed inserts behind a live-schema column mapping.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{
    plan_batches, require_table_name, BatchConfig, BatchOperationError, ConfigurationError,
    ValidationError,
};
use crate::database::postgres::bulk_copy::BulkWriteError;
use crate::database::postgres::client::PostgresError;
use crate::database::postgres::sql_type_wrapper::SqlValue;
use crate::record::{ColumnSpec, TableRecord};

/// Per-round-trip hints handed to the transport.
#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub timeout: Duration,
}

/// Destination boundary for the bulk-load path: live schema lookup plus the
/// high-throughput row transport.
#[async_trait]
pub trait BulkDestination: Send {
    /// Column names currently live on the destination table.
    async fn live_columns(&mut self, table_name: &str) -> Result<HashSet<String>, PostgresError>;

    /// Writes one chunk of materialized rows.
    async fn write_rows(
        &mut self,
        table_name: &str,
        columns: &[&'static ColumnSpec],
        rows: &[Vec<SqlValue>],
        options: &CopyOptions,
    ) -> Result<(), BulkWriteError>;
}

/// Bulk-loads `items` into the record type's table.
///
/// The column set comes from the declared descriptor table of `T`, never
/// from the runtime shape of individual elements. The whole collection is
/// validated before the first write, and declared columns missing from the
/// live table are dropped from the mapping rather than rejected. Writes go
/// out in chunks of `config.copy_rows` rows.
pub async fn bulk_insert<T, D>(
    destination: &mut D,
    items: &[T],
    config: &BatchConfig,
) -> Result<(), BatchOperationError>
where
    T: TableRecord,
    D: BulkDestination,
{
    if items.is_empty() {
        return Err(ValidationError::NoRecords.into());
    }

    let table_name = require_table_name::<T>()?;

    validate_required_columns(items)?;

    let live = destination.live_columns(table_name).await?;
    let mapped = map_columns::<T>(&live);
    if mapped.is_empty() {
        return Err(ConfigurationError::NoMappedColumns {
            record_type: std::any::type_name::<T>(),
            table: table_name.to_string(),
        }
        .into());
    }

    let columns: Vec<&'static ColumnSpec> = mapped.iter().map(|(_, spec)| *spec).collect();
    let options = CopyOptions { timeout: config.copy_timeout };

    for range in plan_batches(items.len(), config.copy_rows)? {
        let rows: Vec<Vec<SqlValue>> = items[range]
            .iter()
            .map(|record| mapped.iter().map(|(index, _)| record.value(*index)).collect())
            .collect();

        destination.write_rows(table_name, &columns, &rows, &options).await?;
    }

    debug!("bulk loaded {} rows into {}", items.len(), table_name);
    Ok(())
}

/// Rejects the whole collection before any write when a non-nullable column
/// holds an absent value, reporting the first offending column and row.
fn validate_required_columns<T: TableRecord>(items: &[T]) -> Result<(), ValidationError> {
    let required: Vec<(usize, &ColumnSpec)> =
        T::columns().iter().enumerate().filter(|(_, spec)| !spec.nullable).collect();

    for (row, record) in items.iter().enumerate() {
        for (index, spec) in &required {
            if record.value(*index).is_null() {
                return Err(ValidationError::NullInNonNullableColumn {
                    column: spec.column.to_string(),
                    row,
                });
            }
        }
    }

    Ok(())
}

/// Restricts the declared columns to those present on the live table.
fn map_columns<T: TableRecord>(live: &HashSet<String>) -> Vec<(usize, &'static ColumnSpec)> {
    T::columns()
        .iter()
        .enumerate()
        .filter(|(_, spec)| {
            let keep = live.contains(spec.column);
            if !keep {
                debug!(
                    "column '{}' is not on the destination table, dropping it from the bulk mapping",
                    spec.column
                );
            }
            keep
        })
        .collect()
}
