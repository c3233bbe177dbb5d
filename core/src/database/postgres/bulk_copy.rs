//! Binary COPY transport for the bulk-load path.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use futures::pin_mut;
use tokio::time::timeout;
use tokio_postgres::binary_copy::BinaryCopyInWriter;
use tokio_postgres::types::{ToSql, Type as PgType};
use tracing::debug;

use super::batch_operations::{format_table_name, quote_identifier, BulkDestination, CopyOptions};
use super::client::{PostgresError, PostgresTransaction};
use super::schema::live_table_columns;
use super::sql_type_wrapper::SqlValue;
use crate::record::ColumnSpec;

#[derive(thiserror::Error, Debug)]
pub enum BulkWriteError {
    #[error("{0}")]
    PostgresError(#[from] PostgresError),

    #[error("{0}")]
    CouldNotWriteRowsToPostgres(#[from] tokio_postgres::Error),

    #[error("bulk write did not complete within {0:?}")]
    WriteTimeout(Duration),
}

fn copy_statement(table_name: &str, columns: &[&'static ColumnSpec]) -> String {
    format!(
        "COPY {} ({}) FROM STDIN WITH (FORMAT binary)",
        format_table_name(table_name),
        columns.iter().map(|spec| quote_identifier(spec.column)).collect::<Vec<_>>().join(", "),
    )
}

#[async_trait]
impl BulkDestination for PostgresTransaction<'_> {
    async fn live_columns(&mut self, table_name: &str) -> Result<HashSet<String>, PostgresError> {
        live_table_columns(self, table_name).await
    }

    async fn write_rows(
        &mut self,
        table_name: &str,
        columns: &[&'static ColumnSpec],
        rows: &[Vec<SqlValue>],
        options: &CopyOptions,
    ) -> Result<(), BulkWriteError> {
        let statement = copy_statement(table_name, columns);
        debug!("bulk copy statement: {}", statement);

        let column_types: Vec<PgType> =
            columns.iter().map(|spec| spec.sql_type.pg_type()).collect();

        let sink = self.transaction.copy_in(&statement).await.map_err(PostgresError::PgError)?;
        let writer = BinaryCopyInWriter::new(sink, &column_types);
        pin_mut!(writer);

        let write = async {
            for row in rows {
                let params: Vec<&(dyn ToSql + Sync)> =
                    row.iter().map(|value| value as &(dyn ToSql + Sync)).collect();
                writer.as_mut().write(&params).await?;
            }
            writer.as_mut().finish().await
        };

        match timeout(options.timeout, write).await {
            Ok(Ok(written)) => {
                debug!("bulk copy wrote {} rows to {}", written, table_name);
                Ok(())
            }
            Ok(Err(e)) => Err(BulkWriteError::CouldNotWriteRowsToPostgres(e)),
            Err(_) => Err(BulkWriteError::WriteTimeout(options.timeout)),
        }
    }
}
