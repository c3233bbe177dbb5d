mod database;
pub use database::postgres::{
    batch_operations::{
        batch_delete, batch_update, bind_record, bulk_insert, plan_batches, resolve_columns,
        BatchConfig, BatchOperationError, BatchPlan, BulkDestination, ConfigurationError,
        CopyOptions, ResolvedColumn, StatementExecutor, ValidationError, DEFAULT_COPY_ROWS,
        DEFAULT_COPY_TIMEOUT, DEFAULT_STATEMENT_ROWS,
    },
    bulk_copy::BulkWriteError,
    client::{
        connection_string, PooledPgConnection, PostgresClient, PostgresConnectionError,
        PostgresError, PostgresTransaction, ToSql,
    },
    schema::live_table_columns,
    sql_type_wrapper::{SqlType, SqlValue},
};

mod record;
pub use record::{resolve_column, ColumnSpec, TableRecord};

mod logger;
pub use logger::{setup_info_logger, setup_logger};

// export 3rd party dependencies
pub use async_trait::async_trait;
pub use tokio_postgres::types::Type as PgType;
