//! Per-record parameter extraction.

use super::ConfigurationError;
use crate::database::postgres::sql_type_wrapper::SqlValue;
use crate::record::{resolve_column, ColumnSpec, TableRecord};

/// A caller-named column resolved against a record type's descriptor table.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedColumn {
    pub spec: &'static ColumnSpec,
    pub index: usize,
}

/// Resolves every caller-specified column name up front, so a missing
/// column-to-field mapping aborts the operation before any SQL is built.
pub fn resolve_columns<T: TableRecord>(
    columns: &[&str],
) -> Result<Vec<ResolvedColumn>, ConfigurationError> {
    columns
        .iter()
        .map(|column| {
            resolve_column::<T>(column)
                .map(|index| ResolvedColumn { spec: &T::columns()[index], index })
                .ok_or_else(|| ConfigurationError::UnresolvableColumn {
                    column: column.to_string(),
                    record_type: std::any::type_name::<T>(),
                })
        })
        .collect()
}

/// Reads one bound value per resolved column from `record`, in column order.
///
/// Absent values come back as [`SqlValue::Null`]; the parameter itself is
/// never omitted.
pub fn bind_record<T: TableRecord>(record: &T, columns: &[ResolvedColumn]) -> Vec<SqlValue> {
    columns.iter().map(|column| record.value(column.index)).collect()
}
