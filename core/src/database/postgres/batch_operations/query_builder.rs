//! Shared SQL synthesis for join-based batch statements.
//!
//! UPDATE and DELETE both join the target table against an inline VALUES
//! row-set carried in a `WITH incoming (...) AS (VALUES ...)` header; the
//! builders here produce the pieces the batch entry points assemble.

use crate::database::postgres::sql_type_wrapper::SqlType;

/// Reserved SQL keywords that need quoting.
pub const RESERVED_KEYWORDS: &[&str] =
    &["group", "user", "order", "table", "index", "primary", "key"];

/// Quotes an identifier if it's a reserved keyword.
#[inline]
pub fn quote_identifier(name: &str) -> String {
    if RESERVED_KEYWORDS.contains(&name) {
        format!("\"{}\"", name)
    } else {
        name.to_string()
    }
}

/// Formats a table name, handling schema.table format.
pub fn format_table_name(table_name: &str) -> String {
    if table_name.contains('.') {
        let parts: Vec<&str> = table_name.split('.').collect();
        if parts.len() == 2 {
            let schema = parts[0].trim_matches('"');
            let table = parts[1].trim_matches('"');
            format!("\"{}\".\"{}\"", schema, table)
        } else {
            table_name.to_string()
        }
    } else {
        table_name.to_string()
    }
}

/// Builds the row-set header: `WITH incoming (col1, col2, ...) AS (VALUES`
pub fn build_cte_header(column_aliases: &[String]) -> String {
    let formatted_cols =
        column_aliases.iter().map(|col| quote_identifier(col)).collect::<Vec<_>>().join(", ");

    format!("WITH incoming ({}) AS (\nVALUES\n", formatted_cols)
}

/// Builds the typed placeholder rows of the VALUES list.
///
/// Placeholders are numbered contiguously across the statement, one per
/// column per row, so every parameter position is unique within it.
pub fn build_values_rows(column_types: &[SqlType], row_count: usize) -> String {
    let mut rows = Vec::with_capacity(row_count);

    for row in 0..row_count {
        let base = row * column_types.len() + 1;
        let placeholders = column_types
            .iter()
            .enumerate()
            .map(|(offset, sql_type)| format!("${}::{}", base + offset, sql_type.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        rows.push(format!("({})", placeholders));
    }

    rows.join(",\n")
}

/// Row-set alias for an update column.
///
/// A column used both for matching and writing appears twice in the VALUES
/// row, so the written occurrence gets its own alias.
pub fn update_alias(column: &str, key_columns: &[&str]) -> String {
    if key_columns.contains(&column) {
        format!("{}__set", column)
    } else {
        column.to_string()
    }
}

/// Builds one SET clause assigning the row-set value to the table column.
pub fn build_set_clause(column: &str, alias: &str) -> String {
    format!("{} = src.{}", quote_identifier(column), quote_identifier(alias))
}

/// Builds the UPDATE statement body.
pub fn build_update_body(formatted_table_name: &str, set_clauses: Vec<String>) -> String {
    let mut query = format!("\nUPDATE {} dst\nSET ", formatted_table_name);
    query.push_str(&set_clauses.join(", "));
    query.push_str("\nFROM incoming src");
    query
}

/// Builds the DELETE statement body.
pub fn build_delete_body(formatted_table_name: &str) -> String {
    format!("\nDELETE FROM {} dst\nUSING incoming src", formatted_table_name)
}

/// Builds one key-match condition between the table and the row-set.
pub fn build_key_condition(column: &str) -> String {
    format!("dst.{} = src.{}", quote_identifier(column), quote_identifier(column))
}

/// Builds the complete WHERE clause from conditions.
pub fn build_where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("\nWHERE {}", conditions.join("\n  AND "))
    }
}
