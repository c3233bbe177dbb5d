//! Live-schema introspection for the bulk-load column mapping.

use std::collections::HashSet;

use super::client::{PostgresError, PostgresTransaction};

/// Splits a `schema.table` name into schema and table, defaulting the schema
/// to `public` for unqualified names.
pub fn split_table_name(table_name: &str) -> (String, String) {
    match table_name.split_once('.') {
        Some((schema, table)) => {
            (schema.trim_matches('"').to_string(), table.trim_matches('"').to_string())
        }
        None => ("public".to_string(), table_name.trim_matches('"').to_string()),
    }
}

/// Queries the column names currently live on a table.
pub async fn live_table_columns(
    txn: &PostgresTransaction<'_>,
    table_name: &str,
) -> Result<HashSet<String>, PostgresError> {
    let (schema, table) = split_table_name(table_name);

    let query = r#"
        SELECT column_name
        FROM information_schema.columns
        WHERE table_schema = $1 AND table_name = $2
        ORDER BY ordinal_position
    "#;

    let rows = txn.query(query, &[&schema, &table]).await?;

    Ok(rows.iter().map(|row| row.get::<_, String>(0)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_defaults_to_public_schema() {
        assert_eq!(split_table_name("accounts"), ("public".to_string(), "accounts".to_string()));
    }

    #[test]
    fn test_split_handles_qualified_and_quoted_names() {
        assert_eq!(
            split_table_name("billing.invoices"),
            ("billing".to_string(), "invoices".to_string())
        );
        assert_eq!(
            split_table_name("\"billing\".\"invoices\""),
            ("billing".to_string(), "invoices".to_string())
        );
    }
}
