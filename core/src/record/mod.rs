//! Record-to-table registration.
//!
//! Each record type declares its destination table and a static descriptor
//! table mapping logical fields to physical columns. The descriptor table
//! replaces runtime reflection: it is built once at registration time and the
//! resolver memoizes name lookups process-wide.

mod resolver;

pub use resolver::resolve_column;

use crate::database::postgres::sql_type_wrapper::{SqlType, SqlValue};

/// Static description of one mapped column on a record type.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpec {
    /// Logical field name on the record type.
    pub field: &'static str,
    /// Physical column name in the destination table.
    pub column: &'static str,
    pub sql_type: SqlType,
    pub nullable: bool,
}

/// A record type that writes to a single destination table.
///
/// Implement by hand or through [`impl_table_record!`](crate::impl_table_record).
/// `value` reads the field described by `columns()[index]`; indexes come from
/// the resolver, an out-of-range index is a logic error.
pub trait TableRecord: Send + Sync + 'static {
    fn table_name() -> &'static str;

    fn columns() -> &'static [ColumnSpec];

    fn value(&self, index: usize) -> SqlValue;
}

/// Implements [`TableRecord`] for a struct from a column list.
///
/// The physical column name is declared per field; fields without a distinct
/// physical name just repeat the field name. Field types need `Clone` and an
/// `Into<SqlValue>` conversion (`Option` fields surface `None` as SQL null).
///
/// ```ignore
/// impl_table_record!(
///     Account,
///     "accounts",
///     [
///         (id, "id", SqlType::BigInt, not_null),
///         (display_name, "display_name", SqlType::Varchar, not_null),
///         (email, "email", SqlType::Varchar, nullable),
///     ]
/// );
/// ```
#[macro_export]
macro_rules! impl_table_record {
    (
        $record:ty,
        $table:expr,
        [ $( ($field:ident, $column:expr, $sql_type:expr, $null:ident) ),+ $(,)? ]
    ) => {
        impl $crate::TableRecord for $record {
            fn table_name() -> &'static str {
                $table
            }

            fn columns() -> &'static [$crate::ColumnSpec] {
                const COLUMNS: &[$crate::ColumnSpec] = &[
                    $(
                        $crate::ColumnSpec {
                            field: stringify!($field),
                            column: $column,
                            sql_type: $sql_type,
                            nullable: $crate::impl_table_record!(@nullable $null),
                        },
                    )+
                ];
                COLUMNS
            }

            fn value(&self, index: usize) -> $crate::SqlValue {
                let accessors: &[fn(&$record) -> $crate::SqlValue] = &[
                    $(
                        |record: &$record| $crate::SqlValue::from(record.$field.clone()),
                    )+
                ];
                accessors[index](self)
            }
        }
    };
    (@nullable nullable) => {
        true
    };
    (@nullable not_null) => {
        false
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Account {
        id: i64,
        display_name: String,
        email: Option<String>,
    }

    impl_table_record!(
        Account,
        "accounts",
        [
            (id, "id", SqlType::BigInt, not_null),
            (display_name, "display_name", SqlType::Varchar, not_null),
            (email, "email", SqlType::Varchar, nullable),
        ]
    );

    #[test]
    fn test_macro_registers_table_and_columns() {
        assert_eq!(Account::table_name(), "accounts");

        let columns = Account::columns();
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].field, "id");
        assert_eq!(columns[0].column, "id");
        assert_eq!(columns[0].sql_type, SqlType::BigInt);
        assert!(!columns[0].nullable);
        assert!(columns[2].nullable);
    }

    #[test]
    fn test_value_reads_fields_by_descriptor_index() {
        let account = Account {
            id: 7,
            display_name: "casey".to_string(),
            email: None,
        };

        assert_eq!(account.value(0), SqlValue::BigInt(7));
        assert_eq!(account.value(1), SqlValue::Text("casey".to_string()));
        assert_eq!(account.value(2), SqlValue::Null);
    }
}
