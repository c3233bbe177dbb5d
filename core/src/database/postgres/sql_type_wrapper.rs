use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type as PgType};
use uuid::Uuid;

/// SQL type tag declared for a registered column.
///
/// `as_str` is the cast applied to VALUES placeholders and `pg_type` is the
/// wire type handed to the binary COPY writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Real,
    Double,
    Numeric,
    Varchar,
    Text,
    Bytea,
    Uuid,
    Date,
    DateTime,
    Jsonb,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SqlType::Bool => "BOOL",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Int => "INT",
            SqlType::BigInt => "BIGINT",
            SqlType::Real => "REAL",
            SqlType::Double => "DOUBLE PRECISION",
            SqlType::Numeric => "NUMERIC",
            SqlType::Varchar => "VARCHAR",
            SqlType::Text => "TEXT",
            SqlType::Bytea => "BYTEA",
            SqlType::Uuid => "UUID",
            SqlType::Date => "DATE",
            SqlType::DateTime => "TIMESTAMPTZ",
            SqlType::Jsonb => "JSONB",
        }
    }

    pub fn pg_type(&self) -> PgType {
        match self {
            SqlType::Bool => PgType::BOOL,
            SqlType::SmallInt => PgType::INT2,
            SqlType::Int => PgType::INT4,
            SqlType::BigInt => PgType::INT8,
            SqlType::Real => PgType::FLOAT4,
            SqlType::Double => PgType::FLOAT8,
            SqlType::Numeric => PgType::NUMERIC,
            SqlType::Varchar => PgType::VARCHAR,
            SqlType::Text => PgType::TEXT,
            SqlType::Bytea => PgType::BYTEA,
            SqlType::Uuid => PgType::UUID,
            SqlType::Date => PgType::DATE,
            SqlType::DateTime => PgType::TIMESTAMPTZ,
            SqlType::Jsonb => PgType::JSONB,
        }
    }
}

/// Owned parameter value bound into a generated statement.
///
/// `Null` is the explicit SQL null sentinel: an absent record value is always
/// bound as a null parameter, never dropped from the statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Bool(bool),
    SmallInt(i16),
    Int(i32),
    BigInt(i64),
    Real(f32),
    Double(f64),
    Numeric(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Json(Value),
    Null,
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl ToSql for SqlValue {
    fn to_sql(
        &self,
        ty: &PgType,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlValue::Bool(value) => bool::to_sql(value, ty, out),
            SqlValue::SmallInt(value) => i16::to_sql(value, ty, out),
            SqlValue::Int(value) => i32::to_sql(value, ty, out),
            SqlValue::BigInt(value) => i64::to_sql(value, ty, out),
            SqlValue::Real(value) => f32::to_sql(value, ty, out),
            SqlValue::Double(value) => f64::to_sql(value, ty, out),
            SqlValue::Numeric(value) => Decimal::to_sql(value, ty, out),
            SqlValue::Text(value) => String::to_sql(value, ty, out),
            SqlValue::Bytes(value) => <Vec<u8>>::to_sql(value, ty, out),
            SqlValue::Uuid(value) => Uuid::to_sql(value, ty, out),
            SqlValue::Date(value) => NaiveDate::to_sql(value, ty, out),
            SqlValue::DateTime(value) => <DateTime<Utc>>::to_sql(value, ty, out),
            SqlValue::Json(value) => Value::to_sql(value, ty, out),
            SqlValue::Null => Ok(IsNull::Yes),
        }
    }

    fn accepts(_ty: &PgType) -> bool {
        // the declared SqlType on the column is the source of truth
        true
    }

    to_sql_checked!();
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

impl From<i16> for SqlValue {
    fn from(value: i16) -> Self {
        SqlValue::SmallInt(value)
    }
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Int(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::BigInt(value)
    }
}

impl From<f32> for SqlValue {
    fn from(value: f32) -> Self {
        SqlValue::Real(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Double(value)
    }
}

impl From<Decimal> for SqlValue {
    fn from(value: Decimal) -> Self {
        SqlValue::Numeric(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(value: Vec<u8>) -> Self {
        SqlValue::Bytes(value)
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::DateTime(value)
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        SqlValue::Json(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(SqlValue::Null, Into::into)
    }
}
