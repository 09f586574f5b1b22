//! Row decoding through a per-column-type conversion table

use crate::error::{Result, StoreError};
use crate::record::{NativeValue, Record, Value};
use once_cell::sync::Lazy;
use postgres_types::{FromSql, Type};
use std::collections::HashMap;
use tokio_postgres::Row;
use tracing::debug;

type Decoder = fn(&Row, usize) -> std::result::Result<NativeValue, tokio_postgres::Error>;

static DECODERS: Lazy<HashMap<Type, Decoder>> = Lazy::new(|| {
    let mut table: HashMap<Type, Decoder> = HashMap::new();

    table.insert(Type::BOOL, scalar::<bool>);
    table.insert(Type::INT2, scalar::<i16>);
    table.insert(Type::INT4, scalar::<i32>);
    table.insert(Type::INT8, scalar::<i64>);
    table.insert(Type::OID, scalar::<u32>);
    table.insert(Type::FLOAT4, scalar::<f32>);
    table.insert(Type::FLOAT8, scalar::<f64>);
    for ty in [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME, Type::UNKNOWN] {
        table.insert(ty, scalar::<String>);
    }
    table.insert(Type::BYTEA, scalar::<Vec<u8>>);
    table.insert(Type::JSON, scalar::<serde_json::Value>);
    table.insert(Type::JSONB, scalar::<serde_json::Value>);

    table.insert(Type::UUID, uuid);
    table.insert(Type::TIMESTAMP, timestamp);
    table.insert(Type::TIMESTAMPTZ, timestamptz);
    table.insert(Type::DATE, date);

    table.insert(Type::TEXT_ARRAY, text_array);
    table.insert(Type::VARCHAR_ARRAY, text_array);
    table.insert(Type::INT2_ARRAY, int_array::<i16>);
    table.insert(Type::INT4_ARRAY, int_array::<i32>);
    table.insert(Type::INT8_ARRAY, int_array::<i64>);
    table.insert(Type::FLOAT4_ARRAY, float_array::<f32>);
    table.insert(Type::FLOAT8_ARRAY, float_array::<f64>);
    table.insert(Type::BOOL_ARRAY, bool_array);

    table
});

/// Decode every column of a row into a record
pub(crate) fn record(row: &Row) -> Result<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let native = match DECODERS.get(column.type_()) {
            Some(decode) => decode(row, idx).map_err(StoreError::backend)?,
            None => {
                debug!(column = column.name(), ty = %column.type_(), "unsupported column type");
                NativeValue::Null
            }
        };
        record.insert(column.name(), Value::from(native));
    }
    Ok(record)
}

fn scalar<T>(row: &Row, idx: usize) -> std::result::Result<NativeValue, tokio_postgres::Error>
where
    T: for<'a> FromSql<'a> + Into<NativeValue>,
{
    Ok(row.try_get::<_, Option<T>>(idx)?.into())
}

fn uuid(row: &Row, idx: usize) -> std::result::Result<NativeValue, tokio_postgres::Error> {
    let value: Option<uuid::Uuid> = row.try_get(idx)?;
    Ok(value.map(|u| u.to_string()).into())
}

fn timestamp(row: &Row, idx: usize) -> std::result::Result<NativeValue, tokio_postgres::Error> {
    let value: Option<chrono::NaiveDateTime> = row.try_get(idx)?;
    Ok(value
        .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        .into())
}

fn timestamptz(row: &Row, idx: usize) -> std::result::Result<NativeValue, tokio_postgres::Error> {
    let value: Option<chrono::DateTime<chrono::Utc>> = row.try_get(idx)?;
    Ok(value.map(|ts| ts.to_rfc3339()).into())
}

fn date(row: &Row, idx: usize) -> std::result::Result<NativeValue, tokio_postgres::Error> {
    let value: Option<chrono::NaiveDate> = row.try_get(idx)?;
    Ok(value.map(|d| d.to_string()).into())
}

fn text_array(row: &Row, idx: usize) -> std::result::Result<NativeValue, tokio_postgres::Error> {
    let value: Option<Vec<Option<String>>> = row.try_get(idx)?;
    Ok(value.map_or(NativeValue::Null, NativeValue::TextArray))
}

fn int_array<T>(row: &Row, idx: usize) -> std::result::Result<NativeValue, tokio_postgres::Error>
where
    T: for<'a> FromSql<'a> + Into<i64>,
{
    let value: Option<Vec<Option<T>>> = row.try_get(idx)?;
    Ok(value.map_or(NativeValue::Null, |items| {
        NativeValue::IntArray(items.into_iter().map(|i| i.map(Into::into)).collect())
    }))
}

fn float_array<T>(row: &Row, idx: usize) -> std::result::Result<NativeValue, tokio_postgres::Error>
where
    T: for<'a> FromSql<'a> + Into<f64>,
{
    let value: Option<Vec<Option<T>>> = row.try_get(idx)?;
    Ok(value.map_or(NativeValue::Null, |items| {
        NativeValue::FloatArray(items.into_iter().map(|f| f.map(Into::into)).collect())
    }))
}

fn bool_array(row: &Row, idx: usize) -> std::result::Result<NativeValue, tokio_postgres::Error> {
    let value: Option<Vec<Option<bool>>> = row.try_get(idx)?;
    Ok(value.map_or(NativeValue::Null, NativeValue::BoolArray))
}
