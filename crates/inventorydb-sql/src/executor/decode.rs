use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use inventorydb_core::{CellValue, ColumnHeader, ResultSet};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::postgres::{PgColumn, PgRow};
use sqlx::{Column, Decode, Postgres, Row, Type, TypeInfo, ValueRef};

pub(crate) fn headers(columns: &[PgColumn]) -> Vec<ColumnHeader> {
    columns
        .iter()
        .map(|col| ColumnHeader::new(col.name(), col.type_info().name()))
        .collect()
}

/// Decode rows into cells. Columns come from the first row when present,
/// otherwise from `described`.
pub(crate) fn decode_rows(rows: &[PgRow], described: Vec<ColumnHeader>) -> ResultSet {
    let columns = match rows.first() {
        Some(row) => headers(row.columns()),
        None => described,
    };

    let decoded = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .enumerate()
                .map(|(idx, header)| decode_cell(row, idx, &header.type_name))
                .collect()
        })
        .collect();

    ResultSet::new(columns, decoded)
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Option<Option<T>>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx).ok()
}

fn decode_cell(row: &PgRow, idx: usize, type_name: &str) -> CellValue {
    let is_null = row.try_get_raw(idx).map(|raw| raw.is_null()).unwrap_or(false);
    if is_null {
        return CellValue::Null;
    }

    let decoded = match type_name {
        "INT2" => get::<i16>(row, idx).map(|v| v.map(|n| CellValue::Int(n.into()))),
        "INT4" => get::<i32>(row, idx).map(|v| v.map(|n| CellValue::Int(n.into()))),
        "INT8" => get::<i64>(row, idx).map(|v| v.map(CellValue::Int)),
        "FLOAT4" => get::<f32>(row, idx).map(|v| v.map(|n| CellValue::Float(n.into()))),
        "FLOAT8" => get::<f64>(row, idx).map(|v| v.map(CellValue::Float)),
        "NUMERIC" => get::<Decimal>(row, idx).map(|v| v.map(decimal_cell)),
        "BOOL" => get::<bool>(row, idx).map(|v| v.map(CellValue::Bool)),
        "DATE" => get::<NaiveDate>(row, idx).map(|v| v.map(|d| CellValue::Text(d.to_string()))),
        "TIME" => get::<NaiveTime>(row, idx).map(|v| v.map(|t| CellValue::Text(t.to_string()))),
        "TIMESTAMP" => {
            get::<NaiveDateTime>(row, idx).map(|v| v.map(|t| CellValue::Text(t.to_string())))
        }
        "TIMESTAMPTZ" => {
            get::<DateTime<Utc>>(row, idx).map(|v| v.map(|t| CellValue::Text(t.to_rfc3339())))
        }
        "UUID" => get::<uuid::Uuid>(row, idx).map(|v| v.map(|u| CellValue::Text(u.to_string()))),
        "JSON" | "JSONB" => get::<serde_json::Value>(row, idx).map(|v| v.map(CellValue::Json)),
        _ => None,
    };

    match decoded {
        Some(Some(cell)) => cell,
        Some(None) => CellValue::Null,
        None => row
            .try_get_unchecked::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(CellValue::Text)
            .unwrap_or_else(|| CellValue::Text(format!("<{type_name}>"))),
    }
}

fn decimal_cell(value: Decimal) -> CellValue {
    match value.to_f64() {
        Some(float) => CellValue::Float(float),
        None => CellValue::Text(value.to_string()),
    }
}
