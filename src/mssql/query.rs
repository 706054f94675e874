use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{ColumnData, FromSql};

use super::client::MssqlClient;
use super::classify_error;
use crate::error::MssqlConnectionError;
use crate::results::ResultSet;
use crate::types::RowValues;

/// Run `query` and materialize its first result set.
///
/// A statement that produces no result set yields an empty `ResultSet`
/// without column names.
///
/// # Errors
/// Returns the classified driver error if the query or row fetch fails.
pub async fn build_result_set(
    client: &mut MssqlClient,
    query: &str,
) -> Result<ResultSet, MssqlConnectionError> {
    let mut stream = client.simple_query(query).await.map_err(classify_error)?;

    let column_names: Option<Vec<String>> = stream
        .columns()
        .await
        .map_err(classify_error)?
        .map(|columns| columns.iter().map(|col| col.name().to_string()).collect());

    let rows = stream.into_first_result().await.map_err(classify_error)?;

    let mut result_set = ResultSet::with_capacity(rows.len());
    let Some(column_names) = column_names else {
        return Ok(result_set);
    };
    result_set.set_column_names(Arc::new(column_names));

    for row in rows {
        let values = row
            .into_iter()
            .map(|data| extract_value(&data))
            .collect::<Vec<_>>();
        result_set.add_row_values(values);
    }

    Ok(result_set)
}

/// Run a write/DDL statement and sum the affected rows of every statement in it.
///
/// The batch runs inside `sp_executesql`, so session-scoped effects made by
/// it (`#local` temp tables, `SET` options, `USE`) end with the call. Use
/// `##global` temp tables or real tables to carry state across calls.
///
/// # Errors
/// Returns the classified driver error if execution fails.
pub async fn execute_dml(client: &mut MssqlClient, query: &str) -> Result<u64, MssqlConnectionError> {
    let exec_result = client.execute(query, &[]).await.map_err(classify_error)?;
    Ok(exec_result.rows_affected().iter().sum())
}

/// Convert one column value to a `RowValues`.
pub(crate) fn extract_value(data: &ColumnData<'static>) -> RowValues {
    match data {
        ColumnData::Bit(v) => v.map_or(RowValues::Null, RowValues::Bool),
        ColumnData::U8(v) => v.map_or(RowValues::Null, |i| RowValues::Int(i64::from(i))),
        ColumnData::I16(v) => v.map_or(RowValues::Null, |i| RowValues::Int(i64::from(i))),
        ColumnData::I32(v) => v.map_or(RowValues::Null, |i| RowValues::Int(i64::from(i))),
        ColumnData::I64(v) => v.map_or(RowValues::Null, RowValues::Int),
        ColumnData::F32(v) => v.map_or(RowValues::Null, |f| RowValues::Float(f64::from(f))),
        ColumnData::F64(v) => v.map_or(RowValues::Null, RowValues::Float),
        ColumnData::String(v) => v
            .as_ref()
            .map_or(RowValues::Null, |s| RowValues::Text(s.to_string())),
        ColumnData::Guid(v) => v.map_or(RowValues::Null, |g| RowValues::Text(g.to_string())),
        ColumnData::Binary(v) => v
            .as_ref()
            .map_or(RowValues::Null, |b| RowValues::Blob(b.to_vec())),
        ColumnData::Numeric(v) => v.as_ref().map_or(RowValues::Null, |n| {
            let text = n.to_string();
            text.parse::<f64>()
                .map_or(RowValues::Text(text), RowValues::Float)
        }),
        ColumnData::Xml(v) => v.as_ref().map_or(RowValues::Null, |x| {
            RowValues::Text(x.clone().into_owned().into_string())
        }),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            match NaiveDateTime::from_sql(data) {
                Ok(Some(dt)) => RowValues::Timestamp(dt),
                _ => RowValues::Null,
            }
        }
        ColumnData::Date(_) => match NaiveDate::from_sql(data) {
            Ok(Some(date)) => RowValues::Text(date.to_string()),
            _ => RowValues::Null,
        },
        ColumnData::Time(_) => match NaiveTime::from_sql(data) {
            Ok(Some(time)) => RowValues::Text(time.to_string()),
            _ => RowValues::Null,
        },
        ColumnData::DateTimeOffset(_) => match DateTime::<FixedOffset>::from_sql(data) {
            Ok(Some(dt)) => RowValues::Text(dt.to_rfc3339()),
            _ => RowValues::Null,
        },
    }
}
