//! Row types and column conversions. Domain types come from rifa-types; the
//! store keeps ids, timestamps, enums and JSON blobs as TEXT.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use rifa_types::models::PaymentMethod;

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: Option<String>,
    pub created_at: String,
}

/// Buyer contact snapshot copied onto reservation and payment rows.
#[derive(Debug, Clone)]
pub struct Contact {
    pub email: String,
    pub name: String,
    pub phone: Option<String>,
    pub user_id: Option<Uuid>,
}

pub struct NewPayment {
    pub id: Uuid,
    pub raffle_id: Uuid,
    pub contact: Contact,
    pub amount: f64,
    pub currency: String,
    pub method: PaymentMethod,
    pub provider_ref: Option<String>,
    pub numbers: Vec<u32>,
    pub metadata: Value,
}

/// Fixed-width UTC form so that TEXT comparison in SQL matches time order.
pub fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

pub(crate) fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

pub(crate) fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse().map_err(|e| conversion_err(idx, e)))
        .transpose()
}

pub(crate) fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

pub(crate) fn opt_time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_err(idx, e))
    })
    .transpose()
}

pub(crate) fn enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

pub(crate) fn opt_enum_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse().map_err(|e| conversion_err(idx, e)))
        .transpose()
}

pub(crate) fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e))
}
