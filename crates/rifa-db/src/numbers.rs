use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use rifa_types::api::{NumberBoard, classify_rows};
use rifa_types::models::{NumberStatus, RaffleNumber};

use crate::error::ReserveError;
use crate::models::{
    Contact, enum_col, opt_enum_col, opt_time_col, opt_uuid_col, time_col, ts, uuid_col,
};
use crate::Database;

const NUMBER_COLUMNS: &str = "id, raffle_id, number, user_id, user_email, user_name, user_phone,
    payment_status, payment_method, payment_id, reserved_until, created_at";

impl Database {
    /// Sold and currently-held numbers of a raffle, evaluated against `now`.
    pub fn number_board(&self, raffle_id: Uuid, now: DateTime<Utc>) -> Result<NumberBoard> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT number, payment_status, reserved_until FROM raffle_numbers WHERE raffle_id = ?1",
            )?;
            let rows = stmt
                .query_map([raffle_id.to_string()], |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        enum_col::<NumberStatus>(row, 1)?,
                        opt_time_col(row, 2)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(classify_rows(rows, now))
        })
    }

    pub fn numbers_for_raffle(&self, raffle_id: Uuid) -> Result<Vec<RaffleNumber>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM raffle_numbers WHERE raffle_id = ?1 ORDER BY number, created_at",
                NUMBER_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([raffle_id.to_string()], number_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Place a pending hold on every number in `numbers`, or on none of them.
    ///
    /// Runs as one IMMEDIATE transaction: if any number is already paid or
    /// held by someone else's unexpired pending row, nothing is written and
    /// the taken numbers are returned in `ReserveError::Conflict`. Numbers the
    /// same buyer already holds keep their row; its expiry only moves later.
    pub fn reserve_numbers(
        &self,
        raffle_id: Uuid,
        numbers: &[u32],
        contact: &Contact,
        now: DateTime<Utc>,
        hold: Duration,
    ) -> std::result::Result<Vec<RaffleNumber>, ReserveError> {
        let reserved_until = now + hold;

        self.with_tx(|tx| {
            let taken = taken_numbers(tx, raffle_id, numbers, &contact.email, now)?;
            if !taken.is_empty() {
                return Err(ReserveError::Conflict { numbers: taken });
            }
            let own = held_by(tx, raffle_id, numbers, &contact.email, now)?;

            let mut extend = tx.prepare_cached(
                "UPDATE raffle_numbers
                 SET reserved_until = MAX(reserved_until, ?1), user_name = ?2, user_phone = ?3
                 WHERE raffle_id = ?4 AND number = ?5
                   AND payment_status = 'pending' AND reserved_until > ?6
                   AND user_email = ?7 COLLATE NOCASE",
            )?;
            let select_sql = format!(
                "SELECT {} FROM raffle_numbers
                 WHERE raffle_id = ?1 AND number = ?2
                   AND payment_status = 'pending' AND reserved_until > ?3
                   AND user_email = ?4 COLLATE NOCASE
                 ORDER BY created_at LIMIT 1",
                NUMBER_COLUMNS
            );
            let mut select_own = tx.prepare_cached(&select_sql)?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO raffle_numbers (
                    id, raffle_id, number, user_id, user_email, user_name, user_phone,
                    payment_status, reserved_until, created_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9)",
            )?;

            let mut rows = Vec::with_capacity(numbers.len());
            for &number in numbers {
                if own.contains(&number) {
                    extend.execute(rusqlite::params![
                        ts(reserved_until),
                        contact.name,
                        contact.phone,
                        raffle_id.to_string(),
                        number,
                        ts(now),
                        contact.email,
                    ])?;
                    rows.push(select_own.query_row(
                        rusqlite::params![
                            raffle_id.to_string(),
                            number,
                            ts(now),
                            contact.email,
                        ],
                        number_from_row,
                    )?);
                    continue;
                }

                let id = Uuid::new_v4();
                insert.execute(rusqlite::params![
                    id.to_string(),
                    raffle_id.to_string(),
                    number,
                    contact.user_id.map(|u| u.to_string()),
                    contact.email,
                    contact.name,
                    contact.phone,
                    ts(reserved_until),
                    ts(now),
                ])?;
                rows.push(RaffleNumber {
                    id,
                    raffle_id,
                    number,
                    user_id: contact.user_id,
                    user_email: contact.email.clone(),
                    user_name: contact.name.clone(),
                    user_phone: contact.phone.clone(),
                    payment_status: NumberStatus::Pending,
                    payment_method: None,
                    payment_id: None,
                    reserved_until: Some(reserved_until),
                    created_at: now,
                });
            }
            Ok(rows)
        })
    }

    /// Which of `numbers` `email` holds right now (pending, unexpired).
    pub fn active_holds(
        &self,
        raffle_id: Uuid,
        numbers: &[u32],
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<u32>> {
        self.with_conn(|conn| held_by(conn, raffle_id, numbers, email, now))
    }

    /// Mark lapsed pending holds as expired. Returns how many rows changed.
    pub fn expire_stale_holds(&self, now: DateTime<Utc>) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE raffle_numbers SET payment_status = 'expired'
                 WHERE payment_status = 'pending'
                   AND reserved_until IS NOT NULL
                   AND reserved_until <= ?1",
                [ts(now)],
            )?;
            Ok(changed)
        })
    }
}

/// Subset of `numbers` blocked for `email` by a sale or by someone else's
/// live hold, ascending.
pub(crate) fn taken_numbers(
    conn: &Connection,
    raffle_id: Uuid,
    numbers: &[u32],
    email: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<Vec<u32>> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM raffle_numbers
         WHERE raffle_id = ?1 AND number = ?2
           AND (payment_status = 'paid'
                OR (payment_status = 'pending' AND reserved_until > ?3
                    AND user_email <> ?4 COLLATE NOCASE))
         LIMIT 1",
    )?;
    let rid = raffle_id.to_string();
    let now = ts(now);
    let mut taken = Vec::new();
    for &number in numbers {
        if stmt.exists(rusqlite::params![rid, number, now, email])? {
            taken.push(number);
        }
    }
    taken.sort_unstable();
    taken.dedup();
    Ok(taken)
}

pub(crate) fn held_by(
    conn: &Connection,
    raffle_id: Uuid,
    numbers: &[u32],
    email: &str,
    now: DateTime<Utc>,
) -> Result<Vec<u32>> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM raffle_numbers
         WHERE raffle_id = ?1 AND number = ?2
           AND payment_status = 'pending' AND reserved_until > ?3
           AND user_email = ?4 COLLATE NOCASE
         LIMIT 1",
    )?;
    let rid = raffle_id.to_string();
    let now = ts(now);
    let mut held = Vec::new();
    for &number in numbers {
        if stmt.exists(rusqlite::params![rid, number, now, email])? {
            held.push(number);
        }
    }
    Ok(held)
}

pub(crate) fn number_from_row(row: &Row<'_>) -> rusqlite::Result<RaffleNumber> {
    Ok(RaffleNumber {
        id: uuid_col(row, 0)?,
        raffle_id: uuid_col(row, 1)?,
        number: row.get(2)?,
        user_id: opt_uuid_col(row, 3)?,
        user_email: row.get(4)?,
        user_name: row.get(5)?,
        user_phone: row.get(6)?,
        payment_status: enum_col(row, 7)?,
        payment_method: opt_enum_col(row, 8)?,
        payment_id: opt_uuid_col(row, 9)?,
        reserved_until: opt_time_col(row, 10)?,
        created_at: time_col(row, 11)?,
    })
}
