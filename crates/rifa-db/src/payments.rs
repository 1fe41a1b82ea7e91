use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use rifa_types::models::{NumberStatus, Payment, PaymentStatus};

use crate::Database;
use crate::error::{ReserveError, SettleError};
use crate::models::{
    NewPayment, enum_col, json_col, opt_uuid_col, time_col, ts, uuid_col,
};
use crate::numbers::held_by;

const PAYMENT_COLUMNS: &str = "id, raffle_id, user_id, user_email, user_name, user_phone,
    amount, currency, payment_method, payment_status, provider_ref, numbers, metadata,
    created_at, updated_at";

impl Database {
    /// Record a pending payment and attach the buyer's live holds to it.
    ///
    /// The holds are re-checked inside the same transaction; a number the
    /// buyer no longer holds fails the whole call with `ReserveError::NotHeld`,
    /// and a hold already attached to another open payment fails it with
    /// `ReserveError::Conflict`.
    pub fn insert_payment(
        &self,
        new: &NewPayment,
        now: DateTime<Utc>,
    ) -> std::result::Result<Payment, ReserveError> {
        self.with_tx(|tx| {
            let held = held_by(tx, new.raffle_id, &new.numbers, &new.contact.email, now)?;
            let missing: Vec<u32> = new
                .numbers
                .iter()
                .copied()
                .filter(|n| !held.contains(n))
                .collect();
            if !missing.is_empty() {
                return Err(ReserveError::NotHeld { numbers: missing });
            }
            let in_flight = open_payment_holds(tx, new.raffle_id, &new.numbers, &new.contact.email, now)?;
            if !in_flight.is_empty() {
                return Err(ReserveError::Conflict { numbers: in_flight });
            }

            tx.execute(
                "INSERT INTO payments (
                    id, raffle_id, user_id, user_email, user_name, user_phone, amount,
                    currency, payment_method, payment_status, provider_ref, numbers,
                    metadata, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'pending', ?10, ?11, ?12, ?13, ?13)",
                rusqlite::params![
                    new.id.to_string(),
                    new.raffle_id.to_string(),
                    new.contact.user_id.map(|u| u.to_string()),
                    new.contact.email,
                    new.contact.name,
                    new.contact.phone,
                    new.amount,
                    new.currency,
                    new.method.as_str(),
                    new.provider_ref,
                    serde_json::to_string(&new.numbers).map_err(anyhow::Error::from)?,
                    new.metadata.to_string(),
                    ts(now),
                ],
            )?;

            let mut link = tx.prepare_cached(
                "UPDATE raffle_numbers SET payment_id = ?1, payment_method = ?2
                 WHERE raffle_id = ?3 AND number = ?4
                   AND payment_status = 'pending' AND reserved_until > ?5
                   AND user_email = ?6 COLLATE NOCASE",
            )?;
            for &number in &new.numbers {
                link.execute(rusqlite::params![
                    new.id.to_string(),
                    new.method.as_str(),
                    new.raffle_id.to_string(),
                    number,
                    ts(now),
                    new.contact.email,
                ])?;
            }

            Ok(Payment {
                id: new.id,
                raffle_id: new.raffle_id,
                user_id: new.contact.user_id,
                user_email: new.contact.email.clone(),
                user_name: new.contact.name.clone(),
                user_phone: new.contact.phone.clone(),
                amount: new.amount,
                currency: new.currency.clone(),
                payment_method: new.method,
                payment_status: PaymentStatus::Pending,
                provider_ref: new.provider_ref.clone(),
                numbers: new.numbers.clone(),
                metadata: new.metadata.clone(),
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn get_payment(&self, id: Uuid) -> Result<Option<Payment>> {
        self.with_conn(|conn| Ok(query_payment(conn, id)?))
    }

    /// Move a payment to `status` and carry its number rows along.
    pub fn settle_payment(
        &self,
        id: Uuid,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> std::result::Result<Payment, SettleError> {
        self.with_tx(|tx| {
            let mut payment = query_payment(tx, id)?.ok_or(SettleError::NotFound)?;
            if !payment.payment_status.can_transition_to(status) {
                return Err(SettleError::InvalidTransition {
                    from: payment.payment_status,
                    to: status,
                });
            }

            let rows_to = match status {
                PaymentStatus::Completed => {
                    let sold = sold_elsewhere(tx, &payment)?;
                    if !sold.is_empty() {
                        return Err(SettleError::AlreadySold { numbers: sold });
                    }
                    let unlinked = unlinked_numbers(tx, &payment)?;
                    if !unlinked.is_empty() {
                        return Err(SettleError::Unlinked { numbers: unlinked });
                    }
                    Some(NumberStatus::Paid)
                }
                PaymentStatus::Failed | PaymentStatus::Cancelled => Some(NumberStatus::Failed),
                PaymentStatus::Refunded => Some(NumberStatus::Refunded),
                PaymentStatus::Pending | PaymentStatus::Processing => None,
            };

            tx.execute(
                "UPDATE payments SET payment_status = ?2, updated_at = ?3 WHERE id = ?1",
                rusqlite::params![id.to_string(), status.as_str(), ts(now)],
            )?;

            if let Some(row_status) = rows_to {
                let changed = tx.execute(
                    "UPDATE raffle_numbers SET payment_status = ?2 WHERE payment_id = ?1",
                    rusqlite::params![id.to_string(), row_status.as_str()],
                )?;
                debug!("Payment {} -> {}: {} number rows -> {}", id, status, changed, row_status);
            }

            payment.payment_status = status;
            payment.updated_at = now;
            Ok(payment)
        })
    }
}

/// Numbers of `payment` that some other row of the raffle has already paid for.
fn sold_elsewhere(conn: &Connection, payment: &Payment) -> rusqlite::Result<Vec<u32>> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM raffle_numbers
         WHERE raffle_id = ?1 AND number = ?2 AND payment_status = 'paid'
           AND (payment_id IS NULL OR payment_id <> ?3)
         LIMIT 1",
    )?;
    let rid = payment.raffle_id.to_string();
    let pid = payment.id.to_string();
    let mut sold = Vec::new();
    for &number in &payment.numbers {
        if stmt.exists(rusqlite::params![rid, number, pid])? {
            sold.push(number);
        }
    }
    Ok(sold)
}

/// Numbers whose live hold by `email` is already attached to a payment that
/// is still pending or processing.
fn open_payment_holds(
    conn: &Connection,
    raffle_id: Uuid,
    numbers: &[u32],
    email: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<Vec<u32>> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM raffle_numbers rn
         JOIN payments p ON p.id = rn.payment_id
         WHERE rn.raffle_id = ?1 AND rn.number = ?2
           AND rn.payment_status = 'pending' AND rn.reserved_until > ?3
           AND rn.user_email = ?4 COLLATE NOCASE
           AND p.payment_status IN ('pending', 'processing')
         LIMIT 1",
    )?;
    let rid = raffle_id.to_string();
    let now = ts(now);
    let mut busy = Vec::new();
    for &number in numbers {
        if stmt.exists(rusqlite::params![rid, number, now, email])? {
            busy.push(number);
        }
    }
    busy.sort_unstable();
    Ok(busy)
}

/// Numbers of `payment` with no number row attached to it.
fn unlinked_numbers(conn: &Connection, payment: &Payment) -> rusqlite::Result<Vec<u32>> {
    let mut stmt = conn.prepare_cached(
        "SELECT 1 FROM raffle_numbers
         WHERE raffle_id = ?1 AND number = ?2 AND payment_id = ?3
         LIMIT 1",
    )?;
    let rid = payment.raffle_id.to_string();
    let pid = payment.id.to_string();
    let mut missing = Vec::new();
    for &number in &payment.numbers {
        if !stmt.exists(rusqlite::params![rid, number, pid])? {
            missing.push(number);
        }
    }
    Ok(missing)
}

fn query_payment(conn: &Connection, id: Uuid) -> rusqlite::Result<Option<Payment>> {
    let sql = format!("SELECT {} FROM payments WHERE id = ?1", PAYMENT_COLUMNS);
    conn.query_row(&sql, [id.to_string()], payment_from_row)
        .optional()
}

fn payment_from_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        id: uuid_col(row, 0)?,
        raffle_id: uuid_col(row, 1)?,
        user_id: opt_uuid_col(row, 2)?,
        user_email: row.get(3)?,
        user_name: row.get(4)?,
        user_phone: row.get(5)?,
        amount: row.get(6)?,
        currency: row.get(7)?,
        payment_method: enum_col(row, 8)?,
        payment_status: enum_col(row, 9)?,
        provider_ref: row.get(10)?,
        numbers: json_col(row, 11)?,
        metadata: json_col(row, 12)?,
        created_at: time_col(row, 13)?,
        updated_at: time_col(row, 14)?,
    })
}
