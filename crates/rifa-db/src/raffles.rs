use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use rifa_types::api::UpdateRaffleRequest;
use rifa_types::models::{Raffle, RaffleStatus};

use crate::Database;
use crate::models::{enum_col, json_col, opt_uuid_col, time_col, ts, uuid_col};

/// Raffle columns plus the derived count of every number row the raffle has.
const RAFFLE_SELECT: &str = "
    SELECT r.id, r.title, r.description, r.images, r.specifications, r.translations,
           r.market_value, r.price_per_number, r.total_numbers, r.draw_date, r.status,
           r.winner_number, r.winner_user_id, r.created_by, r.created_at, r.updated_at,
           (SELECT COUNT(*) FROM raffle_numbers n WHERE n.raffle_id = r.id) AS sold_numbers
    FROM raffles r";

impl Database {
    /// Raffles in `status`, newest first.
    pub fn list_raffles(&self, status: RaffleStatus, limit: u32, offset: u32) -> Result<Vec<Raffle>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE r.status = ?1 ORDER BY r.created_at DESC LIMIT ?2 OFFSET ?3",
                RAFFLE_SELECT
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![status.as_str(), limit, offset], raffle_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_raffle(&self, id: Uuid) -> Result<Option<Raffle>> {
        self.with_conn(|conn| query_raffle(conn, id))
    }

    pub fn insert_raffle(&self, raffle: &Raffle) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO raffles (
                    id, title, description, images, specifications, translations,
                    market_value, price_per_number, total_numbers, draw_date, status,
                    winner_number, winner_user_id, created_by, created_at, updated_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                rusqlite::params![
                    raffle.id.to_string(),
                    raffle.title,
                    raffle.description,
                    serde_json::to_string(&raffle.images)?,
                    serde_json::to_string(&raffle.specifications)?,
                    serde_json::to_string(&raffle.translations)?,
                    raffle.market_value,
                    raffle.price_per_number,
                    raffle.total_numbers,
                    ts(raffle.draw_date),
                    raffle.status.as_str(),
                    raffle.winner_number,
                    raffle.winner_user_id.map(|u| u.to_string()),
                    raffle.created_by.map(|u| u.to_string()),
                    ts(raffle.created_at),
                    ts(raffle.updated_at),
                ],
            )?;
            Ok(())
        })
    }

    /// Apply an admin patch. `total_numbers` is never written here.
    pub fn update_raffle(
        &self,
        id: Uuid,
        patch: &UpdateRaffleRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<Raffle>> {
        self.with_tx(|tx| {
            let Some(mut raffle) = query_raffle(tx, id)? else {
                return Ok(None);
            };
            patch.apply(&mut raffle);
            raffle.updated_at = now;

            tx.execute(
                "UPDATE raffles SET
                    title = ?2, description = ?3, images = ?4, specifications = ?5,
                    translations = ?6, market_value = ?7, price_per_number = ?8,
                    draw_date = ?9, status = ?10, winner_number = ?11, winner_user_id = ?12,
                    updated_at = ?13
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    raffle.title,
                    raffle.description,
                    serde_json::to_string(&raffle.images)?,
                    serde_json::to_string(&raffle.specifications)?,
                    serde_json::to_string(&raffle.translations)?,
                    raffle.market_value,
                    raffle.price_per_number,
                    ts(raffle.draw_date),
                    raffle.status.as_str(),
                    raffle.winner_number,
                    raffle.winner_user_id.map(|u| u.to_string()),
                    ts(now),
                ],
            )?;
            Ok(Some(raffle))
        })
    }
}

pub(crate) fn query_raffle(conn: &Connection, id: Uuid) -> Result<Option<Raffle>> {
    let sql = format!("{} WHERE r.id = ?1", RAFFLE_SELECT);
    let raffle = conn
        .query_row(&sql, [id.to_string()], raffle_from_row)
        .optional()?;
    Ok(raffle)
}

fn raffle_from_row(row: &Row<'_>) -> rusqlite::Result<Raffle> {
    Ok(Raffle {
        id: uuid_col(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        images: json_col(row, 3)?,
        specifications: json_col(row, 4)?,
        translations: json_col(row, 5)?,
        market_value: row.get(6)?,
        price_per_number: row.get(7)?,
        total_numbers: row.get(8)?,
        draw_date: time_col(row, 9)?,
        status: enum_col(row, 10)?,
        winner_number: row.get(11)?,
        winner_user_id: opt_uuid_col(row, 12)?,
        created_by: opt_uuid_col(row, 13)?,
        created_at: time_col(row, 14)?,
        updated_at: time_col(row, 15)?,
        sold_numbers: Some(row.get::<_, i64>(16)?.max(0) as u64),
    })
}
