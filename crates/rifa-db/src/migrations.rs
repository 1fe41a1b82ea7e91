use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                name        TEXT NOT NULL,
                phone       TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE profiles (
                id          TEXT PRIMARY KEY REFERENCES users(id),
                email       TEXT NOT NULL,
                name        TEXT NOT NULL,
                phone       TEXT,
                role        TEXT NOT NULL DEFAULT 'user',
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE TABLE raffles (
                id                TEXT PRIMARY KEY,
                title             TEXT NOT NULL,
                description       TEXT NOT NULL DEFAULT '',
                images            TEXT NOT NULL DEFAULT '[]',
                specifications    TEXT NOT NULL DEFAULT '{}',
                translations      TEXT NOT NULL DEFAULT '{}',
                market_value      REAL NOT NULL DEFAULT 0,
                price_per_number  REAL NOT NULL,
                total_numbers     INTEGER NOT NULL,
                draw_date         TEXT NOT NULL,
                status            TEXT NOT NULL DEFAULT 'draft',
                winner_number     INTEGER,
                winner_user_id    TEXT,
                created_by        TEXT,
                created_at        TEXT NOT NULL,
                updated_at        TEXT NOT NULL
            );

            CREATE INDEX idx_raffles_status
                ON raffles(status, created_at);

            CREATE TABLE raffle_numbers (
                id              TEXT PRIMARY KEY,
                raffle_id       TEXT NOT NULL REFERENCES raffles(id),
                number          INTEGER NOT NULL,
                user_id         TEXT,
                user_email      TEXT NOT NULL,
                user_name       TEXT NOT NULL,
                user_phone      TEXT,
                payment_status  TEXT NOT NULL DEFAULT 'pending',
                payment_method  TEXT,
                payment_id      TEXT,
                reserved_until  TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE INDEX idx_raffle_numbers_lookup
                ON raffle_numbers(raffle_id, number);

            CREATE INDEX idx_raffle_numbers_payment
                ON raffle_numbers(payment_id);

            CREATE TABLE payments (
                id              TEXT PRIMARY KEY,
                raffle_id       TEXT NOT NULL REFERENCES raffles(id),
                user_id         TEXT,
                user_email      TEXT NOT NULL,
                user_name       TEXT NOT NULL,
                user_phone      TEXT,
                amount          REAL NOT NULL,
                currency        TEXT NOT NULL,
                payment_method  TEXT NOT NULL,
                payment_status  TEXT NOT NULL DEFAULT 'pending',
                provider_ref    TEXT,
                numbers         TEXT NOT NULL,
                metadata        TEXT NOT NULL DEFAULT '{}',
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE INDEX idx_payments_status
                ON payments(payment_status);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
