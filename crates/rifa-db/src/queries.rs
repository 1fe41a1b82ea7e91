use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use rifa_types::api::StatsResponse;
use rifa_types::models::Profile;

use crate::Database;
use crate::models::{UserRow, enum_col, time_col, ts, uuid_col};

const PROFILE_COLUMNS: &str = "id, email, name, phone, role, created_at, updated_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        name: &str,
        phone: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            insert_user(conn, id, email, password_hash, name, phone, now)?;
            Ok(())
        })
    }

    /// Create a user and its profile together. Returns `false`, writing
    /// nothing, when the email is already registered.
    pub fn register_user(&self, profile: &Profile, password_hash: &str) -> Result<bool> {
        self.with_tx(|tx| {
            if query_user(tx, "email", &profile.email)?.is_some() {
                return Ok(false);
            }
            insert_user(
                tx,
                profile.id,
                &profile.email,
                password_hash,
                &profile.name,
                profile.phone.as_deref(),
                profile.created_at,
            )?;
            insert_profile_row(tx, profile)?;
            Ok(true)
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", &id.to_string()))
    }

    // -- Profiles --

    pub fn get_profile(&self, id: Uuid) -> Result<Option<Profile>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS);
            let profile = conn
                .query_row(&sql, [id.to_string()], profile_from_row)
                .optional()?;
            Ok(profile)
        })
    }

    /// Insert a profile unless one already exists for the id.
    pub fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.with_conn(|conn| {
            insert_profile_row(conn, profile)?;
            Ok(())
        })
    }

    pub fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        phone: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE profiles
                 SET name = COALESCE(?2, name), phone = COALESCE(?3, phone), updated_at = ?4
                 WHERE id = ?1",
                rusqlite::params![id.to_string(), name, phone, ts(now)],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            let sql = format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS);
            Ok(Some(conn.query_row(&sql, [id.to_string()], profile_from_row)?))
        })
    }

    // -- Admin --

    pub fn stats(&self) -> Result<StatsResponse> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> rusqlite::Result<u64> {
                conn.query_row(sql, [], |r| r.get::<_, i64>(0)).map(|n| n.max(0) as u64)
            };
            Ok(StatsResponse {
                total_raffles: count("SELECT COUNT(*) FROM raffles")?,
                active_raffles: count("SELECT COUNT(*) FROM raffles WHERE status = 'active'")?,
                total_users: count("SELECT COUNT(*) FROM profiles")?,
                total_revenue: conn.query_row(
                    "SELECT COALESCE(SUM(amount), 0.0) FROM payments WHERE payment_status = 'completed'",
                    [],
                    |r| r.get(0),
                )?,
                pending_payments: count(
                    "SELECT COUNT(*) FROM payments WHERE payment_status IN ('pending', 'processing')",
                )?,
            })
        })
    }
}

fn insert_user(
    conn: &Connection,
    id: Uuid,
    email: &str,
    password_hash: &str,
    name: &str,
    phone: Option<&str>,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO users (id, email, password, name, phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![id.to_string(), email, password_hash, name, phone, ts(now)],
    )
}

fn insert_profile_row(conn: &Connection, profile: &Profile) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT OR IGNORE INTO profiles (id, email, name, phone, role, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            profile.id.to_string(),
            profile.email,
            profile.name,
            profile.phone,
            profile.role.as_str(),
            ts(profile.created_at),
            ts(profile.updated_at),
        ],
    )
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, email, password, name, phone, created_at FROM users WHERE {} = ?1",
        column
    );
    let row = conn
        .query_row(&sql, [value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password: row.get(2)?,
                name: row.get(3)?,
                phone: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: uuid_col(row, 0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        phone: row.get(3)?,
        role: enum_col(row, 4)?,
        created_at: time_col(row, 5)?,
        updated_at: time_col(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rifa_types::models::Role;

    #[test]
    fn test_user_lookup_ignores_email_case() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        db.create_user(id, "Ana@X.com", "hash", "Ana", None, Utc::now()).unwrap();

        let user = db.get_user_by_email("ana@x.com").unwrap().unwrap();
        assert_eq!(user.id, id.to_string());
        assert!(db.get_user_by_email("bob@x.com").unwrap().is_none());
    }

    #[test]
    fn test_register_user_writes_user_and_profile_once() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let profile = Profile {
            id: Uuid::new_v4(),
            email: "ana@x.com".into(),
            name: "Ana".into(),
            phone: None,
            role: Role::User,
            created_at: now,
            updated_at: now,
        };
        assert!(db.register_user(&profile, "hash").unwrap());
        assert_eq!(db.get_profile(profile.id).unwrap().unwrap().name, "Ana");

        let again = Profile {
            id: Uuid::new_v4(),
            email: "ANA@x.com".into(),
            ..profile.clone()
        };
        assert!(!db.register_user(&again, "hash").unwrap());
        assert!(db.get_profile(again.id).unwrap().is_none());
        assert_eq!(db.stats().unwrap().total_users, 1);
    }

    #[test]
    fn test_concurrent_registrations_create_one_user() {
        let db = std::sync::Arc::new(Database::open_in_memory().unwrap());
        let now = Utc::now();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || {
                    let profile = Profile {
                        id: Uuid::new_v4(),
                        email: "bob@x.com".into(),
                        name: "Bob".into(),
                        phone: None,
                        role: Role::User,
                        created_at: now,
                        updated_at: now,
                    };
                    db.register_user(&profile, "hash").unwrap()
                })
            })
            .collect();
        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|c| *c)
            .count();
        assert_eq!(created, 1);
        assert_eq!(db.stats().unwrap().total_users, 1);
    }

    #[test]
    fn test_profile_insert_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let id = Uuid::new_v4();
        let now = Utc::now();
        db.create_user(id, "ana@x.com", "hash", "Ana", None, now).unwrap();

        let mut profile = Profile {
            id,
            email: "ana@x.com".into(),
            name: "Ana".into(),
            phone: None,
            role: Role::User,
            created_at: now,
            updated_at: now,
        };
        db.insert_profile(&profile).unwrap();
        profile.role = Role::Admin;
        db.insert_profile(&profile).unwrap();

        let stored = db.get_profile(id).unwrap().unwrap();
        assert_eq!(stored.role, Role::User);

        let updated = db
            .update_profile(id, None, Some("+55 11 90000-0000"), now)
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Ana");
        assert_eq!(updated.phone.as_deref(), Some("+55 11 90000-0000"));
        assert_eq!(db.stats().unwrap().total_users, 1);
    }
}
