use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::info;

use moonwheel_core::DeliveryDays;

use crate::error::{PrefsError, Result};
use crate::types::UserPreference;

/// One connection shared by every store in this crate.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// Column list every SELECT on `users` uses, in the order `row_to_preference`
/// expects.
pub(crate) const USER_COLUMNS: &str = "user_id, region, tag, delivery_hour, delivery_days,
     subscribed, daily_digest, created_at, updated_at, display_name";

/// Columns added after the first released schema. Each ALTER is additive and
/// carries a default, so older databases upgrade in place.
const ADDED_USER_COLUMNS: &[(&str, &str)] = &[
    ("daily_digest", "INTEGER NOT NULL DEFAULT 0"),
    ("created_at", "TEXT NOT NULL DEFAULT ''"),
    ("updated_at", "TEXT NOT NULL DEFAULT ''"),
    ("display_name", "TEXT"),
];

/// Initialise the schema in `conn` and wrap it for sharing.
pub fn open_shared(conn: Connection) -> Result<SharedConnection> {
    init_db(&conn)?;
    Ok(Arc::new(Mutex::new(conn)))
}

/// Initialise all tables. Safe to call on every startup: CREATE IF NOT
/// EXISTS plus column-presence checks make it idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    create_users_table(conn)?;
    let added = migrate(conn)?;
    if added > 0 {
        info!(columns = added, "users table migrated");
    }
    create_content_tables(conn)?;
    create_markers_table(conn)?;
    Ok(())
}

fn create_users_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            user_id         INTEGER PRIMARY KEY NOT NULL,
            region          TEXT,
            tag             TEXT,
            delivery_hour   INTEGER NOT NULL DEFAULT 9,
            delivery_days   TEXT NOT NULL DEFAULT 'Mon,Tue,Wed,Thu,Fri,Sat,Sun',
            subscribed      INTEGER NOT NULL DEFAULT 0
        );",
    )?;
    Ok(())
}

/// Add any column from [`ADDED_USER_COLUMNS`] the table lacks, then make sure
/// the subscription index exists. Returns how many columns were added.
pub fn migrate(conn: &Connection) -> Result<usize> {
    let existing: Vec<String> = {
        let mut stmt = conn.prepare("PRAGMA table_info(users)")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
        rows.collect::<rusqlite::Result<_>>()?
    };

    let mut added = 0;
    for (column, decl) in ADDED_USER_COLUMNS {
        if !existing.iter().any(|c| c == column) {
            conn.execute_batch(&format!("ALTER TABLE users ADD COLUMN {} {};", column, decl))?;
            added += 1;
        }
    }

    // The scheduler's per-tick query: SELECT … WHERE subscribed = 1
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_users_subscribed ON users (subscribed);",
    )?;
    Ok(added)
}

fn create_content_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS quotes (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            text            TEXT NOT NULL,
            submitted_by    INTEGER,
            created_at      TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS prompts (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            text            TEXT NOT NULL,
            submitted_by    INTEGER,
            created_at      TEXT NOT NULL
        );",
    )?;
    Ok(())
}

fn create_markers_table(conn: &Connection) -> Result<()> {
    // kind: 'daily_digest' or 'event:<name>:<lead>'.
    // last_fired: local date or event date the marker stands for.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS delivery_markers (
            user_id     INTEGER NOT NULL,
            kind        TEXT NOT NULL,
            last_fired  TEXT NOT NULL,
            updated_at  TEXT NOT NULL,
            PRIMARY KEY (user_id, kind)
        );",
    )?;
    Ok(())
}

pub(crate) fn lock(conn: &SharedConnection) -> Result<MutexGuard<'_, Connection>> {
    conn.lock().map_err(|_| PrefsError::LockPoisoned)
}

/// Map a SELECT row (column order from [`USER_COLUMNS`]) to a preference.
pub(crate) fn row_to_preference(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserPreference> {
    // Rows with an unparsable day list fall back to every day rather than
    // silently dropping the user from the scheduler.
    let delivery_days =
        DeliveryDays::from_str(&row.get::<_, String>(4)?).unwrap_or_default();
    Ok(UserPreference {
        user_id: row.get(0)?,
        display_name: row.get(9)?,
        region: row.get(1)?,
        tag: row.get(2)?,
        delivery_hour: row.get(3)?,
        delivery_days,
        subscribed: row.get::<_, i32>(5)? != 0,
        daily_digest: row.get::<_, i32>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}
