use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, instrument};

use crate::db::{lock, row_to_preference, SharedConnection, USER_COLUMNS};
use crate::error::Result;
use crate::types::{PreferenceUpdate, UserPreference};

/// Per-user preference records.
///
/// Every method takes the connection lock for its whole duration, so a
/// partial upsert reads and writes the row with no other writer in between.
#[derive(Clone)]
pub struct PreferenceStore {
    db: SharedConnection,
}

impl PreferenceStore {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }

    /// The underlying connection, for stores that share it.
    pub fn connection(&self) -> SharedConnection {
        self.db.clone()
    }

    /// Create or partially update the record for `user_id`.
    ///
    /// Absent fields keep their stored value (or the default for a new
    /// record). Applying the same update twice leaves the row unchanged,
    /// including `updated_at`.
    #[instrument(skip(self, update))]
    pub fn upsert(&self, user_id: u64, update: &PreferenceUpdate) -> Result<UserPreference> {
        update.validate()?;

        let mut conn = lock(&self.db)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let now = Utc::now().to_rfc3339();
        let existing = tx
            .query_row(
                &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
                params![user_id],
                row_to_preference,
            )
            .optional()?;

        let is_new = existing.is_none();
        let mut pref = existing
            .clone()
            .unwrap_or_else(|| UserPreference::with_defaults(user_id, &now));
        update.apply_to(&mut pref);

        if let Some(before) = &existing {
            if before.same_settings(&pref) {
                debug!(user_id, "upsert is a no-op");
                return Ok(pref);
            }
        }
        pref.updated_at = now;

        tx.execute(
            "INSERT INTO users (user_id, region, tag, delivery_hour, delivery_days,
                                subscribed, daily_digest, created_at, updated_at, display_name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(user_id) DO UPDATE SET
                display_name  = excluded.display_name,
                region        = excluded.region,
                tag           = excluded.tag,
                delivery_hour = excluded.delivery_hour,
                delivery_days = excluded.delivery_days,
                subscribed    = excluded.subscribed,
                daily_digest  = excluded.daily_digest,
                updated_at    = excluded.updated_at",
            params![
                pref.user_id,
                pref.region,
                pref.tag,
                pref.delivery_hour,
                pref.delivery_days.to_tokens(),
                pref.subscribed as i32,
                pref.daily_digest as i32,
                pref.created_at,
                pref.updated_at,
                pref.display_name,
            ],
        )?;
        tx.commit()?;

        if is_new {
            info!(user_id, "preference record created");
        } else {
            debug!(user_id, "preference record updated");
        }
        Ok(pref)
    }

    #[instrument(skip(self))]
    pub fn get(&self, user_id: u64) -> Result<Option<UserPreference>> {
        let conn = lock(&self.db)?;
        let pref = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
                params![user_id],
                row_to_preference,
            )
            .optional()?;
        Ok(pref)
    }

    /// Remove the record and its delivery markers. Returns whether a record
    /// existed. Submitted quotes and prompts stay in the pool.
    #[instrument(skip(self))]
    pub fn delete(&self, user_id: u64) -> Result<bool> {
        let mut conn = lock(&self.db)?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM users WHERE user_id = ?1", params![user_id])?;
        tx.execute(
            "DELETE FROM delivery_markers WHERE user_id = ?1",
            params![user_id],
        )?;
        tx.commit()?;
        if removed > 0 {
            info!(user_id, "preference record deleted");
        }
        Ok(removed > 0)
    }

    /// Snapshot of every subscribed record, ordered by user id.
    ///
    /// A storage failure is returned as an error, never as an empty list.
    #[instrument(skip(self))]
    pub fn list_subscribed(&self) -> Result<Vec<UserPreference>> {
        let conn = lock(&self.db)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE subscribed = 1 ORDER BY user_id",
            USER_COLUMNS
        ))?;
        let rows = stmt.query_map([], row_to_preference)?;
        let prefs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(prefs)
    }

    /// Flip only the subscription flag. Creates a default record if needed.
    pub fn set_subscription(&self, user_id: u64, subscribed: bool) -> Result<UserPreference> {
        self.upsert(user_id, &PreferenceUpdate::new().subscribed(subscribed))
    }

    /// (total users, subscribed users), for the status command.
    pub fn count_users(&self) -> Result<(u64, u64)> {
        let conn = lock(&self.db)?;
        let counts = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(subscribed), 0) FROM users",
            [],
            |row| Ok((row.get::<_, i64>(0)? as u64, row.get::<_, i64>(1)? as u64)),
        )?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_shared;
    use moonwheel_core::DeliveryDays;
    use rusqlite::Connection;

    fn store() -> PreferenceStore {
        PreferenceStore::new(open_shared(Connection::open_in_memory().unwrap()).unwrap())
    }

    #[test]
    fn new_record_gets_defaults_for_absent_fields() {
        let store = store();
        let pref = store
            .upsert(7, &PreferenceUpdate::new().region("europe"))
            .unwrap();
        assert_eq!(pref.region.as_deref(), Some("europe"));
        assert_eq!(pref.delivery_hour, 9);
        assert!(pref.delivery_days.is_all());
        assert!(!pref.subscribed);
        assert!(!pref.daily_digest);
        assert_eq!(store.get(7).unwrap(), Some(pref));
    }

    #[test]
    fn partial_update_preserves_other_fields() {
        let store = store();
        store
            .upsert(
                1,
                &PreferenceUpdate::new()
                    .region("africa")
                    .tag("Virgo")
                    .delivery_hour(6)
                    .subscribed(true),
            )
            .unwrap();
        let pref = store
            .upsert(1, &PreferenceUpdate::new().delivery_days("Sat,Sun".parse().unwrap()))
            .unwrap();
        assert_eq!(pref.region.as_deref(), Some("africa"));
        assert_eq!(pref.tag.as_deref(), Some("Virgo"));
        assert_eq!(pref.delivery_hour, 6);
        assert!(pref.subscribed);
        assert_eq!(pref.delivery_days, "weekends".parse::<DeliveryDays>().unwrap());
    }

    #[test]
    fn display_name_is_kept_until_refreshed() {
        let store = store();
        store
            .upsert(2, &PreferenceUpdate::new().display_name(" Rowan ").region("europe"))
            .unwrap();
        let pref = store.upsert(2, &PreferenceUpdate::new().delivery_hour(7)).unwrap();
        assert_eq!(pref.display_name.as_deref(), Some("Rowan"));

        store.upsert(2, &PreferenceUpdate::new().display_name("Rowan Ash")).unwrap();
        assert_eq!(store.get(2).unwrap().unwrap().display_name.as_deref(), Some("Rowan Ash"));
        assert!(store.upsert(2, &PreferenceUpdate::new().display_name("  ")).is_err());
    }

    #[test]
    fn repeating_an_upsert_changes_nothing() {
        let store = store();
        let update = PreferenceUpdate::new().region("oceania-asia").subscribed(true);
        let first = store.upsert(3, &update).unwrap();
        let second = store.upsert(3, &update).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.get(3).unwrap().unwrap().updated_at, first.updated_at);
    }

    #[test]
    fn invalid_hour_is_rejected_and_nothing_written() {
        let store = store();
        assert!(store
            .upsert(5, &PreferenceUpdate::new().delivery_hour(30))
            .is_err());
        assert_eq!(store.get(5).unwrap(), None);
    }

    #[test]
    fn list_subscribed_filters_and_orders() {
        let store = store();
        store.set_subscription(20, true).unwrap();
        store.set_subscription(10, true).unwrap();
        store.set_subscription(15, false).unwrap();
        let ids: Vec<u64> = store
            .list_subscribed()
            .unwrap()
            .into_iter()
            .map(|p| p.user_id)
            .collect();
        assert_eq!(ids, vec![10, 20]);
        assert_eq!(store.count_users().unwrap(), (3, 2));
    }

    #[test]
    fn delete_reports_presence() {
        let store = store();
        store.set_subscription(9, true).unwrap();
        assert!(store.delete(9).unwrap());
        assert!(!store.delete(9).unwrap());
        assert_eq!(store.get(9).unwrap(), None);
    }

    #[test]
    fn empty_store_counts_zero() {
        assert_eq!(store().count_users().unwrap(), (0, 0));
    }
}
