use chrono::Utc;
use rusqlite::{params, OptionalExtension, TransactionBehavior};
use tracing::{debug, instrument};

use crate::db::{lock, SharedConnection};
use crate::error::Result;

/// Proof that a marker was advanced. Hand it back to [`MarkerStore::release`]
/// if the delivery it guards failed and should be retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub user_id: u64,
    pub kind: String,
    pub value: String,
    pub previous: Option<String>,
}

/// Last-fired guard per (user, notification kind).
///
/// `kind` is `daily_digest` or `event:<name>:<lead days>`; `value` is the
/// local date (digest) or event date (alert) the marker stands for. A
/// notification is sent only by whoever wins the claim for that value, so
/// restarts and overlapping ticks never send it twice.
#[derive(Clone)]
pub struct MarkerStore {
    db: SharedConnection,
}

impl MarkerStore {
    pub fn new(db: SharedConnection) -> Self {
        Self { db }
    }

    /// Advance the marker to `value`. Returns `None` when it already holds
    /// `value` (someone already sent this one).
    #[instrument(skip(self))]
    pub fn claim(&self, user_id: u64, kind: &str, value: &str) -> Result<Option<Claim>> {
        let mut conn = lock(&self.db)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let previous: Option<String> = tx
            .query_row(
                "SELECT last_fired FROM delivery_markers WHERE user_id = ?1 AND kind = ?2",
                params![user_id, kind],
                |row| row.get(0),
            )
            .optional()?;

        if previous.as_deref() == Some(value) {
            debug!(user_id, kind, value, "already fired");
            return Ok(None);
        }

        tx.execute(
            "INSERT INTO delivery_markers (user_id, kind, last_fired, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, kind) DO UPDATE SET
                last_fired = excluded.last_fired,
                updated_at = excluded.updated_at",
            params![user_id, kind, value, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(Some(Claim {
            user_id,
            kind: kind.to_string(),
            value: value.to_string(),
            previous,
        }))
    }

    /// Undo a claim so the next tick tries again. A marker that has since
    /// moved past the claimed value is left alone.
    #[instrument(skip(self, claim), fields(user_id = claim.user_id, kind = %claim.kind))]
    pub fn release(&self, claim: &Claim) -> Result<()> {
        let conn = lock(&self.db)?;
        match &claim.previous {
            Some(previous) => {
                conn.execute(
                    "UPDATE delivery_markers SET last_fired = ?1, updated_at = ?2
                     WHERE user_id = ?3 AND kind = ?4 AND last_fired = ?5",
                    params![
                        previous,
                        Utc::now().to_rfc3339(),
                        claim.user_id,
                        claim.kind,
                        claim.value
                    ],
                )?;
            }
            None => {
                conn.execute(
                    "DELETE FROM delivery_markers
                     WHERE user_id = ?1 AND kind = ?2 AND last_fired = ?3",
                    params![claim.user_id, claim.kind, claim.value],
                )?;
            }
        }
        Ok(())
    }

    pub fn last_fired(&self, user_id: u64, kind: &str) -> Result<Option<String>> {
        let conn = lock(&self.db)?;
        let value = conn
            .query_row(
                "SELECT last_fired FROM delivery_markers WHERE user_id = ?1 AND kind = ?2",
                params![user_id, kind],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_shared;
    use rusqlite::Connection;

    fn markers() -> MarkerStore {
        MarkerStore::new(open_shared(Connection::open_in_memory().unwrap()).unwrap())
    }

    #[test]
    fn second_claim_for_same_value_loses() {
        let m = markers();
        assert!(m.claim(1, "daily_digest", "2026-03-02").unwrap().is_some());
        assert!(m.claim(1, "daily_digest", "2026-03-02").unwrap().is_none());
        assert!(m.claim(1, "daily_digest", "2026-03-03").unwrap().is_some());
        // Other users and kinds are independent.
        assert!(m.claim(2, "daily_digest", "2026-03-02").unwrap().is_some());
        assert!(m.claim(1, "event:Ostara:7", "2026-03-21").unwrap().is_some());
    }

    #[test]
    fn release_restores_previous_value() {
        let m = markers();
        m.claim(1, "daily_digest", "2026-03-02").unwrap();
        let claim = m.claim(1, "daily_digest", "2026-03-03").unwrap().unwrap();
        m.release(&claim).unwrap();
        assert_eq!(
            m.last_fired(1, "daily_digest").unwrap().as_deref(),
            Some("2026-03-02")
        );
        assert!(m.claim(1, "daily_digest", "2026-03-03").unwrap().is_some());
    }

    #[test]
    fn release_of_first_claim_removes_marker() {
        let m = markers();
        let claim = m.claim(4, "event:Yule:0", "2026-12-21").unwrap().unwrap();
        m.release(&claim).unwrap();
        assert_eq!(m.last_fired(4, "event:Yule:0").unwrap(), None);
    }
}
