use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use moonwheel_core::RegionCatalog;
use moonwheel_prefs::{PreferenceStore, PreferenceUpdate, UserPreference};

use crate::session::{Choice, OnboardingPrompt, OnboardingSession, Transition};

/// What the chat layer should do after a choice was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingOutcome {
    /// Show the next step.
    Prompt(OnboardingPrompt),
    /// Saved; carries the stored record.
    Completed(UserPreference),
    Cancelled,
    /// The session sat idle past the timeout and was dropped.
    Expired,
    /// No session for this user (never started, finished or purged).
    NoSession,
    /// The final write failed. The session is back on its last step, so
    /// answering again retries the save.
    PersistFailed(OnboardingPrompt),
    /// The choice did not fit the current step; carries the reason and the
    /// prompt to show again.
    Rejected {
        reason: String,
        prompt: OnboardingPrompt,
    },
}

struct Entry {
    session: OnboardingSession,
    last_activity: DateTime<Utc>,
    /// Bumped by every `start`, so a save that finishes late can tell whether
    /// the slot still holds its own session.
    generation: u64,
    /// The final answer is being written; further clicks are turned away.
    saving: bool,
    /// Saved with the answers so digests can greet the user by name.
    display_name: Option<String>,
}

/// First half of a choice: either a finished outcome, or a completed session
/// whose answers still have to be written.
enum Advance {
    Done(OnboardingOutcome),
    Save {
        generation: u64,
        update: PreferenceUpdate,
        before: OnboardingSession,
    },
}

/// In-flight onboarding sessions, one per user.
///
/// Sessions live only in memory. The store is touched exactly once per
/// session, when the final answer arrives. No map shard is held while the
/// store is written.
pub struct OnboardingManager {
    sessions: DashMap<u64, Entry>,
    next_generation: AtomicU64,
    store: PreferenceStore,
    catalog: Arc<RegionCatalog>,
    tags: Vec<String>,
    timeout: Duration,
}

impl OnboardingManager {
    pub fn new(
        store: PreferenceStore,
        catalog: Arc<RegionCatalog>,
        tags: Vec<String>,
        timeout_secs: u64,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            next_generation: AtomicU64::new(1),
            store,
            catalog,
            tags,
            timeout: Duration::seconds(timeout_secs as i64),
        }
    }

    fn entry(
        &self,
        session: OnboardingSession,
        display_name: Option<String>,
        now: DateTime<Utc>,
    ) -> Entry {
        Entry {
            session,
            last_activity: now,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            saving: false,
            display_name,
        }
    }

    fn prompt_for(&self, session: &OnboardingSession) -> OnboardingPrompt {
        session.prompt(&self.catalog, &self.tags)
    }

    /// Begin onboarding for `user_id`, discarding any unfinished session.
    pub fn start(
        &self,
        user_id: u64,
        display_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> OnboardingPrompt {
        let session = OnboardingSession::new();
        let prompt = self.prompt_for(&session);
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(String::from);
        let previous = self
            .sessions
            .insert(user_id, self.entry(session, display_name, now));
        if previous.is_some() {
            debug!(user_id, "restarted onboarding; previous session discarded");
        } else {
            info!(user_id, "onboarding started");
        }
        prompt
    }

    /// Apply one choice to the user's session.
    pub fn handle(&self, user_id: u64, choice: &Choice, now: DateTime<Utc>) -> OnboardingOutcome {
        match self.advance(user_id, choice, now) {
            Advance::Done(outcome) => outcome,
            Advance::Save {
                generation,
                update,
                before,
            } => {
                let saved = self.store.upsert(user_id, &update);
                self.settle(user_id, generation, before, update.display_name, saved, now)
            }
        }
    }

    /// Apply `choice` under the entry's lock. A completed session stays in
    /// the map, flagged as saving, until [`settle`](Self::settle) runs.
    fn advance(&self, user_id: u64, choice: &Choice, now: DateTime<Utc>) -> Advance {
        let Some(mut entry) = self.sessions.get_mut(&user_id) else {
            return Advance::Done(OnboardingOutcome::NoSession);
        };
        let generation = entry.generation;

        if now - entry.last_activity > self.timeout {
            info!(user_id, step = %entry.session.step(), "onboarding session expired");
            drop(entry);
            self.sessions.remove_if(&user_id, |_, e| e.generation == generation);
            return Advance::Done(OnboardingOutcome::Expired);
        }

        if entry.saving {
            return Advance::Done(OnboardingOutcome::Rejected {
                reason: "Your answers are already being saved.".to_string(),
                prompt: self.prompt_for(&entry.session),
            });
        }

        let mut next = entry.session.clone();
        match next.apply(choice, &self.catalog, &self.tags) {
            Err(e) => {
                debug!(user_id, error = %e, "onboarding choice rejected");
                Advance::Done(OnboardingOutcome::Rejected {
                    reason: e.to_string(),
                    prompt: self.prompt_for(&entry.session),
                })
            }
            Ok(Transition::Advanced(step)) => {
                debug!(user_id, %step, "onboarding advanced");
                let prompt = self.prompt_for(&next);
                entry.session = next;
                entry.last_activity = now;
                Advance::Done(OnboardingOutcome::Prompt(prompt))
            }
            Ok(Transition::Cancelled) => {
                info!(user_id, step = %entry.session.step(), "onboarding cancelled");
                drop(entry);
                self.sessions.remove_if(&user_id, |_, e| e.generation == generation);
                Advance::Done(OnboardingOutcome::Cancelled)
            }
            Ok(Transition::Completed) => match next.to_update() {
                Some(mut update) => {
                    if let Some(name) = &entry.display_name {
                        update = update.display_name(name.clone());
                    }
                    entry.saving = true;
                    Advance::Save {
                        generation,
                        update,
                        before: entry.session.clone(),
                    }
                }
                None => {
                    warn!(user_id, "completed session produced no update");
                    entry.last_activity = now;
                    Advance::Done(OnboardingOutcome::PersistFailed(
                        self.prompt_for(&entry.session),
                    ))
                }
            },
        }
    }

    /// Finish a save started by [`advance`](Self::advance).
    ///
    /// Only the session that started the save is touched: a restart that
    /// happened during the write keeps its fresh session either way.
    fn settle(
        &self,
        user_id: u64,
        generation: u64,
        before: OnboardingSession,
        display_name: Option<String>,
        saved: moonwheel_prefs::Result<UserPreference>,
        now: DateTime<Utc>,
    ) -> OnboardingOutcome {
        match saved {
            Ok(pref) => {
                self.sessions.remove_if(&user_id, |_, e| e.generation == generation);
                info!(user_id, region = ?pref.region, "onboarding complete");
                OnboardingOutcome::Completed(pref)
            }
            Err(e) => {
                warn!(user_id, error = %e, "failed to save onboarding answers");
                let prompt = match self.sessions.entry(user_id) {
                    MapEntry::Occupied(mut slot) if slot.get().generation == generation => {
                        let entry = slot.get_mut();
                        entry.saving = false;
                        entry.last_activity = now;
                        self.prompt_for(&entry.session)
                    }
                    MapEntry::Occupied(slot) => {
                        debug!(user_id, "onboarding restarted during save; keeping new session");
                        self.prompt_for(&slot.get().session)
                    }
                    MapEntry::Vacant(slot) => {
                        let prompt = self.prompt_for(&before);
                        slot.insert(self.entry(before, display_name, now));
                        prompt
                    }
                };
                OnboardingOutcome::PersistFailed(prompt)
            }
        }
    }

    /// Drop sessions idle past the timeout. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, entry| now - entry.last_activity <= self.timeout);
        let purged = before.saturating_sub(self.sessions.len());
        if purged > 0 {
            debug!(purged, "expired onboarding sessions purged");
        }
        purged
    }

    pub fn has_session(&self, user_id: u64) -> bool {
        self.sessions.contains_key(&user_id)
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    pub fn catalog(&self) -> &RegionCatalog {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Step;
    use moonwheel_core::config::default_tags;
    use moonwheel_prefs::db::open_shared;
    use moonwheel_prefs::PrefsError;
    use rusqlite::Connection;

    fn manager(timeout_secs: u64) -> (OnboardingManager, PreferenceStore) {
        let store =
            PreferenceStore::new(open_shared(Connection::open_in_memory().unwrap()).unwrap());
        let mgr = OnboardingManager::new(
            store.clone(),
            Arc::new(RegionCatalog::builtin()),
            default_tags(),
            timeout_secs,
        );
        (mgr, store)
    }

    fn t(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn completing_writes_a_single_subscribed_record() {
        let (mgr, store) = manager(600);
        mgr.start(1, Some(" Rowan "), t(0));
        mgr.handle(1, &Choice::Region("south-america".into()), t(1));
        assert_eq!(store.get(1).unwrap(), None);
        mgr.handle(1, &Choice::Tag("Gemini".into()), t(2));
        assert_eq!(store.get(1).unwrap(), None);

        let OnboardingOutcome::Completed(pref) = mgr.handle(1, &Choice::Daily(true), t(3)) else {
            panic!("expected completion");
        };
        assert_eq!(pref.region.as_deref(), Some("south-america"));
        assert_eq!(pref.tag.as_deref(), Some("Gemini"));
        assert_eq!(pref.display_name.as_deref(), Some("Rowan"));
        assert!(pref.subscribed);
        assert!(pref.daily_digest);
        assert_eq!(store.get(1).unwrap(), Some(pref));
        assert!(!mgr.has_session(1));
    }

    #[test]
    fn cancel_at_tag_step_leaves_no_record() {
        let (mgr, store) = manager(600);
        mgr.start(2, None, t(0));
        mgr.handle(2, &Choice::Region("europe".into()), t(1));
        assert_eq!(mgr.handle(2, &Choice::Cancel, t(2)), OnboardingOutcome::Cancelled);
        assert_eq!(store.get(2).unwrap(), None);
        assert_eq!(mgr.handle(2, &Choice::Tag("Leo".into()), t(3)), OnboardingOutcome::NoSession);
    }

    #[test]
    fn restart_discards_previous_answers() {
        let (mgr, _) = manager(600);
        mgr.start(3, None, t(0));
        mgr.handle(3, &Choice::Region("europe".into()), t(1));
        let prompt = mgr.start(3, None, t(2));
        assert_eq!(prompt.step, Step::AwaitingRegion);
        let outcome = mgr.handle(3, &Choice::Tag("Leo".into()), t(3));
        assert!(matches!(outcome, OnboardingOutcome::Rejected { .. }));
    }

    #[test]
    fn idle_session_expires() {
        let (mgr, store) = manager(600);
        mgr.start(4, None, t(0));
        mgr.handle(4, &Choice::Region("africa".into()), t(500));
        // 600 s after the last answer is still fine; 601 is not.
        mgr.handle(4, &Choice::Tag("Aries".into()), t(1100));
        assert_eq!(mgr.handle(4, &Choice::Daily(false), t(1701)), OnboardingOutcome::Expired);
        assert_eq!(store.get(4).unwrap(), None);
    }

    #[test]
    fn purge_drops_only_stale_sessions() {
        let (mgr, _) = manager(60);
        mgr.start(5, None, t(0));
        mgr.start(6, None, t(100));
        assert_eq!(mgr.purge_expired(t(120)), 1);
        assert!(!mgr.has_session(5));
        assert!(mgr.has_session(6));
    }

    #[test]
    fn failed_save_keeps_session_for_retry() {
        let (mgr, store) = manager(600);
        mgr.start(7, None, t(0));
        mgr.handle(7, &Choice::Region("europe".into()), t(1));
        mgr.handle(7, &Choice::Tag("Libra".into()), t(2));

        store
            .connection()
            .lock()
            .unwrap()
            .execute_batch("DROP TABLE users;")
            .unwrap();
        let outcome = mgr.handle(7, &Choice::Daily(true), t(3));
        let OnboardingOutcome::PersistFailed(prompt) = outcome else {
            panic!("expected PersistFailed, got {outcome:?}");
        };
        assert_eq!(prompt.step, Step::AwaitingDailyChoice);
        assert!(mgr.has_session(7));

        moonwheel_prefs::db::init_db(&store.connection().lock().unwrap()).unwrap();
        assert!(matches!(
            mgr.handle(7, &Choice::Daily(true), t(4)),
            OnboardingOutcome::Completed(_)
        ));
    }

    fn until_save(mgr: &OnboardingManager, user_id: u64) -> (u64, PreferenceUpdate, OnboardingSession) {
        mgr.start(user_id, None, t(0));
        mgr.handle(user_id, &Choice::Region("europe".into()), t(1));
        mgr.handle(user_id, &Choice::Tag("Virgo".into()), t(2));
        let Advance::Save {
            generation,
            update,
            before,
        } = mgr.advance(user_id, &Choice::Daily(true), t(3))
        else {
            panic!("expected a pending save");
        };
        (generation, update, before)
    }

    #[test]
    fn restart_during_failed_save_keeps_new_session() {
        let (mgr, store) = manager(600);
        let (generation, _, before) = until_save(&mgr, 8);

        mgr.start(8, None, t(4));
        let outcome = mgr.settle(8, generation, before, None, Err(PrefsError::LockPoisoned), t(5));
        let OnboardingOutcome::PersistFailed(prompt) = outcome else {
            panic!("expected PersistFailed, got {outcome:?}");
        };
        assert_eq!(prompt.step, Step::AwaitingRegion);
        assert!(matches!(
            mgr.handle(8, &Choice::Region("africa".into()), t(6)),
            OnboardingOutcome::Prompt(p) if p.step == Step::AwaitingTag
        ));
        assert_eq!(store.get(8).unwrap(), None);
    }

    #[test]
    fn restart_during_successful_save_keeps_new_session() {
        let (mgr, store) = manager(600);
        let (generation, update, before) = until_save(&mgr, 9);

        mgr.start(9, None, t(4));
        let saved = store.upsert(9, &update);
        assert!(matches!(
            mgr.settle(9, generation, before, None, saved, t(5)),
            OnboardingOutcome::Completed(_)
        ));
        assert!(mgr.has_session(9));
    }

    #[test]
    fn click_during_save_is_turned_away() {
        let (mgr, store) = manager(600);
        let (generation, update, before) = until_save(&mgr, 10);

        let outcome = mgr.handle(10, &Choice::Daily(false), t(4));
        assert!(matches!(outcome, OnboardingOutcome::Rejected { .. }), "{outcome:?}");
        assert_eq!(store.get(10).unwrap(), None);

        let saved = store.upsert(10, &update);
        assert!(matches!(
            mgr.settle(10, generation, before, None, saved, t(5)),
            OnboardingOutcome::Completed(p) if p.daily_digest
        ));
        assert!(!mgr.has_session(10));
    }
}
