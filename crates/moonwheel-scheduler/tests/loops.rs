// Drive both loops with a simulated clock and a recording chat client.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::Connection;

use moonwheel_core::config::SchedulerConfig;
use moonwheel_core::RegionCatalog;
use moonwheel_notify::{
    ChatClient, Composer, DispatchGateway, InteractionHandle, NotificationPayload, SendError,
};
use moonwheel_prefs::db::open_shared;
use moonwheel_prefs::{ContentPool, MarkerStore, PreferenceStore, PreferenceUpdate};
use moonwheel_scheduler::{LoopKind, SchedulerEngine};

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<(u64, NotificationPayload)>>,
    attempts: Mutex<usize>,
    fail_with: Mutex<Option<SendError>>,
}

impl Recorder {
    fn sent(&self) -> Vec<(u64, NotificationPayload)> {
        self.sent.lock().unwrap().clone()
    }

    fn fail_with(&self, err: Option<SendError>) {
        *self.fail_with.lock().unwrap() = err;
    }
}

#[async_trait]
impl ChatClient for Recorder {
    async fn send_direct_message(
        &self,
        user_id: u64,
        payload: &NotificationPayload,
    ) -> Result<(), SendError> {
        *self.attempts.lock().unwrap() += 1;
        if let Some(err) = self.fail_with.lock().unwrap().clone() {
            return Err(err);
        }
        self.sent.lock().unwrap().push((user_id, payload.clone()));
        Ok(())
    }

    async fn send_interaction_response(
        &self,
        _handle: &InteractionHandle,
        _payload: &NotificationPayload,
    ) -> Result<(), SendError> {
        Ok(())
    }

    async fn send_follow_up(
        &self,
        _handle: &InteractionHandle,
        _payload: &NotificationPayload,
    ) -> Result<(), SendError> {
        Ok(())
    }
}

struct Harness {
    engine: SchedulerEngine,
    store: PreferenceStore,
    markers: MarkerStore,
    client: Arc<Recorder>,
}

fn harness() -> Harness {
    let conn = open_shared(Connection::open_in_memory().unwrap()).unwrap();
    let store = PreferenceStore::new(conn.clone());
    let markers = MarkerStore::new(conn.clone());
    let client = Arc::new(Recorder::default());
    let gateway = DispatchGateway::new(
        client.clone(),
        2,
        Duration::from_millis(1),
        Duration::from_secs(1),
    );
    let engine = SchedulerEngine::new(
        store.clone(),
        markers.clone(),
        Arc::new(RegionCatalog::builtin()),
        Composer::new(ContentPool::new(conn)),
        gateway,
        SchedulerConfig::default(),
    );
    Harness {
        engine,
        store,
        markers,
        client,
    }
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn subscribe_north_monday(store: &PreferenceStore, user_id: u64) {
    store
        .upsert(
            user_id,
            &PreferenceUpdate::new()
                .region("north-america")
                .delivery_hour(9)
                .delivery_days("Mon".parse().unwrap())
                .subscribed(true)
                .daily_digest(true),
        )
        .unwrap();
}

#[tokio::test]
async fn simulated_monday_delivers_exactly_once() {
    let h = harness();
    subscribe_north_monday(&h.store, 1);

    // 2026-03-02 is a Monday; New York is UTC-5 until 8 March.
    // Walk every minute from local midnight Monday to local midnight Wednesday.
    let start = utc(2026, 3, 2, 5, 0);
    for minute in 0..(2 * 24 * 60) {
        let now = start + chrono::Duration::minutes(minute);
        h.engine.tick_at(LoopKind::DailyDigest, now).await.unwrap();
    }

    let sent = h.client.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 1);
    assert_eq!(
        h.markers.last_fired(1, "daily_digest").unwrap().as_deref(),
        Some("2026-03-02")
    );
}

#[tokio::test]
async fn north_region_payload_end_to_end() {
    let h = harness();
    subscribe_north_monday(&h.store, 7);

    let report = h
        .engine
        .digest_tick_at(utc(2026, 3, 2, 14, 0))
        .await
        .unwrap();
    assert_eq!((report.considered, report.sent), (1, 1));

    let (_, payload) = h.client.sent().remove(0);
    assert!(payload.body.contains("2 March 2026"));
    assert!(payload.body.contains("Quote:"));
    assert!(payload.body.contains("Journal Prompt:"));
    assert!(payload.body.contains("America/New_York"));
    // North table: Ostara on 21 March.
    assert!(payload.fields[0].value.contains("Ostara"));
    assert!(payload.fields[0].value.contains("21 March 2026"));
    assert_eq!(payload.actions.len(), 3);
}

#[tokio::test]
async fn unsubscribed_and_incomplete_users_are_never_sent() {
    let h = harness();
    subscribe_north_monday(&h.store, 1);
    h.store.set_subscription(1, false).unwrap();
    // Subscribed but never finished onboarding: no region.
    h.store.set_subscription(2, true).unwrap();
    // Region no longer in the catalog.
    h.store
        .upsert(
            3,
            &PreferenceUpdate::new()
                .region("atlantis")
                .subscribed(true)
                .daily_digest(true),
        )
        .unwrap();

    let report = h
        .engine
        .digest_tick_at(utc(2026, 3, 2, 14, 0))
        .await
        .unwrap();
    assert_eq!(report.considered, 2);
    assert_eq!(report.skipped, 2);
    assert!(h.client.sent().is_empty());
}

#[tokio::test]
async fn transient_failure_is_retried_next_tick() {
    let h = harness();
    subscribe_north_monday(&h.store, 1);
    h.client.fail_with(Some(SendError::Transient("429".into())));

    let report = h
        .engine
        .digest_tick_at(utc(2026, 3, 2, 14, 0))
        .await
        .unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(h.markers.last_fired(1, "daily_digest").unwrap(), None);

    h.client.fail_with(None);
    let report = h
        .engine
        .digest_tick_at(utc(2026, 3, 2, 14, 1))
        .await
        .unwrap();
    assert_eq!(report.sent, 1);
}

#[tokio::test]
async fn unreachable_user_is_not_retried_that_day() {
    let h = harness();
    subscribe_north_monday(&h.store, 1);
    h.client.fail_with(Some(SendError::Forbidden));

    h.engine
        .digest_tick_at(utc(2026, 3, 2, 14, 0))
        .await
        .unwrap();
    assert_eq!(*h.client.attempts.lock().unwrap(), 1);

    h.client.fail_with(None);
    let report = h
        .engine
        .digest_tick_at(utc(2026, 3, 2, 14, 5))
        .await
        .unwrap();
    assert_eq!(report.skipped, 1);
    assert!(h.client.sent().is_empty());
}

#[tokio::test]
async fn store_failure_skips_the_tick() {
    let h = harness();
    h.store
        .connection()
        .lock()
        .unwrap()
        .execute_batch("DROP TABLE users;")
        .unwrap();
    assert!(h
        .engine
        .digest_tick_at(utc(2026, 3, 2, 14, 0))
        .await
        .is_err());
}

#[tokio::test]
async fn event_alerts_fire_once_per_lead() {
    let h = harness();
    h.store
        .upsert(
            5,
            &PreferenceUpdate::new()
                .region("europe")
                .subscribed(true)
                .daily_digest(false),
        )
        .unwrap();

    // Hourly ticks from 20 October through 1 November 2026; Samhain is the 31st.
    let start = utc(2026, 10, 20, 0, 0);
    for hour in 0..(13 * 24) {
        let now = start + chrono::Duration::hours(hour);
        h.engine.tick_at(LoopKind::EventAlert, now).await.unwrap();
    }

    let titles: Vec<String> = h.client.sent().into_iter().map(|(_, p)| p.title).collect();
    assert_eq!(titles.len(), 3, "{titles:?}");
    assert!(titles.iter().all(|t| t.contains("Samhain")));
    assert!(titles[2].ends_with("is today"));
    for lead in [7, 1, 0] {
        assert_eq!(
            h.markers
                .last_fired(5, &format!("event:Samhain:{lead}"))
                .unwrap()
                .as_deref(),
            Some("2026-10-31")
        );
    }
}

#[tokio::test]
async fn shutdown_stops_the_loop() {
    let h = harness();
    let engine = Arc::new(h.engine);
    let (tx, rx) = tokio::sync::watch::channel(false);
    let task = tokio::spawn(engine.run(LoopKind::DailyDigest, rx));
    tx.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("loop did not stop")
        .unwrap();
}
