// Concurrent writers against one shared connection must never lose an update.

use std::sync::Arc;
use std::thread;

use moonwheel_prefs::db::open_shared;
use moonwheel_prefs::{MarkerStore, PreferenceStore, PreferenceUpdate};
use rusqlite::Connection;

fn shared() -> moonwheel_prefs::SharedConnection {
    open_shared(Connection::open_in_memory().unwrap()).unwrap()
}

#[test]
fn disjoint_partial_updates_all_land() {
    let store = Arc::new(PreferenceStore::new(shared()));
    store
        .upsert(1, &PreferenceUpdate::new().region("europe"))
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let store = store.clone();
            thread::spawn(move || {
                for _ in 0..25 {
                    let update = match i {
                        0 => PreferenceUpdate::new().tag("Pisces"),
                        1 => PreferenceUpdate::new().delivery_hour(21),
                        2 => PreferenceUpdate::new().subscribed(true),
                        _ => PreferenceUpdate::new().daily_digest(true),
                    };
                    store.upsert(1, &update).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let pref = store.get(1).unwrap().unwrap();
    assert_eq!(pref.region.as_deref(), Some("europe"));
    assert_eq!(pref.tag.as_deref(), Some("Pisces"));
    assert_eq!(pref.delivery_hour, 21);
    assert!(pref.subscribed);
    assert!(pref.daily_digest);
}

#[test]
fn exactly_one_racer_wins_a_marker() {
    let markers = Arc::new(MarkerStore::new(shared()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let markers = markers.clone();
            thread::spawn(move || {
                markers
                    .claim(5, "daily_digest", "2026-10-16")
                    .unwrap()
                    .is_some()
            })
        })
        .collect();
    let winners = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|won| *won)
        .count();
    assert_eq!(winners, 1);
}

#[test]
fn delete_also_clears_markers() {
    let conn = shared();
    let store = PreferenceStore::new(conn.clone());
    let markers = MarkerStore::new(conn);
    store.set_subscription(3, true).unwrap();
    markers.claim(3, "daily_digest", "2026-10-16").unwrap();
    markers.claim(3, "event:Samhain:7", "2026-10-31").unwrap();
    markers.claim(4, "daily_digest", "2026-10-16").unwrap();

    assert!(store.delete(3).unwrap());
    assert_eq!(markers.last_fired(3, "daily_digest").unwrap(), None);
    assert_eq!(markers.last_fired(3, "event:Samhain:7").unwrap(), None);
    assert_eq!(
        markers.last_fired(4, "daily_digest").unwrap().as_deref(),
        Some("2026-10-16")
    );
}
