use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use moonwheel_core::config::SchedulerConfig;
use moonwheel_core::{RegionCatalog, RegionProfile};
use moonwheel_notify::{Composer, DeliveryResult, Destination, DispatchGateway, NotificationPayload};
use moonwheel_prefs::{Claim, MarkerStore, PreferenceStore, UserPreference};

use crate::error::{Result, SchedulerError};
use crate::types::{LoopKind, TickReport, UserOutcome};

/// Everything a tick needs. Shared by both loops; neither loop holds state
/// between ticks apart from what lives in the database.
pub struct SchedulerEngine {
    pub(crate) store: PreferenceStore,
    pub(crate) markers: MarkerStore,
    pub(crate) catalog: Arc<RegionCatalog>,
    pub(crate) composer: Composer,
    pub(crate) gateway: DispatchGateway,
    pub(crate) config: SchedulerConfig,
}

impl SchedulerEngine {
    pub fn new(
        store: PreferenceStore,
        markers: MarkerStore,
        catalog: Arc<RegionCatalog>,
        composer: Composer,
        gateway: DispatchGateway,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            markers,
            catalog,
            composer,
            gateway,
            config,
        }
    }

    pub fn interval(&self, kind: LoopKind) -> Duration {
        let secs = match kind {
            LoopKind::DailyDigest => self.config.digest_interval_secs,
            LoopKind::EventAlert => self.config.alert_interval_secs,
        };
        Duration::from_secs(secs.max(1))
    }

    /// One evaluation of `kind` at `now`.
    pub async fn tick_at(&self, kind: LoopKind, now: DateTime<Utc>) -> Result<TickReport> {
        match kind {
            LoopKind::DailyDigest => self.digest_tick_at(now).await,
            LoopKind::EventAlert => self.alert_tick_at(now).await,
        }
    }

    /// Drive one loop until `shutdown` broadcasts `true`.
    ///
    /// The tick is awaited inside the loop body, so ticks of the same loop
    /// never overlap; a tick that overruns the interval causes the missed
    /// ticks to be skipped rather than burst.
    pub async fn run(self: Arc<Self>, kind: LoopKind, mut shutdown: watch::Receiver<bool>) {
        let period = self.interval(kind);
        info!(loop_kind = %kind, interval_secs = period.as_secs(), "scheduler loop started");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick_at(kind, Utc::now()).await {
                        Ok(report) if report.sent > 0 || report.failed > 0 => {
                            info!(
                                loop_kind = %kind,
                                considered = report.considered,
                                sent = report.sent,
                                skipped = report.skipped,
                                failed = report.failed,
                                "tick complete"
                            );
                        }
                        Ok(report) => {
                            debug!(loop_kind = %kind, considered = report.considered, "tick complete");
                        }
                        Err(e) => error!(loop_kind = %kind, error = %e, "tick skipped"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(loop_kind = %kind, "scheduler loop shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Load subscribers and run `per_user` over them with bounded concurrency.
    ///
    /// A failure to load the subscriber list is returned (the tick is
    /// skipped); everything per-user is folded into the report.
    pub(crate) async fn for_each_subscriber<'a, F, Fut>(&'a self, per_user: F) -> Result<TickReport>
    where
        F: Fn(UserPreference) -> Fut + 'a,
        Fut: std::future::Future<Output = UserOutcome> + 'a,
    {
        let users = self.store.list_subscribed()?;
        let report = Mutex::new(TickReport::default());
        stream::iter(users)
            .for_each_concurrent(self.config.max_concurrent_deliveries.max(1), |pref| {
                let fut = per_user(pref);
                let report = &report;
                async move {
                    let outcome = fut.await;
                    if let Ok(mut r) = report.lock() {
                        r.record(outcome);
                    }
                }
            })
            .await;
        Ok(report.into_inner().unwrap_or_default())
    }

    /// Region for a record, or `None` (logged) when it cannot be evaluated.
    pub(crate) fn region_for(&self, pref: &UserPreference) -> Option<&RegionProfile> {
        let key = pref.region.as_deref()?;
        match self.catalog.get(key) {
            Some(region) => Some(region),
            None => {
                let e = SchedulerError::UnknownRegion {
                    key: key.to_string(),
                };
                warn!(user_id = pref.user_id, error = %e, "skipping user");
                None
            }
        }
    }

    /// Deliver a payload whose marker has already been claimed.
    ///
    /// A transient failure releases the claim so a later tick can retry; an
    /// unreachable user keeps the marker so nothing more is attempted for it.
    pub(crate) async fn deliver_claimed(
        &self,
        claim: Claim,
        payload: NotificationPayload,
    ) -> UserOutcome {
        let destination = Destination::Direct(claim.user_id);
        match self.gateway.deliver(&destination, &payload).await {
            DeliveryResult::Ok => {
                debug!(user_id = claim.user_id, kind = %claim.kind, "notification sent");
                UserOutcome::Sent
            }
            DeliveryResult::Unreachable => UserOutcome::Failed,
            DeliveryResult::TransientFailure => {
                self.release(&claim);
                UserOutcome::Failed
            }
        }
    }

    pub(crate) fn release(&self, claim: &Claim) {
        if let Err(e) = self.markers.release(claim) {
            warn!(user_id = claim.user_id, kind = %claim.kind, error = %e, "failed to release marker");
        }
    }
}
