//! `moonwheel-scheduler`: the two fixed-interval notification loops.
//!
//! # Overview
//!
//! [`engine::SchedulerEngine`] owns everything a tick needs (store, markers,
//! composer, dispatch gateway) and drives two independent loops:
//!
//! | Loop          | Default interval | Fires when                                        |
//! |---------------|------------------|---------------------------------------------------|
//! | Daily digest  | 60 s             | local weekday in days, local hour == delivery hour |
//! | Event alerts  | 3600 s           | next event is 7, 1 or 0 days away, local hour ≥ delivery hour |
//!
//! Both claim a persisted delivery marker before sending, so a notification
//! goes out at most once per (user, kind, date) no matter how many ticks see
//! the user as eligible.

pub mod alerts;
pub mod digest;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod types;

pub use engine::SchedulerEngine;
pub use error::{Result, SchedulerError};
pub use types::{LoopKind, TickReport, UserOutcome};
