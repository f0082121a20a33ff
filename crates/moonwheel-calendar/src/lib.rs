//! `moonwheel-calendar`: pure date arithmetic for seasonal events and the moon.
//!
//! # Overview
//!
//! | Function                        | Answers                                          |
//! |---------------------------------|--------------------------------------------------|
//! | [`next_recurring_date`]         | Soonest seasonal event on or after a local date  |
//! | [`next_full_moon`]              | Local calendar date of the next full moon        |
//! | [`phase_at`] / [`lunar_phase_label`] | Four-bucket moon phase                     |
//!
//! Nothing here performs I/O or reads the clock; callers pass `today`/`now`.

pub mod lunar;
pub mod recurring;

pub use lunar::{
    illumination_percent, lunar_phase_label, lunation_percent, next_full_moon,
    next_full_moon_instant, phase_at, LunarPhase,
};
pub use recurring::{days_until, next_recurring_date, occurrences, RecurringDate, EVENT_NAMES};
