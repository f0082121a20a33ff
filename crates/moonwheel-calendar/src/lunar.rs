//! Lunar phase arithmetic.
//!
//! Full-moon instants use the mean-phase series from Meeus, *Astronomical
//! Algorithms* ch. 49, with the principal periodic terms (accurate to a few
//! minutes for dates near the present). Phase labels bucket the illuminated
//! fraction derived from the mean synodic age.

use std::f64::consts::PI;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

/// Mean synodic month in days.
pub const SYNODIC_MONTH: f64 = 29.530588861;
/// JDE of the mean new moon with lunation number k = 0 (2000-01-06).
const EPOCH_JDE: f64 = 2451550.09766;
const UNIX_EPOCH_JD: f64 = 2440587.5;
const MILLIS_PER_DAY: f64 = 86_400_000.0;
/// TT − UTC, close enough for date-level answers this decade.
const DELTA_T_DAYS: f64 = 69.2 / 86_400.0;

/// Coarse phase bucket over the 0–100 illumination scale. Thresholds are
/// fixed: `[0,10)` New, `[10,50)` Waxing, `[50,60)` Full, `[60,90)` Waning,
/// `[90,100]` New again.
///
/// Illumination rises and falls symmetrically, so the label does not tell
/// waxing from waning, and a disc that is almost fully lit lands in the top
/// bucket (New). Existing users know these labels; keep the mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LunarPhase {
    New,
    Waxing,
    Full,
    Waning,
}

impl LunarPhase {
    pub const NEW_BELOW: f64 = 10.0;
    pub const WAXING_BELOW: f64 = 50.0;
    pub const FULL_BELOW: f64 = 60.0;
    pub const WANING_BELOW: f64 = 90.0;

    /// Classify a 0–100 percentage. Out-of-range input is clamped; NaN is New.
    pub fn from_percent(percent: f64) -> Self {
        let p = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        if p < Self::NEW_BELOW {
            LunarPhase::New
        } else if p < Self::WAXING_BELOW {
            LunarPhase::Waxing
        } else if p < Self::FULL_BELOW {
            LunarPhase::Full
        } else if p < Self::WANING_BELOW {
            LunarPhase::Waning
        } else {
            LunarPhase::New
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            LunarPhase::New => "\u{1f311}",
            LunarPhase::Waxing => "\u{1f312}",
            LunarPhase::Full => "\u{1f315}",
            LunarPhase::Waning => "\u{1f318}",
        }
    }
}

impl std::fmt::Display for LunarPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LunarPhase::New => "new",
            LunarPhase::Waxing => "waxing",
            LunarPhase::Full => "full",
            LunarPhase::Waning => "waning",
        };
        write!(f, "{s}")
    }
}

fn julian_day(instant: DateTime<Utc>) -> f64 {
    instant.timestamp_millis() as f64 / MILLIS_PER_DAY + UNIX_EPOCH_JD
}

/// Degrees → radians after reducing to [0, 360).
fn rad(degrees: f64) -> f64 {
    degrees.rem_euclid(360.0) * PI / 180.0
}

/// Progress through the current lunation, 0 at new moon, 50 at full.
pub fn lunation_percent(instant: DateTime<Utc>) -> f64 {
    let age = (julian_day(instant) - EPOCH_JDE).rem_euclid(SYNODIC_MONTH);
    age / SYNODIC_MONTH * 100.0
}

/// Illuminated fraction of the disc as a percentage (0 new, 100 full).
pub fn illumination_percent(instant: DateTime<Utc>) -> f64 {
    let angle = lunation_percent(instant) / 100.0 * 2.0 * PI;
    (1.0 - angle.cos()) / 2.0 * 100.0
}

/// Phase bucket at an instant, from the illuminated fraction.
pub fn phase_at(instant: DateTime<Utc>) -> LunarPhase {
    LunarPhase::from_percent(illumination_percent(instant))
}

/// Phase bucket for a calendar date, evaluated at 12:00 UTC.
pub fn lunar_phase_label(date: NaiveDate) -> LunarPhase {
    let noon = Utc.from_utc_datetime(&date.and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()));
    phase_at(noon)
}

/// JDE (TT) of the full moon for lunation `k` (integer + 0.5).
fn full_moon_jde(k: f64) -> f64 {
    let t = k / 1236.85;
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;

    let mean = EPOCH_JDE + SYNODIC_MONTH * k + 0.00015437 * t2 - 0.000000150 * t3
        + 0.00000000073 * t4;

    let e = 1.0 - 0.002516 * t - 0.0000074 * t2;
    let m = rad(2.5534 + 29.10535670 * k - 0.0000014 * t2 - 0.00000011 * t3);
    let mp = rad(
        201.5643 + 385.81693528 * k + 0.0107582 * t2 + 0.00001238 * t3 - 0.000000058 * t4,
    );
    let f = rad(
        160.7108 + 390.67050284 * k - 0.0016118 * t2 - 0.00000227 * t3 + 0.000000011 * t4,
    );
    let omega = rad(124.7746 - 1.56375588 * k + 0.0020672 * t2 + 0.00000215 * t3);

    let correction = -0.40614 * mp.sin()
        + 0.17302 * e * m.sin()
        + 0.01614 * (2.0 * mp).sin()
        + 0.01043 * (2.0 * f).sin()
        + 0.00734 * e * (mp - m).sin()
        - 0.00515 * e * (mp + m).sin()
        + 0.00209 * e * e * (2.0 * m).sin()
        - 0.00111 * (mp - 2.0 * f).sin()
        - 0.00057 * (mp + 2.0 * f).sin()
        + 0.00056 * e * (2.0 * mp + m).sin()
        - 0.00042 * (3.0 * mp).sin()
        + 0.00042 * e * (m + 2.0 * f).sin()
        + 0.00038 * e * (m - 2.0 * f).sin()
        - 0.00024 * e * (2.0 * mp - m).sin()
        - 0.00017 * omega.sin()
        - 0.00007 * (mp + 2.0 * m).sin()
        + 0.00004 * (2.0 * mp - 2.0 * f).sin()
        + 0.00004 * (3.0 * m).sin()
        + 0.00003 * (mp + m - 2.0 * f).sin()
        + 0.00003 * (2.0 * mp + 2.0 * f).sin()
        - 0.00003 * (mp + m + 2.0 * f).sin()
        + 0.00003 * (mp - m + 2.0 * f).sin()
        - 0.00002 * (mp - m - 2.0 * f).sin()
        - 0.00002 * (3.0 * mp + m).sin()
        + 0.00002 * (4.0 * mp).sin();

    mean + correction
}

/// The first full moon strictly after `now`, in UTC.
pub fn next_full_moon_instant(now: DateTime<Utc>) -> DateTime<Utc> {
    let jd_now = julian_day(now);
    // Start one lunation back so corrections can never skip a candidate.
    let mut k = ((jd_now - EPOCH_JDE) / SYNODIC_MONTH).floor() - 1.0 + 0.5;
    loop {
        let jd = full_moon_jde(k) - DELTA_T_DAYS;
        if jd > jd_now {
            let offset_ms = ((jd - jd_now) * MILLIS_PER_DAY).round() as i64;
            return now + Duration::milliseconds(offset_ms);
        }
        k += 1.0;
    }
}

/// Local calendar date (in `tz`) of the next full moon after `now`.
///
/// The same instant can land on different dates in different zones; each
/// user sees the date on their own wall calendar.
pub fn next_full_moon(tz: Tz, now: DateTime<Utc>) -> NaiveDate {
    next_full_moon_instant(now).with_timezone(&tz).date_naive()
}
