//! Region profiles: a named timezone + hemisphere users pick during onboarding.
//!
//! The catalog is static for the lifetime of the process. Users store only the
//! region `key`; everything else is looked up here at evaluation time.

use std::collections::HashSet;

use chrono_tz::Tz;

use crate::config::RegionConfig;
use crate::error::{MoonwheelError, Result};
use crate::types::Hemisphere;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionProfile {
    /// Stable slug stored in the users table, e.g. `north-america`.
    pub key: String,
    pub name: String,
    pub emoji: String,
    pub timezone: Tz,
    pub hemisphere: Hemisphere,
    /// Embed accent colour (0xRRGGBB).
    pub color: u32,
}

impl RegionProfile {
    pub fn new(
        key: &str,
        name: &str,
        emoji: &str,
        timezone: Tz,
        hemisphere: Hemisphere,
        color: u32,
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            emoji: emoji.to_string(),
            timezone,
            hemisphere,
            color,
        }
    }
}

/// Ordered set of region profiles. Order is the order options are presented
/// in onboarding.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    profiles: Vec<RegionProfile>,
}

impl RegionCatalog {
    /// The five community regions the bot ships with.
    pub fn builtin() -> Self {
        Self {
            profiles: vec![
                RegionProfile::new(
                    "north-america",
                    "North America",
                    "\u{1f5fd}",
                    chrono_tz::America::New_York,
                    Hemisphere::North,
                    0x2ecc71,
                ),
                RegionProfile::new(
                    "south-america",
                    "South America",
                    "\u{1f334}",
                    chrono_tz::America::Sao_Paulo,
                    Hemisphere::South,
                    0xe67e22,
                ),
                RegionProfile::new(
                    "europe",
                    "Europe",
                    "\u{1f340}",
                    chrono_tz::Europe::London,
                    Hemisphere::North,
                    0x3498db,
                ),
                RegionProfile::new(
                    "africa",
                    "Africa",
                    "\u{1f30d}",
                    chrono_tz::Africa::Johannesburg,
                    Hemisphere::South,
                    0xf1c40f,
                ),
                RegionProfile::new(
                    "oceania-asia",
                    "Oceania & Asia",
                    "\u{1f33a}",
                    chrono_tz::Australia::Sydney,
                    Hemisphere::South,
                    0x9b59b6,
                ),
            ],
        }
    }

    /// Build a catalog from operator-supplied entries.
    ///
    /// Rejects an empty table, duplicate or blank keys, keys containing `:`
    /// (reserved by component ids) and unknown IANA timezone names.
    pub fn from_config(entries: &[RegionConfig]) -> Result<Self> {
        if entries.is_empty() {
            return Err(MoonwheelError::Config("region table is empty".into()));
        }

        let mut seen = HashSet::new();
        let mut profiles = Vec::with_capacity(entries.len());
        for entry in entries {
            let key = entry.key.trim();
            if key.is_empty() || key.contains(':') {
                return Err(MoonwheelError::Config(format!(
                    "invalid region key {:?}",
                    entry.key
                )));
            }
            if !seen.insert(key.to_string()) {
                return Err(MoonwheelError::Config(format!(
                    "duplicate region key {:?}",
                    key
                )));
            }
            let timezone: Tz = entry.timezone.parse().map_err(|_| {
                MoonwheelError::Config(format!(
                    "region {:?}: unknown timezone {:?}",
                    key, entry.timezone
                ))
            })?;
            profiles.push(RegionProfile::new(
                key,
                &entry.name,
                &entry.emoji,
                timezone,
                entry.hemisphere,
                entry.color,
            ));
        }
        Ok(Self { profiles })
    }

    pub fn get(&self, key: &str) -> Option<&RegionProfile> {
        self.profiles.iter().find(|p| p.key == key)
    }

    /// Like [`get`](Self::get) but reports a data error for unknown keys.
    pub fn require(&self, key: &str) -> Result<&RegionProfile> {
        self.get(key).ok_or_else(|| MoonwheelError::UnknownRegion {
            key: key.to_string(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionProfile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
