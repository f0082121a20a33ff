use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{MoonwheelError, Result};
use crate::region::RegionCatalog;
use crate::types::Hemisphere;

pub const DEFAULT_DELIVERY_HOUR: u8 = 9;
pub const DIGEST_INTERVAL_SECS: u64 = 60;
pub const ALERT_INTERVAL_SECS: u64 = 3600;

/// Top-level config (moonwheel.toml + MOONWHEEL_* env overrides).
///
/// Read once at startup; the scheduler loops receive the pieces they need
/// and never consult this struct directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoonwheelConfig {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
    /// Replaces the built-in region catalog when non-empty.
    #[serde(default)]
    pub regions: Vec<RegionConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Register slash commands on this guild only (instant) instead of globally.
    pub guild_id: Option<u64>,
    /// Channel that receives startup notices. Unset disables the notice.
    pub log_channel_id: Option<u64>,
    #[serde(default = "bool_true")]
    pub slash_commands: bool,
    /// Presence text, e.g. "the Wheel of the Year".
    pub activity_name: Option<String>,
    /// playing | listening | watching | competing | custom
    pub activity_type: Option<String>,
    /// online | idle | dnd | invisible
    #[serde(default = "default_status")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_digest_interval")]
    pub digest_interval_secs: u64,
    #[serde(default = "default_alert_interval")]
    pub alert_interval_secs: u64,
    /// Upper bound on deliveries in flight within one tick.
    #[serde(default = "default_concurrency")]
    pub max_concurrent_deliveries: usize,
    /// Days before an event at which an alert fires (0 = day of).
    #[serde(default = "default_lead_days")]
    pub alert_lead_days: Vec<u32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            digest_interval_secs: default_digest_interval(),
            alert_interval_secs: default_alert_interval(),
            max_concurrent_deliveries: default_concurrency(),
            alert_lead_days: default_lead_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Total send attempts for a transient failure (1 = no retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Per-attempt timeout; an attempt that hangs counts as transient.
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingConfig {
    /// A wizard with no answer for this long is treated as cancelled.
    #[serde(default = "default_onboarding_timeout")]
    pub timeout_secs: u64,
    /// Options offered at the tag step.
    #[serde(default = "default_tags")]
    pub tags: Vec<String>,
}

impl Default for OnboardingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_onboarding_timeout(),
            tags: default_tags(),
        }
    }
}

/// One `[[regions]]` entry. Validated into a `RegionProfile` by
/// [`RegionCatalog::from_config`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    pub key: String,
    pub name: String,
    #[serde(default = "default_region_emoji")]
    pub emoji: String,
    /// IANA name, e.g. `Europe/London`.
    pub timezone: String,
    pub hemisphere: Hemisphere,
    #[serde(default = "default_region_color")]
    pub color: u32,
}

fn bool_true() -> bool {
    true
}
fn default_status() -> String {
    "online".to_string()
}

fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.moonwheel/moonwheel.db", home)
}
fn default_digest_interval() -> u64 {
    DIGEST_INTERVAL_SECS
}
fn default_alert_interval() -> u64 {
    ALERT_INTERVAL_SECS
}
fn default_concurrency() -> usize {
    4
}
fn default_lead_days() -> Vec<u32> {
    vec![7, 1, 0]
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_send_timeout_secs() -> u64 {
    10
}
fn default_onboarding_timeout() -> u64 {
    600
}
fn default_region_emoji() -> String {
    "\u{1f30d}".to_string()
}
fn default_region_color() -> u32 {
    0x9b59b6
}

/// Twelve zodiac signs: the tag set the community started with.
pub fn default_tags() -> Vec<String> {
    [
        "Aries",
        "Taurus",
        "Gemini",
        "Cancer",
        "Leo",
        "Virgo",
        "Libra",
        "Scorpio",
        "Sagittarius",
        "Capricorn",
        "Aquarius",
        "Pisces",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl MoonwheelConfig {
    /// Load config from a TOML file with MOONWHEEL_* env var overrides.
    ///
    /// Nested keys use a double underscore:
    /// `MOONWHEEL_DISCORD__BOT_TOKEN`, `MOONWHEEL_DATABASE__PATH`.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: MoonwheelConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("MOONWHEEL_").split("__"))
            .extract()
            .map_err(|e| MoonwheelError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the scheduler misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.discord.bot_token.trim().is_empty() {
            return Err(MoonwheelError::Config("discord.bot_token is empty".into()));
        }
        if self.scheduler.digest_interval_secs == 0 || self.scheduler.alert_interval_secs == 0 {
            return Err(MoonwheelError::Config(
                "scheduler intervals must be greater than zero".into(),
            ));
        }
        if self.scheduler.max_concurrent_deliveries == 0 {
            return Err(MoonwheelError::Config(
                "scheduler.max_concurrent_deliveries must be at least 1".into(),
            ));
        }
        if let Some(lead) = self.scheduler.alert_lead_days.iter().find(|d| **d > 366) {
            return Err(MoonwheelError::Config(format!(
                "scheduler.alert_lead_days contains {} (max 366)",
                lead
            )));
        }
        if self.dispatch.max_attempts == 0 {
            return Err(MoonwheelError::Config(
                "dispatch.max_attempts must be at least 1".into(),
            ));
        }
        if self.onboarding.tags.is_empty() {
            return Err(MoonwheelError::Config("onboarding.tags is empty".into()));
        }
        if self.onboarding.tags.iter().any(|t| t.trim().is_empty()) {
            return Err(MoonwheelError::Config(
                "onboarding.tags contains a blank entry".into(),
            ));
        }
        self.region_catalog().map(|_| ())
    }

    /// The configured region catalog, or the built-in one when none is set.
    pub fn region_catalog(&self) -> Result<RegionCatalog> {
        if self.regions.is_empty() {
            Ok(RegionCatalog::builtin())
        } else {
            RegionCatalog::from_config(&self.regions)
        }
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.moonwheel/moonwheel.toml", home)
}
