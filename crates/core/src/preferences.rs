//! The single global preferences record.
//!
//! Created with defaults the first time it is read; mutated only through the
//! `configure_updates` tool (or direct edits in the driver).  Never deleted.

use serde::{Deserialize, Serialize};

/// How often the coach is allowed to nudge inside a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeFrequency {
    Gentle,
    Moderate,
    Persistent,
}

impl NudgeFrequency {
    /// Minimum days between nudges for one resolution at this frequency.
    pub fn threshold_days(self) -> i64 {
        match self {
            Self::Gentle => 7,
            Self::Moderate => 3,
            Self::Persistent => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gentle => "gentle",
            Self::Moderate => "moderate",
            Self::Persistent => "persistent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InConversationPrefs {
    pub enabled: bool,
    pub frequency: NudgeFrequency,
}

impl Default for InConversationPrefs {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: NudgeFrequency::Gentle,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuietHours {
    pub enabled: bool,
    /// Local wall-clock bounds, "HH:MM".
    pub start: String,
    pub end: String,
    pub timezone: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: true,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SmsPrefs {
    pub enabled: bool,
    pub phone_number: Option<String>,
    pub verified: bool,
    pub quiet_hours: QuietHours,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultCadence {
    pub check_in_days: Vec<String>,
    pub preferred_time_utc: String,
    pub max_nudges_per_day: u32,
}

impl Default for DefaultCadence {
    fn default() -> Self {
        Self {
            check_in_days: vec!["monday".to_string(), "thursday".to_string()],
            preferred_time_utc: "09:00".to_string(),
            max_nudges_per_day: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    /// Global master switch for all proactive check-ins.
    pub updates_enabled: bool,
    pub in_conversation: InConversationPrefs,
    pub sms: SmsPrefs,
    pub default_cadence: DefaultCadence,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            updates_enabled: true,
            in_conversation: InConversationPrefs::default(),
            sms: SmsPrefs::default(),
            default_cadence: DefaultCadence::default(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
