//! Resolutions (goals) and the append-only update log attached to them.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Hard cap on concurrently active resolutions, enforced at creation time.
/// There is no reopen operation, so the cap never needs re-checking on edit.
pub const MAX_ACTIVE_RESOLUTIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStatus {
    Active,
    Completed,
}

/// What kind of event an update records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Progress,
    Setback,
    Milestone,
    Note,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateSentiment {
    Positive,
    Neutral,
    Struggling,
}

/// Where an update originated.  Nudge-triggered updates feed the response-rate
/// statistic on the parent resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateTrigger {
    User,
    Nudge,
    Sms,
}

/// A single logged event against a resolution.  Never mutated or deleted once
/// appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionUpdate {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<UpdateSentiment>,
    /// Self-reported progress change in percentage points, clamped to
    /// [-100, 100] at the tool boundary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_delta: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub triggered_by: UpdateTrigger,
}

/// Per-resolution nudge configuration and delivery statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateSettings {
    pub enabled: bool,
    pub last_nudge_at: Option<DateTime<Utc>>,
    pub nudge_count: u32,
    /// Fraction of delivered nudges that produced a follow-up update.
    /// Recomputed from the update log, not maintained as a running average.
    pub response_rate: f32,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            last_nudge_at: None,
            nudge_count: 0,
            response_rate: 0.0,
        }
    }
}

/// A user goal with measurable success criteria.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub id: Uuid,
    pub title: String,
    pub measurable_criteria: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub status: ResolutionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updates: Vec<ResolutionUpdate>,
    #[serde(default)]
    pub update_settings: UpdateSettings,
}

impl Resolution {
    /// Build a fresh active resolution with default nudge settings.
    pub fn new(
        title: impl Into<String>,
        measurable_criteria: impl Into<String>,
        context: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            measurable_criteria: measurable_criteria.into(),
            context,
            status: ResolutionStatus::Active,
            created_at: now,
            updated_at: now,
            completed_at: None,
            updates: Vec::new(),
            update_settings: UpdateSettings::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ResolutionStatus::Active
    }

    /// Number of updates logged within the trailing `days`-day window.
    pub fn updates_within_days(&self, now: DateTime<Utc>, days: i64) -> usize {
        let cutoff = now - Duration::days(days);
        self.updates.iter().filter(|u| u.created_at >= cutoff).count()
    }

    /// Count of progress + milestone updates, used for milestone detection.
    pub fn progress_update_count(&self) -> usize {
        self.updates
            .iter()
            .filter(|u| matches!(u.kind, UpdateKind::Progress | UpdateKind::Milestone))
            .count()
    }

    /// Recompute `update_settings.response_rate` from the update log: the
    /// fraction of delivered nudges that were followed by a nudge-triggered
    /// update, clamped to [0, 1].  With no nudges delivered the rate is 0.
    pub fn recompute_response_rate(&mut self) {
        let delivered = self.update_settings.nudge_count;
        if delivered == 0 {
            self.update_settings.response_rate = 0.0;
            return;
        }
        let responses = self
            .updates
            .iter()
            .filter(|u| u.triggered_by == UpdateTrigger::Nudge)
            .count() as f32;
        self.update_settings.response_rate = (responses / delivered as f32).clamp(0.0, 1.0);
    }
}

/// The in-memory collection of resolutions a request operates on.
///
/// Backed by a `BTreeMap` so iteration order is the lexicographic id order —
/// this is what makes nudge-candidate tie-breaks deterministic.  Each request
/// owns its set outright: the repository loads one, tools mutate it, and the
/// repository writes it back as a single versioned save.
#[derive(Debug, Clone, Default)]
pub struct ResolutionSet {
    records: BTreeMap<Uuid, Resolution>,
}

impl ResolutionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resolution: Resolution) {
        self.records.insert(resolution.id, resolution);
    }

    pub fn get(&self, id: &Uuid) -> Option<&Resolution> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &Uuid) -> Option<&mut Resolution> {
        self.records.get_mut(id)
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<Resolution> {
        self.records.remove(id)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.records.contains_key(id)
    }

    /// All resolutions in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Resolution> {
        self.records.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &Uuid> {
        self.records.keys()
    }

    /// Active resolutions in id order.
    pub fn active(&self) -> impl Iterator<Item = &Resolution> {
        self.records.values().filter(|r| r.is_active())
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<Resolution> for ResolutionSet {
    fn from_iter<I: IntoIterator<Item = Resolution>>(iter: I) -> Self {
        let mut set = Self::new();
        for r in iter {
            set.insert(r);
        }
        set
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
