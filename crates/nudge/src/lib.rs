//! The nudge policy engine.
//!
//! A pure decision function: given the user's preferences, the current
//! resolution set, and how many nudges this session has already seen, decide
//! whether to proactively check in, about which resolution, and in what tone.
//! The engine never mutates a resolution — delivery bookkeeping
//! ([`apply_nudge_delivery`], [`create_nudge_record`]) runs separately, only
//! after the orchestrator confirms the nudge text actually reached the user.
//! That split keeps a failed LLM call from falsely counting as a delivered
//! nudge.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use stride_core::{
    NudgeChannel, NudgeRecord, NudgeStatus, NudgeType, Resolution, ResolutionSet, UpdateKind,
    UpdateSentiment, UserPreferences,
};

/// Hard cap on nudges within one logical session.
pub const SESSION_NUDGE_CAP: u32 = 1;

/// Window and count for streak detection.
const STREAK_WINDOW_DAYS: i64 = 7;
const STREAK_MIN_UPDATES: usize = 3;

/// A positive decision: nudge this resolution, this way.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NudgeDecision {
    pub resolution_id: Uuid,
    pub resolution_title: String,
    #[serde(rename = "type")]
    pub kind: NudgeType,
    pub reason: String,
    /// `None` when the resolution has never been nudged.
    pub days_since_last_nudge: Option<i64>,
}

/// Decide whether to nudge.  Returns `None` for "stay silent".
///
/// Candidate staleness is measured from `update_settings.last_nudge_at`; a
/// never-nudged resolution is infinitely stale.  The most-stale qualifying
/// candidate wins; equal staleness breaks toward the lowest resolution id
/// (the set iterates in id order and only a strictly-staler candidate
/// displaces the current pick).
pub fn should_nudge(
    prefs: &UserPreferences,
    set: &ResolutionSet,
    session_nudge_count: u32,
    now: DateTime<Utc>,
) -> Option<NudgeDecision> {
    if !prefs.updates_enabled || !prefs.in_conversation.enabled {
        debug!("nudge check: proactive check-ins disabled");
        return None;
    }
    if session_nudge_count >= SESSION_NUDGE_CAP {
        debug!(session_nudge_count, "nudge check: session cap reached");
        return None;
    }

    let threshold = Duration::days(prefs.in_conversation.frequency.threshold_days());

    let mut best: Option<(&Resolution, Option<Duration>)> = None;
    for resolution in set.active().filter(|r| r.update_settings.enabled) {
        let elapsed = resolution
            .update_settings
            .last_nudge_at
            .map(|last| now - last);
        let qualifies = elapsed.map(|e| e >= threshold).unwrap_or(true);
        if !qualifies {
            continue;
        }
        let staler = match (&best, elapsed) {
            (None, _) => true,
            // Never-nudged beats any finite staleness but not another
            // never-nudged candidate (first in id order keeps the slot).
            (Some((_, Some(_))), None) => true,
            (Some((_, None)), _) => false,
            (Some((_, Some(current))), Some(candidate)) => candidate > *current,
        };
        if staler {
            best = Some((resolution, elapsed));
        }
    }

    let (resolution, elapsed) = best?;
    let days_since_last_nudge = elapsed.map(|e| e.num_days());
    let (kind, reason) = classify(resolution, elapsed, now);
    debug!(
        resolution = %resolution.id,
        kind = kind.as_str(),
        ?days_since_last_nudge,
        "nudge check: will nudge"
    );
    Some(NudgeDecision {
        resolution_id: resolution.id,
        resolution_title: resolution.title.clone(),
        kind,
        reason,
        days_since_last_nudge,
    })
}

/// Pick the nudge flavor, first matching rule wins.
fn classify(
    resolution: &Resolution,
    elapsed: Option<Duration>,
    now: DateTime<Utc>,
) -> (NudgeType, String) {
    let recent = resolution.updates_within_days(now, STREAK_WINDOW_DAYS);
    if recent >= STREAK_MIN_UPDATES {
        return (
            NudgeType::Streak,
            format!("{recent} updates in the last {STREAK_WINDOW_DAYS} days"),
        );
    }

    if let Some(last) = resolution.updates.last() {
        if last.kind == UpdateKind::Setback || last.sentiment == Some(UpdateSentiment::Struggling)
        {
            return (
                NudgeType::Encouragement,
                "most recent update was a setback or felt like a struggle".to_string(),
            );
        }
    }

    // One more progress/milestone update reaches a multiple of five.
    let progress = resolution.progress_update_count();
    if progress % 5 == 4 {
        return (
            NudgeType::Milestone,
            format!("one update away from {} logged wins", progress + 1),
        );
    }

    let long_quiet = elapsed.map(|e| e > Duration::days(7)).unwrap_or(true);
    if long_quiet {
        let reason = match elapsed {
            None => "never checked in on this one".to_string(),
            Some(e) => format!("no check-in for {} days", e.num_days()),
        };
        return (NudgeType::GentleNudge, reason);
    }

    (NudgeType::CheckIn, "due for a routine check-in".to_string())
}

/// Render the system-prompt prefix for a positive decision.  One fixed
/// template per nudge type; each names the resolution and sets the tone.
pub fn nudge_context(decision: &NudgeDecision) -> String {
    let title = &decision.resolution_title;
    match decision.kind {
        NudgeType::Streak => format!(
            "Before anything else, celebrate the user's momentum on \"{title}\" \
             ({reason}). Be genuinely enthusiastic and specific — something like \
             \"You've been on fire with {title} this week — want to keep the streak going?\"",
            reason = decision.reason
        ),
        NudgeType::Encouragement => format!(
            "Open by gently checking in about \"{title}\" — the last update was rough. \
             Be empathetic, never guilt-tripping; something like \
             \"Rough patches happen. How are you feeling about {title} today?\""
        ),
        NudgeType::Milestone => format!(
            "Open by pointing out that \"{title}\" is one update away from a milestone \
             ({reason}). Be congratulatory and encourage logging the next win — something like \
             \"One more and you hit a nice round number on {title}!\"",
            reason = decision.reason
        ),
        NudgeType::GentleNudge => format!(
            "Work in a low-pressure mention of \"{title}\" ({reason}). Keep it light and \
             optional — something like \"No pressure at all, but how's {title} been going?\"",
            reason = decision.reason
        ),
        NudgeType::CheckIn => format!(
            "Start with a warm, casual check-in about \"{title}\". Conversational, not \
             clinical — something like \"Hey, how's {title} coming along?\""
        ),
    }
}

/// Build the audit record for a nudge whose text was confirmed delivered.
pub fn create_nudge_record(
    decision: &NudgeDecision,
    message: impl Into<String>,
    now: DateTime<Utc>,
) -> NudgeRecord {
    NudgeRecord {
        id: Uuid::new_v4(),
        resolution_id: decision.resolution_id,
        channel: NudgeChannel::InConversation,
        kind: decision.kind,
        scheduled_at: now,
        delivered_at: now,
        status: NudgeStatus::Delivered,
        message: message.into(),
        response_at: None,
        response_content: None,
        response_sentiment: None,
    }
}

/// Update the resolution's nudge statistics after confirmed delivery.
pub fn apply_nudge_delivery(resolution: &mut Resolution, now: DateTime<Utc>) {
    resolution.update_settings.last_nudge_at = Some(now);
    resolution.update_settings.nudge_count += 1;
    resolution.recompute_response_rate();
}

// ── Tests ────────────────────────────────────────────────────────────────────
