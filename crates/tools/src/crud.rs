//! Record-level tool operations: create, edit, list, complete, delete, and
//! update logging.
//!
//! Every operation is a synchronous pure function over the request's owned
//! [`ResolutionSet`].  Failures are never errors in the Rust sense — they come
//! back as `ToolResult { success: false, error }` so the orchestrator can hand
//! them to the model to explain conversationally.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use stride_core::{
    MAX_ACTIVE_RESOLUTIONS, Resolution, ResolutionSet, ResolutionStatus, ResolutionUpdate,
    UpdateKind, UpdateSentiment, UpdateTrigger,
};

use crate::ToolResult;

/// Trim an optional field, treating whitespace-only values as absent.
fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parse a required resolution id.  Missing and malformed ids produce
/// distinct, user-explainable failures.
fn parse_id(raw: &Option<String>) -> Result<Uuid, ToolResult> {
    let raw = clean(raw).ok_or_else(|| ToolResult::fail("resolution_id is required"))?;
    Uuid::parse_str(&raw).map_err(|_| ToolResult::fail(format!("resolution {raw} not found")))
}

// ── create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateInput {
    pub title: Option<String>,
    pub measurable_criteria: Option<String>,
    pub context: Option<String>,
}

pub fn create(input: &CreateInput, set: &mut ResolutionSet, now: DateTime<Utc>) -> ToolResult {
    if set.active_count() >= MAX_ACTIVE_RESOLUTIONS {
        return ToolResult::fail(format!(
            "Active resolution limit reached ({MAX_ACTIVE_RESOLUTIONS}). \
             Complete or delete one before adding another."
        ));
    }
    let Some(title) = clean(&input.title) else {
        return ToolResult::fail("title is required");
    };
    let Some(criteria) = clean(&input.measurable_criteria) else {
        return ToolResult::fail("measurable_criteria is required");
    };

    let resolution = Resolution::new(title, criteria, clean(&input.context), now);
    let snapshot = resolution.clone();
    set.insert(resolution);

    ToolResult::ok(format!("Created resolution \"{}\"", snapshot.title)).with_resolution(snapshot)
}

// ── edit ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EditInput {
    pub resolution_id: Option<String>,
    pub title: Option<String>,
    pub measurable_criteria: Option<String>,
    pub context: Option<String>,
}

pub fn edit(input: &EditInput, set: &mut ResolutionSet, now: DateTime<Utc>) -> ToolResult {
    let id = match parse_id(&input.resolution_id) {
        Ok(id) => id,
        Err(fail) => return fail,
    };

    let title = clean(&input.title);
    let criteria = clean(&input.measurable_criteria);
    let context = clean(&input.context);
    if title.is_none() && criteria.is_none() && context.is_none() {
        return ToolResult::fail("no changes provided");
    }

    let Some(resolution) = set.get_mut(&id) else {
        return ToolResult::fail(format!("resolution {id} not found"));
    };

    let mut changed: Vec<&str> = Vec::new();
    if let Some(title) = title {
        resolution.title = title;
        changed.push("title");
    }
    if let Some(criteria) = criteria {
        resolution.measurable_criteria = criteria;
        changed.push("measurable criteria");
    }
    if let Some(context) = context {
        resolution.context = Some(context);
        changed.push("context");
    }
    resolution.updated_at = now;

    let snapshot = resolution.clone();
    ToolResult::ok(format!(
        "Updated {} of \"{}\"",
        changed.join(", "),
        snapshot.title
    ))
    .with_resolution(snapshot)
}

// ── list ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ListInput {
    pub status: Option<String>,
}

/// List never fails: an unrecognized or missing filter falls back to `all`.
pub fn list(input: &ListInput, set: &ResolutionSet) -> ToolResult {
    let filter = input.status.as_deref().map(str::trim).unwrap_or("all");
    let matching: Vec<Resolution> = set
        .iter()
        .filter(|r| match filter {
            "active" => r.status == ResolutionStatus::Active,
            "completed" => r.status == ResolutionStatus::Completed,
            _ => true,
        })
        .cloned()
        .collect();

    let label = match filter {
        "active" => "active resolution(s)",
        "completed" => "completed resolution(s)",
        _ => "resolution(s)",
    };
    let count = matching.len();
    ToolResult::ok(format!("Found {count} {label}")).with_resolutions(matching)
}

// ── complete ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompleteInput {
    pub resolution_id: Option<String>,
}

/// Idempotent on status; `completed_at` is re-stamped on every call.
pub fn complete(input: &CompleteInput, set: &mut ResolutionSet, now: DateTime<Utc>) -> ToolResult {
    let id = match parse_id(&input.resolution_id) {
        Ok(id) => id,
        Err(fail) => return fail,
    };
    let Some(resolution) = set.get_mut(&id) else {
        return ToolResult::fail(format!("resolution {id} not found"));
    };

    resolution.status = ResolutionStatus::Completed;
    resolution.completed_at = Some(now);
    resolution.updated_at = now;

    let snapshot = resolution.clone();
    ToolResult::ok(format!("Marked \"{}\" complete. Well done!", snapshot.title))
        .with_resolution(snapshot)
}

// ── delete ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DeleteInput {
    pub resolution_id: Option<String>,
}

pub fn delete(input: &DeleteInput, set: &mut ResolutionSet) -> ToolResult {
    let id = match parse_id(&input.resolution_id) {
        Ok(id) => id,
        Err(fail) => return fail,
    };
    match set.remove(&id) {
        Some(removed) => ToolResult::ok(format!("Deleted \"{}\"", removed.title)),
        None => ToolResult::fail(format!("resolution {id} not found")),
    }
}

// ── log_update ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogUpdateInput {
    pub resolution_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub content: Option<String>,
    pub sentiment: Option<String>,
    pub progress_delta: Option<f64>,
    pub triggered_by: Option<String>,
}

pub fn log_update(
    input: &LogUpdateInput,
    set: &mut ResolutionSet,
    now: DateTime<Utc>,
) -> ToolResult {
    let id = match parse_id(&input.resolution_id) {
        Ok(id) => id,
        Err(fail) => return fail,
    };

    let kind = match input.kind.as_deref().map(str::trim) {
        Some("progress") => UpdateKind::Progress,
        Some("setback") => UpdateKind::Setback,
        Some("milestone") => UpdateKind::Milestone,
        Some("note") => UpdateKind::Note,
        Some(other) => {
            return ToolResult::fail(format!(
                "invalid update type \"{other}\" (expected progress, setback, milestone, or note)"
            ));
        }
        None => return ToolResult::fail("type is required"),
    };

    let Some(content) = clean(&input.content) else {
        return ToolResult::fail("content is required");
    };

    let sentiment = match input.sentiment.as_deref().map(str::trim) {
        None | Some("") => None,
        Some("positive") => Some(UpdateSentiment::Positive),
        Some("neutral") => Some(UpdateSentiment::Neutral),
        Some("struggling") => Some(UpdateSentiment::Struggling),
        Some(other) => {
            return ToolResult::fail(format!("invalid sentiment \"{other}\""));
        }
    };

    let progress_delta = match input.progress_delta {
        None => None,
        Some(delta) if (-100.0..=100.0).contains(&delta) => Some(delta.round() as i32),
        Some(delta) => {
            return ToolResult::fail(format!(
                "progress_delta must be between -100 and 100 (got {delta})"
            ));
        }
    };

    let triggered_by = match input.triggered_by.as_deref().map(str::trim) {
        None | Some("") | Some("user") => UpdateTrigger::User,
        Some("nudge") => UpdateTrigger::Nudge,
        Some("sms") => UpdateTrigger::Sms,
        Some(other) => {
            return ToolResult::fail(format!("invalid triggered_by \"{other}\""));
        }
    };

    let Some(resolution) = set.get_mut(&id) else {
        return ToolResult::fail(format!("resolution {id} not found"));
    };

    let update = ResolutionUpdate {
        id: Uuid::new_v4(),
        kind,
        content,
        sentiment,
        progress_delta,
        created_at: now,
        triggered_by,
    };
    resolution.updates.push(update.clone());
    resolution.updated_at = now;
    if triggered_by == UpdateTrigger::Nudge {
        resolution.recompute_response_rate();
    }

    let snapshot = resolution.clone();
    ToolResult::ok(format!("Logged a {} update for \"{}\"", kind_label(kind), snapshot.title))
        .with_update(update)
        .with_resolution(snapshot)
}

fn kind_label(kind: UpdateKind) -> &'static str {
    match kind {
        UpdateKind::Progress => "progress",
        UpdateKind::Setback => "setback",
        UpdateKind::Milestone => "milestone",
        UpdateKind::Note => "note",
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn create_input(title: &str, criteria: &str) -> CreateInput {
        CreateInput {
            title: Some(title.into()),
            measurable_criteria: Some(criteria.into()),
            context: None,
        }
    }

    fn seeded(n: usize, now: DateTime<Utc>) -> ResolutionSet {
        let mut set = ResolutionSet::new();
        for i in 0..n {
            set.insert(Resolution::new(
                format!("Goal {i}"),
                "criteria",
                None,
                now,
            ));
        }
        set
    }

    #[test]
    fn create_then_list_active_returns_the_record() {
        let now = Utc::now();
        let mut set = ResolutionSet::new();
        let result = create(
            &create_input("Run 5k", "sub-25min by Dec"),
            &mut set,
            now,
        );
        assert!(result.success);
        assert_eq!(result.resolution.as_ref().unwrap().title, "Run 5k");

        let listed = list(
            &ListInput {
                status: Some("active".into()),
            },
            &set,
        );
        assert!(listed.success);
        assert_eq!(listed.count, Some(1));
        let records = listed.resolutions.unwrap();
        assert_eq!(records[0].title, "Run 5k");
        assert_eq!(records[0].status, ResolutionStatus::Active);
    }

    #[test]
    fn create_rejects_missing_fields_without_inserting() {
        let now = Utc::now();
        let mut set = ResolutionSet::new();
        let no_title = create(
            &CreateInput {
                title: Some("   ".into()),
                measurable_criteria: Some("x".into()),
                context: None,
            },
            &mut set,
            now,
        );
        assert!(!no_title.success);
        let no_criteria = create(
            &CreateInput {
                title: Some("Read".into()),
                measurable_criteria: None,
                context: None,
            },
            &mut set,
            now,
        );
        assert!(!no_criteria.success);
        assert!(set.is_empty());
    }

    #[test]
    fn sixth_create_fails_with_limit_error() {
        let now = Utc::now();
        let mut set = ResolutionSet::new();
        for i in 0..5 {
            let result = create(
                &create_input(&format!("Goal {i}"), "criteria"),
                &mut set,
                now,
            );
            assert!(result.success, "create {i} should succeed");
        }
        let sixth = create(&create_input("One more", "criteria"), &mut set, now);
        assert!(!sixth.success);
        assert!(sixth.error.as_ref().unwrap().contains("limit"));
        assert_eq!(set.active_count(), 5);
        assert_eq!(set.len(), 5);
    }

    #[test]
    fn completed_records_do_not_count_toward_limit() {
        let now = Utc::now();
        let mut set = seeded(5, now);
        let id = *set.ids().next().unwrap();
        complete(
            &CompleteInput {
                resolution_id: Some(id.to_string()),
            },
            &mut set,
            now,
        );
        let result = create(&create_input("New goal", "criteria"), &mut set, now);
        assert!(result.success);
        assert_eq!(set.active_count(), 5);
        assert_eq!(set.len(), 6);
    }

    #[test]
    fn edit_with_no_changes_fails_and_leaves_record_untouched() {
        let now = Utc::now();
        let mut set = seeded(1, now);
        let id = *set.ids().next().unwrap();
        let before = serde_json::to_string(set.get(&id).unwrap()).unwrap();

        let result = edit(
            &EditInput {
                resolution_id: Some(id.to_string()),
                title: Some("   ".into()),
                ..Default::default()
            },
            &mut set,
            now + chrono::Duration::hours(1),
        );
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("no changes provided"));
        let after = serde_json::to_string(set.get(&id).unwrap()).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn edit_applies_fields_and_reports_them() {
        let now = Utc::now();
        let mut set = seeded(1, now);
        let id = *set.ids().next().unwrap();
        let later = now + chrono::Duration::hours(1);
        let result = edit(
            &EditInput {
                resolution_id: Some(id.to_string()),
                title: Some("  Run 10k  ".into()),
                context: Some("building on the 5k".into()),
                ..Default::default()
            },
            &mut set,
            later,
        );
        assert!(result.success);
        let message = result.message.unwrap();
        assert!(message.contains("title"));
        assert!(message.contains("context"));
        let record = set.get(&id).unwrap();
        assert_eq!(record.title, "Run 10k");
        assert_eq!(record.context.as_deref(), Some("building on the 5k"));
        assert_eq!(record.updated_at, later);
    }

    #[test]
    fn edit_unknown_id_fails() {
        let now = Utc::now();
        let mut set = seeded(1, now);
        let result = edit(
            &EditInput {
                resolution_id: Some(Uuid::new_v4().to_string()),
                title: Some("x".into()),
                ..Default::default()
            },
            &mut set,
            now,
        );
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[test]
    fn complete_is_idempotent_on_status_but_restamps_timestamp() {
        let now = Utc::now();
        let mut set = seeded(1, now);
        let id = *set.ids().next().unwrap();
        let input = CompleteInput {
            resolution_id: Some(id.to_string()),
        };

        let first = complete(&input, &mut set, now);
        assert!(first.success);
        assert_eq!(set.get(&id).unwrap().completed_at, Some(now));

        let later = now + chrono::Duration::days(1);
        let second = complete(&input, &mut set, later);
        assert!(second.success);
        let record = set.get(&id).unwrap();
        assert_eq!(record.status, ResolutionStatus::Completed);
        assert_eq!(record.completed_at, Some(later));
    }

    #[test]
    fn delete_removes_then_errors_on_second_call() {
        let now = Utc::now();
        let mut set = seeded(2, now);
        let id = *set.ids().next().unwrap();
        let input = DeleteInput {
            resolution_id: Some(id.to_string()),
        };

        let first = delete(&input, &mut set);
        assert!(first.success);
        let listed = list(
            &ListInput {
                status: Some("all".into()),
            },
            &set,
        );
        assert!(!listed
            .resolutions
            .unwrap()
            .iter()
            .any(|r| r.id == id));

        let second = delete(&input, &mut set);
        assert!(!second.success);
        assert!(second.error.unwrap().contains("not found"));
    }

    #[test]
    fn log_update_rejects_out_of_range_delta_without_appending() {
        let now = Utc::now();
        let mut set = seeded(1, now);
        let id = *set.ids().next().unwrap();
        for delta in [101.0, -250.0] {
            let result = log_update(
                &LogUpdateInput {
                    resolution_id: Some(id.to_string()),
                    kind: Some("progress".into()),
                    content: Some("big jump".into()),
                    progress_delta: Some(delta),
                    ..Default::default()
                },
                &mut set,
                now,
            );
            assert!(!result.success);
        }
        assert!(set.get(&id).unwrap().updates.is_empty());
    }

    #[test]
    fn log_update_appends_and_touches_updated_at() {
        let now = Utc::now();
        let mut set = seeded(1, now);
        let id = *set.ids().next().unwrap();
        let later = now + chrono::Duration::hours(2);
        let result = log_update(
            &LogUpdateInput {
                resolution_id: Some(id.to_string()),
                kind: Some("milestone".into()),
                content: Some("first 5k without stopping".into()),
                sentiment: Some("positive".into()),
                progress_delta: Some(25.0),
                ..Default::default()
            },
            &mut set,
            later,
        );
        assert!(result.success);
        assert!(result.update.is_some());
        let record = set.get(&id).unwrap();
        assert_eq!(record.updates.len(), 1);
        assert_eq!(record.updates[0].kind, UpdateKind::Milestone);
        assert_eq!(record.updates[0].progress_delta, Some(25));
        assert_eq!(record.updated_at, later);
    }

    #[test]
    fn nudge_triggered_update_refreshes_response_rate() {
        let now = Utc::now();
        let mut set = seeded(1, now);
        let id = *set.ids().next().unwrap();
        set.get_mut(&id).unwrap().update_settings.nudge_count = 2;

        let result = log_update(
            &LogUpdateInput {
                resolution_id: Some(id.to_string()),
                kind: Some("progress".into()),
                content: Some("replying to your check-in: did it!".into()),
                triggered_by: Some("nudge".into()),
                ..Default::default()
            },
            &mut set,
            now,
        );
        assert!(result.success);
        let rate = set.get(&id).unwrap().update_settings.response_rate;
        assert!((rate - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn log_update_rejects_empty_content_and_bad_type() {
        let now = Utc::now();
        let mut set = seeded(1, now);
        let id = *set.ids().next().unwrap();
        let empty = log_update(
            &LogUpdateInput {
                resolution_id: Some(id.to_string()),
                kind: Some("note".into()),
                content: Some("  ".into()),
                ..Default::default()
            },
            &mut set,
            now,
        );
        assert!(!empty.success);

        let bad_kind = log_update(
            &LogUpdateInput {
                resolution_id: Some(id.to_string()),
                kind: Some("victory".into()),
                content: Some("won".into()),
                ..Default::default()
            },
            &mut set,
            now,
        );
        assert!(!bad_kind.success);
        assert!(set.get(&id).unwrap().updates.is_empty());
    }
}
