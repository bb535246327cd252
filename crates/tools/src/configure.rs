//! The `configure_updates` tool: enable/disable/configure/status, globally or
//! per resolution.

use serde::Deserialize;
use uuid::Uuid;

use stride_core::{NudgeFrequency, ResolutionSet, UserPreferences};

use crate::ToolResult;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigureInput {
    pub action: Option<String>,
    pub scope: Option<String>,
    pub resolution_id: Option<String>,
    pub channel: Option<String>,
    pub frequency: Option<String>,
    pub phone_number: Option<String>,
}

pub fn configure_updates(
    input: &ConfigureInput,
    set: &mut ResolutionSet,
    prefs: &mut UserPreferences,
) -> ToolResult {
    let action = match input.action.as_deref().map(str::trim) {
        Some(a @ ("enable" | "disable" | "configure" | "status")) => a,
        Some(other) => {
            return ToolResult::fail(format!(
                "invalid action \"{other}\" (expected enable, disable, configure, or status)"
            ));
        }
        None => return ToolResult::fail("action is required"),
    };

    match input.scope.as_deref().map(str::trim).unwrap_or("global") {
        "resolution" => configure_resolution(action, input, set),
        "global" => configure_global(action, input, prefs),
        other => ToolResult::fail(format!(
            "invalid scope \"{other}\" (expected global or resolution)"
        )),
    }
}

/// Resolution-scoped actions toggle or report `update_settings` on one record.
fn configure_resolution(
    action: &str,
    input: &ConfigureInput,
    set: &mut ResolutionSet,
) -> ToolResult {
    let Some(raw) = input.resolution_id.as_deref().map(str::trim).filter(|s| !s.is_empty())
    else {
        return ToolResult::fail("resolution_id is required when scope is \"resolution\"");
    };
    let Ok(id) = Uuid::parse_str(raw) else {
        return ToolResult::fail(format!("resolution {raw} not found"));
    };
    let Some(resolution) = set.get_mut(&id) else {
        return ToolResult::fail(format!("resolution {id} not found"));
    };

    match action {
        "enable" => {
            resolution.update_settings.enabled = true;
            let snapshot = resolution.clone();
            ToolResult::ok(format!("Check-ins enabled for \"{}\"", snapshot.title))
                .with_resolution(snapshot)
        }
        "disable" => {
            resolution.update_settings.enabled = false;
            let snapshot = resolution.clone();
            ToolResult::ok(format!("Check-ins disabled for \"{}\"", snapshot.title))
                .with_resolution(snapshot)
        }
        "status" => {
            let snapshot = resolution.clone();
            let state = if snapshot.update_settings.enabled {
                "enabled"
            } else {
                "disabled"
            };
            ToolResult::ok(format!(
                "Check-ins are {state} for \"{}\" ({} delivered so far)",
                snapshot.title, snapshot.update_settings.nudge_count
            ))
            .with_resolution(snapshot)
        }
        // configure has no per-resolution knobs; frequency is a global setting.
        _ => ToolResult::fail("configure applies to the global scope only"),
    }
}

fn configure_global(
    action: &str,
    input: &ConfigureInput,
    prefs: &mut UserPreferences,
) -> ToolResult {
    let channel = input.channel.as_deref().map(str::trim);
    match action {
        "status" => {
            let summary = format!(
                "Check-ins are {}; in-conversation {} ({}); SMS {}",
                on_off(prefs.updates_enabled),
                on_off(prefs.in_conversation.enabled),
                prefs.in_conversation.frequency.as_str(),
                on_off(prefs.sms.enabled),
            );
            ToolResult::ok(summary).with_preferences(prefs.clone())
        }
        "enable" => match channel {
            None | Some("") => {
                prefs.updates_enabled = true;
                ToolResult::ok("Proactive check-ins enabled").with_preferences(prefs.clone())
            }
            Some("in_conversation") => {
                prefs.in_conversation.enabled = true;
                ToolResult::ok("In-conversation check-ins enabled")
                    .with_preferences(prefs.clone())
            }
            Some("sms") => {
                if prefs
                    .sms
                    .phone_number
                    .as_deref()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .is_none()
                {
                    return ToolResult::fail(
                        "cannot enable SMS check-ins: no phone number is configured. \
                         Configure one first with action=configure and phone_number.",
                    );
                }
                prefs.sms.enabled = true;
                ToolResult::ok("SMS check-ins enabled").with_preferences(prefs.clone())
            }
            Some(other) => ToolResult::fail(format!("invalid channel \"{other}\"")),
        },
        "disable" => match channel {
            None | Some("") => {
                prefs.updates_enabled = false;
                ToolResult::ok("All proactive check-ins disabled")
                    .with_preferences(prefs.clone())
            }
            Some("in_conversation") => {
                prefs.in_conversation.enabled = false;
                ToolResult::ok("In-conversation check-ins disabled")
                    .with_preferences(prefs.clone())
            }
            Some("sms") => {
                prefs.sms.enabled = false;
                ToolResult::ok("SMS check-ins disabled").with_preferences(prefs.clone())
            }
            Some(other) => ToolResult::fail(format!("invalid channel \"{other}\"")),
        },
        _ => {
            // configure
            let mut changed: Vec<String> = Vec::new();
            if let Some(frequency) = input.frequency.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
                let parsed = match frequency {
                    "gentle" => NudgeFrequency::Gentle,
                    "moderate" => NudgeFrequency::Moderate,
                    "persistent" => NudgeFrequency::Persistent,
                    other => {
                        return ToolResult::fail(format!(
                            "invalid frequency \"{other}\" (expected gentle, moderate, or persistent)"
                        ));
                    }
                };
                prefs.in_conversation.frequency = parsed;
                changed.push(format!("frequency set to {frequency}"));
            }
            if let Some(phone) = input.phone_number.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
                prefs.sms.phone_number = Some(phone.to_string());
                prefs.sms.verified = false;
                changed.push("phone number updated (pending verification)".to_string());
            }
            if changed.is_empty() {
                return ToolResult::fail("nothing to configure: provide frequency or phone_number");
            }
            ToolResult::ok(changed.join("; ")).with_preferences(prefs.clone())
        }
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

// ── Tests ────────────────────────────────────────────────────────────────────
