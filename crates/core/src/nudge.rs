//! Audit records for delivered nudges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::resolution::UpdateSentiment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeChannel {
    InConversation,
    Sms,
}

/// The flavor of check-in the policy engine picked for a nudge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NudgeType {
    CheckIn,
    GentleNudge,
    Encouragement,
    Streak,
    Milestone,
}

impl NudgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckIn => "check_in",
            Self::GentleNudge => "gentle_nudge",
            Self::Encouragement => "encouragement",
            Self::Streak => "streak",
            Self::Milestone => "milestone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NudgeStatus {
    Delivered,
    Responded,
}

/// One delivered proactive check-in.  Written only after the orchestrator
/// confirms the nudge text actually went out; updated if the user responds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NudgeRecord {
    pub id: Uuid,
    pub resolution_id: Uuid,
    pub channel: NudgeChannel,
    #[serde(rename = "type")]
    pub kind: NudgeType,
    pub scheduled_at: DateTime<Utc>,
    pub delivered_at: DateTime<Utc>,
    pub status: NudgeStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_sentiment: Option<UpdateSentiment>,
}

impl NudgeRecord {
    /// Record a user response against a delivered nudge.
    pub fn mark_responded(
        &mut self,
        content: impl Into<String>,
        sentiment: Option<UpdateSentiment>,
        now: DateTime<Utc>,
    ) {
        self.status = NudgeStatus::Responded;
        self.response_at = Some(now);
        self.response_content = Some(content.into());
        self.response_sentiment = sentiment;
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn delivered(now: DateTime<Utc>) -> NudgeRecord {
        NudgeRecord {
            id: Uuid::new_v4(),
            resolution_id: Uuid::new_v4(),
            channel: NudgeChannel::InConversation,
            kind: NudgeType::CheckIn,
            scheduled_at: now,
            delivered_at: now,
            status: NudgeStatus::Delivered,
            message: "How is Run 5k going?".into(),
            response_at: None,
            response_content: None,
            response_sentiment: None,
        }
    }

    #[test]
    fn nudge_type_serializes_snake_case() {
        let json = serde_json::to_value(NudgeType::GentleNudge).unwrap();
        assert_eq!(json, "gentle_nudge");
        assert_eq!(NudgeType::CheckIn.as_str(), "check_in");
    }

    #[test]
    fn mark_responded_transitions_status() {
        let now = Utc::now();
        let mut record = delivered(now);
        record.mark_responded("went for a run!", Some(UpdateSentiment::Positive), now);
        assert_eq!(record.status, NudgeStatus::Responded);
        assert_eq!(record.response_at, Some(now));
        assert_eq!(record.response_content.as_deref(), Some("went for a run!"));
    }

    #[test]
    fn unanswered_fields_omitted_from_json() {
        let json = serde_json::to_value(delivered(Utc::now())).unwrap();
        assert_eq!(json["channel"], "in_conversation");
        assert!(json.get("responseAt").is_none());
        assert!(json.get("responseContent").is_none());
    }
}
