//! Shared data model for the Stride goal coach.
//!
//! Everything here is plain data: resolutions (user goals), the updates logged
//! against them, the single global preferences record, nudge audit records, and
//! per-session conversation transcripts.  All mutation with actual business
//! rules lives in `stride-tools` and `stride-nudge`; this crate only owns the
//! types, their serialized (camelCase JSON) form, and a few derived-stat
//! helpers that both of those crates need.

pub mod conversation;
pub mod nudge;
pub mod preferences;
pub mod resolution;

pub use conversation::{ChatRole, Conversation, ConversationMessage, conversation_ttl};
pub use nudge::{NudgeChannel, NudgeRecord, NudgeStatus, NudgeType};
pub use preferences::{
    DefaultCadence, InConversationPrefs, NudgeFrequency, QuietHours, SmsPrefs, UserPreferences,
};
pub use resolution::{
    MAX_ACTIVE_RESOLUTIONS, Resolution, ResolutionSet, ResolutionStatus, ResolutionUpdate,
    UpdateKind, UpdateSentiment, UpdateSettings, UpdateTrigger,
};
