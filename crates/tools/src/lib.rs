//! The fixed tool registry the model may call into mid-conversation.
//!
//! Dispatch is a closed enum — [`ToolInvocation`] has one variant per tool, so
//! an unknown tool name can only surface as a [`ToolParseError`] at the parse
//! boundary, never as a missing table entry at execution time.  Execution is
//! synchronous and infallible: every failure path is a
//! `ToolResult { success: false, error }` fed back to the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stride_core::{Resolution, ResolutionSet, ResolutionUpdate, UserPreferences};

pub mod configure;
pub mod crud;
pub mod prioritize;
pub mod schema;

pub use configure::ConfigureInput;
pub use crud::{CompleteInput, CreateInput, DeleteInput, EditInput, ListInput, LogUpdateInput};
pub use prioritize::PrioritizeInput;
pub use schema::{tool_schema_json, tool_specs, ToolParam, ToolSpec};

#[derive(Debug, thiserror::Error)]
pub enum ToolParseError {
    /// The model asked for a tool that is not in the registry.  The loop
    /// treats this as a stop signal, not a request failure.
    #[error("unknown tool \"{0}\"")]
    UnknownTool(String),
    #[error("invalid input for tool \"{name}\": {source}")]
    InvalidInput {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// The structured result every tool returns.  Serialized as-is into the
/// tool-result message the model sees.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolutions: Option<Vec<Resolution>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update: Option<ResolutionUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferences: Option<UserPreferences>,
}

impl ToolResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    pub fn with_resolutions(mut self, resolutions: Vec<Resolution>) -> Self {
        self.count = Some(resolutions.len());
        self.resolutions = Some(resolutions);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_update(mut self, update: ResolutionUpdate) -> Self {
        self.update = Some(update);
        self
    }

    pub fn with_preferences(mut self, preferences: UserPreferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// JSON form fed back to the model as the tool-result message body.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            // Serialization of plain data cannot realistically fail; keep the
            // loop alive with a minimal result if it somehow does.
            r#"{"success":false,"error":"internal serialization failure"}"#.to_string()
        })
    }
}

/// One variant per registered tool, carrying its already-validated-shape input.
#[derive(Debug, Clone)]
pub enum ToolInvocation {
    Create(CreateInput),
    Edit(EditInput),
    List(ListInput),
    Complete(CompleteInput),
    Delete(DeleteInput),
    Prioritize(PrioritizeInput),
    ConfigureUpdates(ConfigureInput),
    LogUpdate(LogUpdateInput),
}

impl ToolInvocation {
    /// Map a (name, input) pair from the model into a typed invocation.
    pub fn parse(name: &str, input: serde_json::Value) -> Result<Self, ToolParseError> {
        fn typed<T: serde::de::DeserializeOwned>(
            name: &'static str,
            input: serde_json::Value,
        ) -> Result<T, ToolParseError> {
            serde_json::from_value(input)
                .map_err(|source| ToolParseError::InvalidInput { name, source })
        }

        match name {
            schema::CREATE_RESOLUTION => {
                Ok(Self::Create(typed(schema::CREATE_RESOLUTION, input)?))
            }
            schema::EDIT_RESOLUTION => Ok(Self::Edit(typed(schema::EDIT_RESOLUTION, input)?)),
            schema::LIST_RESOLUTIONS => Ok(Self::List(typed(schema::LIST_RESOLUTIONS, input)?)),
            schema::COMPLETE_RESOLUTION => {
                Ok(Self::Complete(typed(schema::COMPLETE_RESOLUTION, input)?))
            }
            schema::DELETE_RESOLUTION => {
                Ok(Self::Delete(typed(schema::DELETE_RESOLUTION, input)?))
            }
            schema::PRIORITIZE_RESOLUTIONS => {
                Ok(Self::Prioritize(typed(schema::PRIORITIZE_RESOLUTIONS, input)?))
            }
            schema::CONFIGURE_UPDATES => {
                Ok(Self::ConfigureUpdates(typed(schema::CONFIGURE_UPDATES, input)?))
            }
            schema::LOG_UPDATE => Ok(Self::LogUpdate(typed(schema::LOG_UPDATE, input)?)),
            other => Err(ToolParseError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Create(_) => schema::CREATE_RESOLUTION,
            Self::Edit(_) => schema::EDIT_RESOLUTION,
            Self::List(_) => schema::LIST_RESOLUTIONS,
            Self::Complete(_) => schema::COMPLETE_RESOLUTION,
            Self::Delete(_) => schema::DELETE_RESOLUTION,
            Self::Prioritize(_) => schema::PRIORITIZE_RESOLUTIONS,
            Self::ConfigureUpdates(_) => schema::CONFIGURE_UPDATES,
            Self::LogUpdate(_) => schema::LOG_UPDATE,
        }
    }

    /// Run the tool against the request's owned state.
    pub fn execute(
        &self,
        set: &mut ResolutionSet,
        prefs: &mut UserPreferences,
        now: DateTime<Utc>,
    ) -> ToolResult {
        match self {
            Self::Create(input) => crud::create(input, set, now),
            Self::Edit(input) => crud::edit(input, set, now),
            Self::List(input) => crud::list(input, set),
            Self::Complete(input) => crud::complete(input, set, now),
            Self::Delete(input) => crud::delete(input, set),
            Self::Prioritize(input) => prioritize::prioritize(input, set),
            Self::ConfigureUpdates(input) => configure::configure_updates(input, set, prefs),
            Self::LogUpdate(input) => crud::log_update(input, set, now),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_known_tools() {
        let create = ToolInvocation::parse(
            "create_resolution",
            json!({"title": "Run 5k", "measurable_criteria": "sub-25min by Dec"}),
        )
        .unwrap();
        assert_eq!(create.name(), "create_resolution");
        match create {
            ToolInvocation::Create(input) => {
                assert_eq!(input.title.as_deref(), Some("Run 5k"));
            }
            other => panic!("wrong variant: {other:?}"),
        }

        let list = ToolInvocation::parse("list_resolutions", json!({})).unwrap();
        assert!(matches!(list, ToolInvocation::List(_)));
    }

    #[test]
    fn parse_rejects_unknown_tool() {
        let err = ToolInvocation::parse("drop_all_tables", json!({})).unwrap_err();
        assert!(matches!(err, ToolParseError::UnknownTool(name) if name == "drop_all_tables"));
    }

    #[test]
    fn parse_rejects_wrongly_typed_input() {
        let err = ToolInvocation::parse("create_resolution", json!({"title": 42})).unwrap_err();
        assert!(matches!(err, ToolParseError::InvalidInput { .. }));
    }

    #[test]
    fn missing_fields_parse_but_fail_at_execution() {
        // Shape-valid, semantically empty input parses fine; the tool itself
        // reports the validation failure as data.
        let invocation = ToolInvocation::parse("create_resolution", json!({})).unwrap();
        let mut set = ResolutionSet::new();
        let mut prefs = UserPreferences::default();
        let result = invocation.execute(&mut set, &mut prefs, Utc::now());
        assert!(!result.success);
        assert!(result.error.unwrap().contains("title"));
    }

    #[test]
    fn every_registered_name_parses_into_a_variant() {
        for spec in tool_specs() {
            let parsed = ToolInvocation::parse(&spec.name, json!({}));
            assert!(parsed.is_ok(), "{} failed to parse", spec.name);
        }
    }

    #[test]
    fn tool_result_json_omits_unset_fields() {
        let json = ToolResult::fail("nope").to_json();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error\":\"nope\""));
        assert!(!json.contains("resolutions"));
        assert!(!json.contains("preferences"));
    }
}
