//! Static tool descriptions and their OpenAI-format JSON schema.
//!
//! The eight specs here are the single source of truth for what the model is
//! offered; the schema array is supplied verbatim on every call within a
//! loop turn.

use serde::{Deserialize, Serialize};

pub const CREATE_RESOLUTION: &str = "create_resolution";
pub const EDIT_RESOLUTION: &str = "edit_resolution";
pub const LIST_RESOLUTIONS: &str = "list_resolutions";
pub const COMPLETE_RESOLUTION: &str = "complete_resolution";
pub const DELETE_RESOLUTION: &str = "delete_resolution";
pub const PRIORITIZE_RESOLUTIONS: &str = "prioritize_resolutions";
pub const CONFIGURE_UPDATES: &str = "configure_updates";
pub const LOG_UPDATE: &str = "log_update";

/// JSON-friendly type hint for a tool parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
}

/// Describes a single parameter that a tool accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParam {
    pub name: String,
    pub description: String,
    pub required: bool,
    #[serde(default)]
    pub param_type: ParamType,
    /// Allowed values when the parameter is an enum.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<String>,
}

impl ToolParam {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: true,
            param_type: ParamType::String,
            enum_values: Vec::new(),
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            required: false,
            param_type: ParamType::String,
            enum_values: Vec::new(),
        }
    }

    pub fn with_enum<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn number(mut self) -> Self {
        self.param_type = ParamType::Number;
        self
    }
}

/// Static metadata about a tool, used by the LLM to decide which tool to call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ToolParam>,
}

impl ToolSpec {
    /// Generate the OpenAI-compatible `tools` array element for this tool:
    /// `{"type":"function","function":{"name",...,"parameters":{...}}}`.
    pub fn to_openai_tool_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required: Vec<String> = Vec::new();

        for p in &self.params {
            let type_str = match p.param_type {
                ParamType::String => "string",
                ParamType::Number => "number",
            };
            let mut prop = serde_json::json!({
                "type": type_str,
                "description": p.description,
            });
            if !p.enum_values.is_empty() {
                prop["enum"] = serde_json::json!(p.enum_values);
            }
            properties.insert(p.name.clone(), prop);
            if p.required {
                required.push(p.name.clone());
            }
        }

        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }
}

/// The fixed eight-tool registry, in the order they are offered to the model.
pub fn tool_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: CREATE_RESOLUTION.into(),
            description: "Create a new resolution (goal) with measurable success criteria. \
                          Fails when 5 resolutions are already active."
                .into(),
            params: vec![
                ToolParam::required("title", "Short name for the goal"),
                ToolParam::required(
                    "measurable_criteria",
                    "How success will be measured, e.g. 'sub-25min 5k by Dec'",
                ),
                ToolParam::optional("context", "Optional background or motivation"),
            ],
        },
        ToolSpec {
            name: EDIT_RESOLUTION.into(),
            description: "Edit the title, measurable criteria, or context of an existing \
                          resolution. At least one field must be provided."
                .into(),
            params: vec![
                ToolParam::required("resolution_id", "Id of the resolution to edit"),
                ToolParam::optional("title", "New title"),
                ToolParam::optional("measurable_criteria", "New success criteria"),
                ToolParam::optional("context", "New context"),
            ],
        },
        ToolSpec {
            name: LIST_RESOLUTIONS.into(),
            description: "List the user's resolutions, optionally filtered by status.".into(),
            params: vec![ToolParam::optional("status", "Status filter")
                .with_enum(["active", "completed", "all"])],
        },
        ToolSpec {
            name: COMPLETE_RESOLUTION.into(),
            description: "Mark a resolution as completed. This cannot be undone.".into(),
            params: vec![ToolParam::required(
                "resolution_id",
                "Id of the resolution to complete",
            )],
        },
        ToolSpec {
            name: DELETE_RESOLUTION.into(),
            description: "Permanently delete a resolution and its update history.".into(),
            params: vec![ToolParam::required(
                "resolution_id",
                "Id of the resolution to delete",
            )],
        },
        ToolSpec {
            name: PRIORITIZE_RESOLUTIONS.into(),
            description: "Analyze the active resolutions and produce a weekly priority plan: \
                          categories, effort estimates, synergies, and a time budget. \
                          Read-only."
                .into(),
            params: vec![ToolParam::optional(
                "focus_area",
                "Area to weight more heavily (health, learning, reading, career, \
                 relationships, mindfulness)",
            )],
        },
        ToolSpec {
            name: CONFIGURE_UPDATES.into(),
            description: "Enable, disable, or configure proactive check-ins, globally or for \
                          one resolution. Use action=status to inspect current settings."
                .into(),
            params: vec![
                ToolParam::required("action", "What to do")
                    .with_enum(["enable", "disable", "configure", "status"]),
                ToolParam::optional("scope", "Apply globally or to one resolution")
                    .with_enum(["global", "resolution"]),
                ToolParam::optional(
                    "resolution_id",
                    "Required when scope=resolution",
                ),
                ToolParam::optional("channel", "Which channel to enable/disable")
                    .with_enum(["in_conversation", "sms"]),
                ToolParam::optional("frequency", "Check-in frequency (action=configure)")
                    .with_enum(["gentle", "moderate", "persistent"]),
                ToolParam::optional("phone_number", "SMS phone number (action=configure)"),
            ],
        },
        ToolSpec {
            name: LOG_UPDATE.into(),
            description: "Log a progress update, setback, milestone, or note against a \
                          resolution."
                .into(),
            params: vec![
                ToolParam::required("resolution_id", "Id of the resolution"),
                ToolParam::required("type", "Kind of update")
                    .with_enum(["progress", "setback", "milestone", "note"]),
                ToolParam::required("content", "What happened"),
                ToolParam::optional("sentiment", "How the user feels about it")
                    .with_enum(["positive", "neutral", "struggling"]),
                ToolParam::optional(
                    "progress_delta",
                    "Progress change in percentage points, -100 to 100",
                )
                .number(),
            ],
        },
    ]
}

/// The `tools` JSON array entries passed to the completion client.
pub fn tool_schema_json() -> Vec<serde_json::Value> {
    tool_specs()
        .iter()
        .map(ToolSpec::to_openai_tool_schema)
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_offers_exactly_eight_tools() {
        let specs = tool_specs();
        assert_eq!(specs.len(), 8);
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        for expected in [
            CREATE_RESOLUTION,
            EDIT_RESOLUTION,
            LIST_RESOLUTIONS,
            COMPLETE_RESOLUTION,
            DELETE_RESOLUTION,
            PRIORITIZE_RESOLUTIONS,
            CONFIGURE_UPDATES,
            LOG_UPDATE,
        ] {
            assert!(names.contains(&expected), "missing {expected}");
        }
    }

    #[test]
    fn schema_entry_shape() {
        let schema = tool_schema_json();
        assert_eq!(schema.len(), 8);
        let create = &schema[0];
        assert_eq!(create["type"], "function");
        assert_eq!(create["function"]["name"], CREATE_RESOLUTION);
        let required = create["function"]["parameters"]["required"]
            .as_array()
            .unwrap();
        assert!(required.contains(&serde_json::json!("title")));
        assert!(required.contains(&serde_json::json!("measurable_criteria")));
    }

    #[test]
    fn enum_params_carry_allowed_values() {
        let schema = tool_schema_json();
        let log = schema
            .iter()
            .find(|s| s["function"]["name"] == LOG_UPDATE)
            .unwrap();
        let kind = &log["function"]["parameters"]["properties"]["type"];
        let values = kind["enum"].as_array().unwrap();
        assert_eq!(values.len(), 4);
        let delta = &log["function"]["parameters"]["properties"]["progress_delta"];
        assert_eq!(delta["type"], "number");
    }
}
