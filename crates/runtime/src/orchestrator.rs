//! The structured tool loop.
//!
//! One loop iteration is one model round-trip.  Plain text ends the turn; a
//! tool call is parsed, executed against the in-memory state, and its result
//! appended to the history for the next round.  The final round withholds the
//! tool schema so a tool-happy model is forced to produce text.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use stride_core::{Resolution, ResolutionSet, UserPreferences};
use stride_llm::{ChatMessage, CompletionClient, CompletionOutcome, CompletionRequest, LlmError};
use stride_tools::{tool_schema_json, ToolInvocation, ToolParseError};

/// Most model round-trips per user turn.
pub const MAX_TOOL_ROUNDS: usize = 6;

const FALLBACK_REPLY: &str =
    "Sorry, I got tangled up handling that. Could you say it again, maybe in fewer steps?";

/// The state change the turn should surface to the caller, when any tool
/// produced one.  Later tool results overwrite earlier ones, so a turn that
/// edits then completes a resolution reports the completed form.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TurnUpdate {
    Resolution(Resolution),
    Preferences(UserPreferences),
}

#[derive(Debug)]
pub struct LoopOutcome {
    pub reply: String,
    /// Tool names in execution order, repeats included.
    pub tools_used: Vec<String>,
    pub update: Option<TurnUpdate>,
    /// False when the loop gave up and substituted the fallback reply.
    pub completed: bool,
}

/// Drive the model until it produces text or the round budget runs out.
///
/// Tool executions mutate `set` and `prefs` in place; the caller decides
/// whether to persist them.  An unknown tool name stops the loop defensively
/// and discards any pending update payload — the state mutations already
/// applied still stand, since their tool results were reported as successes.
pub async fn run_tool_loop(
    client: &dyn CompletionClient,
    system_prompt: &str,
    history: &mut Vec<ChatMessage>,
    set: &mut ResolutionSet,
    prefs: &mut UserPreferences,
    now: DateTime<Utc>,
) -> Result<LoopOutcome, LlmError> {
    let tools = tool_schema_json();
    let mut tools_used = Vec::new();
    let mut update = None;

    for round in 0..MAX_TOOL_ROUNDS {
        let last_round = round + 1 == MAX_TOOL_ROUNDS;
        let request = CompletionRequest {
            system_prompt: system_prompt.to_string(),
            tools: if last_round { Vec::new() } else { tools.clone() },
            messages: history.clone(),
        };

        match client.complete(&request).await? {
            CompletionOutcome::Text(text) => {
                debug!(round, tools = tools_used.len(), "turn finished with text");
                return Ok(LoopOutcome {
                    reply: text,
                    tools_used,
                    update,
                    completed: true,
                });
            }
            CompletionOutcome::ToolUse(call) => {
                let invocation = match ToolInvocation::parse(&call.name, call.input.clone()) {
                    Ok(invocation) => invocation,
                    Err(ToolParseError::UnknownTool(name)) => {
                        warn!(tool = %name, "model requested unregistered tool, stopping loop");
                        update = None;
                        break;
                    }
                    Err(err @ ToolParseError::InvalidInput { .. }) => {
                        // Shape errors go back to the model as a failed tool
                        // result so it can correct itself next round.
                        debug!(tool = %call.name, %err, "tool input failed to parse");
                        history.push(ChatMessage::AssistantToolUse(call.clone()));
                        history.push(ChatMessage::tool_result(
                            call.id,
                            stride_tools::ToolResult::fail(err.to_string()).to_json(),
                        ));
                        continue;
                    }
                };

                let result = invocation.execute(set, prefs, now);
                debug!(tool = invocation.name(), success = result.success, "tool executed");
                tools_used.push(invocation.name().to_string());
                if let Some(resolution) = &result.resolution {
                    update = Some(TurnUpdate::Resolution(resolution.clone()));
                } else if let Some(preferences) = &result.preferences {
                    update = Some(TurnUpdate::Preferences(preferences.clone()));
                }
                history.push(ChatMessage::AssistantToolUse(call.clone()));
                history.push(ChatMessage::tool_result(call.id, result.to_json()));
            }
        }
    }

    warn!(tools = tools_used.len(), "tool loop ended without a text reply");
    Ok(LoopOutcome {
        reply: FALLBACK_REPLY.to_string(),
        tools_used,
        update,
        completed: false,
    })
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use stride_llm::{ScriptedClient, ToolUseRequest};

    fn tool_use(name: &str, input: serde_json::Value) -> CompletionOutcome {
        CompletionOutcome::ToolUse(ToolUseRequest {
            id: format!("call_{name}"),
            name: name.to_string(),
            input,
        })
    }

    async fn run(
        client: &ScriptedClient,
        history: &mut Vec<ChatMessage>,
        set: &mut ResolutionSet,
        prefs: &mut UserPreferences,
    ) -> LoopOutcome {
        run_tool_loop(client, "coach", history, set, prefs, Utc::now())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn plain_text_ends_the_turn_unchanged() {
        let client = ScriptedClient::new([CompletionOutcome::Text("Hi there!".into())]);
        let mut history = vec![ChatMessage::user("hello")];
        let mut set = ResolutionSet::new();
        let mut prefs = UserPreferences::default();

        let outcome = run(&client, &mut history, &mut set, &mut prefs).await;
        assert_eq!(outcome.reply, "Hi there!");
        assert!(outcome.tools_used.is_empty());
        assert!(outcome.update.is_none());
        assert!(outcome.completed);
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn tool_call_executes_and_feeds_result_back() {
        let client = ScriptedClient::new([
            tool_use(
                "create_resolution",
                json!({"title": "Run 5k", "measurable_criteria": "3 runs a week"}),
            ),
            CompletionOutcome::Text("Created!".into()),
        ]);
        let mut history = vec![ChatMessage::user("I want to run a 5k")];
        let mut set = ResolutionSet::new();
        let mut prefs = UserPreferences::default();

        let outcome = run(&client, &mut history, &mut set, &mut prefs).await;
        assert_eq!(outcome.reply, "Created!");
        assert_eq!(outcome.tools_used, vec!["create_resolution"]);
        assert!(matches!(outcome.update, Some(TurnUpdate::Resolution(_))));
        assert_eq!(set.len(), 1);

        // User msg + assistant tool use + tool result.
        assert_eq!(history.len(), 3);
        match &history[2] {
            ChatMessage::ToolResult { content, .. } => {
                assert!(content.contains("\"success\":true"));
            }
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_stops_with_fallback_and_drops_update() {
        let client = ScriptedClient::new([
            tool_use(
                "create_resolution",
                json!({"title": "Run 5k", "measurable_criteria": "3 runs a week"}),
            ),
            tool_use("format_hard_drive", json!({})),
        ]);
        let mut history = vec![ChatMessage::user("hi")];
        let mut set = ResolutionSet::new();
        let mut prefs = UserPreferences::default();

        let outcome = run(&client, &mut history, &mut set, &mut prefs).await;
        assert!(!outcome.completed);
        assert_eq!(outcome.reply, FALLBACK_REPLY);
        assert!(outcome.update.is_none());
        // The create still ran before the loop stopped.
        assert_eq!(outcome.tools_used, vec!["create_resolution"]);
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn invalid_input_is_reported_back_not_fatal() {
        let client = ScriptedClient::new([
            tool_use("create_resolution", json!({"title": 42})),
            CompletionOutcome::Text("Let me try that differently.".into()),
        ]);
        let mut history = vec![ChatMessage::user("hi")];
        let mut set = ResolutionSet::new();
        let mut prefs = UserPreferences::default();

        let outcome = run(&client, &mut history, &mut set, &mut prefs).await;
        assert!(outcome.completed);
        assert!(outcome.tools_used.is_empty());
        match &history[2] {
            ChatMessage::ToolResult { content, .. } => {
                assert!(content.contains("\"success\":false"));
            }
            other => panic!("expected tool result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn later_tool_update_overwrites_earlier() {
        let client = ScriptedClient::new([
            tool_use(
                "create_resolution",
                json!({"title": "Run 5k", "measurable_criteria": "3 runs a week"}),
            ),
            tool_use("configure_updates", json!({"action": "status"})),
            CompletionOutcome::Text("Done.".into()),
        ]);
        let mut history = vec![ChatMessage::user("hi")];
        let mut set = ResolutionSet::new();
        let mut prefs = UserPreferences::default();

        let outcome = run(&client, &mut history, &mut set, &mut prefs).await;
        assert_eq!(
            outcome.tools_used,
            vec!["create_resolution", "configure_updates"]
        );
        assert!(matches!(outcome.update, Some(TurnUpdate::Preferences(_))));
    }

    #[tokio::test]
    async fn round_budget_forces_fallback() {
        let script: Vec<_> = (0..MAX_TOOL_ROUNDS)
            .map(|_| tool_use("list_resolutions", json!({})))
            .collect();
        let client = ScriptedClient::new(script);
        let mut history = vec![ChatMessage::user("hi")];
        let mut set = ResolutionSet::new();
        let mut prefs = UserPreferences::default();

        let outcome = run(&client, &mut history, &mut set, &mut prefs).await;
        assert!(!outcome.completed);
        assert_eq!(outcome.reply, FALLBACK_REPLY);
        assert_eq!(outcome.tools_used.len(), MAX_TOOL_ROUNDS);

        // The last request withheld the tool schema.
        let requests = client.requests();
        assert_eq!(requests.len(), MAX_TOOL_ROUNDS);
        assert!(!requests[0].tools.is_empty());
        assert!(requests.last().unwrap().tools.is_empty());
    }

    #[tokio::test]
    async fn provider_error_propagates() {
        let client = ScriptedClient::new([]);
        let mut history = vec![ChatMessage::user("hi")];
        let mut set = ResolutionSet::new();
        let mut prefs = UserPreferences::default();

        let result =
            run_tool_loop(&client, "coach", &mut history, &mut set, &mut prefs, Utc::now()).await;
        assert!(result.is_err());
    }
}
