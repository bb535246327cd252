//! Per-turn driver: load, nudge-check, run the loop, persist.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use stride_core::{ChatRole, Conversation, ResolutionSet, UpdateTrigger, UserPreferences};
use stride_llm::{ChatMessage, CompletionClient};
use stride_nudge::{apply_nudge_delivery, create_nudge_record, should_nudge, NudgeDecision};
use stride_store::KvStore;

use crate::orchestrator::{run_tool_loop, TurnUpdate};
use crate::prompt::system_prompt;
use crate::repository::Repository;

/// Everything a caller needs to render one completed chat turn.
#[derive(Debug)]
pub struct ChatTurn {
    pub reply: String,
    pub tools_used: Vec<String>,
    pub update: Option<TurnUpdate>,
    /// The nudge that was woven into this reply, if one was delivered.
    pub nudge: Option<NudgeDecision>,
}

pub struct Coach {
    repository: Repository,
    client: Arc<dyn CompletionClient>,
    coach_name: String,
    user_name: String,
}

impl Coach {
    pub fn new(
        store: Arc<dyn KvStore>,
        client: Arc<dyn CompletionClient>,
        coach_name: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Self {
        Self {
            repository: Repository::new(store),
            client,
            coach_name: coach_name.into(),
            user_name: user_name.into(),
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Run one user turn end to end.
    ///
    /// Nudge bookkeeping (the resolution's nudge stats, the audit record, the
    /// session counter) only happens once the loop actually produced a reply,
    /// so an LLM failure never counts as a delivered nudge.
    pub async fn chat(&self, conversation_id: &str, user_message: &str) -> Result<ChatTurn> {
        let now = Utc::now();

        let mut loaded = self
            .repository
            .load_resolutions()
            .await
            .context("loading resolutions")?;
        let mut prefs = self
            .repository
            .load_preferences()
            .await
            .context("loading preferences")?;
        let mut conversation = self
            .repository
            .load_conversation(conversation_id)
            .await
            .unwrap_or_else(|err| {
                warn!(%err, "conversation load failed, starting fresh");
                Conversation::default()
            });

        let decision = should_nudge(&prefs, &loaded.set, conversation.nudge_count, now);
        let prompt = system_prompt(&self.coach_name, &self.user_name, decision.as_ref());

        conversation.push_user(user_message);
        let mut history = llm_history(&conversation);

        let outcome = run_tool_loop(
            self.client.as_ref(),
            &prompt,
            &mut history,
            &mut loaded.set,
            &mut prefs,
            now,
        )
        .await
        .context("completing chat turn")?;

        // A nudge-triggered update logged this turn is the user answering an
        // earlier check-in; close out its audit record.  Updates from this
        // turn all carry the turn's timestamp.
        for resolution in loaded.set.iter() {
            for update in resolution
                .updates
                .iter()
                .filter(|u| u.created_at == now && u.triggered_by == UpdateTrigger::Nudge)
            {
                if let Err(err) = self
                    .repository
                    .mark_nudge_responded(resolution.id, &update.content, update.sentiment, now)
                    .await
                {
                    warn!(%err, resolution = %resolution.id, "failed to close nudge record");
                }
            }
        }

        let mut delivered = None;
        if let Some(decision) = decision {
            if outcome.completed {
                if let Some(resolution) = loaded.set.get_mut(&decision.resolution_id) {
                    apply_nudge_delivery(resolution, now);
                }
                let record = create_nudge_record(&decision, &outcome.reply, now);
                if let Err(err) = self.repository.record_nudge(&record).await {
                    // The nudge reached the user either way; losing the audit
                    // record is not worth failing the turn.
                    warn!(%err, "failed to record delivered nudge");
                }
                conversation.nudge_count += 1;
                info!(
                    resolution = %decision.resolution_id,
                    kind = decision.kind.as_str(),
                    "nudge delivered"
                );
                delivered = Some(decision);
            }
        }

        conversation.push_assistant(&outcome.reply);

        self.repository
            .save_resolutions(&loaded)
            .await
            .context("saving resolutions")?;
        self.repository
            .save_preferences(&prefs)
            .await
            .context("saving preferences")?;
        self.repository
            .save_conversation(conversation_id, &conversation)
            .await
            .context("saving conversation")?;

        Ok(ChatTurn {
            reply: outcome.reply,
            tools_used: outcome.tools_used,
            update: outcome.update,
            nudge: delivered,
        })
    }

}

/// What the nudge engine would do right now, without delivering anything.
/// Needs no LLM client; a failed load defaults to silence rather than an
/// error.
pub async fn nudge_preview(repository: &Repository) -> Option<NudgeDecision> {
    let set = match repository.load_resolutions().await {
        Ok(loaded) => loaded.set,
        Err(err) => {
            warn!(%err, "resolution load failed, skipping nudge check");
            ResolutionSet::new()
        }
    };
    let prefs = match repository.load_preferences().await {
        Ok(prefs) => prefs,
        Err(err) => {
            warn!(%err, "preferences load failed, skipping nudge check");
            UserPreferences::default()
        }
    };
    should_nudge(&prefs, &set, 0, Utc::now())
}

/// Project the stored transcript into the provider-neutral message list.
fn llm_history(conversation: &Conversation) -> Vec<ChatMessage> {
    conversation
        .messages
        .iter()
        .map(|message| match message.role {
            ChatRole::User => ChatMessage::user(&message.content),
            ChatRole::Assistant => ChatMessage::assistant(&message.content),
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────
