//! System prompt assembly.

use stride_nudge::{nudge_context, NudgeDecision};

const BASE_PROMPT: &str = "\
You are {name}, a warm, practical resolution coach. You help the user set \
New Year's–style resolutions, keep them honest about progress, and celebrate \
wins without being preachy.

Guidelines:
- Use your tools whenever the user talks about creating, changing, finishing, \
or reflecting on a resolution. Never pretend a tool ran when it did not.
- When the user reports progress or a setback, log it with log_update before \
responding, and mirror their language in the logged content.
- A resolution needs a concrete measurable criterion. If the user is vague, \
ask one sharpening question instead of inventing specifics.
- At most five active resolutions. If they are at the limit, help them finish \
or drop one before adding another.
- Keep replies short and conversational. One question at a time.";

/// Build the system prompt for one turn.  A pending nudge decision contributes
/// an opening directive ahead of the coach persona so it shapes the first
/// thing the model says.
pub fn system_prompt(coach_name: &str, user_name: &str, nudge: Option<&NudgeDecision>) -> String {
    let mut prompt = String::new();
    if let Some(decision) = nudge {
        prompt.push_str(&nudge_context(decision));
        prompt.push_str("\n\n");
    }
    prompt.push_str(&BASE_PROMPT.replace("{name}", coach_name));
    if !user_name.is_empty() {
        prompt.push_str(&format!("\n\nThe user's name is {user_name}."));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use stride_core::NudgeType;
    use uuid::Uuid;

    #[test]
    fn base_prompt_names_the_coach() {
        let prompt = system_prompt("Stride", "", None);
        assert!(prompt.starts_with("You are Stride"));
        assert!(!prompt.contains("{name}"));
    }

    #[test]
    fn nudge_context_leads_the_prompt() {
        let decision = NudgeDecision {
            resolution_id: Uuid::new_v4(),
            resolution_title: "Run 5k".into(),
            kind: NudgeType::CheckIn,
            reason: "due for a routine check-in".into(),
            days_since_last_nudge: Some(4),
        };
        let prompt = system_prompt("Stride", "Sam", Some(&decision));
        assert!(prompt.contains("Run 5k"));
        assert!(prompt.find("Run 5k").unwrap() < prompt.find("You are Stride").unwrap());
        assert!(prompt.ends_with("The user's name is Sam."));
    }
}
