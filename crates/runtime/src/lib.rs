//! Conversation runtime: repository, tool loop, and the per-turn driver.
//!
//! Everything request-scoped flows through [`Coach::chat`]: load state from
//! the store, run the nudge check, drive the model through the tool loop, and
//! persist the mutated state with an optimistic-concurrency save.

mod coach;
mod orchestrator;
mod prompt;
mod repository;

pub use coach::{nudge_preview, ChatTurn, Coach};
pub use orchestrator::{run_tool_loop, LoopOutcome, TurnUpdate, MAX_TOOL_ROUNDS};
pub use prompt::system_prompt;
pub use repository::{LoadedResolutions, Repository};
