//! Prompt templates for both loop modes.

use deo_config::LoopMode;

const ACTIONS_REFERENCE: &str = r#"Available actions:
- create_folder: { "action": "create_folder", "path": "path/to/folder" }
- create_file: { "action": "create_file", "path": "path/to/file", "content": "file content" }
- edit_file: { "action": "edit_file", "path": "path/to/file", "content": "new complete content" }
- insert_code: { "action": "insert_code", "content": "code snippet" } (writes into the active editor)
- done: { "action": "done" } (use this when the task is complete)

Paths are relative to the project root. edit_file replaces the whole file."#;

const ITERATIVE_RULES: &str = "Decide the single next action for the user's request.\n\
Return ONLY a strict JSON object for that one action. No markdown. No explanations.";

const SINGLE_SHOT_RULES: &str = "Plan every action needed for the user's request.\n\
Return ONLY a strict JSON object of the form \
{ \"plan\": \"one-line description\", \"actions\": [ ...actions in order... ] }. \
No markdown. No explanations.";

/// Inputs for one prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptParts<'a> {
    pub request: &'a str,
    pub workspace: &'a str,
    pub memory: &'a str,
    /// Rendered action history (iterative mode only).
    pub history: &'a str,
    pub step: usize,
    pub max_steps: usize,
}

/// Render the full prompt for `mode`.
pub fn build_prompt(mode: LoopMode, parts: &PromptParts<'_>) -> String {
    let rules = match mode {
        LoopMode::Iterative => ITERATIVE_RULES,
        LoopMode::SingleShot => SINGLE_SHOT_RULES,
    };

    let mut prompt = format!(
        "You are an autonomous coding agent working inside the user's project.\n\
         {rules}\n\n\
         {ACTIONS_REFERENCE}\n\n\
         ## Workspace\n{}\n\n\
         ## Conversation so far\n{}\n\n\
         ## User Request\n{}\n",
        parts.workspace.trim_end(),
        parts.memory.trim_end(),
        parts.request.trim(),
    );

    if mode == LoopMode::Iterative {
        prompt.push_str(&format!("\n## Progress (step {} of {})\n", parts.step, parts.max_steps));
        if parts.history.is_empty() {
            prompt.push_str("No actions taken yet.\n");
        } else {
            prompt.push_str(parts.history);
        }
    }
    prompt
}
