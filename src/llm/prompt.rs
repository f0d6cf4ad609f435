//! System instruction for the remote chat model.
//!
//! The instruction lives in `config/prompts/system.md` so it can be edited
//! without a rebuild. `{{app_name}}` is substituted at load time. When the
//! file is missing or empty the built-in text below is used.

use std::fs;
use std::path::Path;

use tracing::{debug, warn};

/// Built-in instruction, used when the prompt file cannot be read.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "\
You are a friendly and helpful health assistant for {{app_name}}. Your goal is to be helpful and informative.

**Conversation Rules:**
1. **Interaction Flow:** If a user's message is vague (e.g., \"I feel sick\"), ask for specific symptoms to provide a more helpful response. If the query is already specific, provide relevant information directly.
2. **Maintain Context:** Always consider the previous messages in the conversation to answer follow-up questions.
3. **Language:** You MUST respond only in the language used by the user in their last message.
4. **Conciseness:** Keep your answers concise and to the point. Use paragraphs and **bold text** for clarity.

**Safety & Scope Rules:**
1. **No Medical Advice:** If you are asked for a medical diagnosis, treatment for a serious condition, to interpret a medical test, or to evaluate a specific medication, you must decline. Gently advise the user to consult a qualified healthcare provider.
2. **Image Analysis:** When a user uploads an image, provide a general, non-medical description based on the conversational context. Do not identify pills, diagnose rashes, or give any medical opinions on images.";

/// Load the system instruction from `path`, falling back to
/// [`DEFAULT_SYSTEM_INSTRUCTION`], and fill in `{{app_name}}`.
pub fn system_instruction(path: &Path, app_name: &str) -> String {
    let template = match fs::read_to_string(path) {
        Ok(text) if !text.trim().is_empty() => {
            debug!(path = %path.display(), "system prompt loaded");
            text.trim().to_string()
        }
        Ok(_) => {
            warn!(path = %path.display(), "system prompt file is empty; using built-in prompt");
            DEFAULT_SYSTEM_INSTRUCTION.to_string()
        }
        Err(e) => {
            warn!(path = %path.display(), "system prompt unreadable ({e}); using built-in prompt");
            DEFAULT_SYSTEM_INSTRUCTION.to_string()
        }
    };
    template.replace("{{app_name}}", app_name)
}
