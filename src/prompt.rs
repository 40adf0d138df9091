//! System prompt assembly

/// Built-in persona used when the config supplies none
const DEFAULT_PERSONA: &str = "Your name is Jarvis. You have a joking sarcastic \
personality and are an AI designed to help me with technical knowledge as well \
as day to day tasks. Address me as Sir and speak in a British accent. Also keep \
replies short.";

/// Guidance appended so the model reaches for the registered tools
const TOOL_GUIDANCE: &str = "Tool use:\n\
- If the user asks for today's date (or current date), call get_today_date.";

/// Build the system instruction from an optional persona override.
///
/// The tool-use guidance is always appended so tool routing does not depend
/// on the persona text.
#[must_use]
pub fn system_prompt(persona: Option<&str>) -> String {
    let persona = persona.unwrap_or(DEFAULT_PERSONA);
    format!("{persona}\n{TOOL_GUIDANCE}")
}
