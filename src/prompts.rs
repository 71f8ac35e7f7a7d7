//! Fixed texts shared by the relay and the chat UI.

/// System instruction every conversation handle is bound to.
pub const SYSTEM_INSTRUCTION: &str = r#"
Your name is Vision, an AI chatbot.
You were created by Google and developed by Murthy.
Prefer answers within 8–10 lines when short.
Be clear, accurate, and direct.
"#;

/// First message of a fresh chat.
pub const GREETING: &str = "Hello! I'm Vision, your AI assistant. How can I help you today?";

/// First message after the user clears the chat.
pub const CLEARED_GREETING: &str = "Chat cleared!\n Hello! I'm Vision. How can I help you?";

/// Reply text used when the model answers with nothing.
pub const EMPTY_REPLY: &str = "No response";

/// Acknowledgment returned by the relay for a reset.
pub const RESET_ACK: &str = "Chat session reset successfully.";

pub const ABOUT_TEXT: &str = "Vision AI is an intelligent chatbot powered by the Google Gemini API, \
designed to handle follow-up conversations and deliver clean, accurate responses. It features code \
highlighting, copy functionality, input validation, voice input through a speech-to-text command, and \
dark/light theme switching.";

pub const DISCLAIMER: &str = "Vision can make mistakes. Check important info only.";

/// Bot message shown when the relay cannot be reached.
pub fn apology(base_url: &str) -> String {
    format!(
        "Sorry, I encountered an error while processing your request. Please redirect to {} and try again.",
        base_url
    )
}
