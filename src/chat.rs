//! Client-side chat state: the message list and the UI mode record.

use std::fmt::Display;
use std::str::FromStr;
use std::time::{Duration, Instant};

use strum::{EnumIter, IntoEnumIterator};

use crate::prompts::{CLEARED_GREETING, GREETING, apology};

/// Longest input the send action accepts, in characters.
pub const MAX_INPUT_CHARS: usize = 5000;

/// How long the "Copied" indicator stays up.
pub const COPY_FEEDBACK: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Bot,
}

/// A message in the local conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    pub timestamp: String,
}

/// Why a send was refused before any network call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendRejection {
    Empty,
    Loading,
    TooLong,
}

/// A slice of message content between ``` fences
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Code { lang: Option<String>, body: String },
}

/// Split content on ``` fences: even pieces are prose, odd pieces are code.
///
/// A first line inside a fence that looks like a language name (`rust`, `c++`, `c#`,
/// `objective-c`) is taken as the language tag.
pub fn split_segments(content: &str) -> Vec<Segment> {
    content
        .split("```")
        .enumerate()
        .map(|(index, part)| {
            if index % 2 == 0 {
                return Segment::Text(part.trim().to_string());
            }

            let (first, rest) = part.split_once('\n').unwrap_or((part, ""));
            let tag = first.trim();
            if is_language_tag(tag) && !rest.trim().is_empty() {
                Segment::Code {
                    lang: Some(tag.to_string()),
                    body: rest.trim().to_string(),
                }
            } else {
                Segment::Code {
                    lang: None,
                    body: part.trim().to_string(),
                }
            }
        })
        .collect()
}

fn is_language_tag(tag: &str) -> bool {
    !tag.is_empty()
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '#'))
}

/// Number of characters in `text`, as shown by the input counter.
pub fn char_count(text: &str) -> usize {
    text.chars().count()
}

fn now_label() -> String {
    chrono::Local::now().format("%-I:%M:%S %p").to_string()
}

/// Ordered, append-only message list plus the in-flight flag
pub struct ChatState {
    messages: Vec<Message>,
    next_id: u64,
    loading: bool,
    base_url: String,
    pub ui: UiState,
}

impl ChatState {
    pub fn new(base_url: &str, theme: Theme) -> Self {
        let mut state = Self {
            messages: Vec::new(),
            next_id: 1,
            loading: false,
            base_url: base_url.to_string(),
            ui: UiState::new(theme),
        };
        state.push(Role::Bot, GREETING.to_string());
        state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Check whether `text` may be sent right now.
    pub fn validate(&self, text: &str) -> Result<(), SendRejection> {
        if self.loading {
            Err(SendRejection::Loading)
        } else if text.trim().is_empty() {
            Err(SendRejection::Empty)
        } else if char_count(text) > MAX_INPUT_CHARS {
            Err(SendRejection::TooLong)
        } else {
            Ok(())
        }
    }

    /// Optimistically append the user's message and mark a request in flight.
    ///
    /// Returns the prompt to forward to the relay.
    pub fn begin_send(&mut self, text: &str) -> Result<String, SendRejection> {
        self.validate(text)?;
        self.push(Role::User, text.to_string());
        self.loading = true;
        Ok(text.to_string())
    }

    /// Append the bot's reply, or the apology when the request failed.
    pub fn finish_send<E: Display>(&mut self, result: Result<String, E>) {
        match result {
            Ok(text) => self.push(Role::Bot, text),
            Err(err) => {
                tracing::error!("API Error: {}", err);
                let text = apology(&self.base_url);
                self.push(Role::Bot, text);
            }
        }
        self.loading = false;
    }

    /// Drop every message and start over from the cleared greeting.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.push(Role::Bot, CLEARED_GREETING.to_string());
    }

    /// Latest bot message, the default copy target.
    pub fn last_bot_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Bot)
    }

    /// Message by its 1-based position in the list.
    pub fn message_at(&self, number: usize) -> Option<&Message> {
        number.checked_sub(1).and_then(|index| self.messages.get(index))
    }

    fn push(&mut self, role: Role, content: String) {
        self.messages.push(Message {
            id: self.next_id,
            role,
            content,
            timestamp: now_label(),
        });
        self.next_id += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(format!("unknown theme: {}", other)),
        }
    }
}

/// Entries of the settings panel, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum SettingsItem {
    ClearChat,
    ToggleTheme,
    About,
    ContactAdmin,
}

impl SettingsItem {
    pub fn label(self, theme: Theme) -> &'static str {
        match self {
            SettingsItem::ClearChat => "Clear Chat",
            SettingsItem::ToggleTheme => match theme {
                Theme::Dark => "Light Theme",
                Theme::Light => "Dark Theme",
            },
            SettingsItem::About => "About Vision",
            SettingsItem::ContactAdmin => "Contact Admin",
        }
    }
}

/// The one panel or dialog drawn over the conversation, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Overlay {
    None,
    Settings { selected: usize },
    ClearConfirm,
    About,
    Alert(String),
}

/// UI modes as one record; only one overlay can be open at a time.
#[derive(Debug, Clone)]
pub struct UiState {
    pub theme: Theme,
    pub overlay: Overlay,
    pub recording: bool,
    copied_until: Option<Instant>,
}

impl UiState {
    pub fn new(theme: Theme) -> Self {
        Self {
            theme,
            overlay: Overlay::None,
            recording: false,
            copied_until: None,
        }
    }

    pub fn toggle_settings(&mut self) {
        self.overlay = match self.overlay {
            Overlay::Settings { .. } => Overlay::None,
            _ => Overlay::Settings { selected: 0 },
        };
    }

    /// Move the settings selection, wrapping at both ends.
    pub fn move_selection(&mut self, delta: isize) {
        if let Overlay::Settings { selected } = &mut self.overlay {
            let len = SettingsItem::iter().count() as isize;
            *selected = (*selected as isize + delta).rem_euclid(len) as usize;
        }
    }

    /// Apply the highlighted settings entry and close the panel.
    pub fn choose_setting(&mut self, contact_url: Option<&str>) -> Option<SettingsItem> {
        let Overlay::Settings { selected } = self.overlay else {
            return None;
        };
        let item = SettingsItem::iter().nth(selected)?;

        self.overlay = match item {
            SettingsItem::ClearChat => Overlay::ClearConfirm,
            SettingsItem::ToggleTheme => {
                self.theme = self.theme.toggled();
                Overlay::None
            }
            SettingsItem::About => Overlay::About,
            SettingsItem::ContactAdmin => Overlay::Alert(match contact_url {
                Some(url) => format!("Contact the admin at {}", url),
                None => "No admin contact is configured.".to_string(),
            }),
        };
        Some(item)
    }

    pub fn alert(&mut self, message: impl Into<String>) {
        self.overlay = Overlay::Alert(message.into());
    }

    pub fn dismiss(&mut self) {
        self.overlay = Overlay::None;
    }

    pub fn has_overlay(&self) -> bool {
        self.overlay != Overlay::None
    }

    pub fn mark_copied(&mut self, now: Instant) {
        self.copied_until = Some(now + COPY_FEEDBACK);
    }

    pub fn is_copied(&self, now: Instant) -> bool {
        self.copied_until.is_some_and(|until| now < until)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn state() -> ChatState {
        ChatState::new("http://127.0.0.1:3000", Theme::Light)
    }

    #[test]
    fn starts_with_greeting() {
        let chat = state();
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].role, Role::Bot);
        assert_eq!(chat.messages()[0].content, GREETING);
        assert!(!chat.is_loading());
    }

    #[test]
    fn send_and_reply_appends_two_messages_in_order() {
        let mut chat = state();

        let prompt = chat.begin_send("Hello").expect("sendable");
        assert_eq!(prompt, "Hello");
        assert!(chat.is_loading());
        assert_eq!(chat.messages().len(), 2);

        chat.finish_send::<String>(Ok("Hi there!".to_string()));

        let summary: Vec<(Role, &str)> = chat
            .messages()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![(Role::Bot, GREETING), (Role::User, "Hello"), (Role::Bot, "Hi there!")]
        );
        assert!(!chat.is_loading());
        let ids: Vec<u64> = chat.messages().iter().map(|m| m.id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn failure_keeps_user_message_and_appends_apology() {
        let mut chat = state();
        chat.begin_send("Hello").expect("sendable");
        chat.finish_send::<String>(Err("HTTP error! status: 500".to_string()));

        assert_eq!(chat.messages().len(), 3);
        assert_eq!(chat.messages()[1].content, "Hello");
        assert_eq!(
            chat.messages()[2].content,
            "Sorry, I encountered an error while processing your request. Please redirect to http://127.0.0.1:3000 and try again."
        );
        assert!(!chat.is_loading());
    }

    #[test]
    fn rejects_blank_long_and_concurrent_sends() {
        let mut chat = state();
        assert_eq!(chat.begin_send("  \n "), Err(SendRejection::Empty));

        let at_limit = "a".repeat(MAX_INPUT_CHARS);
        let over_limit = "a".repeat(MAX_INPUT_CHARS + 1);
        assert_eq!(chat.validate(&at_limit), Ok(()));
        assert_eq!(chat.begin_send(&over_limit), Err(SendRejection::TooLong));
        assert_eq!(chat.messages().len(), 1);

        chat.begin_send(&at_limit).expect("sendable");
        assert_eq!(chat.begin_send("again"), Err(SendRejection::Loading));
        assert_eq!(chat.messages().len(), 2);
    }

    #[test]
    fn limit_counts_characters_not_bytes() {
        let chat = state();
        let accents = "é".repeat(MAX_INPUT_CHARS);
        assert_eq!(char_count(&accents), MAX_INPUT_CHARS);
        assert_eq!(chat.validate(&accents), Ok(()));
    }

    #[test]
    fn clear_resets_to_cleared_greeting() {
        let mut chat = state();
        chat.begin_send("Hello").expect("sendable");
        chat.finish_send::<String>(Ok("Hi".to_string()));
        let last_id = chat.messages()[2].id;

        chat.clear();

        assert_eq!(chat.messages().len(), 1);
        assert_eq!(chat.messages()[0].content, CLEARED_GREETING);
        assert!(chat.messages()[0].id > last_id);
    }

    #[test]
    fn copy_targets() {
        let mut chat = state();
        chat.begin_send("Hello").expect("sendable");
        chat.finish_send::<String>(Ok("Hi".to_string()));

        assert_eq!(chat.last_bot_message().map(|m| m.content.as_str()), Some("Hi"));
        assert_eq!(chat.message_at(2).map(|m| m.content.as_str()), Some("Hello"));
        assert!(chat.message_at(0).is_none());
        assert!(chat.message_at(4).is_none());
    }

    #[test]
    fn segments_alternate_between_text_and_code() {
        let content = "Here you go:\n```rust\nfn main() {}\n```\nThat's it.";
        assert_eq!(
            split_segments(content),
            vec![
                Segment::Text("Here you go:".to_string()),
                Segment::Code {
                    lang: Some("rust".to_string()),
                    body: "fn main() {}".to_string()
                },
                Segment::Text("That's it.".to_string()),
            ]
        );
    }

    #[test]
    fn segments_handle_plain_and_untagged_code() {
        assert_eq!(
            split_segments("  just text  "),
            vec![Segment::Text("just text".to_string())]
        );
        assert_eq!(
            split_segments("```let x = 1;```"),
            vec![
                Segment::Text(String::new()),
                Segment::Code {
                    lang: None,
                    body: "let x = 1;".to_string()
                },
                Segment::Text(String::new()),
            ]
        );
    }

    #[test]
    fn code_on_the_first_fence_line_is_not_a_tag() {
        let code = |lang: Option<&str>, body: &str| Segment::Code {
            lang: lang.map(str::to_string),
            body: body.to_string(),
        };

        assert_eq!(split_segments("```x=1\ny=2```")[1], code(None, "x=1\ny=2"));
        assert_eq!(
            split_segments("```print(1)\nprint(2)\n```")[1],
            code(None, "print(1)\nprint(2)")
        );
        assert_eq!(split_segments("```c++\nint x;\n```")[1], code(Some("c++"), "int x;"));
        assert_eq!(split_segments("```c#\nvar x = 1;\n```")[1], code(Some("c#"), "var x = 1;"));
    }

    #[test]
    fn settings_panel_flow() {
        let mut ui = UiState::new(Theme::Light);
        ui.toggle_settings();
        assert_eq!(ui.overlay, Overlay::Settings { selected: 0 });

        ui.move_selection(-1);
        assert_eq!(ui.overlay, Overlay::Settings { selected: 3 });
        ui.move_selection(2);
        assert_eq!(ui.overlay, Overlay::Settings { selected: 1 });

        assert_eq!(ui.choose_setting(None), Some(SettingsItem::ToggleTheme));
        assert_eq!(ui.theme, Theme::Dark);
        assert_eq!(ui.overlay, Overlay::None);

        ui.toggle_settings();
        assert_eq!(ui.choose_setting(None), Some(SettingsItem::ClearChat));
        assert_eq!(ui.overlay, Overlay::ClearConfirm);

        ui.toggle_settings();
        ui.move_selection(2);
        assert_eq!(ui.choose_setting(None), Some(SettingsItem::About));
        assert_eq!(ui.overlay, Overlay::About);
        ui.dismiss();
        assert!(!ui.has_overlay());
    }

    #[test]
    fn contact_admin_shows_link() {
        let mut ui = UiState::new(Theme::Dark);
        ui.toggle_settings();
        ui.move_selection(3);
        ui.choose_setting(Some("https://wa.me/123"));
        assert_eq!(
            ui.overlay,
            Overlay::Alert("Contact the admin at https://wa.me/123".to_string())
        );
        assert_eq!(SettingsItem::ToggleTheme.label(ui.theme), "Light Theme");
    }

    #[test]
    fn copied_indicator_expires() {
        let mut ui = UiState::new(Theme::Light);
        let now = Instant::now();
        assert!(!ui.is_copied(now));

        ui.mark_copied(now);
        assert!(ui.is_copied(now + Duration::from_millis(1499)));
        assert!(!ui.is_copied(now + COPY_FEEDBACK));
    }

    #[test]
    fn theme_parses_from_config() {
        assert_eq!("Dark".parse::<Theme>(), Ok(Theme::Dark));
        assert!("sepia".parse::<Theme>().is_err());
    }
}
