use crate::chat::{MAX_INPUT_CHARS, Theme, char_count};
use crate::ui::conversation::commands::{CommandEntry, ParsedCommand, command_entries, parse_slash_command};
use crate::ui::theme::Palette;
use crate::voice::append_transcript;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{
        Block, Borders, Widget,
        block::{Position, Title},
    },
};
use std::cell::{Cell, RefCell};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ConversationResult {
    /// Enter was pressed on ordinary text; the text stays until the caller clears it
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    /// Byte offset into `content`, always on a char boundary
    pub cursor_position: usize,
}

/// Conversation composer for user input
#[derive(Clone)]
pub struct ConversationComposer {
    state: RefCell<TextAreaState>,
    placeholder: String,
    has_focus: bool,
    theme: Theme,
    busy: bool,
    command_entries: Vec<CommandEntry>,
    filtered_commands: RefCell<Vec<CommandEntry>>,
    show_command_palette: Cell<bool>,
    selected_command: Cell<Option<usize>>,
}

impl ConversationComposer {
    pub fn new(placeholder: String, theme: Theme) -> Self {
        Self {
            state: RefCell::new(TextAreaState::default()),
            placeholder,
            has_focus: false,
            theme,
            busy: false,
            command_entries: command_entries(),
            filtered_commands: RefCell::new(Vec::new()),
            show_command_palette: Cell::new(false),
            selected_command: Cell::new(None),
        }
    }

    /// Handle key input
    pub fn handle_key(&self, key: KeyEvent) -> ConversationResult {
        if key.kind != KeyEventKind::Press {
            return ConversationResult::None;
        }

        let mut state = self.state.borrow_mut();

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) {
                    self.insert_char(&mut state, '\n');
                } else if self.show_command_palette.get() && self.apply_selected_command(&mut state) {
                    return ConversationResult::None;
                } else if !state.content.trim().is_empty() {
                    if let Some(command) = parse_slash_command(&state.content) {
                        state.content.clear();
                        state.cursor_position = 0;
                        self.close_command_palette();
                        return ConversationResult::Command(command);
                    }
                    return ConversationResult::Submitted(state.content.clone());
                }
            }
            KeyCode::Up => {
                if self.show_command_palette.get() {
                    self.move_command_selection(-1);
                    return ConversationResult::None;
                }
            }
            KeyCode::Down => {
                if self.show_command_palette.get() {
                    self.move_command_selection(1);
                    return ConversationResult::None;
                }
            }
            KeyCode::Esc => {
                if self.show_command_palette.get() {
                    self.close_command_palette();
                    return ConversationResult::None;
                }
            }
            KeyCode::Tab => {
                if self.show_command_palette.get() && self.apply_selected_command(&mut state) {
                    return ConversationResult::None;
                }
            }
            KeyCode::Char(c) => {
                if key.modifiers.contains(KeyModifiers::CONTROL) {
                    return ConversationResult::None;
                }

                self.insert_char(&mut state, c);

                if self.show_command_palette.get() {
                    if state.content.starts_with('/') && !c.is_whitespace() {
                        self.refresh_command_palette(&state);
                    } else {
                        self.close_command_palette();
                    }
                } else if state.content == "/" {
                    self.open_command_palette(&state);
                }
            }
            KeyCode::Backspace => {
                if self.backspace(&mut state) {
                    self.sync_command_palette(&state);
                }
            }
            KeyCode::Delete => {
                if self.delete(&mut state) {
                    self.sync_command_palette(&state);
                }
            }
            KeyCode::Left => {
                if let Some(c) = state.content[..state.cursor_position].chars().next_back() {
                    state.cursor_position -= c.len_utf8();
                }
            }
            KeyCode::Right => {
                if let Some(c) = state.content[state.cursor_position..].chars().next() {
                    state.cursor_position += c.len_utf8();
                }
            }
            KeyCode::Home => {
                state.cursor_position = 0;
            }
            KeyCode::End => {
                state.cursor_position = state.content.len();
            }
            _ => {}
        }

        ConversationResult::None
    }

    /// Insert pasted text at the cursor
    pub fn paste(&self, text: &str) {
        let mut state = self.state.borrow_mut();
        let at = state.cursor_position;
        state.content.insert_str(at, text);
        state.cursor_position += text.len();
    }

    /// Append a voice transcript to whatever is already typed.
    pub fn append_transcript(&self, transcript: &str) {
        let mut state = self.state.borrow_mut();
        state.content = append_transcript(&state.content, transcript);
        state.cursor_position = state.content.len();
    }

    /// Insert a character at the cursor position
    fn insert_char(&self, state: &mut TextAreaState, c: char) {
        state.content.insert(state.cursor_position, c);
        state.cursor_position += c.len_utf8();
    }

    /// Delete character before cursor
    fn backspace(&self, state: &mut TextAreaState) -> bool {
        match state.content[..state.cursor_position].chars().next_back() {
            Some(c) => {
                state.cursor_position -= c.len_utf8();
                state.content.remove(state.cursor_position);
                true
            }
            None => false,
        }
    }

    /// Delete character at cursor
    fn delete(&self, state: &mut TextAreaState) -> bool {
        if state.cursor_position < state.content.len() {
            state.content.remove(state.cursor_position);
            true
        } else {
            false
        }
    }

    fn sync_command_palette(&self, state: &TextAreaState) {
        if self.show_command_palette.get() {
            if state.content.starts_with('/') {
                self.refresh_command_palette(state);
            } else {
                self.close_command_palette();
            }
        }
    }

    fn open_command_palette(&self, state: &TextAreaState) {
        self.show_command_palette.set(true);
        self.refresh_command_palette(state);
        self.selected_command.set(Some(0));
    }

    fn close_command_palette(&self) {
        self.show_command_palette.set(false);
        self.filtered_commands.borrow_mut().clear();
        self.selected_command.set(None);
    }

    fn refresh_command_palette(&self, state: &TextAreaState) {
        let query = state.content.trim_start_matches('/').to_lowercase();
        let mut filtered = self.filtered_commands.borrow_mut();
        filtered.clear();

        for entry in &self.command_entries {
            if query.is_empty() || entry.keyword.starts_with(&query) {
                filtered.push(*entry);
            }
        }

        if filtered.is_empty() {
            self.selected_command.set(None);
        } else {
            let index = self.selected_command.get().unwrap_or(0);
            let clamped = index.min(filtered.len() - 1);
            self.selected_command.set(Some(clamped));
        }
    }

    fn move_command_selection(&self, delta: isize) {
        let filtered = self.filtered_commands.borrow();
        if filtered.is_empty() {
            self.selected_command.set(None);
            return;
        }

        let current = self.selected_command.get().unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(filtered.len() as isize);
        self.selected_command.set(Some(next as usize));
    }

    fn apply_selected_command(&self, state: &mut TextAreaState) -> bool {
        let filtered = self.filtered_commands.borrow();
        let Some(entry) = self.selected_command.get().and_then(|i| filtered.get(i).copied()) else {
            return false;
        };

        let completed = format!("/{}", entry.keyword);
        if state.content.trim_end() == completed {
            return false;
        }

        state.content = completed;
        state.cursor_position = state.content.len();
        drop(filtered);
        self.close_command_palette();
        true
    }

    /// Set focus state
    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Mark whether a reply is pending; the send affordance is dimmed meanwhile.
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Get current content
    pub fn get_content(&self) -> String {
        self.state.borrow().content.clone()
    }

    /// Characters typed so far
    pub fn char_count(&self) -> usize {
        char_count(&self.state.borrow().content)
    }

    pub fn limit_exceeded(&self) -> bool {
        self.char_count() > MAX_INPUT_CHARS
    }

    /// Clear content
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.content.clear();
        state.cursor_position = 0;
    }
}

impl Widget for ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let palette = Palette::for_theme(self.theme);
        let state = self.state.borrow();

        let exceeded = self.limit_exceeded();
        let counter_style = if exceeded {
            Style::default().fg(palette.warning)
        } else {
            palette.muted()
        };
        let mut counter = vec![Span::styled(
            format!(" {}/{} ", self.char_count(), MAX_INPUT_CHARS),
            counter_style,
        )];
        if exceeded {
            counter.insert(0, Span::styled(" Limit exceeded ", counter_style));
        }

        let title = if self.busy {
            " Message Vision (waiting for reply) "
        } else {
            " Message Vision "
        };

        // Create the input block
        let block = Block::default()
            .borders(Borders::ALL)
            .title(title)
            .title(
                Title::from(Line::from(counter))
                    .position(Position::Bottom)
                    .alignment(Alignment::Right),
            )
            .style(palette.base())
            .border_style(if self.has_focus && !self.busy {
                Style::default().fg(palette.accent)
            } else {
                palette.muted()
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        // Render content or placeholder
        if state.content.is_empty() {
            let placeholder_line = Line::from(vec![Span::styled(&self.placeholder, palette.muted())]);
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let cursor = state.cursor_position.min(state.content.len());
            let mut content = state.content.clone();
            if self.has_focus {
                content.insert(cursor, '▌');
            }

            // Scroll just far enough that the cursor's line is the last one shown
            let cursor_line = state.content[..cursor].matches('\n').count();
            let lines: Vec<&str> = content.split('\n').collect();
            let skip = (cursor_line + 1).saturating_sub(inner_area.height as usize);
            for (i, line_text) in lines.iter().skip(skip).enumerate() {
                let line = Line::from(vec![Span::raw(*line_text)]);
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }

        // Render command palette if active
        if self.show_command_palette.get() {
            let filtered = self.filtered_commands.borrow();
            let palette_height = (filtered.len().min(8) + 2) as u16;
            let palette_area = Rect {
                x: inner_area.x,
                y: area.y.saturating_sub(palette_height),
                width: inner_area.width,
                height: palette_height.min(area.y),
            };

            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(palette.base())
                .border_style(Style::default().fg(palette.accent));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            let selected = self.selected_command.get();
            for (index, entry) in filtered.iter().enumerate() {
                if index >= inner.height as usize {
                    break;
                }

                let style = if selected == Some(index) {
                    palette.selected()
                } else {
                    palette.base()
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled(" - ", palette.muted()),
                    Span::styled(entry.description, palette.muted()),
                ]);

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::conversation::commands::SlashCommand;
    use pretty_assertions::assert_eq;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_text(composer: &ConversationComposer, text: &str) {
        for c in text.chars() {
            composer.handle_key(press(KeyCode::Char(c)));
        }
    }

    fn composer() -> ConversationComposer {
        ConversationComposer::new("Type your message...".to_string(), Theme::Light)
    }

    #[test]
    fn enter_submits_but_keeps_text_until_cleared() {
        let composer = composer();
        type_text(&composer, "Hello");

        assert_eq!(
            composer.handle_key(press(KeyCode::Enter)),
            ConversationResult::Submitted("Hello".to_string())
        );
        assert_eq!(composer.get_content(), "Hello");

        composer.clear();
        assert_eq!(composer.get_content(), "");
    }

    #[test]
    fn shift_enter_inserts_newline() {
        let composer = composer();
        type_text(&composer, "a");
        composer.handle_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::SHIFT));
        type_text(&composer, "b");
        assert_eq!(composer.get_content(), "a\nb");
    }

    #[test]
    fn blank_input_does_not_submit() {
        let composer = composer();
        type_text(&composer, "   ");
        assert_eq!(composer.handle_key(press(KeyCode::Enter)), ConversationResult::None);
    }

    #[test]
    fn slash_command_is_parsed_and_cleared() {
        let composer = composer();
        type_text(&composer, "/copy 2");

        match composer.handle_key(press(KeyCode::Enter)) {
            ConversationResult::Command(command) => {
                assert_eq!(command.command, SlashCommand::Copy);
                assert_eq!(command.copy_target(), Some(2));
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(composer.get_content(), "");
    }

    #[test]
    fn palette_completes_selected_command() {
        let composer = composer();
        type_text(&composer, "/ab");
        composer.handle_key(press(KeyCode::Tab));
        assert_eq!(composer.get_content(), "/about");
    }

    #[test]
    fn enter_on_a_complete_command_runs_it() {
        let composer = composer();
        type_text(&composer, "/clear");
        assert!(matches!(
            composer.handle_key(press(KeyCode::Enter)),
            ConversationResult::Command(ParsedCommand {
                command: SlashCommand::Clear,
                ..
            })
        ));
        assert_eq!(composer.get_content(), "");
    }

    #[test]
    fn editing_respects_multibyte_characters() {
        let composer = composer();
        type_text(&composer, "héllo");
        composer.handle_key(press(KeyCode::Left));
        composer.handle_key(press(KeyCode::Left));
        composer.handle_key(press(KeyCode::Left));
        composer.handle_key(press(KeyCode::Backspace));
        assert_eq!(composer.get_content(), "hllo");
        assert_eq!(composer.char_count(), 4);
    }

    #[test]
    fn transcripts_append_with_a_space() {
        let composer = composer();
        type_text(&composer, "hello");
        composer.append_transcript("world");
        type_text(&composer, "!");
        assert_eq!(composer.get_content(), "hello world!");
    }

    #[test]
    fn counter_flags_input_over_the_limit() {
        let composer = composer();
        composer.paste(&"x".repeat(MAX_INPUT_CHARS));
        assert!(!composer.limit_exceeded());
        type_text(&composer, "y");
        assert!(composer.limit_exceeded());
        assert_eq!(composer.char_count(), MAX_INPUT_CHARS + 1);
    }

    fn rendered_rows(composer: &ConversationComposer, area: Rect) -> Vec<String> {
        let mut buf = Buffer::empty(area);
        composer.clone().render(area, &mut buf);
        (0..area.height)
            .map(|y| (0..area.width).map(|x| buf.get(x, y).symbol().to_string()).collect::<String>())
            .collect()
    }

    #[test]
    fn tall_input_scrolls_to_the_cursor_line() {
        let composer = composer();
        composer.paste("one\ntwo\nthree\nfour");
        let area = Rect::new(0, 0, 30, 4);

        let rows = rendered_rows(&composer, area);
        assert!(rows[1].contains("three") && rows[2].contains("four"), "{:?}", rows);

        composer.handle_key(press(KeyCode::Home));
        let rows = rendered_rows(&composer, area);
        assert!(rows[1].contains("one") && rows[2].contains("two"), "{:?}", rows);
    }
}
