//! Conversation history display component

use crate::chat::{Message, Role, Segment, split_segments};
use crate::ui::theme::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Scrollbar, ScrollbarOrientation, ScrollbarState, StatefulWidget, Widget},
};

/// Scroll position of the conversation, counted in lines up from the bottom
#[derive(Debug, Clone, Default)]
pub struct ConversationHistory {
    scroll_offset: usize,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    /// Follow the newest message again
    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }

    pub fn view<'a>(
        &self,
        messages: &'a [Message],
        palette: Palette,
        thinking: Option<Line<'static>>,
    ) -> HistoryView<'a> {
        HistoryView {
            messages,
            palette,
            thinking,
            scroll_offset: self.scroll_offset,
        }
    }
}

/// One frame of the conversation, ready to draw
pub struct HistoryView<'a> {
    messages: &'a [Message],
    palette: Palette,
    thinking: Option<Line<'static>>,
    scroll_offset: usize,
}

impl Widget for HistoryView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Vision AI ")
            .title_style(self.palette.title())
            .style(self.palette.base())
            .border_style(self.palette.muted());

        let inner_area = block.inner(area);
        block.render(area, buf);

        let width = inner_area.width.saturating_sub(1);
        let mut all_lines: Vec<Line> = Vec::new();
        for (index, message) in self.messages.iter().enumerate() {
            all_lines.extend(message_lines(message, index + 1, &self.palette, width));
            all_lines.push(Line::from(""));
        }
        if let Some(thinking) = self.thinking {
            all_lines.push(thinking);
        }

        // Determine the range of lines to display from the bottom
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let max_offset = total.saturating_sub(height);
        let offset = self.scroll_offset.min(max_offset);
        let start = max_offset - offset;

        for (i, line) in all_lines.iter().skip(start).take(height).enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, width);
        }

        if total > height {
            let mut state = ScrollbarState::new(max_offset).position(start);
            Scrollbar::default()
                .orientation(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("↑"))
                .end_symbol(Some("↓"))
                .render(inner_area, buf, &mut state);
        }
    }
}

/// Render a single message into lines
pub fn message_lines(message: &Message, number: usize, palette: &Palette, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    let (who, color) = match message.role {
        Role::User => ("You", palette.user),
        Role::Bot => ("Vision", palette.bot),
    };
    lines.push(Line::from(vec![
        Span::styled(who, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(format!("  {}  #{}", message.timestamp, number), palette.muted()),
    ]));

    let text_width = width.saturating_sub(2) as usize;
    for segment in split_segments(&message.content) {
        match segment {
            Segment::Text(text) => {
                if text.is_empty() {
                    continue;
                }
                for line in wrap_text(&text, text_width) {
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled(line, Style::default().fg(palette.text)),
                    ]));
                }
            }
            Segment::Code { lang, body } => {
                let code_style = Style::default().fg(palette.code).bg(palette.code_background);
                lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(format!("┌ {}", lang.as_deref().unwrap_or("code")), palette.muted()),
                ]));
                for code_line in body.lines() {
                    lines.push(Line::from(vec![
                        Span::raw("  "),
                        Span::styled("│ ", palette.muted()),
                        Span::styled(code_line.to_string(), code_style),
                    ]));
                }
                lines.push(Line::from(vec![Span::raw("  "), Span::styled("└", palette.muted())]));
            }
        }
    }

    lines
}

/// Wrap text to fit within the given width, keeping explicit line breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current_line = String::new();
        let mut current_len = 0;

        for word in paragraph.split_whitespace() {
            let word_len = word.chars().count();
            if current_len > 0 && current_len + word_len + 1 > width {
                lines.push(std::mem::take(&mut current_line));
                current_len = 0;
            }
            if current_len > 0 {
                current_line.push(' ');
                current_len += 1;
            }
            current_line.push_str(word);
            current_len += word_len;
        }

        lines.push(current_line);
    }

    lines
}
