use crate::ui::theme::Palette;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::Widget,
};
use std::time::Instant;

/// "Vision is thinking..." line shown while a reply is pending
pub struct ThinkingIndicator {
    palette: Palette,
    since: Instant,
    now: Instant,
}

impl ThinkingIndicator {
    pub fn new(palette: Palette, since: Instant, now: Instant) -> Self {
        Self { palette, since, now }
    }

    /// Animated dots, one more every 300ms
    pub fn dots(&self) -> &'static str {
        match (self.now.saturating_duration_since(self.since).as_millis() / 300) % 4 {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        }
    }

    pub fn line(&self) -> Line<'static> {
        Line::from(vec![
            Span::styled("Vision is thinking", Style::default().fg(self.palette.bot)),
            Span::styled(self.dots(), Style::default().fg(self.palette.accent)),
        ])
    }
}

impl Widget for ThinkingIndicator {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.height == 0 {
            return;
        }
        buf.set_line(area.x, area.y, &self.line(), area.width);
    }
}
