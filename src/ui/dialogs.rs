//! Panels and dialogs drawn over the conversation.

use crate::chat::{Overlay, SettingsItem, Theme};
use crate::prompts::ABOUT_TEXT;
use crate::ui::theme::Palette;
use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use strum::IntoEnumIterator;

/// Draws whatever `overlay` is open; nothing for `Overlay::None`
pub struct OverlayView<'a> {
    overlay: &'a Overlay,
    theme: Theme,
}

impl<'a> OverlayView<'a> {
    pub fn new(overlay: &'a Overlay, theme: Theme) -> Self {
        Self { overlay, theme }
    }
}

impl Widget for OverlayView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let palette = Palette::for_theme(self.theme);

        let (title, lines, width) = match self.overlay {
            Overlay::None => return,
            Overlay::Settings { selected } => {
                let lines = SettingsItem::iter()
                    .enumerate()
                    .map(|(index, item)| {
                        let style = if index == *selected {
                            palette.selected()
                        } else {
                            palette.base()
                        };
                        Line::from(Span::styled(format!(" {} ", item.label(self.theme)), style))
                    })
                    .collect::<Vec<_>>();
                (" Settings ", lines, 30)
            }
            Overlay::ClearConfirm => (
                " Clear Chat ",
                vec![
                    Line::from("Are you sure you want to clear the chat?"),
                    Line::from(""),
                    Line::from(Span::styled("[y] Yes   [n] No", palette.muted())),
                ],
                46,
            ),
            Overlay::About => (" About Vision ", closable(ABOUT_TEXT, &palette), 60),
            Overlay::Alert(message) => {
                let width = if message.contains('\n') { 60 } else { 50 };
                (" Vision ", closable(message, &palette), width)
            }
        };

        // Word wrapping can take one row more than the character count suggests
        let inner_width = width - 4;
        let height = lines
            .iter()
            .map(|line| match line.width() as u16 {
                w if w <= inner_width => 1,
                w => w.div_ceil(inner_width) + 1,
            })
            .sum::<u16>()
            + 2;
        let popup = centered_rect(width, height, area);

        Clear.render(popup, buf);
        Paragraph::new(lines)
            .wrap(Wrap { trim: true })
            .alignment(Alignment::Left)
            .style(palette.base())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(title)
                    .title_style(palette.title())
                    .border_style(palette.title())
                    .padding(ratatui::widgets::Padding::horizontal(1)),
            )
            .render(popup, buf);
    }
}

/// One line per line of `text`, then the close hint
fn closable<'a>(text: &'a str, palette: &Palette) -> Vec<Line<'a>> {
    let mut lines: Vec<Line<'a>> = text.lines().map(Line::from).collect();
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Press any key to close", palette.muted())));
    lines
}

/// Rectangle of at most `width` x `height` centered in `area`
pub fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);

    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length((area.height - height) / 2),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length((area.width - width) / 2),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(vertical[1])[1]
}
