use ratatui::style::{Color, Modifier, Style};

use crate::chat::Theme;

/// Colors for one theme
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub text: Color,
    pub background: Color,
    pub accent: Color,
    pub user: Color,
    pub bot: Color,
    pub muted: Color,
    pub code: Color,
    pub code_background: Color,
    pub warning: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                text: Color::Black,
                background: Color::White,
                accent: Color::Blue,
                user: Color::Blue,
                bot: Color::Magenta,
                muted: Color::DarkGray,
                code: Color::Black,
                code_background: Color::Gray,
                warning: Color::Red,
            },
            Theme::Dark => Self {
                text: Color::White,
                background: Color::Black,
                accent: Color::Cyan,
                user: Color::Cyan,
                bot: Color::LightMagenta,
                muted: Color::Gray,
                code: Color::LightGreen,
                code_background: Color::DarkGray,
                warning: Color::LightRed,
            },
        }
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.text).bg(self.background)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn title(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn selected(&self) -> Style {
        Style::default()
            .fg(self.background)
            .bg(self.accent)
            .add_modifier(Modifier::BOLD)
    }
}
