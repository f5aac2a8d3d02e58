use ratatui::style::{Color, Style};

use crate::journal::Level;

pub fn red() -> Color {
    Color::Red
}

pub fn yellow() -> Color {
    Color::Yellow
}

pub fn blue() -> Color {
    Color::Blue
}

/// Severity colouring, disabled on terminals without colour support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn detect() -> Self {
        Self {
            enabled: crossterm::style::available_color_count() >= 8,
        }
    }

    pub fn colored() -> Self {
        Self { enabled: true }
    }

    pub fn monochrome() -> Self {
        Self { enabled: false }
    }

    pub fn style(&self, level: Level) -> Style {
        if !self.enabled {
            return Style::default();
        }
        match level {
            Level::Emerg | Level::Alert | Level::Crit | Level::Err => Style::default().fg(red()),
            Level::Warning => Style::default().fg(yellow()),
            Level::Debug => Style::default().fg(blue()),
            Level::Notice | Level::Info => Style::default(),
        }
    }
}
