// Color themes for the chat view
//
// Two palettes, picked by name from config (`theme = "dark" | "light"`).

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::BorderType;

#[derive(Debug, Clone)]
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub muted: Color,
    pub border: Color,
    pub border_focused: Color,
    pub border_type: BorderType,

    pub title: Color,
    pub badge: Color,
    pub status_bar: Color,

    pub selected_bg: Color,
    pub selected_fg: Color,

    // Bubbles
    pub user_bubble: Color,
    pub user_text: Color,
    pub ai_bubble: Color,
    pub ai_text: Color,
    pub failed: Color,
    pub typing: Color,

    pub warning: Color,
    pub error: Color,
    pub toast_border: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Theme by config name; unknown names fall back to dark
    pub fn by_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "light" => Self::light(),
            "dark" => Self::dark(),
            other => {
                tracing::warn!("Unknown theme {:?}, using dark", other);
                Self::dark()
            }
        }
    }

    pub fn dark() -> Self {
        Self {
            bg: Color::Reset,
            fg: Color::White,
            muted: Color::DarkGray,
            border: Color::Gray,
            border_focused: Color::Cyan,
            border_type: BorderType::Rounded,

            title: Color::Cyan,
            badge: Color::Green,
            status_bar: Color::Gray,

            selected_bg: Color::DarkGray,
            selected_fg: Color::Yellow,

            user_bubble: Color::Cyan,
            user_text: Color::White,
            ai_bubble: Color::Gray,
            ai_text: Color::White,
            failed: Color::Red,
            typing: Color::Magenta,

            warning: Color::Yellow,
            error: Color::Red,
            toast_border: Color::Yellow,
        }
    }

    pub fn light() -> Self {
        Self {
            bg: Color::White,
            fg: Color::Black,
            muted: Color::Gray,
            border: Color::DarkGray,
            border_focused: Color::Blue,
            border_type: BorderType::Rounded,

            title: Color::Blue,
            badge: Color::Green,
            status_bar: Color::DarkGray,

            selected_bg: Color::LightBlue,
            selected_fg: Color::Black,

            user_bubble: Color::Blue,
            user_text: Color::Black,
            ai_bubble: Color::DarkGray,
            ai_text: Color::Black,
            failed: Color::Red,
            typing: Color::Magenta,

            warning: Color::Rgb(184, 134, 11), // Dark goldenrod
            error: Color::Red,
            toast_border: Color::Rgb(184, 134, 11),
        }
    }

    pub fn border_style(&self, focused: bool) -> Style {
        let color = if focused {
            self.border_focused
        } else {
            self.border
        };
        Style::default().fg(color)
    }

    pub fn selected_style(&self) -> Style {
        Style::default()
            .bg(self.selected_bg)
            .fg(self.selected_fg)
            .add_modifier(Modifier::BOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name() {
        assert_eq!(Theme::by_name("LIGHT").bg, Color::White);
        assert_eq!(Theme::by_name("dark").bg, Color::Reset);
        assert_eq!(Theme::by_name("solarized").bg, Color::Reset);
    }
}
