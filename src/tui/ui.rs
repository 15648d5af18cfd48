// Screen layout
//
//   ┌ title bar ──────────────────────────────┐
//   │ sidebar │ thread                        │
//   │         │                               │
//   │         │ composer                      │
//   └ status bar ─────────────────────────────┘
//
// Below the Wide breakpoint the sidebar is not docked; when open it is drawn
// over the left of the thread.

use super::app::App;
use super::components::{composer_panel, sidebar, status_bar, thread, title_bar};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    Frame,
};

pub fn draw(f: &mut Frame, app: &mut App) {
    let area = f.area();
    app.set_width(area.width);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(6),
            Constraint::Length(2),
        ])
        .split(area);

    title_bar::render(f, rows[0], app);

    let body = rows[1];
    let bp = super::layout::Breakpoint::from_width(area.width);
    let chat_area = if app.sidebar_is_overlay() {
        body
    } else {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(bp.sidebar_width()), Constraint::Min(20)])
            .split(body);
        sidebar::render(f, columns[0], app);
        columns[1]
    };

    let composer_height =
        composer_panel::panel_height(app, chat_area.width).min(chat_area.height.saturating_sub(3));
    let chat = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(composer_height)])
        .split(chat_area);

    thread::render(f, chat[0], app);
    composer_panel::render(f, chat[1], app);

    if app.sidebar_is_overlay() && app.sidebar_open {
        let overlay = Rect {
            width: (body.width * 4 / 5).clamp(24.min(body.width), 40.min(body.width)),
            ..body
        };
        sidebar::render(f, overlay, app);
    }

    status_bar::render(f, rows[2], app);

    if let Some(toast) = &app.toast {
        toast.render(f, area, &app.theme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatState;
    use crate::config::UiConfig;
    use crate::logging::LogBuffer;
    use crate::model::{Client, Conversation, Message, Role};
    use crate::tui::theme::Theme;
    use chrono::Utc;
    use ratatui::{backend::TestBackend, Terminal};

    fn busy_app() -> App {
        let mut state = ChatState::new();
        state.available_users = ["Ana Souza", "Bruno Lima", "Carla Dias"]
            .iter()
            .enumerate()
            .map(|(i, name)| Client {
                id: format!("u-{}", i),
                name: name.to_string(),
                email: format!("c{}@luma.example", i),
                role: Role::User,
                office_id: None,
                advisor_id: None,
            })
            .collect();
        state.selected_user_id = Some("u-0".into());
        let conversation = Conversation {
            id: "c1".into(),
            client_id: "u-0".into(),
            title: Some("Cobertura do seguro auto".into()),
            updated_at: Utc::now(),
        };
        state.conversations = vec![conversation.clone()];
        state.current_conversation = Some(conversation);
        state.messages = vec![Message::pending_user("c1", "Quais coberturas eu tenho?")];

        let mut app = App::new(
            state.into(),
            Theme::dark(),
            LogBuffer::new(),
            UiConfig::default(),
        );
        app.show_toast("Falha ao carregar conversas do cliente");
        app
    }

    fn draw_at(app: &mut App, width: u16, height: u16) {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
    }

    #[test]
    fn test_draws_on_short_wide_terminals() {
        let mut app = busy_app();
        for height in (1..=12).rev() {
            draw_at(&mut app, 120, height);
        }
    }

    #[test]
    fn test_draws_tiny_terminals_with_sidebar_overlay() {
        let mut app = busy_app();
        app.sidebar_open = true;
        for width in [80, 40, 24, 10, 3, 1] {
            for height in (1..=12).rev() {
                draw_at(&mut app, width, height);
            }
        }
        assert!(app.sidebar_is_overlay());
    }
}
