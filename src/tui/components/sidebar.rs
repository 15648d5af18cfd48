// Sidebar component
//
// Clients visible to the operator, the conversation search box and the
// selected client's conversations. Docked on wide terminals, drawn over the
// thread on narrow ones.

use crate::tui::app::{App, Focus};
use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    if app.sidebar_is_overlay() {
        f.render_widget(Clear, area);
    }

    let client_rows = client_rows(app.snapshot.available_users.len(), area.height);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(client_rows),
            Constraint::Length(3),
            Constraint::Min(3),
        ])
        .split(area);

    render_clients(f, chunks[0], app);
    render_search(f, chunks[1], app);
    render_conversations(f, chunks[2], app);
}

/// Height of the clients list: one row per client plus borders, at least 3
/// and otherwise no more than half the sidebar
fn client_rows(clients: usize, height: u16) -> u16 {
    let wanted = u16::try_from(clients).unwrap_or(u16::MAX).saturating_add(2);
    wanted.min(height / 2).max(3)
}

fn render_clients(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let focused = app.focus == Focus::Clients;
    let selected_id = app.snapshot.selected_user_id.as_deref();

    let items: Vec<ListItem> = app
        .snapshot
        .available_users
        .iter()
        .map(|client| {
            let marker = if Some(client.id.as_str()) == selected_id {
                "● "
            } else {
                "  "
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(theme.badge)),
                Span::raw(client.name.clone()),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(theme.border_style(focused))
        .title(" Clientes ");

    if items.is_empty() {
        let empty = Paragraph::new("Nenhum cliente disponível")
            .style(Style::default().fg(theme.muted))
            .block(block);
        f.render_widget(empty, area);
        return;
    }

    let list = List::new(items)
        .block(block)
        .style(Style::default().fg(theme.fg))
        .highlight_style(if focused {
            theme.selected_style()
        } else {
            Style::default().add_modifier(Modifier::BOLD)
        });

    let mut state = ListState::default().with_selected(Some(app.client_cursor));
    f.render_stateful_widget(list, area, &mut state);
}

fn render_search(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let focused = app.focus == Focus::Search;

    let (text, style) = if app.search.is_empty() && !focused {
        ("Buscar conversas…".to_string(), Style::default().fg(theme.muted))
    } else {
        (app.search.clone(), Style::default().fg(theme.fg))
    };

    let search = Paragraph::new(text).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(theme.border_type)
            .border_style(theme.border_style(focused))
            .title(" Busca "),
    );
    f.render_widget(search, area);

    if focused {
        let x = area.x + 1 + unicode_width::UnicodeWidthStr::width(app.search.as_str()) as u16;
        f.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn render_conversations(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let focused = app.focus == Focus::Conversations;
    let current_id = app
        .snapshot
        .current_conversation
        .as_ref()
        .map(|c| c.id.as_str());

    let conversations = app.visible_conversations();
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(theme.border_style(focused))
        .title(format!(" Conversas ({}) ", conversations.len()));

    if conversations.is_empty() {
        let hint = if app.snapshot.selected_user_id.is_none() {
            "Selecione um cliente"
        } else if app.search.trim().is_empty() {
            "Nenhuma conversa. Ctrl+N para começar"
        } else {
            "Nenhuma conversa encontrada"
        };
        f.render_widget(
            Paragraph::new(hint)
                .style(Style::default().fg(theme.muted))
                .block(block),
            area,
        );
        return;
    }

    let items: Vec<ListItem> = conversations
        .iter()
        .map(|conversation| {
            let title_style = if Some(conversation.id.as_str()) == current_id {
                Style::default().fg(theme.title).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(theme.fg)
            };
            let when = conversation
                .updated_at
                .with_timezone(&Local)
                .format("%d/%m %H:%M")
                .to_string();
            ListItem::new(vec![
                Line::from(Span::styled(conversation.display_title().to_string(), title_style)),
                Line::from(Span::styled(when, Style::default().fg(theme.muted))),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(if focused {
            theme.selected_style()
        } else {
            Style::default()
        });

    let mut state = ListState::default().with_selected(Some(app.conversation_cursor));
    f.render_stateful_widget(list, area, &mut state);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_rows_fit_short_sidebars() {
        assert_eq!(client_rows(3, 40), 5);
        assert_eq!(client_rows(50, 40), 20);
        assert_eq!(client_rows(3, 5), 3);
        assert_eq!(client_rows(0, 0), 3);
    }
}
