// Title bar component
//
// App name, the selected client and their active-policy badge.

use crate::model::active_policies_badge;
use crate::tui::app::App;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let snapshot = &app.snapshot;

    let mut spans = vec![Span::styled(
        " Luma Chat",
        Style::default().fg(theme.title).add_modifier(Modifier::BOLD),
    )];

    if let Some(client) = snapshot.selected_client() {
        spans.push(Span::styled(" ──── ", Style::default().fg(theme.muted)));
        spans.push(Span::styled(
            client.name.clone(),
            Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!("[{}]", active_policies_badge(snapshot.active_policy_count())),
            Style::default().fg(theme.badge),
        ));
    }

    if snapshot.is_loading {
        spans.push(Span::styled(
            "  carregando…",
            Style::default().fg(theme.muted),
        ));
    }

    let hint = if app.sidebar_is_overlay() {
        " Ctrl+B clientes "
    } else {
        " Ctrl+N nova conversa "
    };

    let title = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(theme.border_type)
            .border_style(Style::default().fg(theme.title))
            .title_top(Line::from(hint).right_aligned()),
    );

    f.render_widget(title, area);
}
