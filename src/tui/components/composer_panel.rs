// Composer panel
//
// Draws the draft with its cursor. Height comes from ui::draw via
// `panel_height`; the panel dims while a reply is streaming.

use crate::tui::app::{App, Focus};
use ratatui::{
    layout::Rect,
    style::Style,
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Rows the panel needs at this width, borders included
pub fn panel_height(app: &App, width: u16) -> u16 {
    let text_width = width.saturating_sub(2);
    app.composer.visible_height(
        text_width,
        app.ui.composer_min_lines,
        app.ui.composer_max_lines,
    ) + 2
}

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let focused = app.focus == Focus::Composer;
    let streaming = app.snapshot.is_streaming();
    let text_width = area.width.saturating_sub(2);
    let rows = area.height.saturating_sub(2);

    let title = if streaming {
        " Aguarde a resposta… "
    } else if app.snapshot.selected_user_id.is_none() {
        " Selecione um cliente "
    } else {
        " Mensagem "
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(theme.border_style(focused && !streaming))
        .title(title);

    let (cursor_row, cursor_col) = app.composer.cursor_position(text_width);
    // Keep the cursor row in view once the draft outgrows the panel
    let scroll = cursor_row.saturating_sub(rows.saturating_sub(1));

    let paragraph = if app.composer.text().is_empty() && !focused {
        Paragraph::new("Pergunte sobre as apólices do cliente…")
            .style(Style::default().fg(theme.muted))
    } else {
        let lines: Vec<Line> = app
            .composer
            .wrapped_lines(text_width)
            .into_iter()
            .map(Line::from)
            .collect();
        let color = if streaming { theme.muted } else { theme.fg };
        Paragraph::new(lines)
            .style(Style::default().fg(color))
            .scroll((scroll, 0))
    };

    f.render_widget(paragraph.block(block), area);

    if focused && !streaming && rows > 0 && text_width > 0 {
        f.set_cursor_position((
            area.x + 1 + cursor_col,
            area.y + 1 + cursor_row - scroll,
        ));
    }
}
