// Status bar component
//
// Reply phase and shortcuts on the left; the newest warning from the log
// buffer on the right, when there is one.

use crate::chat::ReplyPhase;
use crate::logging::{LogEntry, LogLevel};
use crate::tui::app::App;
use crate::tui::layout::Breakpoint;
use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::Line,
    widgets::{Block, Borders, Paragraph},
    Frame,
};

pub fn render(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.theme;
    let bp = Breakpoint::from_width(area.width);

    let phase = match app.snapshot.reply_phase() {
        ReplyPhase::Idle => "pronto",
        ReplyPhase::Awaiting => "aguardando resposta",
        ReplyPhase::Receiving => "recebendo resposta",
    };

    let left = if bp.at_least(Breakpoint::Wide) {
        format!(
            " {} │ Enter enviar │ Shift+Enter nova linha │ Tab foco │ Ctrl+R reenviar │ Ctrl+Q sair",
            phase
        )
    } else {
        format!(" {} │ Enter enviar │ Ctrl+Q sair", phase)
    };

    let block = Block::default().borders(Borders::TOP);
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(0), Constraint::Percentage(45)])
        .split(inner);

    f.render_widget(
        Paragraph::new(left).style(Style::default().fg(theme.status_bar)),
        chunks[0],
    );

    if let Some(alert) = app.log_buffer.latest_alert() {
        let color = match alert.level {
            LogLevel::Error => theme.error,
            _ => theme.warning,
        };
        f.render_widget(
            Paragraph::new(Line::from(format_alert(&alert)).right_aligned()).style(Style::default().fg(color)),
            chunks[1],
        );
    }
}

/// `12:04:31 WARN chat::service: Reply failed conversation=c1 `
fn format_alert(alert: &LogEntry) -> String {
    let target = alert.target.strip_prefix("luma_chat::").unwrap_or(&alert.target);
    format!(
        "{} {} {}: {} ",
        alert.timestamp.with_timezone(&Local).format("%H:%M:%S"),
        alert.level.as_str(),
        target,
        alert.message
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(target: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Warn,
            target: target.into(),
            message: "Reply failed conversation=c1".into(),
        }
    }

    #[test]
    fn test_alert_names_its_source() {
        let text = format_alert(&entry("luma_chat::chat::service"));
        assert!(text.ends_with(" WARN chat::service: Reply failed conversation=c1 "));

        let text = format_alert(&entry("rusqlite"));
        assert!(text.contains(" WARN rusqlite: "));
    }
}
