// Thread component
//
// Message bubbles for the current conversation. USER bubbles hug the right
// edge, AI bubbles the left. Text is wrapped here rather than by Paragraph so
// the line count is known for scrolling.

use crate::chat::ChatState;
use crate::model::{DeliveryStatus, Message, MessageKind};
use crate::tui::app::{App, Focus};
use crate::tui::layout;
use crate::tui::theme::Theme;
use chrono::Local;
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub const FAILED_HINT: &str = "falhou · Ctrl+R para reenviar";

pub fn render(f: &mut Frame, area: Rect, app: &mut App) {
    let theme = app.theme.clone();
    let focused = app.focus == Focus::Thread;

    let title = app
        .snapshot
        .current_conversation
        .as_ref()
        .map(|c| format!(" {} ", c.display_title()))
        .unwrap_or_else(|| " Conversa ".to_string());

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(theme.border_type)
        .border_style(theme.border_style(focused))
        .title(title);
    let inner = block.inner(area);
    f.render_widget(block, area);

    if let Some(hint) = empty_hint(&app.snapshot) {
        let paragraph = Paragraph::new(hint)
            .alignment(Alignment::Center)
            .style(Style::default().fg(theme.muted));
        let middle = Rect {
            y: inner.y + inner.height / 2,
            height: 1.min(inner.height),
            ..inner
        };
        f.render_widget(paragraph, middle);
        return;
    }

    let dots = app.typing_dots();
    let lines = thread_lines(&app.snapshot, &theme, inner.width, &dots);

    let total = lines.len();

    app.thread_scroll
        .update_dimensions(total, inner.height as usize);
    let offset = app.thread_scroll.offset();

    let paragraph = Paragraph::new(lines).scroll((scroll_rows(offset), 0));
    f.render_widget(paragraph, inner);

    if app.thread_scroll.needs_scrollbar() {
        let mut state = ScrollbarState::new(total.saturating_sub(inner.height as usize))
            .position(offset);
        f.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            area,
            &mut state,
        );
    }
}

/// Paragraph scroll offset; saturates instead of wrapping past u16
fn scroll_rows(offset: usize) -> u16 {
    u16::try_from(offset).unwrap_or(u16::MAX)
}

/// Placeholder shown instead of bubbles
fn empty_hint(state: &ChatState) -> Option<&'static str> {
    if !state.messages.is_empty() || state.reply_phase().is_streaming() {
        return None;
    }
    Some(if state.selected_user_id.is_none() {
        "Selecione um cliente para começar"
    } else if state.is_loading {
        "Carregando…"
    } else if state.current_conversation.is_some() {
        "Nenhuma mensagem ainda. Pergunte sobre as apólices do cliente."
    } else {
        "Escolha uma conversa ou escreva para iniciar uma nova"
    })
}

/// Every rendered line of the thread, bubbles separated by a blank line
pub fn thread_lines(
    state: &ChatState,
    theme: &Theme,
    width: u16,
    dots: &str,
) -> Vec<Line<'static>> {
    let bubble = layout::bubble_width(width).saturating_sub(2).max(1);
    let mut lines = Vec::new();

    for message in &state.messages {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        push_bubble(&mut lines, message, theme, bubble);
    }

    // Typing indicator until the first delta arrives
    if state.reply_phase().shows_typing() {
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(Line::from(vec![
            Span::styled("│ ", Style::default().fg(theme.ai_bubble)),
            Span::styled(
                dots.to_string(),
                Style::default().fg(theme.typing).add_modifier(Modifier::BOLD),
            ),
        ]));
    }

    lines
}

fn push_bubble(lines: &mut Vec<Line<'static>>, message: &Message, theme: &Theme, width: u16) {
    let time = message
        .created_at
        .with_timezone(&Local)
        .format("%H:%M")
        .to_string();

    match message.kind {
        MessageKind::User => {
            let bar = Style::default().fg(theme.user_bubble);
            lines.push(
                Line::from(vec![
                    Span::styled(format!("Você · {}", time), Style::default().fg(theme.muted)),
                    Span::styled(" │", bar),
                ])
                .right_aligned(),
            );
            for row in wrap_text(&message.content, width) {
                lines.push(
                    Line::from(vec![
                        Span::styled(row, Style::default().fg(theme.user_text)),
                        Span::styled(" │", bar),
                    ])
                    .right_aligned(),
                );
            }
            match message.status {
                DeliveryStatus::Failed => lines.push(
                    Line::from(vec![
                        Span::styled(FAILED_HINT, Style::default().fg(theme.failed)),
                        Span::styled(" │", bar),
                    ])
                    .right_aligned(),
                ),
                DeliveryStatus::Pending => lines.push(
                    Line::from(Span::styled("enviando…", Style::default().fg(theme.muted)))
                        .right_aligned(),
                ),
                DeliveryStatus::Sent => {}
            }
        }
        MessageKind::Ai => {
            let bar = Style::default().fg(theme.ai_bubble);
            lines.push(Line::from(vec![
                Span::styled("│ ", bar),
                Span::styled(format!("Luma IA · {}", time), Style::default().fg(theme.muted)),
            ]));
            for row in wrap_text(&message.content, width) {
                lines.push(Line::from(vec![
                    Span::styled("│ ", bar),
                    Span::styled(row, Style::default().fg(theme.ai_text)),
                ]));
            }
            if let Some(tokens) = message.tokens {
                lines.push(Line::from(vec![
                    Span::styled("│ ", bar),
                    Span::styled(
                        format!("{} tokens", tokens),
                        Style::default().fg(theme.muted).add_modifier(Modifier::ITALIC),
                    ),
                ]));
            }
        }
    }
}

/// Word-wrap `text` to `width` display columns
///
/// Newlines are kept; words longer than a row are split.
pub fn wrap_text(text: &str, width: u16) -> Vec<String> {
    let width = width.max(1) as usize;
    let mut rows = Vec::new();

    for paragraph in text.split('\n') {
        let mut row = String::new();
        let mut used = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.width();
            let gap = usize::from(!row.is_empty());

            if used + gap + word_width <= width {
                if gap == 1 {
                    row.push(' ');
                }
                row.push_str(word);
                used += gap + word_width;
                continue;
            }

            if !row.is_empty() {
                rows.push(std::mem::take(&mut row));
                used = 0;
            }

            if word_width <= width {
                row.push_str(word);
                used = word_width;
                continue;
            }

            for c in word.chars() {
                let w = c.width().unwrap_or(0);
                if used + w > width && !row.is_empty() {
                    rows.push(std::mem::take(&mut row));
                    used = 0;
                }
                row.push(c);
                used += w;
            }
        }

        rows.push(row);
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ReplyEvent;
    use crate::model::{Client, Conversation, Role};
    use chrono::Utc;

    fn text(line: &Line) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn ai(content: &str, tokens: Option<u32>) -> Message {
        Message {
            id: "m-ai".into(),
            conversation_id: "c1".into(),
            kind: MessageKind::Ai,
            content: content.into(),
            created_at: Utc::now(),
            tokens,
            status: DeliveryStatus::Sent,
        }
    }

    fn state_with_conversation() -> ChatState {
        let mut state = ChatState::new();
        state.available_users = vec![Client {
            id: "u-ana".into(),
            name: "Ana Souza".into(),
            email: "ana@luma.example".into(),
            role: Role::User,
            office_id: None,
            advisor_id: None,
        }];
        state.selected_user_id = Some("u-ana".into());
        state.current_conversation = Some(Conversation {
            id: "c1".into(),
            client_id: "u-ana".into(),
            title: Some("Cobertura".into()),
            updated_at: Utc::now(),
        });
        state
    }

    #[test]
    fn test_wrap_text() {
        assert_eq!(
            wrap_text("Quais coberturas tenho?", 12),
            vec!["Quais", "coberturas", "tenho?"]
        );
        assert_eq!(wrap_text("abcdefgh", 3), vec!["abc", "def", "gh"]);
        assert_eq!(wrap_text("a\n\nb", 10), vec!["a", "", "b"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn test_bubbles_show_tokens_and_failures() {
        let mut state = state_with_conversation();
        let mut failed = Message::pending_user("c1", "Olá");
        failed.status = DeliveryStatus::Failed;
        state.messages = vec![ai("Oi Ana", Some(12)), failed];

        let lines = thread_lines(&state, &Theme::dark(), 80, "·");
        let rendered: Vec<String> = lines.iter().map(text).collect();

        assert!(rendered.iter().any(|l| l.ends_with("12 tokens")));
        assert!(rendered.iter().any(|l| l.starts_with(FAILED_HINT)));
        let failed_line = lines
            .iter()
            .find(|l| text(l).starts_with(FAILED_HINT))
            .unwrap();
        assert_eq!(failed_line.alignment, Some(Alignment::Right));
    }

    #[test]
    fn test_typing_indicator_only_while_awaiting() {
        let mut state = state_with_conversation();
        state.send_message("Quais coberturas tenho?").unwrap();

        let lines = thread_lines(&state, &Theme::dark(), 80, "···");
        assert_eq!(text(lines.last().unwrap()), "│ ···");

        state.apply_reply("c1", ReplyEvent::Delta("Você tem".into()));
        let lines = thread_lines(&state, &Theme::dark(), 80, "···");
        assert!(!lines.iter().any(|l| text(l).ends_with("···")));
    }

    #[test]
    fn test_scroll_rows_saturate() {
        assert_eq!(scroll_rows(0), 0);
        assert_eq!(scroll_rows(1_200), 1_200);
        assert_eq!(scroll_rows(70_000), u16::MAX);
    }

    #[test]
    fn test_empty_hints() {
        let mut state = ChatState::new();
        assert_eq!(empty_hint(&state), Some("Selecione um cliente para começar"));

        state = state_with_conversation();
        assert!(empty_hint(&state).unwrap().starts_with("Nenhuma mensagem"));

        state.messages.push(ai("Oi", None));
        assert_eq!(empty_hint(&state), None);
    }
}
