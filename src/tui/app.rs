// TUI application state
//
// View-side state only: focus, sidebar, search term, composer draft, thread
// scroll and toasts. Chat state lives in the chat service; App keeps the
// latest snapshot for rendering and queues ChatCommands for the event loop to
// dispatch.

use super::components::Toast;
use super::composer::Composer;
use super::keys::Action;
use super::layout;
use super::scroll::ScrollState;
use super::theme::Theme;
use crate::chat::{ChatCommand, ChatError, ChatSnapshot};
use crate::config::UiConfig;
use crate::logging::LogBuffer;
use crate::model::Conversation;
use std::time::Duration;

/// Panes that receive keyboard input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Focus {
    Clients,
    Search,
    Conversations,
    Thread,
    #[default]
    Composer,
}

impl Focus {
    const ORDER: [Focus; 5] = [
        Focus::Clients,
        Focus::Search,
        Focus::Conversations,
        Focus::Thread,
        Focus::Composer,
    ];

    pub fn in_sidebar(self) -> bool {
        matches!(self, Focus::Clients | Focus::Search | Focus::Conversations)
    }
}

pub struct App {
    /// Latest published chat state
    pub snapshot: ChatSnapshot,

    pub focus: Focus,

    /// Overlay sidebar is showing (narrow terminals only)
    pub sidebar_open: bool,

    /// Terminal width seen by the last draw
    pub width: u16,

    /// Conversation filter typed in the sidebar
    pub search: String,

    pub composer: Composer,
    pub thread_scroll: ScrollState,

    /// Highlighted row in the client list
    pub client_cursor: usize,
    /// Highlighted row in the filtered conversation list
    pub conversation_cursor: usize,

    pub toast: Option<Toast>,
    pub theme: Theme,
    pub log_buffer: LogBuffer,
    pub ui: UiConfig,

    /// Animation frame for the typing indicator
    pub frame: usize,

    pub should_quit: bool,

    /// Commands waiting for the event loop
    outbox: Vec<ChatCommand>,
    seen_errors: u64,
    seen_thread: (Option<String>, usize),
}

impl App {
    pub fn new(snapshot: ChatSnapshot, theme: Theme, log_buffer: LogBuffer, ui: UiConfig) -> Self {
        let seen_errors = snapshot.error_count;
        Self {
            snapshot,
            focus: Focus::default(),
            sidebar_open: false,
            width: 0,
            search: String::new(),
            composer: Composer::new(),
            thread_scroll: ScrollState::new(),
            client_cursor: 0,
            conversation_cursor: 0,
            toast: None,
            theme,
            log_buffer,
            ui,
            frame: 0,
            should_quit: false,
            outbox: Vec::new(),
            seen_errors,
            seen_thread: (None, 0),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Layout
    // ─────────────────────────────────────────────────────────────────────

    pub fn sidebar_is_overlay(&self) -> bool {
        layout::sidebar_is_overlay(self.width)
    }

    pub fn sidebar_visible(&self) -> bool {
        !self.sidebar_is_overlay() || self.sidebar_open
    }

    /// Record the terminal width; focus leaves a sidebar that just hid
    pub fn set_width(&mut self, width: u16) {
        self.width = width;
        if !self.sidebar_visible() && self.focus.in_sidebar() {
            self.focus = Focus::Composer;
        }
    }

    fn close_overlay(&mut self) {
        if self.sidebar_is_overlay() {
            self.sidebar_open = false;
            if self.focus.in_sidebar() {
                self.focus = Focus::Composer;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Snapshots and timers
    // ─────────────────────────────────────────────────────────────────────

    /// Adopt a new snapshot: toast new errors, follow a changed thread
    pub fn apply_snapshot(&mut self, snapshot: ChatSnapshot) {
        if snapshot.error_count > self.seen_errors {
            if let Some(error) = &snapshot.last_error {
                self.show_toast(error.clone());
            }
            self.seen_errors = snapshot.error_count;
        }

        let thread = (
            snapshot.current_conversation.as_ref().map(|c| c.id.clone()),
            snapshot.messages.len(),
        );
        if thread != self.seen_thread {
            self.thread_scroll.scroll_to_bottom();
            self.seen_thread = thread;
        }

        if snapshot.selected_user_id != self.snapshot.selected_user_id {
            if let Some(idx) = snapshot
                .selected_user_id
                .as_deref()
                .and_then(|id| snapshot.available_users.iter().position(|c| c.id == id))
            {
                self.client_cursor = idx;
            }
            self.conversation_cursor = 0;
        }

        self.snapshot = snapshot;
        self.clamp_cursors();
    }

    fn clamp_cursors(&mut self) {
        let clients = self.snapshot.available_users.len();
        self.client_cursor = self.client_cursor.min(clients.saturating_sub(1));
        let conversations = self.visible_conversations().len();
        self.conversation_cursor = self.conversation_cursor.min(conversations.saturating_sub(1));
    }

    pub fn tick(&mut self) {
        self.frame = self.frame.wrapping_add(1);
        if self.toast.as_ref().is_some_and(|t| t.is_expired()) {
            self.toast = None;
        }
    }

    pub fn show_toast(&mut self, message: impl Into<String>) {
        self.toast = Some(Toast::new(
            message,
            Duration::from_secs(self.ui.toast_secs),
        ));
    }

    /// "·", "··", "···" cycling with the tick
    pub fn typing_dots(&self) -> String {
        "·".repeat(self.frame % 3 + 1)
    }

    /// Conversations matching the sidebar search
    pub fn visible_conversations(&self) -> Vec<&Conversation> {
        self.snapshot.filtered_conversations(&self.search)
    }

    /// Drain commands queued by input handling
    pub fn take_commands(&mut self) -> Vec<ChatCommand> {
        std::mem::take(&mut self.outbox)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Input
    // ─────────────────────────────────────────────────────────────────────

    /// Apply an action: global shortcuts first, then the focused pane
    pub fn handle_action(&mut self, action: Action) {
        match action {
            Action::Quit => self.should_quit = true,
            Action::ToggleSidebar => {
                if self.sidebar_is_overlay() {
                    self.sidebar_open = !self.sidebar_open;
                    self.focus = if self.sidebar_open {
                        Focus::Clients
                    } else {
                        Focus::Composer
                    };
                }
            }
            Action::NewConversation => {
                self.outbox.push(ChatCommand::NewConversation);
                self.close_overlay();
                self.focus = Focus::Composer;
            }
            Action::Retry => self.outbox.push(ChatCommand::RetryFailed),
            Action::FocusNext => self.cycle_focus(1),
            Action::FocusPrev => self.cycle_focus(-1),
            Action::Escape => self.escape(),
            _ => match self.focus {
                Focus::Clients => self.clients_action(action),
                Focus::Search => self.search_action(action),
                Focus::Conversations => self.conversations_action(action),
                Focus::Thread => self.thread_action(action),
                Focus::Composer => self.composer_action(action),
            },
        }
    }

    fn cycle_focus(&mut self, step: isize) {
        let order: Vec<Focus> = Focus::ORDER
            .into_iter()
            .filter(|f| self.sidebar_visible() || !f.in_sidebar())
            .collect();
        let len = order.len() as isize;
        let current = order.iter().position(|f| *f == self.focus).unwrap_or(0) as isize;
        self.focus = order[(current + step).rem_euclid(len) as usize];
    }

    fn escape(&mut self) {
        if self.focus == Focus::Search && !self.search.is_empty() {
            self.search.clear();
            self.conversation_cursor = 0;
        } else if self.sidebar_is_overlay() && self.sidebar_open {
            self.close_overlay();
        } else if self.toast.is_some() || self.snapshot.last_error.is_some() {
            self.toast = None;
            self.outbox.push(ChatCommand::DismissError);
        }
    }

    fn clients_action(&mut self, action: Action) {
        let count = self.snapshot.available_users.len();
        match action {
            Action::Up => self.client_cursor = self.client_cursor.saturating_sub(1),
            Action::Down if self.client_cursor + 1 < count => self.client_cursor += 1,
            Action::Home => self.client_cursor = 0,
            Action::End => self.client_cursor = count.saturating_sub(1),
            Action::Confirm => {
                if let Some(client) = self.snapshot.available_users.get(self.client_cursor) {
                    self.outbox.push(ChatCommand::ChangeUser(client.id.clone()));
                    self.conversation_cursor = 0;
                    if self.sidebar_is_overlay() {
                        self.close_overlay();
                    } else {
                        self.focus = Focus::Conversations;
                    }
                }
            }
            _ => {}
        }
    }

    fn search_action(&mut self, action: Action) {
        match action {
            Action::Insert(c) => {
                self.search.push(c);
                self.conversation_cursor = 0;
            }
            Action::Backspace => {
                self.search.pop();
                self.conversation_cursor = 0;
            }
            Action::Down | Action::Confirm => self.focus = Focus::Conversations,
            Action::Up => self.focus = Focus::Clients,
            _ => {}
        }
    }

    fn conversations_action(&mut self, action: Action) {
        let count = self.visible_conversations().len();
        match action {
            Action::Up if self.conversation_cursor == 0 => self.focus = Focus::Search,
            Action::Up => self.conversation_cursor -= 1,
            Action::Down if self.conversation_cursor + 1 < count => self.conversation_cursor += 1,
            Action::Home => self.conversation_cursor = 0,
            Action::End => self.conversation_cursor = count.saturating_sub(1),
            Action::Confirm => {
                let picked = self
                    .visible_conversations()
                    .get(self.conversation_cursor)
                    .map(|c| c.id.clone());
                if let Some(id) = picked {
                    self.outbox.push(ChatCommand::SelectConversation(id));
                    self.close_overlay();
                    self.focus = Focus::Composer;
                }
            }
            _ => {}
        }
    }

    fn thread_action(&mut self, action: Action) {
        match action {
            Action::Up => self.thread_scroll.scroll_up(),
            Action::Down => self.thread_scroll.scroll_down(),
            Action::PageUp => self.thread_scroll.page_up(),
            Action::PageDown => self.thread_scroll.page_down(),
            Action::Home => self.thread_scroll.scroll_to_top(),
            Action::End => self.thread_scroll.scroll_to_bottom(),
            Action::Confirm | Action::Insert(_) => {
                self.focus = Focus::Composer;
                self.composer_action(action);
            }
            _ => {}
        }
    }

    fn composer_action(&mut self, action: Action) {
        match action {
            Action::Confirm => self.submit(),
            Action::InsertNewline => self.composer.newline(),
            Action::Insert(c) => self.composer.insert(c),
            Action::Backspace => self.composer.backspace(),
            Action::Delete => self.composer.delete(),
            Action::Left => self.composer.move_left(),
            Action::Right => self.composer.move_right(),
            Action::Home => self.composer.home(),
            Action::End => self.composer.end(),
            Action::Up => self.thread_scroll.scroll_up(),
            Action::Down => self.thread_scroll.scroll_down(),
            Action::PageUp => self.thread_scroll.page_up(),
            Action::PageDown => self.thread_scroll.page_down(),
            _ => {}
        }
    }

    /// Send the draft if the chat can take it
    ///
    /// While a reply streams the composer is disabled and Enter does
    /// nothing; the draft is kept.
    fn submit(&mut self) {
        if self.composer.is_blank() {
            return;
        }
        if self.snapshot.selected_user_id.is_none() {
            self.show_toast(ChatError::NoClientSelected.to_string());
            return;
        }
        if self.snapshot.can_send(self.composer.text()) {
            let text = self.composer.take();
            self.outbox.push(ChatCommand::SendMessage(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatState;
    use crate::model::{Client, Role};
    use chrono::Utc;

    fn client(id: &str, name: &str) -> Client {
        Client {
            id: id.into(),
            name: name.into(),
            email: format!("{}@luma.example", id),
            role: Role::User,
            office_id: None,
            advisor_id: None,
        }
    }

    fn conversation(id: &str, title: &str) -> Conversation {
        Conversation {
            id: id.into(),
            client_id: "u-ana".into(),
            title: Some(title.into()),
            updated_at: Utc::now(),
        }
    }

    fn state_with_ana() -> ChatState {
        let mut state = ChatState::new();
        state.available_users = vec![client("u-ana", "Ana Souza"), client("u-bruno", "Bruno Lima")];
        state.selected_user_id = Some("u-ana".into());
        state.conversations = vec![
            conversation("c1", "Seguro auto"),
            conversation("c2", "Sinistro residencial"),
        ];
        state
    }

    fn app(state: ChatState, width: u16) -> App {
        let mut app = App::new(
            state.into(),
            Theme::dark(),
            LogBuffer::new(),
            UiConfig::default(),
        );
        app.set_width(width);
        app
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_action(Action::Insert(c));
        }
    }

    #[test]
    fn test_enter_sends_and_clears_draft() {
        let mut app = app(state_with_ana(), 120);
        type_text(&mut app, "Quais coberturas tenho?");
        app.handle_action(Action::InsertNewline);
        type_text(&mut app, "Obrigada");
        app.handle_action(Action::Confirm);

        assert_eq!(
            app.take_commands(),
            vec![ChatCommand::SendMessage(
                "Quais coberturas tenho?\nObrigada".into()
            )]
        );
        assert!(app.composer.is_blank());
    }

    #[test]
    fn test_send_without_client_keeps_draft() {
        let mut state = state_with_ana();
        state.selected_user_id = None;
        let mut app = app(state, 120);
        type_text(&mut app, "Olá");
        app.handle_action(Action::Confirm);

        assert!(app.take_commands().is_empty());
        assert_eq!(app.composer.text(), "Olá");
        assert!(app.toast.is_some());
    }

    #[test]
    fn test_blank_draft_is_not_sent() {
        let mut app = app(state_with_ana(), 120);
        type_text(&mut app, "   ");
        app.handle_action(Action::Confirm);
        assert!(app.take_commands().is_empty());
    }

    #[test]
    fn test_narrow_sidebar_is_an_overlay() {
        let mut app = app(state_with_ana(), 80);
        assert!(!app.sidebar_visible());

        // Only thread and composer take focus while it is hidden
        app.handle_action(Action::FocusNext);
        assert_eq!(app.focus, Focus::Thread);
        app.handle_action(Action::FocusNext);
        assert_eq!(app.focus, Focus::Composer);

        app.handle_action(Action::ToggleSidebar);
        assert!(app.sidebar_visible());
        assert_eq!(app.focus, Focus::Clients);

        // Picking a client closes it
        app.handle_action(Action::Down);
        app.handle_action(Action::Confirm);
        assert_eq!(
            app.take_commands(),
            vec![ChatCommand::ChangeUser("u-bruno".into())]
        );
        assert!(!app.sidebar_visible());
        assert_eq!(app.focus, Focus::Composer);
    }

    #[test]
    fn test_wide_sidebar_stays_docked() {
        let mut app = app(state_with_ana(), 120);
        app.handle_action(Action::ToggleSidebar);
        assert!(app.sidebar_visible());

        app.focus = Focus::Clients;
        app.handle_action(Action::Confirm);
        assert_eq!(app.focus, Focus::Conversations);
        assert!(app.sidebar_visible());
    }

    #[test]
    fn test_search_filters_and_selects() {
        let mut app = app(state_with_ana(), 120);
        app.focus = Focus::Search;
        type_text(&mut app, "sinistro");
        assert_eq!(app.visible_conversations().len(), 1);

        app.handle_action(Action::Confirm);
        assert_eq!(app.focus, Focus::Conversations);
        app.handle_action(Action::Confirm);
        assert_eq!(
            app.take_commands(),
            vec![ChatCommand::SelectConversation("c2".into())]
        );

        app.focus = Focus::Search;
        app.handle_action(Action::Escape);
        assert!(app.search.is_empty());
    }

    #[test]
    fn test_new_errors_raise_a_toast_once() {
        let mut app = app(state_with_ana(), 120);
        let mut state = state_with_ana();
        state.surface_error("Falha ao carregar conversas");
        app.apply_snapshot(state.clone().into());
        assert_eq!(
            app.toast.as_ref().map(|t| t.message.as_str()),
            Some("Falha ao carregar conversas")
        );

        app.toast = None;
        app.apply_snapshot(state.into());
        assert!(app.toast.is_none());
    }

    #[test]
    fn test_changed_thread_resumes_follow() {
        let mut app = app(state_with_ana(), 120);
        app.thread_scroll.update_dimensions(40, 10);
        app.thread_scroll.scroll_up();
        assert!(!app.thread_scroll.auto_follow);

        let mut state = state_with_ana();
        state.current_conversation = Some(conversation("c1", "Seguro auto"));
        app.apply_snapshot(state.into());
        assert!(app.thread_scroll.auto_follow);
    }

    #[test]
    fn test_shortcuts_queue_commands() {
        let mut app = app(state_with_ana(), 120);
        app.handle_action(Action::NewConversation);
        app.handle_action(Action::Retry);
        assert_eq!(
            app.take_commands(),
            vec![ChatCommand::NewConversation, ChatCommand::RetryFailed]
        );
        app.handle_action(Action::Quit);
        assert!(app.should_quit);
    }
}
