// Key mapping
//
// Translates crossterm key events into chat actions. Mapping is pure so the
// bindings can be tested without a terminal; what an action means depends on
// the focused pane and is decided in App::handle_action.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    /// Enter: send in the composer, pick in a list
    Confirm,
    InsertNewline,
    Insert(char),
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    PageUp,
    PageDown,
    FocusNext,
    FocusPrev,
    NewConversation,
    Retry,
    ToggleSidebar,
    Escape,
}

/// Map a key event to an action; `None` for releases and unbound keys
pub fn map_key(key: KeyEvent) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    let action = match key.code {
        // Shift+Enter needs the kitty keyboard protocol; Alt+Enter and
        // Ctrl+J work everywhere else
        KeyCode::Enter if shift || alt => Action::InsertNewline,
        KeyCode::Enter => Action::Confirm,
        KeyCode::Char('j') if ctrl => Action::InsertNewline,

        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => Action::Quit,
        KeyCode::Char('n') if ctrl => Action::NewConversation,
        KeyCode::Char('r') if ctrl => Action::Retry,
        KeyCode::Char('b') if ctrl => Action::ToggleSidebar,
        KeyCode::Char(_) if ctrl => return None,
        KeyCode::Char(c) => Action::Insert(c),

        KeyCode::Tab if shift => Action::FocusPrev,
        KeyCode::Tab => Action::FocusNext,
        KeyCode::BackTab => Action::FocusPrev,
        KeyCode::Esc => Action::Escape,

        KeyCode::Backspace => Action::Backspace,
        KeyCode::Delete => Action::Delete,
        KeyCode::Left => Action::Left,
        KeyCode::Right => Action::Right,
        KeyCode::Up => Action::Up,
        KeyCode::Down => Action::Down,
        KeyCode::Home => Action::Home,
        KeyCode::End => Action::End,
        KeyCode::PageUp => Action::PageUp,
        KeyCode::PageDown => Action::PageDown,
        _ => return None,
    };

    Some(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_enter_submits_and_shift_enter_breaks_line() {
        let typed: Vec<Action> = "Quais coberturas tenho?"
            .chars()
            .filter_map(|c| map_key(key(KeyCode::Char(c), KeyModifiers::NONE)))
            .collect();
        assert_eq!(typed.len(), 23);
        assert_eq!(typed[0], Action::Insert('Q'));

        assert_eq!(
            map_key(key(KeyCode::Enter, KeyModifiers::NONE)),
            Some(Action::Confirm)
        );
        assert_eq!(
            map_key(key(KeyCode::Enter, KeyModifiers::SHIFT)),
            Some(Action::InsertNewline)
        );
        assert_eq!(
            map_key(key(KeyCode::Enter, KeyModifiers::ALT)),
            Some(Action::InsertNewline)
        );
        assert_eq!(
            map_key(key(KeyCode::Char('j'), KeyModifiers::CONTROL)),
            Some(Action::InsertNewline)
        );
    }

    #[test]
    fn test_control_shortcuts() {
        let ctrl = |c| map_key(key(KeyCode::Char(c), KeyModifiers::CONTROL));
        assert_eq!(ctrl('c'), Some(Action::Quit));
        assert_eq!(ctrl('q'), Some(Action::Quit));
        assert_eq!(ctrl('n'), Some(Action::NewConversation));
        assert_eq!(ctrl('r'), Some(Action::Retry));
        assert_eq!(ctrl('b'), Some(Action::ToggleSidebar));
        assert_eq!(ctrl('x'), None);
    }

    #[test]
    fn test_focus_cycling_keys() {
        assert_eq!(
            map_key(key(KeyCode::Tab, KeyModifiers::NONE)),
            Some(Action::FocusNext)
        );
        assert_eq!(
            map_key(key(KeyCode::BackTab, KeyModifiers::SHIFT)),
            Some(Action::FocusPrev)
        );
    }

    #[test]
    fn test_release_is_ignored() {
        let mut release = key(KeyCode::Enter, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(map_key(release), None);
    }
}
