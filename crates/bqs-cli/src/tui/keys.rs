//! Keybinding definitions for the browser.

use super::state::Mode;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    MoveUp,
    MoveDown,
    Top,
    Bottom,
    Select,
    Back,
    ToggleExpand,
    OpenSearch,
    Refresh,
    Export,
    Help,
    SearchChar(char),
    SearchBackspace,
    SearchAccept,
    SearchCancel,
    /// First half of a `gg` sequence.
    PendingG,
    None,
}

/// Map a key event to an action.
///
/// `last_key` carries the pending first key of vim-style sequences (`gg`).
pub fn map_key(event: KeyEvent, mode: Mode, last_key: Option<char>) -> KeyAction {
    let KeyEvent {
        code, modifiers, ..
    } = event;

    if modifiers.contains(KeyModifiers::CONTROL) {
        return match code {
            KeyCode::Char('c') => KeyAction::Quit,
            _ => KeyAction::None,
        };
    }

    match mode {
        Mode::Search => match code {
            KeyCode::Esc => KeyAction::SearchCancel,
            KeyCode::Enter => KeyAction::SearchAccept,
            KeyCode::Backspace => KeyAction::SearchBackspace,
            KeyCode::Up => KeyAction::MoveUp,
            KeyCode::Down => KeyAction::MoveDown,
            KeyCode::Char(c) => KeyAction::SearchChar(c),
            _ => KeyAction::None,
        },
        Mode::Normal => match code {
            KeyCode::Char('q') => KeyAction::Quit,
            KeyCode::Char('j') | KeyCode::Down => KeyAction::MoveDown,
            KeyCode::Char('k') | KeyCode::Up => KeyAction::MoveUp,
            KeyCode::Char('g') => {
                if last_key == Some('g') {
                    KeyAction::Top
                } else {
                    KeyAction::PendingG
                }
            }
            KeyCode::Char('G') => KeyAction::Bottom,
            KeyCode::Enter => KeyAction::Select,
            KeyCode::Esc => KeyAction::Back,
            KeyCode::Tab => KeyAction::ToggleExpand,
            KeyCode::Char('/') => KeyAction::OpenSearch,
            KeyCode::Char('r') => KeyAction::Refresh,
            KeyCode::Char('c') => KeyAction::Export,
            KeyCode::Char('?') => KeyAction::Help,
            _ => KeyAction::None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_quit_from_normal_mode() {
        assert_eq!(
            map_key(key(KeyCode::Char('q')), Mode::Normal, None),
            KeyAction::Quit
        );
    }

    #[test]
    fn test_escape_in_search_cancels_without_quitting() {
        assert_eq!(
            map_key(key(KeyCode::Esc), Mode::Search, None),
            KeyAction::SearchCancel
        );
        // Plain characters feed the query, including 'q'.
        assert_eq!(
            map_key(key(KeyCode::Char('q')), Mode::Search, None),
            KeyAction::SearchChar('q')
        );
    }

    #[test]
    fn test_gg_sequence() {
        assert_eq!(
            map_key(key(KeyCode::Char('g')), Mode::Normal, None),
            KeyAction::PendingG
        );
        assert_eq!(
            map_key(key(KeyCode::Char('g')), Mode::Normal, Some('g')),
            KeyAction::Top
        );
        assert_eq!(
            map_key(key(KeyCode::Char('G')), Mode::Normal, None),
            KeyAction::Bottom
        );
    }

    #[test]
    fn test_vim_navigation() {
        assert_eq!(
            map_key(key(KeyCode::Char('j')), Mode::Normal, None),
            KeyAction::MoveDown
        );
        assert_eq!(
            map_key(key(KeyCode::Char('k')), Mode::Normal, None),
            KeyAction::MoveUp
        );
        assert_eq!(
            map_key(key(KeyCode::Down), Mode::Normal, None),
            KeyAction::MoveDown
        );
    }

    #[test]
    fn test_ctrl_c_quits_in_any_mode() {
        let event = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(event, Mode::Normal, None), KeyAction::Quit);
        assert_eq!(map_key(event, Mode::Search, None), KeyAction::Quit);
    }
}
