//! Key event normalization.
//!
//! Collapses the many ways a platform names a key into the handful of
//! tokens the session buffer understands. Unknown keys never fail; they
//! degrade to [`KeyToken::Other`].

use crate::collector::types::KeyIdentity;
use serde::{Deserialize, Serialize};

/// A normalized key press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyToken {
    /// A printable (or control) character payload
    Character(char),
    Space,
    Enter,
    Tab,
    Backspace,
    /// Any other named key, e.g. "shift" or "left"
    Other(String),
}

impl KeyToken {
    /// Whether accepting this token closes a word.
    pub fn is_word_boundary(&self) -> bool {
        matches!(
            self,
            KeyToken::Space | KeyToken::Character('\n') | KeyToken::Character('\r')
        )
    }
}

/// Normalize a raw key identity.
pub fn normalize(key: &KeyIdentity) -> KeyToken {
    match key {
        KeyIdentity::Char(' ') => KeyToken::Space,
        KeyIdentity::Char(c) => KeyToken::Character(*c),
        KeyIdentity::Named(name) => normalize_name(name),
    }
}

fn normalize_name(name: &str) -> KeyToken {
    match name.to_ascii_lowercase().as_str() {
        "space" => KeyToken::Space,
        "backspace" => KeyToken::Backspace,
        "enter" | "return" | "kp_enter" => KeyToken::Enter,
        "tab" => KeyToken::Tab,
        other => KeyToken::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_printable_characters() {
        assert_eq!(normalize(&KeyIdentity::Char('a')), KeyToken::Character('a'));
        assert_eq!(normalize(&KeyIdentity::Char('\r')), KeyToken::Character('\r'));
        assert_eq!(normalize(&KeyIdentity::Char(' ')), KeyToken::Space);
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(normalize(&KeyIdentity::named("space")), KeyToken::Space);
        assert_eq!(normalize(&KeyIdentity::named("backspace")), KeyToken::Backspace);
        assert_eq!(normalize(&KeyIdentity::named("enter")), KeyToken::Enter);
        assert_eq!(normalize(&KeyIdentity::named("Return")), KeyToken::Enter);
        assert_eq!(normalize(&KeyIdentity::named("tab")), KeyToken::Tab);
    }

    #[test]
    fn test_unknown_keys_degrade_to_other() {
        assert_eq!(
            normalize(&KeyIdentity::named("shift")),
            KeyToken::Other("shift".to_string())
        );
        // Raw names that bypassed KeyIdentity::named are still folded
        assert_eq!(
            normalize(&KeyIdentity::Named("F13".to_string())),
            KeyToken::Other("f13".to_string())
        );
    }

    #[test]
    fn test_forward_delete_is_not_backspace() {
        assert_eq!(
            normalize(&KeyIdentity::named("delete")),
            KeyToken::Other("delete".to_string())
        );
        assert_eq!(
            normalize(&KeyIdentity::named("forward_delete")),
            KeyToken::Other("forward_delete".to_string())
        );
    }

    #[test]
    fn test_word_boundaries() {
        assert!(KeyToken::Space.is_word_boundary());
        assert!(KeyToken::Character('\n').is_word_boundary());
        assert!(KeyToken::Character('\r').is_word_boundary());
        assert!(!KeyToken::Character('a').is_word_boundary());
        assert!(!KeyToken::Enter.is_word_boundary());
        assert!(!KeyToken::Backspace.is_word_boundary());
    }
}
