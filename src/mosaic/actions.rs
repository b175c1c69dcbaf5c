use std::fmt;

use super::sequencer::Key;

/// Discrete control actions accepted by the photo system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    StartFormation,
    StartFadeCycles,
    StartScatter,
    ReturnToFormation,
    /// Floating plus fade cycles; manual mode only.
    StartBothEffects,
    /// Scatter/reform alternation; manual mode only.
    StartCycling,
    StopAll,
    Reset,
    Clear,
    ToggleLogo,
    ToggleStatus,
}

impl Action {
    /// Map an input token (a key press or a stdin word) to an action.
    pub fn from_token(token: &str) -> Option<Self> {
        let token = token.trim();
        if let Some(key) = Key::from_token(token) {
            return Some(key.into());
        }
        let action = match token {
            "5" => Self::StartBothEffects,
            "6" => Self::StartCycling,
            "0" => Self::StopAll,
            "r" | "R" => Self::Reset,
            "c" | "C" => Self::Clear,
            "h" | "H" => Self::ToggleLogo,
            "`" => Self::ToggleStatus,
            _ => return None,
        };
        Some(action)
    }

    /// The sequencer key this action is gated by, if any.
    pub fn sequence_key(self) -> Option<Key> {
        match self {
            Self::StartFormation => Some(Key::One),
            Self::StartFadeCycles => Some(Key::Two),
            Self::StartScatter => Some(Key::Three),
            Self::ReturnToFormation => Some(Key::Four),
            _ => None,
        }
    }

    pub fn is_manual_only(self) -> bool {
        matches!(self, Self::StartBothEffects | Self::StartCycling)
    }
}

impl From<Key> for Action {
    fn from(key: Key) -> Self {
        match key {
            Key::One => Self::StartFormation,
            Key::Two => Self::StartFadeCycles,
            Key::Three => Self::StartScatter,
            Key::Four => Self::ReturnToFormation,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StartFormation => "start formation",
            Self::StartFadeCycles => "start fade cycles",
            Self::StartScatter => "start scatter",
            Self::ReturnToFormation => "return to formation",
            Self::StartBothEffects => "start both effects",
            Self::StartCycling => "start cycling",
            Self::StopAll => "stop all",
            Self::Reset => "reset",
            Self::Clear => "clear",
            Self::ToggleLogo => "toggle logo",
            Self::ToggleStatus => "toggle status",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_tokens_map_to_sequenced_actions() {
        for (token, key) in [("1", Key::One), ("2", Key::Two), ("3", Key::Three), ("4", Key::Four)] {
            let action = Action::from_token(token).unwrap();
            assert_eq!(action.sequence_key(), Some(key));
        }
    }

    #[test]
    fn control_tokens_bypass_the_sequencer() {
        for token in ["0", "r", "C", "h", "`"] {
            let action = Action::from_token(token).unwrap();
            assert_eq!(action.sequence_key(), None);
            assert!(!action.is_manual_only());
        }
        assert!(Action::from_token("5").unwrap().is_manual_only());
        assert_eq!(Action::from_token("x"), None);
    }

    #[test]
    fn key_tokens_parse_to_the_action_they_gate() {
        for key in [Key::One, Key::Two, Key::Three, Key::Four] {
            let action = Action::from_token(&format!(" {key}\n")).unwrap();
            assert_eq!(action, Action::from(key));
            assert_eq!(action.sequence_key(), Some(key));
        }
    }
}
