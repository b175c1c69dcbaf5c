use std::fmt;

use serde::Serialize;

use crate::error::Error;

/// One of the four sequenced input tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Key {
    One,
    Two,
    Three,
    Four,
}

impl Key {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "1" => Some(Self::One),
            "2" => Some(Self::Two),
            "3" => Some(Self::Three),
            "4" => Some(Self::Four),
            _ => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::One => "1",
            Self::Two => "2",
            Self::Three => "3",
            Self::Four => "4",
        };
        f.write_str(token)
    }
}

const FIRST_SEQUENCE: [Key; 4] = [Key::One, Key::Two, Key::Three, Key::Four];
const REPEAT_SEQUENCE: [Key; 4] = [Key::Four, Key::Two, Key::Three, Key::Four];

/// Finite-state gate over the two fixed key sequences.
///
/// Sequence 1 runs once; after its last key the gate loops through
/// sequence 2 indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Sequencer {
    enabled: bool,
    sequence: u8,
    step: u8,
}

impl Sequencer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            sequence: 1,
            step: 1,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current `(sequence, step)`, both 1-based.
    pub fn position(&self) -> (u8, u8) {
        (self.sequence, self.step)
    }

    pub fn next_expected(&self) -> Key {
        let table = if self.sequence == 1 {
            &FIRST_SEQUENCE
        } else {
            &REPEAT_SEQUENCE
        };
        table[usize::from(self.step - 1)]
    }

    /// Check `key` without changing state.
    pub fn check(&self, key: Key) -> Result<(), Error> {
        if !self.enabled {
            return Ok(());
        }
        let expected = self.next_expected();
        if key == expected {
            Ok(())
        } else {
            Err(Error::InvalidSequenceInput { expected, got: key })
        }
    }

    /// Check `key` and move to the next step when it matches.
    pub fn accept(&mut self, key: Key) -> Result<(), Error> {
        self.check(key)?;
        if self.enabled {
            self.advance();
        }
        Ok(())
    }

    pub fn reset(&mut self) {
        self.sequence = 1;
        self.step = 1;
    }

    fn advance(&mut self) {
        if self.step == 4 {
            self.sequence = 2;
            self.step = 1;
        } else {
            self.step += 1;
        }
    }
}
