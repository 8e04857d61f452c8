//! Archive open modes.

use std::fmt;
use thiserror::Error;

/// Mode an archive is opened in, recorded on the handle at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// `a`: add entries to an existing archive
    Append,
    /// `w`: build a new archive
    Write,
    /// `r`: read an existing archive
    Read,
    /// `d`: remove entries from an existing archive
    Delete,
}

impl Mode {
    pub fn as_char(self) -> char {
        match self {
            Mode::Append => 'a',
            Mode::Write => 'w',
            Mode::Read => 'r',
            Mode::Delete => 'd',
        }
    }

    /// Whether entries can be opened for writing in this mode.
    pub fn is_writing(self) -> bool {
        matches!(self, Mode::Append | Mode::Write)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("invalid 'mode': NULL")]
    Empty,
    #[error("invalid 'mode': {0}")]
    Unknown(String),
}

/// Validate a mode designator.
///
/// Exactly one of `a`, `w`, `r`, `d`; matching is case-sensitive and the
/// input is not trimmed.
pub fn check_mode(mode: &str) -> Result<Mode, ModeError> {
    match mode {
        "" => Err(ModeError::Empty),
        "a" => Ok(Mode::Append),
        "w" => Ok(Mode::Write),
        "r" => Ok(Mode::Read),
        "d" => Ok(Mode::Delete),
        other => Err(ModeError::Unknown(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_accepts_the_four_modes() {
        for (text, mode) in [
            ("a", Mode::Append),
            ("w", Mode::Write),
            ("r", Mode::Read),
            ("d", Mode::Delete),
        ] {
            assert_eq!(check_mode(text), Ok(mode));
            assert_eq!(mode.to_string(), text);
        }
    }

    #[test]
    fn test_empty_mode_has_its_own_message() {
        assert_eq!(check_mode(""), Err(ModeError::Empty));
        assert_eq!(ModeError::Empty.to_string(), "invalid 'mode': NULL");
    }

    #[test]
    fn test_no_normalization() {
        for text in ["R", "W", " r", "r ", "rw", "ww", "\0"] {
            assert_eq!(
                check_mode(text),
                Err(ModeError::Unknown(text.to_string())),
                "{text:?} should be rejected"
            );
        }
        assert_eq!(
            check_mode("rb").unwrap_err().to_string(),
            "invalid 'mode': rb"
        );
    }

    proptest! {
        #[test]
        fn prop_only_four_strings_are_valid(text in ".{0,4}") {
            let valid = matches!(text.as_str(), "a" | "w" | "r" | "d");
            prop_assert_eq!(check_mode(&text).is_ok(), valid);
        }
    }
}
