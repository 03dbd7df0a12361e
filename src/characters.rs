//! Well-known character sets that a grammar can refer to by name.

use hashbrown::HashMap;
use lazy_static::lazy_static;

use crate::error::{Error, Result};

/// Name of the set of all characters.
pub const ANY: &str = "ANY";

/// Name of the pseudo character marking the end of input.
pub const EOI: &str = "EOI";

/// Accepted alias for [`EOI`].
pub const EOF: &str = "EOF";

lazy_static! {
    static ref NAMED: HashMap<&'static str, char> = {
        let mut named = HashMap::new();
        for (idx, name) in [
            "NUL", "SOH", "STX", "ETX", "EOT", "ENQ", "ACK", "BEL", "BS", "TAB", "LF", "VT", "FF",
            "CR", "SO", "SI", "DLE", "DC1", "DC2", "DC3", "DC4", "NAK", "SYN", "ETB", "CAN", "EM",
            "SUB", "ESC", "FS", "GS", "RS", "US",
        ]
        .into_iter()
        .enumerate()
        {
            // C0 control characters are numbered by their position
            named.insert(name, char::from(idx as u8));
        }
        named.insert("SPACE", ' ');
        named.insert("DEL", '\u{7f}');
        named
    };
}

/// What a named character set resolves to during generation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WellKnown {
    /// A set containing exactly one character.
    Single(char),

    /// Every valid character.
    Any,

    /// The end of input, which cannot be generated.
    EndOfInput,
}

/// Look up the well-known set with the given name.
pub fn resolve(name: &str) -> Result<WellKnown> {
    if let Some(&c) = NAMED.get(name) {
        return Ok(WellKnown::Single(c));
    }
    match name {
        ANY => Ok(WellKnown::Any),
        EOI | EOF => Ok(WellKnown::EndOfInput),
        _ => Err(Error::UnsupportedCharacterSet(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_characters_use_their_ascii_values() {
        assert_eq!(resolve("NUL").unwrap(), WellKnown::Single('\0'));
        assert_eq!(resolve("TAB").unwrap(), WellKnown::Single('\t'));
        assert_eq!(resolve("LF").unwrap(), WellKnown::Single('\n'));
        assert_eq!(resolve("FF").unwrap(), WellKnown::Single('\u{0c}'));
        assert_eq!(resolve("CR").unwrap(), WellKnown::Single('\r'));
        assert_eq!(resolve("US").unwrap(), WellKnown::Single('\u{1f}'));
        assert_eq!(resolve("SPACE").unwrap(), WellKnown::Single(' '));
        assert_eq!(resolve("DEL").unwrap(), WellKnown::Single('\u{7f}'));
    }

    #[test]
    fn special_sets() {
        assert_eq!(resolve("ANY").unwrap(), WellKnown::Any);
        assert_eq!(resolve("EOI").unwrap(), WellKnown::EndOfInput);
        assert_eq!(resolve("EOF").unwrap(), WellKnown::EndOfInput);
        assert!(matches!(
            resolve("ID_Start"),
            Err(Error::UnsupportedCharacterSet(name)) if name == "ID_Start"
        ));
    }
}
