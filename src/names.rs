//! Human-readable game IDs

const NAME_WORDS: u8 = 5;
const SEPARATOR: &str = "-";

/// Produces candidate game IDs. Uniqueness is checked by the caller.
pub trait NameSource: Send + Sync {
    fn candidate(&self) -> String;
}

/// Friendly hyphenated names like "calmly-brave-gentle-fox-otter"
#[derive(Debug, Default, Clone, Copy)]
pub struct PetNames;

impl NameSource for PetNames {
    fn candidate(&self) -> String {
        // Only None when the word lists are empty
        petname::petname(NAME_WORDS, SEPARATOR)
            .unwrap_or_else(|| ulid::Ulid::new().to_string().to_lowercase())
    }
}

/// Whether a string has the shape of a generated game ID
pub fn looks_like_game_id(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= 128
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-')
}
