//! Parse and decode `*.index` files.
//!
//! Each dictionary file (`*.dict.dz)`) is accompanied by a `*.index` file containing a list of
//! words, together with its (byte) position in the dict file and its (byte) length. This module
//! provides functions to parse single lines of this index file.
//!
//! The position and the length of a definition is given in a semi-base64 encoding. It uses all
//! Latin letters (upper and lower case), all digits and additionally, `+` and `/`:
//!
//! `ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/`
//!
//! The calculation works as follows: `sum += x * 64^i`
//!
//! - `i` is the position within the string to calculate the number from and counts from right to
//!   left, starting at 0.
//! - `x` is the index within the array given above, i.e. `'a' == 26`.
//!
//! The sum makes up the index.

use std::cmp::Ordering;

use serde::{Serialize, Deserialize};

use super::errors::{DictError, EntryError};

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// Headword prefixes of the metadata entries written by `dictfmt`.
///
/// The dashes are dropped when the dictionary wasn't built with `--allchars`.
pub const METADATA_PREFIXES: [&str; 2] = ["00-database-", "00database"];
/// Headword holding the short name of a dictionary.
pub const SHORT_NAME_HEADWORD: &str = "00-database-short";
const ALL_CHARS_HEADWORD: &str = "00-database-allchars";
const CASE_SENSITIVE_HEADWORDS: [&str; 2] = ["00-database-case-sensitive", "00databasecasesensitive"];

/// One line of the index.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub headword: String,
    pub offset: u64,
    pub length: u32,
    /// Headword before normalization, from the optional fourth column.
    pub original: Option<String>,
}

impl IndexEntry {
    /// The word as it should be shown to a reader.
    pub fn display_word(&self) -> &str {
        self.original.as_deref().unwrap_or(&self.headword)
    }
}

/// The order in which an index is sorted.
///
/// Settings correspond to options detailed in `dictfmt`: unless `all_chars` is set only
/// alphanumeric characters and whitespace are compared, and unless `case_sensitive` is set
/// characters are compared lowercased.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Collation {
    pub all_chars: bool,
    pub case_sensitive: bool,
}

impl Collation {
    /// Record the flags announced by a metadata headword.
    pub fn observe(&mut self, headword: &str) {
        if headword == ALL_CHARS_HEADWORD {
            self.all_chars = true;
        } else if CASE_SENSITIVE_HEADWORDS.contains(&headword) {
            self.case_sensitive = true;
        }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        let all_chars = self.all_chars;
        let keep = move |c: &char| all_chars || c.is_alphanumeric() || c.is_whitespace();
        if self.case_sensitive {
            a.chars().filter(keep).cmp(b.chars().filter(keep))
        } else {
            a.chars().filter(keep).flat_map(char::to_lowercase)
             .cmp(b.chars().filter(keep).flat_map(char::to_lowercase))
        }
    }

    #[inline]
    pub fn matches(&self, a: &str, b: &str) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

pub fn is_metadata(headword: &str) -> bool {
    METADATA_PREFIXES.iter().any(|prefix| headword.starts_with(prefix))
}

/// Get the assigned number for a character.
#[inline]
fn get_base(input: char) -> Option<u64> {
    match input {
        'A' ..= 'Z' => Some((input as u64) - 65), // 'A' should become 0
        'a' ..= 'z' => Some((input as u64) - 71), // 'a' should become 26, ...
        '0' ..= '9' => Some((input as u64) + 4), // 0 should become 52
        '+' => Some(62),
        '/' => Some(63),
        _ => None,
    }
}

/// Decode a number from a given String.
///
/// This function decodes a number from the format described in the module documentation.
/// Unknown characters and values beyond `u64::MAX` are rejected.
pub fn decode_number(word: &str) -> Result<u64, EntryError> {
    if word.is_empty() {
        return Err(EntryError::EmptyNumber);
    }
    let mut number = 0u64;
    for (i, character) in word.chars().enumerate() {
        let digit = get_base(character).ok_or(EntryError::InvalidCharacter(character, i))?;
        number = number.checked_mul(64)
                       .and_then(|n| n.checked_add(digit))
                       .ok_or(EntryError::Overflow("u64"))?;
    }
    Ok(number)
}

/// Encode a number in the format described in the module documentation.
pub fn encode_number(mut number: u64) -> String {
    let mut digits = Vec::new();
    loop {
        digits.push(ALPHABET[(number % 64) as usize]);
        number /= 64;
        if number == 0 {
            break;
        }
    }
    digits.iter().rev().map(|&b| char::from(b)).collect()
}

/// Parse a single line from the index file.
pub fn parse_line(line: &str, line_number: usize) -> Result<IndexEntry, DictError> {
    let malformed = |reason| DictError::malformed(line_number, reason);

    // First column: headword.
    let mut split = line.split('\t');
    let headword = split.next().ok_or_else(|| malformed(EntryError::MissingColumn))?;
    if headword.is_empty() {
        return Err(malformed(EntryError::EmptyHeadword));
    }

    // Second column: offset into file.
    let offset = split.next().ok_or_else(|| malformed(EntryError::MissingColumn))?;
    let offset = decode_number(offset).map_err(malformed)?;

    // Third column: entry size.
    let length = split.next().ok_or_else(|| malformed(EntryError::MissingColumn))?;
    let length = decode_number(length).map_err(malformed)?;
    let length = u32::try_from(length).map_err(|_| malformed(EntryError::Overflow("u32")))?;

    // Fourth column: optional original headword.
    let original = split.next().filter(|s| !s.is_empty()).map(String::from);
    if split.next().is_some() {
        return Err(malformed(EntryError::TooManyColumns));
    }

    Ok(IndexEntry { headword: headword.to_string(), offset, length, original })
}
