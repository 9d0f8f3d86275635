//! ISBN normalization and checksum validation.
//!
//! Providers expect a bare 10- or 13-character ISBN. Callers run user input
//! through [`normalize`] before handing it to the resolver.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IsbnError {
    #[error("ISBN must be 10 or 13 characters, got {0}")]
    Length(usize),
    #[error("ISBN contains an invalid character: {0:?}")]
    InvalidChar(char),
    #[error("ISBN checksum mismatch: {0}")]
    Checksum(String),
}

/// Strip hyphens and whitespace, then validate length and checksum.
///
/// ```rust
/// use bookscanner::isbn::normalize;
///
/// assert_eq!(normalize("978-4-10-101001-4").unwrap(), "9784101010014");
/// assert!(normalize("978-4-10-101001-5").is_err());
/// ```
pub fn normalize(input: &str) -> Result<String, IsbnError> {
    let cleaned: String = input
        .chars()
        .filter(|c| *c != '-' && !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    // Byte-indexed slicing below relies on this.
    if let Some(c) = cleaned.chars().find(|c| !c.is_ascii()) {
        return Err(IsbnError::InvalidChar(c));
    }

    match cleaned.len() {
        10 => {
            check_chars(&cleaned[..9])?;
            let last = cleaned.chars().last().unwrap_or_default();
            if !last.is_ascii_digit() && last != 'X' {
                return Err(IsbnError::InvalidChar(last));
            }
            if !valid_isbn10(&cleaned) {
                return Err(IsbnError::Checksum(cleaned));
            }
        }
        13 => {
            check_chars(&cleaned)?;
            if !valid_isbn13(&cleaned) {
                return Err(IsbnError::Checksum(cleaned));
            }
        }
        n => return Err(IsbnError::Length(n)),
    }

    Ok(cleaned)
}

/// Normalize and convert to ISBN-13, so the same book always gets the same key.
pub fn canonical(input: &str) -> Result<String, IsbnError> {
    normalize(input).map(|isbn| to_isbn13(&isbn))
}

/// Convert a normalized ISBN-10 to ISBN-13. ISBN-13 input is returned as-is.
pub fn to_isbn13(isbn: &str) -> String {
    if isbn.len() != 10 {
        return isbn.to_string();
    }
    let body = format!("978{}", &isbn[..9]);
    let check = isbn13_check_digit(&body);
    format!("{body}{check}")
}

fn check_chars(s: &str) -> Result<(), IsbnError> {
    match s.chars().find(|c| !c.is_ascii_digit()) {
        Some(c) => Err(IsbnError::InvalidChar(c)),
        None => Ok(()),
    }
}

fn valid_isbn10(s: &str) -> bool {
    let sum: u32 = s
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let v = if c == 'X' { 10 } else { c.to_digit(10).unwrap_or(0) };
            v * (10 - i as u32)
        })
        .sum();
    sum % 11 == 0
}

fn valid_isbn13(s: &str) -> bool {
    let check = s[12..].chars().next().and_then(|c| c.to_digit(10));
    check == Some(isbn13_check_digit(&s[..12]))
}

fn isbn13_check_digit(first12: &str) -> u32 {
    let sum: u32 = first12
        .chars()
        .filter_map(|c| c.to_digit(10))
        .enumerate()
        .map(|(i, d)| if i % 2 == 0 { d } else { d * 3 })
        .sum();
    (10 - sum % 10) % 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_hyphens_and_spaces() {
        assert_eq!(normalize(" 978-4-10-101001-4 ").unwrap(), "9784101010014");
    }

    #[test]
    fn normalize_isbn10_with_x() {
        assert_eq!(normalize("4-00-031016-x").unwrap(), "400031016X");
    }

    #[test]
    fn normalize_rejects_bad_length() {
        assert_eq!(normalize("12345"), Err(IsbnError::Length(5)));
    }

    #[test]
    fn normalize_rejects_letters() {
        assert_eq!(normalize("97841010100A4"), Err(IsbnError::InvalidChar('A')));
    }

    #[test]
    fn normalize_rejects_multibyte_characters() {
        assert_eq!(normalize("12345678é"), Err(IsbnError::InvalidChar('é')));
        assert_eq!(normalize("978410101001４"), Err(IsbnError::InvalidChar('４')));
    }

    #[test]
    fn normalize_rejects_bad_checksum() {
        assert!(matches!(normalize("9784101010015"), Err(IsbnError::Checksum(_))));
        assert!(matches!(normalize("4003101011"), Err(IsbnError::Checksum(_))));
    }

    #[test]
    fn isbn10_to_13() {
        assert_eq!(to_isbn13("400031016X"), "9784000310161");
        assert_eq!(to_isbn13("9784101010014"), "9784101010014");
    }

    #[test]
    fn canonical_key() {
        assert_eq!(canonical("4-00-031016-X").unwrap(), "9784000310161");
        assert_eq!(canonical("978-4-10-101001-4").unwrap(), "9784101010014");
        assert!(canonical("abc").is_err());
    }
}
