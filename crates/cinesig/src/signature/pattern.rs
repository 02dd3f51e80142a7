use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A byte signature where `None` positions match any byte.
///
/// Text form is whitespace-separated hex bytes with `?` or `??` for wildcards,
/// e.g. `"E8 ?? ?? ?? ?? 83 3D"`. A pattern always has at least one token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern {
    tokens: Vec<Option<u8>>,
}

impl Pattern {
    pub fn new(tokens: Vec<Option<u8>>) -> Result<Self> {
        if tokens.is_empty() {
            return Err(Error::InvalidPattern("Signature pattern is empty".to_string()));
        }
        Ok(Self { tokens })
    }

    /// Pattern made only of concrete bytes
    pub fn exact(bytes: &[u8]) -> Result<Self> {
        Self::new(bytes.iter().copied().map(Some).collect())
    }

    pub fn tokens(&self) -> &[Option<u8>] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn wildcard_count(&self) -> usize {
        self.tokens.iter().filter(|t| t.is_none()).count()
    }

    /// First concrete byte and its index, used to anchor scans
    pub fn anchor(&self) -> Option<(usize, u8)> {
        self.tokens
            .iter()
            .enumerate()
            .find_map(|(i, t)| t.map(|b| (i, b)))
    }

    /// Check the pattern against `data` starting at `pos`
    pub fn matches_at(&self, data: &[u8], pos: usize) -> bool {
        let Some(window) = data.get(pos..pos + self.tokens.len()) else {
            return false;
        };
        self.tokens
            .iter()
            .zip(window)
            .all(|(token, byte)| token.is_none_or(|value| value == *byte))
    }
}

impl FromStr for Pattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(parse_pattern(s)?)
    }
}

impl TryFrom<String> for Pattern {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_pattern(&self.tokens))
    }
}

pub fn parse_pattern(pattern: &str) -> Result<Vec<Option<u8>>> {
    let mut bytes = Vec::new();
    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(None);
            continue;
        }

        if token.len() != 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::InvalidPattern(format!(
                "Invalid signature token '{}': expected two hex digits",
                token
            )));
        }

        let value = u8::from_str_radix(token, 16).map_err(|e| {
            Error::InvalidPattern(format!("Invalid signature token '{}': {}", token, e))
        })?;
        bytes.push(Some(value));
    }

    if bytes.is_empty() {
        return Err(Error::InvalidPattern("Signature pattern is empty".to_string()));
    }

    Ok(bytes)
}

pub fn format_pattern(bytes: &[Option<u8>]) -> String {
    bytes
        .iter()
        .map(|b| match b {
            Some(value) => format!("{:02X}", value),
            None => "??".to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern_with_wildcards() {
        let bytes = parse_pattern("BA ?? ?? ?? ?? E8 ? 80 3D").unwrap();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[0], Some(0xBA));
        assert_eq!(bytes[1], None);
        assert_eq!(bytes[5], Some(0xE8));
        assert_eq!(bytes[6], None);
    }

    #[test]
    fn test_parse_rejects_bad_tokens() {
        assert!(parse_pattern("").is_err());
        assert!(parse_pattern("   ").is_err());
        assert!(parse_pattern("GG").is_err());
        assert!(parse_pattern("ABC").is_err());
        assert!(parse_pattern("+1").is_err());
        assert!(parse_pattern("AA +F").is_err());
        assert!(parse_pattern("-1").is_err());
    }

    #[test]
    fn test_display_normalizes_case_and_wildcards() {
        let pattern: Pattern = "aa bb ? dd".parse().unwrap();
        assert_eq!(pattern.to_string(), "AA BB ?? DD");
        assert_eq!(pattern.wildcard_count(), 1);
    }

    #[test]
    fn test_anchor_skips_leading_wildcards() {
        let pattern: Pattern = "?? ?? 5E 5F".parse().unwrap();
        assert_eq!(pattern.anchor(), Some((2, 0x5E)));

        let all_wild: Pattern = "?? ??".parse().unwrap();
        assert_eq!(all_wild.anchor(), None);
    }

    #[test]
    fn test_matches_at_ignores_wildcard_bytes() {
        let pattern: Pattern = "AA ?? CC".parse().unwrap();
        for middle in 0..=u8::MAX {
            assert!(pattern.matches_at(&[0xAA, middle, 0xCC], 0));
        }
        assert!(!pattern.matches_at(&[0xAA, 0x00, 0xCD], 0));
        assert!(!pattern.matches_at(&[0xAA, 0x00], 0));
    }

    #[test]
    fn test_serde_uses_text_form() {
        let pattern: Pattern = "89 1D ?? ?? ?? ?? 5E 5F".parse().unwrap();
        let json = serde_json::to_string(&pattern).unwrap();
        assert_eq!(json, "\"89 1D ?? ?? ?? ?? 5E 5F\"");

        let back: Pattern = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pattern);
        assert!(serde_json::from_str::<Pattern>("\"\"").is_err());
    }
}
