//! Pattern search over an image dump.
//!
//! # Output Format
//!
//! ```text
//! 0x0043A1F2: 8B F0 8B F9 FF 15 30 D2  6C 00 8A 06 84 C0 74 1A
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use cinesig::{Pattern, find_matches};
use owo_colors::OwoColorize;

use super::hex_utils::format_hex_bytes;

const CONTEXT_BYTES: usize = 16;

/// Run the scan command
pub fn run(image: &Path, pattern: &str, base: u64, limit: usize) -> Result<()> {
    let pattern: Pattern = pattern.parse()?;
    let bytes =
        fs::read(image).with_context(|| format!("Failed to read image {}", image.display()))?;

    let matches = find_matches(&bytes, &pattern);
    println!(
        "Pattern {} ({} bytes, {} wildcard) in {} bytes at 0x{:X}",
        pattern,
        pattern.len(),
        pattern.wildcard_count(),
        bytes.len(),
        base
    );

    match matches.len() {
        0 => println!("{}", "No matches".red()),
        1 => println!("{}", "1 match (unique)".green()),
        n => println!("{}", format!("{} matches (ambiguous)", n).yellow()),
    }
    println!();

    for &offset in matches.iter().take(limit) {
        println!("{}", format_match(&bytes, base, offset));
    }
    if matches.len() > limit {
        println!("... {} more", matches.len() - limit);
    }

    Ok(())
}

/// One output line: match address and up to 16 bytes from the match on
fn format_match(bytes: &[u8], base: u64, offset: usize) -> String {
    let end = offset.saturating_add(CONTEXT_BYTES).min(bytes.len());
    let context = bytes.get(offset..end).unwrap_or_default();
    format!(
        "0x{:08X}: {}",
        base.wrapping_add(offset as u64),
        format_hex_bytes(context)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_match_truncates_context() {
        let bytes = [0x8B, 0xF0, 0x8B, 0xF9];
        assert_eq!(format_match(&bytes, 0x40_0000, 2), "0x00400002: 8B F9");
    }

    #[test]
    fn test_format_match_with_large_base() {
        let bytes = [0xE8; 20];
        let line = format_match(&bytes, u64::MAX, 1);
        assert!(line.starts_with("0x00000000: E8 E8"));
    }
}
