//! Hex parsing and dump formatting shared by the commands.

use anyhow::{Result, anyhow};

/// Parse a hex address string (with or without 0x prefix).
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(s, 16).map_err(|e| anyhow!("Invalid hex address: {}", e))
}

/// Space separated upper-case hex, with an extra gap after the eighth byte
pub fn format_hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3 + 1);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        if i == 8 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", byte));
    }
    out
}
