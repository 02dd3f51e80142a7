//! CLI command implementations.

pub mod hex_utils;
pub mod resolve;
pub mod scan;
pub mod signatures;
