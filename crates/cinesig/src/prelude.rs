//! Prelude module for convenient imports
//!
//! ```ignore
//! use cinesig::prelude::*;
//! ```
//!
//! This brings the following into scope:
//!
//! - Attach: `Attachment`, `AttachConfig`
//! - Descriptors: `DescriptorSet`, `PatternDescriptor`, `Iw3Symbol`, `builtin_signatures`
//! - Results: `ResolutionTable`, `Resolution`, `ResolutionStatus`, `ResolutionSummary`
//! - Error handling: `Error`, `Result`

// Attach session
pub use crate::attach::{AttachConfig, AttachConfigBuilder, Attachment};

// Error handling
pub use crate::error::{Error, Result};

// Descriptors
pub use crate::signature::{
    AddressClass, DescriptorSet, Iw3Symbol, ModuleTarget, Pattern, PatternDescriptor,
    PointerWidth, SymbolEntry, Transform, builtin_signatures,
};

// Resolution results
pub use crate::resolve::{
    Resolution, ResolutionStatus, ResolutionSummary, ResolutionTable, ResolvedAddress,
};
