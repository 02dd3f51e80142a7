//! # cinesig
//!
//! Signature-based address resolution for the IW3 (Call of Duty 4) cinematic
//! add-on.
//!
//! This crate provides:
//! - Wildcard byte patterns and declarative symbol descriptors
//! - A compiled-in IW3 descriptor set plus JSON descriptor files
//! - Bounds-checked snapshots of the game executable and the optional CoD4X module
//! - A memchr-anchored scanner with unique/ambiguous/not-found classification
//! - Call/jump following and pointer dereferencing with range checks
//! - An immutable resolution table and a summary of what failed
//!
//! Attaching to a live process requires Windows. Everything else works on
//! any platform against captured or synthetic images.

pub mod attach;
pub mod error;
pub mod memory;
pub mod module;
pub mod prelude;
pub mod resolve;
pub mod scan;
pub mod signature;
pub mod transform;

pub use attach::{AttachConfig, AttachConfigBuilder, Attachment};
pub use error::{Error, Result};
pub use memory::{
    ImageRegion, MemoryReader, ModuleImage, ProcessHandle, ProcessInfo, ReadMemory, RegionInfo,
};
pub use module::{LoadedModule, ModuleNames, ModuleRegistry};
pub use resolve::{
    NotFoundReason, Resolution, ResolutionStatus, ResolutionSummary, ResolutionTable,
    ResolvedAddress, Resolver, SymbolFailure, SymbolResolution,
};
pub use scan::{ScanOutcome, find_matches, scan_image, scan_unique};
pub use signature::{
    AddressClass, DescriptorSet, IW3_GAME, Iw3Symbol, ModuleTarget, Pattern, PatternDescriptor,
    PointerWidth, SymbolEntry, Transform, builtin_signatures, load_signatures, save_signatures,
};
pub use transform::{TransformEngine, TransformError};
