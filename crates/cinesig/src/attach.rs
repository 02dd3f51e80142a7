//! Attach sessions.
//!
//! An [`Attachment`] captures the configured modules, runs one resolution
//! pass and keeps the resulting table. Re-attaching means building a new
//! `Attachment`; tables are never patched in place.
//!
//! ## Example
//!
//! ```ignore
//! use cinesig::attach::{AttachConfig, Attachment};
//! use cinesig::signature::{Iw3Symbol, builtin_signatures};
//!
//! let config = AttachConfig::builder()
//!     .secondary_module("cod4x_*.dll")
//!     .build();
//! let attachment = Attachment::attach("iw3mp.exe", &builtin_signatures(), &config)?;
//!
//! let table = attachment.table();
//! let frame = table.code(Iw3Symbol::SvFrame);
//! ```

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::memory::{DEFAULT_CHUNK_SIZE, MemoryReader, ProcessHandle, ProcessInfo, ReadMemory};
use crate::module::{
    DEFAULT_PRIMARY_MODULE, DEFAULT_SECONDARY_MODULE, LoadedModule, ModuleNames, ModuleRegistry,
};
use crate::resolve::{ResolutionSummary, ResolutionTable, Resolver};
use crate::signature::DescriptorSet;

/// Configuration for an attach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachConfig {
    /// Name of the game executable module
    pub primary_module: String,
    /// Glob patterns for the optional client module, tried in order
    pub secondary_modules: Vec<String>,
    /// Fail the attach when a required symbol is unresolved
    pub abort_on_fatal: bool,
    /// Size of each `ReadProcessMemory` call while capturing images
    pub chunk_size: usize,
}

impl Default for AttachConfig {
    fn default() -> Self {
        Self {
            primary_module: DEFAULT_PRIMARY_MODULE.to_string(),
            secondary_modules: vec![DEFAULT_SECONDARY_MODULE.to_string()],
            abort_on_fatal: true,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl AttachConfig {
    /// Create a new configuration builder
    pub fn builder() -> AttachConfigBuilder {
        AttachConfigBuilder::default()
    }

    pub fn module_names(&self) -> ModuleNames {
        ModuleNames {
            primary: self.primary_module.clone(),
            secondary: self.secondary_modules.clone(),
        }
    }
}

/// Builder for AttachConfig
#[derive(Debug, Clone, Default)]
pub struct AttachConfigBuilder {
    primary_module: Option<String>,
    secondary_modules: Option<Vec<String>>,
    abort_on_fatal: Option<bool>,
    chunk_size: Option<usize>,
}

impl AttachConfigBuilder {
    /// Set the game executable module name
    pub fn primary_module<S: Into<String>>(mut self, name: S) -> Self {
        self.primary_module = Some(name.into());
        self
    }

    /// Append a secondary module pattern
    pub fn secondary_module<S: Into<String>>(mut self, pattern: S) -> Self {
        self.secondary_modules
            .get_or_insert_with(Vec::new)
            .push(pattern.into());
        self
    }

    /// Replace all secondary module patterns
    pub fn secondary_modules<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.secondary_modules = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    /// Enable or disable failing the attach on unresolved required symbols
    pub fn abort_on_fatal(mut self, enabled: bool) -> Self {
        self.abort_on_fatal = Some(enabled);
        self
    }

    /// Set the capture chunk size in bytes
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = Some(bytes);
        self
    }

    /// Build the configuration
    pub fn build(self) -> AttachConfig {
        let default = AttachConfig::default();
        AttachConfig {
            primary_module: self.primary_module.unwrap_or(default.primary_module),
            secondary_modules: self.secondary_modules.unwrap_or(default.secondary_modules),
            abort_on_fatal: self.abort_on_fatal.unwrap_or(default.abort_on_fatal),
            chunk_size: self.chunk_size.unwrap_or(default.chunk_size).max(1),
        }
    }
}

/// Result of a successful attach
pub struct Attachment {
    process: Option<ProcessInfo>,
    modules: ModuleRegistry,
    table: Arc<ResolutionTable>,
}

impl Attachment {
    /// Attach to a running process by executable name and resolve `descriptors`
    pub fn attach(
        process_name: &str,
        descriptors: &DescriptorSet,
        config: &AttachConfig,
    ) -> Result<Self> {
        let process = ProcessHandle::find_and_open(process_name)?;
        let info = process.info();
        info!("Attached to {} (pid {})", info.name, info.pid);

        let loaded = process.modules()?;
        let reader = MemoryReader::new(&process);
        let mut attachment = Self::from_reader(&reader, &loaded, descriptors, config)?;
        attachment.process = Some(info);
        Ok(attachment)
    }

    /// Capture the configured modules through `reader` and resolve
    pub fn from_reader<R: ReadMemory>(
        reader: &R,
        loaded: &[LoadedModule],
        descriptors: &DescriptorSet,
        config: &AttachConfig,
    ) -> Result<Self> {
        descriptors.validate()?;
        let modules =
            ModuleRegistry::capture(reader, loaded, &config.module_names(), config.chunk_size)?;
        Self::from_registry(modules, descriptors, config)
    }

    /// Resolve against already captured modules
    pub fn from_registry(
        modules: ModuleRegistry,
        descriptors: &DescriptorSet,
        config: &AttachConfig,
    ) -> Result<Self> {
        descriptors.validate()?;
        let table = Resolver::new(&modules).resolve_all(descriptors);

        let summary = table.summary();
        if summary.is_fatal() {
            if config.abort_on_fatal {
                return Err(Error::ResolutionFailed(summary));
            }
            warn!("Continuing with unresolved required symbols: {}", summary);
        }

        Ok(Self {
            process: None,
            modules,
            table: Arc::new(table),
        })
    }

    /// Process this attachment was made to; `None` for offline images
    pub fn process(&self) -> Option<&ProcessInfo> {
        self.process.as_ref()
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    /// Shared handle to the resolution table
    pub fn table(&self) -> Arc<ResolutionTable> {
        Arc::clone(&self.table)
    }

    pub fn summary(&self) -> ResolutionSummary {
        self.table.summary()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MockMemoryBuilder, ModuleImage};
    use crate::resolve::ResolutionStatus;
    use crate::signature::{
        AddressClass, ModuleTarget, PatternDescriptor, PointerWidth, SymbolEntry,
    };

    const BASE: u64 = 0x40_0000;

    fn descriptors() -> DescriptorSet {
        DescriptorSet::new("test", PointerWidth::Bits32)
            .with_entry(SymbolEntry::single(
                "present",
                PatternDescriptor::parse("AA BB ?? DD", AddressClass::Code, 0).unwrap(),
            ))
            .with_entry(SymbolEntry::single(
                "cod4x_only",
                PatternDescriptor::parse("12 34", AddressClass::Code, 0)
                    .unwrap()
                    .with_module(ModuleTarget::SecondaryOptional),
            ))
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = AttachConfig::builder().build();
        assert_eq!(config, AttachConfig::default());
        assert_eq!(config.primary_module, "iw3mp.exe");
        assert_eq!(config.secondary_modules, vec!["cod4x_*.dll"]);
        assert!(config.abort_on_fatal);
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_config_builder_overrides() {
        let config = AttachConfig::builder()
            .primary_module("iw3sp.exe")
            .secondary_module("cod4x_018.dll")
            .secondary_module("cod4x_*.dll")
            .abort_on_fatal(false)
            .chunk_size(0)
            .build();

        assert_eq!(config.module_names().primary, "iw3sp.exe");
        assert_eq!(config.secondary_modules.len(), 2);
        assert!(!config.abort_on_fatal);
        assert_eq!(config.chunk_size, 1);
    }

    #[test]
    fn test_attach_from_reader() {
        let reader = MockMemoryBuilder::new(BASE)
            .with_bytes(0, &[0x11, 0x22, 0xAA, 0xBB, 0xCC, 0xDD, 0x33, 0x00])
            .build();
        let loaded = vec![LoadedModule::new("iw3mp.exe", BASE, 8)];

        let attachment =
            Attachment::from_reader(&reader, &loaded, &descriptors(), &AttachConfig::default())
                .unwrap();
        let table = attachment.table();

        assert!(attachment.process().is_none());
        assert_eq!(table.code("present"), Some(BASE + 2));
        assert_eq!(table.status("cod4x_only"), Some(ResolutionStatus::ModuleAbsent));
        assert!(!attachment.summary().is_fatal());
    }

    #[test]
    fn test_fatal_summary_aborts_by_default() {
        let registry = ModuleRegistry::new(ModuleImage::from_bytes("iw3mp.exe", BASE, vec![0; 16]));
        let err = Attachment::from_registry(registry, &descriptors(), &AttachConfig::default())
            .err()
            .unwrap();

        let summary = err.summary().unwrap();
        assert!(summary.is_fatal());
        assert_eq!(summary.fatal().next().unwrap().name, "present");
    }

    #[test]
    fn test_fatal_summary_tolerated_when_configured() {
        let registry = ModuleRegistry::new(ModuleImage::from_bytes("iw3mp.exe", BASE, vec![0; 16]));
        let config = AttachConfig::builder().abort_on_fatal(false).build();

        let attachment = Attachment::from_registry(registry, &descriptors(), &config).unwrap();
        assert_eq!(attachment.table().address("present"), None);
        assert!(attachment.summary().is_fatal());
    }

    #[test]
    fn test_missing_primary_module_fails_attach() {
        let reader = MockMemoryBuilder::new(BASE).with_bytes(0, &[0; 16]).build();
        let loaded = vec![LoadedModule::new("cod4x_021.dll", BASE, 16)];

        let config = AttachConfig::default();
        let err = Attachment::from_reader(&reader, &loaded, &descriptors(), &config)
            .err()
            .unwrap();
        assert!(matches!(err, Error::PrimaryModuleMissing(_)));
    }

    #[test]
    fn test_table_is_shareable_across_threads() {
        let registry = ModuleRegistry::new(ModuleImage::from_bytes(
            "iw3mp.exe",
            BASE,
            vec![0xAA, 0xBB, 0x00, 0xDD],
        ));
        let attachment =
            Attachment::from_registry(registry, &descriptors(), &AttachConfig::default()).unwrap();

        let table = attachment.table();
        let handle = std::thread::spawn(move || table.code("present"));
        assert_eq!(handle.join().unwrap(), Some(BASE));
    }
}
