//! Module registry: which loaded image each [`ModuleTarget`] refers to.

use glob::{MatchOptions, Pattern as GlobPattern};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::memory::{ModuleImage, ReadMemory};
use crate::signature::ModuleTarget;

/// Default primary executable
pub const DEFAULT_PRIMARY_MODULE: &str = "iw3mp.exe";
/// Default secondary module name pattern (CoD4X client)
pub const DEFAULT_SECONDARY_MODULE: &str = "cod4x_*.dll";

const NAME_MATCH: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// A module as reported by the operating system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedModule {
    pub name: String,
    pub base: u64,
    pub size: u64,
}

impl LoadedModule {
    pub fn new(name: impl Into<String>, base: u64, size: u64) -> Self {
        Self {
            name: name.into(),
            base,
            size,
        }
    }
}

/// Names used to pick modules out of the loaded list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleNames {
    /// Exact (case-insensitive) name of the game executable
    pub primary: String,
    /// Glob patterns for the optional module, tried in order
    pub secondary: Vec<String>,
}

impl Default for ModuleNames {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY_MODULE.to_string(),
            secondary: vec![DEFAULT_SECONDARY_MODULE.to_string()],
        }
    }
}

impl ModuleNames {
    pub fn find_primary<'a>(&self, loaded: &'a [LoadedModule]) -> Option<&'a LoadedModule> {
        loaded
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(&self.primary))
    }

    pub fn find_secondary<'a>(&self, loaded: &'a [LoadedModule]) -> Option<&'a LoadedModule> {
        self.secondary.iter().find_map(|pattern| {
            let matcher = GlobPattern::new(pattern)
                .map_err(|e| warn!("Invalid module pattern '{}': {}", pattern, e))
                .ok();
            loaded.iter().find(|m| match &matcher {
                Some(glob) => glob.matches_with(&m.name, NAME_MATCH),
                None => m.name.eq_ignore_ascii_case(pattern),
            })
        })
    }
}

/// Captured images of the modules the descriptors can target.
///
/// Built once per attach and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ModuleRegistry {
    primary: ModuleImage,
    secondary: Option<ModuleImage>,
}

impl ModuleRegistry {
    pub fn new(primary: ModuleImage) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, image: ModuleImage) -> Self {
        self.secondary = Some(image);
        self
    }

    /// Locate and capture the configured modules.
    ///
    /// A missing primary module is an error. A missing or unreadable secondary
    /// module is not: descriptors targeting it later resolve to `ModuleAbsent`.
    pub fn capture<R: ReadMemory>(
        reader: &R,
        loaded: &[LoadedModule],
        names: &ModuleNames,
        chunk_size: usize,
    ) -> Result<Self> {
        let primary = names
            .find_primary(loaded)
            .ok_or_else(|| Error::PrimaryModuleMissing(names.primary.clone()))?;
        info!(
            "Primary module {}: base 0x{:X}, size 0x{:X}",
            primary.name, primary.base, primary.size
        );
        let mut registry = Self::new(ModuleImage::capture(reader, primary, chunk_size)?);

        match names.find_secondary(loaded) {
            Some(module) => match ModuleImage::capture(reader, module, chunk_size) {
                Ok(image) => {
                    info!(
                        "Secondary module {}: base 0x{:X}, size 0x{:X}",
                        module.name, module.base, module.size
                    );
                    registry.secondary = Some(image);
                }
                Err(e) => warn!(
                    "Secondary module {} could not be captured, treating as absent: {}",
                    module.name, e
                ),
            },
            None => debug!("No secondary module matching {:?}", names.secondary),
        }

        Ok(registry)
    }

    pub fn primary(&self) -> &ModuleImage {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&ModuleImage> {
        self.secondary.as_ref()
    }

    pub fn image(&self, target: ModuleTarget) -> Option<&ModuleImage> {
        match target {
            ModuleTarget::Primary => Some(&self.primary),
            ModuleTarget::SecondaryOptional => self.secondary.as_ref(),
        }
    }

    pub fn images(&self) -> impl Iterator<Item = &ModuleImage> {
        std::iter::once(&self.primary).chain(self.secondary.as_ref())
    }

    /// Module whose address range contains `address`
    pub fn owner_of(&self, address: u64) -> Option<&ModuleImage> {
        self.images().find(|image| image.contains(address))
    }

    pub fn contains(&self, address: u64) -> bool {
        self.owner_of(address).is_some()
    }
}
