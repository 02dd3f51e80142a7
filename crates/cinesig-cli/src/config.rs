//! Optional TOML configuration for the CLI.
//!
//! ```toml
//! primary_module = "iw3mp.exe"
//! secondary_modules = ["cod4x_*.dll"]
//! abort_on_fatal = true
//! chunk_size = 1048576
//! signatures = "iw3.json"
//! ```
//!
//! Every key is optional; missing keys keep the library defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cinesig::{AttachConfig, DescriptorSet, builtin_signatures, load_signatures};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub primary_module: Option<String>,
    pub secondary_modules: Option<Vec<String>>,
    pub abort_on_fatal: Option<bool>,
    pub chunk_size: Option<usize>,
    /// Descriptor file used when `--signatures` is not given
    pub signatures: Option<PathBuf>,
}

impl CliConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn attach_config(&self) -> AttachConfig {
        let mut builder = AttachConfig::builder();
        if let Some(name) = &self.primary_module {
            builder = builder.primary_module(name);
        }
        if let Some(patterns) = &self.secondary_modules {
            builder = builder.secondary_modules(patterns);
        }
        if let Some(enabled) = self.abort_on_fatal {
            builder = builder.abort_on_fatal(enabled);
        }
        if let Some(bytes) = self.chunk_size {
            builder = builder.chunk_size(bytes);
        }
        builder.build()
    }

    /// Descriptor set from `flag`, then the config file, then the built-in set
    pub fn descriptors(&self, flag: Option<&Path>) -> Result<DescriptorSet> {
        match flag.or(self.signatures.as_deref()) {
            Some(path) => {
                let set = load_signatures(path)
                    .with_context(|| format!("Failed to load signatures from {}", path.display()))?;
                info!("Loaded {} signatures from {}", set.len(), path.display());
                Ok(set)
            }
            None => Ok(builtin_signatures()),
        }
    }
}
