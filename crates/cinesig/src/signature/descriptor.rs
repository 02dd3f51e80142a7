use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use super::Pattern;
use crate::error::{Error, Result};

/// Whether a resolved address is a function entry or a data location
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AddressClass {
    #[default]
    Code,
    Data,
}

/// Post-match operation applied to `match + offset`
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Transform {
    #[default]
    None,
    /// Follow an `E8`/`E9` rel32 call or jump to its target
    FollowCodeFlow,
    /// Read the pointer stored at the address
    DereferenceAddress,
}

/// Which loaded module a descriptor scans
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    IntoStaticStr,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ModuleTarget {
    /// The game executable; must be present
    #[default]
    Primary,
    /// An optional client module (e.g. CoD4X); may legitimately be absent
    SecondaryOptional,
}

impl ModuleTarget {
    pub fn is_optional(&self) -> bool {
        matches!(self, Self::SecondaryOptional)
    }
}

/// Pointer size of the target process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointerWidth {
    #[default]
    Bits32,
    Bits64,
}

impl PointerWidth {
    pub fn bytes(&self) -> usize {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }
}

/// Declarative description of how to find one address by byte matching
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDescriptor {
    pub pattern: Pattern,
    #[serde(default)]
    pub address_class: AddressClass,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub transform: Transform,
    #[serde(default)]
    pub module: ModuleTarget,
}

impl PatternDescriptor {
    pub fn new(pattern: Pattern, address_class: AddressClass, offset: i64) -> Self {
        Self {
            pattern,
            address_class,
            offset,
            transform: Transform::None,
            module: ModuleTarget::Primary,
        }
    }

    /// Build a descriptor from pattern text
    pub fn parse(pattern: &str, address_class: AddressClass, offset: i64) -> Result<Self> {
        Ok(Self::new(pattern.parse()?, address_class, offset))
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_module(mut self, module: ModuleTarget) -> Self {
        self.module = module;
        self
    }
}

/// One symbol and its candidate descriptors, in priority order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub name: String,
    pub candidates: Vec<PatternDescriptor>,
}

impl SymbolEntry {
    pub fn new(name: impl Into<String>, candidates: Vec<PatternDescriptor>) -> Self {
        Self {
            name: name.into(),
            candidates,
        }
    }

    pub fn single(name: impl Into<String>, descriptor: PatternDescriptor) -> Self {
        Self::new(name, vec![descriptor])
    }

    /// A symbol is required when any candidate scans the primary module
    pub fn is_required(&self) -> bool {
        self.candidates
            .iter()
            .any(|c| c.module == ModuleTarget::Primary)
    }

    /// Class reported for the symbol; taken from the first candidate
    pub fn address_class(&self) -> AddressClass {
        self.candidates
            .first()
            .map(|c| c.address_class)
            .unwrap_or_default()
    }
}

/// Symbol table for one game binary family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorSet {
    pub game: String,
    #[serde(default)]
    pub pointer_width: PointerWidth,
    pub entries: Vec<SymbolEntry>,
}

impl DescriptorSet {
    pub fn new(game: impl Into<String>, pointer_width: PointerWidth) -> Self {
        Self {
            game: game.into(),
            pointer_width,
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, entry: SymbolEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn entry(&self, name: &str) -> Option<&SymbolEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reject duplicate names and symbols without candidates
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.candidates.is_empty() {
                return Err(Error::InvalidDescriptorSet(format!(
                    "Symbol '{}' has no candidate descriptors",
                    entry.name
                )));
            }
            if !seen.insert(entry.name.to_ascii_lowercase()) {
                return Err(Error::InvalidDescriptorSet(format!(
                    "Symbol '{}' is declared more than once",
                    entry.name
                )));
            }
        }
        Ok(())
    }
}

pub fn load_signatures<P: AsRef<Path>>(path: P) -> Result<DescriptorSet> {
    let content = fs::read_to_string(&path)?;
    let data: DescriptorSet = serde_json::from_str(&content)?;
    data.validate()?;
    Ok(data)
}

pub fn save_signatures<P: AsRef<Path>>(path: P, signatures: &DescriptorSet) -> Result<()> {
    let content = serde_json::to_string_pretty(signatures)?;
    fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_set() -> DescriptorSet {
        DescriptorSet::new("test", PointerWidth::Bits32)
            .with_entry(SymbolEntry::single(
                "clientStatic",
                PatternDescriptor::parse("68 ?? ?? ?? ?? E8", AddressClass::Data, 1)
                    .unwrap()
                    .with_transform(Transform::DereferenceAddress),
            ))
            .with_entry(SymbolEntry::new(
                "CL_SystemInfoChanged",
                vec![
                    PatternDescriptor::parse("53 55 56 8B F0", AddressClass::Code, -8).unwrap(),
                    PatternDescriptor::parse("00 00 E8 ?? ?? ?? ?? 29 C4", AddressClass::Code, -7)
                        .unwrap()
                        .with_module(ModuleTarget::SecondaryOptional),
                ],
            ))
    }

    #[test]
    fn test_save_and_load_signatures() {
        let temp_file = NamedTempFile::new().unwrap();
        let set = sample_set();

        save_signatures(temp_file.path(), &set).unwrap();
        let loaded = load_signatures(temp_file.path()).unwrap();

        assert_eq!(loaded, set);
        let entry = loaded.entry("clientstatic").unwrap();
        assert_eq!(entry.candidates[0].transform, Transform::DereferenceAddress);
        assert_eq!(entry.address_class(), AddressClass::Data);
    }

    #[test]
    fn test_optional_fields_default() {
        let json = r#"{
            "game": "minimal",
            "entries": [{ "name": "f", "candidates": [{ "pattern": "AA BB" }] }]
        }"#;
        let set: DescriptorSet = serde_json::from_str(json).unwrap();
        let descriptor = &set.entries[0].candidates[0];

        assert_eq!(set.pointer_width, PointerWidth::Bits32);
        assert_eq!(descriptor.address_class, AddressClass::Code);
        assert_eq!(descriptor.offset, 0);
        assert_eq!(descriptor.transform, Transform::None);
        assert_eq!(descriptor.module, ModuleTarget::Primary);
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty_entries() {
        let dup = sample_set().with_entry(SymbolEntry::single(
            "CLIENTSTATIC",
            PatternDescriptor::parse("AA", AddressClass::Data, 0).unwrap(),
        ));
        assert!(matches!(dup.validate(), Err(Error::InvalidDescriptorSet(_))));

        let empty = DescriptorSet::new("x", PointerWidth::Bits64)
            .with_entry(SymbolEntry::new("nothing", Vec::new()));
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_required_follows_module_targets() {
        let set = sample_set();
        assert!(set.entry("clientStatic").unwrap().is_required());
        assert!(set.entry("CL_SystemInfoChanged").unwrap().is_required());

        let optional = SymbolEntry::single(
            "only_secondary",
            PatternDescriptor::parse("AA", AddressClass::Code, 0)
                .unwrap()
                .with_module(ModuleTarget::SecondaryOptional),
        );
        assert!(!optional.is_required());
    }
}
