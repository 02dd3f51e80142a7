use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, IntoStaticStr};

use super::ResolutionSummary;
use crate::signature::{AddressClass, ModuleTarget};
use crate::transform::TransformError;

/// Terminal state of one symbol
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, Display,
)]
pub enum ResolutionStatus {
    Resolved,
    NotFound,
    Ambiguous,
    ModuleAbsent,
}

/// Why a candidate produced no address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotFoundReason {
    NoMatch,
    OutOfRange { address: u64 },
    UnreadableInput { address: u64 },
    UnexpectedOpcode { address: u64, opcode: u8 },
}

impl From<TransformError> for NotFoundReason {
    fn from(err: TransformError) -> Self {
        match err {
            TransformError::OutOfRange { address } => Self::OutOfRange { address },
            TransformError::UnreadableInput { address } => Self::UnreadableInput { address },
            TransformError::UnexpectedOpcode { address, opcode } => {
                Self::UnexpectedOpcode { address, opcode }
            }
        }
    }
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMatch => f.write_str("pattern not found"),
            Self::OutOfRange { address } => {
                write!(f, "address 0x{:X} is outside every known module", address)
            }
            Self::UnreadableInput { address } => {
                write!(f, "bytes at 0x{:X} were not captured", address)
            }
            Self::UnexpectedOpcode { address, opcode } => write!(
                f,
                "expected a rel32 call/jump at 0x{:X}, found opcode {:02X}",
                address, opcode
            ),
        }
    }
}

/// A resolved address tagged with what it points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedAddress {
    pub value: u64,
    pub class: AddressClass,
}

impl fmt::Display for ResolvedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.value)
    }
}

/// Outcome for one symbol. The address only exists in `Resolved`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved {
        address: ResolvedAddress,
        /// Index of the candidate descriptor that matched
        variant: usize,
    },
    NotFound {
        reason: NotFoundReason,
    },
    Ambiguous {
        matches: usize,
        sample: Vec<u64>,
    },
    ModuleAbsent {
        module: ModuleTarget,
    },
}

impl Resolution {
    pub fn status(&self) -> ResolutionStatus {
        match self {
            Self::Resolved { .. } => ResolutionStatus::Resolved,
            Self::NotFound { .. } => ResolutionStatus::NotFound,
            Self::Ambiguous { .. } => ResolutionStatus::Ambiguous,
            Self::ModuleAbsent { .. } => ResolutionStatus::ModuleAbsent,
        }
    }

    pub fn address(&self) -> Option<ResolvedAddress> {
        match self {
            Self::Resolved { address, .. } => Some(*address),
            _ => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }

    /// Ordering used to report the most telling failure across candidates
    pub(crate) fn failure_rank(&self) -> u8 {
        match self {
            Self::Resolved { .. } => 0,
            Self::ModuleAbsent { .. } => 1,
            Self::NotFound { .. } => 2,
            Self::Ambiguous { .. } => 3,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resolved { address, variant } => {
                write!(f, "{} (variant {})", address, variant)
            }
            Self::NotFound { reason } => write!(f, "not found: {}", reason),
            Self::Ambiguous { matches, sample } => {
                let sample: Vec<String> = sample.iter().map(|a| format!("0x{:X}", a)).collect();
                write!(f, "ambiguous: {} matches ({})", matches, sample.join(", "))
            }
            Self::ModuleAbsent { module } => write!(f, "module absent: {}", module),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolResolution {
    pub name: String,
    pub address_class: AddressClass,
    /// Set when some candidate scans the primary module
    pub required: bool,
    pub resolution: Resolution,
}

impl SymbolResolution {
    pub fn status(&self) -> ResolutionStatus {
        self.resolution.status()
    }

    pub fn address(&self) -> Option<ResolvedAddress> {
        self.resolution.address()
    }

    /// Unresolved and needed for the attach to be usable
    pub fn is_fatal(&self) -> bool {
        self.required && !self.resolution.is_resolved()
    }
}

/// Attach-time mapping from symbol to address and status.
///
/// Built once by the resolver and immutable afterwards, so it can be shared
/// across threads freely.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionTable {
    game: String,
    symbols: Vec<SymbolResolution>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ResolutionTable {
    pub(crate) fn new(game: impl Into<String>, symbols: Vec<SymbolResolution>) -> Self {
        let mut index = HashMap::with_capacity(symbols.len());
        for (i, symbol) in symbols.iter().enumerate() {
            index.entry(symbol.name.to_ascii_lowercase()).or_insert(i);
        }
        Self {
            game: game.into(),
            symbols,
            index,
        }
    }

    pub fn game(&self) -> &str {
        &self.game
    }

    /// Entry for `symbol` (case-insensitive), if it was part of the pass
    pub fn resolve(&self, symbol: impl AsRef<str>) -> Option<&SymbolResolution> {
        self.index
            .get(&symbol.as_ref().to_ascii_lowercase())
            .map(|&i| &self.symbols[i])
    }

    pub fn status(&self, symbol: impl AsRef<str>) -> Option<ResolutionStatus> {
        self.resolve(symbol).map(SymbolResolution::status)
    }

    /// Address of a resolved symbol; `None` for every other status
    pub fn address(&self, symbol: impl AsRef<str>) -> Option<ResolvedAddress> {
        self.resolve(symbol).and_then(SymbolResolution::address)
    }

    /// Address of a resolved code symbol
    pub fn code(&self, symbol: impl AsRef<str>) -> Option<u64> {
        self.address(symbol)
            .filter(|a| a.class == AddressClass::Code)
            .map(|a| a.value)
    }

    /// Address of a resolved data symbol
    pub fn data(&self, symbol: impl AsRef<str>) -> Option<u64> {
        self.address(symbol)
            .filter(|a| a.class == AddressClass::Data)
            .map(|a| a.value)
    }

    /// Entries in declared order
    pub fn iter(&self) -> impl Iterator<Item = &SymbolResolution> {
        self.symbols.iter()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn resolved_count(&self) -> usize {
        self.symbols
            .iter()
            .filter(|s| s.resolution.is_resolved())
            .count()
    }

    pub fn summary(&self) -> ResolutionSummary {
        ResolutionSummary::from_table(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, class: AddressClass, resolution: Resolution) -> SymbolResolution {
        SymbolResolution {
            name: name.to_string(),
            address_class: class,
            required: true,
            resolution,
        }
    }

    fn table() -> ResolutionTable {
        ResolutionTable::new(
            "iw3",
            vec![
                entry(
                    "CG_DrawTracer",
                    AddressClass::Code,
                    Resolution::Resolved {
                        address: ResolvedAddress {
                            value: 0x43_1000,
                            class: AddressClass::Code,
                        },
                        variant: 0,
                    },
                ),
                entry(
                    "clientActive",
                    AddressClass::Data,
                    Resolution::Resolved {
                        address: ResolvedAddress {
                            value: 0xC5_F930,
                            class: AddressClass::Data,
                        },
                        variant: 1,
                    },
                ),
                entry(
                    "mouseVars",
                    AddressClass::Data,
                    Resolution::Ambiguous {
                        matches: 3,
                        sample: vec![1, 2, 3],
                    },
                ),
            ],
        )
    }

    #[test]
    fn test_address_present_only_when_resolved() {
        let table = table();
        for symbol in table.iter() {
            assert_eq!(
                symbol.address().is_some(),
                symbol.status() == ResolutionStatus::Resolved,
                "{}",
                symbol.name
            );
        }
        assert_eq!(table.address("mouseVars"), None);
        assert_eq!(table.status("mouseVars"), Some(ResolutionStatus::Ambiguous));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let table = table();
        assert_eq!(table.code("cg_drawtracer"), Some(0x43_1000));
        assert!(table.resolve("unknown").is_none());
        assert_eq!(table.resolved_count(), 2);
    }

    #[test]
    fn test_typed_accessors_check_class() {
        let table = table();
        assert_eq!(table.data("clientActive"), Some(0xC5_F930));
        assert_eq!(table.code("clientActive"), None);
        assert_eq!(table.data("CG_DrawTracer"), None);
    }

    #[test]
    fn test_first_entry_wins_on_name_collision() {
        let table = ResolutionTable::new(
            "iw3",
            vec![
                entry(
                    "mouseVars",
                    AddressClass::Data,
                    Resolution::Resolved {
                        address: ResolvedAddress {
                            value: 0x10,
                            class: AddressClass::Data,
                        },
                        variant: 0,
                    },
                ),
                entry(
                    "MOUSEVARS",
                    AddressClass::Data,
                    Resolution::Ambiguous {
                        matches: 2,
                        sample: vec![0x20, 0x30],
                    },
                ),
            ],
        );
        assert_eq!(table.data("mousevars"), Some(0x10));
        assert_eq!(table.status("MouseVars"), Some(ResolutionStatus::Resolved));
    }

    #[test]
    fn test_resolution_display() {
        let ambiguous = Resolution::Ambiguous {
            matches: 2,
            sample: vec![0x1000, 0x2000],
        };
        assert_eq!(ambiguous.to_string(), "ambiguous: 2 matches (0x1000, 0x2000)");

        let absent = Resolution::ModuleAbsent {
            module: ModuleTarget::SecondaryOptional,
        };
        assert_eq!(absent.to_string(), "module absent: secondary_optional");
    }

    #[test]
    fn test_resolution_serializes_with_status_tag() {
        let json = serde_json::to_value(Resolution::NotFound {
            reason: NotFoundReason::NoMatch,
        })
        .unwrap();
        assert_eq!(json["status"], "not_found");
        assert_eq!(json["reason"]["kind"], "no_match");
    }
}
