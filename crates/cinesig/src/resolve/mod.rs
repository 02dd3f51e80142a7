//! Symbol resolution.
//!
//! [`Resolver`] runs every symbol of a [`DescriptorSet`] against a
//! [`ModuleRegistry`] and records one terminal [`Resolution`] per symbol in a
//! [`ResolutionTable`]. A failing symbol never stops the pass; the caller
//! decides from the [`ResolutionSummary`] whether the attach is usable.

mod summary;
mod table;

pub use summary::*;
pub use table::*;

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::module::ModuleRegistry;
use crate::scan::{ScanOutcome, scan_unique};
use crate::signature::{DescriptorSet, PatternDescriptor, SymbolEntry};
use crate::transform::TransformEngine;

pub struct Resolver<'a> {
    modules: &'a ModuleRegistry,
}

impl<'a> Resolver<'a> {
    pub fn new(modules: &'a ModuleRegistry) -> Self {
        Self { modules }
    }

    /// Resolve every entry of `set`, in declared order.
    ///
    /// Names are case-insensitive; a later entry reusing a name is skipped.
    pub fn resolve_all(&self, set: &DescriptorSet) -> ResolutionTable {
        let engine = TransformEngine::new(self.modules, set.pointer_width);
        let mut seen = HashSet::new();
        let symbols: Vec<SymbolResolution> = set
            .entries
            .iter()
            .filter(|entry| {
                let first = seen.insert(entry.name.to_ascii_lowercase());
                if !first {
                    warn!("Skipping duplicate symbol '{}'", entry.name);
                }
                first
            })
            .map(|entry| self.resolve_entry(entry, &engine))
            .collect();

        let table = ResolutionTable::new(&set.game, symbols);
        info!(
            "Resolved {}/{} {} symbols",
            table.resolved_count(),
            table.len(),
            table.game()
        );
        table
    }

    /// Try candidates in order; the first one that resolves wins
    pub fn resolve_entry(
        &self,
        entry: &SymbolEntry,
        engine: &TransformEngine,
    ) -> SymbolResolution {
        let mut worst: Option<Resolution> = None;

        for (variant, candidate) in entry.candidates.iter().enumerate() {
            let resolution = self.resolve_candidate(candidate, variant, engine);
            if resolution.is_resolved() {
                worst = Some(resolution);
                break;
            }
            if worst
                .as_ref()
                .is_none_or(|w| resolution.failure_rank() > w.failure_rank())
            {
                worst = Some(resolution);
            }
        }

        let resolution = worst.unwrap_or(Resolution::NotFound {
            reason: NotFoundReason::NoMatch,
        });
        let symbol = SymbolResolution {
            name: entry.name.clone(),
            address_class: entry.address_class(),
            required: entry.is_required(),
            resolution,
        };
        log_resolution(&symbol);
        symbol
    }

    fn resolve_candidate(
        &self,
        candidate: &PatternDescriptor,
        variant: usize,
        engine: &TransformEngine,
    ) -> Resolution {
        let Some(image) = self.modules.image(candidate.module) else {
            return Resolution::ModuleAbsent {
                module: candidate.module,
            };
        };

        let found = match scan_unique(image, &candidate.pattern, candidate.address_class) {
            ScanOutcome::Unique(address) => address,
            ScanOutcome::NotFound => {
                return Resolution::NotFound {
                    reason: NotFoundReason::NoMatch,
                };
            }
            ScanOutcome::Ambiguous { count, sample } => {
                return Resolution::Ambiguous {
                    matches: count,
                    sample,
                };
            }
        };

        let target = engine
            .offset(image, found, candidate.offset)
            .and_then(|raw| engine.apply(candidate.transform, image, raw));

        match target {
            Ok(value) => Resolution::Resolved {
                address: ResolvedAddress {
                    value,
                    class: candidate.address_class,
                },
                variant,
            },
            Err(e) => {
                debug!(
                    "Match at 0x{:X} in {} rejected: {}",
                    found,
                    image.name(),
                    e
                );
                Resolution::NotFound { reason: e.into() }
            }
        }
    }
}

fn log_resolution(symbol: &SymbolResolution) {
    match &symbol.resolution {
        Resolution::Resolved { address, variant } => {
            debug!("{} -> {} (variant {})", symbol.name, address, variant)
        }
        Resolution::Ambiguous { matches, sample } => error!(
            "{}: pattern matched {} times, first at {:X?}",
            symbol.name, matches, sample
        ),
        Resolution::NotFound { reason } if symbol.required => {
            error!("{}: {}", symbol.name, reason)
        }
        Resolution::NotFound { reason } => warn!("{}: {}", symbol.name, reason),
        Resolution::ModuleAbsent { module } => {
            info!("{}: {} module not loaded", symbol.name, module)
        }
    }
}
