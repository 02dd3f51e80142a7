use std::fmt;

use serde::Serialize;

use super::{Resolution, ResolutionStatus, ResolutionTable};

/// One symbol that did not resolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SymbolFailure {
    pub name: String,
    pub required: bool,
    pub resolution: Resolution,
}

impl SymbolFailure {
    pub fn status(&self) -> ResolutionStatus {
        self.resolution.status()
    }

    pub fn is_fatal(&self) -> bool {
        self.required
    }
}

/// Everything that went wrong in one resolution pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub game: String,
    pub total: usize,
    pub resolved: usize,
    pub failures: Vec<SymbolFailure>,
}

impl ResolutionSummary {
    pub fn from_table(table: &ResolutionTable) -> Self {
        let failures = table
            .iter()
            .filter(|s| !s.resolution.is_resolved())
            .map(|s| SymbolFailure {
                name: s.name.clone(),
                required: s.required,
                resolution: s.resolution.clone(),
            })
            .collect();

        Self {
            game: table.game().to_string(),
            total: table.len(),
            resolved: table.resolved_count(),
            failures,
        }
    }

    /// Some required symbol is unresolved
    pub fn is_fatal(&self) -> bool {
        self.failures.iter().any(SymbolFailure::is_fatal)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn fatal(&self) -> impl Iterator<Item = &SymbolFailure> {
        self.failures.iter().filter(|f| f.is_fatal())
    }

    /// Optional symbols that failed; features using them should be disabled
    pub fn degraded(&self) -> impl Iterator<Item = &SymbolFailure> {
        self.failures.iter().filter(|f| !f.is_fatal())
    }
}

impl fmt::Display for ResolutionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} symbols resolved",
            self.game, self.resolved, self.total
        )?;

        let join = |failures: Vec<&SymbolFailure>| {
            failures
                .iter()
                .map(|failure| format!("{} ({})", failure.name, failure.resolution))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let fatal: Vec<_> = self.fatal().collect();
        if !fatal.is_empty() {
            write!(f, "; fatal: {}", join(fatal))?;
        }
        let degraded: Vec<_> = self.degraded().collect();
        if !degraded.is_empty() {
            write!(f, "; degraded: {}", join(degraded))?;
        }
        Ok(())
    }
}
