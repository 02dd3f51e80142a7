//! Descriptor set inspection and export.

use std::path::Path;

use anyhow::Result;
use cinesig::{DescriptorSet, Transform, builtin_signatures, save_signatures};

/// Write the built-in set to `path` as JSON
pub fn export(path: &Path) -> Result<()> {
    let set = builtin_signatures();
    save_signatures(path, &set)?;
    println!("Exported {} signatures to {}", set.len(), path.display());
    Ok(())
}

pub fn list(set: &DescriptorSet) {
    println!(
        "{} ({} symbols, {:?})",
        set.game,
        set.len(),
        set.pointer_width
    );
    println!();

    for entry in &set.entries {
        let required = if entry.is_required() { "" } else { " [optional]" };
        println!(
            "{:<30} {:<5} {} candidate(s){}",
            entry.name,
            entry.address_class(),
            entry.candidates.len(),
            required
        );
        for candidate in &entry.candidates {
            let transform = match candidate.transform {
                Transform::None => String::new(),
                other => format!(" -> {}", other),
            };
            println!(
                "    [{}] {} @ {:+}{}",
                candidate.module, candidate.pattern, candidate.offset, transform
            );
        }
    }
}
