//! Resolve command implementation.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use cinesig::{
    AttachConfig, Attachment, DescriptorSet, ModuleImage, ModuleRegistry, Resolution,
    ResolutionSummary, ResolutionTable,
};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::warn;

/// Where the module images come from
pub enum Target {
    /// A running process, by executable name
    Process(String),
    /// Raw dumps with their load addresses
    Image {
        primary: (PathBuf, u64),
        secondary: Option<(PathBuf, u64)>,
    },
}

#[derive(Serialize)]
struct Report<'a> {
    table: &'a ResolutionTable,
    summary: &'a ResolutionSummary,
}

/// Run the resolve command; the exit code reflects the summary
pub fn run(
    target: Target,
    descriptors: &DescriptorSet,
    config: &AttachConfig,
    json: bool,
) -> Result<ExitCode> {
    // the table is printed even when required symbols are missing
    let lenient = AttachConfig {
        abort_on_fatal: false,
        ..config.clone()
    };

    let attachment = match target {
        Target::Process(name) => Attachment::attach(&name, descriptors, &lenient)?,
        Target::Image { primary, secondary } => {
            let (path, base) = primary;
            let mut modules =
                ModuleRegistry::new(load_image(&path, &config.primary_module, base)?);
            if let Some((path, base)) = secondary {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "secondary".to_string());
                modules = modules.with_secondary(load_image(&path, &name, base)?);
            }
            Attachment::from_registry(modules, descriptors, &lenient)?
        }
    };

    let table = attachment.table();
    let summary = attachment.summary();

    if json {
        let report = Report {
            table: &table,
            summary: &summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_table(&table);
        println!();
        println!("{}", summary);
    }

    if summary.is_fatal() {
        if config.abort_on_fatal {
            return Ok(ExitCode::FAILURE);
        }
        warn!("Required symbols are unresolved; abort_on_fatal is disabled");
    }
    Ok(ExitCode::SUCCESS)
}

fn load_image(path: &Path, name: &str, base: u64) -> Result<ModuleImage> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read image {}", path.display()))?;
    Ok(ModuleImage::from_bytes(name, base, bytes))
}

fn print_table(table: &ResolutionTable) {
    for symbol in table.iter() {
        let marker = if symbol.required { " " } else { "?" };
        match &symbol.resolution {
            Resolution::Resolved { address, variant } => {
                let variant = if *variant > 0 {
                    format!(" (variant {})", variant)
                } else {
                    String::new()
                };
                println!(
                    "{} {:<30} {:<4} {}{}",
                    marker,
                    symbol.name,
                    symbol.address_class,
                    address.green(),
                    variant
                );
            }
            other if symbol.is_fatal() => println!(
                "{} {:<30} {:<4} {}",
                marker,
                symbol.name,
                symbol.address_class,
                other.red()
            ),
            other => println!(
                "{} {:<30} {:<4} {}",
                marker,
                symbol.name,
                symbol.address_class,
                other.yellow()
            ),
        }
    }
}
