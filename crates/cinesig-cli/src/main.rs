mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "cinesig")]
#[command(about = "Signature-based address resolution for IW3")]
struct Args {
    /// TOML file with module names and resolution policy
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve every symbol against a live process or an image dump
    Resolve {
        /// Executable name of the running game
        #[arg(long, conflicts_with = "image")]
        process: Option<String>,

        /// Raw dump of the primary module
        #[arg(long, requires = "base")]
        image: Option<PathBuf>,

        /// Load address of the dumped module (hex)
        #[arg(long)]
        base: Option<String>,

        /// Raw dump of the secondary module
        #[arg(long, requires_all = ["image", "secondary_base"])]
        secondary: Option<PathBuf>,

        /// Load address of the secondary dump (hex)
        #[arg(long)]
        secondary_base: Option<String>,

        /// JSON descriptor file to use instead of the built-in set
        #[arg(short, long)]
        signatures: Option<PathBuf>,

        /// Print the table as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search an image dump for one pattern
    Scan {
        /// Raw dump to search
        #[arg(long)]
        image: PathBuf,

        /// Pattern such as "8B F0 ?? ?? FF 15"
        #[arg(short, long)]
        pattern: String,

        /// Address of the first byte of the dump (hex)
        #[arg(long, default_value = "0")]
        base: String,

        /// Maximum number of matches to print
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Inspect or export descriptor sets
    Signatures {
        #[command(subcommand)]
        command: SignaturesCommand,
    },
}

#[derive(Subcommand)]
enum SignaturesCommand {
    /// Write the built-in set as JSON
    Export {
        /// Output path
        path: PathBuf,
    },
    /// List symbols and their candidates
    List {
        /// JSON descriptor file to list instead of the built-in set
        #[arg(short, long)]
        signatures: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let directive = if args.verbose {
        "cinesig=debug"
    } else {
        "cinesig=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let config = match &args.config {
        Some(path) => {
            let config = CliConfig::load(path)?;
            info!("Loaded config from {:?}", path);
            config
        }
        None => CliConfig::default(),
    };

    match args.command {
        Command::Resolve {
            process,
            image,
            base,
            secondary,
            secondary_base,
            signatures,
            json,
        } => {
            let target = match (process, image, base) {
                (Some(process), _, _) => commands::resolve::Target::Process(process),
                (None, Some(image), Some(base)) => commands::resolve::Target::Image {
                    primary: (image, commands::hex_utils::parse_hex_address(&base)?),
                    secondary: match (secondary, secondary_base) {
                        (Some(path), Some(base)) => {
                            Some((path, commands::hex_utils::parse_hex_address(&base)?))
                        }
                        _ => None,
                    },
                },
                _ => anyhow::bail!("Either --process or --image with --base is required"),
            };
            let descriptors = config.descriptors(signatures.as_deref())?;
            commands::resolve::run(target, &descriptors, &config.attach_config(), json)
        }
        Command::Scan {
            image,
            pattern,
            base,
            limit,
        } => {
            let base = commands::hex_utils::parse_hex_address(&base)?;
            commands::scan::run(&image, &pattern, base, limit)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Signatures { command } => {
            match command {
                SignaturesCommand::Export { path } => commands::signatures::export(&path)?,
                SignaturesCommand::List { signatures } => {
                    commands::signatures::list(&config.descriptors(signatures.as_deref())?)
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
