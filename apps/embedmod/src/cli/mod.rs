//! # embedmod CLI Module
//!
//! This module implements the CLI interface for embedmod.
//!
//! ## Available Commands
//!
//! - `pack` - Build a module image from a payload file
//! - `inspect` - Show the manifest, identity, and hash of a module image
//! - `list` - List the resources of a bundle directory
//! - `stage` - Stage a file into the staging cache
//! - `load` - Load one resource from a bundle directory
//! - `resolve` - Run the resolution hook against a bundle directory

mod commands;
mod settings;

use clap::{Parser, Subcommand, ValueEnum};
use embedmod_core::{DuplicatePolicy, LoaderError};
use std::path::PathBuf;

pub use commands::*;
pub use settings::{BundleSettings, Settings};

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// embedmod - embedded module loader tooling
///
/// Build and inspect module images, manage the staging cache, and dry-run
/// loads and resolutions against a bundle directory.
#[derive(Parser, Debug)]
#[command(name = "embedmod")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML settings file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the staging root directory
    #[arg(long, global = true)]
    pub staging_dir: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Duplicate registration policy as accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    Fail,
    Ignore,
    Replace,
}

impl From<PolicyArg> for DuplicatePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Fail => Self::Fail,
            PolicyArg::Ignore => Self::Ignore,
            PolicyArg::Replace => Self::Replace,
        }
    }
}

/// Bundle directory selection shared by bundle commands.
#[derive(clap::Args, Debug, Clone)]
pub struct BundleArgs {
    /// Bundle directory (defaults to `[bundle].dir` from settings)
    #[arg(short, long)]
    pub bundle: Option<PathBuf>,

    /// Namespace prefixed to resource names
    #[arg(short, long)]
    pub namespace: Option<String>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a module image
    Pack {
        /// Module name
        #[arg(long)]
        name: String,

        /// Module version
        #[arg(long, default_value = "1.0.0")]
        module_version: String,

        /// Mark the module as loadable from a file only
        #[arg(long)]
        file_backed: bool,

        /// Exported symbol (repeatable)
        #[arg(short, long = "export")]
        exports: Vec<String>,

        /// File whose bytes become the image payload
        #[arg(short, long)]
        payload: Option<PathBuf>,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Show a module image's manifest and identity
    Inspect {
        /// Module image file
        file: PathBuf,
    },

    /// List bundle resources
    List {
        #[command(flatten)]
        bundle: BundleArgs,
    },

    /// Stage a file into the staging cache
    Stage {
        /// File to stage
        #[arg(short, long)]
        input: PathBuf,

        /// Name of the staged file (defaults to the input's file name)
        #[arg(short, long)]
        file_name: Option<String>,
    },

    /// Load a resource from a bundle
    Load {
        #[command(flatten)]
        bundle: BundleArgs,

        /// Resource name inside the bundle
        #[arg(short, long)]
        resource: String,

        /// Staging file name (defaults to the resource name's last two parts)
        #[arg(short, long)]
        file_name: Option<String>,

        /// What to do if the identity is already registered
        #[arg(long, value_enum)]
        policy: Option<PolicyArg>,
    },

    /// Resolve a module request against a bundle
    Resolve {
        #[command(flatten)]
        bundle: BundleArgs,

        /// Requested module name, e.g. "Helper, Version=1.0.0"
        request: String,

        /// Stage modules that cannot be loaded from memory
        #[arg(long)]
        stage: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), LoaderError> {
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(dir) = cli.staging_dir {
        settings.loader.staging_dir = dir;
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Pack {
            name,
            module_version,
            file_backed,
            exports,
            payload,
            output,
        } => cmd_pack(
            &name,
            &module_version,
            file_backed,
            exports,
            payload.as_deref(),
            &output,
            json_mode,
        ),
        Commands::Inspect { file } => cmd_inspect(&file, json_mode),
        Commands::List { bundle } => cmd_list(&settings, &bundle, json_mode),
        Commands::Stage { input, file_name } => {
            cmd_stage(&settings, &input, file_name.as_deref(), json_mode)
        }
        Commands::Load {
            bundle,
            resource,
            file_name,
            policy,
        } => cmd_load(
            &settings,
            &bundle,
            &resource,
            file_name.as_deref(),
            policy.map(DuplicatePolicy::from),
            json_mode,
        ),
        Commands::Resolve {
            bundle,
            request,
            stage,
        } => {
            if stage {
                settings.loader.stage_on_resolve = true;
            }
            cmd_resolve(&settings, &bundle, &request, json_mode)
        }
    }
}
