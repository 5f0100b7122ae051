//! Command line interface definition

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use updkit_types::{Architecture, ColorChoice};

/// updkit - application auto-update toolkit
#[derive(Parser)]
#[command(name = "updkit")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Check for, install and publish application updates")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Write debug logs to the updkit log directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Look for updates without downloading anything
    Check {
        /// Configuration document URL (overrides the config file)
        #[arg(long, value_name = "URL")]
        from: Option<String>,

        /// Version of the installed application (overrides the config file)
        #[arg(long, value_name = "VERSION")]
        current: Option<String>,
    },

    /// Download, verify and install every applicable update
    #[command(alias = "up")]
    Update {
        /// Configuration document URL (overrides the config file)
        #[arg(long, value_name = "URL")]
        from: Option<String>,

        /// Version of the installed application (overrides the config file)
        #[arg(long, value_name = "VERSION")]
        current: Option<String>,

        /// Skip signature verification
        #[arg(long)]
        skip_verify: bool,
    },

    /// Install a package that is already on disk
    Install {
        /// Package archive (.zip)
        package: PathBuf,

        /// Configuration document listing the package's operations
        #[arg(long, value_name = "FILE")]
        configuration: PathBuf,

        /// Version to take from the document (default: the only entry)
        #[arg(long = "update-version", value_name = "VERSION")]
        version: Option<String>,

        /// Skip signature verification
        #[arg(long)]
        skip_verify: bool,
    },

    /// Check a package against a detached signature
    Verify {
        /// Package archive (.zip)
        package: PathBuf,

        /// File holding the minisign signature
        #[arg(long, value_name = "FILE")]
        signature: PathBuf,

        /// Base64 public key or a public key file (default: security.public_key)
        #[arg(long, value_name = "KEY")]
        key: Option<String>,
    },

    /// Generate a signing key pair
    Keygen {
        /// Directory receiving updkit.key and updkit.pub
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        output_dir: PathBuf,

        /// Overwrite existing key files
        #[arg(long)]
        force: bool,

        /// Password encrypting the secret key (empty when omitted)
        #[arg(long, env = "UPDKIT_KEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign a package and print the signature
    Sign {
        /// Package archive (.zip)
        package: PathBuf,

        /// Secret key file (default: publish.secret_key)
        #[arg(long, value_name = "FILE")]
        key: Option<PathBuf>,

        /// Password of an encrypted secret key
        #[arg(long, env = "UPDKIT_KEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign and upload a package and list it in the configuration document
    Publish {
        /// Package archive (.zip)
        package: PathBuf,

        /// Version being published
        #[arg(long = "update-version", value_name = "VERSION")]
        version: String,

        /// Mark the update as mandatory
        #[arg(long)]
        necessary: bool,

        /// Architecture the package targets
        #[arg(long, value_enum, default_value_t = ArchArg::AnyCpu)]
        architecture: ArchArg,

        /// Changelog text, as `culture=text`; repeatable
        #[arg(long = "changelog", value_name = "CULTURE=TEXT")]
        changelogs: Vec<String>,

        /// JSON file with the install operations
        #[arg(long, value_name = "FILE")]
        operations: Option<PathBuf>,

        /// Versions that must not update to this one
        #[arg(long = "unsupported", value_name = "VERSION")]
        unsupported_versions: Vec<String>,

        /// Password of an encrypted secret key
        #[arg(long, env = "UPDKIT_KEY_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Remove a published version and its package
    Unpublish {
        /// Version to withdraw
        version: String,
    },

    /// Show packages published and removed from this machine
    History,
}

/// Package architecture as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ArchArg {
    X86,
    X64,
    #[value(name = "any")]
    AnyCpu,
}

impl From<ArchArg> for Architecture {
    fn from(arch: ArchArg) -> Self {
        match arch {
            ArchArg::X86 => Self::X86,
            ArchArg::X64 => Self::X64,
            ArchArg::AnyCpu => Self::AnyCpu,
        }
    }
}
