use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::subtitle::AssLayout;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path (default: ./rubigene.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Annotate one SRT file with ruby glosses and write an ASS file
    Annotate {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Output ASS file (default: <input stem>_ruby.ass next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        options: AnnotateOptions,
    },

    /// Annotate every SRT file under a directory
    Batch {
        /// Directory searched recursively for .srt files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Output directory (default: next to each input)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        options: AnnotateOptions,
    },

    /// Manage the translation cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Load the lookup tables and report their sizes
    Check {
        /// Also send a test request to verify the API key
        #[arg(long)]
        verify_api_key: bool,

        /// Translation service API key
        #[arg(long, env = "RUBIGENE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Destination path
        #[arg(short, long, default_value = "rubigene.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Commands {
    /// Whether the command reads the configuration file. `init-config` must
    /// work even when the existing file does not parse.
    pub fn needs_config(&self) -> bool {
        !matches!(self, Commands::InitConfig { .. })
    }
}

/// Flags that override the configuration for a run
#[derive(clap::Args, Debug, Clone, Default)]
pub struct AnnotateOptions {
    /// Gloss language (e.g. ja)
    #[arg(short, long)]
    pub target_lang: Option<String>,

    /// Translation service API key
    #[arg(long, env = "RUBIGENE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Output layout
    #[arg(long, value_enum)]
    pub layout: Option<LayoutArg>,

    /// Write a JSON run report next to each output
    #[arg(long)]
    pub report: bool,

    /// Abort on malformed subtitle blocks instead of skipping them
    #[arg(long)]
    pub strict: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutArg {
    Inline,
    Stacked,
}

impl From<LayoutArg> for AssLayout {
    fn from(value: LayoutArg) -> Self {
        match value {
            LayoutArg::Inline => AssLayout::Inline,
            LayoutArg::Stacked => AssLayout::Stacked,
        }
    }
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// List cached glosses, newest first
    List,

    /// Show cache statistics and size
    Info,

    /// Remove every cached gloss
    Clear,
}
