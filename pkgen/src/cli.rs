//! CLI argument parsing for pkgen

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "pkgen")]
#[command(author, version, about = "Generate typed prompt accessors from the prompt registry", long_about = None)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate prompt modules from the registry
    Generate {
        /// Directory for generated files (default: generate.output-dir from config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Prompt id to generate; repeat for several (default: every prompt)
        #[arg(short, long = "prompt", value_name = "ID")]
        prompts: Vec<String>,

        /// Registry base URL (default: registry.base-url from config)
        #[arg(long)]
        base_url: Option<String>,
    },
}
