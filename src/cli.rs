use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::TOKEN_ENV_VAR;

#[derive(Debug, Parser)]
#[command(author, version, about = "Load and inspect project sample metadata", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load every view of a project and print a loading summary
    Load(LoadArgs),
    /// Load a project's schema and list its view columns
    Fields(ProjectArgs),
    /// Load a project and preview its rows in a formatted table
    Preview(PreviewArgs),
    /// Print the unique values of one column
    Unique(UniqueArgs),
    /// Export the loaded metadata to CSV
    Export(ExportArgs),
}

#[derive(Debug, Args)]
pub struct ProjectArgs {
    /// Project abbreviation
    #[arg(short, long)]
    pub project: String,
    /// YAML file with connection settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Base URL of the metadata API (overrides the config file)
    #[arg(long = "base-url")]
    pub base_url: Option<String>,
    /// Bearer token used for every request
    #[arg(long, env = TOKEN_ENV_VAR, hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
    /// Emit the full project state as JSON instead of a summary
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
    /// Maximum number of rows to display
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}

#[derive(Debug, Args)]
pub struct UniqueArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
    /// Column whose unique values are printed
    #[arg(short = 'C', long)]
    pub column: String,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
    /// Output CSV file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter, default_value = ",")]
    pub delimiter: u8,
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" => Ok(b'\t'),
        "comma" => Ok(b','),
        "semicolon" => Ok(b';'),
        "pipe" => Ok(b'|'),
        other if other.len() == 1 && other.is_ascii() => Ok(other.as_bytes()[0]),
        other => Err(format!("Unsupported delimiter '{other}'")),
    }
}
