use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Load the row level access configuration, build every rule and print
/// the result.
#[derive(Parser, Debug)]
#[command(name = "rla-check")]
#[command(version, about = "Validate row level access rules")]
pub struct Cli {
    /// Settings YAML (`config_dir`, `rules_file`, `default_type`)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Directory holding the rules file, overrides the settings
    #[arg(short, long)]
    pub config_dir: Option<PathBuf>,

    /// User method implemented by the host application; may be repeated
    #[arg(short = 'm', long = "user-method", value_name = "NAME")]
    pub user_methods: Vec<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text)]
    pub format: Format,

    /// Log filter used when `RUST_LOG` is not set
    #[arg(short, long, default_value = "info")]
    pub log_level: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Text,
    Json,
}
