pub mod overlay;

use clap::Parser;
use sinus_ct::config::Preset;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "sinus-ct")]
#[command(about = "Pre-operative difficulty assessment for a coronal sinus CT slice")]
#[command(version)]
pub struct Cli {
    /// Decoded slice to analyse (PNG, JPEG, ...).
    pub image: PathBuf,

    /// Settings file (TOML, JSON or YAML) layered over the preset.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Base settings before the file and environment are applied.
    #[arg(long, value_enum, default_value_t = Preset::Standard)]
    pub preset: Preset,

    /// Write a copy of the slice with the detected regions outlined.
    #[arg(long)]
    pub overlay: Option<PathBuf>,

    /// Run the four analyzers concurrently.
    #[arg(long)]
    pub concurrent: bool,

    /// Debug-level logging.
    #[arg(short, long)]
    pub verbose: bool,
}
