use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "dexray")]
#[command(about = "Decompile or disassemble Java class/JAR/DEX/APK files")]
pub struct Cli {
    /// Input file; the format is detected from its magic number.
    pub input: PathBuf,

    /// Output directory (default: a sibling directory named after the input).
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Worker threads: 0 picks the default (4), 1 disables pooling, capped at 16.
    #[arg(short = 't', long, value_name = "N", default_value_t = 0)]
    pub threads: usize,

    /// Emit smali-style disassembly instead of reconstructed source.
    #[arg(short = 's', long)]
    pub smali: bool,

    /// Print class metadata (like javap/dexdump) instead of rendering.
    #[arg(short = 'p', long)]
    pub print: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Suppress the banner and progress display.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
