use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::SourcePreference;
use crate::logging::LogArgs;

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Raw binary bytes
    Raw,
    /// Hexadecimal (lowercase), one line per batch
    Hex,
    /// Base64 (standard, with padding), one line per batch
    Base64,
}

#[derive(Debug, Args)]
pub struct CpuRngArgs {
    /// Hardware RNG instruction to use
    #[arg(long, value_enum)]
    pub source: Option<SourcePreference>,

    /// RDRAND attempts per word (1-1000)
    #[arg(long)]
    pub rdrand_retries: Option<u32>,

    /// RDSEED attempts per word (1-1000)
    #[arg(long)]
    pub rdseed_retries: Option<u32>,
}

#[derive(Debug, Args)]
pub struct FeedArgs {
    /// Fill the blocking pool until it reports this many bits (default: 3072)
    #[arg(short = 'w', long)]
    pub fill_watermark: Option<u32>,

    /// Add entropy at least this often, in milliseconds (default: 300000)
    #[arg(short = 's', long)]
    pub max_sleep_ms: Option<u64>,

    /// Blocking pool device (default: /dev/random)
    #[arg(long)]
    pub random_device: Option<PathBuf>,

    /// Non-blocking pool device (default: /dev/urandom)
    #[arg(long)]
    pub urandom_device: Option<PathBuf>,
}

#[derive(Debug, Parser)]
#[command(
    name = "rdfeed",
    about = "Feed the kernel entropy pools from the CPU's RDSEED/RDRAND instructions"
)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Configuration file path (default: /etc/rdfeed.toml)
    #[arg(long = "config")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub cpu_rng: CpuRngArgs,

    #[command(flatten)]
    pub feed: FeedArgs,

    #[command(flatten)]
    pub log: LogArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Write raw hardware RNG output instead of feeding the kernel
    Dump(DumpArgs),
}

#[derive(Debug, Parser)]
pub struct DumpArgs {
    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = OutputFormat::Raw)]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short = 'o', long = "output-file")]
    pub output_file: Option<PathBuf>,

    /// Stop after this many batches (default: run until the reader goes away)
    #[arg(short = 'n', long)]
    pub batches: Option<u64>,

    /// Configuration file path (default: /etc/rdfeed.toml)
    #[arg(long = "config")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub cpu_rng: CpuRngArgs,

    #[command(flatten)]
    pub log: LogArgs,
}
