use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod output;

use commands::decode::run_decode;
use commands::inspect::run_inspect_result;
use commands::replay::run_replay;

#[derive(Parser)]
#[command(name = "rehydrate")]
#[command(about = "Replay captured chat history through the hydration pipeline", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging to stderr.
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply history batches in order, threading the hydration cursor.
    Replay(ReplayArgs),
    /// Extract command/title/output from a captured tool result.
    InspectResult(InspectResultArgs),
    /// Decode escape sequences in a string.
    Decode(DecodeArgs),
}

#[derive(Args)]
struct ReplayArgs {
    /// JSON files, each holding an array of raw history messages.
    #[arg(required = true)]
    batches: Vec<PathBuf>,

    /// JSON array of display messages already on screen.
    #[arg(long)]
    existing: Option<PathBuf>,
}

#[derive(Args)]
struct InspectResultArgs {
    /// File holding the raw tool result, or `-` for stdin.
    source: String,

    /// Tool-use arguments as a JSON object.
    #[arg(long)]
    args: Option<String>,

    /// Treat the result as error text.
    #[arg(long)]
    error: bool,
}

#[derive(Args)]
struct DecodeArgs {
    text: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = std::env::current_dir()?;

    match cli.command {
        Commands::Replay(args) => run_replay(&cwd, args, cli.json, cli.verbose),
        Commands::InspectResult(args) => run_inspect_result(&cwd, args, cli.json),
        Commands::Decode(args) => run_decode(args, cli.json),
    }
}
