//! # CLI
//!
//! Anonymizes a Company of Heroes replay: every player is renamed to `Player N` and the result is
//! written to the output path. The output is only written once the whole replay has been
//! rewritten, so a failure never leaves a partial file behind.
//!
//! ```bash
//! chunkyrec input.rec output.rec
//!
//! # Print what the replay contains instead
//! chunkyrec --info input.rec
//! ```

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chunkyrec")]
#[command(about = "Renames the players of a Company of Heroes replay to Player 1, Player 2, ...")]
#[command(version)]
struct Cli {
    /// Replay to read
    input: PathBuf,

    /// Where to write the anonymized replay
    #[arg(required_unless_present = "info")]
    output: Option<PathBuf>,

    /// Print the match details as JSON instead of anonymizing
    #[arg(long)]
    info: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("unable to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }

    Ok(())
}

fn read_replay(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("unable to read {}", path.display()))
}

fn print_info(input: &Path) -> Result<()> {
    let data = read_replay(input)?;
    let replay = chunkyrec::ParserBuilder::new(&data)
        .parse()
        .with_context(|| format!("{} is not a valid replay", input.display()))?;

    serde_json::to_writer_pretty(io::stdout().lock(), &replay)?;
    println!();
    Ok(())
}

fn anonymize(input: &Path, output: &Path) -> Result<()> {
    let mut data = read_replay(input)?;

    let replay = chunkyrec::ParserBuilder::new(&data)
        .parse()
        .with_context(|| format!("{} is not a valid replay", input.display()))?;

    for issue in &replay.issues {
        tracing::warn!(tag = %issue.tag, offset = issue.offset, "incomplete chunk: {}", issue.error);
    }

    tracing::info!(
        players = replay.players.len(),
        map = replay.map_name.as_deref().unwrap_or("unknown"),
        "parsed replay"
    );

    let renamings = chunkyrec::anonymize(&mut data)
        .with_context(|| format!("unable to anonymize {}", input.display()))?;

    for renaming in &renamings {
        println!("'{}' ---> '{}'", renaming.original, renaming.replacement);
    }

    fs::write(output, &data).with_context(|| format!("unable to write {}", output.display()))?;
    tracing::info!(path = %output.display(), "saved");
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.log_file.as_deref())?;

    match cli.output {
        _ if cli.info => print_info(&cli.input),
        Some(output) => anonymize(&cli.input, &output),
        None => anyhow::bail!("an output path is required"),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if !cli.input.is_file() {
        eprintln!(
            "please enter a valid replay filename as the first argument\n\
             and an output filename eg: output.rec as the second argument\n"
        );
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::from(2);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
