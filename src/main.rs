mod cmd;

use clap::{Parser, Subcommand};
use std::process;

#[derive(Parser)]
#[command(name = "wav2vec2-performer-config")]
#[command(version)]
#[command(about = "Resolve and validate wav2vec2 Performer model configurations", long_about = None)]
struct Cli {
    /// Log each resolution step to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the merged configuration as JSON
    Show(cmd::ResolveArgs),
    /// Validate the configuration without printing it
    Check(cmd::ResolveArgs),
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Show(args) => cmd::show(&args),
        Commands::Check(args) => cmd::check(&args),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
